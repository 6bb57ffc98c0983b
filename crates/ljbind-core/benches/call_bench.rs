use criterion::{Criterion, black_box, criterion_group, criterion_main};
use ljbind_core::{
    LibraryHandle, NativeArg, NativeRet, NativeSignature, SymbolDescriptor, SymbolTable, bind_all,
    bind_one, make_trampoline,
};

fn bench_parse_declaration(c: &mut Criterion) {
    let decl = "int luaL_loadbuffer(lua_State *L, const char *buff, size_t sz, const char *name)";
    c.bench_function("parse C declaration", |b| {
        b.iter(|| NativeSignature::parse(black_box(decl)))
    });
}

fn bench_bind_table(c: &mut Criterion) {
    let lib = LibraryHandle::this_process().expect("process handle");
    let table = SymbolTable::from_prototypes(
        "libc",
        &[
            ("strlen", "size_t strlen(const char *s)"),
            ("abs", "int abs(int n)"),
            ("toupper", "int toupper(int c)"),
            ("strtod", "double strtod(const char *s, char **end)"),
        ],
    )
    .expect("valid table");

    c.bench_function("bind small table", |b| {
        b.iter(|| bind_all(black_box(&lib), black_box(&table)))
    });
}

fn bench_call_fixed(c: &mut Criterion) {
    let lib = LibraryHandle::this_process().expect("process handle");
    let abs = SymbolDescriptor::from_prototype("abs", "int abs(int n)").expect("valid prototype");
    let abs = bind_one(&lib, &abs).expect("abs is exported");

    c.bench_function("call int(int)", |b| {
        b.iter(|| unsafe { abs.call(&[NativeArg::Int(black_box(-17))]) })
    });
}

fn bench_call_string(c: &mut Criterion) {
    let lib = LibraryHandle::this_process().expect("process handle");
    let strlen =
        SymbolDescriptor::from_prototype("strlen", "size_t strlen(const char *s)").expect("valid prototype");
    let strlen = bind_one(&lib, &strlen).expect("strlen is exported");
    let text = "the quick brown fox jumps over the lazy dog";

    c.bench_function("call size_t(const char *)", |b| {
        b.iter(|| unsafe { strlen.call(&[NativeArg::str(black_box(text))]) })
    });
}

fn bench_call_variadic(c: &mut Criterion) {
    let lib = LibraryHandle::this_process().expect("process handle");
    let snprintf = SymbolDescriptor::from_prototype(
        "snprintf",
        "int snprintf(char *buf, size_t n, const char *fmt, ...)",
    )
    .expect("valid prototype");
    let snprintf = bind_one(&lib, &snprintf).expect("snprintf is exported");
    let mut buf = vec![0u8; 64];
    let ptr = buf.as_mut_ptr().cast();

    c.bench_function("call variadic snprintf", |b| {
        b.iter(|| unsafe {
            snprintf.call(&[
                NativeArg::Ptr(ptr),
                NativeArg::UInt(64),
                NativeArg::str("%d"),
                NativeArg::Int(black_box(12345)),
            ])
        })
    });
}

fn bench_trampoline(c: &mut Criterion) {
    let sig = NativeSignature::parse("int (int a, int b)").expect("valid declaration");
    let tramp = make_trampoline(sig, |args| {
        NativeRet::Int(args.int(0).unwrap_or(0) + args.int(1).unwrap_or(0))
    })
    .expect("trampoline");
    let f: extern "C" fn(i32, i32) -> i32 = unsafe { std::mem::transmute(tramp.code_ptr()) };

    c.bench_function("call trampoline", |b| b.iter(|| f(black_box(20), black_box(22))));
}

criterion_group!(
    benches,
    bench_parse_declaration,
    bench_bind_table,
    bench_call_fixed,
    bench_call_string,
    bench_call_variadic,
    bench_trampoline
);
criterion_main!(benches);
