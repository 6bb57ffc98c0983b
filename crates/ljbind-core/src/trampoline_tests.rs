//! Tests for callback trampolines and the arena that keeps them alive

use super::error::BindError;
use super::signature::{NativeSignature, NativeType};
use super::trampoline::*;
use super::value::NativeRet;
use std::cell::Cell;
use std::ffi::{c_char, c_int, c_void};
use std::rc::Rc;

fn sig(decl: &str) -> NativeSignature {
    NativeSignature::parse(decl).unwrap()
}

#[test]
fn test_handle_callback_sees_exact_pointer() {
    let seen = Rc::new(Cell::new(std::ptr::null_mut::<c_void>()));
    let seen_in = Rc::clone(&seen);

    let tramp = make_trampoline(sig("int (lua_State *L)"), move |args| {
        seen_in.set(args.handle(0).unwrap_or(std::ptr::null_mut()));
        NativeRet::Int(42)
    })
    .unwrap();

    let f: extern "C" fn(*mut c_void) -> c_int = unsafe { std::mem::transmute(tramp.code_ptr()) };
    let fake_state = 0x1234usize as *mut c_void;

    assert_eq!(f(fake_state), 42);
    assert_eq!(seen.get(), fake_state);
}

#[test]
fn test_handle_accessor_requires_handle_parameter() {
    let observed = Rc::new(Cell::new(None));
    let observed_in = Rc::clone(&observed);

    let tramp = make_trampoline(sig("void (void *p)"), move |args| {
        observed_in.set(Some((args.handle(0).is_none(), args.ptr(0).is_some())));
        NativeRet::Void
    })
    .unwrap();

    let f: extern "C" fn(*mut c_void) = unsafe { std::mem::transmute(tramp.code_ptr()) };
    f(std::ptr::null_mut());
    assert_eq!(observed.get(), Some((true, true)));
}

#[test]
fn test_integer_return_is_truncated_to_declared_width() {
    let tramp = make_trampoline(sig("int8_t (int x)"), |args| {
        NativeRet::Int(args.int(0).unwrap_or(0) + 200)
    })
    .unwrap();

    let f: extern "C" fn(c_int) -> i8 = unsafe { std::mem::transmute(tramp.code_ptr()) };
    assert_eq!(f(100), 300i64 as i8);
    assert_eq!(f(-100), 100);
}

#[test]
fn test_mixed_arguments_and_double_return() {
    let tramp = make_trampoline(sig("double (int a, double b, unsigned char c)"), |args| {
        let a = args.int(0).unwrap_or(0) as f64;
        let b = args.float(1).unwrap_or(0.0);
        let c = args.uint(2).unwrap_or(0) as f64;
        NativeRet::Float(a * b + c)
    })
    .unwrap();

    let f: extern "C" fn(c_int, f64, u8) -> f64 = unsafe { std::mem::transmute(tramp.code_ptr()) };
    assert_eq!(f(3, 1.5, 2), 6.5);
}

#[test]
fn test_string_argument() {
    let received = Rc::new(Cell::new(0usize));
    let received_in = Rc::clone(&received);

    let tramp = make_trampoline(sig("int (const char *s)"), move |args| {
        let bytes = args.c_str(0).unwrap_or_default();
        received_in.set(bytes.len());
        NativeRet::Bool(bytes == b"callback")
    })
    .unwrap();

    let f: extern "C" fn(*const c_char) -> c_int = unsafe { std::mem::transmute(tramp.code_ptr()) };
    assert_eq!(f(c"callback".as_ptr()), 1);
    assert_eq!(received.get(), 8);
    assert_eq!(f(c"other".as_ptr()), 0);
}

#[test]
fn test_mismatched_return_yields_zero() {
    let tramp = make_trampoline(sig("int (void)"), |_| NativeRet::Float(9.0)).unwrap();
    let f: extern "C" fn() -> c_int = unsafe { std::mem::transmute(tramp.code_ptr()) };
    assert_eq!(f(), 0);
}

#[test]
fn test_variadic_signature_is_rejected() {
    let err = make_trampoline(sig("int (lua_State *L, ...)"), |_| NativeRet::Int(0)).unwrap_err();
    assert!(matches!(err, BindError::TrampolineUnsupported { .. }));
}

#[test]
fn test_trampoline_keeps_signature() {
    let tramp = make_trampoline(sig("int (lua_State *L)"), |_| NativeRet::Int(0)).unwrap();
    assert_eq!(tramp.signature().params, vec![NativeType::Handle]);
    assert!(!tramp.code_ptr().is_null());
}

#[cfg(unix)]
#[test]
fn test_trampoline_as_qsort_comparator() {
    use super::binder::bind_one;
    use super::descriptor::SymbolDescriptor;
    use super::loader::LibraryHandle;
    use super::value::NativeArg;

    let lib = LibraryHandle::this_process().unwrap();
    let qsort = SymbolDescriptor::from_prototype(
        "qsort",
        "void qsort(void *base, size_t nmemb, size_t size, void *compar)",
    )
    .unwrap();
    let qsort = bind_one(&lib, &qsort).unwrap();

    let calls = Rc::new(Cell::new(0u32));
    let calls_in = Rc::clone(&calls);
    let compare = make_trampoline(sig("int (const void *a, const void *b)"), move |args| {
        calls_in.set(calls_in.get() + 1);
        let (Some(a), Some(b)) = (args.ptr(0), args.ptr(1)) else {
            return NativeRet::Int(0);
        };
        let (a, b) = unsafe { (*(a as *const i32), *(b as *const i32)) };
        NativeRet::Int(a.cmp(&b) as i64)
    })
    .unwrap();

    let mut values = [5i32, -3, 12, 0, 7, 7, -40];
    unsafe {
        qsort
            .call(&[
                NativeArg::Ptr(values.as_mut_ptr().cast()),
                NativeArg::UInt(values.len() as u64),
                NativeArg::UInt(size_of::<i32>() as u64),
                NativeArg::Ptr(compare.code_ptr() as *mut c_void),
            ])
            .unwrap();
    }

    assert_eq!(values, [-40, -3, 0, 5, 7, 7, 12]);
    assert!(calls.get() > 0);
}

#[test]
fn test_arena_pins_and_releases() {
    let arena = TrampolineArena::new();
    let a = arena.pin(make_trampoline(sig("int (void)"), |_| NativeRet::Int(1)).unwrap());
    let b = arena.pin(make_trampoline(sig("int (void)"), |_| NativeRet::Int(2)).unwrap());

    assert_eq!(arena.len(), 2);
    assert!(arena.contains(a));
    assert!(arena.contains(b));

    // Pinned pointers stay callable
    let f: extern "C" fn() -> c_int = unsafe { std::mem::transmute(b) };
    assert_eq!(f(), 2);

    assert!(unsafe { arena.release(a) });
    assert!(!arena.contains(a));
    assert!(!unsafe { arena.release(a) });
    assert_eq!(arena.len(), 1);
}

#[test]
fn test_arena_release_all_drops_closures() {
    let token = Rc::new(());
    let arena = TrampolineArena::new();

    for _ in 0..3 {
        let held = Rc::clone(&token);
        arena.pin(
            make_trampoline(sig("int (void)"), move |_| NativeRet::Int(Rc::strong_count(&held) as i64))
                .unwrap(),
        );
    }
    assert_eq!(Rc::strong_count(&token), 4);

    unsafe { arena.release_all() };
    assert!(arena.is_empty());
    assert_eq!(Rc::strong_count(&token), 1);
}

#[test]
fn test_dropping_arena_frees_trampolines() {
    let token = Rc::new(());
    {
        let arena = TrampolineArena::new();
        let held = Rc::clone(&token);
        arena.pin(make_trampoline(sig("void (void)"), move |_| {
            let _ = &held;
            NativeRet::Void
        })
        .unwrap());
        assert_eq!(Rc::strong_count(&token), 2);
    }
    assert_eq!(Rc::strong_count(&token), 1);
}
