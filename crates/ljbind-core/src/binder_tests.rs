//! Tests for the signature binder, run against libc symbols already linked
//! into the test binary.

#![cfg(unix)]

use super::binder::*;
use super::descriptor::{SymbolDescriptor, SymbolTable};
use super::error::{BindError, CallError};
use super::loader::LibraryHandle;
use super::signature::NativeType;
use super::value::{NativeArg, NativeRet};

fn libc_handle() -> LibraryHandle {
    LibraryHandle::this_process().expect("process handle")
}

fn bind(proto: &str) -> BoundFn {
    let desc = SymbolDescriptor::from_prototype("f", proto).unwrap();
    bind_one(&libc_handle(), &desc).unwrap()
}

#[test]
fn test_bind_and_call_strlen() {
    let strlen = bind("size_t strlen(const char *s)");
    let result = unsafe { strlen.call(&[NativeArg::str("hello")]) }.unwrap();
    assert_eq!(result, NativeRet::UInt(5));
}

#[test]
fn test_strings_are_copied_with_terminator() {
    let strlen = bind("size_t strlen(const char *s)");

    let empty = unsafe { strlen.call(&[NativeArg::str("")]) }.unwrap();
    assert_eq!(empty, NativeRet::UInt(0));

    // The whole slice is copied; C sees the embedded NUL
    let embedded = unsafe { strlen.call(&[NativeArg::Str(b"ab\0cd")]) }.unwrap();
    assert_eq!(embedded, NativeRet::UInt(2));
}

#[test]
fn test_int_arguments_are_truncated_to_declared_width() {
    let abs = bind("int abs(int n)");
    assert_eq!(unsafe { abs.call(&[NativeArg::Int(-7)]) }.unwrap(), NativeRet::Int(7));

    // Only the low 32 bits cross the boundary
    let wide = (1i64 << 32) | 5;
    assert_eq!(unsafe { abs.call(&[NativeArg::Int(wide)]) }.unwrap(), NativeRet::Int(5));
}

#[test]
fn test_bool_return_is_nonzero_true() {
    let isdigit = bind("bool isdigit(int c)");
    let yes = unsafe { isdigit.call(&[NativeArg::Int('7' as i64)]) }.unwrap();
    let no = unsafe { isdigit.call(&[NativeArg::Int('x' as i64)]) }.unwrap();
    assert_eq!(yes, NativeRet::Bool(true));
    assert_eq!(no, NativeRet::Bool(false));
}

#[test]
fn test_bool_argument_becomes_int() {
    let abs = bind("int abs(int n)");
    assert_eq!(unsafe { abs.call(&[NativeArg::Bool(true)]) }.unwrap(), NativeRet::Int(1));
}

#[test]
fn test_double_return() {
    let strtod = bind("double strtod(const char *s, char **end)");
    let result = unsafe { strtod.call(&[NativeArg::str("2.5"), NativeArg::Null]) }.unwrap();
    assert_eq!(result, NativeRet::Float(2.5));
}

#[test]
fn test_string_return_is_copied() {
    let getenv = bind("const char *getenv(const char *name)");

    let missing = unsafe { getenv.call(&[NativeArg::str("LJBIND_SURELY_UNSET_VARIABLE")]) }.unwrap();
    assert_eq!(missing, NativeRet::Str(None));

    if let Ok(path) = std::env::var("PATH") {
        let found = unsafe { getenv.call(&[NativeArg::str("PATH")]) }.unwrap();
        assert_eq!(found.to_string_lossy(), Some(path));
    }
}

#[test]
fn test_variadic_call() {
    let snprintf = bind("int snprintf(char *buf, size_t n, const char *fmt, ...)");
    let mut buf = vec![0u8; 64];

    let written = unsafe {
        snprintf.call(&[
            NativeArg::Ptr(buf.as_mut_ptr().cast()),
            NativeArg::UInt(buf.len() as u64),
            NativeArg::str("%lld-%s-%.1f"),
            NativeArg::Int(42),
            NativeArg::str("x"),
            NativeArg::Float(1.5),
        ])
    }
    .unwrap();

    assert_eq!(written, NativeRet::Int(8));
    assert_eq!(&buf[..9], b"42-x-1.5\0");
}

#[test]
fn test_variadic_int_and_bool_promotion() {
    let snprintf = bind("int snprintf(char *buf, size_t n, const char *fmt, ...)");
    let mut buf = vec![0u8; 64];

    let written = unsafe {
        snprintf.call(&[
            NativeArg::Ptr(buf.as_mut_ptr().cast()),
            NativeArg::UInt(buf.len() as u64),
            NativeArg::str("%lld|%d|%lld"),
            NativeArg::Int(-7),
            NativeArg::Bool(true),
            NativeArg::Int(1 << 40),
        ])
    }
    .unwrap();

    let expected = b"-7|1|1099511627776\0";
    assert_eq!(written, NativeRet::Int(expected.len() as i64 - 1));
    assert_eq!(&buf[..expected.len()], expected);
}

#[test]
fn test_length_qualified_bytes_keep_embedded_nuls() {
    let memcmp = bind("int memcmp(const char *a, const char *b, size_t n)");
    let cmp = |a: &[u8], b: &[u8], n: usize| {
        let ret = unsafe { memcmp.call(&[NativeArg::Str(a), NativeArg::Str(b), NativeArg::UInt(n as u64)]) };
        ret.unwrap().as_i64().unwrap().signum()
    };

    // Bytes after the first NUL reach the native side intact
    assert_eq!(cmp(b"a\0b\0c", b"a\0b\0c", 5), 0);
    assert_eq!(cmp(b"a\0b\0c", b"a\0b\0d", 5), -1);
    assert_eq!(cmp(b"a\0b\0c", b"a\0b\0d", 4), 0);
    assert_eq!(cmp(b"\0\0x", b"\0\0w", 3), 1);
    assert_eq!(cmp(b"", b"", 0), 0);
}

#[test]
fn test_arity_is_checked() {
    let strlen = bind("size_t strlen(const char *s)");
    let err = unsafe { strlen.call(&[]) }.unwrap_err();
    assert!(matches!(err, CallError::Arity { expected: 1, found: 0, .. }));

    let snprintf = bind("int snprintf(char *buf, size_t n, const char *fmt, ...)");
    let err = unsafe { snprintf.call(&[NativeArg::Null]) }.unwrap_err();
    assert!(matches!(err, CallError::Arity { expected: 3, found: 1, .. }));
}

#[test]
fn test_argument_kinds_are_checked() {
    let abs = bind("int abs(int n)");
    let err = unsafe { abs.call(&[NativeArg::str("nope")]) }.unwrap_err();
    assert_eq!(
        err,
        CallError::ArgumentMismatch {
            symbol: "abs".to_string(),
            index: 0,
            expected: NativeType::I32,
            found: "string",
        }
    );
}

#[test]
fn test_bind_all_resolves_every_symbol() {
    let table = SymbolTable::from_prototypes(
        "libc",
        &[
            ("strlen", "size_t strlen(const char *s)"),
            ("abs", "int abs(int n)"),
            ("toupper", "int toupper(int c)"),
        ],
    )
    .unwrap();

    let bound = bind_all(&libc_handle(), &table).unwrap();
    assert_eq!(bound.len(), 3);
    assert!(bound.contains("abs"));
    assert_eq!(bound.by_index(2).unwrap().name(), "toupper");

    let toupper = bound.get("toupper").unwrap();
    let upper = unsafe { toupper.call(&[NativeArg::Int('a' as i64)]) }.unwrap();
    assert_eq!(upper, NativeRet::Int('A' as i64));
}

#[test]
fn test_bind_all_fails_on_missing_symbol() {
    let table = SymbolTable::from_prototypes(
        "broken",
        &[
            ("strlen", "size_t strlen(const char *s)"),
            ("ghost", "int ljbind_no_such_symbol_anywhere(int x)"),
            ("abs", "int abs(int n)"),
        ],
    )
    .unwrap();

    match bind_all(&libc_handle(), &table) {
        Err(BindError::SymbolNotFound { name }) => {
            assert_eq!(name, "ljbind_no_such_symbol_anywhere")
        }
        other => panic!("expected SymbolNotFound, got {other:?}"),
    }
}

#[test]
fn test_bind_optional_skips_missing_symbols() {
    let table = SymbolTable::from_prototypes(
        "mixed",
        &[
            ("strlen", "size_t strlen(const char *s)"),
            ("ghost", "int ljbind_no_such_symbol_anywhere(int x)"),
        ],
    )
    .unwrap();

    let (bound, missing) = bind_optional(&libc_handle(), &table);
    assert_eq!(bound.len(), 1);
    assert!(bound.contains("strlen"));
    assert_eq!(missing, vec!["ljbind_no_such_symbol_anywhere".to_string()]);
}

#[test]
fn test_bound_addresses_are_stable() {
    let a = bind("size_t strlen(const char *s)");
    let b = bind("size_t strlen(const char *s)");
    assert_eq!(a.address(), b.address());
    assert!(!a.address().is_null());
}

#[test]
fn test_merge_rejects_duplicates() {
    let table = SymbolTable::from_prototypes("a", &[("strlen", "size_t strlen(const char *s)")]).unwrap();
    let first = bind_all(&libc_handle(), &table).unwrap();
    let second = bind_all(&libc_handle(), &table).unwrap();
    assert!(first.merge(second).is_err());

    let other = SymbolTable::from_prototypes("b", &[("abs", "int abs(int n)")]).unwrap();
    let merged = bind_all(&libc_handle(), &table)
        .unwrap()
        .merge(bind_all(&libc_handle(), &other).unwrap())
        .unwrap();
    assert_eq!(merged.len(), 2);
    assert!(merged.get("abs").is_some());
}
