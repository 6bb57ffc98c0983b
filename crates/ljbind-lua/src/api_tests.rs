//! Tests for the LuaJIT symbol tables. None of these need the library.

use super::api::*;
use super::callback::cfunction_signature;
use super::jit::profile_callback_signature;
use ljbind_core::{NativeType, SymbolTable};
use std::collections::HashSet;

#[test]
fn test_every_table_parses() {
    let tables = required_tables().unwrap();
    assert_eq!(tables.len(), 4);
    assert!(OptionalLib::symbol_table().is_ok());
}

#[test]
fn test_operation_index_matches_table_order() {
    let core = Core::symbol_table().unwrap();
    for op in Core::ALL {
        let desc = core.iter().nth(op.index()).unwrap();
        assert_eq!(desc.logical_name, op.logical_name());
    }
    assert_eq!(Core::ALL.len(), core.len());
    assert_eq!(Aux::ALL.len(), Aux::symbol_table().unwrap().len());
    assert_eq!(Lib::ALL.len(), Lib::symbol_table().unwrap().len());
    assert_eq!(Jit::ALL.len(), Jit::symbol_table().unwrap().len());
}

#[test]
fn test_native_symbols_use_api_prefixes() {
    let check = |table: SymbolTable, prefixes: &[&str]| {
        for desc in &table {
            assert!(
                prefixes.iter().any(|p| desc.native_symbol.starts_with(p)),
                "{} in {}",
                desc.native_symbol,
                table.name()
            );
        }
    };
    check(Core::symbol_table().unwrap(), &["lua_"]);
    check(Aux::symbol_table().unwrap(), &["luaL_"]);
    check(Lib::symbol_table().unwrap(), &["luaopen_", "luaL_openlibs"]);
    check(Jit::symbol_table().unwrap(), &["luaJIT_"]);
}

#[test]
fn test_native_symbols_are_unique_across_tables() {
    let mut seen = HashSet::new();
    for table in required_tables().unwrap() {
        for desc in &table {
            assert!(seen.insert(desc.native_symbol.clone()), "{}", desc.native_symbol);
        }
    }
}

#[test]
fn test_state_first_signatures() {
    // Everything but luaL_newstate takes the state first
    for table in required_tables().unwrap() {
        for desc in &table {
            if desc.native_symbol == "luaL_newstate" {
                assert!(desc.signature.params.is_empty());
                assert_eq!(desc.signature.ret, NativeType::Handle);
                continue;
            }
            assert_eq!(
                desc.signature.params.first(),
                Some(&NativeType::Handle),
                "{}",
                desc.native_symbol
            );
        }
    }
}

#[test]
fn test_truth_values_are_declared_bool() {
    let core = Core::symbol_table().unwrap();
    for name in ["isnumber", "isstring", "toboolean", "equal", "lessthan", "checkstack"] {
        assert_eq!(core.get(name).unwrap().signature.ret, NativeType::Bool, "{name}");
    }
    assert_eq!(Jit::SetMode.prototype().split_whitespace().next(), Some("bool"));
}

#[test]
fn test_length_qualified_strings_return_pointers() {
    let core = Core::symbol_table().unwrap();
    let tolstring = core.get("tolstring").unwrap();
    assert_eq!(tolstring.signature.ret, NativeType::Pointer);
    assert_eq!(
        tolstring.signature.params,
        vec![NativeType::Handle, NativeType::I32, NativeType::Pointer]
    );

    let pushlstring = core.get("pushlstring").unwrap();
    assert_eq!(
        pushlstring.signature.params,
        vec![NativeType::Handle, NativeType::CStr, NativeType::USize]
    );
}

#[test]
fn test_only_lual_error_is_variadic() {
    for table in required_tables().unwrap() {
        for desc in &table {
            assert_eq!(desc.signature.variadic, desc.native_symbol == "luaL_error");
        }
    }
}

#[test]
fn test_lib_module_names() {
    assert_eq!(Lib::Base.module_name(), "");
    assert_eq!(Lib::Package.module_name(), "package");
    assert_eq!(Lib::Ffi.module_name(), "ffi");
}

#[test]
fn test_callback_signatures() {
    let cf = cfunction_signature();
    assert_eq!(cf.params, vec![NativeType::Handle]);
    assert_eq!(cf.ret, NativeType::I32);

    let profile = profile_callback_signature();
    assert_eq!(profile.params.len(), 4);
    assert_eq!(profile.params[1], NativeType::Handle);
    assert_eq!(profile.ret, NativeType::Void);
}
