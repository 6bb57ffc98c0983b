//! Host closures as Lua C functions.
//!
//! A closure becomes a `lua_CFunction` through a trampoline with the
//! signature `int (lua_State *)`. The trampoline is pinned in the root
//! state's arena, which is released only after `lua_close`, so the VM can
//! never call a freed pointer.
//!
//! Closures receive a `Lua` view of the calling thread and return the number
//! of results they pushed. A returned `Err` is reported to Lua the
//! conventional way, as `nil, message`, instead of raising an error through
//! host frames.

use crate::api::Aux;
use crate::error::{LuaError, LuaResult};
use crate::state::Lua;
use ljbind_core::{NativeArg, NativeRet, NativeSignature, NativeType, make_trampoline};
use std::ffi::{CString, c_char, c_int, c_void};
use std::rc::Rc;
use std::sync::Arc;
use tracing::error;

/// A host function callable from Lua.
pub type HostFunction = dyn Fn(&Lua<'_>) -> LuaResult<c_int> + 'static;

/// One entry of a library registered with `Lua::register`.
pub struct LuaReg {
    name: String,
    func: Box<HostFunction>,
}

impl LuaReg {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Lua<'_>) -> LuaResult<c_int> + 'static,
    {
        LuaReg {
            name: name.into(),
            func: Box::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for LuaReg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LuaReg").field("name", &self.name).finish()
    }
}

/// `luaL_Reg` as laid out in lauxlib.h.
#[repr(C)]
struct RawReg {
    name: *const c_char,
    func: *const c_void,
}

/// The signature of every `lua_CFunction`.
pub fn cfunction_signature() -> NativeSignature {
    NativeSignature::new(vec![NativeType::Handle], NativeType::I32)
}

impl<'a> Lua<'a> {
    /// Turn `func` into a `lua_CFunction` pinned for the life of the root
    /// state, and return its address.
    pub fn create_cfunction<F>(&self, func: F) -> LuaResult<*const c_void>
    where
        F: Fn(&Lua<'_>) -> LuaResult<c_int> + 'static,
    {
        let api = Arc::clone(self.api);
        let arena = Rc::downgrade(self.arena);

        let trampoline = make_trampoline(cfunction_signature(), move |args| {
            let Some(raw) = args.handle(0) else {
                return NativeRet::Int(0);
            };
            let Some(arena) = arena.upgrade() else {
                error!(state = ?raw, "host closure called after its state was dropped");
                return NativeRet::Int(0);
            };
            let lua = Lua {
                api: &api,
                raw,
                arena: &arena,
            };
            match func(&lua) {
                Ok(nresults) => NativeRet::Int(nresults as i64),
                Err(err) => NativeRet::Int(lua.report_error(&err) as i64),
            }
        })?;

        Ok(self.arena.pin(trampoline))
    }

    /// Push `func` as a C closure, taking `n_upvalues` values from the stack
    /// as its upvalues (reachable through `upvalue_index`).
    pub fn push_closure<F>(&self, func: F, n_upvalues: c_int) -> LuaResult<()>
    where
        F: Fn(&Lua<'_>) -> LuaResult<c_int> + 'static,
    {
        let code = self.create_cfunction(func)?;
        // SAFETY: `code` is a pinned `int (lua_State *)` trampoline.
        unsafe { self.push_cclosure(code, n_upvalues) }
    }

    pub fn push_function<F>(&self, func: F) -> LuaResult<()>
    where
        F: Fn(&Lua<'_>) -> LuaResult<c_int> + 'static,
    {
        self.push_closure(func, 0)
    }

    /// Register `funcs` with `luaL_register`.
    ///
    /// With a library name, the functions go into the global table of that
    /// name (created if needed), which is left on the stack. Without one,
    /// they go into the table on top of the stack.
    pub fn register(&self, libname: Option<&str>, funcs: Vec<LuaReg>) -> LuaResult<()> {
        let mut names = Vec::with_capacity(funcs.len());
        let mut entries = Vec::with_capacity(funcs.len() + 1);

        for reg in funcs {
            let name = CString::new(reg.name).map_err(|_| LuaError::InteriorNul { what: "function" })?;
            let func = reg.func;
            let code = self.create_cfunction(move |lua| func(lua))?;
            entries.push(RawReg {
                name: name.as_ptr(),
                func: code,
            });
            // The CString's heap buffer does not move with it
            names.push(name);
        }
        entries.push(RawReg {
            name: std::ptr::null(),
            func: std::ptr::null(),
        });

        let libname = match libname {
            Some(name) => NativeArg::str(name),
            None => NativeArg::Null,
        };
        // SAFETY: `entries` is NUL-terminated and, with `names`, outlives the
        // call; luaL_register copies what it keeps.
        unsafe {
            self.api
                .aux(Aux::Register)
                .call(&[self.handle(), libname, NativeArg::ptr(entries.as_ptr())])
        }?;
        drop(names);
        Ok(())
    }

    /// Push `nil, message` and return the result count.
    fn report_error(&self, err: &LuaError) -> c_int {
        let pushed = self
            .push_nil()
            .and_then(|_| self.push_string(&err.to_string()));
        match pushed {
            Ok(()) => 2,
            Err(push_err) => {
                error!(error = %err, cause = %push_err, "could not report host closure error");
                0
            }
        }
    }
}
