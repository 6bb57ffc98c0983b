//! `lua_*` stack operations and the macros of `lua.h`.

use crate::api::Core;
use crate::consts::{GC_COUNT, GLOBALS_INDEX, REGISTRY_INDEX, Status, TBOOLEAN, TFUNCTION};
use crate::consts::{TLIGHTUSERDATA, TNIL, TNONE, TTABLE, TTHREAD};
use crate::error::LuaResult;
use crate::state::{Lua, copy_lstring};
use ljbind_core::NativeArg;
use std::ffi::{c_int, c_void};

impl<'a> Lua<'a> {
    // Basic stack manipulation

    pub fn get_top(&self) -> LuaResult<c_int> {
        self.core_int(Core::GetTop, &[self.handle()])
    }

    pub fn set_top(&self, idx: c_int) -> LuaResult<()> {
        self.core_unit(Core::SetTop, &[self.handle(), idx.into()])
    }

    pub fn push_value(&self, idx: c_int) -> LuaResult<()> {
        self.core_unit(Core::PushValue, &[self.handle(), idx.into()])
    }

    pub fn remove(&self, idx: c_int) -> LuaResult<()> {
        self.core_unit(Core::Remove, &[self.handle(), idx.into()])
    }

    pub fn insert(&self, idx: c_int) -> LuaResult<()> {
        self.core_unit(Core::Insert, &[self.handle(), idx.into()])
    }

    pub fn replace(&self, idx: c_int) -> LuaResult<()> {
        self.core_unit(Core::Replace, &[self.handle(), idx.into()])
    }

    /// Grow the stack to hold `extra` more slots; false if it cannot.
    pub fn check_stack(&self, extra: c_int) -> LuaResult<bool> {
        self.core_bool(Core::CheckStack, &[self.handle(), extra.into()])
    }

    /// Move the top `n` values of this stack onto `to`, another thread of
    /// the same root state.
    pub fn xmove(&self, to: &Lua<'_>, n: c_int) -> LuaResult<()> {
        self.core_unit(Core::XMove, &[self.handle(), to.handle(), n.into()])
    }

    // Access functions

    pub fn is_number(&self, idx: c_int) -> LuaResult<bool> {
        self.core_bool(Core::IsNumber, &[self.handle(), idx.into()])
    }

    pub fn is_string(&self, idx: c_int) -> LuaResult<bool> {
        self.core_bool(Core::IsString, &[self.handle(), idx.into()])
    }

    pub fn is_cfunction(&self, idx: c_int) -> LuaResult<bool> {
        self.core_bool(Core::IsCFunction, &[self.handle(), idx.into()])
    }

    pub fn is_userdata(&self, idx: c_int) -> LuaResult<bool> {
        self.core_bool(Core::IsUserdata, &[self.handle(), idx.into()])
    }

    /// Type tag of the value at `idx` (`TNONE` for an invalid index).
    pub fn type_of(&self, idx: c_int) -> LuaResult<c_int> {
        self.core_int(Core::Type, &[self.handle(), idx.into()])
    }

    pub fn type_name(&self, tag: c_int) -> LuaResult<String> {
        let ret = self.core_call(Core::TypeName, &[self.handle(), tag.into()])?;
        Ok(ret.to_string_lossy().unwrap_or_default())
    }

    pub fn equal(&self, a: c_int, b: c_int) -> LuaResult<bool> {
        self.core_bool(Core::Equal, &[self.handle(), a.into(), b.into()])
    }

    pub fn raw_equal(&self, a: c_int, b: c_int) -> LuaResult<bool> {
        self.core_bool(Core::RawEqual, &[self.handle(), a.into(), b.into()])
    }

    pub fn less_than(&self, a: c_int, b: c_int) -> LuaResult<bool> {
        self.core_bool(Core::LessThan, &[self.handle(), a.into(), b.into()])
    }

    pub fn to_number(&self, idx: c_int) -> LuaResult<f64> {
        let ret = self.core_call(Core::ToNumber, &[self.handle(), idx.into()])?;
        Ok(ret.as_f64().unwrap_or(0.0))
    }

    pub fn to_integer(&self, idx: c_int) -> LuaResult<i64> {
        let ret = self.core_call(Core::ToInteger, &[self.handle(), idx.into()])?;
        Ok(ret.as_i64().unwrap_or(0))
    }

    pub fn to_boolean(&self, idx: c_int) -> LuaResult<bool> {
        self.core_bool(Core::ToBoolean, &[self.handle(), idx.into()])
    }

    /// Copy of the string (or number, converted in place) at `idx`.
    ///
    /// The length comes from the VM, so embedded NUL bytes survive.
    pub fn to_bytes(&self, idx: c_int) -> LuaResult<Option<Vec<u8>>> {
        let mut len: usize = 0;
        let ret = self.core_call(
            Core::ToLString,
            &[self.handle(), idx.into(), NativeArg::ptr(&mut len as *mut usize)],
        )?;
        // SAFETY: lua_tolstring returns null or `len` bytes owned by the VM.
        Ok(unsafe { copy_lstring(&ret, len) })
    }

    pub fn to_string_lossy(&self, idx: c_int) -> LuaResult<Option<String>> {
        Ok(self
            .to_bytes(idx)?
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }

    pub fn obj_len(&self, idx: c_int) -> LuaResult<usize> {
        let ret = self.core_call(Core::ObjLen, &[self.handle(), idx.into()])?;
        Ok(ret.as_u64().unwrap_or(0) as usize)
    }

    pub fn to_userdata(&self, idx: c_int) -> LuaResult<*mut c_void> {
        self.core_ptr(Core::ToUserdata, &[self.handle(), idx.into()])
    }

    pub fn to_thread(&self, idx: c_int) -> LuaResult<*mut c_void> {
        self.core_ptr(Core::ToThread, &[self.handle(), idx.into()])
    }

    pub fn to_pointer(&self, idx: c_int) -> LuaResult<*const c_void> {
        Ok(self.core_ptr(Core::ToPointer, &[self.handle(), idx.into()])? as *const c_void)
    }

    pub fn to_cfunction(&self, idx: c_int) -> LuaResult<*const c_void> {
        Ok(self.core_ptr(Core::ToCFunction, &[self.handle(), idx.into()])? as *const c_void)
    }

    // Push functions

    pub fn push_nil(&self) -> LuaResult<()> {
        self.core_unit(Core::PushNil, &[self.handle()])
    }

    pub fn push_number(&self, n: f64) -> LuaResult<()> {
        self.core_unit(Core::PushNumber, &[self.handle(), NativeArg::Float(n)])
    }

    pub fn push_integer(&self, n: i64) -> LuaResult<()> {
        self.core_unit(Core::PushInteger, &[self.handle(), NativeArg::Int(n)])
    }

    /// Push a copy of `bytes`, embedded NULs included.
    pub fn push_bytes(&self, bytes: &[u8]) -> LuaResult<()> {
        self.core_unit(
            Core::PushLString,
            &[self.handle(), NativeArg::Str(bytes), NativeArg::UInt(bytes.len() as u64)],
        )
    }

    /// Push `s` through `lua_pushstring`, which stops at the first NUL.
    pub fn push_string(&self, s: &str) -> LuaResult<()> {
        self.core_unit(Core::PushString, &[self.handle(), NativeArg::str(s)])
    }

    pub fn push_boolean(&self, b: bool) -> LuaResult<()> {
        self.core_unit(Core::PushBoolean, &[self.handle(), NativeArg::Bool(b)])
    }

    pub fn push_light_userdata(&self, p: *mut c_void) -> LuaResult<()> {
        self.core_unit(Core::PushLightUserdata, &[self.handle(), NativeArg::Ptr(p)])
    }

    /// Push this thread; true if it is the main thread.
    pub fn push_thread(&self) -> LuaResult<bool> {
        self.core_bool(Core::PushThread, &[self.handle()])
    }

    /// Push a native C function with `n` upvalues taken from the stack.
    ///
    /// # Safety
    /// `f` must be a valid `lua_CFunction` that stays callable for as long
    /// as the VM can reach it.
    pub unsafe fn push_cclosure(&self, f: *const c_void, n: c_int) -> LuaResult<()> {
        self.core_unit(
            Core::PushCClosure,
            &[self.handle(), NativeArg::ptr(f), n.into()],
        )
    }

    // Get functions

    pub fn get_table(&self, idx: c_int) -> LuaResult<()> {
        self.core_unit(Core::GetTable, &[self.handle(), idx.into()])
    }

    pub fn get_field(&self, idx: c_int, key: &str) -> LuaResult<()> {
        self.core_unit(Core::GetField, &[self.handle(), idx.into(), NativeArg::str(key)])
    }

    pub fn raw_get(&self, idx: c_int) -> LuaResult<()> {
        self.core_unit(Core::RawGet, &[self.handle(), idx.into()])
    }

    pub fn raw_geti(&self, idx: c_int, n: c_int) -> LuaResult<()> {
        self.core_unit(Core::RawGetI, &[self.handle(), idx.into(), n.into()])
    }

    pub fn create_table(&self, narr: c_int, nrec: c_int) -> LuaResult<()> {
        self.core_unit(Core::CreateTable, &[self.handle(), narr.into(), nrec.into()])
    }

    /// Allocate a full userdata block of `size` bytes and push it.
    pub fn new_userdata(&self, size: usize) -> LuaResult<*mut c_void> {
        self.core_ptr(
            Core::NewUserdata,
            &[self.handle(), NativeArg::UInt(size as u64)],
        )
    }

    /// Push the metatable of the value at `idx`; false (nothing pushed) if
    /// it has none.
    pub fn get_metatable(&self, idx: c_int) -> LuaResult<bool> {
        self.core_bool(Core::GetMetatable, &[self.handle(), idx.into()])
    }

    pub fn get_fenv(&self, idx: c_int) -> LuaResult<()> {
        self.core_unit(Core::GetFenv, &[self.handle(), idx.into()])
    }

    // Set functions

    pub fn set_table(&self, idx: c_int) -> LuaResult<()> {
        self.core_unit(Core::SetTable, &[self.handle(), idx.into()])
    }

    pub fn set_field(&self, idx: c_int, key: &str) -> LuaResult<()> {
        self.core_unit(Core::SetField, &[self.handle(), idx.into(), NativeArg::str(key)])
    }

    pub fn raw_set(&self, idx: c_int) -> LuaResult<()> {
        self.core_unit(Core::RawSet, &[self.handle(), idx.into()])
    }

    pub fn raw_seti(&self, idx: c_int, n: c_int) -> LuaResult<()> {
        self.core_unit(Core::RawSetI, &[self.handle(), idx.into(), n.into()])
    }

    pub fn set_metatable(&self, idx: c_int) -> LuaResult<c_int> {
        self.core_int(Core::SetMetatable, &[self.handle(), idx.into()])
    }

    pub fn set_fenv(&self, idx: c_int) -> LuaResult<bool> {
        self.core_bool(Core::SetFenv, &[self.handle(), idx.into()])
    }

    // Load and call

    /// Unprotected call.
    ///
    /// # Safety
    /// An error inside the callee unwinds through every native frame up to
    /// the nearest protected call, or ends the process through the panic
    /// handler if there is none. Prefer `pcall`.
    pub unsafe fn call(&self, nargs: c_int, nresults: c_int) -> LuaResult<()> {
        self.core_unit(Core::Call, &[self.handle(), nargs.into(), nresults.into()])
    }

    /// Protected call. The status is returned as-is; on error the message
    /// (or the error handler's result) is on top of the stack.
    pub fn pcall(&self, nargs: c_int, nresults: c_int, errfunc: c_int) -> LuaResult<Status> {
        let code = self.core_int(
            Core::PCall,
            &[self.handle(), nargs.into(), nresults.into(), errfunc.into()],
        )?;
        Ok(Status::from_code(code))
    }

    // Coroutines

    /// Yield `nresults` values. Only meaningful as the return value of a
    /// host closure: `return lua.yield_values(n)`.
    pub fn yield_values(&self, nresults: c_int) -> LuaResult<c_int> {
        self.core_int(Core::Yield, &[self.handle(), nresults.into()])
    }

    pub fn resume(&self, nargs: c_int) -> LuaResult<Status> {
        Ok(Status::from_code(
            self.core_int(Core::Resume, &[self.handle(), nargs.into()])?,
        ))
    }

    pub fn status(&self) -> LuaResult<Status> {
        Ok(Status::from_code(self.core_int(Core::Status, &[self.handle()])?))
    }

    // Garbage collection

    pub fn gc(&self, what: c_int, data: c_int) -> LuaResult<c_int> {
        self.core_int(Core::Gc, &[self.handle(), what.into(), data.into()])
    }

    // Miscellaneous

    /// Raise the value on top of the stack as an error.
    ///
    /// # Safety
    /// Never returns normally; see `call`.
    pub unsafe fn error(&self) -> LuaResult<c_int> {
        self.core_int(Core::Error, &[self.handle()])
    }

    /// Pop a key and push the next key/value pair of the table at `idx`.
    /// False once the traversal is done.
    pub fn next(&self, idx: c_int) -> LuaResult<bool> {
        Ok(self.core_int(Core::Next, &[self.handle(), idx.into()])? != 0)
    }

    pub fn concat(&self, n: c_int) -> LuaResult<()> {
        self.core_unit(Core::Concat, &[self.handle(), n.into()])
    }

    // Macros from lua.h

    pub fn pop(&self, n: c_int) -> LuaResult<()> {
        self.set_top(-n - 1)
    }

    pub fn new_table(&self) -> LuaResult<()> {
        self.create_table(0, 0)
    }

    /// Pop a value and store it as global `name`.
    pub fn set_global(&self, name: &str) -> LuaResult<()> {
        self.set_field(GLOBALS_INDEX, name)
    }

    pub fn get_global(&self, name: &str) -> LuaResult<()> {
        self.get_field(GLOBALS_INDEX, name)
    }

    pub fn get_registry(&self) -> LuaResult<()> {
        self.push_value(REGISTRY_INDEX)
    }

    pub fn str_len(&self, idx: c_int) -> LuaResult<usize> {
        self.obj_len(idx)
    }

    pub fn is_function(&self, idx: c_int) -> LuaResult<bool> {
        Ok(self.type_of(idx)? == TFUNCTION)
    }

    pub fn is_table(&self, idx: c_int) -> LuaResult<bool> {
        Ok(self.type_of(idx)? == TTABLE)
    }

    pub fn is_light_userdata(&self, idx: c_int) -> LuaResult<bool> {
        Ok(self.type_of(idx)? == TLIGHTUSERDATA)
    }

    pub fn is_nil(&self, idx: c_int) -> LuaResult<bool> {
        Ok(self.type_of(idx)? == TNIL)
    }

    pub fn is_boolean(&self, idx: c_int) -> LuaResult<bool> {
        Ok(self.type_of(idx)? == TBOOLEAN)
    }

    pub fn is_thread(&self, idx: c_int) -> LuaResult<bool> {
        Ok(self.type_of(idx)? == TTHREAD)
    }

    pub fn is_none(&self, idx: c_int) -> LuaResult<bool> {
        Ok(self.type_of(idx)? == TNONE)
    }

    pub fn is_none_or_nil(&self, idx: c_int) -> LuaResult<bool> {
        Ok(self.type_of(idx)? <= TNIL)
    }

    /// Memory in use by the VM, in kilobytes.
    pub fn gc_count(&self) -> LuaResult<c_int> {
        self.gc(GC_COUNT, 0)
    }

    /// Type name of the value at `idx`.
    pub fn type_name_of(&self, idx: c_int) -> LuaResult<String> {
        let tag = self.type_of(idx)?;
        self.type_name(tag)
    }

    /// Push the metatable registered under `name` with `new_metatable`.
    pub fn get_metatable_for(&self, name: &str) -> LuaResult<()> {
        self.get_field(REGISTRY_INDEX, name)
    }
}
