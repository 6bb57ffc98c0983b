//! `luaL_*` helpers and the standard library openers.

use crate::api::{Aux, Lib, OptionalLib};
use crate::consts::{MULTRET, Status};
use crate::error::LuaResult;
use crate::state::{Lua, copy_lstring, int};
use ljbind_core::{BoundFn, NativeArg};
use std::ffi::{c_int, c_void};

impl<'a> Lua<'a> {
    fn aux_int(&self, op: Aux, args: &[NativeArg<'_>]) -> LuaResult<c_int> {
        Ok(int(&self.aux_call(op, args)?))
    }

    fn aux_bool(&self, op: Aux, args: &[NativeArg<'_>]) -> LuaResult<bool> {
        Ok(self.aux_call(op, args)?.as_bool().unwrap_or(false))
    }

    /// Push field `event` of the metatable of the value at `obj`. False if
    /// there is no such field; nothing is pushed then.
    pub fn get_metafield(&self, obj: c_int, event: &str) -> LuaResult<bool> {
        self.aux_bool(Aux::GetMetafield, &[self.handle(), obj.into(), event.into()])
    }

    /// Call metamethod `event` of the value at `obj` with it as argument.
    /// False if there is no such metamethod.
    pub fn call_meta(&self, obj: c_int, event: &str) -> LuaResult<bool> {
        self.aux_bool(Aux::CallMeta, &[self.handle(), obj.into(), event.into()])
    }

    /// # Safety
    /// Raises a Lua error; see `Lua::call`.
    pub unsafe fn type_error(&self, narg: c_int, tname: &str) -> LuaResult<c_int> {
        self.aux_int(Aux::TypeError, &[self.handle(), narg.into(), tname.into()])
    }

    /// # Safety
    /// Raises a Lua error; see `Lua::call`.
    pub unsafe fn arg_error(&self, narg: c_int, extramsg: &str) -> LuaResult<c_int> {
        self.aux_int(Aux::ArgError, &[self.handle(), narg.into(), extramsg.into()])
    }

    /// # Safety
    /// Raises a Lua error if argument `narg` is not a string.
    pub unsafe fn check_bytes(&self, narg: c_int) -> LuaResult<Vec<u8>> {
        let mut len: usize = 0;
        let ret = self.aux_call(
            Aux::CheckLString,
            &[self.handle(), narg.into(), NativeArg::ptr(&mut len as *mut usize)],
        )?;
        // SAFETY: luaL_checklstring returns `len` bytes or does not return.
        Ok(unsafe { copy_lstring(&ret, len) }.unwrap_or_default())
    }

    /// # Safety
    /// Raises a Lua error if argument `narg` is neither absent nor a string.
    pub unsafe fn opt_bytes(&self, narg: c_int, default: &str) -> LuaResult<Vec<u8>> {
        let mut len: usize = 0;
        let ret = self.aux_call(
            Aux::OptLString,
            &[
                self.handle(),
                narg.into(),
                default.into(),
                NativeArg::ptr(&mut len as *mut usize),
            ],
        )?;
        // SAFETY: as for `check_bytes`.
        Ok(unsafe { copy_lstring(&ret, len) }.unwrap_or_default())
    }

    /// # Safety
    /// Raises a Lua error if argument `narg` is not a number.
    pub unsafe fn check_number(&self, narg: c_int) -> LuaResult<f64> {
        let ret = self.aux_call(Aux::CheckNumber, &[self.handle(), narg.into()])?;
        Ok(ret.as_f64().unwrap_or(0.0))
    }

    /// # Safety
    /// Raises a Lua error if argument `narg` is neither absent nor a number.
    pub unsafe fn opt_number(&self, narg: c_int, default: f64) -> LuaResult<f64> {
        let ret = self.aux_call(Aux::OptNumber, &[self.handle(), narg.into(), default.into()])?;
        Ok(ret.as_f64().unwrap_or(default))
    }

    /// # Safety
    /// Raises a Lua error if argument `narg` is not a number.
    pub unsafe fn check_integer(&self, narg: c_int) -> LuaResult<i64> {
        let ret = self.aux_call(Aux::CheckInteger, &[self.handle(), narg.into()])?;
        Ok(ret.as_i64().unwrap_or(0))
    }

    /// # Safety
    /// Raises a Lua error if argument `narg` is neither absent nor a number.
    pub unsafe fn opt_integer(&self, narg: c_int, default: i64) -> LuaResult<i64> {
        let ret = self.aux_call(Aux::OptInteger, &[self.handle(), narg.into(), default.into()])?;
        Ok(ret.as_i64().unwrap_or(default))
    }

    /// # Safety
    /// Raises a Lua error carrying `msg` if the stack cannot grow.
    pub unsafe fn ensure_stack(&self, extra: c_int, msg: &str) -> LuaResult<()> {
        self.aux_call(Aux::CheckStack, &[self.handle(), extra.into(), msg.into()])
            .map(|_| ())
    }

    /// # Safety
    /// Raises a Lua error if argument `narg` does not have type `tag`.
    pub unsafe fn check_type(&self, narg: c_int, tag: c_int) -> LuaResult<()> {
        self.aux_call(Aux::CheckType, &[self.handle(), narg.into(), tag.into()])
            .map(|_| ())
    }

    /// # Safety
    /// Raises a Lua error if argument `narg` is absent.
    pub unsafe fn check_any(&self, narg: c_int) -> LuaResult<()> {
        self.aux_call(Aux::CheckAny, &[self.handle(), narg.into()])
            .map(|_| ())
    }

    /// Create a metatable registered as `tname`, or push the existing one.
    /// True if it was created.
    pub fn new_metatable(&self, tname: &str) -> LuaResult<bool> {
        self.aux_bool(Aux::NewMetatable, &[self.handle(), tname.into()])
    }

    /// # Safety
    /// Raises a Lua error if argument `ud` is not a userdata of type `tname`.
    pub unsafe fn check_udata(&self, ud: c_int, tname: &str) -> LuaResult<*mut c_void> {
        let ret = self.aux_call(Aux::CheckUdata, &[self.handle(), ud.into(), tname.into()])?;
        Ok(ret.as_ptr().unwrap_or(std::ptr::null_mut()))
    }

    /// Push a `chunkname:currentline:` location string for level `lvl`.
    pub fn where_(&self, lvl: c_int) -> LuaResult<()> {
        self.aux_call(Aux::Where, &[self.handle(), lvl.into()]).map(|_| ())
    }

    /// Raise an error with `message`, prefixed by the current location.
    ///
    /// The message is passed as a `%s` argument, so format directives in it
    /// are not interpreted.
    ///
    /// # Safety
    /// Never returns normally; see `Lua::call`.
    pub unsafe fn raise_error(&self, message: &str) -> LuaResult<c_int> {
        self.aux_int(Aux::Error, &[self.handle(), "%s".into(), message.into()])
    }

    /// Compile `source` and push it as a function. On failure the message is
    /// pushed instead.
    pub fn load_string(&self, source: &str) -> LuaResult<Status> {
        let code = self.aux_int(Aux::LoadString, &[self.handle(), source.into()])?;
        Ok(Status::from_code(code))
    }

    /// Like `load_string` for a buffer that may hold bytecode or NULs.
    pub fn load_buffer(&self, chunk: &[u8], name: &str) -> LuaResult<Status> {
        let code = self.aux_int(
            Aux::LoadBuffer,
            &[
                self.handle(),
                NativeArg::Str(chunk),
                NativeArg::UInt(chunk.len() as u64),
                name.into(),
            ],
        )?;
        Ok(Status::from_code(code))
    }

    /// Load and run `source` in protected mode, leaving its results on the
    /// stack. On failure the error message is on top instead.
    pub fn exec(&self, source: &str) -> LuaResult<Status> {
        let status = self.load_string(source)?;
        if !status.is_ok() {
            return Ok(status);
        }
        self.pcall(0, MULTRET, 0)
    }

    /// Pop the top value and store it in table `t`, returning a reference.
    pub fn reference(&self, t: c_int) -> LuaResult<c_int> {
        self.aux_int(Aux::Ref, &[self.handle(), t.into()])
    }

    pub fn unreference(&self, t: c_int, reference: c_int) -> LuaResult<()> {
        self.aux_call(Aux::Unref, &[self.handle(), t.into(), reference.into()])
            .map(|_| ())
    }

    // Standard libraries

    /// Open every standard library with `luaL_openlibs`.
    pub fn open_libs(&self) -> LuaResult<()> {
        // SAFETY: `raw` is a live state; the prototype matches lualib.h.
        unsafe { self.api.lib(Lib::OpenLibs).call(&[self.handle()]) }?;
        Ok(())
    }

    /// Open one standard library.
    ///
    /// Openers are called through the VM with their module name, as lualib.h
    /// requires, rather than invoked directly.
    pub fn open_lib(&self, lib: Lib) -> LuaResult<Status> {
        if lib == Lib::OpenLibs {
            self.open_libs()?;
            return Ok(Status::Ok);
        }
        self.run_opener(self.api.lib(lib), lib.module_name())
    }

    /// Open `string.buffer`; `None` when this build does not export it.
    pub fn open_string_buffer(&self) -> LuaResult<Option<Status>> {
        match self.api.optional(OptionalLib::StringBuffer) {
            Some(opener) => Ok(Some(self.run_opener(opener, "string.buffer")?)),
            None => Ok(None),
        }
    }

    fn run_opener(&self, opener: &BoundFn, name: &str) -> LuaResult<Status> {
        // SAFETY: openers are `lua_CFunction`s exported by the library, which
        // stays mapped for the process lifetime.
        unsafe { self.push_cclosure(opener.address(), 0) }?;
        self.push_string(name)?;
        self.pcall(1, 0, 0)
    }
}

