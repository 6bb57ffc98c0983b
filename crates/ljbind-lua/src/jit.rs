//! JIT compiler control and the sampling profiler.

use crate::api::Jit;
use crate::consts::{JitFlag, JitMode};
use crate::error::LuaResult;
use crate::state::{Lua, copy_lstring};
use ljbind_core::{NativeArg, NativeRet, NativeSignature, NativeType, make_trampoline};
use std::ffi::c_int;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, error};

/// One profiler callback invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProfileSample {
    /// Samples taken since the previous callback.
    pub samples: c_int,
    /// VM state at sampling time: `N`ative, `I`nterpreted, `C` function,
    /// `G`arbage collector or `J`IT compiler.
    pub vmstate: char,
}

/// `void (void *data, lua_State *L, int samples, int vmstate)`
pub fn profile_callback_signature() -> NativeSignature {
    NativeSignature::new(
        vec![NativeType::Pointer, NativeType::Handle, NativeType::I32, NativeType::I32],
        NativeType::Void,
    )
}

impl<'a> Lua<'a> {
    /// Set a JIT mode for the whole engine (`idx` 0) or for the function at
    /// stack index `idx`. False if the mode is not supported.
    pub fn jit_set_mode(&self, idx: c_int, mode: JitMode, flag: JitFlag) -> LuaResult<bool> {
        // SAFETY: prototype matches luajit.h; `raw` is live.
        let ret = unsafe {
            self.api
                .jit(Jit::SetMode)
                .call(&[self.handle(), idx.into(), mode.with(flag).into()])
        }?;
        Ok(ret.as_bool().unwrap_or(false))
    }

    /// Start the sampling profiler with a mode string such as `"fl"` or
    /// `"i10"`.
    ///
    /// The callback runs on this VM's thread at safe points. Its trampoline
    /// stays pinned until the root state closes, since the profiler may hold
    /// the pointer until it is stopped.
    pub fn profile_start<F>(&self, mode: &str, callback: F) -> LuaResult<()>
    where
        F: Fn(&Lua<'_>, ProfileSample) + 'static,
    {
        let api = Arc::clone(self.api);
        let arena = Rc::downgrade(self.arena);

        let trampoline = make_trampoline(profile_callback_signature(), move |args| {
            let (Some(raw), Some(arena)) = (args.handle(1), arena.upgrade()) else {
                error!("profiler callback without a live state");
                return NativeRet::Void;
            };
            let sample = ProfileSample {
                samples: args.int(2).unwrap_or(0) as c_int,
                vmstate: char::from(args.int(3).unwrap_or(0) as u8),
            };
            let lua = Lua {
                api: &api,
                raw,
                arena: &arena,
            };
            callback(&lua, sample);
            NativeRet::Void
        })?;
        let code = self.arena.pin(trampoline);

        // SAFETY: `code` matches luaJIT_profile_callback and stays pinned.
        unsafe {
            self.api.jit(Jit::ProfileStart).call(&[
                self.handle(),
                mode.into(),
                NativeArg::ptr(code),
                NativeArg::Null,
            ])
        }?;
        debug!(mode, "started profiler");
        Ok(())
    }

    pub fn profile_stop(&self) -> LuaResult<()> {
        // SAFETY: prototype matches luajit.h; `raw` is live.
        unsafe { self.api.jit(Jit::ProfileStop).call(&[self.handle()]) }?;
        Ok(())
    }

    /// Dump the current stack using `fmt` (see the LuaJIT profiler docs).
    /// A negative `depth` dumps in reverse order.
    pub fn profile_dump_stack(&self, fmt: &str, depth: c_int) -> LuaResult<Vec<u8>> {
        let mut len: usize = 0;
        // SAFETY: prototype matches luajit.h; `len` outlives the call.
        let ret = unsafe {
            self.api.jit(Jit::ProfileDumpStack).call(&[
                self.handle(),
                fmt.into(),
                depth.into(),
                NativeArg::ptr(&mut len as *mut usize),
            ])
        }?;
        // SAFETY: the returned buffer holds `len` bytes until the next dump.
        Ok(unsafe { copy_lstring(&ret, len) }.unwrap_or_default())
    }
}
