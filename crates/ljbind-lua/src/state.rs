//! VM state handles.
//!
//! `State` owns a root `lua_State` and closes it exactly once: either through
//! `close(self)` or on drop. Everything derived from it borrows it, so no
//! handle can outlive the close:
//!
//! - `Thread<'s>` is a coroutine anchored in the root's registry
//! - `Lua<'a>` is the view the stack operations live on, handed out by
//!   `State::lua`, `Thread::lua` and to host closures for one call
//!
//! None of these are `Send`: a VM state belongs to one thread at a time.
//!
//! # Contract
//!
//! Stack operations are thin wrappers over the C API and inherit its rules.
//! Indices are not validated, and an error raised by the VM while a host
//! closure is on the native stack aborts the process. Operations that raise
//! errors by design are `unsafe`.

use crate::api::{Aux, Core};
use crate::bindings::Api;
use crate::consts::{REF_NIL, REGISTRY_INDEX, Status};
use crate::error::{LuaError, LuaResult};
use ljbind_core::{NativeArg, NativeRet, TrampolineArena};
use std::ffi::{c_int, c_void};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, warn};

/// A root VM state.
pub struct State {
    api: Arc<Api>,
    raw: *mut c_void,
    arena: Rc<TrampolineArena>,
    closed: bool,
}

impl State {
    /// Create a fresh state with `luaL_newstate`. No libraries are opened.
    pub fn open(api: Arc<Api>) -> LuaResult<State> {
        // SAFETY: `luaL_newstate` takes no arguments.
        let ret = unsafe { api.aux(Aux::NewState).call(&[]) }?;
        let raw = ret.as_ptr().unwrap_or(std::ptr::null_mut());
        if raw.is_null() {
            return Err(LuaError::StateCreation);
        }
        debug!(state = ?raw, "opened Lua state");
        Ok(State {
            api,
            raw,
            arena: Rc::new(TrampolineArena::new()),
            closed: false,
        })
    }

    /// Open a state on the process-wide API.
    pub fn open_global() -> LuaResult<State> {
        State::open(Api::global()?)
    }

    pub fn lua(&self) -> Lua<'_> {
        Lua {
            api: &self.api,
            raw: self.raw,
            arena: &self.arena,
        }
    }

    pub fn api(&self) -> &Arc<Api> {
        &self.api
    }

    /// The raw `lua_State *`, valid until the state is closed.
    pub fn as_ptr(&self) -> *mut c_void {
        self.raw
    }

    /// Number of host closures kept alive for this state.
    pub fn pinned_closures(&self) -> usize {
        self.arena.len()
    }

    /// Create a coroutine sharing this state's globals.
    ///
    /// The thread is anchored in the registry so the collector keeps it
    /// alive, and unanchored when the handle drops.
    pub fn new_thread(&self) -> LuaResult<Thread<'_>> {
        let lua = self.lua();
        let raw = lua.core_ptr(Core::NewThread, &[lua.handle()])?;
        let reference = lua.reference(REGISTRY_INDEX)?;
        if reference == REF_NIL || raw.is_null() {
            return Err(LuaError::ThreadAnchor);
        }
        Ok(Thread {
            state: self,
            raw,
            reference,
        })
    }

    /// Close the state.
    ///
    /// Host closures given to the VM are freed only after `lua_close`
    /// returns, since finalizers run during the close may still call them.
    ///
    /// Views borrowed from the state cannot outlive it:
    ///
    /// ```compile_fail
    /// # fn demo(state: ljbind_lua::State) -> ljbind_lua::LuaResult<()> {
    /// let lua = state.lua();
    /// state.close()?;
    /// lua.get_top()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn close(mut self) -> LuaResult<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> LuaResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        // SAFETY: `raw` is live and nothing can borrow it past this point.
        let result = unsafe {
            self.api
                .core(Core::Close)
                .call(&[NativeArg::Ptr(self.raw)])
        };
        let pinned = self.arena.len();
        // SAFETY: the VM is gone, so none of the pinned pointers is reachable.
        unsafe { self.arena.release_all() };
        debug!(state = ?self.raw, released = pinned, "closed Lua state");

        result.map(|_| ()).map_err(LuaError::from)
    }
}

impl Drop for State {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            warn!(error = %err, "failed to close Lua state");
        }
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("raw", &self.raw)
            .field("pinned_closures", &self.arena.len())
            .finish()
    }
}

/// A coroutine of a root state.
pub struct Thread<'s> {
    state: &'s State,
    raw: *mut c_void,
    reference: c_int,
}

impl<'s> Thread<'s> {
    pub fn lua(&self) -> Lua<'_> {
        Lua {
            api: &self.state.api,
            raw: self.raw,
            arena: &self.state.arena,
        }
    }

    pub fn as_ptr(&self) -> *mut c_void {
        self.raw
    }

    /// Registry reference anchoring this thread.
    pub fn reference(&self) -> c_int {
        self.reference
    }

    /// Start or continue the coroutine with `nargs` arguments on its stack.
    pub fn resume(&self, nargs: c_int) -> LuaResult<Status> {
        self.lua().resume(nargs)
    }
}

impl Drop for Thread<'_> {
    fn drop(&mut self) {
        let root = self.state.lua();
        if let Err(err) = root.unreference(REGISTRY_INDEX, self.reference) {
            warn!(error = %err, reference = self.reference, "failed to release thread");
        }
    }
}

impl fmt::Debug for Thread<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thread")
            .field("raw", &self.raw)
            .field("reference", &self.reference)
            .finish()
    }
}

/// Stack operations on one `lua_State`.
///
/// Borrowed from a `State`, a `Thread`, or handed to a host closure for the
/// duration of one call.
#[derive(Clone, Copy)]
pub struct Lua<'a> {
    pub(crate) api: &'a Arc<Api>,
    pub(crate) raw: *mut c_void,
    pub(crate) arena: &'a Rc<TrampolineArena>,
}

impl<'a> Lua<'a> {
    pub fn api(&self) -> &'a Arc<Api> {
        self.api
    }

    /// The raw `lua_State *` this view operates on.
    pub fn as_ptr(&self) -> *mut c_void {
        self.raw
    }

    pub(crate) fn handle(&self) -> NativeArg<'static> {
        NativeArg::Ptr(self.raw)
    }

    pub(crate) fn core_call(&self, op: Core, args: &[NativeArg<'_>]) -> LuaResult<NativeRet> {
        // SAFETY: prototypes in `Core` match the C headers and `raw` is a
        // live state for `'a`; index validity is the caller's contract.
        Ok(unsafe { self.api.core(op).call(args) }?)
    }

    pub(crate) fn aux_call(&self, op: Aux, args: &[NativeArg<'_>]) -> LuaResult<NativeRet> {
        // SAFETY: as for `core_call`.
        Ok(unsafe { self.api.aux(op).call(args) }?)
    }

    pub(crate) fn core_int(&self, op: Core, args: &[NativeArg<'_>]) -> LuaResult<c_int> {
        Ok(int(&self.core_call(op, args)?))
    }

    pub(crate) fn core_bool(&self, op: Core, args: &[NativeArg<'_>]) -> LuaResult<bool> {
        Ok(self.core_call(op, args)?.as_bool().unwrap_or(false))
    }

    pub(crate) fn core_ptr(&self, op: Core, args: &[NativeArg<'_>]) -> LuaResult<*mut c_void> {
        Ok(ptr(&self.core_call(op, args)?))
    }

    pub(crate) fn core_unit(&self, op: Core, args: &[NativeArg<'_>]) -> LuaResult<()> {
        self.core_call(op, args).map(|_| ())
    }
}

impl fmt::Debug for Lua<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lua").field("raw", &self.raw).finish()
    }
}

pub(crate) fn int(ret: &NativeRet) -> c_int {
    ret.as_i64().unwrap_or(0) as c_int
}

pub(crate) fn ptr(ret: &NativeRet) -> *mut c_void {
    ret.as_ptr().unwrap_or(std::ptr::null_mut())
}

/// Copy `len` bytes from a string pointer returned with an explicit length.
///
/// # Safety
/// A non-null pointer must address at least `len` readable bytes.
pub(crate) unsafe fn copy_lstring(ret: &NativeRet, len: usize) -> Option<Vec<u8>> {
    let data = ret.as_ptr()?;
    if data.is_null() {
        return None;
    }
    // SAFETY: guaranteed by the caller.
    Some(unsafe { std::slice::from_raw_parts(data as *const u8, len) }.to_vec())
}
