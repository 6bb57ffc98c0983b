//! The LuaJIT C API, bound at runtime.
//!
//! The API is declared as symbol tables (`api`) and bound by
//! `ljbind-core` against a LuaJIT shared library found at startup
//! (`Api::load`). States are owned handles (`State`) whose stack
//! operations live on the borrowed `Lua` view, and host closures become
//! Lua C functions through trampolines pinned to the owning state.
//!
//! ```no_run
//! use ljbind_lua::{Api, State};
//! use std::sync::Arc;
//!
//! let state = State::open(Arc::new(Api::load(None)?))?;
//! let lua = state.lua();
//! lua.open_libs()?;
//! lua.push_function(|lua| {
//!     lua.push_string("it works!")?;
//!     Ok(1)
//! })?;
//! lua.set_global("greet")?;
//! lua.exec("return greet()")?;
//! assert_eq!(lua.to_string_lossy(-1)?.as_deref(), Some("it works!"));
//! state.close()?;
//! # Ok::<(), ljbind_lua::LuaError>(())
//! ```

pub mod api;
pub mod auxlib;
pub mod bindings;
pub mod callback;
pub mod consts;
pub mod error;
pub mod jit;
pub mod stack;
pub mod state;

#[cfg(test)]
mod api_tests;

pub use api::{Aux, Core, Jit, Lib, OptionalLib};
pub use bindings::Api;
pub use callback::{HostFunction, LuaReg};
pub use consts::{JitFlag, JitMode, Status};
pub use error::{LuaError, LuaResult};
pub use jit::ProfileSample;
pub use state::{Lua, State, Thread};
