use ljbind_core::{BindError, CallError, DescriptorError, LoadError};
use thiserror::Error;

pub type LuaResult<T> = Result<T, LuaError>;

/// Errors of the bound LuaJIT API.
///
/// VM-level failures (a failing `pcall`, a syntax error) are not errors
/// here; they come back as a `Status`.
#[derive(Debug, Error)]
pub enum LuaError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Bind(#[from] BindError),

    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    #[error(transparent)]
    Call(#[from] CallError),

    #[error("luaL_newstate returned NULL (out of memory)")]
    StateCreation,

    #[error("thread could not be anchored in the registry")]
    ThreadAnchor,

    #[error("{what} name contains an interior NUL byte")]
    InteriorNul { what: &'static str },

    /// Raised by host closures; reported to Lua as `nil, message`.
    #[error("{0}")]
    Callback(String),
}

impl LuaError {
    pub fn callback(message: impl Into<String>) -> Self {
        LuaError::Callback(message.into())
    }
}
