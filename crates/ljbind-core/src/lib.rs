//! Generic dynamic-binding layer.
//!
//! Given tables of symbol names and native calling signatures, this crate
//! resolves them against a shared library loaded at startup and produces
//! callables that marshal host values across the C ABI. The converse
//! direction, letting native code call host closures, is covered by
//! runtime-generated trampolines.
//!
//! - `loader`: open a library once per process and memoize the handle
//! - `signature`: native parameter/return kinds, parsed from C declarations
//! - `descriptor`: validated symbol tables (in code or RON)
//! - `binder`: eager, all-or-nothing resolution into a `BindingTable`
//! - `trampoline`: host closures as native function pointers, and the arena
//!   that pins them
//!
//! Everything here is synchronous. Bound tables are immutable and may be
//! shared across threads; what the native functions themselves allow is up
//! to the library being bound.

pub mod binder;
pub mod descriptor;
pub mod error;
pub mod loader;
pub mod signature;
pub mod trampoline;
pub mod value;

#[cfg(test)]
mod binder_tests;
#[cfg(test)]
mod trampoline_tests;

// Re-export commonly used types for convenience
pub use binder::{BindingTable, BoundFn, bind_all, bind_one, bind_optional};
pub use descriptor::{SymbolDescriptor, SymbolTable};
pub use error::{BindError, CallError, DescriptorError, LoadError};
pub use loader::{LibraryHandle, LoaderConfig, load, load_path};
pub use signature::{NativeSignature, NativeType};
pub use trampoline::{CallbackArgs, Trampoline, TrampolineArena, make_trampoline};
pub use value::{NativeArg, NativeRet};
