//! Error types for loading, binding and invoking native symbols

use crate::signature::NativeType;
use std::path::PathBuf;
use thiserror::Error;

/// Failure to map a shared library into the process.
///
/// Both variants are fatal: the operator has to install or point at the
/// right library, retrying at runtime cannot fix either.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("native library not found (tried: {})", display_tried(.tried))]
    NotFound { tried: Vec<String> },

    #[error("failed to load native library '{}': {reason}", .path.display())]
    LoadFailed { path: PathBuf, reason: String },
}

fn display_tried(tried: &[String]) -> String {
    if tried.is_empty() {
        "<none>".to_string()
    } else {
        tried.join(", ")
    }
}

/// Failure to produce a callable from a descriptor, or a trampoline from a closure.
#[derive(Debug, Error)]
pub enum BindError {
    /// The library does not export the symbol. Usually a version mismatch.
    #[error("symbol '{name}' not found in native library")]
    SymbolNotFound { name: String },

    /// The platform refused to allocate or prepare an executable closure.
    #[error("cannot synthesize native trampoline: {reason}")]
    TrampolineUnsupported { reason: String },
}

/// A symbol table that violates its structural invariants.
#[derive(Debug, Error, PartialEq)]
pub enum DescriptorError {
    #[error("logical name must not be empty (symbol '{symbol}')")]
    EmptyName { symbol: String },

    #[error("duplicate logical name '{name}' in table '{table}'")]
    DuplicateName { table: String, name: String },

    #[error("'{symbol}' is not a valid native symbol name")]
    InvalidSymbol { symbol: String },

    #[error("unknown C type '{ty}' in declaration '{decl}'")]
    UnknownType { decl: String, ty: String },

    #[error("malformed declaration '{decl}': {reason}")]
    Malformed { decl: String, reason: String },

    #[error("failed to parse symbol table: {0}")]
    Format(String),
}

/// Host-side argument errors detected before a native call is attempted.
#[derive(Debug, Error, PartialEq)]
pub enum CallError {
    #[error("'{symbol}' expects {expected} argument(s), got {found}")]
    Arity {
        symbol: String,
        expected: usize,
        found: usize,
    },

    #[error("argument {index} of '{symbol}': cannot pass {found} as {expected}")]
    ArgumentMismatch {
        symbol: String,
        index: usize,
        expected: NativeType,
        found: &'static str,
    },
}
