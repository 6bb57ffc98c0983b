//! Signature binding: resolve descriptors against a library and produce
//! callables that marshal host values through libffi.
//!
//! Resolution is eager. `bind_all` either returns a complete table or the
//! first missing symbol; no partially bound table is ever observable.
//!
//! # Safety
//!
//! The binder trusts each descriptor's signature. A signature that does not
//! match the symbol's real prototype is undefined behavior at the call site,
//! which is why `BoundFn::call` is `unsafe`.

use crate::descriptor::{SymbolDescriptor, SymbolTable};
use crate::error::{BindError, CallError, DescriptorError};
use crate::loader::LibraryHandle;
use crate::signature::{NativeSignature, NativeType};
use crate::value::{CallFrame, NativeArg, NativeRet, copy_c_string, integer_ret};
use libffi::middle::{Arg, Builder, Cif, CodePtr, Type};
use libffi::raw;
use std::collections::HashMap;
use std::ffi::{c_char, c_void};
use std::fmt;
use std::mem::size_of;
use tracing::debug;

/// A resolved native symbol with its prepared call interface.
pub struct BoundFn {
    descriptor: SymbolDescriptor,
    code: CodePtr,
    /// Prepared once; variadic functions build one per call instead.
    cif: Option<Cif>,
}

// SAFETY: the CIF and the type descriptors it points to are never mutated
// after preparation, and libffi only reads them during `ffi_call`. The code
// pointer addresses a library that stays mapped for the process lifetime.
unsafe impl Send for BoundFn {}
unsafe impl Sync for BoundFn {}

impl BoundFn {
    pub fn descriptor(&self) -> &SymbolDescriptor {
        &self.descriptor
    }

    pub fn name(&self) -> &str {
        &self.descriptor.logical_name
    }

    pub fn signature(&self) -> &NativeSignature {
        &self.descriptor.signature
    }

    /// Resolved address of the native symbol.
    pub fn address(&self) -> *const c_void {
        self.code.as_ptr()
    }

    /// Invoke the native function.
    ///
    /// Arguments are checked against the declared kinds before anything
    /// crosses the boundary.
    ///
    /// # Safety
    ///
    /// The descriptor's signature must match the native prototype, and the
    /// arguments must satisfy the native function's own preconditions
    /// (valid pointers, a live VM state, and so on).
    pub unsafe fn call(&self, args: &[NativeArg<'_>]) -> Result<NativeRet, CallError> {
        let sig = &self.descriptor.signature;
        let symbol = &self.descriptor.native_symbol;

        let arity_ok = if sig.variadic {
            args.len() >= sig.params.len()
        } else {
            args.len() == sig.params.len()
        };
        if !arity_ok {
            return Err(CallError::Arity {
                symbol: symbol.clone(),
                expected: sig.params.len(),
                found: args.len(),
            });
        }

        let mut frame = CallFrame::default();
        for (i, (ty, value)) in sig.params.iter().zip(args).enumerate() {
            frame.push(symbol, i, *ty, value)?;
        }

        let variadic_cif;
        let cif = match &self.cif {
            Some(cif) => cif,
            None => {
                let mut types: Vec<Type> = sig.params.iter().map(|t| t.to_libffi_type()).collect();
                for (i, value) in args.iter().enumerate().skip(sig.params.len()) {
                    let ty = frame.push_variadic(symbol, i, value)?;
                    types.push(ty.to_libffi_type());
                }
                variadic_cif = Cif::new_variadic(types, sig.params.len(), sig.ret.to_libffi_type());
                &variadic_cif
            }
        };

        let ffi_args = frame.args();
        // SAFETY: argument storage lives in `frame` until after the call; the
        // signature is trusted per this function's contract.
        Ok(unsafe { invoke(cif, self.code, &ffi_args, sig.ret) })
    }
}

impl fmt::Debug for BoundFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundFn")
            .field("name", &self.descriptor.logical_name)
            .field("symbol", &self.descriptor.native_symbol)
            .field("signature", &format_args!("{}", self.descriptor.signature))
            .field("address", &self.code.as_ptr())
            .finish()
    }
}

/// Perform the call and convert the return value.
///
/// Integer returns no wider than `ffi_arg` are widened to a full `ffi_arg`
/// by libffi, so they are read at that width and truncated afterwards.
unsafe fn invoke(cif: &Cif, code: CodePtr, args: &[Arg], ret: NativeType) -> NativeRet {
    // SAFETY (whole body): forwarded from the caller.
    unsafe {
        match ret {
            NativeType::Void => {
                let _: () = cif.call(code, args);
                NativeRet::Void
            }
            ty if ty.is_integer() => {
                let bits = if ty.size() <= size_of::<raw::ffi_arg>() {
                    cif.call::<raw::ffi_arg>(code, args) as u64
                } else {
                    cif.call::<u64>(code, args)
                };
                integer_ret(ty, bits)
            }
            NativeType::F32 => NativeRet::Float(cif.call::<f32>(code, args) as f64),
            NativeType::F64 => NativeRet::Float(cif.call::<f64>(code, args)),
            NativeType::CStr => {
                let ptr: *const c_char = cif.call(code, args);
                NativeRet::Str(copy_c_string(ptr))
            }
            NativeType::Pointer | NativeType::Handle => NativeRet::Ptr(cif.call(code, args)),
            other => unreachable!("unhandled return type {other}"),
        }
    }
}

/// Resolve one descriptor.
pub fn bind_one(lib: &LibraryHandle, descriptor: &SymbolDescriptor) -> Result<BoundFn, BindError> {
    let address = lib
        .symbol_address(&descriptor.native_symbol)
        .ok_or_else(|| BindError::SymbolNotFound {
            name: descriptor.native_symbol.clone(),
        })?;

    let sig = &descriptor.signature;
    let cif = if sig.variadic {
        None
    } else {
        Some(
            Builder::new()
                .args(sig.params.iter().map(|t| t.to_libffi_type()))
                .res(sig.ret.to_libffi_type())
                .into_cif(),
        )
    };

    Ok(BoundFn {
        descriptor: descriptor.clone(),
        code: CodePtr::from_ptr(address),
        cif,
    })
}

/// Resolve every descriptor of a table, all or nothing.
pub fn bind_all(lib: &LibraryHandle, table: &SymbolTable) -> Result<BindingTable, BindError> {
    let mut bound = Vec::with_capacity(table.len());
    for descriptor in table {
        bound.push(bind_one(lib, descriptor)?);
    }
    debug!(table = table.name(), symbols = bound.len(), library = ?lib.key(), "bound symbol table");
    Ok(BindingTable::from_bound(bound))
}

/// Like `bind_all`, but symbols the library lacks are skipped.
///
/// Meant for entry points that only some library builds export. The returned
/// table reports which ones were missing.
pub fn bind_optional(lib: &LibraryHandle, table: &SymbolTable) -> (BindingTable, Vec<String>) {
    let mut bound = Vec::with_capacity(table.len());
    let mut missing = Vec::new();
    for descriptor in table {
        match bind_one(lib, descriptor) {
            Ok(f) => bound.push(f),
            Err(_) => missing.push(descriptor.native_symbol.clone()),
        }
    }
    if !missing.is_empty() {
        debug!(table = table.name(), ?missing, "optional symbols not exported");
    }
    (BindingTable::from_bound(bound), missing)
}

/// Bound callables in table order, looked up by logical name or position.
///
/// There is no way to rebind or replace an entry once the table exists.
#[derive(Debug, Default)]
pub struct BindingTable {
    entries: Vec<BoundFn>,
    by_name: HashMap<String, usize>,
}

impl BindingTable {
    fn from_bound(entries: Vec<BoundFn>) -> Self {
        let by_name = entries
            .iter()
            .enumerate()
            .map(|(i, f)| (f.descriptor.logical_name.clone(), i))
            .collect();
        BindingTable { entries, by_name }
    }

    pub fn get(&self, logical_name: &str) -> Option<&BoundFn> {
        self.by_name.get(logical_name).map(|&i| &self.entries[i])
    }

    pub fn by_index(&self, index: usize) -> Option<&BoundFn> {
        self.entries.get(index)
    }

    pub fn contains(&self, logical_name: &str) -> bool {
        self.by_name.contains_key(logical_name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BoundFn> {
        self.entries.iter()
    }

    /// Append another table's entries. Names already present are an error.
    pub fn merge(mut self, other: BindingTable) -> Result<Self, DescriptorError> {
        for f in other.entries {
            let name = f.descriptor.logical_name.clone();
            if self.by_name.contains_key(&name) {
                return Err(DescriptorError::DuplicateName {
                    table: "<merged>".to_string(),
                    name,
                });
            }
            self.by_name.insert(name, self.entries.len());
            self.entries.push(f);
        }
        Ok(self)
    }
}

impl std::ops::Index<usize> for BindingTable {
    type Output = BoundFn;

    fn index(&self, index: usize) -> &BoundFn {
        &self.entries[index]
    }
}

impl<'a> IntoIterator for &'a BindingTable {
    type Item = &'a BoundFn;
    type IntoIter = std::slice::Iter<'a, BoundFn>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
