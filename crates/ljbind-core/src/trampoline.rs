//! Callback trampolines: native-callable function pointers backed by host closures.
//!
//! A trampoline is a libffi closure. Its code pointer can be handed to native
//! code like any C function pointer; when called, libffi routes the call to
//! `dispatch`, which decodes the native arguments, runs the host closure and
//! writes its result back in the native return convention.
//!
//! The code pointer is only valid while its `Trampoline` is alive. Owners
//! that give pointers to a VM pin them in a `TrampolineArena` that outlives
//! every call path able to reach them, and release the arena only after the
//! VM is gone.

use crate::error::BindError;
use crate::signature::{NativeSignature, NativeType};
use crate::value::{NativeRet, copy_c_string, integer_ret};
use libffi::middle::{Builder, Cif};
use libffi::raw;
use std::any::Any;
use std::cell::RefCell;
use std::ffi::{c_char, c_void};
use std::fmt;
use std::mem::size_of;
use std::panic::{self, AssertUnwindSafe};
use tracing::{error, trace};

/// Host side of a trampoline.
pub type HostFn = dyn Fn(&CallbackArgs<'_>) -> NativeRet + 'static;

/// Everything `dispatch` needs, reached through the closure's user data.
struct Context {
    signature: NativeSignature,
    callback: Box<HostFn>,
}

/// A runtime-generated native function pointer that calls a host closure.
pub struct Trampoline {
    closure: *mut raw::ffi_closure,
    code: *const c_void,
    // Both are referenced by the prepared closure and must not move.
    _cif: Box<Cif>,
    context: Box<Context>,
}

impl Trampoline {
    /// The native-callable entry point.
    pub fn code_ptr(&self) -> *const c_void {
        self.code
    }

    pub fn signature(&self) -> &NativeSignature {
        &self.context.signature
    }
}

impl Drop for Trampoline {
    fn drop(&mut self) {
        trace!(code = ?self.code, "freeing trampoline");
        // SAFETY: `closure` came from `ffi_closure_alloc` and is freed once.
        unsafe { raw::ffi_closure_free(self.closure as *mut c_void) };
    }
}

impl fmt::Debug for Trampoline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trampoline")
            .field("code", &self.code)
            .field("signature", &format_args!("{}", self.context.signature))
            .finish()
    }
}

/// Synthesize a native function pointer with `signature` that invokes `callback`.
///
/// Fails with `BindError::TrampolineUnsupported` when the platform cannot
/// allocate executable closures, or for variadic signatures.
pub fn make_trampoline<F>(signature: NativeSignature, callback: F) -> Result<Trampoline, BindError>
where
    F: Fn(&CallbackArgs<'_>) -> NativeRet + 'static,
{
    if signature.variadic {
        return Err(BindError::TrampolineUnsupported {
            reason: format!("variadic callback signature '{signature}'"),
        });
    }

    let cif = Box::new(
        Builder::new()
            .args(signature.params.iter().map(|t| t.to_libffi_type()))
            .res(signature.ret.to_libffi_type())
            .into_cif(),
    );
    let context = Box::new(Context {
        signature,
        callback: Box::new(callback),
    });

    let mut code: *mut c_void = std::ptr::null_mut();
    // SAFETY: plain allocation; checked for null below.
    let closure =
        unsafe { raw::ffi_closure_alloc(size_of::<raw::ffi_closure>(), &mut code) } as *mut raw::ffi_closure;
    if closure.is_null() || code.is_null() {
        return Err(BindError::TrampolineUnsupported {
            reason: "ffi_closure_alloc returned null".to_string(),
        });
    }

    let user_data = &*context as *const Context as *mut c_void;
    // SAFETY: `cif` and `context` are boxed and owned by the returned
    // trampoline, so they outlive the prepared closure.
    let status = unsafe {
        raw::ffi_prep_closure_loc(closure, cif.as_raw_ptr(), Some(dispatch), user_data, code)
    };
    if status as u32 != 0 {
        // SAFETY: allocated above and not yet shared.
        unsafe { raw::ffi_closure_free(closure as *mut c_void) };
        return Err(BindError::TrampolineUnsupported {
            reason: format!("ffi_prep_closure_loc failed with status {}", status as u32),
        });
    }

    trace!(code = ?code, signature = %context.signature, "created trampoline");
    Ok(Trampoline {
        closure,
        code: code as *const c_void,
        _cif: cif,
        context,
    })
}

/// Entry point for every trampoline.
unsafe extern "C" fn dispatch(
    _cif: *mut raw::ffi_cif,
    ret: *mut c_void,
    args: *mut *mut c_void,
    user_data: *mut c_void,
) {
    // SAFETY: `user_data` is the `Context` boxed inside the live trampoline.
    let context = unsafe { &*(user_data as *const Context) };

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        // SAFETY: libffi passes one pointer per declared parameter.
        let decoded = unsafe { CallbackArgs::decode(&context.signature.params, args) };
        (context.callback)(&decoded)
    }));

    match outcome {
        // SAFETY: `ret` is sized for the declared return type.
        Ok(value) => unsafe { encode_return(&context.signature, &value, ret) },
        Err(payload) => {
            // Unwinding into native frames is undefined behavior.
            error!(
                signature = %context.signature,
                panic = panic_message(&*payload),
                "host callback panicked; aborting"
            );
            std::process::abort();
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "<non-string panic payload>"
    }
}

/// Write the host result in the native return convention.
///
/// Integer results no wider than `ffi_arg` fill a whole `ffi_arg`, sign- or
/// zero-extended after truncation to the declared width.
unsafe fn encode_return(signature: &NativeSignature, value: &NativeRet, ret: *mut c_void) {
    let ty = signature.ret;
    // SAFETY (whole body): `ret` points to storage for the declared type.
    unsafe {
        match (ty, value) {
            (NativeType::Void, _) => {}
            (ty, NativeRet::Int(_) | NativeRet::UInt(_) | NativeRet::Bool(_)) if ty.is_integer() => {
                let bits = match *value {
                    NativeRet::Int(v) => v as u64,
                    NativeRet::UInt(v) => v,
                    NativeRet::Bool(b) => b as u64,
                    _ => 0,
                };
                let widened = match integer_ret(ty, bits) {
                    NativeRet::Int(v) => v as u64,
                    NativeRet::UInt(v) => v,
                    NativeRet::Bool(b) => b as u64,
                    _ => 0,
                };
                if ty.size() <= size_of::<raw::ffi_arg>() {
                    *(ret as *mut raw::ffi_arg) = widened as raw::ffi_arg;
                } else {
                    *(ret as *mut u64) = widened;
                }
            }
            (NativeType::F32, NativeRet::Float(v)) => *(ret as *mut f32) = *v as f32,
            (NativeType::F64, NativeRet::Float(v)) => *(ret as *mut f64) = *v,
            (ty, NativeRet::Ptr(p)) if ty.is_pointer_like() => *(ret as *mut *mut c_void) = *p,
            (ty, other) => {
                error!(
                    signature = %signature,
                    returned = ?other,
                    "host callback returned a value that does not match {ty}; returning zero"
                );
                let width = if ty.is_integer() {
                    ty.size().max(size_of::<raw::ffi_arg>())
                } else {
                    ty.size()
                };
                std::ptr::write_bytes(ret as *mut u8, 0, width);
            }
        }
    }
}

/// Native arguments of one callback invocation, decoded to host values.
#[derive(Debug)]
pub struct CallbackArgs<'a> {
    types: &'a [NativeType],
    values: Vec<NativeRet>,
}

impl<'a> CallbackArgs<'a> {
    /// # Safety
    /// `args` must hold one valid pointer per entry of `types`, each pointing
    /// at a value of that type.
    unsafe fn decode(types: &'a [NativeType], args: *mut *mut c_void) -> Self {
        let values = types
            .iter()
            .enumerate()
            .map(|(i, ty)| {
                // SAFETY: forwarded from the caller.
                unsafe {
                    let slot = *args.add(i);
                    match ty {
                        NativeType::I8 => NativeRet::Int(*(slot as *const i8) as i64),
                        NativeType::U8 => NativeRet::UInt(*(slot as *const u8) as u64),
                        NativeType::I16 => NativeRet::Int(*(slot as *const i16) as i64),
                        NativeType::U16 => NativeRet::UInt(*(slot as *const u16) as u64),
                        NativeType::I32 => NativeRet::Int(*(slot as *const i32) as i64),
                        NativeType::U32 => NativeRet::UInt(*(slot as *const u32) as u64),
                        NativeType::I64 => NativeRet::Int(*(slot as *const i64)),
                        NativeType::U64 => NativeRet::UInt(*(slot as *const u64)),
                        NativeType::ISize => NativeRet::Int(*(slot as *const isize) as i64),
                        NativeType::USize => NativeRet::UInt(*(slot as *const usize) as u64),
                        NativeType::Long => NativeRet::Int(*(slot as *const libc::c_long) as i64),
                        NativeType::ULong => {
                            NativeRet::UInt(*(slot as *const libc::c_ulong) as u64)
                        }
                        NativeType::F32 => NativeRet::Float(*(slot as *const f32) as f64),
                        NativeType::F64 => NativeRet::Float(*(slot as *const f64)),
                        NativeType::Bool => NativeRet::Bool(*(slot as *const libc::c_int) != 0),
                        NativeType::Pointer | NativeType::CStr | NativeType::Handle => {
                            NativeRet::Ptr(*(slot as *const *mut c_void))
                        }
                        NativeType::Void => NativeRet::Void,
                    }
                }
            })
            .collect();
        CallbackArgs { types, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&NativeRet> {
        self.values.get(index)
    }

    pub fn int(&self, index: usize) -> Option<i64> {
        self.values.get(index)?.as_i64()
    }

    pub fn uint(&self, index: usize) -> Option<u64> {
        self.values.get(index)?.as_u64()
    }

    pub fn float(&self, index: usize) -> Option<f64> {
        self.values.get(index)?.as_f64()
    }

    pub fn bool(&self, index: usize) -> Option<bool> {
        self.values.get(index)?.as_bool()
    }

    pub fn ptr(&self, index: usize) -> Option<*mut c_void> {
        self.values.get(index)?.as_ptr()
    }

    /// The VM state handle at `index`, if that parameter was declared as one.
    pub fn handle(&self, index: usize) -> Option<*mut c_void> {
        match self.types.get(index)? {
            NativeType::Handle => self.ptr(index),
            _ => None,
        }
    }

    /// Copy of the string argument at `index`, if declared `const char *`
    /// and not null.
    pub fn c_str(&self, index: usize) -> Option<Vec<u8>> {
        match self.types.get(index)? {
            NativeType::CStr => {
                let ptr = self.ptr(index)? as *const c_char;
                // SAFETY: the native caller passes a NUL-terminated string
                // for a parameter declared `const char *`.
                unsafe { copy_c_string(ptr) }
            }
            _ => None,
        }
    }
}

/// Keeps trampolines alive for as long as native code may call them.
///
/// Owned by whatever owns the native consumer of the pointers (a VM state).
/// Dropping the arena frees every pinned trampoline.
#[derive(Debug, Default)]
pub struct TrampolineArena {
    pinned: RefCell<Vec<Trampoline>>,
}

impl TrampolineArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move a trampoline into the arena and return its code pointer.
    pub fn pin(&self, trampoline: Trampoline) -> *const c_void {
        let code = trampoline.code_ptr();
        self.pinned.borrow_mut().push(trampoline);
        code
    }

    pub fn len(&self) -> usize {
        self.pinned.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pinned.borrow().is_empty()
    }

    pub fn contains(&self, code: *const c_void) -> bool {
        self.pinned.borrow().iter().any(|t| t.code_ptr() == code)
    }

    /// Free one trampoline early.
    ///
    /// # Safety
    /// Native code must no longer be able to call `code`.
    pub unsafe fn release(&self, code: *const c_void) -> bool {
        let removed = {
            let mut pinned = self.pinned.borrow_mut();
            pinned
                .iter()
                .position(|t| t.code_ptr() == code)
                .map(|i| pinned.swap_remove(i))
        };
        removed.is_some()
    }

    /// Free every trampoline.
    ///
    /// # Safety
    /// Native code must no longer be able to call any pinned pointer,
    /// typically because the VM state that received them has been closed.
    pub unsafe fn release_all(&self) {
        // Dropped outside the borrow: a closure's destructor may reach the arena.
        let drained = std::mem::take(&mut *self.pinned.borrow_mut());
        drop(drained);
    }
}
