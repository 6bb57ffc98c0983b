//! Host values crossing the native boundary, and their marshaling.

use crate::error::CallError;
use crate::signature::NativeType;
use libffi::middle::{Arg, arg};
use std::ffi::{CStr, c_char, c_void};

/// A host value passed to a native function.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NativeArg<'a> {
    /// Converted to the declared width for fixed parameters. In a variadic
    /// tail it is passed as `long long`, so format directives must use
    /// `%lld`/`%lli`; `%d` reads only the low half on LP64 register ABIs.
    Int(i64),
    UInt(u64),
    Float(f64),
    /// A C `int` 0 or 1, also in a variadic tail.
    Bool(bool),
    Ptr(*mut c_void),
    /// Copied into a NUL-terminated buffer for the duration of the call.
    Str(&'a [u8]),
    Null,
}

impl NativeArg<'_> {
    pub fn kind_name(&self) -> &'static str {
        match self {
            NativeArg::Int(_) => "integer",
            NativeArg::UInt(_) => "unsigned integer",
            NativeArg::Float(_) => "float",
            NativeArg::Bool(_) => "boolean",
            NativeArg::Ptr(_) => "pointer",
            NativeArg::Str(_) => "string",
            NativeArg::Null => "null",
        }
    }

    pub fn str(s: &str) -> NativeArg<'_> {
        NativeArg::Str(s.as_bytes())
    }

    pub fn ptr<T>(p: *const T) -> NativeArg<'static> {
        NativeArg::Ptr(p as *mut c_void)
    }
}

impl From<i32> for NativeArg<'_> {
    fn from(v: i32) -> Self {
        NativeArg::Int(v as i64)
    }
}

impl From<i64> for NativeArg<'_> {
    fn from(v: i64) -> Self {
        NativeArg::Int(v)
    }
}

impl From<u64> for NativeArg<'_> {
    fn from(v: u64) -> Self {
        NativeArg::UInt(v)
    }
}

impl From<f64> for NativeArg<'_> {
    fn from(v: f64) -> Self {
        NativeArg::Float(v)
    }
}

impl From<bool> for NativeArg<'_> {
    fn from(v: bool) -> Self {
        NativeArg::Bool(v)
    }
}

impl<'a> From<&'a str> for NativeArg<'a> {
    fn from(s: &'a str) -> Self {
        NativeArg::Str(s.as_bytes())
    }
}

/// A native return value converted to its host representation.
#[derive(Clone, Debug, PartialEq)]
pub enum NativeRet {
    Void,
    Int(i64),
    UInt(u64),
    Float(f64),
    /// A C `int` 0 or 1, also in a variadic tail.
    Bool(bool),
    Ptr(*mut c_void),
    /// Copied out of a `const char *`; `None` for a null pointer.
    Str(Option<Vec<u8>>),
}

impl NativeRet {
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            NativeRet::Int(v) => Some(v),
            NativeRet::UInt(v) => Some(v as i64),
            NativeRet::Bool(b) => Some(b as i64),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            NativeRet::UInt(v) => Some(v),
            NativeRet::Int(v) => Some(v as u64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            NativeRet::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            NativeRet::Bool(b) => Some(b),
            NativeRet::Int(v) => Some(v != 0),
            _ => None,
        }
    }

    pub fn as_ptr(&self) -> Option<*mut c_void> {
        match *self {
            NativeRet::Ptr(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            NativeRet::Str(Some(bytes)) => Some(bytes),
            _ => None,
        }
    }

    /// Lossy UTF-8 view of a returned string.
    pub fn to_string_lossy(&self) -> Option<String> {
        self.as_bytes()
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }
}

/// One argument converted to the exact width libffi will read.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Slot {
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    ISize(isize),
    USize(usize),
    Long(libc::c_long),
    ULong(libc::c_ulong),
    F32(f32),
    F64(f64),
    Int(libc::c_int),
    Ptr(*const c_void),
    /// Index into the call frame's string buffers
    Str(usize),
}

/// Storage that must outlive a native call: converted slots plus string copies.
#[derive(Default)]
pub(crate) struct CallFrame {
    pub slots: Vec<Slot>,
    strings: Vec<Vec<u8>>,
    string_ptrs: Vec<*const c_void>,
}

impl CallFrame {
    /// Convert `value` to `ty`, truncating integers to the declared width.
    pub fn push(
        &mut self,
        symbol: &str,
        index: usize,
        ty: NativeType,
        value: &NativeArg<'_>,
    ) -> Result<(), CallError> {
        let mismatch = || CallError::ArgumentMismatch {
            symbol: symbol.to_string(),
            index,
            expected: ty,
            found: value.kind_name(),
        };

        let slot = if ty.is_integer() {
            let bits = match *value {
                NativeArg::Int(v) => v as u64,
                NativeArg::UInt(v) => v,
                NativeArg::Bool(b) => b as u64,
                _ => return Err(mismatch()),
            };
            integer_slot(ty, bits)
        } else {
            match (ty, value) {
                (NativeType::F32, NativeArg::Float(v)) => Slot::F32(*v as f32),
                (NativeType::F32, NativeArg::Int(v)) => Slot::F32(*v as f32),
                (NativeType::F64, NativeArg::Float(v)) => Slot::F64(*v),
                (NativeType::F64, NativeArg::Int(v)) => Slot::F64(*v as f64),
                (NativeType::CStr, NativeArg::Str(bytes)) => {
                    let mut owned = Vec::with_capacity(bytes.len() + 1);
                    owned.extend_from_slice(bytes);
                    owned.push(0);
                    self.strings.push(owned);
                    Slot::Str(self.strings.len() - 1)
                }
                (
                    NativeType::CStr | NativeType::Pointer | NativeType::Handle,
                    NativeArg::Ptr(p),
                ) => Slot::Ptr(*p),
                (NativeType::CStr | NativeType::Pointer | NativeType::Handle, NativeArg::Null) => {
                    Slot::Ptr(std::ptr::null())
                }
                (NativeType::Pointer, NativeArg::UInt(addr)) => Slot::Ptr(*addr as usize as _),
                _ => return Err(mismatch()),
            }
        };

        self.slots.push(slot);
        Ok(())
    }

    /// Argument promotion for the variadic tail. `bool` becomes `int` as in
    /// C; host integers keep their full 64 bits (`long long`) and floats are
    /// passed as `double`.
    pub fn push_variadic(
        &mut self,
        symbol: &str,
        index: usize,
        value: &NativeArg<'_>,
    ) -> Result<NativeType, CallError> {
        let ty = match value {
            NativeArg::Bool(_) => NativeType::I32,
            NativeArg::Int(_) => NativeType::I64,
            NativeArg::UInt(_) => NativeType::U64,
            NativeArg::Float(_) => NativeType::F64,
            NativeArg::Str(_) => NativeType::CStr,
            NativeArg::Ptr(_) | NativeArg::Null => NativeType::Pointer,
        };
        self.push(symbol, index, ty, value)?;
        Ok(ty)
    }

    /// Borrow every slot as a libffi argument.
    ///
    /// String slots point at the frame's own buffers, which stay put because
    /// the frame is borrowed for as long as the returned args live.
    pub fn args(&mut self) -> Vec<Arg> {
        self.string_ptrs = self
            .strings
            .iter()
            .map(|s| s.as_ptr() as *const c_void)
            .collect();

        self.slots
            .iter()
            .map(|slot| match slot {
                Slot::I8(v) => arg(v),
                Slot::U8(v) => arg(v),
                Slot::I16(v) => arg(v),
                Slot::U16(v) => arg(v),
                Slot::I32(v) => arg(v),
                Slot::U32(v) => arg(v),
                Slot::I64(v) => arg(v),
                Slot::U64(v) => arg(v),
                Slot::ISize(v) => arg(v),
                Slot::USize(v) => arg(v),
                Slot::Long(v) => arg(v),
                Slot::ULong(v) => arg(v),
                Slot::F32(v) => arg(v),
                Slot::F64(v) => arg(v),
                Slot::Int(v) => arg(v),
                Slot::Ptr(v) => arg(v),
                Slot::Str(i) => arg(&self.string_ptrs[*i]),
            })
            .collect()
    }
}

fn integer_slot(ty: NativeType, bits: u64) -> Slot {
    match ty {
        NativeType::I8 => Slot::I8(bits as i8),
        NativeType::U8 => Slot::U8(bits as u8),
        NativeType::I16 => Slot::I16(bits as i16),
        NativeType::U16 => Slot::U16(bits as u16),
        NativeType::I32 => Slot::I32(bits as i32),
        NativeType::U32 => Slot::U32(bits as u32),
        NativeType::I64 => Slot::I64(bits as i64),
        NativeType::U64 => Slot::U64(bits),
        NativeType::ISize => Slot::ISize(bits as isize),
        NativeType::USize => Slot::USize(bits as usize),
        NativeType::Long => Slot::Long(bits as libc::c_long),
        NativeType::ULong => Slot::ULong(bits as libc::c_ulong),
        // Any nonzero host value is true; pass the canonical 1
        NativeType::Bool => Slot::Int((bits != 0) as libc::c_int),
        _ => unreachable!("integer_slot called with non-integer type {ty}"),
    }
}

/// Convert the raw bits of an integer return to the declared width.
pub(crate) fn integer_ret(ty: NativeType, bits: u64) -> NativeRet {
    match ty {
        NativeType::Bool => NativeRet::Bool(bits as libc::c_int != 0),
        NativeType::I8 => NativeRet::Int(bits as i8 as i64),
        NativeType::I16 => NativeRet::Int(bits as i16 as i64),
        NativeType::I32 => NativeRet::Int(bits as i32 as i64),
        NativeType::I64 => NativeRet::Int(bits as i64),
        NativeType::ISize => NativeRet::Int(bits as isize as i64),
        NativeType::Long => NativeRet::Int(bits as libc::c_long as i64),
        NativeType::U8 => NativeRet::UInt(bits as u8 as u64),
        NativeType::U16 => NativeRet::UInt(bits as u16 as u64),
        NativeType::U32 => NativeRet::UInt(bits as u32 as u64),
        NativeType::U64 => NativeRet::UInt(bits),
        NativeType::USize => NativeRet::UInt(bits as usize as u64),
        NativeType::ULong => NativeRet::UInt(bits as libc::c_ulong as u64),
        _ => unreachable!("integer_ret called with non-integer type {ty}"),
    }
}

/// Copy a returned C string. The native side keeps ownership of `ptr`.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string.
pub(crate) unsafe fn copy_c_string(ptr: *const c_char) -> Option<Vec<u8>> {
    if ptr.is_null() {
        return None;
    }
    // SAFETY: guaranteed by the caller.
    Some(unsafe { CStr::from_ptr(ptr) }.to_bytes().to_vec())
}
