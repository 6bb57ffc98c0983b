//! Native calling signatures.
//!
//! Signatures are written as C declarations so that symbol tables read like
//! the header they mirror:
//!
//! ```text
//! int (lua_State *L, int idx)              // anonymous
//! int lua_gettop(lua_State *L)             // full prototype, symbol taken from it
//! int luaL_error(lua_State *L, const char *fmt, ...)
//! ```
//!
//! Parameter names are optional and ignored. Two spellings carry host-side
//! meaning beyond their ABI:
//!
//! - `const char *` is a string passed by reference; host strings are copied
//!   into a NUL-terminated buffer for the duration of the call, and returned
//!   strings are copied out. A non-const `char *` is a plain pointer (an
//!   output buffer).
//! - `bool` is a C `int` carrying a truth value: 0 is false, anything else
//!   is true.
//!
//! `lua_State *` (or the shorthand `state`) is the opaque VM handle.

use crate::error::DescriptorError;
use libffi::middle::Type;
use std::fmt;

/// A single parameter or return kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NativeType {
    Void,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    /// `ptrdiff_t` and friends (`lua_Integer` in LuaJIT)
    ISize,
    /// `size_t`
    USize,
    /// C `long`, whose width is platform dependent
    Long,
    ULong,
    F32,
    F64,
    /// C `int` interpreted as a truth value
    Bool,
    Pointer,
    /// `const char *`
    CStr,
    /// Opaque VM state handle
    Handle,
}

impl NativeType {
    pub fn to_libffi_type(self) -> Type {
        match self {
            NativeType::Void => Type::void(),
            NativeType::I8 => Type::i8(),
            NativeType::U8 => Type::u8(),
            NativeType::I16 => Type::i16(),
            NativeType::U16 => Type::u16(),
            NativeType::I32 => Type::i32(),
            NativeType::U32 => Type::u32(),
            NativeType::I64 => Type::i64(),
            NativeType::U64 => Type::u64(),
            NativeType::ISize => Type::isize(),
            NativeType::USize => Type::usize(),
            NativeType::Long => Type::c_long(),
            NativeType::ULong => Type::c_ulong(),
            NativeType::F32 => Type::f32(),
            NativeType::F64 => Type::f64(),
            NativeType::Bool => Type::c_int(),
            NativeType::Pointer | NativeType::CStr | NativeType::Handle => Type::pointer(),
        }
    }

    /// Integer kinds, `bool` included.
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            NativeType::I8
                | NativeType::U8
                | NativeType::I16
                | NativeType::U16
                | NativeType::I32
                | NativeType::U32
                | NativeType::I64
                | NativeType::U64
                | NativeType::ISize
                | NativeType::USize
                | NativeType::Long
                | NativeType::ULong
                | NativeType::Bool
        )
    }

    /// Size in bytes of the native representation.
    pub fn size(self) -> usize {
        use std::mem::size_of;
        match self {
            NativeType::Void => 0,
            NativeType::I8 | NativeType::U8 => 1,
            NativeType::I16 | NativeType::U16 => 2,
            NativeType::I32 | NativeType::U32 | NativeType::F32 => 4,
            NativeType::Bool => size_of::<libc::c_int>(),
            NativeType::I64 | NativeType::U64 | NativeType::F64 => 8,
            NativeType::ISize | NativeType::USize => size_of::<usize>(),
            NativeType::Long | NativeType::ULong => size_of::<libc::c_long>(),
            NativeType::Pointer | NativeType::CStr | NativeType::Handle => {
                size_of::<*const std::ffi::c_void>()
            }
        }
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            NativeType::I8
                | NativeType::I16
                | NativeType::I32
                | NativeType::I64
                | NativeType::ISize
                | NativeType::Long
                | NativeType::Bool
        )
    }

    pub fn is_pointer_like(self) -> bool {
        matches!(
            self,
            NativeType::Pointer | NativeType::CStr | NativeType::Handle
        )
    }

    pub fn c_name(self) -> &'static str {
        match self {
            NativeType::Void => "void",
            NativeType::I8 => "int8_t",
            NativeType::U8 => "uint8_t",
            NativeType::I16 => "int16_t",
            NativeType::U16 => "uint16_t",
            NativeType::I32 => "int",
            NativeType::U32 => "unsigned int",
            NativeType::I64 => "int64_t",
            NativeType::U64 => "uint64_t",
            NativeType::ISize => "ptrdiff_t",
            NativeType::USize => "size_t",
            NativeType::Long => "long",
            NativeType::ULong => "unsigned long",
            NativeType::F32 => "float",
            NativeType::F64 => "double",
            NativeType::Bool => "bool",
            NativeType::Pointer => "void *",
            NativeType::CStr => "const char *",
            NativeType::Handle => "lua_State *",
        }
    }
}

impl fmt::Display for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.c_name())
    }
}

/// Parameter kinds plus return kind of one native function.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NativeSignature {
    pub params: Vec<NativeType>,
    pub ret: NativeType,
    /// Trailing `...`
    pub variadic: bool,
}

impl NativeSignature {
    pub fn new(params: Vec<NativeType>, ret: NativeType) -> Self {
        NativeSignature {
            params,
            ret,
            variadic: false,
        }
    }

    pub fn variadic(params: Vec<NativeType>, ret: NativeType) -> Self {
        NativeSignature {
            params,
            ret,
            variadic: true,
        }
    }

    /// Parse an anonymous declaration such as `int (lua_State *L, int idx)`.
    ///
    /// A full prototype is accepted too; the function name is discarded.
    pub fn parse(decl: &str) -> Result<Self, DescriptorError> {
        parse_declaration(decl).map(|(_, sig)| sig)
    }
}

impl fmt::Display for NativeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (", self.ret)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{param}")?;
        }
        if self.variadic {
            if !self.params.is_empty() {
                f.write_str(", ")?;
            }
            f.write_str("...")?;
        }
        f.write_str(")")
    }
}

/// Words that can appear inside a type spelling. Anything else trailing a
/// parameter is taken as its name.
const TYPE_WORDS: &[&str] = &[
    "void", "char", "short", "int", "long", "float", "double", "signed", "unsigned", "bool",
    "_Bool", "size_t", "ssize_t", "ptrdiff_t", "intptr_t", "uintptr_t", "int8_t", "uint8_t",
    "int16_t", "uint16_t", "int32_t", "uint32_t", "int64_t", "uint64_t", "lua_Integer",
    "lua_Number", "lua_CFunction", "lua_State", "state",
];

/// Parse a single C type spelling into a `NativeType`.
pub fn parse_c_type(type_str: &str) -> Result<NativeType, DescriptorError> {
    let unknown = |ty: &str| DescriptorError::UnknownType {
        decl: type_str.to_string(),
        ty: ty.to_string(),
    };

    let spelled = type_str.trim();
    if spelled.is_empty() {
        return Err(unknown(spelled));
    }

    // Pointer types: everything after the last '*' is the parameter name
    if let Some(star) = spelled.rfind('*') {
        let base: Vec<&str> = spelled[..star]
            .split(|c: char| c.is_whitespace() || c == '*')
            .filter(|w| !w.is_empty())
            .collect();
        let is_const = base.contains(&"const");
        let base: Vec<&str> = base.into_iter().filter(|w| *w != "const").collect();
        let depth = spelled.matches('*').count();

        return Ok(match base.as_slice() {
            ["lua_State"] if depth == 1 => NativeType::Handle,
            ["char"] if is_const && depth == 1 => NativeType::CStr,
            [] => return Err(unknown(spelled)),
            _ => NativeType::Pointer,
        });
    }

    let mut words: Vec<&str> = spelled
        .split_whitespace()
        .filter(|w| *w != "const")
        .collect();
    if words.len() >= 2 && words.last().is_some_and(|w| !TYPE_WORDS.contains(w)) {
        words.pop();
    }

    let ty = match words.join(" ").as_str() {
        "void" => NativeType::Void,
        "state" => NativeType::Handle,
        "bool" | "_Bool" => NativeType::Bool,
        "char" | "signed char" | "int8_t" => NativeType::I8,
        "unsigned char" | "uint8_t" => NativeType::U8,
        "short" | "short int" | "signed short" | "int16_t" => NativeType::I16,
        "unsigned short" | "unsigned short int" | "uint16_t" => NativeType::U16,
        "int" | "signed" | "signed int" | "int32_t" => NativeType::I32,
        "unsigned" | "unsigned int" | "uint32_t" => NativeType::U32,
        "long" | "long int" | "signed long" => NativeType::Long,
        "unsigned long" | "unsigned long int" => NativeType::ULong,
        "long long" | "long long int" | "int64_t" => NativeType::I64,
        "unsigned long long" | "unsigned long long int" | "uint64_t" => NativeType::U64,
        "size_t" | "uintptr_t" => NativeType::USize,
        "ptrdiff_t" | "ssize_t" | "intptr_t" | "lua_Integer" => NativeType::ISize,
        "float" => NativeType::F32,
        "double" | "lua_Number" => NativeType::F64,
        "lua_CFunction" => NativeType::Pointer,
        other => return Err(unknown(other)),
    };
    Ok(ty)
}

/// Parse a C declaration into an optional function name and its signature.
///
/// Handles `FILE *fopen(...)`, `int fclose(FILE *f)` and anonymous forms
/// like `void (lua_State *L)`.
pub fn parse_declaration(
    decl: &str,
) -> Result<(Option<String>, NativeSignature), DescriptorError> {
    let malformed = |reason: &str| DescriptorError::Malformed {
        decl: decl.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = decl.trim().trim_end_matches(';').trim();

    let paren_pos = trimmed
        .find('(')
        .ok_or_else(|| malformed("missing '('"))?;
    let close_paren = trimmed
        .rfind(')')
        .ok_or_else(|| malformed("missing ')'"))?;
    if close_paren < paren_pos || !trimmed[close_paren + 1..].trim().is_empty() {
        return Err(malformed("unbalanced parameter list"));
    }

    let before_paren = trimmed[..paren_pos].trim();
    let params_str = &trimmed[paren_pos + 1..close_paren];
    if before_paren.is_empty() {
        return Err(malformed("missing return type"));
    }

    // The last word names the function unless it is part of the return type
    let name_start = before_paren
        .rfind(|c: char| c.is_whitespace() || c == '*')
        .map(|i| i + 1)
        .unwrap_or(0);
    let candidate = &before_paren[name_start..];
    let (name, return_str) = if name_start > 0
        && !candidate.is_empty()
        && !TYPE_WORDS.contains(&candidate)
    {
        (Some(candidate.to_string()), &before_paren[..name_start])
    } else {
        (None, before_paren)
    };

    let ret = parse_c_type(return_str).map_err(|e| rewrap(e, decl))?;

    let mut params = Vec::new();
    let mut variadic = false;
    let params_str = params_str.trim();
    if !params_str.is_empty() && params_str != "void" {
        let pieces: Vec<&str> = params_str.split(',').map(str::trim).collect();
        for (i, piece) in pieces.iter().enumerate() {
            if *piece == "..." {
                if i + 1 != pieces.len() {
                    return Err(malformed("'...' must be the last parameter"));
                }
                if params.is_empty() {
                    return Err(malformed("'...' needs at least one fixed parameter"));
                }
                variadic = true;
                continue;
            }
            if piece.is_empty() {
                return Err(malformed("empty parameter"));
            }
            let ty = parse_c_type(piece).map_err(|e| rewrap(e, decl))?;
            if ty == NativeType::Void {
                return Err(malformed("'void' is not a parameter type"));
            }
            params.push(ty);
        }
    }

    Ok((
        name,
        NativeSignature {
            params,
            ret,
            variadic,
        },
    ))
}

/// Report type errors against the whole declaration rather than the fragment.
fn rewrap(err: DescriptorError, decl: &str) -> DescriptorError {
    match err {
        DescriptorError::UnknownType { ty, .. } => DescriptorError::UnknownType {
            decl: decl.to_string(),
            ty,
        },
        other => other,
    }
}

/// Check that a native symbol is a plain C identifier.
pub fn is_valid_symbol(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
