//! Constants of the Lua 5.1 / LuaJIT 2.1 C API.

use std::ffi::c_int;

pub const VERSION: &str = "Lua 5.1";
pub const RELEASE: &str = "Lua 5.1.4";
pub const VERSION_NUM: c_int = 501;
pub const COPYRIGHT: &str = "Copyright (C) 1994-2008 Lua.org, PUC-Rio";
pub const AUTHORS: &str = "R. Ierusalimschy, L. H. de Figueiredo & W. Celes";
/// Leading bytes of a precompiled chunk.
pub const SIGNATURE: &[u8] = b"\x1bLua";

pub const JIT_VERSION: &str = "LuaJIT 2.1";
pub const JIT_COPYRIGHT: &str = "Copyright (C) 2005-2023 Mike Pall";

/// `nresults` value asking for every result.
pub const MULTRET: c_int = -1;

pub const REGISTRY_INDEX: c_int = -10000;
pub const ENVIRON_INDEX: c_int = -10001;
pub const GLOBALS_INDEX: c_int = -10002;

/// Pseudo-index of the `i`-th upvalue of the running C closure.
pub const fn upvalue_index(i: c_int) -> c_int {
    GLOBALS_INDEX - i
}

pub const MIN_STACK: c_int = 20;

/// Reference values returned by `luaL_ref`.
pub const NO_REF: c_int = -2;
pub const REF_NIL: c_int = -1;

// Type tags
pub const TNONE: c_int = -1;
pub const TNIL: c_int = 0;
pub const TBOOLEAN: c_int = 1;
pub const TLIGHTUSERDATA: c_int = 2;
pub const TNUMBER: c_int = 3;
pub const TSTRING: c_int = 4;
pub const TTABLE: c_int = 5;
pub const TFUNCTION: c_int = 6;
pub const TUSERDATA: c_int = 7;
pub const TTHREAD: c_int = 8;

// lua_gc options
pub const GC_STOP: c_int = 0;
pub const GC_RESTART: c_int = 1;
pub const GC_COLLECT: c_int = 2;
pub const GC_COUNT: c_int = 3;
pub const GC_COUNTB: c_int = 4;
pub const GC_STEP: c_int = 5;
pub const GC_SETPAUSE: c_int = 6;
pub const GC_SETSTEPMUL: c_int = 7;
pub const GC_ISRUNNING: c_int = 9;

// Standard library names
pub const COLIBNAME: &str = "coroutine";
pub const MATHLIBNAME: &str = "math";
pub const STRLIBNAME: &str = "string";
pub const TABLIBNAME: &str = "table";
pub const IOLIBNAME: &str = "io";
pub const OSLIBNAME: &str = "os";
pub const LOADLIBNAME: &str = "package";
pub const DBLIBNAME: &str = "debug";
pub const BITLIBNAME: &str = "bit";
pub const JITLIBNAME: &str = "jit";
pub const FFILIBNAME: &str = "ffi";

/// Status codes returned by `lua_pcall`, `lua_resume` and the loaders.
///
/// Codes are passed through as-is; unknown values are kept in `Other`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Status {
    Ok,
    Yield,
    ErrRun,
    ErrSyntax,
    ErrMem,
    ErrErr,
    /// `luaL_loadfile` could not open or read the file.
    ErrFile,
    Other(c_int),
}

impl Status {
    pub fn from_code(code: c_int) -> Self {
        match code {
            0 => Status::Ok,
            1 => Status::Yield,
            2 => Status::ErrRun,
            3 => Status::ErrSyntax,
            4 => Status::ErrMem,
            5 => Status::ErrErr,
            6 => Status::ErrFile,
            other => Status::Other(other),
        }
    }

    pub fn code(self) -> c_int {
        match self {
            Status::Ok => 0,
            Status::Yield => 1,
            Status::ErrRun => 2,
            Status::ErrSyntax => 3,
            Status::ErrMem => 4,
            Status::ErrErr => 5,
            Status::ErrFile => 6,
            Status::Other(code) => code,
        }
    }

    pub fn is_ok(self) -> bool {
        self == Status::Ok
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Ok => "ok",
            Status::Yield => "yield",
            Status::ErrRun => "runtime error",
            Status::ErrSyntax => "syntax error",
            Status::ErrMem => "memory error",
            Status::ErrErr => "error handler error",
            Status::ErrFile => "file error",
            Status::Other(_) => "unknown status",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Other(code) => write!(f, "unknown status {code}"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Modes for `luaJIT_setmode`, combined with one of the flags below.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(i32)]
pub enum JitMode {
    Engine = 0,
    Debug = 1,
    Func = 2,
    AllFunc = 3,
    AllSubFunc = 4,
    Trace = 5,
    WrapCFunc = 0x10,
}

pub const JIT_MODE_MAX: c_int = JitMode::WrapCFunc as c_int + 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(i32)]
pub enum JitFlag {
    Off = 0x0000,
    On = 0x0100,
    Flush = 0x0200,
}

pub const JIT_MODE_MASK: c_int = 0x00ff;

impl JitMode {
    /// The combined `mode | flag` value passed to the VM.
    pub fn with(self, flag: JitFlag) -> c_int {
        self as c_int | flag as c_int
    }
}
