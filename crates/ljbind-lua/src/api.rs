//! Symbol tables for the LuaJIT C API.
//!
//! Each table is declared once as `(operation, logical name, C prototype)`
//! and expands into an operation enum plus the prototype list the binder
//! consumes. Operations index the bound table directly, since binding keeps
//! declaration order.
//!
//! A few prototypes differ from the headers on purpose:
//! - integer returns that carry a truth value are declared `bool`, so the
//!   binder performs the conversion
//! - functions returning a string together with its length are declared
//!   `const void *` so the bytes are read with that length, not up to the
//!   first NUL
//! - function pointer parameters whose typedef the parser does not know are
//!   declared `void *`

use ljbind_core::{DescriptorError, SymbolTable};

macro_rules! symbol_table {
    (
        $(#[$meta:meta])*
        $vis:vis enum $op:ident, $table:ident = $label:literal {
            $($variant:ident => $name:literal : $proto:literal,)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        $vis enum $op {
            $($variant,)*
        }

        impl $op {
            pub const ALL: &'static [$op] = &[$($op::$variant,)*];
            pub const TABLE_NAME: &'static str = $label;

            /// Position in the bound table.
            pub fn index(self) -> usize {
                self as usize
            }

            pub fn logical_name(self) -> &'static str {
                $table[self as usize].0
            }

            pub fn prototype(self) -> &'static str {
                $table[self as usize].1
            }

            /// Build the validated descriptor table.
            pub fn symbol_table() -> Result<SymbolTable, DescriptorError> {
                SymbolTable::from_prototypes($label, $table)
            }
        }

        $vis const $table: &[(&str, &str)] = &[$(($name, $proto),)*];
    };
}

symbol_table! {
    /// `lua_*` entry points.
    pub enum Core, CORE = "lua-core" {
        Close => "close": "void lua_close(lua_State *L)",
        NewThread => "newthread": "lua_State *lua_newthread(lua_State *L)",
        GetTop => "gettop": "int lua_gettop(lua_State *L)",
        SetTop => "settop": "void lua_settop(lua_State *L, int idx)",
        PushValue => "pushvalue": "void lua_pushvalue(lua_State *L, int idx)",
        Remove => "remove": "void lua_remove(lua_State *L, int idx)",
        Insert => "insert": "void lua_insert(lua_State *L, int idx)",
        Replace => "replace": "void lua_replace(lua_State *L, int idx)",
        CheckStack => "checkstack": "bool lua_checkstack(lua_State *L, int sz)",
        XMove => "xmove": "void lua_xmove(lua_State *from, lua_State *to, int n)",
        IsNumber => "isnumber": "bool lua_isnumber(lua_State *L, int idx)",
        IsString => "isstring": "bool lua_isstring(lua_State *L, int idx)",
        IsCFunction => "iscfunction": "bool lua_iscfunction(lua_State *L, int idx)",
        IsUserdata => "isuserdata": "bool lua_isuserdata(lua_State *L, int idx)",
        Type => "type": "int lua_type(lua_State *L, int idx)",
        TypeName => "typename": "const char *lua_typename(lua_State *L, int tp)",
        Equal => "equal": "bool lua_equal(lua_State *L, int idx1, int idx2)",
        RawEqual => "rawequal": "bool lua_rawequal(lua_State *L, int idx1, int idx2)",
        LessThan => "lessthan": "bool lua_lessthan(lua_State *L, int idx1, int idx2)",
        ToNumber => "tonumber": "lua_Number lua_tonumber(lua_State *L, int idx)",
        ToInteger => "tointeger": "lua_Integer lua_tointeger(lua_State *L, int idx)",
        ToBoolean => "toboolean": "bool lua_toboolean(lua_State *L, int idx)",
        ToLString => "tolstring": "const void *lua_tolstring(lua_State *L, int idx, size_t *len)",
        ObjLen => "objlen": "size_t lua_objlen(lua_State *L, int idx)",
        ToUserdata => "touserdata": "void *lua_touserdata(lua_State *L, int idx)",
        ToThread => "tothread": "lua_State *lua_tothread(lua_State *L, int idx)",
        ToPointer => "topointer": "const void *lua_topointer(lua_State *L, int idx)",
        ToCFunction => "tocfunction": "lua_CFunction lua_tocfunction(lua_State *L, int idx)",
        PushNil => "pushnil": "void lua_pushnil(lua_State *L)",
        PushNumber => "pushnumber": "void lua_pushnumber(lua_State *L, lua_Number n)",
        PushInteger => "pushinteger": "void lua_pushinteger(lua_State *L, lua_Integer n)",
        PushLString => "pushlstring": "void lua_pushlstring(lua_State *L, const char *s, size_t len)",
        PushString => "pushstring": "void lua_pushstring(lua_State *L, const char *s)",
        PushBoolean => "pushboolean": "void lua_pushboolean(lua_State *L, bool b)",
        PushLightUserdata => "pushlightuserdata": "void lua_pushlightuserdata(lua_State *L, void *p)",
        PushThread => "pushthread": "bool lua_pushthread(lua_State *L)",
        PushCClosure => "pushcclosure": "void lua_pushcclosure(lua_State *L, lua_CFunction fn, int n)",
        GetTable => "gettable": "void lua_gettable(lua_State *L, int idx)",
        GetField => "getfield": "void lua_getfield(lua_State *L, int idx, const char *k)",
        RawGet => "rawget": "void lua_rawget(lua_State *L, int idx)",
        RawGetI => "rawgeti": "void lua_rawgeti(lua_State *L, int idx, int n)",
        CreateTable => "createtable": "void lua_createtable(lua_State *L, int narr, int nrec)",
        NewUserdata => "newuserdata": "void *lua_newuserdata(lua_State *L, size_t sz)",
        GetMetatable => "getmetatable": "bool lua_getmetatable(lua_State *L, int objindex)",
        GetFenv => "getfenv": "void lua_getfenv(lua_State *L, int idx)",
        SetTable => "settable": "void lua_settable(lua_State *L, int idx)",
        SetField => "setfield": "void lua_setfield(lua_State *L, int idx, const char *k)",
        RawSet => "rawset": "void lua_rawset(lua_State *L, int idx)",
        RawSetI => "rawseti": "void lua_rawseti(lua_State *L, int idx, int n)",
        SetMetatable => "setmetatable": "int lua_setmetatable(lua_State *L, int objindex)",
        SetFenv => "setfenv": "bool lua_setfenv(lua_State *L, int idx)",
        Call => "call": "void lua_call(lua_State *L, int nargs, int nresults)",
        PCall => "pcall": "int lua_pcall(lua_State *L, int nargs, int nresults, int errfunc)",
        Yield => "yield": "int lua_yield(lua_State *L, int nresults)",
        Resume => "resume": "int lua_resume(lua_State *L, int narg)",
        Status => "status": "int lua_status(lua_State *L)",
        Gc => "gc": "int lua_gc(lua_State *L, int what, int data)",
        Error => "error": "int lua_error(lua_State *L)",
        Next => "next": "int lua_next(lua_State *L, int idx)",
        Concat => "concat": "void lua_concat(lua_State *L, int n)",
    }
}

symbol_table! {
    /// `luaL_*` auxiliary library.
    pub enum Aux, AUX = "lua-aux" {
        Register => "register": "void luaL_register(lua_State *L, const char *libname, const luaL_Reg *l)",
        GetMetafield => "getmetafield": "bool luaL_getmetafield(lua_State *L, int obj, const char *e)",
        CallMeta => "callmeta": "bool luaL_callmeta(lua_State *L, int obj, const char *e)",
        TypeError => "typerror": "int luaL_typerror(lua_State *L, int narg, const char *tname)",
        ArgError => "argerror": "int luaL_argerror(lua_State *L, int numarg, const char *extramsg)",
        CheckLString => "checklstring": "const void *luaL_checklstring(lua_State *L, int numarg, size_t *l)",
        OptLString => "optlstring": "const void *luaL_optlstring(lua_State *L, int numarg, const char *def, size_t *l)",
        CheckNumber => "checknumber": "lua_Number luaL_checknumber(lua_State *L, int numarg)",
        OptNumber => "optnumber": "lua_Number luaL_optnumber(lua_State *L, int narg, lua_Number def)",
        CheckInteger => "checkinteger": "lua_Integer luaL_checkinteger(lua_State *L, int numarg)",
        OptInteger => "optinteger": "lua_Integer luaL_optinteger(lua_State *L, int narg, lua_Integer def)",
        CheckStack => "checkstack": "void luaL_checkstack(lua_State *L, int sz, const char *msg)",
        CheckType => "checktype": "void luaL_checktype(lua_State *L, int narg, int t)",
        CheckAny => "checkany": "void luaL_checkany(lua_State *L, int narg)",
        NewMetatable => "newmetatable": "bool luaL_newmetatable(lua_State *L, const char *tname)",
        CheckUdata => "checkudata": "void *luaL_checkudata(lua_State *L, int ud, const char *tname)",
        Where => "where": "void luaL_where(lua_State *L, int lvl)",
        Error => "error": "int luaL_error(lua_State *L, const char *fmt, ...)",
        NewState => "newstate": "lua_State *luaL_newstate(void)",
        LoadString => "loadstring": "int luaL_loadstring(lua_State *L, const char *s)",
        LoadBuffer => "loadbuffer": "int luaL_loadbuffer(lua_State *L, const char *buff, size_t sz, const char *name)",
        Ref => "ref": "int luaL_ref(lua_State *L, int t)",
        Unref => "unref": "void luaL_unref(lua_State *L, int t, int ref)",
    }
}

symbol_table! {
    /// Standard library openers present in every LuaJIT build.
    pub enum Lib, LIBS = "lua-libs" {
        Base => "base": "int luaopen_base(lua_State *L)",
        Math => "math": "int luaopen_math(lua_State *L)",
        String => "string": "int luaopen_string(lua_State *L)",
        Table => "table": "int luaopen_table(lua_State *L)",
        Io => "io": "int luaopen_io(lua_State *L)",
        Os => "os": "int luaopen_os(lua_State *L)",
        Package => "package": "int luaopen_package(lua_State *L)",
        Debug => "debug": "int luaopen_debug(lua_State *L)",
        Bit => "bit": "int luaopen_bit(lua_State *L)",
        Jit => "jit": "int luaopen_jit(lua_State *L)",
        Ffi => "ffi": "int luaopen_ffi(lua_State *L)",
        OpenLibs => "openlibs": "void luaL_openlibs(lua_State *L)",
    }
}

symbol_table! {
    /// Openers only newer builds export; bound with `bind_optional`.
    pub enum OptionalLib, OPTIONAL_LIBS = "lua-libs-optional" {
        StringBuffer => "string_buffer": "int luaopen_string_buffer(lua_State *L)",
    }
}

symbol_table! {
    /// `luaJIT_*` control and profiler entry points.
    pub enum Jit, JIT = "luajit" {
        SetMode => "setmode": "bool luaJIT_setmode(lua_State *L, int idx, int mode)",
        ProfileStart => "profile_start": "void luaJIT_profile_start(lua_State *L, const char *mode, void *cb, void *data)",
        ProfileStop => "profile_stop": "void luaJIT_profile_stop(lua_State *L)",
        ProfileDumpStack => "profile_dumpstack": "const void *luaJIT_profile_dumpstack(lua_State *L, const char *fmt, int depth, size_t *len)",
    }
}

impl Lib {
    /// Name the library registers under, as passed to its opener.
    /// The base library registers globals and takes an empty name.
    pub fn module_name(self) -> &'static str {
        use crate::consts::*;
        match self {
            Lib::Base | Lib::OpenLibs => "",
            Lib::Math => MATHLIBNAME,
            Lib::String => STRLIBNAME,
            Lib::Table => TABLIBNAME,
            Lib::Io => IOLIBNAME,
            Lib::Os => OSLIBNAME,
            Lib::Package => LOADLIBNAME,
            Lib::Debug => DBLIBNAME,
            Lib::Bit => BITLIBNAME,
            Lib::Jit => JITLIBNAME,
            Lib::Ffi => FFILIBNAME,
        }
    }
}

/// Every required table, in binding order.
pub fn required_tables() -> Result<Vec<SymbolTable>, DescriptorError> {
    Ok(vec![
        Core::symbol_table()?,
        Aux::symbol_table()?,
        Lib::symbol_table()?,
        Jit::symbol_table()?,
    ])
}
