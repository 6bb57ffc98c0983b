//! `run` subcommand handler

use crate::utils::{chunk_name, read_source};
use ljbind_lua::consts::MULTRET;
use ljbind_lua::{Api, LuaResult, State, Status};
use std::ffi::c_int;
use std::path::Path;
use std::process;
use std::sync::Arc;

/// Load and run `source`, passing `args` as the chunk's varargs.
/// A script failure comes back as its status and message.
pub fn run_chunk(
    state: &State,
    source: &[u8],
    name: &str,
    args: &[String],
) -> LuaResult<Option<(Status, String)>> {
    let lua = state.lua();
    lua.open_libs()?;

    let mut status = lua.load_buffer(source, name)?;
    if status.is_ok() {
        for arg in args {
            lua.push_bytes(arg.as_bytes())?;
        }
        status = lua.pcall(args.len() as c_int, MULTRET, 0)?;
    }
    if status.is_ok() {
        return Ok(None);
    }
    let message = lua
        .to_string_lossy(-1)?
        .unwrap_or_else(|| "(error object is not a string)".to_string());
    Ok(Some((status, message)))
}

/// Execute a Lua script file
pub fn handle_run(lib: Option<&Path>, file: &str, args: &[String]) {
    let source = match read_source(file) {
        Ok(content) => content,
        Err(err) => {
            eprintln!("Error reading file '{file}': {err}");
            process::exit(1);
        }
    };

    let result = Api::load(lib).and_then(|api| State::open(Arc::new(api))).and_then(|state| {
        let outcome = run_chunk(&state, &source, &chunk_name(file), args);
        state.close()?;
        outcome
    });

    match result {
        Ok(None) => {}
        Ok(Some((status, message))) => {
            eprintln!("{status}: {message}");
            process::exit(1);
        }
        Err(err) => {
            eprintln!("Error: {err}");
            process::exit(1);
        }
    }
}
