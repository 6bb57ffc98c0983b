// Shared setup for tests that need a LuaJIT library

use ljbind_lua::{Api, State};
use std::sync::{Arc, OnceLock};

/// The bound API. Panics when no LuaJIT library can be loaded, naming what
/// was tried; set `LJBIND_LIBRARY` to point the tests at a specific build.
pub fn api() -> Arc<Api> {
    static API: OnceLock<Arc<Api>> = OnceLock::new();
    let api = API.get_or_init(|| match Api::load(None) {
        Ok(api) => Arc::new(api),
        Err(err) => panic!("LuaJIT is required for these tests: {err}"),
    });
    Arc::clone(api)
}

/// A fresh state with the standard libraries open.
pub fn open_state() -> State {
    let state = State::open(api()).expect("luaL_newstate");
    state.lua().open_libs().expect("luaL_openlibs");
    state
}
