//! The bound LuaJIT API: every table resolved against one library.

use crate::api::{Aux, Core, Jit, Lib, OptionalLib};
use crate::error::LuaResult;
use ljbind_core::{BindingTable, BoundFn, LibraryHandle, LoaderConfig, bind_all, bind_optional};
use std::path::Path;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

static GLOBAL: OnceLock<Arc<Api>> = OnceLock::new();

/// Callables for the whole C API.
///
/// Built once, read-only afterwards, and shared between states through an
/// `Arc`. Required tables are bound all-or-nothing; a library missing any of
/// them is rejected.
#[derive(Debug)]
pub struct Api {
    library: LibraryHandle,
    core: BindingTable,
    aux: BindingTable,
    libs: BindingTable,
    jit: BindingTable,
    optional: BindingTable,
    missing_optional: Vec<String>,
}

impl Api {
    /// Load the LuaJIT library and bind every table.
    ///
    /// `path_hint` overrides the `LJBIND_LIBRARY` variable and the default
    /// candidates.
    pub fn load(path_hint: Option<&Path>) -> LuaResult<Api> {
        let library = ljbind_core::load(path_hint)?;
        Api::from_library(&library)
    }

    /// Like `load`, with an explicit loader configuration.
    pub fn load_with(config: &LoaderConfig, path_hint: Option<&Path>) -> LuaResult<Api> {
        let library = config.load(path_hint)?;
        Api::from_library(&library)
    }

    /// Bind against an already loaded library, e.g. the running process for
    /// a statically linked VM.
    pub fn from_library(library: &LibraryHandle) -> LuaResult<Api> {
        let core = bind_all(library, &Core::symbol_table()?)?;
        let aux = bind_all(library, &Aux::symbol_table()?)?;
        let libs = bind_all(library, &Lib::symbol_table()?)?;
        let jit = bind_all(library, &Jit::symbol_table()?)?;
        let (optional, missing_optional) = bind_optional(library, &OptionalLib::symbol_table()?);

        debug!(
            library = ?library.key(),
            symbols = core.len() + aux.len() + libs.len() + jit.len() + optional.len(),
            missing = missing_optional.len(),
            "bound LuaJIT API"
        );

        Ok(Api {
            library: library.clone(),
            core,
            aux,
            libs,
            jit,
            optional,
            missing_optional,
        })
    }

    /// Process-wide instance, loaded on first use with default settings.
    ///
    /// Initialization runs at most once successfully; a failed attempt is
    /// not cached, so a later call may retry after the environment changes.
    /// Code that can pass an `Arc<Api>` around should prefer `load`.
    pub fn global() -> LuaResult<Arc<Api>> {
        if let Some(api) = GLOBAL.get() {
            return Ok(Arc::clone(api));
        }
        let loaded = Arc::new(Api::load(None)?);
        let api = GLOBAL.get_or_init(|| {
            info!(library = ?loaded.library.key(), "initialized global LuaJIT API");
            loaded
        });
        Ok(Arc::clone(api))
    }

    pub fn library(&self) -> &LibraryHandle {
        &self.library
    }

    pub fn core(&self, op: Core) -> &BoundFn {
        &self.core[op.index()]
    }

    pub fn aux(&self, op: Aux) -> &BoundFn {
        &self.aux[op.index()]
    }

    pub fn lib(&self, op: Lib) -> &BoundFn {
        &self.libs[op.index()]
    }

    pub fn jit(&self, op: Jit) -> &BoundFn {
        &self.jit[op.index()]
    }

    /// An optional opener, if this build exports it.
    pub fn optional(&self, op: OptionalLib) -> Option<&BoundFn> {
        self.optional.get(op.logical_name())
    }

    /// Native symbols of optional tables this library lacks.
    pub fn missing_optional(&self) -> &[String] {
        &self.missing_optional
    }

    /// Every bound table, required ones first.
    pub fn tables(&self) -> [&BindingTable; 5] {
        [&self.core, &self.aux, &self.libs, &self.jit, &self.optional]
    }
}
