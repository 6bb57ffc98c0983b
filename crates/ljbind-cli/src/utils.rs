//! Shared CLI utilities for reading input and setting up logging

use ljbind_core::SymbolTable;
use std::fs;
use std::io::{self, Read};
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Read a script from a file or stdin.
/// If `file` is "-", reads from stdin. Otherwise reads from the specified file.
pub fn read_source(file: &str) -> io::Result<Vec<u8>> {
    if file == "-" {
        let mut source = Vec::new();
        io::stdin().read_to_end(&mut source)?;
        Ok(source)
    } else {
        fs::read(file)
    }
}

/// Chunk name shown in Lua error messages and tracebacks.
pub fn chunk_name(file: &str) -> String {
    if file == "-" {
        "=stdin".to_string()
    } else {
        format!("@{file}")
    }
}

/// Load a RON symbol table, with the file name in the error.
pub fn read_table(path: &Path) -> Result<SymbolTable, String> {
    let text = fs::read_to_string(path).map_err(|err| format!("{}: {err}", path.display()))?;
    SymbolTable::from_ron(&text).map_err(|err| format!("{}: {err}", path.display()))
}

/// `RUST_LOG` wins; otherwise `warn`, or `debug` for the ljbind crates
/// with `--verbose`.
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "warn,ljbind_core=debug,ljbind_lua=debug,ljbind=debug"
    } else {
        "warn"
    }
}

pub fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}
