//! `check` subcommand handler

use crate::utils::read_table;
use ljbind_core::{LibraryHandle, SymbolTable, load};
use ljbind_lua::api::{OptionalLib, required_tables};
use std::path::{Path, PathBuf};
use std::process;
use tracing::debug;

/// Result of resolving one table against a library.
#[derive(Debug, PartialEq)]
pub struct TableReport {
    pub name: String,
    pub total: usize,
    /// Native symbols the library does not export
    pub missing: Vec<String>,
    /// Missing symbols only warn
    pub optional: bool,
}

impl TableReport {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

pub fn check_table(lib: &LibraryHandle, table: &SymbolTable, optional: bool) -> TableReport {
    let missing: Vec<String> = table
        .iter()
        .filter(|desc| lib.symbol_address(&desc.native_symbol).is_none())
        .map(|desc| desc.native_symbol.clone())
        .collect();
    debug!(table = table.name(), missing = missing.len(), "checked table");
    TableReport {
        name: table.name().to_string(),
        total: table.len(),
        missing,
        optional,
    }
}

/// The tables to check: RON files when given, the built-in ones otherwise.
fn collect_tables(files: &[PathBuf]) -> Result<Vec<(SymbolTable, bool)>, String> {
    if files.is_empty() {
        let mut tables: Vec<_> = required_tables()
            .map_err(|err| err.to_string())?
            .into_iter()
            .map(|table| (table, false))
            .collect();
        tables.push((OptionalLib::symbol_table().map_err(|err| err.to_string())?, true));
        return Ok(tables);
    }
    files
        .iter()
        .map(|path| read_table(path).map(|table| (table, false)))
        .collect()
}

/// Verify a library exports every symbol of the given tables
pub fn handle_check(lib: Option<&Path>, files: &[PathBuf]) {
    let tables = match collect_tables(files) {
        Ok(tables) => tables,
        Err(err) => {
            eprintln!("Error reading symbol table: {err}");
            process::exit(1);
        }
    };

    let library = match load(lib) {
        Ok(library) => library,
        Err(err) => {
            eprintln!("Error: {err}");
            process::exit(1);
        }
    };
    println!("library: {}", library.key().to_string_lossy());

    let mut complete = true;
    for (table, optional) in &tables {
        let report = check_table(&library, table, *optional);
        let found = report.total - report.missing.len();
        println!("{}: {found}/{} symbols", report.name, report.total);
        for symbol in &report.missing {
            let label = if report.optional { "absent (optional)" } else { "missing" };
            println!("  {label}: {symbol}");
        }
        complete &= report.optional || report.is_complete();
    }

    if complete {
        println!("Check: OK");
    } else {
        eprintln!("Check failed: required symbols are missing");
        process::exit(1);
    }
}
