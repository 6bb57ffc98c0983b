//! `symbols` subcommand handler

use ljbind_core::{DescriptorError, SymbolTable};
use ljbind_lua::api::{OptionalLib, required_tables};
use std::process;

pub fn builtin_tables() -> Result<Vec<SymbolTable>, DescriptorError> {
    let mut tables = required_tables()?;
    tables.push(OptionalLib::symbol_table()?);
    Ok(tables)
}

/// One line per symbol: logical name, native symbol, signature.
pub fn format_table(table: &SymbolTable) -> String {
    let mut out = format!("[{}]\n", table.name());
    for desc in table {
        out.push_str(&format!(
            "  {:<20} {:<28} {}\n",
            desc.logical_name, desc.native_symbol, desc.signature
        ));
    }
    out
}

/// List the built-in symbol tables
pub fn handle_symbols(only: Option<&str>) {
    let tables = match builtin_tables() {
        Ok(tables) => tables,
        Err(err) => {
            eprintln!("Error: {err}");
            process::exit(1);
        }
    };

    let mut shown = 0;
    for table in tables.iter().filter(|t| only.is_none_or(|name| t.name() == name)) {
        print!("{}", format_table(table));
        shown += 1;
    }
    if shown == 0 {
        let names: Vec<&str> = tables.iter().map(|t| t.name()).collect();
        eprintln!("Unknown table '{}' (known: {})", only.unwrap_or_default(), names.join(", "));
        process::exit(1);
    }
}
