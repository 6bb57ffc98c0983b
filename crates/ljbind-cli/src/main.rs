use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

mod check;
mod run;
mod symbols;
mod utils;

#[cfg(test)]
mod tests;

use check::handle_check;
use run::handle_run;
use symbols::handle_symbols;

/// Get the version string including git revision
fn version() -> &'static str {
    concat!(env!("CARGO_PKG_VERSION"), " (git:", env!("GIT_HASH"), ")")
}

#[derive(Parser)]
#[command(
    author,
    version = version(),
    about = "Runtime bindings for the LuaJIT C API",
    long_about = None,
    disable_help_subcommand = true
)]
pub(crate) struct Cli {
    /// Path to the LuaJIT shared library (overrides LJBIND_LIBRARY)
    #[arg(long, global = true, value_name = "PATH")]
    pub lib: Option<PathBuf>,
    /// Log binding activity (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Option<Commands>,
    /// The script to run (default if no subcommand)
    pub file: Option<String>,
}

#[derive(Subcommand, Debug, PartialEq)]
pub(crate) enum Commands {
    /// Run a Lua script with the standard libraries open
    Run {
        /// The script to execute, or "-" for stdin
        file: String,
        /// Arguments passed to the chunk as `...`
        #[arg(trailing_var_arg = true)]
        args: Vec<String>,
    },
    /// Verify that a library exports every symbol of the given tables
    Check {
        /// RON table files; the built-in LuaJIT tables when empty
        tables: Vec<PathBuf>,
    },
    /// List the built-in symbol tables
    Symbols {
        /// Only list this table (e.g. "lua-core")
        #[arg(short, long)]
        table: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    utils::init_logging(cli.verbose);
    let lib = cli.lib.as_deref();

    match &cli.command {
        Some(Commands::Run { file, args }) => {
            handle_run(lib, file, args);
        }
        Some(Commands::Check { tables }) => {
            handle_check(lib, tables);
        }
        Some(Commands::Symbols { table }) => {
            handle_symbols(table.as_deref());
        }
        None => {
            let Some(file) = &cli.file else {
                // No file and no subcommand: print help
                let _ = Cli::command().print_help();
                println!();
                std::process::exit(0);
            };
            handle_run(lib, file, &[]);
        }
    }
}
