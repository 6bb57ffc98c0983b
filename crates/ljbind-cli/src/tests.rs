//! Tests for CLI parsing and utilities

#[cfg(test)]
mod tests {
    use super::super::check::check_table;
    use super::super::symbols::{builtin_tables, format_table};
    use super::super::utils::*;
    use super::super::{Cli, Commands};
    use clap::Parser;
    use ljbind_core::{LibraryHandle, SymbolTable};
    use std::fs;
    use std::path::PathBuf;

    #[test]
    fn test_parse_run_with_args() {
        let cli = Cli::try_parse_from(["ljbind", "run", "script.lua", "a", "--b"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::Run {
                file: "script.lua".to_string(),
                args: vec!["a".to_string(), "--b".to_string()],
            })
        );
        assert!(!cli.verbose);
    }

    #[test]
    fn test_parse_global_flags() {
        let cli = Cli::try_parse_from(["ljbind", "check", "--lib", "/opt/libluajit.so", "-v"]).unwrap();
        assert_eq!(cli.lib, Some(PathBuf::from("/opt/libluajit.so")));
        assert!(cli.verbose);
        assert_eq!(cli.command, Some(Commands::Check { tables: vec![] }));
    }

    #[test]
    fn test_parse_bare_file() {
        let cli = Cli::try_parse_from(["ljbind", "hello.lua"]).unwrap();
        assert_eq!(cli.command, None);
        assert_eq!(cli.file.as_deref(), Some("hello.lua"));
    }

    #[test]
    fn test_parse_symbols_filter() {
        let cli = Cli::try_parse_from(["ljbind", "symbols", "--table", "luajit"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::Symbols {
                table: Some("luajit".to_string())
            })
        );
    }

    #[test]
    fn test_read_source_from_file() {
        let temp_path = std::env::temp_dir().join("ljbind_cli_test_read.lua");
        fs::write(&temp_path, "return 1").unwrap();

        let result = read_source(temp_path.to_str().unwrap()).unwrap();
        assert_eq!(result, b"return 1");

        let _ = fs::remove_file(temp_path);
    }

    #[test]
    fn test_read_source_nonexistent_file() {
        assert!(read_source("/nonexistent/file/path.lua").is_err());
    }

    #[test]
    fn test_chunk_name() {
        assert_eq!(chunk_name("-"), "=stdin");
        assert_eq!(chunk_name("a/b.lua"), "@a/b.lua");
    }

    #[test]
    fn test_default_filter() {
        assert_eq!(default_filter(false), "warn");
        assert!(default_filter(true).contains("ljbind_core=debug"));
    }

    #[test]
    fn test_read_table_reports_path() {
        let temp_path = std::env::temp_dir().join("ljbind_cli_test_bad.ron");
        fs::write(&temp_path, "(name: \"t\", symbols: [(name: \"f\", decl: \"int f(widget)\")])").unwrap();

        let err = read_table(&temp_path).unwrap_err();
        assert!(err.contains("ljbind_cli_test_bad.ron"), "{err}");
        assert!(err.contains("widget"), "{err}");

        let _ = fs::remove_file(temp_path);
    }

    #[cfg(unix)]
    #[test]
    fn test_check_table_against_process() {
        let table = SymbolTable::from_ron(
            r#"(
                name: "libc-subset",
                symbols: [
                    (name: "strlen", decl: "size_t strlen(const char *s)"),
                    (name: "missing", symbol: "ljbind_not_exported", decl: "int (void)"),
                ],
            )"#,
        )
        .unwrap();
        let process = LibraryHandle::this_process().unwrap();

        let report = check_table(&process, &table, false);
        assert_eq!(report.name, "libc-subset");
        assert_eq!(report.total, 2);
        assert_eq!(report.missing, vec!["ljbind_not_exported".to_string()]);
        assert!(!report.is_complete());
    }

    #[test]
    fn test_builtin_tables_are_listed() {
        let tables = builtin_tables().unwrap();
        let names: Vec<&str> = tables.iter().map(|t| t.name()).collect();
        assert_eq!(names, ["lua-core", "lua-aux", "lua-libs", "luajit", "lua-libs-optional"]);

        let listing = format_table(&tables[0]);
        assert!(listing.starts_with("[lua-core]\n"));
        assert!(listing.contains("lua_gettop"));
    }
}
