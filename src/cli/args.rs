//! CLI argument definitions using clap
//!
//! Commands:
//! - warehousedb serve [--config <path>]
//! - warehousedb compile --schema <path> [--name <name>] [--item-name <name>]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// warehousedb - declare record types at runtime and store typed items
#[derive(Parser, Debug)]
#[command(name = "warehousedb")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP server
    Serve {
        /// Path to configuration file; defaults apply when omitted
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Compile a warehouse schema file and print its table definition
    Compile {
        /// JSON file holding either a field mapping or a full warehouse
        /// declaration (`name`, `item_name`, `item_schema`)
        #[arg(long)]
        schema: PathBuf,

        /// Warehouse name, overriding the file
        #[arg(long)]
        name: Option<String>,

        /// Item name, overriding the file
        #[arg(long)]
        item_name: Option<String>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve_without_config() {
        let cli = Cli::try_parse_from(["warehousedb", "serve"]).unwrap();
        assert!(matches!(cli.command, Command::Serve { config: None }));
    }

    #[test]
    fn test_parse_compile() {
        let cli = Cli::try_parse_from([
            "warehousedb",
            "compile",
            "--schema",
            "payroll.json",
            "--item-name",
            "employee",
        ])
        .unwrap();
        match cli.command {
            Command::Compile {
                schema,
                name,
                item_name,
            } => {
                assert_eq!(schema, PathBuf::from("payroll.json"));
                assert_eq!(name, None);
                assert_eq!(item_name.as_deref(), Some("employee"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
