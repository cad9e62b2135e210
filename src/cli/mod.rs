//! CLI module for warehousedb
//!
//! Provides command-line interface for:
//! - serve: Boot the service and serve HTTP
//! - compile: Compile a schema file and print the table definition

mod args;
mod commands;
mod errors;

pub use args::{Cli, Command};
pub use commands::{build_manager, compile, run, run_command, serve, Config};
pub use errors::{CliError, CliResult};
