//! warehousedb CLI entry point
//!
//! Parses arguments and dispatches through `cli::run`. Errors are printed
//! to stderr and end the process with a non-zero exit code.

use warehousedb::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("[{}] {}", e.code(), e);
        std::process::exit(1);
    }
}
