// CLI module
// Command-line interface, argument parsing and command execution

mod args;
mod commands;

pub use args::{parse_amount, CliArgs, Command, WatchArgs, DEFAULT_RPC_URL};
pub use commands::{execute, CommandError};

use clap::Parser;

/// Parse command-line arguments using clap
///
/// If parsing fails (e.g., invalid arguments, missing required arguments, or
/// --help flag), clap displays an error message or help text and exits the
/// process.
pub fn parse_args() -> CliArgs {
    CliArgs::parse()
}
