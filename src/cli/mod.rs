//! CLI for bindery
//!
//! Provides command-line access to the engine over JSON files:
//! - query: run one query and print dumped results
//! - generate: print generated fixtures
//! - validate: check data records against definitions

mod args;
mod commands;
mod errors;
mod io;

pub use args::{BackfillArg, Cli, Command, DumpStyleArg, Source};
pub use commands::{generate, load_registry, query, run, run_command, validate, QueryArgs};
pub use errors::{CliError, CliErrorCode, CliResult};
