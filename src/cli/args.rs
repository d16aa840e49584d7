//! CLI argument definitions using clap
//!
//! Commands:
//! - bindery query --defs <path> --type <name> [--data <path>] [--where <expr>] [--dump-style <style>]
//! - bindery generate --defs <path> --type <name> [--count <n>]
//! - bindery validate --defs <path> --data <path>

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::query::Backfill;
use crate::resource::DumpStyle;

/// bindery - query resource definitions over JSON data
#[derive(Parser, Debug)]
#[command(name = "bindery")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Inputs shared by every command
#[derive(Args, Debug, Clone)]
pub struct Source {
    /// JSON array of resource definitions
    #[arg(long)]
    pub defs: PathBuf,

    /// JSON object mapping type names to arrays of records
    #[arg(long)]
    pub data: Option<PathBuf>,

    /// Engine configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackfillArg {
    Ephemeral,
    Persistent,
}

impl From<BackfillArg> for Backfill {
    fn from(arg: BackfillArg) -> Self {
        match arg {
            BackfillArg::Ephemeral => Backfill::Ephemeral,
            BackfillArg::Persistent => Backfill::Persistent,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DumpStyleArg {
    #[default]
    Nested,
    SideLoaded,
}

impl From<DumpStyleArg> for DumpStyle {
    fn from(arg: DumpStyleArg) -> Self {
        match arg {
            DumpStyleArg::Nested => DumpStyle::Nested,
            DumpStyleArg::SideLoaded => DumpStyle::SideLoaded,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one query and print the dumped results
    Query {
        #[command(flatten)]
        source: Source,

        /// Resource type to query
        #[arg(long = "type")]
        type_name: String,

        /// Comma separated key paths, e.g. `name,owner.name`
        #[arg(long)]
        select: Option<String>,

        /// Filter expression, e.g. `age >= 3 and color == 'red'`
        #[arg(long = "where")]
        filter: Option<String>,

        /// Sort keys, e.g. `age desc, name`
        #[arg(long)]
        order_by: Option<String>,

        #[arg(long)]
        limit: Option<i64>,

        #[arg(long)]
        offset: Option<i64>,

        /// Pad short results with generated resources
        #[arg(long, value_enum)]
        backfill: Option<BackfillArg>,

        /// Render related objects inline or side-loaded under `links`
        #[arg(long, value_enum, default_value_t = DumpStyleArg::Nested)]
        dump_style: DumpStyleArg,
    },

    /// Print generated resources of one type
    Generate {
        #[command(flatten)]
        source: Source,

        #[arg(long = "type")]
        type_name: String,

        #[arg(long, default_value_t = 1)]
        count: usize,
    },

    /// Validate data records against the definitions
    Validate {
        #[command(flatten)]
        source: Source,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
