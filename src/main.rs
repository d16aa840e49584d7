//! bindery CLI entry point
//!
//! Parses arguments, runs one command and exits non-zero on failure.
//! Logging goes to stderr, filtered by `RUST_LOG` (default `bindery=warn`).

use bindery::cli;

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("bindery=warn")),
        )
        .init();

    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
