//! # peer-study command-line entry point
//!
//! ```bash
//! peer-study run --input survey.csv --clusters 7
//! peer-study match --students new_students.csv
//! ```
//!
//! Set `RUST_LOG=debug` for per-column classification detail.

#![warn(clippy::all, rust_2018_idioms)]

mod cli;

use anyhow::Result;
use clap::Parser as _;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    if let Err(e) = peer_study::logging::init(cli.log_dir.as_deref()) {
        eprintln!("Logging disabled: {e:#}");
    }

    cli::run_command(cli.command, cli.config.as_deref())
}
