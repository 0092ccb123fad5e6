//! plateqc CLI
//!
//! Command-line front end for whole-image calibration, single-cell cleaning,
//! LoadData reconciliation and engine dispatch.

use anyhow::Result;
use clap::Parser;

mod cli;

use cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    cli::init_logging(cli.verbosity());

    cli::dispatch(cli)
}
