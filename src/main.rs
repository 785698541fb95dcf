//! Datawatch CLI: watch a data directory, or run one file with --analyze.

use anyhow::Result;
use clap::Parser;
use datawatch::engine::arg_parser::Cli;
use datawatch::engine::handle_run;
use std::time::Instant;

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();
    handle_run(&cli)?;
    log::debug!("Total time: {:?}", start_time.elapsed());
    Ok(())
}
