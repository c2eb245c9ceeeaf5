//! Lectern CLI: serve the ingestion API or run one ingestion locally.

use anyhow::Result;
use clap::Parser;
use lectern::engine::arg_parser::Cli;
use lectern::engine::handle_run;
use std::time::Instant;

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();
    handle_run(&cli)?;
    log::debug!("Total time: {:?}", start_time.elapsed());
    Ok(())
}
