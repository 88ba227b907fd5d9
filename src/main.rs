//! elb-ingestor CLI: ship load balancer access logs to a search index until interrupted.

use anyhow::Result;
use clap::Parser;
use elb_ingestor::cli::{Cli, handle_run};
use std::time::Instant;

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();
    handle_run(&cli)?;
    log::debug!("Total time: {:?}", start_time.elapsed());
    Ok(())
}
