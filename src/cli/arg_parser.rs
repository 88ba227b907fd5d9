use clap::Parser;
use std::path::PathBuf;

use crate::utils::config::EnvKeys;

/// Ingest load balancer access logs into a search index.
///
/// Settings come from `elb-ingestor.toml`, then `ELB_INGESTOR_*` environment variables
/// (and `.env`), then these flags.
#[derive(Clone, Debug, Parser)]
#[command(name = "elb-ingestor")]
#[command(about = "Claim, parse and ship load balancer access logs; serve health and stats.")]
pub struct Cli {
    /// Config file. Default: `elb-ingestor.toml` in the working directory, if present.
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Verbose output.
    #[arg(long, short = 'v', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub verbose: Option<bool>,

    /// Status surface host (overrides ELB_INGESTOR_LISTEN_HOST).
    #[arg(long)]
    pub listen_host: Option<String>,

    /// Status surface port (overrides ELB_INGESTOR_LISTEN_PORT).
    #[arg(long, value_parser = clap::value_parser!(u16))]
    pub listen_port: Option<u16>,

    /// Number of ship workers (overrides ELB_INGESTOR_SHIP_WORKERS).
    #[arg(long, value_parser = clap::value_parser!(usize))]
    pub ship_workers: Option<usize>,

    /// Log files requested per refill (overrides ELB_INGESTOR_FILE_BATCH_SIZE).
    #[arg(long, short = 'b', value_parser = clap::value_parser!(usize))]
    pub file_batch_size: Option<usize>,
}

impl Cli {
    pub fn verbose(&self) -> bool {
        self.verbose.unwrap_or(false)
    }

    /// Flags given on the command line, as `(env key, value)` overrides.
    pub fn overrides(&self) -> Vec<(&'static str, String)> {
        let mut out = Vec::new();
        if let Some(ref host) = self.listen_host {
            out.push((EnvKeys::LISTEN_HOST, host.clone()));
        }
        if let Some(port) = self.listen_port {
            out.push((EnvKeys::LISTEN_PORT, port.to_string()));
        }
        if let Some(n) = self.ship_workers {
            out.push((EnvKeys::SHIP_WORKERS, n.to_string()));
        }
        if let Some(n) = self.file_batch_size {
            out.push((EnvKeys::FILE_BATCH_SIZE, n.to_string()));
        }
        out
    }
}
