//! Shipping parsed records to the search index.

pub mod elasticsearch;

pub use elasticsearch::{ElasticsearchClient, ElasticsearchConfig};

use anyhow::Result;
use std::time::Duration;

use crate::parser::LogRecord;

/// Per-batch outcome. `shipped + failed` equals the batch length.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ShipReport {
    pub shipped: usize,
    pub failed: usize,
}

/// Destination for parsed records. Implementations own their retry behaviour; an `Err` means
/// the whole batch was given up on.
pub trait RecordSink: Send + Sync {
    fn ship(&self, records: &[LogRecord]) -> Result<ShipReport>;
}

/// How many times to try a request and how long to wait between tries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RetryStrategy {
    /// Up to n attempts, back to back.
    Immediate(u64),
    /// Up to n attempts, waiting `attempt * delay_ms` before each retry.
    LinearBackoff(u64, u64),
}

impl RetryStrategy {
    pub fn attempts(&self) -> u64 {
        match self {
            RetryStrategy::Immediate(n) | RetryStrategy::LinearBackoff(n, _) => (*n).max(1),
        }
    }

    /// Pause after failed attempt number `attempt` (1-based).
    pub fn delay(&self, attempt: u64) -> Duration {
        match self {
            RetryStrategy::Immediate(_) => Duration::ZERO,
            RetryStrategy::LinearBackoff(_, delay_ms) => {
                Duration::from_millis(delay_ms.saturating_mul(attempt))
            }
        }
    }
}
