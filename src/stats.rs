//! Stage counters and health flags, written by the pipeline and read by the status surface.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

/// Monotonic counter shared between threads.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn add(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn incr(&self) {
        self.add(1);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Default)]
pub struct FetcherStats {
    pub files_listed: Counter,
    pub files_fetched: Counter,
    pub lines_fetched: Counter,
    pub fetch_failures: Counter,
    pub claim_conflicts: Counter,
    pub files_finalized: Counter,
    pub finalize_failures: Counter,
}

#[derive(Debug, Default)]
pub struct ParserStats {
    pub files_parsed: Counter,
    pub records_parsed: Counter,
    pub parse_errors: Counter,
}

#[derive(Debug, Default)]
pub struct ShipperStats {
    pub records_shipped: Counter,
    pub ship_errors: Counter,
    pub batches_shipped: Counter,
}

/// Health of one stage. Only the owning stage writes it; the next successful operation resets it.
#[derive(Debug)]
pub struct StageHealth {
    healthy: AtomicBool,
    last_error: Mutex<Option<String>>,
}

impl Default for StageHealth {
    fn default() -> Self {
        Self {
            healthy: AtomicBool::new(true),
            last_error: Mutex::new(None),
        }
    }
}

impl StageHealth {
    pub fn mark_healthy(&self) {
        self.healthy.store(true, Ordering::Release);
    }

    /// Flip unhealthy and remember `err` for the status surface.
    pub fn mark_unhealthy(&self, err: impl std::fmt::Display) {
        *self
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(err.to_string());
        self.healthy.store(false, Ordering::Release);
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }

    /// Most recent failure, kept after recovery as context.
    pub fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn snapshot(&self) -> HealthSnapshot {
        HealthSnapshot {
            healthy: self.is_healthy(),
            last_error: self.last_error(),
        }
    }
}

/// Everything the status surface reports. Built once, shared by `Arc` with each stage.
#[derive(Debug, Default)]
pub struct PipelineStatus {
    pub fetcher: FetcherStats,
    pub parser: ParserStats,
    pub shipper: ShipperStats,
    /// Listing, claiming and fetching from the log source.
    pub source_health: StageHealth,
    /// Finalizing parsed files.
    pub finalize_health: StageHealth,
    pub shipper_health: StageHealth,
}

impl PipelineStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_healthy(&self) -> bool {
        self.source_health.is_healthy()
            && self.finalize_health.is_healthy()
            && self.shipper_health.is_healthy()
    }

    /// Read-only view for the status surface.
    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            healthy: self.is_healthy(),
            health: StageHealthSnapshot {
                source: self.source_health.snapshot(),
                finalize: self.finalize_health.snapshot(),
                shipper: self.shipper_health.snapshot(),
            },
            fetcher: FetcherSnapshot {
                files_listed: self.fetcher.files_listed.get(),
                files_fetched: self.fetcher.files_fetched.get(),
                lines_fetched: self.fetcher.lines_fetched.get(),
                fetch_failures: self.fetcher.fetch_failures.get(),
                claim_conflicts: self.fetcher.claim_conflicts.get(),
                files_finalized: self.fetcher.files_finalized.get(),
                finalize_failures: self.fetcher.finalize_failures.get(),
            },
            parser: ParserSnapshot {
                files_parsed: self.parser.files_parsed.get(),
                records_parsed: self.parser.records_parsed.get(),
                parse_errors: self.parser.parse_errors.get(),
            },
            shipper: ShipperSnapshot {
                records_shipped: self.shipper.records_shipped.get(),
                ship_errors: self.shipper.ship_errors.get(),
                batches_shipped: self.shipper.batches_shipped.get(),
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthSnapshot {
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StageHealthSnapshot {
    pub source: HealthSnapshot,
    pub finalize: HealthSnapshot,
    pub shipper: HealthSnapshot,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FetcherSnapshot {
    pub files_listed: u64,
    pub files_fetched: u64,
    pub lines_fetched: u64,
    pub fetch_failures: u64,
    pub claim_conflicts: u64,
    pub files_finalized: u64,
    pub finalize_failures: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ParserSnapshot {
    pub files_parsed: u64,
    pub records_parsed: u64,
    pub parse_errors: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ShipperSnapshot {
    pub records_shipped: u64,
    pub ship_errors: u64,
    pub batches_shipped: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub healthy: bool,
    pub health: StageHealthSnapshot,
    pub fetcher: FetcherSnapshot,
    pub parser: ParserSnapshot,
    pub shipper: ShipperSnapshot,
}
