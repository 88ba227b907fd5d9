//! Application configuration constants.
//! Defaults and environment keys in one place.

use std::sync::OnceLock;
use std::time::Duration;

// ---- Package / paths (from CARGO_PKG_NAME, cached) ----

/// Package-derived names: built once from `CARGO_PKG_NAME`, then cached.
pub struct PackagePaths {
    pkg_name: &'static str,
    config_filename: String,
}

static PACKAGE_PATHS: OnceLock<PackagePaths> = OnceLock::new();

impl PackagePaths {
    pub fn get() -> &'static PackagePaths {
        PACKAGE_PATHS.get_or_init(|| {
            let pkg = env!("CARGO_PKG_NAME");
            PackagePaths {
                pkg_name: pkg,
                config_filename: format!("{pkg}.toml"),
            }
        })
    }

    pub fn pkg_name(&self) -> &str {
        self.pkg_name
    }

    /// Config file picked up from the working directory when `--config` is not given.
    pub fn config_filename(&self) -> &str {
        &self.config_filename
    }
}

// ---- Environment keys ----

/// Environment variable names. Kept compatible with existing deployments.
pub struct EnvKeys;

impl EnvKeys {
    pub const ELASTICSEARCH_HOSTS: &'static str = "ELB_INGESTOR_ELASTICSEARCH_HOSTS";
    pub const BUCKET: &'static str = "ELB_INGESTOR_BUCKET";
    pub const FETCH_MODE: &'static str = "ELB_INGESTOR_FETCH_MODE";
    pub const SEARCH_PREFIX: &'static str = "ELB_INGESTOR_SEARCH_PREFIX";
    pub const WORKING_PREFIX: &'static str = "ELB_INGESTOR_WORKING_PREFIX";
    pub const DONE_PREFIX: &'static str = "ELB_INGESTOR_DONE_PREFIX";
    pub const WORK_DIR: &'static str = "ELB_INGESTOR_WORK_DIR";
    pub const LIST_FILE: &'static str = "ELB_INGESTOR_LIST_FILE";
    pub const FILE_BATCH_SIZE: &'static str = "ELB_INGESTOR_FILE_BATCH_SIZE";
    pub const INDEX_PATTERN: &'static str = "ELB_INDEX_PATTERN";
    pub const LISTEN_HOST: &'static str = "ELB_INGESTOR_LISTEN_HOST";
    pub const LISTEN_PORT: &'static str = "ELB_INGESTOR_LISTEN_PORT";
    pub const SHIP_WORKERS: &'static str = "ELB_INGESTOR_SHIP_WORKERS";
    pub const SHIP_BATCH_SIZE: &'static str = "ELB_INGESTOR_SHIP_BATCH_SIZE";
    pub const SHIP_RETRIES: &'static str = "ELB_INGESTOR_SHIP_RETRIES";
    pub const SHIP_TIMEOUT_SECS: &'static str = "ELB_INGESTOR_SHIP_TIMEOUT_SECS";
    pub const TODO_QUEUE_SIZE: &'static str = "ELB_INGESTOR_TODO_QUEUE_SIZE";
    pub const RECORD_QUEUE_SIZE: &'static str = "ELB_INGESTOR_RECORD_QUEUE_SIZE";
    pub const FINALIZE_RETRY_DELAY_MS: &'static str = "ELB_INGESTOR_FINALIZE_RETRY_DELAY_MS";

    pub const ALL: &'static [&'static str] = &[
        Self::ELASTICSEARCH_HOSTS,
        Self::BUCKET,
        Self::FETCH_MODE,
        Self::SEARCH_PREFIX,
        Self::WORKING_PREFIX,
        Self::DONE_PREFIX,
        Self::WORK_DIR,
        Self::LIST_FILE,
        Self::FILE_BATCH_SIZE,
        Self::INDEX_PATTERN,
        Self::LISTEN_HOST,
        Self::LISTEN_PORT,
        Self::SHIP_WORKERS,
        Self::SHIP_BATCH_SIZE,
        Self::SHIP_RETRIES,
        Self::SHIP_TIMEOUT_SECS,
        Self::TODO_QUEUE_SIZE,
        Self::RECORD_QUEUE_SIZE,
        Self::FINALIZE_RETRY_DELAY_MS,
    ];
}

// ---- Fetch modes ----

/// Accepted `ELB_INGESTOR_FETCH_MODE` values.
pub struct FetchModeNames;

impl FetchModeNames {
    pub const MOVING: &'static [&'static str] = &[
        "moving",
        "bad_aggressive_fetcher_do_not_use_until_we_fix_backoff",
    ];
    pub const LOCK_MARKER: &'static [&'static str] = &["lock_marker", "fixed_list"];
}

// ---- Pipeline ----

pub struct PipelineDefaults;

impl PipelineDefaults {
    pub const FILE_BATCH_SIZE: usize = 5;
    /// Small: fetched files hold whole log contents in memory.
    pub const TODO_QUEUE_CAPACITY: usize = 10;
    pub const RECORD_QUEUE_CAPACITY: usize = 100_000;
    pub const SHIP_WORKERS: usize = 4;
    pub const SHIP_BATCH_SIZE: usize = 500;
    /// Fetch loop wait on the done queue per iteration.
    pub const DONE_POLL: Duration = Duration::from_secs(1);
    pub const FINALIZE_RETRY_DELAY: Duration = Duration::from_secs(1);
}

// ---- Moving strategy prefixes ----

pub struct PrefixDefaults;

impl PrefixDefaults {
    pub const UNPROCESSED: &'static str = "logs/";
    pub const PROCESSING: &'static str = "logs-working/";
    pub const PROCESSED: &'static str = "logs-done/";
}

// ---- Search index ----

pub struct ShipDefaults;

impl ShipDefaults {
    pub const INDEX_PATTERN: &'static str = "logs-platform-%Y.%m.%d";
    pub const RETRIES: u64 = 3;
    pub const TIMEOUT: Duration = Duration::from_secs(30);
    /// Base delay for linear backoff between bulk attempts (ms).
    pub const RETRY_DELAY_MS: u64 = 500;
}

// ---- Status surface ----

pub struct ListenDefaults;

impl ListenDefaults {
    pub const HOST: &'static str = "localhost";
    pub const PORT: u16 = 13131;
    /// Accept poll interval; bounds how long shutdown waits for the status server.
    pub const ACCEPT_POLL: Duration = Duration::from_millis(200);
    pub const READ_TIMEOUT: Duration = Duration::from_secs(5);
    pub const MAX_REQUEST_BYTES: usize = 16 * 1024;
}
