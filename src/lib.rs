//! elb-ingestor: claim load balancer access-log files, parse them, ship the records to a search
//! index, and report health and stage counters.

pub mod cli;
pub mod parser;
pub mod pipeline;
pub mod shipper;
pub mod source;
pub mod stats;
pub mod status;
pub mod types;
pub mod utils;

/// Re-export types for API
pub use types::*;

use log::info;
use std::sync::Arc;

use crate::pipeline::{FetchSummary, PipelineTuning, Shutdown, join_pipeline, run_pipeline};
use crate::shipper::{ElasticsearchClient, ElasticsearchConfig, RecordSink, RetryStrategy};
use crate::source::{LocalObjectStore, ObjectStore, build_log_source};
use crate::stats::PipelineStatus;
use crate::status::StatusServer;
use crate::utils::config::ShipDefaults;
use crate::utils::settings::Settings;

/// Result alias used by public elb-ingestor API
pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// Single entry point: wire store, log source, search-index client, pipeline and status server
/// from `settings`, then block until `shutdown` is triggered and the fetch loop has stopped.
pub fn run_ingestor(settings: &Settings, shutdown: Shutdown) -> Result<FetchSummary> {
    let status = Arc::new(PipelineStatus::new());

    let store: Arc<dyn ObjectStore> = Arc::new(LocalObjectStore::new(&settings.bucket));
    let source = build_log_source(settings, store)?;
    let sink: Arc<dyn RecordSink> = Arc::new(ElasticsearchClient::new(ElasticsearchConfig {
        hosts: settings.elasticsearch_hosts.clone(),
        index_pattern: settings.index_pattern.clone(),
        timeout: settings.ship_timeout,
        retry_strategy: RetryStrategy::LinearBackoff(
            settings.ship_retries,
            ShipDefaults::RETRY_DELAY_MS,
        ),
    })?);

    let server = StatusServer::bind(&settings.listen_addr(), Arc::clone(&status))?;
    let status_handle = server.spawn(shutdown.clone())?;

    let handles = run_pipeline(
        source,
        sink,
        status,
        &PipelineTuning::from(settings),
        shutdown,
    )?;
    let summary = join_pipeline(handles)?;
    if status_handle.join().is_err() {
        log::warn!("status server panicked");
    }
    info!(
        "{} stopped",
        crate::utils::config::PackagePaths::get().pkg_name()
    );
    Ok(summary)
}
