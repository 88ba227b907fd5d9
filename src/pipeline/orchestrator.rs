//! Starts the fetch, parse and ship threads; shutdown joins the fetch loop.

use anyhow::{Context, Result};
use log::{debug, info};
use std::sync::Arc;
use std::thread;

use crate::pipeline::context::{
    FetchSummary, PipelineHandles, PipelineTuning, Shutdown, create_pipeline_channels,
};
use crate::pipeline::fetch::{FetchLoop, FetchLoopParams};
use crate::pipeline::parse::ParseStage;
use crate::pipeline::ship::spawn_ship_workers;
use crate::shipper::RecordSink;
use crate::source::LogSource;
use crate::stats::PipelineStatus;

/// Start fetch loop, parse stage and ship pool.
/// Source → to-do queue → parse → record queue → ship pool; parse → done queue → fetch loop.
/// Every stage runs until `shutdown` is triggered.
pub fn run_pipeline(
    source: Box<dyn LogSource>,
    sink: Arc<dyn RecordSink>,
    status: Arc<PipelineStatus>,
    tuning: &PipelineTuning,
    shutdown: Shutdown,
) -> Result<PipelineHandles> {
    debug!("pipeline tuning: {tuning:?}");
    let channels = create_pipeline_channels(tuning);

    let fetch_loop = FetchLoop::new(FetchLoopParams {
        source,
        todo_tx: channels.todo_tx,
        done_tx: channels.done_tx.clone(),
        done_rx: channels.done_rx,
        status: Arc::clone(&status),
        shutdown: shutdown.clone(),
        batch_size: tuning.file_batch_size,
        done_poll: tuning.done_poll,
        retry_delay: tuning.finalize_retry_delay,
    });
    let fetch_handle = thread::Builder::new()
        .name("fetch-loop".into())
        .spawn(move || fetch_loop.run())
        .context("spawn fetch loop")?;

    let parse_stage = ParseStage::new(
        channels.todo_rx,
        channels.record_tx,
        channels.done_tx,
        Arc::clone(&status),
        shutdown.clone(),
    );
    let parse_handle = thread::Builder::new()
        .name("parse".into())
        .spawn(move || parse_stage.run())
        .context("spawn parse stage")?;

    let ship_handles = spawn_ship_workers(
        &channels.record_rx,
        &sink,
        &status,
        &shutdown,
        tuning.ship_workers,
        tuning.ship_batch_size,
    )?;
    info!(
        "Pipeline started: batch size {}, {} ship workers",
        tuning.file_batch_size,
        ship_handles.len()
    );

    Ok(PipelineHandles {
        fetch_handle,
        parse_handle,
        ship_handles,
        status,
        shutdown,
    })
}

/// Wait for the fetch loop to stop (it stops only once shutdown is triggered).
/// Parse and ship threads are left to exit on their own.
pub fn join_pipeline(handles: PipelineHandles) -> Result<FetchSummary> {
    let PipelineHandles {
        fetch_handle,
        parse_handle,
        ship_handles,
        ..
    } = handles;
    let summary = fetch_handle
        .join()
        .map_err(|_| anyhow::anyhow!("fetch loop panicked"))?;
    drop(parse_handle);
    drop(ship_handles);
    Ok(summary)
}

/// Trigger shutdown and join the fetch loop.
pub fn shutdown_pipeline(handles: PipelineHandles) -> Result<FetchSummary> {
    handles.shutdown.trigger();
    join_pipeline(handles)
}
