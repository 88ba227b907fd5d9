//! Ship stage: a pool of workers draining the record queue into a [`RecordSink`].

use anyhow::{Context, Result};
use crossbeam_channel::Receiver;
use log::{debug, error};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use super::context::{Shutdown, recv_or_shutdown};
use crate::parser::LogRecord;
use crate::shipper::RecordSink;
use crate::stats::PipelineStatus;

/// Block for one record, then take whatever else is already queued, up to `batch_size`.
fn next_batch(
    record_rx: &Receiver<LogRecord>,
    shutdown: &Shutdown,
    batch_size: usize,
) -> Option<Vec<LogRecord>> {
    let first = recv_or_shutdown(record_rx, shutdown)?;
    let mut batch = Vec::with_capacity(batch_size);
    batch.push(first);
    while batch.len() < batch_size {
        match record_rx.try_recv() {
            Ok(record) => batch.push(record),
            Err(_) => break,
        }
    }
    Some(batch)
}

/// Ship one batch and record the outcome. A failed batch counts every record as a ship error;
/// retries already happened inside the sink.
pub fn ship_batch(sink: &dyn RecordSink, batch: &[LogRecord], status: &PipelineStatus) {
    match sink.ship(batch) {
        Ok(report) => {
            status.shipper.records_shipped.add(report.shipped as u64);
            status.shipper.ship_errors.add(report.failed as u64);
            status.shipper.batches_shipped.incr();
            status.shipper_health.mark_healthy();
        }
        Err(e) => {
            error!("Failed to ship {} records: {e:#}", batch.len());
            status.shipper.ship_errors.add(batch.len() as u64);
            status.shipper_health.mark_unhealthy(format!("{e:#}"));
        }
    }
}

fn ship_worker_loop(
    worker_id: usize,
    record_rx: Receiver<LogRecord>,
    sink: Arc<dyn RecordSink>,
    status: Arc<PipelineStatus>,
    shutdown: Shutdown,
    batch_size: usize,
) {
    while let Some(batch) = next_batch(&record_rx, &shutdown, batch_size) {
        ship_batch(sink.as_ref(), &batch, &status);
    }
    debug!("ship worker {worker_id} stopped");
}

/// Spawn `num_workers` ship workers sharing `record_rx`. No ordering across workers.
pub fn spawn_ship_workers(
    record_rx: &Receiver<LogRecord>,
    sink: &Arc<dyn RecordSink>,
    status: &Arc<PipelineStatus>,
    shutdown: &Shutdown,
    num_workers: usize,
    batch_size: usize,
) -> Result<Vec<JoinHandle<()>>> {
    let batch_size = batch_size.max(1);
    (0..num_workers.max(1))
        .map(|worker_id| {
            let record_rx = record_rx.clone();
            let sink = Arc::clone(sink);
            let status = Arc::clone(status);
            let shutdown = shutdown.clone();
            thread::Builder::new()
                .name(format!("ship-{worker_id}"))
                .spawn(move || {
                    ship_worker_loop(worker_id, record_rx, sink, status, shutdown, batch_size)
                })
                .with_context(|| format!("spawn ship worker {worker_id}"))
        })
        .collect()
}
