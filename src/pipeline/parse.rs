//! Parse stage: to-do queue → records on the record queue, then the file id on the done queue.

use crossbeam_channel::{Receiver, Sender};
use log::{debug, warn};
use std::sync::Arc;

use super::context::{Shutdown, recv_or_shutdown, send_or_shutdown};
use crate::parser::{LogRecord, parse_line};
use crate::stats::{ParserStats, PipelineStatus};
use crate::types::WorkItem;

pub struct ParseStage {
    todo_rx: Receiver<WorkItem>,
    record_tx: Sender<LogRecord>,
    done_tx: Sender<String>,
    status: Arc<PipelineStatus>,
    shutdown: Shutdown,
}

impl ParseStage {
    pub fn new(
        todo_rx: Receiver<WorkItem>,
        record_tx: Sender<LogRecord>,
        done_tx: Sender<String>,
        status: Arc<PipelineStatus>,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            todo_rx,
            record_tx,
            done_tx,
            status,
            shutdown,
        }
    }

    /// Consume work items until shutdown or until the to-do queue closes.
    pub fn run(self) {
        while let Some(item) = recv_or_shutdown(&self.todo_rx, &self.shutdown) {
            if !self.process(item) {
                break;
            }
        }
        debug!("parse stage stopped");
    }

    /// Parse every line, queue every record (blocking while the record queue is full), then
    /// report the file done. Returns false if shutdown interrupted it; the file is then not
    /// reported done and stays claimed.
    pub fn process(&self, item: WorkItem) -> bool {
        let records = parse_work_item(&item, &self.status.parser);
        for record in records {
            if !send_or_shutdown(&self.record_tx, record, &self.shutdown) {
                warn!("shutdown while queueing records for {}", item.file_id);
                return false;
            }
        }
        self.status.parser.files_parsed.incr();
        self.done_tx.send(item.file_id).is_ok()
    }
}

/// Decode each non-blank line. Bad lines are counted in `stats.parse_errors` and skipped.
pub fn parse_work_item(item: &WorkItem, stats: &ParserStats) -> Vec<LogRecord> {
    let mut records = Vec::with_capacity(item.lines.len());
    let mut errors = 0_u64;
    for (idx, line) in item.lines.iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match parse_line(line) {
            Ok(record) => records.push(record),
            Err(e) => {
                errors += 1;
                debug!("{}:{}: {e:#}", item.file_id, idx + 1);
            }
        }
    }
    stats.records_parsed.add(records.len() as u64);
    stats.parse_errors.add(errors);
    if errors > 0 {
        warn!(
            "{}: skipped {} unparseable lines of {}",
            item.file_id,
            errors,
            item.lines.len()
        );
    }
    records
}
