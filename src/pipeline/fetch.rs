//! Fetch loop: keeps the to-do queue stocked from the log source and finalizes parsed files.

use crossbeam_channel::{Receiver, Sender, select};
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::context::{FetchSummary, Shutdown, send_or_shutdown};
use crate::source::LogSource;
use crate::stats::PipelineStatus;
use crate::types::{ClaimOutcome, LogFile, WorkItem};

/// Runs on its own thread for the life of the process; stops only on [`Shutdown`].
///
/// Keeps a ledger of every file it claimed. A done id that is not in the ledger is dropped,
/// so the source never sees a finalize for something this process did not claim.
pub struct FetchLoop {
    source: Box<dyn LogSource>,
    todo_tx: Sender<WorkItem>,
    done_tx: Sender<String>,
    done_rx: Receiver<String>,
    status: Arc<PipelineStatus>,
    shutdown: Shutdown,
    batch_size: usize,
    done_poll: Duration,
    retry_delay: Duration,
    claimed: HashMap<String, LogFile>,
    unfetched: Vec<LogFile>,
}

enum Queued {
    Sent,
    Deferred,
    Stopped,
}

pub struct FetchLoopParams {
    pub source: Box<dyn LogSource>,
    pub todo_tx: Sender<WorkItem>,
    pub done_tx: Sender<String>,
    pub done_rx: Receiver<String>,
    pub status: Arc<PipelineStatus>,
    pub shutdown: Shutdown,
    pub batch_size: usize,
    pub done_poll: Duration,
    pub retry_delay: Duration,
}

impl FetchLoop {
    pub fn new(params: FetchLoopParams) -> Self {
        Self {
            source: params.source,
            todo_tx: params.todo_tx,
            done_tx: params.done_tx,
            done_rx: params.done_rx,
            status: params.status,
            shutdown: params.shutdown,
            batch_size: params.batch_size.max(1),
            done_poll: params.done_poll,
            retry_delay: params.retry_delay,
            claimed: HashMap::new(),
            unfetched: Vec::new(),
        }
    }

    /// Ids claimed by this loop and not yet finalized.
    pub fn in_flight(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.claimed.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Loop until shutdown, then finalize what is already done and report what is left.
    pub fn run(mut self) -> FetchSummary {
        info!("Fetch loop started ({} source)", self.source.name());
        while !self.shutdown.is_triggered() {
            self.run_once();
        }
        self.finish()
    }

    /// One iteration: refill when the to-do queue is empty, then wait briefly for a done id.
    pub fn run_once(&mut self) {
        if self.todo_tx.is_empty() {
            self.refill();
        }
        let done = select! {
            recv(self.done_rx) -> msg => msg.ok(),
            recv(self.shutdown.signal()) -> _ => None,
            default(self.done_poll) => None,
        };
        if let Some(id) = done {
            self.finalize_or_requeue(id);
        }
    }

    /// Claimed files whose content could not be read yet. Retried at the start of every refill.
    pub fn unfetched(&self) -> Vec<String> {
        self.unfetched.iter().map(|f| f.id.clone()).collect()
    }

    /// Retry unread claims, then list, claim and fetch one batch onto the to-do queue.
    /// Returns how many files were queued. Blocks while the to-do queue is full.
    pub fn refill(&mut self) -> usize {
        let (mut queued, stopped) = self.retry_unfetched();
        if stopped {
            return queued;
        }
        let candidates = match self.source.list_candidates(self.batch_size) {
            Ok(candidates) => {
                if self.unfetched.is_empty() {
                    self.status.source_health.mark_healthy();
                }
                candidates
            }
            Err(e) => {
                // Try again next iteration; the status surface reports us unhealthy meanwhile.
                error!("Failed listing logs: {e:#}");
                self.status.source_health.mark_unhealthy(format!("{e:#}"));
                return queued;
            }
        };
        if candidates.is_empty() {
            return queued;
        }
        debug!("listed {} candidate logs", candidates.len());
        self.status.fetcher.files_listed.add(candidates.len() as u64);

        for candidate in candidates {
            if self.shutdown.is_triggered() {
                break;
            }
            let file = match self.source.claim(&candidate) {
                Ok(ClaimOutcome::Claimed(file)) => file,
                Ok(ClaimOutcome::AlreadyClaimed) => {
                    self.status.fetcher.claim_conflicts.incr();
                    continue;
                }
                Err(e) => {
                    error!("Failed claiming {}: {e:#}", candidate.id);
                    self.status.source_health.mark_unhealthy(format!("{e:#}"));
                    continue;
                }
            };
            self.claimed.insert(file.id.clone(), file.clone());
            match self.fetch_and_queue(file) {
                Queued::Sent => queued += 1,
                Queued::Deferred => {}
                Queued::Stopped => break,
            }
        }
        queued
    }

    /// Returns the number queued and whether shutdown interrupted the retries.
    fn retry_unfetched(&mut self) -> (usize, bool) {
        if self.unfetched.is_empty() {
            return (0, false);
        }
        debug!("retrying {} unread claims", self.unfetched.len());
        let mut pending = std::mem::take(&mut self.unfetched).into_iter();
        let mut queued = 0;
        let mut stopped = false;
        for file in pending.by_ref() {
            if self.shutdown.is_triggered() {
                self.unfetched.push(file);
                stopped = true;
                break;
            }
            match self.fetch_and_queue(file) {
                Queued::Sent => queued += 1,
                Queued::Deferred => {}
                Queued::Stopped => {
                    stopped = true;
                    break;
                }
            }
        }
        self.unfetched.extend(pending);
        if !stopped && self.unfetched.is_empty() {
            self.status.source_health.mark_healthy();
        }
        (queued, stopped)
    }

    /// Read a claimed file and push it onto the to-do queue. A failed read parks the file on
    /// the retry list and leaves the source unhealthy.
    fn fetch_and_queue(&mut self, file: LogFile) -> Queued {
        let lines = match self.source.fetch(&file) {
            Ok(lines) => lines,
            Err(e) => {
                error!("Claimed {} but could not fetch it; retrying next refill: {e:#}", file.id);
                self.status.fetcher.fetch_failures.incr();
                self.status.source_health.mark_unhealthy(format!("{e:#}"));
                self.unfetched.push(file);
                return Queued::Deferred;
            }
        };
        self.status.fetcher.files_fetched.incr();
        self.status.fetcher.lines_fetched.add(lines.len() as u64);
        let item = WorkItem {
            file_id: file.id,
            lines,
        };
        if send_or_shutdown(&self.todo_tx, item, &self.shutdown) {
            Queued::Sent
        } else {
            Queued::Stopped
        }
    }

    fn finalize_once(&mut self, id: &str) -> anyhow::Result<bool> {
        let Some(file) = self.claimed.get(id) else {
            error!("{id} reported done but was never claimed here - not finalizing");
            return Ok(false);
        };
        self.source.finalize(file)?;
        self.claimed.remove(id);
        self.status.fetcher.files_finalized.incr();
        info!("Finalized {id}");
        Ok(true)
    }

    /// Finalize `id`. On failure push it back onto the done queue; retries are unlimited.
    pub fn finalize_or_requeue(&mut self, id: String) -> bool {
        match self.finalize_once(&id) {
            Ok(finalized) => {
                self.status.finalize_health.mark_healthy();
                finalized
            }
            Err(e) => {
                error!("Failed to finalize {id}: {e:#}");
                self.status.fetcher.finalize_failures.incr();
                self.status.finalize_health.mark_unhealthy(format!("{e:#}"));
                if self.done_tx.send(id).is_err() {
                    warn!("done queue closed; finalize will not be retried");
                }
                self.shutdown.wait_timeout(self.retry_delay);
                false
            }
        }
    }

    /// Shutdown path: one finalize attempt per id already on the done queue, then report the rest.
    fn finish(mut self) -> FetchSummary {
        while let Ok(id) = self.done_rx.try_recv() {
            if let Err(e) = self.finalize_once(&id) {
                error!("Failed to finalize {id} during shutdown: {e:#}");
            }
        }
        let left_claimed = self.in_flight();
        for id in &left_claimed {
            warn!("{id} is still claimed and was not finalized; it needs manual cleanup");
        }
        info!(
            "Fetch loop stopped: {} finalized, {} left claimed",
            self.status.fetcher.files_finalized.get(),
            left_claimed.len()
        );
        FetchSummary {
            files_finalized: self.status.fetcher.files_finalized.get(),
            left_claimed,
        }
    }
}
