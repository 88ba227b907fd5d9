//! Pipeline context: queues between stages, tuning, and the shutdown signal every stage watches.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded, select, unbounded};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::parser::LogRecord;
use crate::stats::PipelineStatus;
use crate::types::WorkItem;
use crate::utils::config::PipelineDefaults;
use crate::utils::settings::Settings;

/// Sizes and timings for one pipeline run.
#[derive(Clone, Debug)]
pub struct PipelineTuning {
    /// Max files requested from the log source per refill.
    pub file_batch_size: usize,
    /// Capacity of the to-do queue (fetched files waiting to be parsed).
    pub todo_capacity: usize,
    /// Capacity of the record queue (parsed records waiting to be shipped).
    pub record_capacity: usize,
    pub ship_workers: usize,
    /// Max records per shipped batch.
    pub ship_batch_size: usize,
    /// How long the fetch loop waits on the done queue before refilling again.
    pub done_poll: Duration,
    /// Pause after a failed finalize. Retries are unlimited.
    pub finalize_retry_delay: Duration,
}

impl Default for PipelineTuning {
    fn default() -> Self {
        Self {
            file_batch_size: PipelineDefaults::FILE_BATCH_SIZE,
            todo_capacity: PipelineDefaults::TODO_QUEUE_CAPACITY,
            record_capacity: PipelineDefaults::RECORD_QUEUE_CAPACITY,
            ship_workers: PipelineDefaults::SHIP_WORKERS,
            ship_batch_size: PipelineDefaults::SHIP_BATCH_SIZE,
            done_poll: PipelineDefaults::DONE_POLL,
            finalize_retry_delay: PipelineDefaults::FINALIZE_RETRY_DELAY,
        }
    }
}

impl From<&Settings> for PipelineTuning {
    fn from(s: &Settings) -> Self {
        Self {
            file_batch_size: s.file_batch_size,
            todo_capacity: s.todo_queue_size,
            record_capacity: s.record_queue_size,
            ship_workers: s.ship_workers,
            ship_batch_size: s.ship_batch_size,
            done_poll: PipelineDefaults::DONE_POLL,
            finalize_retry_delay: s.finalize_retry_delay,
        }
    }
}

struct ShutdownInner {
    triggered: AtomicBool,
    trigger_tx: Mutex<Option<Sender<()>>>,
    signal_rx: Receiver<()>,
}

/// Cloneable stop signal. Nothing is ever sent on the channel; triggering drops the only sender,
/// so every `select!` on [`Shutdown::signal`] wakes at once.
#[derive(Clone)]
pub struct Shutdown {
    inner: Arc<ShutdownInner>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn new() -> Self {
        let (trigger_tx, signal_rx) = bounded::<()>(0);
        Self {
            inner: Arc::new(ShutdownInner {
                triggered: AtomicBool::new(false),
                trigger_tx: Mutex::new(Some(trigger_tx)),
                signal_rx,
            }),
        }
    }

    /// Idempotent.
    pub fn trigger(&self) {
        self.inner.triggered.store(true, Ordering::Release);
        self.inner
            .trigger_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    pub fn is_triggered(&self) -> bool {
        self.inner.triggered.load(Ordering::Acquire)
    }

    /// Disconnects when triggered. Use as a `recv` arm in `select!`.
    pub fn signal(&self) -> &Receiver<()> {
        &self.inner.signal_rx
    }

    /// Sleep up to `timeout`, waking early on shutdown. Returns true if shut down.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        match self.inner.signal_rx.recv_timeout(timeout) {
            Err(RecvTimeoutError::Disconnected) => true,
            _ => self.is_triggered(),
        }
    }
}

/// Blocking send that gives up on shutdown. Returns false if the item was not delivered.
pub fn send_or_shutdown<T>(tx: &Sender<T>, item: T, shutdown: &Shutdown) -> bool {
    select! {
        send(tx, item) -> res => res.is_ok(),
        recv(shutdown.signal()) -> _ => false,
    }
}

/// Blocking receive that gives up on shutdown or when every sender is gone.
pub fn recv_or_shutdown<T>(rx: &Receiver<T>, shutdown: &Shutdown) -> Option<T> {
    select! {
        recv(rx) -> msg => msg.ok(),
        recv(shutdown.signal()) -> _ => None,
    }
}

/// The three queues. Each is touched only by the two stages on either side of it.
pub struct PipelineChannels {
    pub todo_tx: Sender<WorkItem>,
    pub todo_rx: Receiver<WorkItem>,
    /// Unbounded: finalize retries push back onto it and must never block the fetch loop.
    pub done_tx: Sender<String>,
    pub done_rx: Receiver<String>,
    pub record_tx: Sender<LogRecord>,
    pub record_rx: Receiver<LogRecord>,
}

pub fn create_pipeline_channels(tuning: &PipelineTuning) -> PipelineChannels {
    let (todo_tx, todo_rx) = bounded::<WorkItem>(tuning.todo_capacity.max(1));
    let (done_tx, done_rx) = unbounded::<String>();
    let (record_tx, record_rx) = bounded::<LogRecord>(tuning.record_capacity.max(1));
    PipelineChannels {
        todo_tx,
        todo_rx,
        done_tx,
        done_rx,
        record_tx,
        record_rx,
    }
}

/// What the fetch loop leaves behind when it stops.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FetchSummary {
    pub files_finalized: u64,
    /// Claimed but never finalized; these stay claimed in the backend until an operator acts.
    pub left_claimed: Vec<String>,
}

/// Handles returned by [`run_pipeline`](super::run_pipeline).
/// Only `fetch_handle` must be joined on shutdown; parse and ship threads may be abandoned.
pub struct PipelineHandles {
    pub fetch_handle: JoinHandle<FetchSummary>,
    pub parse_handle: JoinHandle<()>,
    pub ship_handles: Vec<JoinHandle<()>>,
    pub status: Arc<PipelineStatus>,
    pub shutdown: Shutdown,
}
