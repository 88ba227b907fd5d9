//! Log sources: list, claim, fetch and finalize log files with exclusivity.
//!
//! Two strategies implement [`LogSource`]:
//! - [`MovingLogSource`]: claim and finalize by copy-then-delete between key prefixes.
//! - [`LockMarkerLogSource`]: claim by atomically creating marker files in a lock directory.
//!
//! Pick one at startup with [`build_log_source`].

pub mod lock_marker;
pub mod moving;
pub mod store;

pub use lock_marker::{
    DONE_MARKER_SUFFIX, KEY_MARKER_DIR, LockMarkerLogSource, pattern_prefix,
};
pub use moving::{MovingLogSource, PrefixLayout, replace_prefix};
pub use store::{CopyOutcome, LocalObjectStore, ObjectStore};

use anyhow::Result;
use std::sync::Arc;

use crate::types::{ClaimOutcome, LogFile};
use crate::utils::settings::{FetchMode, Settings};

/// Backing store of log files as seen by the fetch loop.
///
/// Contract:
/// - `list_candidates` never returns more than `batch_size` files, all [`Unclaimed`](crate::LifecycleState::Unclaimed).
/// - `claim` is exclusive where the backend allows it; losing a race is `Ok(AlreadyClaimed)`.
/// - `fetch` and `finalize` take the `LogFile` returned by a successful claim.
pub trait LogSource: Send {
    /// Short strategy name for logs and the status surface.
    fn name(&self) -> &'static str;

    fn list_candidates(&mut self, batch_size: usize) -> Result<Vec<LogFile>>;

    fn claim(&mut self, file: &LogFile) -> Result<ClaimOutcome>;

    /// Raw lines of a claimed file, in order, without line terminators.
    fn fetch(&mut self, file: &LogFile) -> Result<Vec<String>>;

    /// Mark a claimed file done. Returns the finalized file.
    fn finalize(&mut self, file: &LogFile) -> Result<LogFile>;
}

/// Build the strategy selected by `settings.fetch_mode` over `store`.
pub fn build_log_source(
    settings: &Settings,
    store: Arc<dyn ObjectStore>,
) -> Result<Box<dyn LogSource>> {
    let source: Box<dyn LogSource> = match &settings.fetch_mode {
        FetchMode::Moving(layout) => Box::new(MovingLogSource::new(store, layout.clone())),
        FetchMode::LockMarker { work_dir, patterns } => Box::new(LockMarkerLogSource::new(
            store,
            work_dir.clone(),
            patterns.clone(),
        )?),
    };
    log::info!("Using {} log source", source.name());
    Ok(source)
}

/// Split raw object bytes into lines. Invalid UTF-8 is replaced rather than rejected.
pub fn decode_lines(bytes: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(str::to_string)
        .collect()
}
