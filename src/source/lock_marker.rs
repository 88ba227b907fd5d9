//! Lock-marker strategy: claims are marker files created with create-if-absent.
//!
//! Work is an ordered list of patterns. A run first claims a whole pattern by creating
//! `lock_dir/<pattern>`, then claims each listed key by creating `lock_dir/keys/<key>`. Key
//! markers live in their own directory so a pattern that names an exact key never blocks that
//! key. Finalize leaves `lock_dir/keys/<key>.done` next to the claim marker, so after a crash an
//! operator can tell "claimed" from "claimed and done". Markers are never removed here; a crash
//! between claim and finalize leaves the key claimed until someone deletes its marker.

use anyhow::{Context, Result, bail};
use log::{debug, info, warn};
use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::LogSource;
use super::decode_lines;
use super::store::ObjectStore;
use crate::types::{ClaimOutcome, LogFile};

/// Appended to a key's marker name once the key is finalized.
pub const DONE_MARKER_SUFFIX: &str = ".done";

/// Subdirectory of the lock directory holding per-key markers.
pub const KEY_MARKER_DIR: &str = "keys";

/// Listing prefix for a pattern: a trailing `*` means "anything after", which is what a prefix
/// listing does anyway.
pub fn pattern_prefix(pattern: &str) -> &str {
    pattern.trim_end_matches('*')
}

/// Paging position inside the currently selected pattern.
#[derive(Debug)]
struct PatternCursor {
    pattern: String,
    last_key: Option<String>,
    exhausted: bool,
}

pub struct LockMarkerLogSource {
    store: Arc<dyn ObjectStore>,
    lock_dir: PathBuf,
    patterns: Vec<String>,
    cursor: Option<PatternCursor>,
}

impl LockMarkerLogSource {
    /// Creates `lock_dir` if needed. Patterns are tried in the given order; none may start with
    /// the `keys/` directory.
    pub fn new(
        store: Arc<dyn ObjectStore>,
        lock_dir: impl Into<PathBuf>,
        patterns: Vec<String>,
    ) -> Result<Self> {
        let lock_dir = lock_dir.into();
        if let Some(pattern) = patterns
            .iter()
            .find(|p| p.split('/').find(|part| !part.is_empty()) == Some(KEY_MARKER_DIR))
        {
            bail!("pattern {pattern} would share the {KEY_MARKER_DIR}/ marker directory");
        }
        fs::create_dir_all(&lock_dir)
            .with_context(|| format!("create lock directory {}", lock_dir.display()))?;
        Ok(Self {
            store,
            lock_dir,
            patterns,
            cursor: None,
        })
    }

    pub fn lock_dir(&self) -> &Path {
        &self.lock_dir
    }

    /// Pattern currently being paged through, if any.
    pub fn current_pattern(&self) -> Option<&str> {
        self.cursor.as_ref().map(|c| c.pattern.as_str())
    }

    /// Claim marker for a pattern: `lock_dir/<pattern>`.
    pub fn pattern_marker_path(&self, pattern: &str) -> PathBuf {
        join_segments(self.lock_dir.clone(), pattern)
    }

    /// Claim marker for a key: `lock_dir/keys/<key>`.
    pub fn key_marker_path(&self, id: &str) -> PathBuf {
        join_segments(self.lock_dir.join(KEY_MARKER_DIR), id)
    }

    /// Completion marker for a key: `lock_dir/keys/<key>.done`.
    pub fn done_marker_path(&self, id: &str) -> PathBuf {
        self.key_marker_path(&format!("{id}{DONE_MARKER_SUFFIX}"))
    }

    /// Claim the first pattern that has no marker yet. `None` when every pattern is taken.
    pub fn select_next_pattern(&self) -> Result<Option<String>> {
        for pattern in &self.patterns {
            if create_marker(&self.pattern_marker_path(pattern))? {
                info!("Claimed pattern {pattern}");
                return Ok(Some(pattern.clone()));
            }
            debug!("pattern {pattern} already locked");
        }
        Ok(None)
    }
}

fn join_segments(base: PathBuf, name: &str) -> PathBuf {
    name.split('/')
        .filter(|part| !part.is_empty())
        .fold(base, |acc, part| acc.join(part))
}

/// Create `path` only if absent. `Ok(false)` when it already exists.
fn create_marker(path: &Path) -> Result<bool> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create marker directory {}", parent.display()))?;
    }
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e).with_context(|| format!("create marker {}", path.display())),
    }
}

impl LogSource for LockMarkerLogSource {
    fn name(&self) -> &'static str {
        "lock-marker"
    }

    fn list_candidates(&mut self, batch_size: usize) -> Result<Vec<LogFile>> {
        loop {
            if self.cursor.as_ref().is_none_or(|c| c.exhausted) {
                match self.select_next_pattern()? {
                    Some(pattern) => {
                        self.cursor = Some(PatternCursor {
                            pattern,
                            last_key: None,
                            exhausted: false,
                        })
                    }
                    None => {
                        self.cursor = None;
                        debug!("no unclaimed patterns left");
                        return Ok(Vec::new());
                    }
                }
            }
            let Some(cursor) = self.cursor.as_mut() else {
                continue;
            };
            let keys = self.store.list(
                pattern_prefix(&cursor.pattern),
                cursor.last_key.as_deref(),
                batch_size,
            )?;
            // A short page means the pattern is drained; a full one may have more behind it.
            if keys.len() < batch_size {
                cursor.exhausted = true;
            }
            if let Some(last) = keys.last() {
                cursor.last_key = Some(last.clone());
            }
            if !keys.is_empty() {
                return Ok(keys.into_iter().map(LogFile::candidate).collect());
            }
        }
    }

    fn claim(&mut self, file: &LogFile) -> Result<ClaimOutcome> {
        if create_marker(&self.key_marker_path(&file.id))? {
            Ok(ClaimOutcome::Claimed(
                file.clone().into_claimed(file.id.clone())?,
            ))
        } else {
            warn!("Found {} but a lock exists - skipping this", file.id);
            Ok(ClaimOutcome::AlreadyClaimed)
        }
    }

    fn fetch(&mut self, file: &LogFile) -> Result<Vec<String>> {
        Ok(decode_lines(&self.store.get(&file.id)?))
    }

    fn finalize(&mut self, file: &LogFile) -> Result<LogFile> {
        if !self.key_marker_path(&file.id).is_file() {
            bail!("cannot finalize {}: no claim marker", file.id);
        }
        let done = self.done_marker_path(&file.id);
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&done)
            .with_context(|| format!("create done marker {}", done.display()))?;
        file.clone().into_finalized()
    }
}
