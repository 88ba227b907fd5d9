//! Moving strategy: claim and finalize by moving objects between prefixes.
//!
//! Move is copy-then-delete, two separate calls. Two instances listing at the same time can both
//! copy the same object before either deletes it, so a file may be processed twice. A crash
//! between copy and delete leaves the object under both prefixes; nothing here reconciles that.

use anyhow::{Result, bail};
use log::{debug, warn};
use std::sync::Arc;

use super::LogSource;
use super::decode_lines;
use super::store::{CopyOutcome, ObjectStore};
use crate::types::{ClaimOutcome, LogFile};

/// Key prefixes for the three namespaces a log file moves through.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrefixLayout {
    pub unprocessed: String,
    pub processing: String,
    pub processed: String,
}

impl PrefixLayout {
    pub fn processing_name(&self, unprocessed_name: &str) -> Result<String> {
        replace_prefix(unprocessed_name, &self.unprocessed, &self.processing)
    }

    pub fn processed_name(&self, processing_name: &str) -> Result<String> {
        replace_prefix(processing_name, &self.processing, &self.processed)
    }
}

/// Replace `old_prefix` with `new_prefix` once. Fails if `name` does not start with `old_prefix`.
pub fn replace_prefix(name: &str, old_prefix: &str, new_prefix: &str) -> Result<String> {
    match name.strip_prefix(old_prefix) {
        Some(rest) => Ok(format!("{new_prefix}{rest}")),
        None => bail!("{name} does not start with expected prefix {old_prefix}"),
    }
}

pub struct MovingLogSource {
    store: Arc<dyn ObjectStore>,
    layout: PrefixLayout,
}

impl MovingLogSource {
    pub fn new(store: Arc<dyn ObjectStore>, layout: PrefixLayout) -> Self {
        Self { store, layout }
    }

    pub fn layout(&self) -> &PrefixLayout {
        &self.layout
    }

    fn move_object(&self, from: &str, to: &str) -> Result<CopyOutcome> {
        let outcome = self.store.copy(from, to)?;
        if outcome == CopyOutcome::Copied {
            self.store.delete(from)?;
        }
        Ok(outcome)
    }
}

impl LogSource for MovingLogSource {
    fn name(&self) -> &'static str {
        "moving"
    }

    fn list_candidates(&mut self, batch_size: usize) -> Result<Vec<LogFile>> {
        // Claimed objects leave the unprocessed prefix, so the first page is always the next one.
        let keys = self
            .store
            .list(&self.layout.unprocessed, None, batch_size)?;
        Ok(keys.into_iter().map(LogFile::candidate).collect())
    }

    fn claim(&mut self, file: &LogFile) -> Result<ClaimOutcome> {
        let processing_name = self.layout.processing_name(&file.id)?;
        match self.move_object(&file.id, &processing_name)? {
            CopyOutcome::Copied => {
                debug!("claimed {} as {}", file.id, processing_name);
                Ok(ClaimOutcome::Claimed(
                    file.clone().into_claimed(processing_name)?,
                ))
            }
            CopyOutcome::SourceMissing => {
                warn!("{} vanished before it could be claimed - skipping", file.id);
                Ok(ClaimOutcome::AlreadyClaimed)
            }
        }
    }

    fn fetch(&mut self, file: &LogFile) -> Result<Vec<String>> {
        Ok(decode_lines(&self.store.get(&file.id)?))
    }

    fn finalize(&mut self, file: &LogFile) -> Result<LogFile> {
        let processed_name = self.layout.processed_name(&file.id)?;
        match self.move_object(&file.id, &processed_name)? {
            CopyOutcome::Copied => {}
            // A previous attempt copied and deleted but reported failure afterwards.
            CopyOutcome::SourceMissing if self.store.exists(&processed_name)? => {
                debug!("{} already at {}", file.id, processed_name);
            }
            CopyOutcome::SourceMissing => {
                bail!("cannot finalize {}: object is missing", file.id)
            }
        }
        let mut finalized = file.clone().into_finalized()?;
        finalized.id = processed_name;
        Ok(finalized)
    }
}
