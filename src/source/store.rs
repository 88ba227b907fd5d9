//! Object store seam: the backing store the log sources list, read and move keys in.

use anyhow::{Context, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Outcome of [`ObjectStore::copy`]. A missing source is reported, not raised, because under
/// concurrent claiming it usually means another instance moved the object first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CopyOutcome {
    Copied,
    SourceMissing,
}

/// Key/value store with ordered, prefix-filtered listing.
///
/// Keys are `/`-separated. `list` returns keys in ascending byte order, starting strictly
/// after `start_after` when given, and never more than `max_keys`.
pub trait ObjectStore: Send + Sync {
    fn list(&self, prefix: &str, start_after: Option<&str>, max_keys: usize)
    -> Result<Vec<String>>;
    fn get(&self, key: &str) -> Result<Vec<u8>>;
    fn copy(&self, from: &str, to: &str) -> Result<CopyOutcome>;
    /// Deleting a missing key succeeds.
    fn delete(&self, key: &str) -> Result<()>;
    fn exists(&self, key: &str) -> Result<bool>;
}

/// A directory tree used as a bucket (e.g. a mounted bucket or a synced log directory).
#[derive(Clone, Debug)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        key.split('/')
            .filter(|part| !part.is_empty())
            .fold(self.root.clone(), |acc, part| acc.join(part))
    }

    fn key_for(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<_> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    }

    /// Deepest directory that can contain every key with `prefix`.
    fn walk_start(&self, prefix: &str) -> PathBuf {
        match prefix.rfind('/') {
            Some(idx) => self.path_for(&prefix[..idx]),
            None => self.root.clone(),
        }
    }
}

impl ObjectStore for LocalObjectStore {
    fn list(
        &self,
        prefix: &str,
        start_after: Option<&str>,
        max_keys: usize,
    ) -> Result<Vec<String>> {
        if !self.root.is_dir() {
            anyhow::bail!("store root {} is not a directory", self.root.display());
        }
        let start = self.walk_start(prefix);
        if !start.exists() {
            return Ok(Vec::new());
        }
        let mut keys = Vec::new();
        for entry in WalkDir::new(&start) {
            let entry =
                entry.with_context(|| format!("list {} under {}", prefix, start.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(key) = self.key_for(entry.path()) else {
                continue;
            };
            if !key.starts_with(prefix) {
                continue;
            }
            if let Some(after) = start_after
                && key.as_str() <= after
            {
                continue;
            }
            keys.push(key);
        }
        keys.sort();
        keys.truncate(max_keys);
        Ok(keys)
    }

    fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_for(key);
        fs::read(&path).with_context(|| format!("read object {key} ({})", path.display()))
    }

    fn copy(&self, from: &str, to: &str) -> Result<CopyOutcome> {
        let src = self.path_for(from);
        let dst = self.path_for(to);
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create parent for {to} ({})", parent.display()))?;
        }
        match fs::copy(&src, &dst) {
            Ok(_) => Ok(CopyOutcome::Copied),
            Err(e) if e.kind() == ErrorKind::NotFound && !src.exists() => {
                Ok(CopyOutcome::SourceMissing)
            }
            Err(e) => Err(e).with_context(|| format!("copy object {from} -> {to}")),
        }
    }

    fn delete(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("delete object {key}")),
        }
    }

    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.path_for(key).is_file())
    }
}
