//! Runtime settings: defaults → config file → environment (and `.env`) → CLI overrides.

use anyhow::{Context, Result, bail};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::source::PrefixLayout;
use crate::utils::config::{
    EnvKeys, FetchModeNames, ListenDefaults, PipelineDefaults, PrefixDefaults, ShipDefaults,
};
use crate::utils::ingestor_toml::{apply_file_to_vars, load_ingestor_toml};

/// Which claim strategy the log source uses.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchMode {
    Moving(PrefixLayout),
    LockMarker {
        work_dir: PathBuf,
        patterns: Vec<String>,
    },
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub elasticsearch_hosts: Vec<String>,
    /// Root of the log store.
    pub bucket: PathBuf,
    pub fetch_mode: FetchMode,
    pub file_batch_size: usize,
    pub index_pattern: String,
    pub listen_host: String,
    pub listen_port: u16,
    pub ship_workers: usize,
    pub ship_batch_size: usize,
    pub ship_retries: u64,
    pub ship_timeout: Duration,
    pub todo_queue_size: usize,
    pub record_queue_size: usize,
    pub finalize_retry_delay: Duration,
}

impl Settings {
    /// Load all layers. `overrides` are `(env key, value)` pairs from the command line.
    pub fn load(config_path: Option<&Path>, overrides: &[(&str, String)]) -> Result<Self> {
        // .env fills gaps only; variables already in the environment win.
        if let Ok(path) = dotenvy::dotenv() {
            log::debug!("loaded {}", path.display());
        }
        let mut vars = BTreeMap::new();
        if let Some(file) = load_ingestor_toml(config_path)? {
            apply_file_to_vars(&file, &mut vars);
        }
        for key in EnvKeys::ALL {
            if let Ok(value) = std::env::var(key) {
                vars.insert(key.to_string(), value);
            }
        }
        for (key, value) in overrides {
            vars.insert(key.to_string(), value.clone());
        }
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    /// Build from any key → value lookup (environment, a map in tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let elasticsearch_hosts: Vec<String> = required(&lookup, EnvKeys::ELASTICSEARCH_HOSTS)?
            .split(',')
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .collect();
        if elasticsearch_hosts.is_empty() {
            bail!("{} lists no hosts", EnvKeys::ELASTICSEARCH_HOSTS);
        }

        let mode = required(&lookup, EnvKeys::FETCH_MODE)?;
        let fetch_mode = if FetchModeNames::MOVING.contains(&mode.as_str()) {
            FetchMode::Moving(PrefixLayout {
                unprocessed: lookup(EnvKeys::SEARCH_PREFIX)
                    .unwrap_or_else(|| PrefixDefaults::UNPROCESSED.to_string()),
                processing: lookup(EnvKeys::WORKING_PREFIX)
                    .unwrap_or_else(|| PrefixDefaults::PROCESSING.to_string()),
                processed: lookup(EnvKeys::DONE_PREFIX)
                    .unwrap_or_else(|| PrefixDefaults::PROCESSED.to_string()),
            })
        } else if FetchModeNames::LOCK_MARKER.contains(&mode.as_str()) {
            let work_dir = PathBuf::from(required(&lookup, EnvKeys::WORK_DIR)?);
            let list_file = PathBuf::from(required(&lookup, EnvKeys::LIST_FILE)?);
            FetchMode::LockMarker {
                work_dir,
                patterns: read_pattern_list(&list_file)?,
            }
        } else {
            bail!(
                "no valid fetch mode found: {mode:?} (expected one of {:?} or {:?})",
                FetchModeNames::MOVING,
                FetchModeNames::LOCK_MARKER
            );
        };

        Ok(Self {
            elasticsearch_hosts,
            bucket: PathBuf::from(required(&lookup, EnvKeys::BUCKET)?),
            fetch_mode,
            file_batch_size: positive(
                &lookup,
                EnvKeys::FILE_BATCH_SIZE,
                PipelineDefaults::FILE_BATCH_SIZE,
            )?,
            index_pattern: lookup(EnvKeys::INDEX_PATTERN)
                .unwrap_or_else(|| ShipDefaults::INDEX_PATTERN.to_string()),
            listen_host: lookup(EnvKeys::LISTEN_HOST)
                .unwrap_or_else(|| ListenDefaults::HOST.to_string()),
            listen_port: parsed(&lookup, EnvKeys::LISTEN_PORT, ListenDefaults::PORT)?,
            ship_workers: positive(&lookup, EnvKeys::SHIP_WORKERS, PipelineDefaults::SHIP_WORKERS)?,
            ship_batch_size: positive(
                &lookup,
                EnvKeys::SHIP_BATCH_SIZE,
                PipelineDefaults::SHIP_BATCH_SIZE,
            )?,
            ship_retries: parsed(&lookup, EnvKeys::SHIP_RETRIES, ShipDefaults::RETRIES)?,
            ship_timeout: Duration::from_secs(parsed(
                &lookup,
                EnvKeys::SHIP_TIMEOUT_SECS,
                ShipDefaults::TIMEOUT.as_secs(),
            )?),
            todo_queue_size: positive(
                &lookup,
                EnvKeys::TODO_QUEUE_SIZE,
                PipelineDefaults::TODO_QUEUE_CAPACITY,
            )?,
            record_queue_size: positive(
                &lookup,
                EnvKeys::RECORD_QUEUE_SIZE,
                PipelineDefaults::RECORD_QUEUE_CAPACITY,
            )?,
            finalize_retry_delay: Duration::from_millis(parsed(
                &lookup,
                EnvKeys::FINALIZE_RETRY_DELAY_MS,
                PipelineDefaults::FINALIZE_RETRY_DELAY.as_millis() as u64,
            )?),
        })
    }

    /// `host:port` for the status surface.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.listen_host, self.listen_port)
    }
}

fn required(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String> {
    lookup(key).with_context(|| format!("{key} is required"))
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid {key}: {raw:?}")),
        None => Ok(default),
    }
}

fn positive(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: usize) -> Result<usize> {
    let value = parsed(lookup, key, default)?;
    if value == 0 {
        bail!("{key} must be at least 1");
    }
    Ok(value)
}

/// One pattern per line, in priority order. Blank lines and `#` comments are skipped.
pub fn parse_pattern_list(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

pub fn read_pattern_list(path: &Path) -> Result<Vec<String>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("read pattern list {}", path.display()))?;
    let patterns = parse_pattern_list(&contents);
    if patterns.is_empty() {
        bail!("pattern list {} is empty", path.display());
    }
    Ok(patterns)
}
