//! Load `elb-ingestor.toml`. Its `[settings]` table uses the environment keys' names in
//! lowercase without the `ELB_INGESTOR_` prefix; environment and CLI override it.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::utils::config::{EnvKeys, PackagePaths};

#[derive(Debug, Default, Deserialize)]
pub struct IngestorToml {
    #[serde(default)]
    settings: SettingsSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SettingsSection {
    elasticsearch_hosts: Option<Vec<String>>,
    bucket: Option<String>,
    fetch_mode: Option<String>,
    search_prefix: Option<String>,
    working_prefix: Option<String>,
    done_prefix: Option<String>,
    work_dir: Option<String>,
    list_file: Option<String>,
    file_batch_size: Option<usize>,
    index_pattern: Option<String>,
    listen_host: Option<String>,
    listen_port: Option<u16>,
    ship_workers: Option<usize>,
    ship_batch_size: Option<usize>,
    ship_retries: Option<u64>,
    ship_timeout_secs: Option<u64>,
    todo_queue_size: Option<usize>,
    record_queue_size: Option<usize>,
    finalize_retry_delay_ms: Option<u64>,
}

/// Parse a config file's contents.
pub fn parse_ingestor_toml(s: &str) -> Result<IngestorToml> {
    toml::from_str(s).context("parse config file")
}

/// Load `path` when given (must exist), otherwise `elb-ingestor.toml` in the working directory
/// if present.
pub fn load_ingestor_toml(path: Option<&Path>) -> Result<Option<IngestorToml>> {
    let (path, required) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => (Path::new(PackagePaths::get().config_filename()).to_path_buf(), false),
    };
    if !required && !path.is_file() {
        return Ok(None);
    }
    let s = std::fs::read_to_string(&path)
        .with_context(|| format!("read config file {}", path.display()))?;
    let file = parse_ingestor_toml(&s).with_context(|| path.display().to_string())?;
    log::debug!("loaded config file {}", path.display());
    Ok(Some(file))
}

/// Set `key` from the file when the field is present.
macro_rules! apply_file_opt {
    ($section:expr, $vars:expr, $field:ident => $key:expr) => {
        if let Some(ref v) = $section.$field {
            $vars.insert($key.to_string(), v.to_string());
        }
    };
}

/// Copy file values into `vars` (keyed by environment variable name). Call before applying
/// environment and CLI.
pub fn apply_file_to_vars(file: &IngestorToml, vars: &mut BTreeMap<String, String>) {
    let s = &file.settings;
    if let Some(ref hosts) = s.elasticsearch_hosts {
        vars.insert(EnvKeys::ELASTICSEARCH_HOSTS.to_string(), hosts.join(","));
    }
    apply_file_opt!(s, vars, bucket => EnvKeys::BUCKET);
    apply_file_opt!(s, vars, fetch_mode => EnvKeys::FETCH_MODE);
    apply_file_opt!(s, vars, search_prefix => EnvKeys::SEARCH_PREFIX);
    apply_file_opt!(s, vars, working_prefix => EnvKeys::WORKING_PREFIX);
    apply_file_opt!(s, vars, done_prefix => EnvKeys::DONE_PREFIX);
    apply_file_opt!(s, vars, work_dir => EnvKeys::WORK_DIR);
    apply_file_opt!(s, vars, list_file => EnvKeys::LIST_FILE);
    apply_file_opt!(s, vars, file_batch_size => EnvKeys::FILE_BATCH_SIZE);
    apply_file_opt!(s, vars, index_pattern => EnvKeys::INDEX_PATTERN);
    apply_file_opt!(s, vars, listen_host => EnvKeys::LISTEN_HOST);
    apply_file_opt!(s, vars, listen_port => EnvKeys::LISTEN_PORT);
    apply_file_opt!(s, vars, ship_workers => EnvKeys::SHIP_WORKERS);
    apply_file_opt!(s, vars, ship_batch_size => EnvKeys::SHIP_BATCH_SIZE);
    apply_file_opt!(s, vars, ship_retries => EnvKeys::SHIP_RETRIES);
    apply_file_opt!(s, vars, ship_timeout_secs => EnvKeys::SHIP_TIMEOUT_SECS);
    apply_file_opt!(s, vars, todo_queue_size => EnvKeys::TODO_QUEUE_SIZE);
    apply_file_opt!(s, vars, record_queue_size => EnvKeys::RECORD_QUEUE_SIZE);
    apply_file_opt!(s, vars, finalize_retry_delay_ms => EnvKeys::FINALIZE_RETRY_DELAY_MS);
}
