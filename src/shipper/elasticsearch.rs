//! Elasticsearch `_bulk` client over blocking reqwest.

use anyhow::{Context, Result, bail};
use chrono::format::{Item, StrftimeItems};
use log::{debug, error, warn};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use super::{RecordSink, RetryStrategy, ShipReport};
use crate::parser::LogRecord;

pub struct ElasticsearchConfig {
    /// Base URLs. A host without scheme gets `http://`.
    pub hosts: Vec<String>,
    /// strftime pattern applied to each record's timestamp, e.g. `logs-platform-%Y.%m.%d`.
    pub index_pattern: String,
    pub timeout: Duration,
    pub retry_strategy: RetryStrategy,
}

pub struct ElasticsearchClient {
    client: Client,
    hosts: Vec<String>,
    index_pattern: String,
    retry_strategy: RetryStrategy,
    next_host: AtomicUsize,
}

enum BulkError {
    /// 4xx: the request itself is bad, retrying will not help.
    Permanent(Option<StatusCode>, String),
    Transient(Option<StatusCode>, String),
}

#[derive(Debug, Deserialize)]
struct BulkResponse {
    #[serde(default)]
    errors: bool,
    #[serde(default)]
    items: Vec<HashMap<String, BulkItem>>,
}

#[derive(Debug, Deserialize)]
struct BulkItem {
    status: u16,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

impl ElasticsearchClient {
    pub fn new(config: ElasticsearchConfig) -> Result<Self> {
        let hosts: Vec<String> = config
            .hosts
            .iter()
            .map(|h| h.trim())
            .filter(|h| !h.is_empty())
            .map(normalize_host)
            .collect();
        if hosts.is_empty() {
            bail!("no search index hosts configured");
        }
        if StrftimeItems::new(&config.index_pattern).any(|item| matches!(item, Item::Error)) {
            bail!("invalid index pattern {:?}", config.index_pattern);
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("build HTTP client")?;
        Ok(Self {
            client,
            hosts,
            index_pattern: config.index_pattern,
            retry_strategy: config.retry_strategy,
            next_host: AtomicUsize::new(0),
        })
    }

    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    /// Target index for `record`.
    pub fn index_name(&self, record: &LogRecord) -> String {
        record.timestamp.format(&self.index_pattern).to_string()
    }

    /// NDJSON body: an `index` action line followed by the document, per record.
    pub fn bulk_body(&self, records: &[LogRecord]) -> Result<String> {
        let mut body = String::new();
        for record in records {
            let action = json!({ "index": { "_index": self.index_name(record) } });
            let doc = serde_json::to_string(record).context("serialize record")?;
            let _ = writeln!(body, "{action}");
            let _ = writeln!(body, "{doc}");
        }
        Ok(body)
    }

    fn pick_host(&self) -> &str {
        let idx = self.next_host.fetch_add(1, Ordering::Relaxed) % self.hosts.len();
        &self.hosts[idx]
    }

    fn send_once(&self, body: &str, expected: usize) -> Result<ShipReport, BulkError> {
        let url = format!("{}/_bulk", self.pick_host());
        let resp = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/x-ndjson")
            .body(body.to_string())
            .send()
            .map_err(|e| BulkError::Transient(e.status(), format!("{url}: {e}")))?;
        let status = resp.status();
        let text = resp.text().unwrap_or_default();
        if status.is_client_error() {
            return Err(BulkError::Permanent(Some(status), text));
        }
        if !status.is_success() {
            return Err(BulkError::Transient(Some(status), text));
        }
        match serde_json::from_str::<BulkResponse>(&text) {
            Ok(parsed) => Ok(tally_items(&parsed, expected)),
            Err(e) => {
                warn!("{url}: unreadable bulk response ({e}); counting batch as shipped");
                Ok(ShipReport {
                    shipped: expected,
                    failed: 0,
                })
            }
        }
    }
}

fn normalize_host(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{host}")
    }
}

fn tally_items(resp: &BulkResponse, expected: usize) -> ShipReport {
    if !resp.errors {
        return ShipReport {
            shipped: expected,
            failed: 0,
        };
    }
    let mut failed = 0;
    for item in resp.items.iter().flat_map(|entry| entry.values()) {
        if item.status >= 300 {
            if failed == 0 {
                warn!(
                    "bulk item rejected ({}): {}",
                    item.status,
                    item.error
                        .as_ref()
                        .map(|e| e.to_string())
                        .unwrap_or_default()
                );
            }
            failed += 1;
        }
    }
    let failed = failed.min(expected);
    ShipReport {
        shipped: expected - failed,
        failed,
    }
}

impl RecordSink for ElasticsearchClient {
    fn ship(&self, records: &[LogRecord]) -> Result<ShipReport> {
        if records.is_empty() {
            return Ok(ShipReport::default());
        }
        let body = self.bulk_body(records)?;
        let attempts = self.retry_strategy.attempts();
        let mut last_error = String::new();
        for attempt in 1..=attempts {
            match self.send_once(&body, records.len()) {
                Ok(report) => {
                    debug!(
                        "bulk request shipped {} records ({} rejected)",
                        report.shipped, report.failed
                    );
                    return Ok(report);
                }
                Err(BulkError::Permanent(status, msg)) => {
                    error!("{status:?}: bulk request rejected: {msg}");
                    bail!("bulk request rejected ({status:?}): {msg}");
                }
                Err(BulkError::Transient(status, msg)) => {
                    warn!("bulk attempt {attempt}/{attempts} failed ({status:?}): {msg}");
                    last_error = msg;
                    if attempt < attempts {
                        thread::sleep(self.retry_strategy.delay(attempt));
                    }
                }
            }
        }
        bail!("bulk request failed after {attempts} attempts: {last_error}")
    }
}
