//! Shared fixtures: sample log lines, on-disk store helpers, fake sources and sinks.
#![allow(dead_code)]

use anyhow::{Result, bail};
use elb_ingestor::parser::LogRecord;
use elb_ingestor::shipper::{RecordSink, ShipReport};
use elb_ingestor::source::LogSource;
use elb_ingestor::{ClaimOutcome, LogFile};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

pub const CLASSIC_LINE: &str = r#"2015-05-13T23:39:43.945958Z my-loadbalancer 192.168.131.39:2817 10.0.0.1:80 0.000073 0.001048 0.000057 200 200 0 29 "GET http://www.example.com:80/ HTTP/1.1" "curl/7.38.0" - -"#;

pub const CLASSIC_LINE_2: &str = r#"2015-05-13T23:40:01.000001Z my-loadbalancer 192.168.131.40:4000 10.0.0.2:80 0.000086 0.001048 0.001337 404 404 0 57 "GET https://www.example.com:443/missing HTTP/1.1" "Mozilla/5.0 (X11; Linux x86_64)" ECDHE-RSA-AES128-GCM-SHA256 TLSv1.2"#;

pub const ALB_LINE: &str = r#"https 2018-07-02T22:23:00.186641Z app/my-loadbalancer/50dc6c495c0c9188 192.168.131.39:2817 10.0.0.1:80 0.086 0.048 0.037 200 200 0 57 "GET https://www.example.com:443/ HTTP/1.1" "curl/7.46.0" ECDHE-RSA-AES128-GCM-SHA256 TLSv1.2 arn:aws:elasticloadbalancing:us-east-2:123456789012:targetgroup/my-targets/73e2d6bc24d8a067 "Root=1-58337281-1d84f3d73c47ec4e58577259" "www.example.com" "arn:aws:acm:us-east-2:123456789012:certificate/12345678-1234-1234-1234-123456789012" 1 2018-07-02T22:22:48.364000Z "authenticate,forward" "-" "-" "10.0.0.1:80" "200" "-" "-""#;

pub const MALFORMED_LINE: &str = "this is not an access log line";

/// Write `contents` to `root/<key>`, creating directories.
pub fn write_object(root: &Path, key: &str, contents: &str) {
    let path = root.join(key);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

pub fn lines(lines: &[&str]) -> String {
    let mut s = lines.join("\n");
    s.push('\n');
    s
}

/// Poll `cond` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    cond()
}

/// In-memory source whose fetch and finalize fail a set number of times before succeeding.
pub struct FlakySource {
    pending: Vec<String>,
    fetch_failures_left: usize,
    finalize_failures_left: usize,
    pub fetch_attempts: Arc<Mutex<Vec<String>>>,
    pub finalize_attempts: Arc<Mutex<Vec<String>>>,
    pub finalized: Arc<Mutex<Vec<String>>>,
}

impl FlakySource {
    pub fn new(ids: &[&str], finalize_failures: usize) -> Self {
        Self {
            pending: ids.iter().map(|s| s.to_string()).collect(),
            fetch_failures_left: 0,
            finalize_failures_left: finalize_failures,
            fetch_attempts: Arc::new(Mutex::new(Vec::new())),
            finalize_attempts: Arc::new(Mutex::new(Vec::new())),
            finalized: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_fetch_failures(mut self, failures: usize) -> Self {
        self.fetch_failures_left = failures;
        self
    }
}

impl LogSource for FlakySource {
    fn name(&self) -> &'static str {
        "flaky"
    }

    fn list_candidates(&mut self, batch_size: usize) -> Result<Vec<LogFile>> {
        let n = batch_size.min(self.pending.len());
        Ok(self
            .pending
            .drain(..n)
            .map(LogFile::candidate)
            .collect())
    }

    fn claim(&mut self, file: &LogFile) -> Result<ClaimOutcome> {
        Ok(ClaimOutcome::Claimed(
            file.clone().into_claimed(file.id.clone())?,
        ))
    }

    fn fetch(&mut self, file: &LogFile) -> Result<Vec<String>> {
        self.fetch_attempts.lock().unwrap().push(file.id.clone());
        if self.fetch_failures_left > 0 {
            self.fetch_failures_left -= 1;
            bail!("read timed out");
        }
        Ok(vec![CLASSIC_LINE.to_string()])
    }

    fn finalize(&mut self, file: &LogFile) -> Result<LogFile> {
        self.finalize_attempts.lock().unwrap().push(file.id.clone());
        if self.finalize_failures_left > 0 {
            self.finalize_failures_left -= 1;
            bail!("backend unavailable");
        }
        self.finalized.lock().unwrap().push(file.id.clone());
        file.clone().into_finalized()
    }
}

/// Source whose listing always fails.
pub struct BrokenSource;

impl LogSource for BrokenSource {
    fn name(&self) -> &'static str {
        "broken"
    }

    fn list_candidates(&mut self, _batch_size: usize) -> Result<Vec<LogFile>> {
        bail!("listing failed")
    }

    fn claim(&mut self, _file: &LogFile) -> Result<ClaimOutcome> {
        bail!("unreachable")
    }

    fn fetch(&mut self, _file: &LogFile) -> Result<Vec<String>> {
        bail!("unreachable")
    }

    fn finalize(&mut self, _file: &LogFile) -> Result<LogFile> {
        bail!("unreachable")
    }
}

/// Sink that keeps every record it is given.
#[derive(Default)]
pub struct RecordingSink {
    pub records: Mutex<Vec<LogRecord>>,
}

impl RecordSink for RecordingSink {
    fn ship(&self, records: &[LogRecord]) -> Result<ShipReport> {
        self.records.lock().unwrap().extend_from_slice(records);
        Ok(ShipReport {
            shipped: records.len(),
            failed: 0,
        })
    }
}

/// Sink that always fails.
pub struct FailingSink;

impl RecordSink for FailingSink {
    fn ship(&self, _records: &[LogRecord]) -> Result<ShipReport> {
        bail!("index unreachable")
    }
}
