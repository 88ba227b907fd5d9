//! Access-log line grammar: classic ELB and ALB lines into [`LogRecord`]s.
//!
//! Classic ELB:
//! `time elb client:port backend:port req_t backend_t resp_t elb_status backend_status rx tx "request" "user_agent" ssl_cipher ssl_protocol`
//!
//! ALB prepends the connection type and appends target group, trace id, domain name and more;
//! fields past the domain name are ignored.

pub mod record;

pub use record::LogRecord;

use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, Utc};

/// Fields every line must have: time through the quoted request.
const MIN_FIELDS: usize = 12;

/// ALB connection types that may lead a line.
const ALB_CONNECTION_TYPES: &[&str] = &["http", "https", "h2", "ws", "wss", "grpcs"];

/// Split on whitespace; double-quoted fields may contain spaces and `\"`.
pub fn tokenize(line: &str) -> Result<Vec<String>> {
    let mut fields = Vec::new();
    let mut chars = line.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        let mut field = String::new();
        if c == '"' {
            chars.next();
            let mut closed = false;
            while let Some(c) = chars.next() {
                match c {
                    '\\' => {
                        if let Some(escaped) = chars.next() {
                            field.push(escaped);
                        }
                    }
                    '"' => {
                        closed = true;
                        break;
                    }
                    _ => field.push(c),
                }
            }
            if !closed {
                bail!("unterminated quoted field");
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() {
                    break;
                }
                field.push(c);
                chars.next();
            }
        }
        fields.push(field);
    }
    Ok(fields)
}

/// Parse one raw line. Callers skip blank lines before calling.
pub fn parse_line(line: &str) -> Result<LogRecord> {
    let fields = tokenize(line.trim())?;
    let (connection_type, rest) = match fields.first() {
        Some(first) if ALB_CONNECTION_TYPES.contains(&first.as_str()) => {
            (Some(first.clone()), &fields[1..])
        }
        _ => (None, &fields[..]),
    };
    if rest.len() < MIN_FIELDS {
        bail!(
            "expected at least {MIN_FIELDS} fields, found {}",
            rest.len()
        );
    }

    let timestamp = parse_timestamp(&rest[0])?;
    let (client_ip, client_port) =
        split_endpoint(&rest[2]).ok_or_else(|| anyhow!("missing client address"))?;
    let backend = split_endpoint(&rest[3]);
    let (http_method, url, http_version) = split_request(&rest[11]);
    let alb_field = |idx: usize| connection_type.as_ref().and_then(|_| optional(rest.get(idx)));

    Ok(LogRecord {
        timestamp,
        connection_type: connection_type.clone(),
        elb: rest[1].clone(),
        client_ip,
        client_port,
        backend_ip: backend.as_ref().map(|(ip, _)| ip.clone()),
        backend_port: backend.and_then(|(_, port)| port),
        request_processing_time: parse_number(&rest[4], "request_processing_time")?,
        backend_processing_time: parse_number(&rest[5], "backend_processing_time")?,
        response_processing_time: parse_number(&rest[6], "response_processing_time")?,
        elb_status_code: parse_status(&rest[7])?,
        backend_status_code: parse_status(&rest[8])?,
        received_bytes: parse_number(&rest[9], "received_bytes")?,
        sent_bytes: parse_number(&rest[10], "sent_bytes")?,
        http_method,
        url,
        http_version,
        user_agent: optional(rest.get(12)),
        ssl_cipher: optional(rest.get(13)),
        ssl_protocol: optional(rest.get(14)),
        target_group_arn: alb_field(15),
        trace_id: alb_field(16),
        domain_name: alb_field(17),
    })
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .with_context(|| format!("invalid timestamp {raw:?}"))
}

fn parse_number<T: std::str::FromStr>(raw: &str, name: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse::<T>()
        .with_context(|| format!("invalid {name} {raw:?}"))
}

fn parse_status(raw: &str) -> Result<Option<u16>> {
    if raw == "-" {
        return Ok(None);
    }
    parse_number(raw, "status code").map(Some)
}

/// `-` and empty fields carry no value.
fn optional(raw: Option<&String>) -> Option<String> {
    raw.filter(|s| !s.is_empty() && s.as_str() != "-").cloned()
}

/// `ip:port` → (ip, port). `-` means no endpoint (e.g. the request never reached a backend).
fn split_endpoint(raw: &str) -> Option<(String, Option<u16>)> {
    if raw.is_empty() || raw == "-" {
        return None;
    }
    match raw.rsplit_once(':') {
        Some((ip, port)) if !ip.is_empty() => {
            let ip = ip.trim_start_matches('[').trim_end_matches(']');
            Some((ip.to_string(), port.parse().ok()))
        }
        _ => Some((raw.to_string(), None)),
    }
}

/// `"GET http://host/path HTTP/1.1"` → method, url, version. TCP listeners log `- - - `.
fn split_request(raw: &str) -> (Option<String>, Option<String>, Option<String>) {
    let mut parts = raw.split_whitespace().map(|p| {
        if p == "-" {
            None
        } else {
            Some(p.to_string())
        }
    });
    let method = parts.next().flatten();
    let url = parts.next().flatten();
    let version = parts.next().flatten();
    (method, url, version)
}
