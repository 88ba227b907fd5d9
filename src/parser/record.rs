//! Structured form of one access-log line.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One parsed access-log entry. Immutable once built; serialized as the indexed document.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    /// ALB connection type (`http`, `https`, `h2`, `ws`, `wss`, `grpcs`). Absent for classic ELB.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_type: Option<String>,
    pub elb: String,
    pub client_ip: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_port: Option<u16>,
    /// Seconds; `-1` when the load balancer could not dispatch the request.
    pub request_processing_time: f64,
    pub backend_processing_time: f64,
    pub response_processing_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elb_status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_status_code: Option<u16>,
    pub received_bytes: u64,
    pub sent_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_cipher: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_group_arn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_name: Option<String>,
}
