mod common;

use common::{CLASSIC_LINE, CLASSIC_LINE_2};
use elb_ingestor::parser::{LogRecord, parse_line};
use elb_ingestor::shipper::{
    ElasticsearchClient, ElasticsearchConfig, RecordSink, RetryStrategy, ShipReport,
};
use mockito::{Matcher, Server};
use std::time::Duration;

fn client(hosts: Vec<String>, retry_strategy: RetryStrategy) -> ElasticsearchClient {
    ElasticsearchClient::new(ElasticsearchConfig {
        hosts,
        index_pattern: "logs-platform-%Y.%m.%d".into(),
        timeout: Duration::from_secs(5),
        retry_strategy,
    })
    .unwrap()
}

fn records() -> Vec<LogRecord> {
    vec![
        parse_line(CLASSIC_LINE).unwrap(),
        parse_line(CLASSIC_LINE_2).unwrap(),
    ]
}

// --- RetryStrategy ---

#[test]
fn test_retry_strategy_attempts_at_least_one() {
    assert_eq!(RetryStrategy::Immediate(0).attempts(), 1);
    assert_eq!(RetryStrategy::LinearBackoff(3, 100).attempts(), 3);
}

#[test]
fn test_retry_strategy_delays() {
    assert_eq!(RetryStrategy::Immediate(3).delay(2), Duration::ZERO);
    let backoff = RetryStrategy::LinearBackoff(3, 100);
    assert_eq!(backoff.delay(1), Duration::from_millis(100));
    assert_eq!(backoff.delay(2), Duration::from_millis(200));
}

// --- construction ---

#[test]
fn test_client_requires_a_host() {
    let result = ElasticsearchClient::new(ElasticsearchConfig {
        hosts: vec!["  ".into()],
        index_pattern: "logs-%Y".into(),
        timeout: Duration::from_secs(1),
        retry_strategy: RetryStrategy::Immediate(1),
    });
    assert!(result.is_err());
}

#[test]
fn test_client_rejects_invalid_index_pattern() {
    let result = ElasticsearchClient::new(ElasticsearchConfig {
        hosts: vec!["localhost:9200".into()],
        index_pattern: "logs-%Q".into(),
        timeout: Duration::from_secs(1),
        retry_strategy: RetryStrategy::Immediate(1),
    });
    assert!(result.is_err());
}

#[test]
fn test_client_normalizes_hosts() {
    let es = client(
        vec!["localhost:9200/".into(), "https://search.internal".into()],
        RetryStrategy::Immediate(1),
    );
    assert_eq!(
        es.hosts(),
        &["http://localhost:9200", "https://search.internal"]
    );
}

// --- index naming and body ---

#[test]
fn test_index_name_from_record_timestamp() {
    let es = client(vec!["localhost:9200".into()], RetryStrategy::Immediate(1));
    assert_eq!(es.index_name(&records()[0]), "logs-platform-2015.05.13");
}

#[test]
fn test_bulk_body_pairs_action_and_document() {
    let es = client(vec!["localhost:9200".into()], RetryStrategy::Immediate(1));
    let body = es.bulk_body(&records()).unwrap();
    let lines: Vec<&str> = body.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(body.ends_with('\n'));
    let action: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(action["index"]["_index"], "logs-platform-2015.05.13");
    let doc: serde_json::Value = serde_json::from_str(lines[3]).unwrap();
    assert_eq!(doc["elb_status_code"], 404);
}

// --- shipping ---

#[test]
fn test_ship_posts_ndjson_to_bulk() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/_bulk")
        .match_header("content-type", "application/x-ndjson")
        .match_body(Matcher::Regex("logs-platform-2015.05.13".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"took":3,"errors":false,"items":[]}"#)
        .expect(1)
        .create();

    let es = client(vec![server.url()], RetryStrategy::Immediate(3));
    let report = es.ship(&records()).unwrap();
    assert_eq!(
        report,
        ShipReport {
            shipped: 2,
            failed: 0
        }
    );
    mock.assert();
}

#[test]
fn test_ship_counts_rejected_items() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/_bulk")
        .with_status(200)
        .with_body(
            r#"{"took":3,"errors":true,"items":[
                {"index":{"_index":"logs-platform-2015.05.13","status":201}},
                {"index":{"_index":"logs-platform-2015.05.13","status":400,"error":{"type":"mapper_parsing_exception"}}}
            ]}"#,
        )
        .create();

    let es = client(vec![server.url()], RetryStrategy::Immediate(1));
    let report = es.ship(&records()).unwrap();
    assert_eq!(
        report,
        ShipReport {
            shipped: 1,
            failed: 1
        }
    );
    mock.assert();
}

#[test]
fn test_ship_retries_transient_failure_on_next_host() {
    let mut failing = Server::new();
    let mut healthy = Server::new();
    let fail_mock = failing
        .mock("POST", "/_bulk")
        .with_status(503)
        .expect(1)
        .create();
    let ok_mock = healthy
        .mock("POST", "/_bulk")
        .with_status(200)
        .with_body(r#"{"errors":false,"items":[]}"#)
        .expect(1)
        .create();

    let es = client(
        vec![failing.url(), healthy.url()],
        RetryStrategy::Immediate(2),
    );
    assert_eq!(es.ship(&records()).unwrap().shipped, 2);
    fail_mock.assert();
    ok_mock.assert();
}

#[test]
fn test_ship_gives_up_after_all_attempts() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/_bulk")
        .with_status(500)
        .expect(3)
        .create();

    let es = client(vec![server.url()], RetryStrategy::Immediate(3));
    assert!(es.ship(&records()).is_err());
    mock.assert();
}

#[test]
fn test_ship_does_not_retry_client_error() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/_bulk")
        .with_status(400)
        .with_body(r#"{"error":"bad request"}"#)
        .expect(1)
        .create();

    let es = client(vec![server.url()], RetryStrategy::Immediate(3));
    assert!(es.ship(&records()).is_err());
    mock.assert();
}

#[test]
fn test_ship_empty_batch_sends_nothing() {
    let mut server = Server::new();
    let mock = server.mock("POST", "/_bulk").expect(0).create();
    let es = client(vec![server.url()], RetryStrategy::Immediate(1));
    assert_eq!(es.ship(&[]).unwrap(), ShipReport::default());
    mock.assert();
}
