use clap::Parser;
use elb_ingestor::cli::Cli;
use elb_ingestor::pipeline::PipelineTuning;
use elb_ingestor::source::PrefixLayout;
use elb_ingestor::utils::ingestor_toml::{apply_file_to_vars, parse_ingestor_toml};
use elb_ingestor::utils::settings::{parse_pattern_list, read_pattern_list};
use elb_ingestor::utils::{EnvKeys, FetchMode, Settings};
use std::collections::BTreeMap;
use std::time::Duration;
use tempfile::TempDir;

fn settings_from(pairs: &[(&str, &str)]) -> anyhow::Result<Settings> {
    let vars: BTreeMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Settings::from_lookup(|key| vars.get(key).cloned())
}

fn moving_base() -> Vec<(&'static str, &'static str)> {
    vec![
        (EnvKeys::ELASTICSEARCH_HOSTS, "es1:9200, es2:9200"),
        (EnvKeys::BUCKET, "/srv/logs"),
        (EnvKeys::FETCH_MODE, "moving"),
    ]
}

// --- Settings::from_lookup ---

#[test]
fn test_moving_mode_defaults() {
    let settings = settings_from(&moving_base()).unwrap();
    assert_eq!(settings.elasticsearch_hosts, vec!["es1:9200", "es2:9200"]);
    assert_eq!(
        settings.fetch_mode,
        FetchMode::Moving(PrefixLayout {
            unprocessed: "logs/".into(),
            processing: "logs-working/".into(),
            processed: "logs-done/".into(),
        })
    );
    assert_eq!(settings.file_batch_size, 5);
    assert_eq!(settings.index_pattern, "logs-platform-%Y.%m.%d");
    assert_eq!(settings.listen_addr(), "localhost:13131");
    assert_eq!(settings.ship_workers, 4);
    assert_eq!(settings.ship_retries, 3);
    assert_eq!(settings.ship_timeout, Duration::from_secs(30));
    assert_eq!(settings.todo_queue_size, 10);
    assert_eq!(settings.record_queue_size, 100_000);
    assert_eq!(settings.finalize_retry_delay, Duration::from_secs(1));
}

#[test]
fn test_legacy_moving_mode_name_accepted() {
    let mut pairs = moving_base();
    pairs[2] = (
        EnvKeys::FETCH_MODE,
        "bad_aggressive_fetcher_do_not_use_until_we_fix_backoff",
    );
    let settings = settings_from(&pairs).unwrap();
    assert!(matches!(settings.fetch_mode, FetchMode::Moving(_)));
}

#[test]
fn test_custom_prefixes_and_tuning() {
    let mut pairs = moving_base();
    pairs.extend([
        (EnvKeys::SEARCH_PREFIX, "in/"),
        (EnvKeys::WORKING_PREFIX, "wip/"),
        (EnvKeys::DONE_PREFIX, "out/"),
        (EnvKeys::FILE_BATCH_SIZE, "12"),
        (EnvKeys::LISTEN_PORT, "8080"),
        (EnvKeys::FINALIZE_RETRY_DELAY_MS, "250"),
    ]);
    let settings = settings_from(&pairs).unwrap();
    let FetchMode::Moving(layout) = &settings.fetch_mode else {
        panic!("expected moving mode");
    };
    assert_eq!(layout.unprocessed, "in/");
    assert_eq!(layout.processing, "wip/");
    assert_eq!(layout.processed, "out/");
    assert_eq!(settings.file_batch_size, 12);
    assert_eq!(settings.listen_port, 8080);

    let tuning = PipelineTuning::from(&settings);
    assert_eq!(tuning.file_batch_size, 12);
    assert_eq!(tuning.finalize_retry_delay, Duration::from_millis(250));
}

#[test]
fn test_lock_marker_mode_reads_pattern_list() {
    let dir = TempDir::new().unwrap();
    let list = dir.path().join("patterns.txt");
    std::fs::write(&list, "2024-01-01*\n\n# skipped\n2024-01-02*\n").unwrap();
    let work_dir = dir.path().join("locks");
    let pairs = vec![
        (EnvKeys::ELASTICSEARCH_HOSTS, "es1:9200"),
        (EnvKeys::BUCKET, "/srv/logs"),
        (EnvKeys::FETCH_MODE, "fixed_list"),
        (EnvKeys::WORK_DIR, work_dir.to_str().unwrap()),
        (EnvKeys::LIST_FILE, list.to_str().unwrap()),
    ];
    let settings = settings_from(&pairs).unwrap();
    assert_eq!(
        settings.fetch_mode,
        FetchMode::LockMarker {
            work_dir,
            patterns: vec!["2024-01-01*".into(), "2024-01-02*".into()],
        }
    );
}

#[test]
fn test_lock_marker_mode_requires_list_file() {
    let pairs = vec![
        (EnvKeys::ELASTICSEARCH_HOSTS, "es1:9200"),
        (EnvKeys::BUCKET, "/srv/logs"),
        (EnvKeys::FETCH_MODE, "lock_marker"),
        (EnvKeys::WORK_DIR, "/tmp/locks"),
    ];
    let err = settings_from(&pairs).unwrap_err();
    assert!(err.to_string().contains(EnvKeys::LIST_FILE));
}

#[test]
fn test_unknown_fetch_mode_rejected() {
    let mut pairs = moving_base();
    pairs[2] = (EnvKeys::FETCH_MODE, "teleport");
    let err = settings_from(&pairs).unwrap_err();
    assert!(err.to_string().contains("no valid fetch mode found"));
}

#[test]
fn test_missing_required_keys_rejected() {
    let err = settings_from(&[(EnvKeys::FETCH_MODE, "moving")]).unwrap_err();
    assert!(err.to_string().contains(EnvKeys::ELASTICSEARCH_HOSTS));

    let err = settings_from(&[
        (EnvKeys::ELASTICSEARCH_HOSTS, "es1:9200"),
        (EnvKeys::FETCH_MODE, "moving"),
    ])
    .unwrap_err();
    assert!(err.to_string().contains(EnvKeys::BUCKET));
}

#[test]
fn test_blank_value_counts_as_missing() {
    let mut pairs = moving_base();
    pairs[1] = (EnvKeys::BUCKET, "   ");
    assert!(settings_from(&pairs).is_err());
}

#[test]
fn test_zero_batch_size_rejected() {
    let mut pairs = moving_base();
    pairs.push((EnvKeys::FILE_BATCH_SIZE, "0"));
    assert!(settings_from(&pairs).is_err());
}

#[test]
fn test_non_numeric_port_rejected() {
    let mut pairs = moving_base();
    pairs.push((EnvKeys::LISTEN_PORT, "http"));
    let err = settings_from(&pairs).unwrap_err();
    assert!(err.to_string().contains(EnvKeys::LISTEN_PORT));
}

// --- pattern list ---

#[test]
fn test_parse_pattern_list_trims_and_skips() {
    assert_eq!(
        parse_pattern_list("  a*  \n\n#comment\nb/\n"),
        vec!["a*", "b/"]
    );
}

#[test]
fn test_read_pattern_list_empty_file_rejected() {
    let dir = TempDir::new().unwrap();
    let list = dir.path().join("empty.txt");
    std::fs::write(&list, "\n# nothing\n").unwrap();
    assert!(read_pattern_list(&list).is_err());
}

// --- config file ---

#[test]
fn test_toml_settings_become_env_keyed_values() {
    let file = parse_ingestor_toml(
        r#"
[settings]
elasticsearch_hosts = ["es1:9200", "es2:9200"]
bucket = "/srv/logs"
fetch_mode = "moving"
file_batch_size = 8
listen_port = 9000
"#,
    )
    .unwrap();
    let mut vars = BTreeMap::new();
    apply_file_to_vars(&file, &mut vars);
    assert_eq!(vars[EnvKeys::ELASTICSEARCH_HOSTS], "es1:9200,es2:9200");
    assert_eq!(vars[EnvKeys::FILE_BATCH_SIZE], "8");
    assert_eq!(vars[EnvKeys::LISTEN_PORT], "9000");
    assert!(!vars.contains_key(EnvKeys::SHIP_WORKERS));

    let settings = Settings::from_lookup(|key| vars.get(key).cloned()).unwrap();
    assert_eq!(settings.file_batch_size, 8);
    assert_eq!(settings.listen_port, 9000);
}

#[test]
fn test_toml_unknown_setting_rejected() {
    assert!(parse_ingestor_toml("[settings]\nbukket = \"typo\"\n").is_err());
}

#[test]
fn test_toml_empty_file_is_fine() {
    let file = parse_ingestor_toml("").unwrap();
    let mut vars = BTreeMap::new();
    apply_file_to_vars(&file, &mut vars);
    assert!(vars.is_empty());
}

// --- CLI ---

#[test]
fn test_cli_flags_become_overrides() {
    let cli = Cli::parse_from([
        "elb-ingestor",
        "--listen-port",
        "9999",
        "-b",
        "7",
        "--verbose",
    ]);
    assert!(cli.verbose());
    assert_eq!(
        cli.overrides(),
        vec![
            (EnvKeys::LISTEN_PORT, "9999".to_string()),
            (EnvKeys::FILE_BATCH_SIZE, "7".to_string()),
        ]
    );
}

#[test]
fn test_cli_without_flags_overrides_nothing() {
    let cli = Cli::parse_from(["elb-ingestor"]);
    assert!(!cli.verbose());
    assert!(cli.overrides().is_empty());
}
