// tests/ingest_config.rs
use daily_facts::config::AppConfig;
use daily_facts::error::ConfigError;
use daily_facts::ingest::config::SourceList;
use daily_facts::ingest::providers::{build_sources, SourceKind, SourceSettings};
use std::time::Duration;
use std::{env, fs};

#[test]
fn source_list_file_drives_the_source_builder() {
    let dir = tempfile::tempdir().unwrap();

    let p_toml = dir.path().join("ingest_sources.toml");
    fs::write(
        &p_toml,
        r#"
sources = [" NASA ", "OnThisDay", "onthisday", "funfacts"]
"#,
    )
    .unwrap();
    let list = SourceList::load(&p_toml).unwrap();
    let names = build_sources(&SourceSettings::default(), list.kinds())
        .unwrap()
        .iter()
        .map(|s| s.name())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["NASA", "OnThisDay", "FunFacts"]);

    let p_json = dir.path().join("ingest_sources.json");
    fs::write(&p_json, r#"{"sources": ["Bloomberg", "NumbersAPI"]}"#).unwrap();
    assert!(matches!(
        SourceList::load(&p_json),
        Err(ConfigError::SourceList { reason, .. }) if reason.contains("Bloomberg")
    ));
}

#[test]
fn shipped_source_list_names_every_source() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("config/ingest_sources.toml");
    let list = SourceList::load(&path).expect("shipped list parses");
    assert_eq!(list.kinds(), &SourceKind::ALL);
}

const KEYS: [&str; 8] = [
    "COLLECT_INTERVAL",
    "SOURCE_TIMEOUT",
    "SCORE_THRESHOLD",
    "QUEUE_CAPACITY",
    "COLLECT_ON_START",
    "NASA_API_KEY",
    "INGEST_SOURCES_PATH",
    "SEED_FACTS",
];

#[serial_test::serial]
#[test]
fn app_config_reads_process_env() {
    for k in KEYS {
        env::remove_var(k);
    }

    env::set_var("COLLECT_INTERVAL", "30m");
    env::set_var("SOURCE_TIMEOUT", "5");
    env::set_var("SCORE_THRESHOLD", "0.8");
    env::set_var("QUEUE_CAPACITY", "8");
    env::set_var("COLLECT_ON_START", "off");
    env::set_var("NASA_API_KEY", "  abc123 ");
    env::set_var("SEED_FACTS", "no");

    let dir = tempfile::tempdir().unwrap();
    let list_path = dir.path().join("only_nasa.json");
    fs::write(&list_path, r#"{"sources": ["nasa"]}"#).unwrap();
    env::set_var("INGEST_SOURCES_PATH", list_path.display().to_string());

    let cfg = AppConfig::from_env().expect("valid env");
    assert_eq!(cfg.collect_interval, Duration::from_secs(1800));
    assert_eq!(cfg.source_settings().request_timeout, Duration::from_secs(5));
    assert_eq!(cfg.collector_settings().queue_capacity, 8);
    assert!(!cfg.collect_on_start);
    assert_eq!(cfg.nasa_api_key, "abc123");
    assert!((cfg.content_policy().threshold - 0.8).abs() < 1e-9);
    assert!(!cfg.seed_facts);
    assert_eq!(cfg.enabled_sources().unwrap().kinds(), &[SourceKind::Nasa]);

    env::set_var("INGEST_SOURCES_PATH", dir.path().join("missing.toml").display().to_string());
    let cfg = AppConfig::from_env().expect("path is only checked on use");
    assert!(cfg.enabled_sources().is_err());

    env::set_var("COLLECT_INTERVAL", "every now and then");
    assert!(matches!(
        AppConfig::from_env(),
        Err(ConfigError::InvalidDuration { key: "COLLECT_INTERVAL", .. })
    ));

    for k in KEYS {
        env::remove_var(k);
    }
}
