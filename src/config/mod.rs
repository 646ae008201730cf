// src/config/mod.rs
//! Startup configuration from the environment (`.env` is loaded by main).
//!
//! Every setting has a default; a present but malformed value is a
//! `ConfigError` and aborts startup.

pub mod chat;

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::ingest::config::{SourceList, DEFAULT_SOURCES_PATH};
use crate::ingest::providers::SourceSettings;
use crate::ingest::scheduler::CollectorSettings;
use crate::ingest::validate::{ContentPolicy, DEFAULT_SCORE_THRESHOLD};

pub const DEFAULT_CHAT_CONFIG_PATH: &str = "config/chat.json";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub collect_interval: Duration,
    pub collect_on_start: bool,
    pub source_timeout: Duration,
    pub source_deadline: Duration,
    pub score_threshold: f64,
    pub queue_capacity: usize,
    pub dedup_content: bool,
    pub daily_cache_ttl: Duration,
    pub nasa_api_key: String,
    pub chat_config_path: PathBuf,
    /// Explicit enabled-source file; `None` falls back to the default path.
    pub sources_path: Option<PathBuf>,
    pub seed_facts: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        let collector = CollectorSettings::default();
        let sources = SourceSettings::default();
        Self {
            collect_interval: collector.interval,
            collect_on_start: true,
            source_timeout: sources.request_timeout,
            source_deadline: collector.source_deadline,
            score_threshold: DEFAULT_SCORE_THRESHOLD,
            queue_capacity: collector.queue_capacity,
            dedup_content: true,
            daily_cache_ttl: Duration::from_secs(3600),
            nasa_api_key: sources.nasa_api_key,
            chat_config_path: PathBuf::from(DEFAULT_CHAT_CONFIG_PATH),
            sources_path: None,
            seed_facts: true,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build from any key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| lookup(k).filter(|v| !v.trim().is_empty());
        let mut cfg = Self::default();

        if let Some(v) = get("COLLECT_INTERVAL") {
            cfg.collect_interval = parse_duration("COLLECT_INTERVAL", &v)?;
        }
        if let Some(v) = get("COLLECT_ON_START") {
            cfg.collect_on_start = parse_bool("COLLECT_ON_START", &v)?;
        }
        if let Some(v) = get("SOURCE_TIMEOUT") {
            cfg.source_timeout = parse_duration("SOURCE_TIMEOUT", &v)?;
        }
        if let Some(v) = get("SOURCE_DEADLINE") {
            cfg.source_deadline = parse_duration("SOURCE_DEADLINE", &v)?;
        }
        if let Some(v) = get("SCORE_THRESHOLD") {
            let t: f64 = v.trim().parse().map_err(|_| ConfigError::InvalidNumber {
                key: "SCORE_THRESHOLD",
                value: v.clone(),
            })?;
            if !t.is_finite() {
                return Err(ConfigError::InvalidNumber {
                    key: "SCORE_THRESHOLD",
                    value: v,
                });
            }
            cfg.score_threshold = t.clamp(0.0, 1.0);
        }
        if let Some(v) = get("QUEUE_CAPACITY") {
            let n: usize = v.trim().parse().map_err(|_| ConfigError::InvalidNumber {
                key: "QUEUE_CAPACITY",
                value: v.clone(),
            })?;
            if n == 0 {
                return Err(ConfigError::Zero { key: "QUEUE_CAPACITY" });
            }
            cfg.queue_capacity = n;
        }
        if let Some(v) = get("DEDUP_CONTENT") {
            cfg.dedup_content = parse_bool("DEDUP_CONTENT", &v)?;
        }
        if let Some(v) = get("DAILY_CACHE_TTL") {
            cfg.daily_cache_ttl = parse_duration("DAILY_CACHE_TTL", &v)?;
        }
        if let Some(v) = get("NASA_API_KEY") {
            cfg.nasa_api_key = v.trim().to_string();
        }
        if let Some(v) = get("CHAT_CONFIG_PATH") {
            cfg.chat_config_path = PathBuf::from(v.trim());
        }
        if let Some(v) = get("INGEST_SOURCES_PATH") {
            cfg.sources_path = Some(PathBuf::from(v.trim()));
        }
        if let Some(v) = get("SEED_FACTS") {
            cfg.seed_facts = parse_bool("SEED_FACTS", &v)?;
        }
        Ok(cfg)
    }

    pub fn collector_settings(&self) -> CollectorSettings {
        CollectorSettings {
            interval: self.collect_interval,
            source_deadline: self.source_deadline,
            queue_capacity: self.queue_capacity,
        }
    }

    pub fn source_settings(&self) -> SourceSettings {
        SourceSettings {
            request_timeout: self.source_timeout,
            nasa_api_key: self.nasa_api_key.clone(),
        }
    }

    pub fn content_policy(&self) -> ContentPolicy {
        ContentPolicy::default().with_threshold(self.score_threshold)
    }

    pub fn enabled_sources(&self) -> Result<SourceList, ConfigError> {
        SourceList::resolve(self.sources_path.as_deref(), Path::new(DEFAULT_SOURCES_PATH))
    }
}

/// `<n>[s|m|h|d]` or bare seconds. Zero is rejected.
pub fn parse_duration(key: &'static str, value: &str) -> Result<Duration, ConfigError> {
    let bad = || ConfigError::InvalidDuration {
        key,
        value: value.to_string(),
    };
    let v = value.trim().to_ascii_lowercase();
    let (digits, unit) = match v.char_indices().last() {
        Some((i, c)) if c.is_ascii_alphabetic() => (&v[..i], c),
        Some(_) => (v.as_str(), 's'),
        None => return Err(bad()),
    };
    let n: u64 = digits.trim().parse().map_err(|_| bad())?;
    let secs = match unit {
        's' => Some(n),
        'm' => n.checked_mul(60),
        'h' => n.checked_mul(3600),
        'd' => n.checked_mul(86_400),
        _ => None,
    }
    .ok_or_else(bad)?;
    if secs == 0 {
        return Err(ConfigError::Zero { key });
    }
    Ok(Duration::from_secs(secs))
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            key,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k: &str| map.get(k).cloned()
    }

    #[test]
    fn defaults_when_nothing_set() {
        let cfg = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.collect_interval, Duration::from_secs(6 * 3600));
        assert!(cfg.collect_on_start);
        assert_eq!(cfg.source_timeout, Duration::from_secs(10));
        assert_eq!(cfg.queue_capacity, 100);
        assert!(cfg.dedup_content);
        assert!((cfg.score_threshold - 0.7).abs() < 1e-9);
        assert_eq!(cfg.nasa_api_key, "DEMO_KEY");
        assert!(cfg.sources_path.is_none());
        assert!(cfg.seed_facts);
    }

    #[test]
    fn durations_accept_units_and_bare_seconds() {
        assert_eq!(parse_duration("K", "45s").unwrap(), Duration::from_secs(45));
        assert_eq!(parse_duration("K", "30m").unwrap(), Duration::from_secs(1800));
        assert_eq!(parse_duration("K", " 6H ").unwrap(), Duration::from_secs(21_600));
        assert_eq!(parse_duration("K", "1d").unwrap(), Duration::from_secs(86_400));
        assert_eq!(parse_duration("K", "90").unwrap(), Duration::from_secs(90));
        assert!(matches!(parse_duration("K", "6x"), Err(ConfigError::InvalidDuration { .. })));
        assert!(matches!(parse_duration("K", "h"), Err(ConfigError::InvalidDuration { .. })));
        assert!(matches!(parse_duration("K", "0m"), Err(ConfigError::Zero { key: "K" })));
    }

    #[test]
    fn malformed_values_are_errors() {
        let err = AppConfig::from_lookup(lookup(&[("COLLECT_INTERVAL", "soon")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDuration { key: "COLLECT_INTERVAL", .. }));

        let err = AppConfig::from_lookup(lookup(&[("QUEUE_CAPACITY", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Zero { key: "QUEUE_CAPACITY" }));

        let err = AppConfig::from_lookup(lookup(&[("DEDUP_CONTENT", "maybe")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBool { .. }));
    }

    #[test]
    fn threshold_is_clamped() {
        let cfg = AppConfig::from_lookup(lookup(&[("SCORE_THRESHOLD", "1.5")])).unwrap();
        assert_eq!(cfg.score_threshold, 1.0);
        assert_eq!(cfg.content_policy().threshold, 1.0);
        let cfg = AppConfig::from_lookup(lookup(&[("SCORE_THRESHOLD", "-2")])).unwrap();
        assert_eq!(cfg.score_threshold, 0.0);
    }
}
