// src/ingest/config.rs
//! Which built-in sources run.
//!
//! The list lives in a small file, `{ sources = [...] }` in TOML or
//! `{"sources": [...]}` in JSON, picked by extension. Names are checked while
//! parsing, so a typo fails startup instead of silently disabling a source.
//! An empty list means every source.

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::ConfigError;
use crate::ingest::providers::SourceKind;

pub const DEFAULT_SOURCES_PATH: &str = "config/ingest_sources.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceList {
    #[serde(default)]
    sources: Vec<SourceKind>,
}

impl Default for SourceList {
    fn default() -> Self {
        Self {
            sources: SourceKind::ALL.to_vec(),
        }
    }
}

impl SourceList {
    pub fn kinds(&self) -> &[SourceKind] {
        &self.sources
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let fail = |reason: String| ConfigError::SourceList {
            path: path.to_path_buf(),
            reason,
        };
        let text = fs::read_to_string(path).map_err(|e| fail(e.to_string()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let parsed: SourceList = match ext.as_str() {
            "toml" => toml::from_str(&text).map_err(|e| fail(e.to_string()))?,
            "json" => serde_json::from_str(&text).map_err(|e| fail(e.to_string()))?,
            other => return Err(fail(format!("unsupported extension '{other}'"))),
        };
        Ok(parsed.deduped())
    }

    /// An explicit path must exist; the fallback path is optional.
    pub fn resolve(explicit: Option<&Path>, fallback: &Path) -> Result<Self, ConfigError> {
        match explicit {
            Some(p) => Self::load(p),
            None if fallback.exists() => Self::load(fallback),
            None => Ok(Self::default()),
        }
    }

    fn deduped(mut self) -> Self {
        let mut seen = Vec::with_capacity(self.sources.len());
        self.sources.retain(|k| {
            if seen.contains(k) {
                false
            } else {
                seen.push(*k);
                true
            }
        });
        if self.sources.is_empty() {
            return Self::default();
        }
        self
    }
}
