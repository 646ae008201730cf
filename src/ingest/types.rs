// src/ingest/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Unprocessed content from one provider. Immutable once built; consumed once
/// by the validator.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct RawRecord {
    pub content: String,
    pub source: String,            // e.g., "Wikipedia", "NASA"
    pub category: String,          // provider label, free text
    pub tags: Vec<String>,
    pub urls: Vec<String>,
    pub metadata: BTreeMap<String, String>,
    pub collected_at: DateTime<Utc>,
}

impl RawRecord {
    pub fn new(source: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            source: source.into(),
            category: String::new(),
            tags: Vec::new(),
            urls: Vec::new(),
            metadata: BTreeMap::new(),
            collected_at: Utc::now(),
        }
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.urls.push(url.into());
        self
    }

    pub fn meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// One external fact provider.
///
/// Implementations may return partial results: a failed sub-request is logged and
/// skipped, while a failure of the whole call is an `Err` that the collector
/// counts as "this source produced nothing this run".
#[async_trait::async_trait]
pub trait SourceProvider: Send + Sync {
    async fn fetch_facts(&self) -> Result<Vec<RawRecord>>;
    fn name(&self) -> &'static str;
}
