// src/fact.rs
//! Persistable fact types shared by the pipeline, the store and the HTTP layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ingest::normalize::Category;

pub type FactId = uuid::Uuid;

/// A validated, normalized, score-accepted fact that has not been stored yet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessedFact {
    pub content: String,
    pub source: String,
    pub category: Category,
    /// Lowercase, deduplicated, first-seen order.
    pub tags: Vec<String>,
    #[serde(rename = "related_urls")]
    pub urls: Vec<String>,
    pub metadata: BTreeMap<String, String>,
    pub verified: bool,
    pub score: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub publish_date: DateTime<Utc>,
}

impl ProcessedFact {
    /// Hex SHA-256 over the lowercased, whitespace-collapsed body.
    pub fn content_hash(&self) -> String {
        content_hash(&self.content)
    }
}

/// A fact owned by the store: identity plus serve bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredFact {
    pub id: FactId,
    #[serde(flatten)]
    pub fact: ProcessedFact,
    pub last_served_at: Option<DateTime<Utc>>,
    pub serve_count: u64,
}

pub fn content_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let canonical = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    let digest = Sha256::digest(canonical.as_bytes());
    let mut out = String::with_capacity(64);
    for b in digest.iter() {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
