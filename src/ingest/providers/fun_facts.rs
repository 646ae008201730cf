// src/ingest/providers/fun_facts.rs
use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Deserialize;

use super::http::{clean_extract, fetch_json, within_source_bounds};
use crate::ingest::types::{RawRecord, SourceProvider};

pub const DEFAULT_API_URL: &str = "https://uselessfacts.jsph.pl/api/v2/facts/random";
const FACTS_PER_PASS: usize = 3;

#[derive(Debug, Deserialize)]
pub(crate) struct FunFact {
    #[serde(default)]
    id: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    source: String,
    #[serde(default)]
    source_url: String,
    #[serde(default)]
    permalink: String,
    #[serde(default)]
    language: String,
}

/// Random "useless" facts, a few per pass.
pub struct FunFactsSource {
    client: reqwest::Client,
    api_url: String,
    per_pass: usize,
}

impl FunFactsSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            api_url: DEFAULT_API_URL.to_string(),
            per_pass: FACTS_PER_PASS,
        }
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn with_per_pass(mut self, n: usize) -> Self {
        self.per_pass = n.max(1);
        self
    }
}

pub(crate) fn record_from_fun_fact(ff: FunFact) -> Option<RawRecord> {
    let content = clean_extract(&ff.text);
    if !within_source_bounds(&content) {
        return None;
    }
    let language = if ff.language.trim().is_empty() {
        "en"
    } else {
        ff.language.trim()
    };

    let mut rec = RawRecord::new("FunFacts", content)
        .category("Fun Facts")
        .tags(["fun facts", "trivia", "useless facts"])
        .meta("language", language);
    if !ff.id.is_empty() {
        rec = rec.meta("id", ff.id.as_str());
    }
    if !ff.source.trim().is_empty() {
        rec = rec.meta("origin", ff.source.trim());
    }
    for u in [ff.permalink, ff.source_url] {
        if reqwest::Url::parse(&u).is_ok() {
            rec = rec.url(u);
        }
    }
    Some(rec)
}

#[async_trait]
impl SourceProvider for FunFactsSource {
    async fn fetch_facts(&self) -> Result<Vec<RawRecord>> {
        let mut out: Vec<RawRecord> = Vec::new();
        let mut failures = 0usize;
        for _ in 0..self.per_pass {
            match fetch_json::<FunFact>(&self.client, &self.api_url, &[("language", "en")]).await {
                Ok(ff) => {
                    if let Some(rec) = record_from_fun_fact(ff) {
                        // the endpoint may hand back the same fact twice in a row
                        if !out.iter().any(|r| r.content == rec.content) {
                            out.push(rec);
                        }
                    }
                }
                Err(e) => {
                    failures += 1;
                    tracing::warn!(target: "ingest", error = ?e, "fun facts fetch failed");
                }
            }
        }
        if failures == self.per_pass {
            bail!("fun facts: every request failed");
        }
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "FunFacts"
    }
}
