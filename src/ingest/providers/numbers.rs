// src/ingest/providers/numbers.rs
use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Deserialize;

use super::http::{clean_extract, fetch_json, within_source_bounds};
use crate::ingest::types::{RawRecord, SourceProvider};

pub const DEFAULT_BASE_URL: &str = "http://numbersapi.com";
pub const FACT_TYPES: [&str; 4] = ["trivia", "math", "date", "year"];

#[derive(Debug, Deserialize)]
pub(crate) struct NumberFact {
    #[serde(default)]
    text: String,
    #[serde(default)]
    number: Option<serde_json::Value>,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    found: bool,
}

/// Numbers API: one random fact per fact type.
pub struct NumbersSource {
    client: reqwest::Client,
    base_url: String,
}

impl NumbersSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

pub(crate) fn record_from_number(base_url: &str, nf: NumberFact) -> Option<RawRecord> {
    if !nf.found {
        return None;
    }
    let content = clean_extract(&nf.text);
    if !within_source_bounds(&content) {
        return None;
    }
    let number = match nf.number {
        Some(serde_json::Value::String(s)) => s,
        Some(v) => v.to_string(),
        None => String::new(),
    };

    let mut rec = RawRecord::new("NumbersAPI", content)
        .category(nf.kind.as_str())
        .tags(["numbers", "number facts", nf.kind.as_str()])
        .meta("type", nf.kind.as_str())
        .meta("language", "en");
    if !number.is_empty() {
        rec = rec
            .url(format!("{base_url}/{number}/{}", nf.kind))
            .meta("number", number);
    }
    Some(rec)
}

#[async_trait]
impl SourceProvider for NumbersSource {
    async fn fetch_facts(&self) -> Result<Vec<RawRecord>> {
        let mut out = Vec::new();
        let mut failures = 0usize;
        for kind in FACT_TYPES {
            let url = format!("{}/random/{kind}", self.base_url);
            match fetch_json::<NumberFact>(&self.client, &url, &[("json", "")]).await {
                Ok(nf) => out.extend(record_from_number(&self.base_url, nf)),
                Err(e) => {
                    failures += 1;
                    tracing::warn!(target: "ingest", error = ?e, kind, "numbers api fetch failed");
                }
            }
        }
        if failures == FACT_TYPES.len() {
            bail!("numbers api: every request failed");
        }
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "NumbersAPI"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::validate::{Validator, DEFAULT_SCORE_THRESHOLD};

    #[test]
    fn found_fact_becomes_record_with_link() {
        let nf: NumberFact = serde_json::from_str(
            r#"{"text":"42 is the number of kilometres in a marathon, rounded down to the nearest whole number","number":42,"found":true,"type":"trivia"}"#,
        )
        .unwrap();
        let rec = record_from_number("http://numbersapi.com", nf).expect("record");
        assert_eq!(rec.category, "trivia");
        assert_eq!(rec.urls, vec!["http://numbersapi.com/42/trivia"]);
        assert_eq!(rec.metadata.get("number").map(String::as_str), Some("42"));
    }

    #[test]
    fn typical_short_fact_passes_the_validator() {
        let nf: NumberFact = serde_json::from_str(
            r#"{"text":"42 is the number of US gallons in a barrel of crude oil","number":42,"found":true,"type":"trivia"}"#,
        )
        .unwrap();
        let rec = record_from_number("http://numbersapi.com", nf).expect("record");
        assert_eq!(rec.tags.len(), 3);
        assert_eq!(rec.metadata.len(), 3);

        let fact = Validator::default()
            .process(&rec)
            .unwrap()
            .accepted()
            .expect("accepted");
        assert!(fact.score >= DEFAULT_SCORE_THRESHOLD, "score {}", fact.score);
    }

    #[test]
    fn not_found_is_skipped() {
        let nf: NumberFact = serde_json::from_str(
            r#"{"text":"123456789 is an uninteresting number that nobody has written about.","number":123456789,"found":false,"type":"math"}"#,
        )
        .unwrap();
        assert!(record_from_number("http://numbersapi.com", nf).is_none());
    }
}
