// src/ingest/providers/nasa_apod.rs
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

use super::http::{clean_extract, fetch_json, within_source_bounds};
use crate::ingest::types::{RawRecord, SourceProvider};

pub const DEFAULT_API_URL: &str = "https://api.nasa.gov/planetary/apod";
const APOD_PAGE: &str = "https://apod.nasa.gov/apod/astropix.html";

#[derive(Debug, Deserialize)]
pub(crate) struct Apod {
    #[serde(default)]
    title: String,
    #[serde(default)]
    explanation: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    media_type: Option<String>,
    #[serde(default)]
    copyright: Option<String>,
}

/// Astronomy Picture of the Day: one explanation per day.
pub struct NasaApodSource {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl NasaApodSource {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_url: DEFAULT_API_URL.to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }
}

/// Longest run of leading sentences that fits in `max` chars.
/// Falls back to the whole text when even the first sentence is too long.
pub(crate) fn leading_sentences(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut end = 0usize;
    for (i, ch) in text.char_indices() {
        if !matches!(ch, '.' | '!' | '?') {
            continue;
        }
        let cut = i + ch.len_utf8();
        let next_is_break = text[cut..].chars().next().map_or(true, char::is_whitespace);
        if !next_is_break {
            continue;
        }
        if text[..cut].chars().count() > max {
            break;
        }
        end = cut;
    }
    if end == 0 {
        text.to_string()
    } else {
        text[..end].to_string()
    }
}

pub(crate) fn record_from_apod(apod: Apod) -> Option<RawRecord> {
    let content = clean_extract(&leading_sentences(apod.explanation.trim(), 500));
    if !within_source_bounds(&content) {
        return None;
    }

    let mut rec = RawRecord::new("NASA", content)
        .category("Space")
        .tags(["astronomy", "space", "apod"]);
    if let Some(u) = apod.url.filter(|u| !u.is_empty()) {
        rec = rec.url(u);
    }
    rec = rec.url(APOD_PAGE).meta("title", apod.title);
    if let Some(d) = apod.date {
        rec = rec.meta("date", d);
    }
    if let Some(m) = apod.media_type {
        rec = rec.meta("media_type", m);
    }
    if let Some(c) = apod.copyright {
        rec = rec.meta("copyright", c.trim().to_string());
    }
    Some(rec)
}

#[async_trait]
impl SourceProvider for NasaApodSource {
    async fn fetch_facts(&self) -> Result<Vec<RawRecord>> {
        let apod: Apod = fetch_json(
            &self.client,
            &self.api_url,
            &[("api_key", self.api_key.as_str())],
        )
        .await?;
        Ok(record_from_apod(apod).into_iter().collect())
    }

    fn name(&self) -> &'static str {
        "NASA"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::validate::{Validator, DEFAULT_SCORE_THRESHOLD};

    #[test]
    fn long_explanations_are_cut_at_sentence_boundaries() {
        let s = "First sentence is here. Second one follows. Third is long enough to overflow.";
        assert_eq!(leading_sentences(s, 45), "First sentence is here. Second one follows.");
        assert_eq!(leading_sentences(s, 500), s);
        assert_eq!(leading_sentences("No break at all here", 5), "No break at all here");
    }

    #[test]
    fn apod_maps_to_space_record() {
        let apod: Apod = serde_json::from_str(
            r#"{"title":"M31","date":"2024-10-01","media_type":"image",
                "url":"https://apod.nasa.gov/apod/image/m31.jpg",
                "explanation":"The Andromeda Galaxy is the nearest large spiral galaxy to our own Milky Way and is visible to the unaided eye."}"#,
        )
        .unwrap();
        let rec = record_from_apod(apod).expect("record");
        assert_eq!(rec.source, "NASA");
        assert_eq!(rec.category, "Space");
        assert_eq!(rec.urls.len(), 2);
        assert_eq!(rec.metadata.len(), 3);

        let fact = Validator::default()
            .process(&rec)
            .unwrap()
            .accepted()
            .expect("accepted");
        assert!(fact.score >= DEFAULT_SCORE_THRESHOLD, "score {}", fact.score);
    }
}
