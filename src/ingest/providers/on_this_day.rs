// src/ingest/providers/on_this_day.rs
use anyhow::Result;
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Utc};
use serde::Deserialize;

use super::http::{clean_extract, fetch_json, within_source_bounds};
use crate::ingest::types::{RawRecord, SourceProvider};

pub const DEFAULT_BASE_URL: &str = "https://history.muffinlabs.com";
const MAX_EVENTS: usize = 5;

#[derive(Debug, Deserialize)]
pub(crate) struct DayResponse {
    #[serde(default)]
    date: String,
    /// Wikipedia page for the day; used when an event carries no links.
    #[serde(default)]
    url: String,
    #[serde(default)]
    data: DayData,
}

#[derive(Debug, Default, Deserialize)]
struct DayData {
    #[serde(rename = "Events", default)]
    events: Vec<Event>,
}

#[derive(Debug, Deserialize)]
struct Event {
    #[serde(default)]
    year: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    links: Vec<Link>,
}

#[derive(Debug, Deserialize)]
struct Link {
    #[serde(default)]
    link: String,
}

/// "On this day in history" events for the current (or a pinned) date.
pub struct OnThisDaySource {
    client: reqwest::Client,
    base_url: String,
    date: Option<NaiveDate>,
}

impl OnThisDaySource {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            date: None,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Pin the date instead of using today's UTC date.
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }
}

pub(crate) fn records_from_day(resp: DayResponse) -> Vec<RawRecord> {
    let mut out = Vec::new();
    for ev in resp.data.events.into_iter().take(MAX_EVENTS) {
        let text = ev.text.trim();
        if text.is_empty() {
            continue;
        }
        let content = clean_extract(&format!("On this day in {}: {}", ev.year.trim(), text));
        if !within_source_bounds(&content) {
            continue;
        }
        let mut rec = RawRecord::new("OnThisDay", content)
            .category("History")
            .tags(["on this day", "history", "events"])
            .meta("year", ev.year.trim())
            .meta("date", resp.date.as_str())
            .meta("language", "en");
        for l in ev.links.into_iter().filter(|l| !l.link.is_empty()).take(3) {
            rec = rec.url(l.link);
        }
        if rec.urls.is_empty() && !resp.url.is_empty() {
            rec = rec.url(resp.url.as_str());
        }
        out.push(rec);
    }
    out
}

#[async_trait]
impl SourceProvider for OnThisDaySource {
    async fn fetch_facts(&self) -> Result<Vec<RawRecord>> {
        let day = self.date.unwrap_or_else(|| Utc::now().date_naive());
        let url = format!("{}/date/{}/{}", self.base_url, day.month(), day.day());
        let resp: DayResponse = fetch_json(&self.client, &url, &[]).await?;
        Ok(records_from_day(resp))
    }

    fn name(&self) -> &'static str {
        "OnThisDay"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::validate::{Validator, DEFAULT_SCORE_THRESHOLD};

    #[test]
    fn events_are_capped_and_prefixed() {
        let events = (0..8)
            .map(|i| {
                format!(
                    r#"{{"year":"19{i}0","text":"A notable treaty was signed between several neighbouring kingdoms","links":[{{"title":"x","link":"https://en.wikipedia.org/wiki/X{i}"}}]}}"#
                )
            })
            .collect::<Vec<_>>()
            .join(",");
        let json = format!(r#"{{"date":"October 17","data":{{"Events":[{events}]}}}}"#);
        let resp: DayResponse = serde_json::from_str(&json).unwrap();
        let recs = records_from_day(resp);
        assert_eq!(recs.len(), 5);
        assert!(recs[0].content.starts_with("On this day in 1900: A notable treaty"));
        assert_eq!(recs[0].urls.len(), 1);
        assert_eq!(recs[0].metadata.get("date").map(String::as_str), Some("October 17"));
    }

    #[test]
    fn short_event_passes_the_validator() {
        let json = r#"{"date":"July 20","url":"https://wikipedia.org/wiki/July_20","data":{"Events":[
            {"year":"1969","text":"Apollo 11 astronauts Neil Armstrong and Buzz Aldrin walk on the Moon","links":[]}
        ]}}"#;
        let resp: DayResponse = serde_json::from_str(json).unwrap();
        let recs = records_from_day(resp);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].urls, vec!["https://wikipedia.org/wiki/July_20"]);

        let fact = Validator::default()
            .process(&recs[0])
            .unwrap()
            .accepted()
            .expect("accepted");
        assert!(fact.score >= DEFAULT_SCORE_THRESHOLD, "score {}", fact.score);
    }
}
