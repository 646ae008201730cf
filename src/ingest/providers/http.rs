// src/ingest/providers/http.rs
//! Shared HTTP plumbing for JSON sources.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const USER_AGENT: &str = concat!("daily-facts/", env!("CARGO_PKG_VERSION"));

/// Client used by every built-in source.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .context("building http client")
}

/// GET `url` (with `query`) and decode a JSON body. Non-2xx is an error.
pub async fn fetch_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    query: &[(&str, &str)],
) -> Result<T> {
    let resp = client
        .get(url)
        .query(query)
        .send()
        .await
        .with_context(|| format!("GET {url}"))?
        .error_for_status()
        .with_context(|| format!("non-2xx from {url}"))?;
    resp.json::<T>()
        .await
        .with_context(|| format!("decoding json from {url}"))
}

/// Source-level length gate applied before records leave an adapter.
pub fn within_source_bounds(text: &str) -> bool {
    let n = text.chars().count();
    (50..=500).contains(&n)
}

/// Collapse/trim and append a period if sentence punctuation is missing.
pub fn clean_extract(text: &str) -> String {
    crate::ingest::normalize_text(text)
}
