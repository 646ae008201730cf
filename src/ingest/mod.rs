// src/ingest/mod.rs
pub mod config;
pub mod normalize;
pub mod providers;
pub mod scheduler;
pub mod types;
pub mod validate;

use metrics::{describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;

pub use crate::ingest::scheduler::{CollectionReport, Collector, SourceOutcome};
pub use crate::ingest::types::{RawRecord, SourceProvider};
pub use crate::ingest::validate::{ContentPolicy, Outcome, Rejection, Validator};

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("facts_fetched_total", "Raw records returned by sources.");
        describe_counter!("facts_accepted_total", "Records accepted by the validator.");
        describe_counter!(
            "facts_discarded_total",
            "Records discarded by the validator, by reason."
        );
        describe_counter!("facts_stored_total", "Facts written to the store.");
        describe_counter!(
            "facts_duplicate_total",
            "Facts skipped because identical content was already stored."
        );
        describe_counter!("facts_store_errors_total", "Fact store write failures.");
        describe_counter!("source_errors_total", "Source fetch/parse/timeout errors.");
        describe_counter!("collection_runs_total", "Completed collection passes.");
        describe_histogram!("source_fetch_ms", "Source fetch time in milliseconds.");
        describe_gauge!(
            "collection_last_run_ts",
            "Unix ts when the last collection pass finished."
        );
        describe_gauge!("collector_running", "1 while the scheduled loop is active.");
        describe_gauge!("collect_interval_secs", "Configured collection period.");
        describe_gauge!("daily_cache_ttl_ms", "TTL of the cached daily fact.");
        describe_counter!("facts_served_total", "Facts returned by the serving layer, by kind.");
        describe_counter!("chat_streams_total", "Streaming chat replies started.");
    });
}

/// Normalize text: decode entities, strip tags, collapse whitespace, trim and
/// make sure the body ends with sentence punctuation.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
    out = re_tags.replace_all(&out, "").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").expect("ws regex"));
    out = re_ws.replace_all(&out, " ").to_string();
    out = out.trim().to_string();

    // 5) Dangling separators become a full stop
    while let Some(last) = out.chars().last() {
        if matches!(last, ',' | ';' | ':' | '-') || last.is_whitespace() {
            out.pop();
        } else {
            break;
        }
    }
    if out.is_empty() {
        return out;
    }

    // 6) Terminal punctuation (a closing quote after it counts)
    let trimmed_quotes = out.trim_end_matches(['"', '\'', ')']);
    if !trimmed_quotes.ends_with(['.', '!', '?']) {
        out.push('.');
    }

    out
}
