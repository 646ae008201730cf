// src/ingest/validate.rs
//! Content validation and quality scoring.
//!
//! Order of checks: record shape → length → banned words → marker words → score.
//! The first failing check decides the rejection reason.
//!
//! Scoring is additive over a 1.0 baseline, then normalized by the largest
//! reachable raw score and clamped to [0,1]:
//!
//! | signal                              | delta |
//! |-------------------------------------|-------|
//! | body length in 200..=300 chars      | +0.2  |
//! | body length < 100 or > 400 chars    | -0.2  |
//! | category label present              | +0.1  |
//! | ≥1 normalized tag / ≥3 tags         | +0.1 / +0.1 |
//! | ≥1 reference URL                    | +0.2  |
//! | ≥1 metadata key / ≥3 keys           | +0.1 / +0.1 |
//!
//! A fully enriched record therefore scores 1.0 and a bare one about 0.53.

use chrono::{DateTime, Duration, Utc};

use crate::error::ProcessError;
use crate::fact::ProcessedFact;
use crate::ingest::normalize::{normalize_category, normalize_tags};
use crate::ingest::normalize_text;
use crate::ingest::types::RawRecord;

pub const DEFAULT_MIN_LENGTH: usize = 50;
pub const DEFAULT_MAX_LENGTH: usize = 500;
pub const DEFAULT_SCORE_THRESHOLD: f64 = 0.7;

const BANNED_WORDS: [&str; 8] = [
    "died", "killed", "death", "murder", "suicide", "explicit", "nsfw", "graphic",
];

/// Crude "looks like an English sentence" guard. Not a language detector.
/// Matched as substrings, like the banned words.
const MARKER_WORDS: [&str; 5] = ["the", "is", "are", "was", "were"];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    pub baseline: f64,
    pub sweet_spot: (usize, usize),
    pub sweet_spot_bonus: f64,
    pub short_below: usize,
    pub long_above: usize,
    pub length_penalty: f64,
    pub category: f64,
    pub tags_any: f64,
    pub tags_rich: f64,
    pub urls_any: f64,
    pub metadata_any: f64,
    pub metadata_rich: f64,
    /// Tag / metadata-key count that earns the "rich" bonus.
    pub rich_count: usize,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            baseline: 1.0,
            sweet_spot: (200, 300),
            sweet_spot_bonus: 0.2,
            short_below: 100,
            long_above: 400,
            length_penalty: 0.2,
            category: 0.1,
            tags_any: 0.1,
            tags_rich: 0.1,
            urls_any: 0.2,
            metadata_any: 0.1,
            metadata_rich: 0.1,
            rich_count: 3,
        }
    }
}

impl ScoreWeights {
    fn max_raw(&self) -> f64 {
        self.baseline
            + self.sweet_spot_bonus
            + self.category
            + self.tags_any
            + self.tags_rich
            + self.urls_any
            + self.metadata_any
            + self.metadata_rich
    }
}

#[derive(Debug, Clone)]
pub struct ContentPolicy {
    pub min_length: usize,
    pub max_length: usize,
    pub threshold: f64,
    pub banned_words: Vec<String>,
    pub marker_words: Vec<String>,
    pub weights: ScoreWeights,
}

impl Default for ContentPolicy {
    fn default() -> Self {
        Self {
            min_length: DEFAULT_MIN_LENGTH,
            max_length: DEFAULT_MAX_LENGTH,
            threshold: DEFAULT_SCORE_THRESHOLD,
            banned_words: BANNED_WORDS.iter().map(|w| w.to_string()).collect(),
            marker_words: MARKER_WORDS.iter().map(|w| w.to_string()).collect(),
            weights: ScoreWeights::default(),
        }
    }
}

impl ContentPolicy {
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold.clamp(0.0, 1.0);
        self
    }
}

/// Why a record was deliberately dropped. Not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    TooShort { len: usize },
    TooLong { len: usize },
    BannedWord(String),
    NoMarkerWord,
    LowScore { score: f64, threshold: f64 },
}

impl Rejection {
    /// Stable label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            Rejection::TooShort { .. } => "too_short",
            Rejection::TooLong { .. } => "too_long",
            Rejection::BannedWord(_) => "banned_word",
            Rejection::NoMarkerWord => "no_marker_word",
            Rejection::LowScore { .. } => "low_score",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Accepted(Box<ProcessedFact>),
    Discarded(Rejection),
}

impl Outcome {
    pub fn accepted(self) -> Option<ProcessedFact> {
        match self {
            Outcome::Accepted(f) => Some(*f),
            Outcome::Discarded(_) => None,
        }
    }

    pub fn is_discarded(&self) -> bool {
        matches!(self, Outcome::Discarded(_))
    }
}

/// Pure validator: output depends only on the record, the policy and `now`.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    policy: ContentPolicy,
}

impl Validator {
    pub fn new(policy: ContentPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ContentPolicy {
        &self.policy
    }

    pub fn process(&self, raw: &RawRecord) -> Result<Outcome, ProcessError> {
        self.process_at(raw, Utc::now())
    }

    pub fn process_at(&self, raw: &RawRecord, now: DateTime<Utc>) -> Result<Outcome, ProcessError> {
        if raw.source.trim().is_empty() {
            return Err(ProcessError::MissingSource);
        }
        for u in &raw.urls {
            if reqwest::Url::parse(u).is_err() {
                return Err(ProcessError::InvalidUrl(u.clone()));
            }
        }

        let content = normalize_text(&raw.content);
        let len = content.chars().count();
        if len < self.policy.min_length {
            return Ok(Outcome::Discarded(Rejection::TooShort { len }));
        }
        if len > self.policy.max_length {
            return Ok(Outcome::Discarded(Rejection::TooLong { len }));
        }

        let lower = content.to_lowercase();
        if let Some(w) = self
            .policy
            .banned_words
            .iter()
            .find(|w| lower.contains(w.as_str()))
        {
            return Ok(Outcome::Discarded(Rejection::BannedWord(w.clone())));
        }
        let has_marker = self
            .policy
            .marker_words
            .iter()
            .any(|w| lower.contains(w.as_str()));
        if !has_marker {
            return Ok(Outcome::Discarded(Rejection::NoMarkerWord));
        }

        let tags = normalize_tags(&raw.tags);
        let score = self.score(len, raw, tags.len());
        if score < self.policy.threshold {
            return Ok(Outcome::Discarded(Rejection::LowScore {
                score,
                threshold: self.policy.threshold,
            }));
        }

        Ok(Outcome::Accepted(Box::new(ProcessedFact {
            content,
            source: raw.source.trim().to_string(),
            category: normalize_category(&raw.category),
            tags,
            urls: raw.urls.clone(),
            metadata: raw.metadata.clone(),
            verified: true,
            score,
            created_at: now,
            updated_at: now,
            publish_date: now + Duration::days(1),
        })))
    }

    /// Normalized quality score in [0,1]. `len` is the normalized body length.
    pub fn score(&self, len: usize, raw: &RawRecord, tag_count: usize) -> f64 {
        let w = &self.policy.weights;
        let mut raw_score = w.baseline;

        if (w.sweet_spot.0..=w.sweet_spot.1).contains(&len) {
            raw_score += w.sweet_spot_bonus;
        } else if len < w.short_below || len > w.long_above {
            raw_score -= w.length_penalty;
        }

        if !raw.category.trim().is_empty() {
            raw_score += w.category;
        }

        if tag_count > 0 {
            raw_score += w.tags_any;
            if tag_count >= w.rich_count {
                raw_score += w.tags_rich;
            }
        }

        if !raw.urls.is_empty() {
            raw_score += w.urls_any;
        }

        if !raw.metadata.is_empty() {
            raw_score += w.metadata_any;
            if raw.metadata.len() >= w.rich_count {
                raw_score += w.metadata_rich;
            }
        }

        (raw_score / w.max_raw().max(1e-6)).clamp(0.0, 1.0)
    }
}
