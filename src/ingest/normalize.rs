// src/ingest/normalize.rs
//! Category taxonomy and tag normalization.
//!
//! Provider labels (Wikipedia categories, Numbers API types, ...) are folded into
//! a fixed taxonomy. Lookup order: exact alias (case-insensitive) → substring
//! containment of a canonical name → `General`.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    General,
    People,
    Science,
    Technology,
    History,
    Geography,
    Arts,
    Culture,
    Sports,
    Entertainment,
    Politics,
    Business,
    Education,
    Health,
    Environment,
}

/// Canonical entries tried, in this order, by the substring fallback.
const SUBSTRING_ORDER: [Category; 13] = [
    Category::Science,
    Category::Technology,
    Category::History,
    Category::Geography,
    Category::Arts,
    Category::Culture,
    Category::Sports,
    Category::Entertainment,
    Category::Politics,
    Category::Business,
    Category::Education,
    Category::Health,
    Category::Environment,
];

/// Provider label (lowercase) → canonical category.
const ALIASES: &[(&str, Category)] = &[
    ("general", Category::General),
    ("all article disambiguation pages", Category::General),
    ("all disambiguation pages", Category::General),
    ("disambiguation pages", Category::General),
    ("trivia", Category::General),
    ("fun facts", Category::General),
    ("people", Category::People),
    ("living people", Category::People),
    ("science", Category::Science),
    ("space", Category::Science),
    ("astronomy", Category::Science),
    ("physics", Category::Science),
    ("chemistry", Category::Science),
    ("biology", Category::Science),
    ("mathematics", Category::Science),
    ("math", Category::Science),
    ("technology", Category::Technology),
    ("computer science", Category::Technology),
    ("engineering", Category::Technology),
    ("internet", Category::Technology),
    ("software", Category::Technology),
    ("hardware", Category::Technology),
    ("artificial intelligence", Category::Technology),
    ("robotics", Category::Technology),
    ("history", Category::History),
    ("date", Category::History),
    ("year", Category::History),
    ("geography", Category::Geography),
    ("arts", Category::Arts),
    ("culture", Category::Culture),
    ("sports", Category::Sports),
    ("entertainment", Category::Entertainment),
    ("politics", Category::Politics),
    ("business", Category::Business),
    ("education", Category::Education),
    ("health", Category::Health),
    ("environment", Category::Environment),
];

impl Category {
    pub const ALL: [Category; 15] = [
        Category::General,
        Category::People,
        Category::Science,
        Category::Technology,
        Category::History,
        Category::Geography,
        Category::Arts,
        Category::Culture,
        Category::Sports,
        Category::Entertainment,
        Category::Politics,
        Category::Business,
        Category::Education,
        Category::Health,
        Category::Environment,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::General => "General",
            Category::People => "People",
            Category::Science => "Science",
            Category::Technology => "Technology",
            Category::History => "History",
            Category::Geography => "Geography",
            Category::Arts => "Arts",
            Category::Culture => "Culture",
            Category::Sports => "Sports",
            Category::Entertainment => "Entertainment",
            Category::Politics => "Politics",
            Category::Business => "Business",
            Category::Education => "Education",
            Category::Health => "Health",
            Category::Environment => "Environment",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remove any number of leading `Category:` prefixes (case-insensitive) and trim.
fn strip_category_prefix(s: &str) -> &str {
    const PREFIX: &str = "category:";
    let mut rest = s.trim();
    while rest.len() >= PREFIX.len()
        && rest.is_char_boundary(PREFIX.len())
        && rest[..PREFIX.len()].eq_ignore_ascii_case(PREFIX)
    {
        rest = rest[PREFIX.len()..].trim();
    }
    rest
}

/// Map a provider label onto the taxonomy. Never fails; unknown labels land in `General`.
pub fn normalize_category(label: &str) -> Category {
    match_category(label).unwrap_or(Category::General)
}

/// Like [`normalize_category`] but `None` when only the `General` default would apply.
pub fn match_category(label: &str) -> Option<Category> {
    let cleaned = strip_category_prefix(label).to_lowercase();
    if cleaned.is_empty() {
        return None;
    }

    if let Some((_, c)) = ALIASES.iter().find(|(k, _)| *k == cleaned) {
        return Some(*c);
    }

    SUBSTRING_ORDER
        .into_iter()
        .find(|c| cleaned.contains(&c.as_str().to_lowercase()))
}

/// Trim, strip prefix, lowercase, drop empties, dedupe keeping first-seen order.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for t in tags {
        let tag = strip_category_prefix(t.as_ref()).to_lowercase();
        if tag.is_empty() || !seen.insert(tag.clone()) {
            continue;
        }
        out.push(tag);
    }
    out
}
