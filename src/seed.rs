// src/seed.rs
//! Starter facts, so a fresh store can serve before the first collection pass.
//!
//! Seeds go through the same validator as collected records and are only
//! written into an empty store.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::StoreError;
use crate::ingest::types::RawRecord;
use crate::ingest::validate::{Outcome, Validator};
use crate::store::FactStore;

pub const SEED_ORIGIN: &str = "seed";

struct Seed {
    content: &'static str,
    category: &'static str,
    source: &'static str,
    tags: [&'static str; 3],
    url: &'static str,
    difficulty: &'static str,
    keywords: &'static str,
    /// Publish this many days after seeding.
    publish_in_days: i64,
}

const SEEDS: [Seed; 9] = [
    Seed {
        content: "The first computer programmer was a woman named Ada Lovelace. She wrote the first \
                  algorithm intended to be processed by a machine in the 1840s.",
        category: "Technology",
        source: "Computer History Museum",
        tags: ["programming", "history", "women in tech"],
        url: "https://www.computerhistory.org/babbage/adalovelace/",
        difficulty: "easy",
        keywords: "ada lovelace, programming, computer history",
        publish_in_days: 0,
    },
    Seed {
        content: "The speed of light in a vacuum is exactly 299,792,458 meters per second.",
        category: "Science",
        source: "Physics Facts",
        tags: ["physics", "light", "constants"],
        url: "https://en.wikipedia.org/wiki/Speed_of_light",
        difficulty: "easy",
        keywords: "speed of light, vacuum, physics",
        publish_in_days: 0,
    },
    Seed {
        content: "The Great Wall of China is not visible from space with the naked eye, contrary to \
                  popular belief. This myth has been debunked by many astronauts.",
        category: "History",
        source: "NASA",
        tags: ["architecture", "space", "myths"],
        url: "https://www.nasa.gov/vision/space/workinginspace/great_wall.html",
        difficulty: "medium",
        keywords: "great wall, china, space",
        publish_in_days: 1,
    },
    Seed {
        content: "DNA, which contains our genetic code, is a double helix structure first described \
                  by Watson and Crick in 1953.",
        category: "Science",
        source: "Biology Facts",
        tags: ["biology", "dna", "genetics"],
        url: "https://en.wikipedia.org/wiki/DNA",
        difficulty: "medium",
        keywords: "dna, double helix, genetics",
        publish_in_days: 1,
    },
    Seed {
        content: "Quantum computers use quantum bits or 'qubits' that can exist in multiple states \
                  simultaneously, unlike classical bits that are either 0 or 1.",
        category: "Technology",
        source: "IBM Quantum Computing",
        tags: ["quantum", "computing", "physics"],
        url: "https://www.ibm.com/quantum-computing/",
        difficulty: "hard",
        keywords: "quantum computing, qubits, technology",
        publish_in_days: 2,
    },
    Seed {
        content: "The human brain contains approximately 86 billion neurons.",
        category: "Science",
        source: "Neuroscience Facts",
        tags: ["brain", "neurons", "biology"],
        url: "https://en.wikipedia.org/wiki/Human_brain",
        difficulty: "medium",
        keywords: "brain, neurons, neuroscience",
        publish_in_days: 2,
    },
    Seed {
        content: "The Great Wall of China construction began over 2,000 years ago during the Spring \
                  and Autumn Period.",
        category: "History",
        source: "Ancient History Facts",
        tags: ["china", "architecture", "ancient history"],
        url: "https://en.wikipedia.org/wiki/Great_Wall_of_China",
        difficulty: "medium",
        keywords: "great wall, china, spring and autumn period",
        publish_in_days: 3,
    },
    Seed {
        content: "The printing press was invented by Johannes Gutenberg around 1440, revolutionizing \
                  communication.",
        category: "History",
        source: "Medieval History Facts",
        tags: ["printing", "inventions", "gutenberg"],
        url: "https://en.wikipedia.org/wiki/Printing_press",
        difficulty: "easy",
        keywords: "printing press, gutenberg, inventions",
        publish_in_days: 4,
    },
    Seed {
        content: "A day on Venus is longer than its year. It takes Venus 243 Earth days to rotate on \
                  its axis.",
        category: "Space",
        source: "Solar System Facts",
        tags: ["venus", "planets", "space"],
        url: "https://en.wikipedia.org/wiki/Venus",
        difficulty: "easy",
        keywords: "venus, rotation, planets",
        publish_in_days: 5,
    },
];

pub fn seed_count() -> usize {
    SEEDS.len()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub inserted: usize,
    pub duplicates: usize,
    pub rejected: usize,
    /// Facts already in the store; a non-empty store is left alone.
    pub existing: usize,
}

fn seed_record(seed: &Seed) -> RawRecord {
    RawRecord::new(seed.source, seed.content)
        .category(seed.category)
        .tags(seed.tags)
        .url(seed.url)
        .meta("language", "en")
        .meta("difficulty", seed.difficulty)
        .meta("keywords", seed.keywords)
        .meta("origin", SEED_ORIGIN)
}

/// Insert the starter facts into an empty store.
pub async fn seed_store(
    store: &dyn FactStore,
    validator: &Validator,
    now: DateTime<Utc>,
) -> Result<SeedReport, StoreError> {
    let existing = store.count().await?;
    if existing > 0 {
        return Ok(SeedReport {
            existing,
            ..SeedReport::default()
        });
    }

    let mut report = SeedReport::default();
    for seed in &SEEDS {
        let mut fact = match validator.process_at(&seed_record(seed), now) {
            Ok(Outcome::Accepted(f)) => *f,
            Ok(Outcome::Discarded(r)) => {
                warn!(reason = r.reason(), source = seed.source, "seed fact rejected");
                report.rejected += 1;
                continue;
            }
            Err(e) => {
                warn!(error = %e, source = seed.source, "seed fact malformed");
                report.rejected += 1;
                continue;
            }
        };
        fact.publish_date = now + Duration::days(seed.publish_in_days);

        match store.insert(fact).await {
            Ok(_) => report.inserted += 1,
            Err(StoreError::Duplicate { .. }) => report.duplicates += 1,
            Err(e) => return Err(e),
        }
    }
    info!(inserted = report.inserted, rejected = report.rejected, "store seeded");
    Ok(report)
}
