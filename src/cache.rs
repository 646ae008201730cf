// src/cache.rs
//! Daily-fact cache for the serving layer.
//!
//! Entries are keyed by UTC day and category (`daily_fact:2024-10-17:Science`),
//! so a new day never sees yesterday's pick even before the TTL runs out.

use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::fact::StoredFact;
use crate::ingest::normalize::Category;

#[derive(Debug)]
pub struct DailyFactCache {
    inner: Mutex<HashMap<String, (Instant, StoredFact)>>,
    ttl: Duration,
}

impl DailyFactCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn key(day: NaiveDate, category: Option<Category>) -> String {
        match category {
            Some(c) => format!("daily_fact:{day}:{c}"),
            None => format!("daily_fact:{day}"),
        }
    }

    pub fn get_daily_fact(&self, category: Option<Category>) -> Option<StoredFact> {
        self.get_for(Utc::now().date_naive(), category)
    }

    pub fn set_daily_fact(&self, category: Option<Category>, fact: StoredFact) {
        self.set_for(Utc::now().date_naive(), category, fact)
    }

    pub fn get_for(&self, day: NaiveDate, category: Option<Category>) -> Option<StoredFact> {
        let key = Self::key(day, category);
        let mut map = match self.inner.lock() {
            Ok(g) => g,
            Err(poison) => poison.into_inner(),
        };
        let entry = map
            .get(&key)
            .map(|(at, fact)| (at.elapsed() < self.ttl, fact.clone()));
        match entry {
            Some((true, fact)) => Some(fact),
            Some((false, _)) => {
                map.remove(&key);
                None
            }
            None => None,
        }
    }

    pub fn set_for(&self, day: NaiveDate, category: Option<Category>, fact: StoredFact) {
        let mut map = match self.inner.lock() {
            Ok(g) => g,
            Err(poison) => poison.into_inner(),
        };
        // drop entries from previous days
        let today_prefix = format!("daily_fact:{day}");
        map.retain(|k, _| k.starts_with(&today_prefix));
        map.insert(Self::key(day, category), (Instant::now(), fact));
    }

    /// Forget everything, e.g. after an admin edit.
    pub fn clear(&self) {
        let mut map = match self.inner.lock() {
            Ok(g) => g,
            Err(poison) => poison.into_inner(),
        };
        map.clear();
    }
}
