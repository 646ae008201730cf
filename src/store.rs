// src/store.rs
//! Fact Store contract and the in-memory implementation.
//!
//! The store owns `StoredFact` state after a successful insert. With content
//! dedup enabled it refuses a second fact whose content hash is already present.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::StoreError;
use crate::fact::{content_hash, FactId, ProcessedFact, StoredFact};
use crate::ingest::normalize::Category;

#[async_trait::async_trait]
pub trait FactStore: Send + Sync {
    async fn insert(&self, fact: ProcessedFact) -> Result<FactId, StoreError>;
    async fn get(&self, id: FactId) -> Result<StoredFact, StoreError>;
    /// Newest (by publish date) matching fact, or `NotFound`.
    async fn find_one(&self, filter: &FactFilter) -> Result<StoredFact, StoreError>;
    /// Matching facts, newest publish date first.
    async fn find_many(
        &self,
        filter: &FactFilter,
        limit: usize,
        skip: usize,
    ) -> Result<Vec<StoredFact>, StoreError>;
    async fn find_random(&self, filter: &FactFilter) -> Result<StoredFact, StoreError>;
    /// Stamp `last_served_at` and bump the serve counter.
    async fn record_serve(&self, id: FactId, at: DateTime<Utc>) -> Result<(), StoreError>;
    async fn update(&self, id: FactId, fact: ProcessedFact) -> Result<StoredFact, StoreError>;
    async fn delete(&self, id: FactId) -> Result<(), StoreError>;
    async fn categories(&self) -> Result<Vec<Category>, StoreError>;
    async fn count(&self) -> Result<usize, StoreError>;
}

/// Query filter. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct FactFilter {
    pub verified: Option<bool>,
    pub category: Option<Category>,
    pub tag: Option<String>,
    /// Any whitespace-separated term found in body, category, tags or `keywords` metadata.
    pub text: Option<String>,
    pub difficulty: Option<String>,
    pub language: Option<String>,
    /// Exclude facts served more recently than this.
    pub not_served_within: Option<Duration>,
    /// Inclusive start, exclusive end.
    pub published_between: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

impl FactFilter {
    pub fn verified() -> Self {
        Self {
            verified: Some(true),
            ..Self::default()
        }
    }

    pub fn category(mut self, c: Option<Category>) -> Self {
        self.category = c;
        self
    }

    pub fn tag(mut self, t: impl Into<String>) -> Self {
        self.tag = Some(t.into().trim().to_lowercase());
        self
    }

    pub fn text(mut self, q: impl Into<String>) -> Self {
        self.text = Some(q.into());
        self
    }

    pub fn not_served_within(mut self, d: Duration) -> Self {
        self.not_served_within = Some(d);
        self
    }

    pub fn published_between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.published_between = Some((from, to));
        self
    }

    pub fn matches(&self, f: &StoredFact, now: DateTime<Utc>) -> bool {
        let p = &f.fact;
        if self.verified.is_some_and(|v| p.verified != v) {
            return false;
        }
        if self.category.is_some_and(|c| p.category != c) {
            return false;
        }
        if let Some(tag) = &self.tag {
            if !p.tags.iter().any(|t| t == tag) {
                return false;
            }
        }
        if let Some(d) = &self.difficulty {
            if !meta_eq(p, "difficulty", d) {
                return false;
            }
        }
        if let Some(l) = &self.language {
            if !meta_eq(p, "language", l) {
                return false;
            }
        }
        if let Some(window) = self.not_served_within {
            if f.last_served_at.is_some_and(|at| now - at < window) {
                return false;
            }
        }
        if let Some((from, to)) = self.published_between {
            if p.publish_date < from || p.publish_date >= to {
                return false;
            }
        }
        if let Some(q) = &self.text {
            if !text_matches(p, q) {
                return false;
            }
        }
        true
    }
}

fn meta_eq(p: &ProcessedFact, key: &str, want: &str) -> bool {
    p.metadata
        .get(key)
        .is_some_and(|v| v.eq_ignore_ascii_case(want.trim()))
}

fn text_matches(p: &ProcessedFact, q: &str) -> bool {
    let terms = q
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>();
    if terms.is_empty() {
        return true;
    }
    let mut hay = p.content.to_lowercase();
    hay.push(' ');
    hay.push_str(&p.category.as_str().to_lowercase());
    for t in &p.tags {
        hay.push(' ');
        hay.push_str(t);
    }
    if let Some(k) = p.metadata.get("keywords") {
        hay.push(' ');
        hay.push_str(&k.to_lowercase());
    }
    terms.iter().any(|t| hay.contains(t.as_str()))
}

#[derive(Debug, Default)]
struct Inner {
    facts: Vec<StoredFact>,
    by_hash: HashMap<String, FactId>,
}

impl Inner {
    fn position(&self, id: FactId) -> Result<usize, StoreError> {
        self.facts
            .iter()
            .position(|f| f.id == id)
            .ok_or(StoreError::NotFound)
    }

    fn sorted_matches(&self, filter: &FactFilter, now: DateTime<Utc>) -> Vec<&StoredFact> {
        let mut v = self
            .facts
            .iter()
            .filter(|f| filter.matches(f, now))
            .collect::<Vec<_>>();
        v.sort_by(|a, b| {
            b.fact
                .publish_date
                .cmp(&a.fact.publish_date)
                .then(b.fact.created_at.cmp(&a.fact.created_at))
        });
        v
    }
}

/// Process-local store. Safe to share behind an `Arc`.
#[derive(Debug)]
pub struct MemoryFactStore {
    inner: RwLock<Inner>,
    dedup_content: bool,
}

impl Default for MemoryFactStore {
    fn default() -> Self {
        Self::new(true)
    }
}

impl MemoryFactStore {
    pub fn new(dedup_content: bool) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            dedup_content,
        }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Inner>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::Backend("fact store lock poisoned".into()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Inner>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::Backend("fact store lock poisoned".into()))
    }
}

#[async_trait::async_trait]
impl FactStore for MemoryFactStore {
    async fn insert(&self, fact: ProcessedFact) -> Result<FactId, StoreError> {
        let hash = fact.content_hash();
        let mut inner = self.write()?;
        if self.dedup_content {
            if let Some(id) = inner.by_hash.get(&hash) {
                return Err(StoreError::Duplicate { id: *id });
            }
        }
        let id = FactId::new_v4();
        inner.by_hash.entry(hash).or_insert(id);
        inner.facts.push(StoredFact {
            id,
            fact,
            last_served_at: None,
            serve_count: 0,
        });
        Ok(id)
    }

    async fn get(&self, id: FactId) -> Result<StoredFact, StoreError> {
        let inner = self.read()?;
        let pos = inner.position(id)?;
        Ok(inner.facts[pos].clone())
    }

    async fn find_one(&self, filter: &FactFilter) -> Result<StoredFact, StoreError> {
        let inner = self.read()?;
        inner
            .sorted_matches(filter, Utc::now())
            .first()
            .map(|f| (*f).clone())
            .ok_or(StoreError::NotFound)
    }

    async fn find_many(
        &self,
        filter: &FactFilter,
        limit: usize,
        skip: usize,
    ) -> Result<Vec<StoredFact>, StoreError> {
        let inner = self.read()?;
        Ok(inner
            .sorted_matches(filter, Utc::now())
            .into_iter()
            .skip(skip)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn find_random(&self, filter: &FactFilter) -> Result<StoredFact, StoreError> {
        use rand::seq::IndexedRandom;
        let inner = self.read()?;
        let now = Utc::now();
        let candidates = inner
            .facts
            .iter()
            .filter(|f| filter.matches(f, now))
            .collect::<Vec<_>>();
        candidates
            .choose(&mut rand::rng())
            .map(|f| (*f).clone())
            .ok_or(StoreError::NotFound)
    }

    async fn record_serve(&self, id: FactId, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        let pos = inner.position(id)?;
        let f = &mut inner.facts[pos];
        f.last_served_at = Some(at);
        f.serve_count += 1;
        Ok(())
    }

    async fn update(&self, id: FactId, mut fact: ProcessedFact) -> Result<StoredFact, StoreError> {
        let new_hash = fact.content_hash();
        let mut inner = self.write()?;
        let pos = inner.position(id)?;
        if self.dedup_content {
            if let Some(other) = inner.by_hash.get(&new_hash) {
                if *other != id {
                    return Err(StoreError::Duplicate { id: *other });
                }
            }
        }

        let old_hash = inner.facts[pos].fact.content_hash();
        if inner.by_hash.get(&old_hash) == Some(&id) {
            inner.by_hash.remove(&old_hash);
        }
        inner.by_hash.insert(new_hash, id);

        let existing = &mut inner.facts[pos];
        fact.created_at = existing.fact.created_at;
        fact.updated_at = Utc::now();
        existing.fact = fact;
        Ok(existing.clone())
    }

    async fn delete(&self, id: FactId) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        let pos = inner.position(id)?;
        let removed = inner.facts.remove(pos);
        let hash = content_hash(&removed.fact.content);
        if inner.by_hash.get(&hash) == Some(&id) {
            inner.by_hash.remove(&hash);
        }
        Ok(())
    }

    async fn categories(&self) -> Result<Vec<Category>, StoreError> {
        let inner = self.read()?;
        let mut cats = inner.facts.iter().map(|f| f.fact.category).collect::<Vec<_>>();
        cats.sort_by_key(|c| c.as_str());
        cats.dedup();
        Ok(cats)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.read()?.facts.len())
    }
}
