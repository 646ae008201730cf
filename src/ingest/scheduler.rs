// src/ingest/scheduler.rs
//! Collection orchestrator.
//!
//! One pass fans out a task per source. Each task fetches under a deadline,
//! validates its records in fetch order and pushes accepted facts onto a bounded
//! queue. The calling task is the single consumer and performs every store
//! write, so the store never sees concurrent writers from the pipeline.
//!
//! Faults (a source failing or timing out, a store write failing) are counted
//! and reported at the end of the pass; they never abort it.

use chrono::{DateTime, Utc};
use metrics::{counter, gauge, histogram};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{CollectionError, StoreError};
use crate::fact::ProcessedFact;
use crate::ingest::ensure_metrics_described;
use crate::ingest::types::SourceProvider;
use crate::ingest::validate::{Outcome, Validator};
use crate::store::FactStore;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(6 * 3600);
pub const DEFAULT_SOURCE_DEADLINE: Duration = Duration::from_secs(120);
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

#[derive(Clone, Copy, Debug)]
pub struct CollectorSettings {
    pub interval: Duration,
    /// Upper bound on one source's whole `fetch_facts` call.
    pub source_deadline: Duration,
    pub queue_capacity: usize,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            source_deadline: DEFAULT_SOURCE_DEADLINE,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// Per-source result of one pass.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SourceOutcome {
    pub source: String,
    pub fetched: usize,
    pub accepted: usize,
    pub discarded: usize,
    /// Records the validator could not process at all.
    pub invalid: usize,
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

impl SourceOutcome {
    fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            fetched: 0,
            accepted: 0,
            discarded: 0,
            invalid: 0,
            error: None,
            elapsed_ms: 0,
        }
    }

    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StoreFailure {
    pub source: String,
    pub error: String,
}

/// Ephemeral aggregation of one pass. Never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub sources: Vec<SourceOutcome>,
    pub fetched: usize,
    pub accepted: usize,
    pub discarded: usize,
    pub stored: usize,
    /// Accepted facts the store already had (content dedup).
    pub duplicates: usize,
    pub store_failures: Vec<StoreFailure>,
}

impl CollectionReport {
    pub fn source_failures(&self) -> impl Iterator<Item = &SourceOutcome> {
        self.sources.iter().filter(|s| s.failed())
    }

    pub fn fault_count(&self) -> usize {
        self.source_failures().count() + self.store_failures.len()
    }

    pub fn is_clean(&self) -> bool {
        self.fault_count() == 0
    }
}

/// Runs every configured source on a fixed interval and persists accepted facts.
pub struct Collector {
    sources: Vec<Arc<dyn SourceProvider>>,
    validator: Arc<Validator>,
    store: Arc<dyn FactStore>,
    settings: CollectorSettings,
    /// `Some` while the scheduled loop is active; cancelling it stops the loop.
    running: Mutex<Option<CancellationToken>>,
    /// Serializes passes (scheduled tick vs. manual trigger).
    pass_lock: tokio::sync::Mutex<()>,
}

impl Collector {
    pub fn new(sources: Vec<Arc<dyn SourceProvider>>, store: Arc<dyn FactStore>) -> Self {
        Self {
            sources,
            validator: Arc::new(Validator::default()),
            store,
            settings: CollectorSettings::default(),
            running: Mutex::new(None),
            pass_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = Arc::new(validator);
        self
    }

    pub fn with_settings(mut self, settings: CollectorSettings) -> Self {
        self.settings = CollectorSettings {
            queue_capacity: settings.queue_capacity.max(1),
            ..settings
        };
        self
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    pub fn settings(&self) -> CollectorSettings {
        self.settings
    }

    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, Option<CancellationToken>> {
        match self.running.lock() {
            Ok(g) => g,
            Err(poison) => poison.into_inner(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.state().is_some()
    }

    /// Stop the scheduled loop. An in-flight pass finishes first.
    pub fn stop(&self) {
        if let Some(token) = self.state().take() {
            token.cancel();
            info!(target: "ingest", "collector stop requested");
        }
    }

    /// Run one pass now, then one per interval until `shutdown` fires or
    /// [`Collector::stop`] is called. A second call while running is a no-op.
    pub async fn start(&self, shutdown: CancellationToken) {
        let token = {
            let mut state = self.state();
            if state.is_some() {
                debug!(target: "ingest", "collector already running");
                return;
            }
            let t = shutdown.child_token();
            *state = Some(t.clone());
            t
        };
        gauge!("collector_running").set(1.0);
        info!(
            target: "ingest",
            interval_secs = self.settings.interval.as_secs(),
            sources = ?self.source_names(),
            "collector started"
        );

        self.run_logged().await;

        let period = self.settings.interval;
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => self.run_logged().await,
            }
        }

        {
            let mut state = self.state();
            // `stop()` already cleared it; only clear our own token otherwise.
            if state.as_ref().is_some_and(|t| t.is_cancelled()) {
                *state = None;
            }
        }
        gauge!("collector_running").set(0.0);
        info!(target: "ingest", "collector stopped");
    }

    /// Spawn [`Collector::start`] on the runtime.
    pub fn spawn(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.start(shutdown).await })
    }

    async fn run_logged(&self) {
        match self.collect_facts().await {
            Ok(r) => info!(
                target: "ingest",
                stored = r.stored,
                duplicates = r.duplicates,
                discarded = r.discarded,
                "collection tick"
            ),
            Err(e) => warn!(target: "ingest", error = %e, "collection tick with faults"),
        }
    }

    /// One pass across all sources.
    ///
    /// `Ok` when nothing failed; `Err(CollectionError::Partial)` carries the full
    /// report when any source or store write failed. Either way every healthy
    /// record has been offered to the store.
    pub async fn collect_facts(&self) -> Result<CollectionReport, CollectionError> {
        ensure_metrics_described();
        let _pass = self.pass_lock.lock().await;
        let started_at = Utc::now();

        let (tx, mut rx) = mpsc::channel::<ProcessedFact>(self.settings.queue_capacity);
        let handles = self
            .sources
            .iter()
            .map(|src| {
                let src = Arc::clone(src);
                let validator = Arc::clone(&self.validator);
                let tx = tx.clone();
                let deadline = self.settings.source_deadline;
                tokio::spawn(run_source(src, validator, tx, deadline))
            })
            .collect::<Vec<_>>();
        drop(tx);

        let mut stored = 0usize;
        let mut duplicates = 0usize;
        let mut store_failures = Vec::new();
        while let Some(fact) = rx.recv().await {
            let source = fact.source.clone();
            match self.store.insert(fact).await {
                Ok(id) => {
                    stored += 1;
                    debug!(target: "ingest", %id, %source, "fact stored");
                }
                Err(StoreError::Duplicate { id }) => {
                    duplicates += 1;
                    debug!(target: "ingest", existing = %id, %source, "duplicate fact skipped");
                }
                Err(e) => {
                    warn!(target: "ingest", error = %e, %source, "storing fact failed");
                    store_failures.push(StoreFailure {
                        source,
                        error: e.to_string(),
                    });
                }
            }
        }

        let mut sources = Vec::with_capacity(handles.len());
        for (handle, src) in handles.into_iter().zip(&self.sources) {
            match handle.await {
                Ok(outcome) => sources.push(outcome),
                Err(join_err) => {
                    let mut o = SourceOutcome::new(src.name());
                    o.error = Some(format!("source task aborted: {join_err}"));
                    counter!("source_errors_total", "source" => src.name()).increment(1);
                    sources.push(o);
                }
            }
        }

        counter!("facts_stored_total").increment(stored as u64);
        counter!("facts_duplicate_total").increment(duplicates as u64);
        counter!("facts_store_errors_total").increment(store_failures.len() as u64);
        counter!("collection_runs_total").increment(1);
        let finished_at = Utc::now();
        gauge!("collection_last_run_ts").set(finished_at.timestamp() as f64);

        let report = CollectionReport {
            started_at,
            finished_at,
            fetched: sources.iter().map(|s| s.fetched).sum(),
            accepted: sources.iter().map(|s| s.accepted).sum(),
            discarded: sources.iter().map(|s| s.discarded).sum(),
            sources,
            stored,
            duplicates,
            store_failures,
        };

        if report.is_clean() {
            Ok(report)
        } else {
            Err(CollectionError::Partial(report))
        }
    }
}

/// Fetch one source under `deadline`, validate in fetch order, enqueue accepted facts.
async fn run_source(
    src: Arc<dyn SourceProvider>,
    validator: Arc<Validator>,
    tx: mpsc::Sender<ProcessedFact>,
    deadline: Duration,
) -> SourceOutcome {
    let name = src.name();
    let mut outcome = SourceOutcome::new(name);
    let t0 = Instant::now();

    let fetched = tokio::time::timeout(deadline, src.fetch_facts()).await;
    let elapsed = t0.elapsed();
    outcome.elapsed_ms = elapsed.as_millis() as u64;
    histogram!("source_fetch_ms", "source" => name).record(elapsed.as_secs_f64() * 1_000.0);

    let records = match fetched {
        Ok(Ok(v)) => v,
        Ok(Err(e)) => {
            warn!(target: "ingest", error = ?e, source = name, "source fetch failed");
            counter!("source_errors_total", "source" => name).increment(1);
            outcome.error = Some(format!("{e:#}"));
            return outcome;
        }
        Err(_) => {
            warn!(target: "ingest", source = name, deadline_ms = deadline.as_millis() as u64, "source timed out");
            counter!("source_errors_total", "source" => name).increment(1);
            outcome.error = Some(format!("timed out after {}ms", deadline.as_millis()));
            return outcome;
        }
    };

    outcome.fetched = records.len();
    counter!("facts_fetched_total", "source" => name).increment(records.len() as u64);

    for raw in &records {
        match validator.process(raw) {
            Ok(Outcome::Accepted(fact)) => {
                outcome.accepted += 1;
                counter!("facts_accepted_total").increment(1);
                // Receiver only goes away if the pass itself is torn down.
                if tx.send(*fact).await.is_err() {
                    break;
                }
            }
            Ok(Outcome::Discarded(why)) => {
                outcome.discarded += 1;
                counter!("facts_discarded_total", "reason" => why.reason()).increment(1);
                debug!(target: "ingest", source = name, reason = why.reason(), "record discarded");
            }
            Err(e) => {
                outcome.invalid += 1;
                warn!(target: "ingest", source = name, error = %e, "record skipped");
            }
        }
    }

    debug!(
        target: "ingest",
        source = name,
        fetched = outcome.fetched,
        accepted = outcome.accepted,
        "source done"
    );
    outcome
}
