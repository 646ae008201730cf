// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod api;
pub mod cache;
pub mod chat;
pub mod config;
pub mod error;
pub mod fact;
pub mod ingest;
pub mod metrics;
pub mod seed;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::api::{router, AppState};
pub use crate::error::{CollectionError, ConfigError, ProcessError, StoreError};
pub use crate::fact::{FactId, ProcessedFact, StoredFact};
pub use crate::ingest::{Collector, RawRecord, SourceProvider, Validator};
pub use crate::store::{FactFilter, FactStore, MemoryFactStore};
