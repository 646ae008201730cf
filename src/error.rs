// src/error.rs
//! Typed errors at library boundaries.
//!
//! Source adapters stay on `anyhow` (every step adds `.context(..)`); these enums
//! are what the store, validator, config loader and collector hand back to callers.

use std::path::PathBuf;

use thiserror::Error;

use crate::fact::FactId;
use crate::ingest::scheduler::CollectionReport;

/// Missing or malformed startup setting. Fatal at startup only.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid duration for {key}: '{value}' (expected e.g. 45s, 30m, 6h, 1d)")]
    InvalidDuration { key: &'static str, value: String },

    #[error("invalid number for {key}: '{value}'")]
    InvalidNumber { key: &'static str, value: String },

    #[error("invalid boolean for {key}: '{value}'")]
    InvalidBool { key: &'static str, value: String },

    #[error("{key} must be greater than zero")]
    Zero { key: &'static str },

    #[error("unknown source '{0}' in enabled-source list")]
    UnknownSource(String),

    #[error("source list {}: {reason}", .path.display())]
    SourceList { path: PathBuf, reason: String },

    #[error("{0}")]
    Other(String),
}

/// A record that cannot be processed at all (as opposed to one that is discarded).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProcessError {
    #[error("record has no source name")]
    MissingSource,

    #[error("invalid reference url '{0}'")]
    InvalidUrl(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no fact found")]
    NotFound,

    #[error("fact with identical content already stored as {id}")]
    Duplicate { id: FactId },

    #[error("store backend failure: {0}")]
    Backend(String),
}

/// Non-fatal aggregate outcome of a collection pass that saw faults.
///
/// The report is always complete: records from healthy sources were stored
/// regardless of how many faults are listed.
#[derive(Debug, Error)]
pub enum CollectionError {
    #[error(
        "collection pass finished with {} fault(s): stored {}, source failures {}, store failures {}",
        .0.fault_count(), .0.stored, .0.source_failures().count(), .0.store_failures.len()
    )]
    Partial(CollectionReport),
}

impl CollectionError {
    pub fn report(&self) -> &CollectionReport {
        match self {
            CollectionError::Partial(r) => r,
        }
    }
}
