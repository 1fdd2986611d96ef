//! Graph store adapters.
//!
//! The service reads the lexicon through the [`GraphStore`] contract.
//! [`memory::MemoryGraphStore`] backs tests and fixture-driven local runs;
//! [`cypher::HttpGraphStore`] talks to a deployed property-graph store over
//! its transactional HTTP API.

pub mod cypher;
pub mod memory;

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::Serialize;

use crate::model::{Depth, NeighborRecord, NodeRecord, SearchField};

/// Error types for store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Store error: {status} - {message}")]
    Server { status: u16, message: String },

    #[error("Query rejected ({code}): {message}")]
    Query { code: String, message: String },

    #[error("Statement references unbound parameter ${0}")]
    UnboundParameter(String),

    #[error("Malformed store response: {0}")]
    Malformed(String),

    #[error("Unknown node: {0}")]
    UnknownNode(String),

    #[error("Fixture error: {0}")]
    Fixture(String),
}

impl StoreError {
    /// Whether a single retry is worthwhile. Construction and query errors
    /// never are; they fail the same way every time.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Http(e) => e.is_timeout() || e.is_connect(),
            StoreError::Server { status, .. } => *status >= 500,
            StoreError::Query { code, .. } => code.contains("TransientError"),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Read contract the lexical service depends on.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Indexed lookup of nodes whose `field` matches `term`.
    ///
    /// Orthographic and phonetic terms match exactly; transliteration and
    /// translation match case-insensitively. No hits is `Ok(vec![])`.
    async fn lookup(&self, field: SearchField, term: &str) -> Result<Vec<NodeRecord>>;

    /// Candidate neighborhood of `center_id`: hop-1 rows, plus hop-2 rows
    /// when `depth` is [`Depth::Two`]. `per_hop_limit` bounds each hop's
    /// candidate set; final ordering, truncation, and dedup belong to the
    /// traversal engine.
    async fn neighborhood(
        &self,
        center_id: &str,
        depth: Depth,
        per_hop_limit: u32,
    ) -> Result<Vec<NeighborRecord>>;

    /// Snapshot of call counters.
    fn stats(&self) -> StoreStats;
}

/// Counter snapshot reported by store implementations.
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    /// Index lookups served.
    pub lookups: u64,
    /// Neighborhood fetches served.
    pub traversals: u64,
    /// Transient-failure retries taken.
    pub retries: u64,
}

/// Shared atomic counters backing [`StoreStats`].
#[derive(Debug, Default)]
pub struct StoreCounters {
    lookups: AtomicU64,
    traversals: AtomicU64,
    retries: AtomicU64,
}

impl StoreCounters {
    pub fn record_lookup(&self) {
        self.lookups.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_traversal(&self) {
        self.traversals.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StoreStats {
        StoreStats {
            lookups: self.lookups.load(Ordering::Relaxed),
            traversals: self.traversals.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
        }
    }
}
