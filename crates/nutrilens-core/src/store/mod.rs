//! Storage abstraction for analysis records.
//!
//! The [`AnalysisStore`] trait is the persistence gateway of the pipeline:
//! one record per product name, written with an atomic upsert. Backends
//! are pluggable (SQLite in the `nutrilens` crate, in-memory here).
//!
//! Implementations must be `Send + Sync` to be shared across requests.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{AnalysisRecord, RecordId, StoredAnalysis};

/// Persistent store of merged analysis records, keyed by product name.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert`](AnalysisStore::upsert) | Insert or overwrite the record for a product |
/// | [`get`](AnalysisStore::get) | Fetch the record for a product |
/// | [`list`](AnalysisStore::list) | Most recently updated records first |
#[async_trait]
pub trait AnalysisStore: Send + Sync {
    /// Insert the record, or overwrite the payload and `updated_at` of the
    /// record with the same `product_name` (exact, case-sensitive match).
    ///
    /// Must be a single atomic operation. Returns the identity of the
    /// stored record: the existing one on update, a new one on insert.
    async fn upsert(&self, record: &AnalysisRecord) -> Result<RecordId>;

    /// Fetch the record stored under `product_name`.
    async fn get(&self, product_name: &str) -> Result<Option<StoredAnalysis>>;

    /// List up to `limit` records, most recently updated first.
    async fn list(&self, limit: usize) -> Result<Vec<StoredAnalysis>>;
}
