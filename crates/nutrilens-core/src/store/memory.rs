//! In-memory [`AnalysisStore`] implementation for tests and embedding.
//!
//! Records live in a `HashMap` keyed by product name behind a
//! `std::sync::RwLock`; an upsert holds the write lock for its whole
//! read-modify-write, so it is atomic with respect to other callers.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::models::{AnalysisRecord, RecordId, StoredAnalysis};

use super::AnalysisStore;

/// In-memory store for tests.
pub struct InMemoryStore {
    records: RwLock<HashMap<String, StoredAnalysis>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnalysisStore for InMemoryStore {
    async fn upsert(&self, record: &AnalysisRecord) -> Result<RecordId> {
        let now = Utc::now();
        let mut records = self.records.write().unwrap();
        match records.get_mut(&record.product_name) {
            Some(existing) => {
                existing.record = record.clone();
                existing.updated_at = now;
                Ok(existing.id.clone())
            }
            None => {
                let id = Uuid::new_v4().to_string();
                records.insert(
                    record.product_name.clone(),
                    StoredAnalysis {
                        id: id.clone(),
                        record: record.clone(),
                        created_at: now,
                        updated_at: now,
                    },
                );
                Ok(id)
            }
        }
    }

    async fn get(&self, product_name: &str) -> Result<Option<StoredAnalysis>> {
        let records = self.records.read().unwrap();
        Ok(records.get(product_name).cloned())
    }

    async fn list(&self, limit: usize) -> Result<Vec<StoredAnalysis>> {
        let records = self.records.read().unwrap();
        let mut all: Vec<StoredAnalysis> = records.values().cloned().collect();
        all.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        all.truncate(limit);
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::merge;
    use crate::models::{Analysis, LabelImages};

    fn record(name: &str, nutrition_url: &str) -> AnalysisRecord {
        let mut record = merge(
            &LabelImages::new("https://img/ing.jpg", nutrition_url),
            Analysis::invalid(),
            Analysis::invalid(),
        );
        record.product_name = name.to_string();
        record
    }

    #[tokio::test]
    async fn test_upsert_same_name_keeps_one_record() {
        let store = InMemoryStore::new();
        let first = store.upsert(&record("비타민B", "https://img/a.jpg")).await.unwrap();
        let second = store.upsert(&record("비타민B", "https://img/b.jpg")).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.len(), 1);
        let stored = store.get("비타민B").await.unwrap().unwrap();
        assert_eq!(stored.record.nutrition_image_url, "https://img/b.jpg");
        assert!(stored.updated_at >= stored.created_at);
    }

    #[tokio::test]
    async fn test_upsert_is_case_sensitive() {
        let store = InMemoryStore::new();
        let a = store.upsert(&record("Vitamin B", "https://img/a.jpg")).await.unwrap();
        let b = store.upsert(&record("vitamin b", "https://img/a.jpg")).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_get_missing_and_list_limit() {
        let store = InMemoryStore::new();
        assert!(store.get("nothing").await.unwrap().is_none());
        for name in ["a", "b", "c"] {
            store.upsert(&record(name, "https://img/n.jpg")).await.unwrap();
        }
        assert_eq!(store.list(2).await.unwrap().len(), 2);
        assert_eq!(store.list(10).await.unwrap().len(), 3);
    }
}
