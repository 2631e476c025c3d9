//! Test helpers for simulating store failures.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::store::{
    DocPath, Document, DocumentStore, MemoryStore, Query, StoreError, WriteBatch,
};

/// A store wrapper that can be armed to fail the next batch commit.
///
/// Reads always pass through, so tests can assert that a failed batch left
/// no partial state behind.
pub struct FlakyStore {
    inner: MemoryStore,
    fail_next_commit: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            fail_next_commit: AtomicBool::new(false),
        }
    }

    /// Make the next call to [DocumentStore::commit] fail
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn get(&self, path: &DocPath) -> Result<Option<Document>, StoreError> {
        self.inner.get(path).await
    }

    async fn query(&self, query: Query) -> Result<Vec<(String, Document)>, StoreError> {
        self.inner.query(query).await
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Backend("injected commit failure".to_string()));
        }
        self.inner.commit(batch).await
    }

    fn allocate_id(&self) -> String {
        self.inner.allocate_id()
    }
}
