//! Session Table: in-flight uploads keyed by a process-unique id.
//!
//! Ids come from a counter owned by the table and are never reused. Entries
//! are never removed; a finalized session stays queryable.

use crate::{
    errors::{StoreError, StoreResult},
    models::upload::{CreateOptions, UploadSession},
};
use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};
use tokio::sync::RwLock;

#[derive(Clone, Default)]
pub struct SessionTable {
    sessions: Arc<RwLock<HashMap<String, Arc<UploadSession>>>>,
    next_id: Arc<AtomicU64>,
}

impl SessionTable {
    /// Allocate a new empty session and return its id.
    pub async fn insert(&self, key: String, options: CreateOptions) -> String {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed).to_string();
        let session = Arc::new(UploadSession::new(key, options));
        self.sessions.write().await.insert(id.clone(), session);
        id
    }

    pub async fn get(&self, upload_id: &str) -> StoreResult<Arc<UploadSession>> {
        self.sessions
            .read()
            .await
            .get(upload_id)
            .cloned()
            .ok_or_else(|| StoreError::SessionNotFound(upload_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ids_are_monotonic_per_table() {
        let table = SessionTable::default();
        let a = table.insert("a".into(), CreateOptions::default()).await;
        let b = table.insert("a".into(), CreateOptions::default()).await;
        assert_eq!(a, "0");
        assert_eq!(b, "1");

        let other = SessionTable::default();
        assert_eq!(other.insert("c".into(), CreateOptions::default()).await, "0");
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let table = SessionTable::default();
        assert!(matches!(
            table.get("42").await,
            Err(StoreError::SessionNotFound(id)) if id == "42"
        ));
    }
}
