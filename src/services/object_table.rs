//! Object Table: finalized payloads addressed by key.

use crate::{
    errors::{StoreError, StoreResult},
    models::object::StoredObject,
};
use bytes::Bytes;
use futures::{Stream, stream};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Clone, Default)]
pub struct ObjectTable {
    objects: Arc<RwLock<HashMap<String, StoredObject>>>,
}

impl ObjectTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.objects.read().await.contains_key(key)
    }

    pub async fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.read().await.get(key).cloned()
    }

    /// Store `object` under `key`, replacing whatever was there.
    pub async fn put(&self, key: String, object: StoredObject) {
        let replaced = self.objects.write().await.insert(key.clone(), object);
        if replaced.is_some() {
            debug!(%key, "replaced existing object");
        }
    }

    /// Lazy stream over the payload stored under `key`.
    ///
    /// The table is consulted on first poll, not when the stream is built.
    pub fn read_stream(&self, key: String) -> impl Stream<Item = StoreResult<Bytes>> + Send + 'static {
        let table = self.clone();
        stream::once(async move {
            match table.get(&key).await {
                Some(object) => Ok(object.data),
                None => Err(StoreError::KeyNotFound(key)),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn object(data: &'static [u8]) -> StoredObject {
        StoredObject {
            data: Bytes::from_static(data),
            metadata: None,
        }
    }

    #[tokio::test]
    async fn later_put_replaces_earlier() {
        let table = ObjectTable::new();
        table.put("k".into(), object(b"first")).await;
        table.put("k".into(), object(b"second")).await;
        let stored = table.get("k").await.expect("object");
        assert_eq!(&stored.data[..], b"second");
    }

    #[tokio::test]
    async fn read_stream_checks_at_poll_time() {
        let table = ObjectTable::new();
        let mut reader = Box::pin(table.read_stream("late".into()));
        table.put("late".into(), object(b"payload")).await;

        let chunk = reader.next().await.expect("chunk").expect("payload");
        assert_eq!(&chunk[..], b"payload");
        assert!(reader.next().await.is_none());
    }

    #[tokio::test]
    async fn read_stream_missing_key() {
        let table = ObjectTable::new();
        let mut reader = Box::pin(table.read_stream("nope".into()));
        match reader.next().await {
            Some(Err(StoreError::KeyNotFound(key))) => assert_eq!(key, "nope"),
            other => panic!("expected KeyNotFound, got {other:?}"),
        }
    }
}
