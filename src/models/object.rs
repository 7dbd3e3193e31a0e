//! Represents a finalized object held in the Object Table.

use super::Metadata;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Immutable payload created by the finalize transition.
///
/// A later finalize under the same key replaces the whole entry.
#[derive(Clone, Debug)]
pub struct StoredObject {
    /// Complete byte payload, copied out of the session at finalize time.
    pub data: Bytes,

    /// Snapshot of the session metadata at finalize time.
    pub metadata: Option<Metadata>,
}

/// Delivered to read-path observers before the payload is streamed.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ObjectInfo {
    pub content_length: u64,

    /// Empty when the upload carried no metadata.
    pub metadata: Metadata,
}

impl StoredObject {
    pub fn info(&self) -> ObjectInfo {
        ObjectInfo {
            content_length: self.data.len() as u64,
            metadata: self.metadata.clone().unwrap_or_default(),
        }
    }
}
