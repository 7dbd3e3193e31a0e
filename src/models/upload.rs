//! Represents an in-flight upload session and the views callers get of it.

use super::Metadata;
use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

/// Options accepted when an upload session is created.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct CreateOptions {
    /// Total byte count the uploader commits to. `None` means unbounded.
    pub upload_length: Option<u64>,

    /// Caller metadata copied onto the finished object.
    pub metadata: Option<Metadata>,
}

impl CreateOptions {
    pub fn with_length(mut self, upload_length: u64) -> Self {
        self.upload_length = Some(upload_length);
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Returned by `create`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CreatedUpload {
    pub upload_id: String,
}

/// Snapshot of an upload session as reported by `info`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct UploadInfo {
    /// Resumption point. One less than the true offset while a fully
    /// received upload is still waiting to be finalized.
    pub offset: u64,

    /// Key the finished object will be stored under.
    pub key: String,

    pub upload_length: Option<u64>,

    pub metadata: Option<Metadata>,
}

/// Result of a successful append.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AppendOutcome {
    /// True number of bytes held by the session after the append.
    pub offset: u64,

    pub upload: UploadInfo,
}

/// Session Table entry.
///
/// The descriptive fields never change after creation. `data` only grows and
/// `writer` is the single-writer guard held for the whole of an append.
#[derive(Debug)]
pub(crate) struct UploadSession {
    pub key: String,
    pub upload_length: Option<u64>,
    pub metadata: Option<Metadata>,
    pub data: RwLock<BytesMut>,
    pub writer: Mutex<()>,
}

impl UploadSession {
    pub fn new(key: String, options: CreateOptions) -> Self {
        Self {
            key,
            upload_length: options.upload_length,
            metadata: options.metadata,
            data: RwLock::new(BytesMut::new()),
            writer: Mutex::new(()),
        }
    }

    /// Number of bytes received so far.
    pub async fn offset(&self) -> u64 {
        self.data.read().await.len() as u64
    }

    /// Bytes still accepted before the declared length is reached.
    pub fn remaining(&self, offset: u64) -> Option<u64> {
        self.upload_length
            .map(|length| length.saturating_sub(offset))
    }

    /// Builds the `info` view for a given reported offset.
    pub fn describe(&self, offset: u64) -> UploadInfo {
        UploadInfo {
            offset,
            key: self.key.clone(),
            upload_length: self.upload_length,
            metadata: self.metadata.clone(),
        }
    }
}
