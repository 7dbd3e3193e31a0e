//! src/services/upload_store.rs
//!
//! UploadStore — resumable, chunked uploads staged in process memory. A
//! caller creates a session, appends byte ranges at the offset already
//! received, and once the declared length is reached the accumulated bytes
//! are promoted into the Object Table under the session's key.
//!
//! All state is owned by the store instance; clones share it, separate
//! instances never do.

use crate::{
    errors::{HookError, StoreError, StoreResult},
    models::{
        object::{ObjectInfo, StoredObject},
        upload::{AppendOutcome, CreateOptions, CreatedUpload, UploadInfo, UploadSession},
    },
    services::{
        append_pipeline::{BoundedStream, ByteStream, Drained, drain},
        object_table::ObjectTable,
        session_table::SessionTable,
    },
};
use bytes::Bytes;
use futures::{FutureExt, Stream, future::BoxFuture};
use std::{future::Future, io, pin::Pin, sync::Arc};
use tracing::{debug, warn};

/// Hook run before a completed upload is promoted to the Object Table.
///
/// Receives the session snapshot and the upload id. An error aborts the
/// promotion and is returned to the append caller.
pub type BeforeComplete =
    Arc<dyn Fn(UploadInfo, String) -> BoxFuture<'static, Result<(), HookError>> + Send + Sync>;

/// Observer for `create_read_stream`.
pub type OnInfo = Box<dyn FnOnce(ObjectInfo) + Send>;

/// Stream returned by `create_read_stream`.
pub type ReadStream = Pin<Box<dyn Stream<Item = StoreResult<Bytes>> + Send>>;

#[derive(Clone, Default)]
pub struct AppendOptions {
    before_complete: Option<BeforeComplete>,
}

impl AppendOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn before_complete<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(UploadInfo, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HookError>> + Send + 'static,
    {
        self.before_complete = Some(Arc::new(move |info, upload_id| {
            hook(info, upload_id).boxed()
        }));
        self
    }
}

#[derive(Clone, Default)]
pub struct UploadStore {
    sessions: SessionTable,
    objects: ObjectTable,
}

impl UploadStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new upload session targeting `key`.
    pub async fn create(&self, key: impl Into<String>, options: CreateOptions) -> CreatedUpload {
        let key = key.into();
        let upload_length = options.upload_length;
        let upload_id = self.sessions.insert(key.clone(), options).await;
        debug!(%upload_id, %key, ?upload_length, "created upload");
        CreatedUpload { upload_id }
    }

    /// Current offset, key, declared length and metadata of an upload.
    ///
    /// An upload that has received all of its bytes but was never finalized
    /// reports one byte less than it holds, so the client re-sends the last
    /// byte and the next append drives the finalize.
    pub async fn info(&self, upload_id: &str) -> StoreResult<UploadInfo> {
        let session = self.sessions.get(upload_id).await?;
        Ok(self.describe(&session).await)
    }

    /// Push bytes from `stream` into an upload.
    ///
    /// When `expected_offset` is given it must match the bytes already
    /// received. No more than the remaining declared length is accepted.
    /// On error, bytes already read from the stream stay committed to the
    /// session and the caller should re-query `info` before resuming.
    pub async fn append<S>(
        &self,
        upload_id: &str,
        stream: S,
        expected_offset: Option<u64>,
        options: AppendOptions,
    ) -> StoreResult<AppendOutcome>
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        let session = self.sessions.get(upload_id).await?;
        let _writer = match session.writer.try_lock() {
            Ok(guard) => guard,
            Err(_) => return Err(self.locked_error(&session, upload_id, expected_offset).await),
        };

        let old_offset = session.offset().await;
        if self.awaiting_finalize(&session, old_offset).await {
            let resend_offset = old_offset.checked_sub(1);
            if expected_offset.is_none() || expected_offset == resend_offset {
                debug!(%upload_id, "upload fully received but not finalized");
                return self.complete(&session, upload_id, &options).await;
            }
        }

        if let Some(expected) = expected_offset {
            if expected != old_offset {
                return Err(StoreError::OffsetMismatch {
                    actual: old_offset,
                    expected,
                });
            }
        }

        debug!(%upload_id, offset = old_offset, "appending");
        let inbound: ByteStream = Box::pin(stream);
        let bounded = BoundedStream::new(inbound, session.remaining(old_offset));
        let Drained { bytes, error } = drain(bounded).await;

        let new_offset = {
            let mut data = session.data.write().await;
            data.extend_from_slice(&bytes);
            data.len() as u64
        };
        debug!(%upload_id, received = bytes.len(), offset = new_offset, "committed bytes");

        if let Some(err) = error {
            warn!(%upload_id, offset = new_offset, "append stopped early: {}", err);
            return Err(err);
        }

        if session.upload_length == Some(new_offset) {
            return self.complete(&session, upload_id, &options).await;
        }

        Ok(AppendOutcome {
            offset: new_offset,
            upload: self.describe(&session).await,
        })
    }

    /// Stream the finalized object stored under `key`.
    ///
    /// `on_info` runs once on a separate task, after the caller yields, and
    /// only if an object exists under `key` at that moment. The returned
    /// stream fails with `KeyNotFound` if there is no object when it is read.
    /// Must be called from within a tokio runtime.
    pub fn create_read_stream(&self, key: impl Into<String>, on_info: Option<OnInfo>) -> ReadStream {
        let key = key.into();
        if let Some(on_info) = on_info {
            let objects = self.objects.clone();
            let key = key.clone();
            tokio::spawn(async move {
                tokio::task::yield_now().await;
                if let Some(object) = objects.get(&key).await {
                    on_info(object.info());
                }
            });
        }
        Box::pin(self.objects.read_stream(key))
    }

    /// Content length and metadata of the object stored under `key`.
    pub async fn object_info(&self, key: &str) -> StoreResult<ObjectInfo> {
        self.objects
            .get(key)
            .await
            .map(|object| object.info())
            .ok_or_else(|| StoreError::KeyNotFound(key.to_string()))
    }

    /// Error for an append that found the writer guard taken.
    ///
    /// The in-flight append commits only when it finishes, so the offset read
    /// here is stable. A wrong `expected_offset` is still a mismatch; a
    /// recovery resend waits for the guard like any other append.
    async fn locked_error(
        &self,
        session: &UploadSession,
        upload_id: &str,
        expected_offset: Option<u64>,
    ) -> StoreError {
        let offset = session.offset().await;
        if let Some(expected) = expected_offset {
            let resend = self.awaiting_finalize(session, offset).await
                && offset.checked_sub(1) == Some(expected);
            if expected != offset && !resend {
                return StoreError::OffsetMismatch {
                    actual: offset,
                    expected,
                };
            }
        }
        StoreError::UploadLocked(upload_id.to_string())
    }

    async fn describe(&self, session: &UploadSession) -> UploadInfo {
        let offset = session.offset().await;
        if self.awaiting_finalize(session, offset).await {
            return session.describe(offset.saturating_sub(1));
        }
        session.describe(offset)
    }

    /// True when the session holds its full declared length but nothing has
    /// been stored under its key yet.
    async fn awaiting_finalize(&self, session: &UploadSession, offset: u64) -> bool {
        session.upload_length == Some(offset) && !self.objects.contains(&session.key).await
    }

    /// Run the hook, then copy the session's bytes into the Object Table.
    async fn complete(
        &self,
        session: &UploadSession,
        upload_id: &str,
        options: &AppendOptions,
    ) -> StoreResult<AppendOutcome> {
        debug!(%upload_id, key = %session.key, "completing upload");
        if let Some(hook) = &options.before_complete {
            let snapshot = session.describe(session.offset().await);
            if let Err(err) = hook(snapshot, upload_id.to_string()).await {
                warn!(%upload_id, "before-complete hook rejected upload: {}", err);
                return Err(StoreError::Hook(err));
            }
        }

        let data = Bytes::copy_from_slice(&session.data.read().await);
        let offset = data.len() as u64;
        let object = StoredObject {
            data,
            metadata: session.metadata.clone(),
        };
        self.objects.put(session.key.clone(), object).await;

        Ok(AppendOutcome {
            offset,
            upload: self.describe(session).await,
        })
    }
}
