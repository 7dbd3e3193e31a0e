//! In-memory staging store for resumable, chunked uploads.
//!
//! A protocol layer maps its requests onto four operations:
//! - `create` allocates an upload session for a target key
//! - `info` reports the resumption offset of a session
//! - `append` pushes a byte range at the expected offset and finalizes the
//!   upload once its declared length is reached
//! - `create_read_stream` streams a finalized object back by key

pub mod errors;
pub mod models;
pub mod services;

pub use errors::{HookError, StoreError, StoreResult};
pub use models::{
    Metadata,
    object::ObjectInfo,
    upload::{AppendOutcome, CreateOptions, CreatedUpload, UploadInfo},
};
pub use services::append_pipeline::ByteStream;
pub use services::upload_store::{AppendOptions, BeforeComplete, OnInfo, ReadStream, UploadStore};
