//! Core data models for the staging store.
//!
//! An upload session accumulates bytes until it reaches its declared length;
//! a stored object is the immutable result of finalizing one. Both serialize
//! naturally as JSON via `serde` so a protocol layer can echo them back.

pub mod object;
pub mod upload;

use serde_json::Value;
use std::collections::BTreeMap;

/// Opaque caller-supplied metadata, carried through unchanged.
pub type Metadata = BTreeMap<String, Value>;
