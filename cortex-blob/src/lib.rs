#![deny(missing_docs)]
//! Checkpoint persistence with content-addressed redaction.
//!
//! [`CheckpointSerializer`] walks a state value and externalizes oversize
//! strings, arrays, and objects into a [`BlobStore`], a directory of
//! files named by the sha-256 of their content, leaving a small
//! `{blob, type, size}` handle behind. [`LazyState`] resolves handles on
//! first access when the checkpoint is read back.

pub mod serializer;
pub mod store;

pub use serializer::{CheckpointSerializer, LazyState, is_handle};
pub use store::BlobStore;
