#![deny(missing_docs)]
//! Core types shared by the cortex agent-memory crates.
//!
//! Provides the conversation data model ([`Message`], [`ToolCall`]), byte
//! accounting ([`ByteCounter`]), gzip helpers, configuration structs with
//! self-correcting validation, and the error enums used across the
//! workspace.

pub mod compress;
pub mod config;
pub mod error;
pub mod message;
pub mod size;

pub use config::{
    BoundedStringConfig, CacheConfig, CortexConfig, MessageWindowConfig, MonitorConfig,
    PressureTable, SerializerConfig,
};
pub use error::{BlobError, CheckpointError, MonitorError, SamplerError, TruncateError};
pub use message::{Content, Message, Role, ToolCall};
pub use size::ByteCounter;
