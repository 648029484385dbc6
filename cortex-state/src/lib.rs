#![deny(missing_docs)]
//! Bounded, self-pruning state structures for long-running agents.
//!
//! Three reducers keep graph state inside fixed budgets:
//!
//! - [`DocumentCache`]: an LRU, byte- and entry-capped cache for fetched
//!   documents, with transparent gzip for large entries.
//! - [`BoundedStringManager`]: per-field summarize, compress, truncate
//!   pipeline for large text fields such as codebase trees and notes.
//! - [`reduce_messages`]: a sliding window with importance-biased
//!   retention over the agent's message log.
//!
//! All three are synchronous pure state transitions: given the same
//! previous value and update they produce the same result, and their
//! declared bounds hold after every write.

pub mod cache;
pub mod messages;
pub mod strings;

mod summarize;

pub use cache::{CacheStats, CacheWrite, DocumentCache, SnapshotEntry};
pub use messages::{importance, reduce_messages};
pub use strings::{BoundedString, BoundedStringManager, FieldKind};
