#![deny(missing_docs)]
//! Syntax-aware truncation for the cortex agent-memory subsystem.
//!
//! [`Truncator::truncate`] reduces text to a byte budget while keeping the
//! output parseable for structured content: JSON stays valid JSON, code
//! keeps only complete top-level declarations or comment stubs, directory
//! trees keep their shallow structure. [`repair`] validates and repairs
//! malformed JSON and finds safe cut points inside large documents.

pub mod detect;
pub mod repair;
pub mod truncate;

mod code;
mod json;
mod tree;

pub use detect::ContentType;
pub use repair::{JsonCheck, SafeCut, safe_truncation_point, validate_and_fix};
pub use truncate::{TruncateConfig, TruncateMethod, Truncated, Truncator};
