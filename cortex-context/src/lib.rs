#![deny(missing_docs)]
//! Intelligent prompt compaction for long-running agents.
//!
//! [`ToolCallAnalyzer`] classifies tool calls as essential, important, or
//! routine from configured pattern tables. [`ContextManager`] uses that
//! classification under memory pressure to rewrite the prompt before an
//! LLM call: essential history survives verbatim, the rest folds into one
//! structured summary message, and recent messages pass through.

pub mod analyzer;
pub mod manager;

pub use analyzer::{
    AnalyzedCall, AnalyzerConfig, Classification, Criticality, KeyElements, ToolAnalysis,
    ToolCallAnalyzer,
};
pub use manager::{AdaptReport, ContextManager, PressureBand, ProviderFormat};
