#![deny(missing_docs)]
//! Process memory watchdog for the cortex agent-memory subsystem.
//!
//! [`MemoryMonitor`] samples process memory on a fixed cadence, keeps a
//! ring buffer of recent samples, raises tiered [`Alert`]s when metrics
//! cross thresholds derived from the configured heap ceiling, and on
//! critical pressure asks the sampler's reclaim hook to shrink.
//!
//! The monitor depends only on the small [`MemorySampler`] seam; hosts
//! with real heap introspection provide their own implementation, and
//! [`ProcessSampler`] covers the common case from resident-set metrics.

pub mod monitor;
pub mod sampler;

#[cfg(feature = "test-utils")]
pub mod test_utils;

pub use monitor::{Alert, AlertLevel, ListenerHandle, MemoryMonitor, Metric, MonitorStats};
pub use sampler::{MemorySample, MemorySampler, ProcessSampler, pressure};
