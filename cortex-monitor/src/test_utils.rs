//! Deterministic sampler for tests. Enabled with the `test-utils` feature.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::SystemTime;

use cortex_types::SamplerError;

use crate::sampler::{MemorySample, MemorySampler};

/// A sampler whose readings are set by the test.
///
/// Supports scripted failure (`fail_next`) and counts reclaim requests so
/// tests can assert the monitor invoked the hook exactly once.
#[derive(Default)]
pub struct ManualSampler {
    sample: Mutex<Option<MemorySample>>,
    fail_remaining: AtomicU64,
    reclaim_supported: AtomicBool,
    reclaim_calls: AtomicU64,
}

impl ManualSampler {
    /// New sampler reporting all-zero memory until set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the next readings.
    pub fn set(&self, sample: MemorySample) {
        *self.sample.lock().expect("sample lock") = Some(sample);
    }

    /// Set only the heap-used reading, zeroing the rest.
    pub fn set_heap_used(&self, heap_used: u64) {
        self.set(MemorySample {
            heap_used,
            ..MemorySample::empty()
        });
    }

    /// Make the next `n` samples fail.
    pub fn fail_next(&self, n: u64) {
        self.fail_remaining.store(n, Ordering::SeqCst);
    }

    /// Whether `force_reclaim` should report a hook as available.
    pub fn support_reclaim(&self, supported: bool) {
        self.reclaim_supported.store(supported, Ordering::SeqCst);
    }

    /// How many times the monitor requested reclamation.
    #[must_use]
    pub fn reclaim_calls(&self) -> u64 {
        self.reclaim_calls.load(Ordering::SeqCst)
    }
}

impl MemorySampler for ManualSampler {
    fn sample(&self) -> Result<MemorySample, SamplerError> {
        let remaining = self.fail_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(SamplerError::Unavailable("scripted failure".into()));
        }
        let sample = self.sample.lock().expect("sample lock");
        Ok(sample.unwrap_or_else(|| MemorySample {
            timestamp: SystemTime::now(),
            ..MemorySample::empty()
        }))
    }

    fn force_reclaim(&self) -> bool {
        self.reclaim_calls.fetch_add(1, Ordering::SeqCst);
        self.reclaim_supported.load(Ordering::SeqCst)
    }
}
