//! The sampling seam between the monitor and the host runtime.

use std::sync::Mutex;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use sysinfo::{ProcessesToUpdate, System};

use cortex_types::SamplerError;

/// One observation of process memory, all values in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemorySample {
    /// Resident set size.
    pub rss: u64,
    /// Heap bytes in use.
    pub heap_used: u64,
    /// Total heap bytes reserved.
    pub heap_total: u64,
    /// Memory held outside the heap (mapped files, native buffers).
    pub external: u64,
    /// Bytes held by array buffers, when the runtime distinguishes them.
    pub array_buffers: u64,
    /// When the sample was taken.
    pub timestamp: SystemTime,
}

impl MemorySample {
    /// Zeroed sample stamped now; a placeholder, never a real observation.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            rss: 0,
            heap_used: 0,
            heap_total: 0,
            external: 0,
            array_buffers: 0,
            timestamp: SystemTime::now(),
        }
    }
}

/// Memory pressure ρ: heap in use over the heap ceiling, clamped to [0, 1].
#[must_use]
pub fn pressure(sample: &MemorySample, heap_ceiling_bytes: u64) -> f64 {
    if heap_ceiling_bytes == 0 {
        return 0.0;
    }
    (sample.heap_used as f64 / heap_ceiling_bytes as f64).clamp(0.0, 1.0)
}

/// How the monitor observes memory and requests reclamation.
///
/// Implementations are host-provided; the monitor never assumes more than
/// this interface. `force_reclaim` returns whether the runtime exposed a
/// reclamation hook at all.
pub trait MemorySampler: Send + Sync {
    /// Take one memory sample.
    fn sample(&self) -> Result<MemorySample, SamplerError>;

    /// Ask the runtime to release memory. Default: no hook available.
    fn force_reclaim(&self) -> bool {
        false
    }
}

/// Default sampler reading resident-set metrics for the current process.
///
/// Runtimes without heap introspection report `heap_used = rss`; the
/// `external` share is approximated as virtual minus resident memory, and
/// `array_buffers` is always zero. Hosts that can do better should.
pub struct ProcessSampler {
    system: Mutex<System>,
    pid: sysinfo::Pid,
}

impl ProcessSampler {
    /// Create a sampler bound to the current process.
    pub fn new() -> Result<Self, SamplerError> {
        let pid = sysinfo::get_current_pid().map_err(|e| SamplerError::Unavailable(e.into()))?;
        Ok(Self {
            system: Mutex::new(System::new()),
            pid,
        })
    }
}

impl MemorySampler for ProcessSampler {
    fn sample(&self) -> Result<MemorySample, SamplerError> {
        let mut system = self
            .system
            .lock()
            .map_err(|_| SamplerError::Unavailable("sampler lock poisoned".into()))?;
        system.refresh_memory();
        system.refresh_processes(ProcessesToUpdate::Some(&[self.pid]), true);
        let process = system
            .process(self.pid)
            .ok_or_else(|| SamplerError::Unavailable("current process not visible".into()))?;

        let rss = process.memory();
        let virt = process.virtual_memory();
        Ok(MemorySample {
            rss,
            heap_used: rss,
            heap_total: system.total_memory(),
            external: virt.saturating_sub(rss),
            array_buffers: 0,
            timestamp: SystemTime::now(),
        })
    }
}
