//! Configuration for the bounded structures.
//!
//! Every struct carries the documented defaults and a `validated()` pass
//! that self-corrects invalid combinations back to defaults with a `warn!`
//! log. Configuration errors never propagate.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

const KB: usize = 1024;
const MB: usize = 1024 * 1024;

/// Environment knob for heap-ceiling discovery.
pub const HEAP_CEILING_ENV: &str = "CORTEX_HEAP_CEILING_MB";

/// Default heap ceiling when neither the env knob nor explicit
/// configuration supplies one.
pub const DEFAULT_HEAP_CEILING_MB: u64 = 8192;

/// Read the heap ceiling from the environment, if set and parseable.
#[must_use]
pub fn heap_ceiling_from_env() -> Option<u64> {
    let raw = std::env::var(HEAP_CEILING_ENV).ok()?;
    match raw.trim().parse::<u64>() {
        Ok(mb) if mb > 0 => Some(mb),
        _ => {
            warn!(value = %raw, "ignoring unparseable {HEAP_CEILING_ENV}");
            None
        }
    }
}

/// Bounds for the document cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Total byte budget across all entries.
    pub max_bytes: usize,
    /// Maximum number of entries.
    pub max_entries: usize,
    /// Entries with raw content above this size are stored gzipped.
    pub compress_threshold: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_bytes: 500 * MB,
            max_entries: 1000,
            compress_threshold: MB,
        }
    }
}

impl CacheConfig {
    /// Largest raw entry the cache accepts: 80% of the total budget.
    #[must_use]
    pub fn max_entry_bytes(&self) -> usize {
        self.max_bytes / 5 * 4
    }

    /// Self-correct zero bounds back to defaults.
    #[must_use]
    pub fn validated(self) -> Self {
        if self.max_bytes == 0 || self.max_entries == 0 {
            warn!("cache bounds must be positive, using defaults");
            return Self::default();
        }
        self
    }
}

/// Bounds for the streaming message reducer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageWindowConfig {
    /// Maximum retained message count.
    pub max_messages: usize,
    /// Maximum total byte size of retained messages.
    pub max_total_bytes: usize,
    /// Whether importance-biased retention is applied; when false the
    /// reducer keeps a plain most-recent window.
    pub preserve_important: bool,
}

impl Default for MessageWindowConfig {
    fn default() -> Self {
        Self {
            max_messages: 200,
            max_total_bytes: 50 * MB,
            preserve_important: true,
        }
    }
}

impl MessageWindowConfig {
    /// Self-correct zero bounds back to defaults.
    #[must_use]
    pub fn validated(self) -> Self {
        if self.max_messages == 0 || self.max_total_bytes == 0 {
            warn!("message window bounds must be positive, using defaults");
            return Self::default();
        }
        self
    }
}

/// Bounds and pipeline switches for one bounded string field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundedStringConfig {
    /// Hard per-field byte cap after any write.
    pub max_size: usize,
    /// Fields above this size are gzipped.
    pub compress_threshold: usize,
    /// Fields above this size are summarized first.
    pub summarize_threshold: usize,
    /// Whether summarization runs at all.
    pub summarize: bool,
    /// Whether compression runs at all.
    pub compress: bool,
}

impl Default for BoundedStringConfig {
    fn default() -> Self {
        Self {
            max_size: 50 * MB,
            compress_threshold: 5 * MB,
            summarize_threshold: 30 * MB,
            summarize: true,
            compress: true,
        }
    }
}

impl BoundedStringConfig {
    /// Truncation target when the pipeline still overflows: 80% of the cap.
    #[must_use]
    pub fn truncate_target(&self) -> usize {
        self.max_size / 5 * 4
    }

    /// Self-correct a zero cap back to defaults. Thresholds above the cap
    /// are legal; they simply disable their pipeline stage.
    #[must_use]
    pub fn validated(self) -> Self {
        if self.max_size == 0 {
            warn!("bounded string cap must be positive, using defaults");
            return Self::default();
        }
        self
    }
}

/// Thresholds and cadence for the memory monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Heap ceiling in megabytes; thresholds derive from it.
    pub heap_ceiling_mb: u64,
    /// Sampling cadence.
    pub interval: Duration,
    /// Warning threshold as a fraction of the heap ceiling.
    pub warning_ratio: f64,
    /// Critical threshold as a fraction of the heap ceiling.
    pub critical_ratio: f64,
    /// Whether a critical alert triggers the sampler's reclaim hook.
    pub enable_forced_reclaim: bool,
    /// Ring buffer length for samples.
    pub history_len: usize,
    /// Maximum retained alerts.
    pub alerts_retained: usize,
    /// Consecutive sampler failures before the monitor stops itself.
    pub max_consecutive_failures: u32,
    /// Capacity of the listener dispatch queue (drop-newest on overflow).
    pub listener_queue: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            heap_ceiling_mb: heap_ceiling_from_env().unwrap_or(DEFAULT_HEAP_CEILING_MB),
            interval: Duration::from_secs(5),
            warning_ratio: 0.70,
            critical_ratio: 0.85,
            enable_forced_reclaim: true,
            history_len: 100,
            alerts_retained: 50,
            max_consecutive_failures: 10,
            listener_queue: 64,
        }
    }
}

impl MonitorConfig {
    /// The heap ceiling in effect, in megabytes: the env knob wins over
    /// the configured value, which wins over the built-in default.
    ///
    /// Resolved at the point of use so an explicitly configured ceiling
    /// cannot shadow a host-provided override.
    #[must_use]
    pub fn effective_heap_ceiling_mb(&self) -> u64 {
        heap_ceiling_from_env().unwrap_or(self.heap_ceiling_mb)
    }

    /// Heap ceiling in bytes, after env resolution.
    #[must_use]
    pub fn heap_ceiling_bytes(&self) -> u64 {
        self.effective_heap_ceiling_mb() * 1024 * 1024
    }

    /// Self-correct invalid ratios and cadence back to defaults.
    ///
    /// The warning threshold must be strictly below critical; on
    /// misconfiguration the whole threshold block reverts.
    #[must_use]
    pub fn validated(self) -> Self {
        let defaults = Self::default();
        let mut cfg = self;
        if cfg.warning_ratio >= cfg.critical_ratio
            || cfg.warning_ratio <= 0.0
            || cfg.critical_ratio > 1.0
        {
            warn!(
                warning = cfg.warning_ratio,
                critical = cfg.critical_ratio,
                "monitor thresholds invalid (warning must be < critical), using defaults"
            );
            cfg.warning_ratio = defaults.warning_ratio;
            cfg.critical_ratio = defaults.critical_ratio;
        }
        if cfg.interval.is_zero() {
            warn!("monitor interval must be positive, using default");
            cfg.interval = defaults.interval;
        }
        if cfg.heap_ceiling_mb == 0 {
            warn!("heap ceiling must be positive, using default");
            cfg.heap_ceiling_mb = defaults.heap_ceiling_mb;
        }
        if cfg.history_len == 0 {
            cfg.history_len = defaults.history_len;
        }
        cfg
    }
}

/// Externalization thresholds for the checkpoint serializer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializerConfig {
    /// Strings above this byte size are externalized.
    pub max_string_bytes: usize,
    /// Arrays above this length are externalized.
    pub max_array_len: usize,
    /// Objects above this key count are externalized.
    pub max_object_keys: usize,
    /// Root directory for content-addressed blobs.
    pub blob_dir: PathBuf,
    /// Per-operation I/O timeout.
    pub op_timeout: Duration,
}

impl Default for SerializerConfig {
    fn default() -> Self {
        Self {
            max_string_bytes: 200 * KB,
            max_array_len: 2000,
            max_object_keys: 2000,
            blob_dir: PathBuf::from(".lg-blobs"),
            op_timeout: Duration::from_secs(30),
        }
    }
}

/// Keep-ratios for the context manager's pressure bands.
///
/// The band boundaries (0.60, 0.70, 0.80, 0.90) are fixed; only the
/// keep-ratios inside each band are tunable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PressureTable {
    /// Fraction of recent messages kept in the 0.60–0.70 band.
    pub moderate_keep: f64,
    /// Fraction kept in the 0.70–0.80 band.
    pub elevated_keep: f64,
    /// Fraction kept in the 0.80–0.90 band.
    pub high_keep: f64,
    /// Non-system messages kept verbatim in the emergency band (≥ 0.90).
    pub emergency_recent: usize,
}

impl Default for PressureTable {
    fn default() -> Self {
        Self {
            moderate_keep: 0.70,
            elevated_keep: 0.50,
            high_keep: 0.30,
            emergency_recent: 3,
        }
    }
}

impl PressureTable {
    /// Self-correct out-of-range ratios back to defaults.
    #[must_use]
    pub fn validated(self) -> Self {
        let in_range = |r: f64| r > 0.0 && r < 1.0;
        if !in_range(self.moderate_keep) || !in_range(self.elevated_keep) || !in_range(self.high_keep)
        {
            warn!("pressure keep-ratios out of (0,1), using defaults");
            return Self::default();
        }
        self
    }
}

/// Aggregate configuration for the whole subsystem.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CortexConfig {
    /// Document cache bounds.
    pub cache: CacheConfig,
    /// Message window bounds.
    pub messages: MessageWindowConfig,
    /// Bounded string defaults (per-field overrides live with the manager).
    pub strings: BoundedStringConfig,
    /// Monitor thresholds and cadence.
    pub monitor: MonitorConfig,
    /// Checkpoint serializer thresholds.
    pub serializer: SerializerConfig,
    /// Context pressure keep-ratios.
    pub pressure: PressureTable,
}

impl CortexConfig {
    /// Defaults scaled to a heap ceiling.
    ///
    /// The documented defaults assume an 8192 MB ceiling; smaller ceilings
    /// shrink the byte budgets proportionally (entry counts are unchanged).
    #[must_use]
    pub fn for_heap_ceiling(heap_ceiling_mb: u64) -> Self {
        let mut cfg = Self::default();
        let mb = heap_ceiling_mb.max(1);
        cfg.monitor.heap_ceiling_mb = mb;
        let scale = |bytes: usize| -> usize {
            let scaled = bytes as u128 * mb as u128 / u128::from(DEFAULT_HEAP_CEILING_MB);
            (scaled as usize).max(KB)
        };
        cfg.cache.max_bytes = scale(cfg.cache.max_bytes);
        cfg.messages.max_total_bytes = scale(cfg.messages.max_total_bytes);
        cfg.strings.max_size = scale(cfg.strings.max_size);
        cfg.strings.compress_threshold = scale(cfg.strings.compress_threshold);
        cfg.strings.summarize_threshold = scale(cfg.strings.summarize_threshold);
        cfg
    }

    /// Run every sub-config through its validation pass.
    #[must_use]
    pub fn validated(self) -> Self {
        Self {
            cache: self.cache.validated(),
            messages: self.messages.validated(),
            strings: self.strings.validated(),
            monitor: self.monitor.validated(),
            serializer: self.serializer,
            pressure: self.pressure.validated(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_bounds() {
        let cfg = CortexConfig::default();
        assert_eq!(cfg.cache.max_bytes, 500 * MB);
        assert_eq!(cfg.cache.max_entries, 1000);
        assert_eq!(cfg.messages.max_messages, 200);
        assert_eq!(cfg.strings.max_size, 50 * MB);
        assert_eq!(cfg.serializer.max_string_bytes, 200 * KB);
        assert_eq!(cfg.serializer.max_array_len, 2000);
    }

    #[test]
    fn monitor_validation_corrects_inverted_thresholds() {
        let cfg = MonitorConfig {
            warning_ratio: 0.9,
            critical_ratio: 0.8,
            ..Default::default()
        }
        .validated();
        assert!(cfg.warning_ratio < cfg.critical_ratio);
        assert_eq!(cfg.warning_ratio, 0.70);
    }

    #[test]
    fn cache_validation_rejects_zero_bounds() {
        let cfg = CacheConfig {
            max_bytes: 0,
            ..Default::default()
        }
        .validated();
        assert_eq!(cfg.max_bytes, CacheConfig::default().max_bytes);
    }

    #[test]
    fn max_entry_bytes_is_80_percent() {
        let cfg = CacheConfig {
            max_bytes: 1000,
            ..Default::default()
        };
        assert_eq!(cfg.max_entry_bytes(), 800);
    }

    #[test]
    fn scaled_defaults_shrink_with_ceiling() {
        let half = CortexConfig::for_heap_ceiling(DEFAULT_HEAP_CEILING_MB / 2);
        assert_eq!(half.cache.max_bytes, 250 * MB);
        assert_eq!(half.messages.max_total_bytes, 25 * MB);
        // Counts stay put.
        assert_eq!(half.messages.max_messages, 200);
    }

    #[test]
    fn env_knob_overrides_configured_ceiling() {
        unsafe { std::env::set_var(HEAP_CEILING_ENV, "1024") };
        let cfg = MonitorConfig {
            heap_ceiling_mb: 8192,
            ..Default::default()
        };
        assert_eq!(cfg.effective_heap_ceiling_mb(), 1024);
        assert_eq!(cfg.heap_ceiling_bytes(), 1024 * 1024 * 1024);
        unsafe { std::env::remove_var(HEAP_CEILING_ENV) };
        assert_eq!(cfg.effective_heap_ceiling_mb(), 8192);
    }

    #[test]
    fn pressure_table_validation() {
        let table = PressureTable {
            moderate_keep: 1.5,
            ..Default::default()
        }
        .validated();
        assert_eq!(table.moderate_keep, 0.70);
    }
}
