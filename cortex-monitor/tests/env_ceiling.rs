//! Heap-ceiling discovery through the environment knob.
//!
//! Kept in its own test binary so the env mutation runs in a separate
//! process from the other monitor tests.

use std::sync::Arc;

use cortex_monitor::test_utils::ManualSampler;
use cortex_monitor::{AlertLevel, MemoryMonitor, MemorySampler, Metric};
use cortex_types::MonitorConfig;
use cortex_types::config::HEAP_CEILING_ENV;

const MB: u64 = 1024 * 1024;

#[test]
fn env_ceiling_overrides_configured_value() {
    unsafe { std::env::set_var(HEAP_CEILING_ENV, "1024") };

    let sampler = Arc::new(ManualSampler::new());
    // 90% of the 1024 MB env ceiling; only 11% of the configured 8192.
    sampler.set_heap_used(922 * MB);
    let monitor = MemoryMonitor::new(
        MonitorConfig {
            heap_ceiling_mb: 8192,
            ..Default::default()
        },
        Arc::clone(&sampler) as Arc<dyn MemorySampler>,
    );

    let alerts = monitor.poll_now();
    let heap = alerts
        .iter()
        .find(|a| a.metric == Metric::HeapUsed)
        .expect("env-derived ceiling puts 922 MB over threshold");
    assert_eq!(heap.level, AlertLevel::Critical);

    unsafe { std::env::remove_var(HEAP_CEILING_ENV) };

    // A monitor built without the knob derives from the configured value.
    let quiet = MemoryMonitor::new(
        MonitorConfig {
            heap_ceiling_mb: 8192,
            ..Default::default()
        },
        sampler,
    );
    assert!(quiet.poll_now().is_empty());
}
