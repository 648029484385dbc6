//! The memory monitor: ring buffer, tiered alerts, reclamation.

use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use cortex_types::{MonitorConfig, MonitorError};

use crate::sampler::{MemorySample, MemorySampler};

/// External memory gets this share of the heap ceiling as its warning and
/// critical thresholds.
const EXTERNAL_SHARES: (f64, f64) = (0.30, 0.50);
/// Array buffers get this share of the heap ceiling.
const ARRAY_BUFFER_SHARES: (f64, f64) = (0.20, 0.30);

/// Alert severity tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertLevel {
    /// A metric crossed its warning threshold.
    Warning,
    /// A metric crossed its critical threshold.
    Critical,
}

/// The metric an alert or trend query refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Metric {
    /// Resident set size.
    Rss,
    /// Heap bytes in use.
    HeapUsed,
    /// Memory held outside the heap.
    External,
    /// Array-buffer bytes.
    ArrayBuffers,
    /// The sampler itself (used by the failure-stop alert).
    Sampler,
}

impl Metric {
    /// Stable name for logs and messages.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Rss => "rss",
            Metric::HeapUsed => "heap-used",
            Metric::External => "external",
            Metric::ArrayBuffers => "array-buffers",
            Metric::Sampler => "sampler",
        }
    }

    fn read(&self, sample: &MemorySample) -> u64 {
        match self {
            Metric::Rss => sample.rss,
            Metric::HeapUsed => sample.heap_used,
            Metric::External => sample.external,
            Metric::ArrayBuffers => sample.array_buffers,
            Metric::Sampler => 0,
        }
    }
}

/// A threshold crossing observed during one sample tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    /// Severity tier.
    pub level: AlertLevel,
    /// The metric that crossed.
    pub metric: Metric,
    /// Observed value in bytes.
    pub value: u64,
    /// The threshold that was crossed, in bytes.
    pub threshold: u64,
    /// Human-readable description.
    pub message: String,
    /// When the underlying sample was taken.
    pub timestamp: SystemTime,
}

/// Counters exposed by [`MemoryMonitor::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorStats {
    /// Successful samples taken.
    pub samples_taken: u64,
    /// Alerts generated (whether or not any listener saw them).
    pub alerts_emitted: u64,
    /// Alerts dropped because the listener queue was full.
    pub alerts_dropped: u64,
    /// Listener callbacks that panicked and were swallowed.
    pub listener_failures: u64,
    /// Times the sampler's reclaim hook was invoked.
    pub reclaims_requested: u64,
    /// Current run of consecutive sampler failures.
    pub consecutive_failures: u32,
    /// Whether the sampling task is running.
    pub running: bool,
}

/// Handle returned by [`MemoryMonitor::subscribe`]; pass to `unsubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerHandle(u64);

type Listener = Arc<dyn Fn(&Alert) + Send + Sync>;

struct MonitorState {
    history: VecDeque<MemorySample>,
    alerts: VecDeque<Alert>,
    consecutive_failures: u32,
    samples_taken: u64,
    alerts_emitted: u64,
}

struct Inner {
    cfg: MonitorConfig,
    /// Heap ceiling resolved (env knob over configured value) once at
    /// construction, so thresholds stay stable for the monitor's life.
    ceiling_bytes: u64,
    sampler: Arc<dyn MemorySampler>,
    state: Mutex<MonitorState>,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_listener_id: AtomicU64,
    alert_tx: Mutex<Option<tokio::sync::mpsc::Sender<Alert>>>,
    cancel: Mutex<Option<CancellationToken>>,
    running: AtomicBool,
    /// Serializes listener delivery against `stop()`: the dispatcher
    /// holds this while notifying, and `stop()` acquires it after
    /// clearing `running` so no listener fires once `stop()` returns.
    dispatch_gate: Mutex<()>,
    alerts_dropped: AtomicU64,
    listener_failures: AtomicU64,
    reclaims_requested: AtomicU64,
}

/// Process-wide memory watchdog.
///
/// One instance per process, created during bootstrap and passed to the
/// components that need pressure information. Cloning shares the instance.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use cortex_monitor::{MemoryMonitor, ProcessSampler};
/// use cortex_types::MonitorConfig;
///
/// # async fn run() {
/// let sampler = Arc::new(ProcessSampler::new().unwrap());
/// let monitor = MemoryMonitor::new(MonitorConfig::default(), sampler);
/// monitor.subscribe(|alert| eprintln!("{}", alert.message));
/// monitor.start();
/// # }
/// ```
#[derive(Clone)]
pub struct MemoryMonitor {
    inner: Arc<Inner>,
}

impl MemoryMonitor {
    /// Create a monitor over the given sampler. The configuration is
    /// validated; invalid thresholds self-correct to defaults.
    #[must_use]
    pub fn new(cfg: MonitorConfig, sampler: Arc<dyn MemorySampler>) -> Self {
        let cfg = cfg.validated();
        let ceiling_bytes = cfg.heap_ceiling_bytes();
        Self {
            inner: Arc::new(Inner {
                cfg,
                ceiling_bytes,
                sampler,
                state: Mutex::new(MonitorState {
                    history: VecDeque::new(),
                    alerts: VecDeque::new(),
                    consecutive_failures: 0,
                    samples_taken: 0,
                    alerts_emitted: 0,
                }),
                listeners: Mutex::new(Vec::new()),
                next_listener_id: AtomicU64::new(1),
                alert_tx: Mutex::new(None),
                cancel: Mutex::new(None),
                running: AtomicBool::new(false),
                dispatch_gate: Mutex::new(()),
                alerts_dropped: AtomicU64::new(0),
                listener_failures: AtomicU64::new(0),
                reclaims_requested: AtomicU64::new(0),
            }),
        }
    }

    /// Begin background sampling. Idempotent: a second call warns and
    /// does nothing.
    pub fn start(&self) {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            warn!("memory monitor already running, ignoring start()");
            return;
        }

        let cancel = CancellationToken::new();
        let (tx, mut rx) = tokio::sync::mpsc::channel::<Alert>(self.inner.cfg.listener_queue);
        *self.inner.alert_tx.lock().expect("alert_tx lock") = Some(tx);
        *self.inner.cancel.lock().expect("cancel lock") = Some(cancel.clone());

        // Dispatcher: drains the alert queue so a slow listener never
        // blocks the sampler.
        let dispatch_inner = Arc::clone(&self.inner);
        let dispatch_cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = dispatch_cancel.cancelled() => break,
                    alert = rx.recv() => {
                        let Some(alert) = alert else { break };
                        // Deliver under the gate, re-checking this
                        // start's cancellation token: an alert queued
                        // just before stop() must not reach listeners
                        // after stop() returns, even across a restart.
                        let _gate = dispatch_inner
                            .dispatch_gate
                            .lock()
                            .expect("dispatch gate");
                        if dispatch_cancel.is_cancelled() {
                            break;
                        }
                        dispatch_inner.notify_listeners(&alert);
                    }
                }
            }
        });

        // Sampler: one tick per interval.
        let sample_inner = Arc::clone(&self.inner);
        let monitor = self.clone();
        let interval = self.inner.cfg.interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        monitor.poll_now();
                        if !sample_inner.running.load(Ordering::SeqCst) {
                            break;
                        }
                    }
                }
            }
        });
        debug!(interval_ms = interval.as_millis() as u64, "memory monitor started");
    }

    /// Halt sampling. No alert is delivered after this returns: queued
    /// alerts are discarded, and an in-flight listener call is waited
    /// out before returning. Must not be called from inside a listener.
    pub fn stop(&self) {
        self.inner.running.store(false, Ordering::SeqCst);
        if let Some(cancel) = self.inner.cancel.lock().expect("cancel lock").take() {
            cancel.cancel();
        }
        self.inner.alert_tx.lock().expect("alert_tx lock").take();
        // The dispatcher delivers under this gate and re-checks the stop
        // flag while holding it; acquiring it here means any delivery
        // that raced the flag has finished, and none can start after.
        drop(self.inner.dispatch_gate.lock().expect("dispatch gate"));
        debug!("memory monitor stopped");
    }

    /// Take a fresh sample without recording it in the ring buffer.
    pub fn current(&self) -> Result<MemorySample, MonitorError> {
        Ok(self.inner.sampler.sample()?)
    }

    /// Copy of the sample ring buffer, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<MemorySample> {
        self.inner
            .state
            .lock()
            .expect("state lock")
            .history
            .iter()
            .copied()
            .collect()
    }

    /// Recently generated alerts, oldest first.
    #[must_use]
    pub fn recent_alerts(&self) -> Vec<Alert> {
        self.inner
            .state
            .lock()
            .expect("state lock")
            .alerts
            .iter()
            .cloned()
            .collect()
    }

    /// Signed byte delta of a metric over the last `window` samples.
    /// Returns 0 when the buffer holds fewer than `window` samples.
    #[must_use]
    pub fn trend(&self, metric: Metric, window: usize) -> i64 {
        let state = self.inner.state.lock().expect("state lock");
        if window < 2 || state.history.len() < window {
            return 0;
        }
        let newest = metric.read(state.history.back().expect("non-empty history"));
        let oldest = metric.read(&state.history[state.history.len() - window]);
        i64::try_from(i128::from(newest) - i128::from(oldest)).unwrap_or(i64::MAX)
    }

    /// Register an alert listener. Listeners run on the dispatcher task;
    /// panics are swallowed and counted.
    pub fn subscribe<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(&Alert) + Send + Sync + 'static,
    {
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::SeqCst);
        self.inner
            .listeners
            .lock()
            .expect("listeners lock")
            .push((id, Arc::new(listener)));
        ListenerHandle(id)
    }

    /// Remove a previously registered listener.
    pub fn unsubscribe(&self, handle: ListenerHandle) {
        self.inner
            .listeners
            .lock()
            .expect("listeners lock")
            .retain(|(id, _)| *id != handle.0);
    }

    /// Invoke the sampler's reclaim hook directly.
    pub fn force_reclaim(&self) -> bool {
        self.inner.reclaims_requested.fetch_add(1, Ordering::SeqCst);
        self.inner.sampler.force_reclaim()
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> MonitorStats {
        let state = self.inner.state.lock().expect("state lock");
        MonitorStats {
            samples_taken: state.samples_taken,
            alerts_emitted: state.alerts_emitted,
            alerts_dropped: self.inner.alerts_dropped.load(Ordering::SeqCst),
            listener_failures: self.inner.listener_failures.load(Ordering::SeqCst),
            reclaims_requested: self.inner.reclaims_requested.load(Ordering::SeqCst),
            consecutive_failures: state.consecutive_failures,
            running: self.inner.running.load(Ordering::SeqCst),
        }
    }

    /// Run one sample/alert cycle synchronously and return the alerts
    /// generated this tick. The background task calls this per interval;
    /// tests drive it directly for determinism.
    pub fn poll_now(&self) -> Vec<Alert> {
        let sample = match self.inner.sampler.sample() {
            Ok(sample) => sample,
            Err(err) => return self.record_failure(&err.to_string()),
        };

        let mut alerts = Vec::new();
        for metric in [Metric::HeapUsed, Metric::External, Metric::ArrayBuffers] {
            let (warning, critical) = self.thresholds(metric);
            let value = metric.read(&sample);
            // At exactly the critical threshold only the critical alert
            // fires; warning is subsumed.
            let tier = if value >= critical {
                Some((AlertLevel::Critical, critical))
            } else if value >= warning {
                Some((AlertLevel::Warning, warning))
            } else {
                None
            };
            if let Some((level, threshold)) = tier {
                alerts.push(Alert {
                    level,
                    metric,
                    value,
                    threshold,
                    message: format!(
                        "{} at {} bytes crossed {:?} threshold {}",
                        metric.as_str(),
                        value,
                        level,
                        threshold
                    ),
                    timestamp: sample.timestamp,
                });
            }
        }

        let any_critical = alerts.iter().any(|a| a.level == AlertLevel::Critical);

        {
            let mut state = self.inner.state.lock().expect("state lock");
            state.consecutive_failures = 0;
            state.samples_taken += 1;
            state.history.push_back(sample);
            while state.history.len() > self.inner.cfg.history_len {
                state.history.pop_front();
            }
            self.record_alerts(&mut state, &alerts);
        }

        if any_critical && self.inner.cfg.enable_forced_reclaim {
            let had_hook = self.force_reclaim();
            debug!(had_hook, "critical pressure, requested reclaim");
        }

        for alert in &alerts {
            match alert.level {
                AlertLevel::Critical => error!(metric = alert.metric.as_str(), value = alert.value, "{}", alert.message),
                AlertLevel::Warning => warn!(metric = alert.metric.as_str(), value = alert.value, "{}", alert.message),
            }
            self.enqueue(alert.clone());
        }
        alerts
    }

    fn thresholds(&self, metric: Metric) -> (u64, u64) {
        let ceiling = self.inner.ceiling_bytes as f64;
        let (warn_share, crit_share) = match metric {
            Metric::External => EXTERNAL_SHARES,
            Metric::ArrayBuffers => ARRAY_BUFFER_SHARES,
            _ => (self.inner.cfg.warning_ratio, self.inner.cfg.critical_ratio),
        };
        ((ceiling * warn_share) as u64, (ceiling * crit_share) as u64)
    }

    fn record_failure(&self, reason: &str) -> Vec<Alert> {
        warn!(reason, "memory sample failed, skipping tick");
        let stop_alert = {
            let mut state = self.inner.state.lock().expect("state lock");
            state.consecutive_failures += 1;
            if state.consecutive_failures >= self.inner.cfg.max_consecutive_failures {
                let alert = Alert {
                    level: AlertLevel::Critical,
                    metric: Metric::Sampler,
                    value: u64::from(state.consecutive_failures),
                    threshold: u64::from(self.inner.cfg.max_consecutive_failures),
                    message: format!(
                        "sampler failed {} consecutive times, stopping monitor: {reason}",
                        state.consecutive_failures
                    ),
                    timestamp: SystemTime::now(),
                };
                let alerts = vec![alert.clone()];
                self.record_alerts(&mut state, &alerts);
                Some(alert)
            } else {
                None
            }
        };

        match stop_alert {
            Some(alert) => {
                error!("{}", alert.message);
                self.enqueue(alert.clone());
                self.stop();
                vec![alert]
            }
            None => Vec::new(),
        }
    }

    fn record_alerts(&self, state: &mut MonitorState, alerts: &[Alert]) {
        state.alerts_emitted += alerts.len() as u64;
        for alert in alerts {
            state.alerts.push_back(alert.clone());
            while state.alerts.len() > self.inner.cfg.alerts_retained {
                state.alerts.pop_front();
            }
        }
    }

    fn enqueue(&self, alert: Alert) {
        let guard = self.inner.alert_tx.lock().expect("alert_tx lock");
        if let Some(tx) = guard.as_ref() {
            if tx.try_send(alert).is_err() {
                self.inner.alerts_dropped.fetch_add(1, Ordering::SeqCst);
            }
        }
    }
}

impl Inner {
    fn notify_listeners(&self, alert: &Alert) {
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .expect("listeners lock")
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(alert))).is_err() {
                self.listener_failures.fetch_add(1, Ordering::SeqCst);
                warn!("alert listener panicked, swallowed");
            }
        }
    }
}
