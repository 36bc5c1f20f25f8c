//! Firebase Performance Monitoring module.
//!
//! [`PerformanceMonitor`] runs the traces listed in the configuration. Each trace is
//! restarted every `trace_duration` seconds (once only with `once_trace`) and its
//! metrics are sampled every `metric_rate` seconds while it runs. All timers fire on
//! the main context.

pub mod metrics;

pub use metrics::{DeviceProbe, Metric, NullProbe, VolumeReading};

use crate::config::TraceSettings;
use crate::core::category;
use crate::core::game_thread::{GameThreadHandle, TimerHandle};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A started trace.
pub trait Trace: Send {
    fn name(&self) -> &str;
    fn set_metric(&mut self, metric: &str, value: i64);
    fn stop(&mut self);
}

/// The native performance SDK.
pub trait PerformanceBackend: Send + Sync {
    fn set_instrumentation_enabled(&self, enabled: bool);
    fn set_data_collection_enabled(&self, enabled: bool);
    fn create_and_start_trace(&self, name: &str) -> Box<dyn Trace>;
}

/// Reports traces through `tracing` instead of a native SDK.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingBackend;

impl PerformanceBackend for TracingBackend {
    fn set_instrumentation_enabled(&self, enabled: bool) {
        tracing::debug!(target: category::PERFORMANCE, enabled, "instrumentation");
    }

    fn set_data_collection_enabled(&self, enabled: bool) {
        tracing::debug!(target: category::PERFORMANCE, enabled, "data collection");
    }

    fn create_and_start_trace(&self, name: &str) -> Box<dyn Trace> {
        tracing::info!(target: category::PERFORMANCE, trace = name, "trace started");
        Box::new(LoggedTrace {
            name: name.to_string(),
            started: Instant::now(),
            metrics: BTreeMap::new(),
            stopped: false,
        })
    }
}

struct LoggedTrace {
    name: String,
    started: Instant,
    metrics: BTreeMap<String, i64>,
    stopped: bool,
}

impl Trace for LoggedTrace {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_metric(&mut self, metric: &str, value: i64) {
        self.metrics.insert(metric.to_string(), value);
    }

    fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        tracing::info!(
            target: category::PERFORMANCE,
            trace = %self.name,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            metrics = ?self.metrics,
            "trace stopped"
        );
    }
}

struct RunningTrace {
    settings: TraceSettings,
    current: Option<Box<dyn Trace>>,
    metrics: Vec<Metric>,
    metric_timer: Option<TimerHandle>,
}

impl RunningTrace {
    fn stop(&mut self) {
        if let Some(mut timer) = self.metric_timer.take() {
            timer.clear();
        }
        if let Some(mut trace) = self.current.take() {
            trace.stop();
        }
    }
}

/// Shared by every timer callback of one monitor.
#[derive(Clone)]
struct MonitorContext {
    backend: Arc<dyn PerformanceBackend>,
    probe: Arc<dyn DeviceProbe>,
    game_thread: GameThreadHandle,
    trace_counter: Arc<AtomicU64>,
}

impl MonitorContext {
    fn restart(&self, running: &Arc<Mutex<RunningTrace>>) {
        let mut state = running.lock();

        if let Some(mut previous) = state.current.take() {
            tracing::debug!(target: category::PERFORMANCE, trace = previous.name(), "stopping trace");
            previous.stop();
        }

        let mut name = state.settings.trace_name.clone();
        if state.settings.increment_trace_name {
            name.push_str(&self.trace_counter.fetch_add(1, Ordering::Relaxed).to_string());
        }

        state.current = Some(self.backend.create_and_start_trace(&name));
        state.metrics = state.settings.metrics.iter().map(Metric::from_settings).collect();

        let rate = seconds(state.settings.metric_rate);
        let probe = Arc::clone(&self.probe);
        let sampled = Arc::clone(running);
        state.metric_timer = Some(self.game_thread.set_timer(
            rate,
            true,
            Some(Duration::ZERO),
            move || sample_metrics(&sampled, probe.as_ref()),
        ));
    }
}

fn sample_metrics(running: &Mutex<RunningTrace>, probe: &dyn DeviceProbe) {
    let mut state = running.lock();
    let RunningTrace {
        current, metrics, ..
    } = &mut *state;
    let Some(trace) = current.as_mut() else {
        return;
    };
    for metric in metrics.iter_mut() {
        let value = metric.sample(probe);
        tracing::trace!(target: category::PERFORMANCE, metric = %metric.name, value);
        trace.set_metric(&metric.name, value);
    }
}

fn seconds(value: f32) -> Duration {
    Duration::try_from_secs_f32(value).unwrap_or(Duration::ZERO)
}

/// Runs the configured traces until stopped or dropped.
pub struct PerformanceMonitor {
    traces: Vec<Arc<Mutex<RunningTrace>>>,
    timers: Vec<TimerHandle>,
}

impl PerformanceMonitor {
    /// Enables instrumentation and data collection, then arms one timer per trace.
    /// Every trace starts on the first main-context pump.
    pub fn start(
        traces: &[TraceSettings],
        backend: Arc<dyn PerformanceBackend>,
        probe: Arc<dyn DeviceProbe>,
        game_thread: GameThreadHandle,
    ) -> Self {
        backend.set_instrumentation_enabled(true);
        backend.set_data_collection_enabled(true);
        tracing::info!(target: category::PERFORMANCE, traces = traces.len(), "performance monitoring enabled");

        let context = MonitorContext {
            backend,
            probe,
            game_thread: game_thread.clone(),
            trace_counter: Arc::new(AtomicU64::new(0)),
        };

        let mut running = Vec::with_capacity(traces.len());
        let mut timers = Vec::with_capacity(traces.len());
        for settings in traces {
            let duration = seconds(settings.trace_duration);
            let repeating = !settings.once_trace;
            if repeating && duration.is_zero() {
                tracing::warn!(
                    target: category::PERFORMANCE,
                    trace = %settings.trace_name,
                    "trace duration must be positive, trace disabled"
                );
            }

            let trace = Arc::new(Mutex::new(RunningTrace {
                settings: settings.clone(),
                current: None,
                metrics: Vec::new(),
                metric_timer: None,
            }));

            let context = context.clone();
            let restarted = Arc::clone(&trace);
            timers.push(game_thread.set_timer(
                duration,
                repeating,
                Some(Duration::ZERO),
                move || context.restart(&restarted),
            ));
            running.push(trace);
        }

        Self {
            traces: running,
            timers,
        }
    }

    /// Names of the traces currently running.
    pub fn running_traces(&self) -> Vec<String> {
        self.traces
            .iter()
            .filter_map(|trace| trace.lock().current.as_ref().map(|t| t.name().to_string()))
            .collect()
    }

    /// Stops every timer and every running trace.
    pub fn stop(&mut self) {
        for timer in &mut self.timers {
            timer.clear();
        }
        for trace in &self.traces {
            trace.lock().stop();
        }
    }
}

impl Drop for PerformanceMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests;
