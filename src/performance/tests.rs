use super::*;
use crate::config::{MetricKind, MetricSettings};
use crate::core::game_thread::GameThread;

#[derive(Debug, Clone, PartialEq)]
enum BackendEvent {
    Instrumentation(bool),
    DataCollection(bool),
    Start(String),
    Metric(String, String, i64),
    Stop(String),
}

#[derive(Default)]
struct RecordingBackend {
    events: Arc<Mutex<Vec<BackendEvent>>>,
}

impl RecordingBackend {
    fn starts(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                BackendEvent::Start(name) => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    fn stops(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                BackendEvent::Stop(name) => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    fn metric_values(&self, trace: &str, metric: &str) -> Vec<i64> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                BackendEvent::Metric(t, m, v) if t == trace && m == metric => Some(*v),
                _ => None,
            })
            .collect()
    }
}

struct RecordingTrace {
    name: String,
    events: Arc<Mutex<Vec<BackendEvent>>>,
}

impl Trace for RecordingTrace {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_metric(&mut self, metric: &str, value: i64) {
        self.events.lock().push(BackendEvent::Metric(
            self.name.clone(),
            metric.to_string(),
            value,
        ));
    }

    fn stop(&mut self) {
        self.events.lock().push(BackendEvent::Stop(self.name.clone()));
    }
}

impl PerformanceBackend for RecordingBackend {
    fn set_instrumentation_enabled(&self, enabled: bool) {
        self.events.lock().push(BackendEvent::Instrumentation(enabled));
    }

    fn set_data_collection_enabled(&self, enabled: bool) {
        self.events.lock().push(BackendEvent::DataCollection(enabled));
    }

    fn create_and_start_trace(&self, name: &str) -> Box<dyn Trace> {
        self.events.lock().push(BackendEvent::Start(name.to_string()));
        Box::new(RecordingTrace {
            name: name.to_string(),
            events: Arc::clone(&self.events),
        })
    }
}

struct FixedProbe;

impl DeviceProbe for FixedProbe {
    fn average_fps(&self) -> f32 {
        59.7
    }
}

fn gameplay_trace(once: bool) -> TraceSettings {
    TraceSettings {
        once_trace: once,
        increment_trace_name: !once,
        trace_duration: 10.0,
        metric_rate: 1.0,
        trace_name: "gameplay".to_string(),
        metrics: vec![
            MetricSettings {
                metric_name: "fps".to_string(),
                metric: MetricKind::Fps,
            },
            MetricSettings {
                metric_name: "ticks".to_string(),
                metric: MetricKind::TestIncremental,
            },
        ],
    }
}

async fn advance(game_thread: &mut GameThread, by: Duration) {
    tokio::time::sleep(by).await;
    game_thread.pump();
}

#[tokio::test(start_paused = true)]
async fn test_traces_restart_with_incremented_names() {
    let mut game_thread = GameThread::try_current().unwrap();
    let backend = Arc::new(RecordingBackend::default());
    let monitor = PerformanceMonitor::start(
        &[gameplay_trace(false)],
        backend.clone(),
        Arc::new(FixedProbe),
        game_thread.handle(),
    );

    assert_eq!(
        backend.events.lock()[..2],
        [
            BackendEvent::Instrumentation(true),
            BackendEvent::DataCollection(true)
        ]
    );
    assert!(backend.starts().is_empty());

    // The trace and then its metrics fire right away.
    advance(&mut game_thread, Duration::from_millis(1)).await;
    assert_eq!(backend.starts(), vec!["gameplay0"]);
    assert_eq!(monitor.running_traces(), vec!["gameplay0"]);
    advance(&mut game_thread, Duration::from_millis(1)).await;
    assert_eq!(backend.metric_values("gameplay0", "fps"), vec![59]);
    assert_eq!(backend.metric_values("gameplay0", "ticks"), vec![1]);

    advance(&mut game_thread, Duration::from_secs(1)).await;
    assert_eq!(backend.metric_values("gameplay0", "ticks"), vec![1, 2]);

    advance(&mut game_thread, Duration::from_secs(10)).await;
    assert_eq!(backend.starts(), vec!["gameplay0", "gameplay1"]);
    assert_eq!(backend.stops(), vec!["gameplay0"]);

    // Metrics are rebuilt for the new trace.
    advance(&mut game_thread, Duration::from_millis(1)).await;
    assert_eq!(backend.metric_values("gameplay1", "ticks"), vec![1]);
}

#[tokio::test(start_paused = true)]
async fn test_once_trace_runs_until_stopped() {
    let mut game_thread = GameThread::try_current().unwrap();
    let backend = Arc::new(RecordingBackend::default());
    let mut monitor = PerformanceMonitor::start(
        &[gameplay_trace(true)],
        backend.clone(),
        Arc::new(NullProbe),
        game_thread.handle(),
    );

    advance(&mut game_thread, Duration::from_millis(1)).await;
    advance(&mut game_thread, Duration::from_secs(25)).await;
    assert_eq!(backend.starts(), vec!["gameplay"]);
    assert!(backend.stops().is_empty());

    monitor.stop();
    assert_eq!(backend.stops(), vec!["gameplay"]);
    assert!(monitor.running_traces().is_empty());

    let samples = backend.metric_values("gameplay", "ticks").len();
    advance(&mut game_thread, Duration::from_secs(5)).await;
    assert_eq!(backend.metric_values("gameplay", "ticks").len(), samples);
}

#[test]
fn test_metric_sampling() {
    struct AndroidProbe(u8);

    impl DeviceProbe for AndroidProbe {
        fn volume(&self) -> VolumeReading {
            VolumeReading::AndroidSteps(self.0)
        }
    }

    let mut volume = Metric::new("volume", MetricKind::VolumeState);
    assert_eq!(volume.sample(&AndroidProbe(15)), 100);
    assert_eq!(volume.sample(&AndroidProbe(7)), 46);
    assert_eq!(volume.sample(&AndroidProbe(0)), 0);
    assert_eq!(VolumeReading::Percent(80).percent(), 80);

    let mut memory = Metric::new("memory", MetricKind::Memory);
    assert_eq!(memory.sample(&NullProbe), 5);
    let mut temperature = Metric::new("temperature", MetricKind::DeviceTemperature);
    assert_eq!(temperature.sample(&NullProbe), 0);
}
