//! Firebase Crashlytics module.
//!
//! Routes host log output into crash reports and handles the unsent-report
//! handshake when automatic collection is disabled.
//!
//! # Examples
//!
//! ```rust,no_run
//! # use firebase_features::crashlytics::{CrashlyticsProxy, InMemoryCrashReporter};
//! # use firebase_features::config::FirebaseConfig;
//! # use firebase_features::core::game_thread::GameThread;
//! # use std::sync::Arc;
//! # use tracing_subscriber::layer::SubscriberExt;
//! # use tracing_subscriber::util::SubscriberInitExt;
//! # async fn run() {
//! let game_thread = GameThread::try_current().unwrap();
//! let proxy = CrashlyticsProxy::new(
//!     &FirebaseConfig::default(),
//!     Arc::new(InMemoryCrashReporter::new()),
//!     game_thread.handle(),
//! );
//! proxy.initialize("device-1234");
//! tracing_subscriber::registry().with(proxy.layer()).init();
//! # }
//! ```

pub mod layer;
pub mod router;

pub use layer::CrashlyticsLayer;
pub use router::{LogEvent, LogRouter, LogRoutingPolicy, Route, Tier};

use crate::config::FirebaseConfig;
use crate::core::category;
use crate::core::delegate::MulticastDelegate;
use crate::core::game_thread::{GameThreadHandle, TimerHandle};
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const UNSENT_REPORTS_POLL_RATE: Duration = Duration::from_millis(500);

/// The native crash reporting SDK.
pub trait CrashReporter: Send + Sync {
    fn log(&self, message: &str);
    fn record_error(&self, message: &str, call_stack: &[String]);
    fn set_user_id(&self, user_id: &str);
    fn set_custom_value(&self, key: &str, value: &str);

    /// Starts the asynchronous unsent-report check.
    fn check_for_unsent_reports(&self) {}
    fn unsent_reports_checked(&self) -> bool {
        true
    }
    fn has_unsent_reports(&self) -> bool {
        false
    }
    fn send_unsent_reports(&self) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrashRecord {
    Log(String),
    Error {
        message: String,
        call_stack: Vec<String>,
    },
}

/// Keeps everything in memory. Used on hosts without a native SDK.
#[derive(Default)]
pub struct InMemoryCrashReporter {
    records: Mutex<Vec<CrashRecord>>,
    user_id: Mutex<Option<String>>,
    custom_values: Mutex<HashMap<String, String>>,
    unsent_reports: Mutex<usize>,
    sent_reports: Mutex<usize>,
}

impl InMemoryCrashReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts with `count` reports left over from a previous session.
    pub fn with_unsent_reports(count: usize) -> Self {
        let reporter = Self::default();
        *reporter.unsent_reports.lock() = count;
        reporter
    }

    pub fn records(&self) -> Vec<CrashRecord> {
        self.records.lock().clone()
    }

    pub fn user_id(&self) -> Option<String> {
        self.user_id.lock().clone()
    }

    pub fn custom_value(&self, key: &str) -> Option<String> {
        self.custom_values.lock().get(key).cloned()
    }

    pub fn sent_reports(&self) -> usize {
        *self.sent_reports.lock()
    }
}

impl CrashReporter for InMemoryCrashReporter {
    fn log(&self, message: &str) {
        self.records.lock().push(CrashRecord::Log(message.to_string()));
    }

    fn record_error(&self, message: &str, call_stack: &[String]) {
        self.records.lock().push(CrashRecord::Error {
            message: message.to_string(),
            call_stack: call_stack.to_vec(),
        });
    }

    fn set_user_id(&self, user_id: &str) {
        *self.user_id.lock() = Some(user_id.to_string());
    }

    fn set_custom_value(&self, key: &str, value: &str) {
        self.custom_values
            .lock()
            .insert(key.to_string(), value.to_string());
    }

    fn has_unsent_reports(&self) -> bool {
        *self.unsent_reports.lock() > 0
    }

    fn send_unsent_reports(&self) {
        let mut unsent = self.unsent_reports.lock();
        *self.sent_reports.lock() += *unsent;
        *unsent = 0;
    }
}

#[derive(Default)]
struct ProxyState {
    game_instance_started: bool,
    sent_unsent_reports: bool,
    poll_timer: Option<TimerHandle>,
}

pub struct CrashlyticsProxy {
    reporter: Arc<dyn CrashReporter>,
    router: Arc<LogRouter>,
    game_thread: GameThreadHandle,
    collection_enabled: bool,
    state: Arc<Mutex<ProxyState>>,
    on_unsent_reports_checked: Arc<MulticastDelegate<bool>>,
}

impl CrashlyticsProxy {
    pub fn new(
        config: &FirebaseConfig,
        reporter: Arc<dyn CrashReporter>,
        game_thread: GameThreadHandle,
    ) -> Self {
        let router = Arc::new(LogRouter::from_config(Arc::clone(&reporter), config));
        Self::with_router(config, reporter, router, game_thread)
    }

    pub fn with_router(
        config: &FirebaseConfig,
        reporter: Arc<dyn CrashReporter>,
        router: Arc<LogRouter>,
        game_thread: GameThreadHandle,
    ) -> Self {
        Self {
            reporter,
            router,
            game_thread,
            collection_enabled: config.crashlytics_collection_enabled,
            state: Arc::new(Mutex::new(ProxyState::default())),
            on_unsent_reports_checked: Arc::new(MulticastDelegate::new()),
        }
    }

    /// Tags reports with the device and session start time.
    pub fn initialize(&self, device_id: &str) {
        self.reporter.set_user_id(device_id);
        self.reporter
            .set_custom_value("Start Time", &Utc::now().to_rfc3339());
        tracing::info!(target: category::CRASHLYTICS, device_id, "Crashlytics initialized");
    }

    pub fn router(&self) -> &Arc<LogRouter> {
        &self.router
    }

    /// The `tracing` layer that feeds host logs into the router.
    pub fn layer(&self) -> CrashlyticsLayer {
        CrashlyticsLayer::new(Arc::clone(&self.router))
    }

    pub fn log(&self, message: &str) {
        self.reporter.log(message);
    }

    pub fn set_custom_value(&self, key: &str, value: &str) {
        self.reporter.set_custom_value(key, value);
    }

    /// Fires once the unsent-report check finished, with whether reports were sent.
    pub fn on_unsent_reports_checked(&self) -> &MulticastDelegate<bool> {
        &self.on_unsent_reports_checked
    }

    pub fn game_instance_started(&self) -> bool {
        self.state.lock().game_instance_started
    }

    pub fn sent_unsent_reports(&self) -> bool {
        self.state.lock().sent_unsent_reports
    }

    /// Starts the unsent-report handshake. Only needed when automatic collection is
    /// disabled; returns whether polling started.
    pub fn on_game_instance_started(&self) -> bool {
        if self.collection_enabled {
            return false;
        }

        let mut state = self.state.lock();
        if state.game_instance_started {
            return false;
        }
        state.game_instance_started = true;

        self.reporter.check_for_unsent_reports();

        let reporter = Arc::clone(&self.reporter);
        let poll_state = Arc::clone(&self.state);
        let delegate = Arc::clone(&self.on_unsent_reports_checked);
        let timer = self.game_thread.set_timer(
            UNSENT_REPORTS_POLL_RATE,
            true,
            None,
            move || {
                if !reporter.unsent_reports_checked() {
                    return;
                }

                let sent = reporter.has_unsent_reports();
                if sent {
                    reporter.send_unsent_reports();
                }
                tracing::info!(target: category::CRASHLYTICS, sent, "unsent reports checked");

                let timer = {
                    let mut state = poll_state.lock();
                    state.sent_unsent_reports = sent;
                    state.poll_timer.take()
                };
                delegate.broadcast(&sent);
                drop(timer);
            },
        );
        state.poll_timer = Some(timer);
        true
    }
}
