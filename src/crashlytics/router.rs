//! Severity-tiered routing of log lines to the crash reporter.
//!
//! Every line the host emits goes through [`LogRouter::route`]. The cached
//! [`LogRoutingPolicy`] decides whether it reaches the crash reporter and at which
//! tier; the original output still receives it unless the build is stripped.
//!
//! Order of evaluation:
//!
//! 1. `NoLogging` lines are dropped.
//! 2. Critical lines are always reported as errors, with a call stack.
//! 3. Forced categories are always reported; as errors when severe enough.
//! 4. Ignored categories are never reported.
//! 5. Lines at or above the error level are reported as errors, with a call stack.
//! 6. Lines at or above the default level are reported as plain log lines.

use super::CrashReporter;
use crate::config::{BuildFlavor, FirebaseConfig, LogLevel};
use crate::core::{category, Error};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::cell::Cell;
use std::collections::HashSet;
use std::io::Write;
use std::sync::Arc;

/// A single emitted log line.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEvent {
    pub text: String,
    pub severity: LogLevel,
    pub category: String,
    /// Set only for process-fatal lines.
    pub critical: bool,
    pub timestamp: DateTime<Utc>,
}

impl LogEvent {
    pub fn new(category: impl Into<String>, severity: LogLevel, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            severity,
            category: category.into(),
            critical: false,
            timestamp: Utc::now(),
        }
    }

    pub fn critical(mut self) -> Self {
        self.critical = true;
        self
    }

    /// `Category: Severity: text`, or just the text when there is no category.
    pub fn format_line(&self) -> String {
        if self.category.is_empty() {
            self.text.clone()
        } else if self.severity != LogLevel::NoLogging {
            format!("{}: {}: {}", self.category, self.severity, self.text)
        } else {
            format!("{}: {}", self.category, self.text)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Normal,
    Error,
}

/// What the router did with a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Drop,
    Remote(Tier),
    Critical,
    /// The router was re-entered; only the original output saw a warning.
    Recursion,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRoutingPolicy {
    pub log_level: LogLevel,
    pub error_log_level: LogLevel,
    pub forced_categories: HashSet<String>,
    pub ignored_categories: HashSet<String>,
}

impl Default for LogRoutingPolicy {
    fn default() -> Self {
        Self::from_config(&FirebaseConfig::default())
    }
}

impl LogRoutingPolicy {
    pub fn from_config(config: &FirebaseConfig) -> Self {
        Self {
            log_level: config.log_level,
            error_log_level: config.error_log_level,
            forced_categories: config.forced_log_categories.iter().cloned().collect(),
            ignored_categories: config.ignored_log_categories.iter().cloned().collect(),
        }
    }

    /// Decides where `event` goes. Never returns [`Route::Recursion`].
    pub fn classify(&self, event: &LogEvent) -> Route {
        if event.severity == LogLevel::NoLogging {
            return Route::Drop;
        }
        if event.critical {
            return Route::Critical;
        }

        let severe = event.severity.is_at_least(self.error_log_level);
        if self.forced_categories.contains(&event.category) {
            return Route::Remote(if severe { Tier::Error } else { Tier::Normal });
        }
        if self.ignored_categories.contains(&event.category) {
            return Route::Drop;
        }
        if severe {
            Route::Remote(Tier::Error)
        } else if event.severity.is_at_least(self.log_level) {
            Route::Remote(Tier::Normal)
        } else {
            Route::Drop
        }
    }
}

/// The output a line would have reached without the router.
pub trait OriginalSink: Send + Sync {
    fn write(&self, event: &LogEvent);
}

/// Writes lines to standard error.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrSink;

impl OriginalSink for StderrSink {
    fn write(&self, event: &LogEvent) {
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(
            stderr,
            "[{}] {}",
            event.timestamp.format("%Y.%m.%d-%H.%M.%S%.3f"),
            event.format_line()
        );
    }
}

/// Best-effort call stack capture attached to error-tier reports.
pub trait StackSnapshot: Send + Sync {
    /// Frames, innermost first. Empty when no stack is available.
    fn capture(&self) -> Vec<String>;
}

/// Captures a Rust backtrace when `RUST_BACKTRACE` allows it.
#[derive(Debug, Default, Clone, Copy)]
pub struct BacktraceSnapshot;

impl StackSnapshot for BacktraceSnapshot {
    fn capture(&self) -> Vec<String> {
        let backtrace = Backtrace::capture();
        if backtrace.status() != BacktraceStatus::Captured {
            return Vec::new();
        }
        backtrace
            .to_string()
            .lines()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect()
    }
}

pub type PolicySource = Arc<dyn Fn() -> LogRoutingPolicy + Send + Sync>;

thread_local! {
    static ROUTING_DEPTH: Cell<u8> = const { Cell::new(0) };
}

struct RecursionGuard;

impl RecursionGuard {
    fn enter() -> Option<Self> {
        ROUTING_DEPTH.with(|depth| {
            if depth.get() > 0 {
                None
            } else {
                depth.set(depth.get() + 1);
                Some(RecursionGuard)
            }
        })
    }
}

impl Drop for RecursionGuard {
    fn drop(&mut self) {
        ROUTING_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

pub struct LogRouter {
    reporter: Arc<dyn CrashReporter>,
    original: Option<Arc<dyn OriginalSink>>,
    stack: Arc<dyn StackSnapshot>,
    build: BuildFlavor,
    source: RwLock<PolicySource>,
    cached: RwLock<Option<Arc<LogRoutingPolicy>>>,
}

impl LogRouter {
    /// A router reading its policy from `source` on first use.
    pub fn new(reporter: Arc<dyn CrashReporter>, source: PolicySource) -> Self {
        Self {
            reporter,
            original: Some(Arc::new(StderrSink)),
            stack: Arc::new(BacktraceSnapshot),
            build: BuildFlavor::Development,
            source: RwLock::new(source),
            cached: RwLock::new(None),
        }
    }

    pub fn from_config(reporter: Arc<dyn CrashReporter>, config: &FirebaseConfig) -> Self {
        let build = config.build;
        Self::new(reporter, config_source(config.clone())).with_build(build)
    }

    pub fn with_original_sink(mut self, sink: Option<Arc<dyn OriginalSink>>) -> Self {
        self.original = sink;
        self
    }

    pub fn with_stack_snapshot(mut self, stack: Arc<dyn StackSnapshot>) -> Self {
        self.stack = stack;
        self
    }

    pub fn with_build(mut self, build: BuildFlavor) -> Self {
        self.build = build;
        self
    }

    /// The cached policy, read from the source the first time.
    pub fn policy(&self) -> Arc<LogRoutingPolicy> {
        if let Some(policy) = self.cached.read().as_ref() {
            return Arc::clone(policy);
        }
        let source = Arc::clone(&*self.source.read());
        let mut cached = self.cached.write();
        let policy = cached.get_or_insert_with(|| Arc::new(source()));
        Arc::clone(policy)
    }

    /// Drops the cached policy; the next line re-reads the source.
    pub fn invalidate_policy(&self) {
        *self.cached.write() = None;
    }

    /// Swaps the policy source, e.g. after remote config overrides were applied.
    pub fn set_config(&self, config: &FirebaseConfig) {
        *self.source.write() = config_source(config.clone());
        self.invalidate_policy();
    }

    pub fn route(&self, event: &LogEvent) -> Route {
        let Some(_guard) = RecursionGuard::enter() else {
            if let Some(original) = &self.original {
                original.write(&LogEvent {
                    text: format!("{} {}", Error::InternalRecursion, event.format_line()),
                    severity: LogLevel::Warning,
                    category: category::CRASHLYTICS.to_string(),
                    critical: false,
                    timestamp: event.timestamp,
                });
            }
            return Route::Recursion;
        };

        let route = self.policy().classify(event);
        match route {
            Route::Remote(Tier::Normal) => self.reporter.log(&event.format_line()),
            Route::Remote(Tier::Error) => {
                let call_stack = self.stack.capture();
                self.reporter.record_error(&event.format_line(), &call_stack);
            }
            Route::Critical => {
                let call_stack = self.stack.capture();
                let message = format!("Critical: {}", event.format_line());
                self.reporter.record_error(&message, &call_stack);
            }
            Route::Drop | Route::Recursion => {}
        }

        if event.critical || self.build != BuildFlavor::Shipping {
            if let Some(original) = &self.original {
                original.write(event);
            }
        }

        route
    }
}

fn config_source(config: FirebaseConfig) -> PolicySource {
    Arc::new(move || LogRoutingPolicy::from_config(&config))
}
