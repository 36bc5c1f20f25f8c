//! Launch-time settings.
//!
//! Mirrors the plugin settings page: feature switches, Crashlytics log routing,
//! Google Sign-In switches and the performance traces to run. Every field has a
//! default so a partial JSON document is enough.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while loading a [`FirebaseConfig`].
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown log level: {0}")]
    UnknownLogLevel(String),
}

/// Log severities, most severe first. `NoLogging` disables a line entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogLevel {
    NoLogging = 0,
    Fatal,
    Error,
    Warning,
    Display,
    Log,
    Verbose,
    VeryVerbose,
}

impl LogLevel {
    /// Whether `self` is at least as severe as `threshold`. `NoLogging` never is.
    pub fn is_at_least(self, threshold: LogLevel) -> bool {
        self != LogLevel::NoLogging && (self as u8) <= (threshold as u8)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::NoLogging => "NoLogging",
            LogLevel::Fatal => "Fatal",
            LogLevel::Error => "Error",
            LogLevel::Warning => "Warning",
            LogLevel::Display => "Display",
            LogLevel::Log => "Log",
            LogLevel::Verbose => "Verbose",
            LogLevel::VeryVerbose => "VeryVerbose",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let level = match s.trim().to_ascii_lowercase().as_str() {
            "nologging" => LogLevel::NoLogging,
            "fatal" => LogLevel::Fatal,
            "error" => LogLevel::Error,
            "warning" => LogLevel::Warning,
            "display" => LogLevel::Display,
            "log" => LogLevel::Log,
            "verbose" => LogLevel::Verbose,
            "veryverbose" | "all" => LogLevel::VeryVerbose,
            _ => return Err(Error::UnknownLogLevel(s.to_string())),
        };
        Ok(level)
    }
}

/// Stripped shipping builds do not echo ordinary log lines to the original output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BuildFlavor {
    #[default]
    Development,
    Shipping,
}

/// Values a performance metric can sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MetricKind {
    Fps,
    DeviceTemperature,
    BatteryLevel,
    Memory,
    VolumeState,
    TestIncremental,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSettings {
    pub metric_name: String,
    pub metric: MetricKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TraceSettings {
    /// Run one trace only instead of restarting every `trace_duration` seconds.
    pub once_trace: bool,
    /// Append a running counter to `trace_name` on every restart.
    pub increment_trace_name: bool,
    pub trace_duration: f32,
    pub metric_rate: f32,
    pub trace_name: String,
    pub metrics: Vec<MetricSettings>,
}

impl Default for TraceSettings {
    fn default() -> Self {
        Self {
            once_trace: false,
            increment_trace_name: false,
            trace_duration: 10.0,
            metric_rate: 1.0,
            trace_name: String::new(),
            metrics: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FirebaseConfig {
    pub enable_crashlytics: bool,
    pub enable_functions: bool,
    pub enable_remote_config: bool,
    pub enable_performances: bool,

    /// When false, crash reports are held until the unsent-report check ran.
    pub crashlytics_collection_enabled: bool,
    pub log_level: LogLevel,
    pub error_log_level: LogLevel,
    pub forced_log_categories: Vec<String>,
    pub ignored_log_categories: Vec<String>,

    /// Google Sign-In on iOS needs the reversed client id URL scheme, so it is opt-in.
    pub enable_google_sign_in: bool,
    pub enable_google_play_games_sign_in: bool,

    pub build: BuildFlavor,
    pub traces: Vec<TraceSettings>,
}

impl Default for FirebaseConfig {
    fn default() -> Self {
        Self {
            enable_crashlytics: true,
            enable_functions: true,
            enable_remote_config: true,
            enable_performances: true,
            crashlytics_collection_enabled: true,
            log_level: LogLevel::Warning,
            error_log_level: LogLevel::Fatal,
            forced_log_categories: vec!["LogFirebaseCrashlytics".to_string()],
            ignored_log_categories: Vec::new(),
            enable_google_sign_in: false,
            enable_google_play_games_sign_in: false,
            build: BuildFlavor::Development,
            traces: Vec::new(),
        }
    }
}

impl FirebaseConfig {
    pub fn from_json_str(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }
}
