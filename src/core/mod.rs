//! Shared plumbing used by every feature module.
//!
//! - [`game_thread`]: the main execution context and its timers.
//! - [`bridge`]: turns native completions into exactly-once deliveries on the main context.
//! - [`single_flight`]: busy guard for operations the native side does not serialize.
//! - [`delegate`]: listener lists used to publish results to application code.

pub mod bridge;
pub mod delegate;
pub mod game_thread;
pub mod middleware;
pub mod single_flight;

use serde::Deserialize;
use std::fmt;
use thiserror::Error;

/// Log categories used as `tracing` targets by this crate.
///
/// The names match the categories the host's log router is configured with.
pub mod category {
    /// Bridge, main-context and guard plumbing shared by every feature.
    pub const CORE: &str = "LogFirebaseCore";
    pub const CRASHLYTICS: &str = "LogFirebaseCrashlytics";
    pub const FUNCTIONS: &str = "LogFirebaseFunctions";
    pub const GOOGLE_SERVICES: &str = "LogGoogleServices";
    pub const PERFORMANCE: &str = "LogFirebasePerformance";
    pub const REMOTE_CONFIG: &str = "LogFirebaseRemoteConfig";
}

/// Error codes reported by the native SDKs.
///
/// The raw values match the Firebase C++ SDK (`0` is success).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ErrorCode {
    #[default]
    None,
    Cancelled,
    Unknown,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    ResourceExhausted,
    FailedPrecondition,
    Aborted,
    OutOfRange,
    Unimplemented,
    Internal,
    Unavailable,
    DataLoss,
    Unauthenticated,
}

impl ErrorCode {
    const ALL: [ErrorCode; 17] = [
        ErrorCode::None,
        ErrorCode::Cancelled,
        ErrorCode::Unknown,
        ErrorCode::InvalidArgument,
        ErrorCode::DeadlineExceeded,
        ErrorCode::NotFound,
        ErrorCode::AlreadyExists,
        ErrorCode::PermissionDenied,
        ErrorCode::ResourceExhausted,
        ErrorCode::FailedPrecondition,
        ErrorCode::Aborted,
        ErrorCode::OutOfRange,
        ErrorCode::Unimplemented,
        ErrorCode::Internal,
        ErrorCode::Unavailable,
        ErrorCode::DataLoss,
        ErrorCode::Unauthenticated,
    ];

    /// Maps a raw native code. Values outside the known range become `Unknown`.
    pub fn from_raw(raw: i32) -> Self {
        usize::try_from(raw)
            .ok()
            .and_then(|index| Self::ALL.get(index).copied())
            .unwrap_or(ErrorCode::Unknown)
    }

    pub fn as_raw(self) -> i32 {
        Self::ALL
            .iter()
            .position(|code| *code == self)
            .map(|index| index as i32)
            .unwrap_or(2)
    }

    /// Maps a canonical status string such as `"INVALID_ARGUMENT"`.
    pub fn from_status(status: &str) -> Self {
        Self::ALL
            .iter()
            .copied()
            .find(|code| code.as_status() == status)
            .unwrap_or(ErrorCode::Unknown)
    }

    /// Maps an HTTP status code the way the callable-functions protocol does.
    pub fn from_http_status(status: u16) -> Self {
        match status {
            200..=299 => ErrorCode::None,
            400 => ErrorCode::InvalidArgument,
            401 => ErrorCode::Unauthenticated,
            403 => ErrorCode::PermissionDenied,
            404 => ErrorCode::NotFound,
            409 => ErrorCode::Aborted,
            429 => ErrorCode::ResourceExhausted,
            499 => ErrorCode::Cancelled,
            500 => ErrorCode::Internal,
            501 => ErrorCode::Unimplemented,
            503 => ErrorCode::Unavailable,
            504 => ErrorCode::DeadlineExceeded,
            _ => ErrorCode::Unknown,
        }
    }

    pub fn as_status(self) -> &'static str {
        match self {
            ErrorCode::None => "OK",
            ErrorCode::Cancelled => "CANCELLED",
            ErrorCode::Unknown => "UNKNOWN",
            ErrorCode::InvalidArgument => "INVALID_ARGUMENT",
            ErrorCode::DeadlineExceeded => "DEADLINE_EXCEEDED",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::AlreadyExists => "ALREADY_EXISTS",
            ErrorCode::PermissionDenied => "PERMISSION_DENIED",
            ErrorCode::ResourceExhausted => "RESOURCE_EXHAUSTED",
            ErrorCode::FailedPrecondition => "FAILED_PRECONDITION",
            ErrorCode::Aborted => "ABORTED",
            ErrorCode::OutOfRange => "OUT_OF_RANGE",
            ErrorCode::Unimplemented => "UNIMPLEMENTED",
            ErrorCode::Internal => "INTERNAL",
            ErrorCode::Unavailable => "UNAVAILABLE",
            ErrorCode::DataLoss => "DATA_LOSS",
            ErrorCode::Unauthenticated => "UNAUTHENTICATED",
        }
    }

    pub fn is_success(self) -> bool {
        self == ErrorCode::None
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.as_status(), self.as_raw())
    }
}

/// Errors surfaced to completion callbacks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The SDK or platform reported a non-success code.
    #[error("native call failed with {code}: {message}")]
    Native { code: ErrorCode, message: String },
    /// A single-flight guard rejected a concurrent call.
    #[error("{0}")]
    Busy(String),
    /// The operation has no implementation on the current platform.
    #[error("{0}")]
    UnavailablePlatform(String),
    /// The log router was re-entered while routing a previous line.
    #[error("Crashlytics internal recursion!")]
    InternalRecursion,
}

impl Error {
    pub fn native(code: ErrorCode, message: impl Into<String>) -> Self {
        Error::Native {
            code,
            message: message.into(),
        }
    }

    /// The native code behind this error, `Unknown` for non-native failures.
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::Native { code, .. } => *code,
            _ => ErrorCode::Unknown,
        }
    }

    /// The human readable part, without the code prefix.
    pub fn message(&self) -> String {
        match self {
            Error::Native { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// The result delivered to a completion callback.
///
/// On failure `payload` always holds `T::default()`, never partially built native data.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<T> {
    pub error: Option<Error>,
    pub payload: T,
}

impl<T: Default> Outcome<T> {
    pub fn success(payload: T) -> Self {
        Self {
            error: None,
            payload,
        }
    }

    pub fn failure(error: Error) -> Self {
        Self {
            error: Some(error),
            payload: T::default(),
        }
    }

    /// Builds an outcome from a raw native completion.
    pub fn from_native(raw_code: i32, message: impl Into<String>, payload: Option<T>) -> Self {
        let code = ErrorCode::from_raw(raw_code);
        match (code.is_success(), payload) {
            (true, Some(payload)) => Self::success(payload),
            (true, None) => Self::success(T::default()),
            (false, _) => Self::failure(Error::native(code, message)),
        }
    }

    pub fn from_result(result: Result<T, Error>) -> Self {
        match result {
            Ok(payload) => Self::success(payload),
            Err(error) => Self::failure(error),
        }
    }
}

impl<T> Outcome<T> {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Error message for listeners that only display text. Empty on success.
    pub fn message(&self) -> String {
        self.error.as_ref().map(Error::message).unwrap_or_default()
    }

    pub fn into_result(self) -> Result<T, Error> {
        match self.error {
            None => Ok(self.payload),
            Some(error) => Err(error),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct FirebaseErrorResponse {
    pub error: FirebaseErrorDetails,
}

#[derive(Debug, Deserialize)]
pub struct FirebaseErrorDetails {
    #[serde(default)]
    pub code: Option<u16>,
    #[serde(default)]
    pub message: String,
    pub status: Option<String>,
}

impl FirebaseErrorResponse {
    /// Resolves the error code, preferring the status string over the HTTP code.
    ///
    /// Never `None`: the body describes a failed response.
    pub fn error_code(&self, http_status: u16) -> ErrorCode {
        let code = match self.error.status.as_deref() {
            Some(status) => ErrorCode::from_status(status),
            None => ErrorCode::from_http_status(self.error.code.unwrap_or(http_status)),
        };
        if !code.is_success() {
            return code;
        }
        match ErrorCode::from_http_status(http_status) {
            ErrorCode::None => ErrorCode::Unknown,
            fallback => fallback,
        }
    }
}

/// Converts a failed HTTP response into a native error.
pub async fn parse_error_response(response: reqwest::Response, default_msg: &str) -> Error {
    let status = response.status();
    match response.json::<FirebaseErrorResponse>().await {
        Ok(body) => {
            let message = if body.error.message.is_empty() {
                format!("{}: {}", default_msg, status)
            } else {
                body.error.message.clone()
            };
            Error::native(body.error_code(status.as_u16()), message)
        }
        Err(_) => Error::native(
            match ErrorCode::from_http_status(status.as_u16()) {
                ErrorCode::None => ErrorCode::Unknown,
                code => code,
            },
            format!("{}: {}", default_msg, status),
        ),
    }
}

#[cfg(test)]
mod tests;
