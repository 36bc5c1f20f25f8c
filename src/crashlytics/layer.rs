//! `tracing` integration: feeds every event into the [`LogRouter`].

use super::router::{LogEvent, LogRouter};
use crate::config::LogLevel;
use std::fmt::{self, Write};
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

/// Event field that marks a line as process-fatal: `error!(critical = true, ...)`.
pub const CRITICAL_FIELD: &str = "critical";

/// A [`Layer`] that routes events through a [`LogRouter`].
///
/// The event target is used as the log category.
#[derive(Clone)]
pub struct CrashlyticsLayer {
    router: Arc<LogRouter>,
}

impl CrashlyticsLayer {
    pub fn new(router: Arc<LogRouter>) -> Self {
        Self { router }
    }
}

pub fn severity_for(level: &Level) -> LogLevel {
    match *level {
        Level::ERROR => LogLevel::Error,
        Level::WARN => LogLevel::Warning,
        Level::INFO => LogLevel::Log,
        Level::DEBUG => LogLevel::Verbose,
        Level::TRACE => LogLevel::VeryVerbose,
    }
}

impl<S> Layer<S> for CrashlyticsLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);

        let mut log_event = LogEvent::new(
            metadata.target(),
            severity_for(metadata.level()),
            visitor.text(),
        );
        log_event.critical = visitor.critical;

        self.router.route(&log_event);
    }
}

#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: String,
    critical: bool,
}

impl LineVisitor {
    fn text(&self) -> String {
        match (self.message.is_empty(), self.fields.is_empty()) {
            (_, true) => self.message.clone(),
            (true, false) => self.fields.trim_start().to_string(),
            (false, false) => format!("{}{}", self.message, self.fields),
        }
    }
}

impl Visit for LineVisitor {
    fn record_bool(&mut self, field: &Field, value: bool) {
        if field.name() == CRITICAL_FIELD {
            self.critical = value;
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}
