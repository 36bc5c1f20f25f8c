//! Global `tracing` subscriber setup.
//!
//! With Crashlytics enabled the [`CrashlyticsLayer`] is the only output and sees
//! every event: its routing policy decides what is reported, and its router writes
//! to standard error itself, so stripped builds stay quiet. Otherwise events go to
//! a plain `fmt` layer.
//!
//! `RUST_LOG` overrides the default console filter.

#[cfg(feature = "crashlytics")]
use crate::crashlytics::CrashlyticsLayer;
use tracing::Subscriber;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_FILTER: &str = "info,hyper=warn,h2=warn,reqwest=warn,rustls=warn,tokio=warn";

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

fn console_subscriber() -> impl Subscriber + Send + Sync {
    tracing_subscriber::registry().with(fmt::layer().with_target(true).with_filter(filter()))
}

/// Installs a console subscriber.
pub fn init() -> Result<(), TryInitError> {
    console_subscriber().try_init()
}

/// The Crashlytics layer is left unfiltered; lines below the console filter
/// still have to reach the router.
#[cfg(feature = "crashlytics")]
fn crashlytics_subscriber(layer: CrashlyticsLayer) -> impl Subscriber + Send + Sync {
    tracing_subscriber::registry().with(layer)
}

/// Installs a subscriber that routes every event through Crashlytics.
#[cfg(feature = "crashlytics")]
pub fn init_with_crashlytics(layer: CrashlyticsLayer) -> Result<(), TryInitError> {
    crashlytics_subscriber(layer).try_init()
}
