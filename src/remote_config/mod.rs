//! Firebase Remote Config module.
//!
//! Client side of Remote Config: in-app defaults, fetching the template values for
//! this app instance and activating them.
//!
//! # Fetch and activate
//!
//! Fetched values are held apart until [`FirebaseRemoteConfig::activate`] is
//! called, so values never change under the game mid-session. A fetch issued
//! within the cache expiration of the previous successful fetch completes without
//! a request.

pub mod models;

use crate::config::{FirebaseConfig, LogLevel};
use crate::core::bridge::AsyncBridge;
use crate::core::{category, parse_error_response, ErrorCode, Outcome};
use crate::options::FirebaseOptions;
use models::{FetchRequest, FetchResponse, TemplateState, ValueSource};
use parking_lot::Mutex;
use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::policies::ExponentialBackoff;
use reqwest_retry::RetryTransientMiddleware;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

const REMOTE_CONFIG_FETCH_API: &str =
    "https://firebaseremoteconfig.googleapis.com/v1/projects/{project_id}/namespaces/firebase:fetch";

/// Cache expiration used by [`FirebaseRemoteConfig::fetch`].
pub const DEFAULT_CACHE_EXPIRATION: Duration = Duration::from_secs(12 * 60 * 60);

pub const LOG_LEVEL_KEY: &str = "pr-log-level";
pub const ERROR_LOG_LEVEL_KEY: &str = "pr-error-log-level";
pub const FORCED_LOG_CATEGORIES_KEY: &str = "pr-forced-log-categories";
pub const IGNORED_LOG_CATEGORIES_KEY: &str = "pr-ignored-log-categories";

const TRUE_VALUES: [&str; 6] = ["1", "true", "t", "yes", "y", "on"];

/// Errors that can occur during a fetch.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Wrapper for `reqwest_middleware::Error`.
    #[error("an error occurred while sending the request: {0}")]
    Request(#[from] reqwest_middleware::Error),
    /// Wrapper for `reqwest::Error`.
    #[error("an error occurred while reading the response: {0}")]
    Reqwest(#[from] reqwest::Error),
}

impl From<Error> for crate::core::Error {
    fn from(error: Error) -> Self {
        crate::core::Error::native(ErrorCode::Unavailable, error.to_string())
    }
}

#[derive(Default)]
struct ConfigState {
    defaults: HashMap<String, String>,
    fetched: HashMap<String, String>,
    active: HashMap<String, String>,
    activation_pending: bool,
    last_fetch: Option<Instant>,
    template_version: Option<String>,
}

impl ConfigState {
    fn store_fetched(&mut self, response: FetchResponse) {
        match response.state {
            TemplateState::Update => self.fetched = response.entries,
            TemplateState::NoChange => {}
            TemplateState::NoTemplate | TemplateState::EmptyConfig => self.fetched.clear(),
        }
        if response.state != TemplateState::NoChange {
            self.activation_pending = true;
        }
        if response.template_version.is_some() {
            self.template_version = response.template_version;
        }
        self.last_fetch = Some(Instant::now());
    }

    fn lookup(&self, key: &str) -> (Option<&str>, ValueSource) {
        if let Some(value) = self.active.get(key) {
            (Some(value.as_str()), ValueSource::Remote)
        } else if let Some(value) = self.defaults.get(key) {
            (Some(value.as_str()), ValueSource::Default)
        } else {
            (None, ValueSource::Static)
        }
    }
}

/// Client for Firebase Remote Config.
#[derive(Clone)]
pub struct FirebaseRemoteConfig {
    client: ClientWithMiddleware,
    base_url: String,
    api_key: String,
    app_id: String,
    app_instance_id: String,
    bridge: AsyncBridge,
    state: Arc<Mutex<ConfigState>>,
}

impl FirebaseRemoteConfig {
    /// Creates a new `FirebaseRemoteConfig` instance.
    ///
    /// This is typically called via `FirebaseFeatures::remote_config()`.
    pub fn new(options: &FirebaseOptions, bridge: AsyncBridge) -> Self {
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);

        let client = ClientBuilder::new(Client::new())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        let base_url = REMOTE_CONFIG_FETCH_API.replace("{project_id}", &options.project_id);

        Self::new_with_client(client, base_url, options, bridge)
    }

    /// Creates a new `FirebaseRemoteConfig` instance with a custom client and base URL.
    /// Internal use only, primarily for testing.
    pub(crate) fn new_with_client(
        client: ClientWithMiddleware,
        base_url: String,
        options: &FirebaseOptions,
        bridge: AsyncBridge,
    ) -> Self {
        Self {
            client,
            base_url,
            api_key: options.api_key.clone(),
            app_id: options.app_id.clone(),
            app_instance_id: options.device_id.clone(),
            bridge,
            state: Arc::new(Mutex::new(ConfigState::default())),
        }
    }

    /// Replaces the in-app defaults.
    pub fn set_defaults<I, K, V>(&self, defaults: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.state.lock().defaults = defaults
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
    }

    /// Fetches with the default 12 hour cache expiration.
    pub fn fetch<F>(&self, on_complete: F)
    where
        F: FnOnce(Outcome<()>) + Send + 'static,
    {
        self.fetch_with_cache_expiration(DEFAULT_CACHE_EXPIRATION, on_complete);
    }

    /// Fetches the template values unless the last successful fetch is younger than
    /// `cache_expiration`. Fetched values are stored on the main context, right before
    /// `on_complete` runs; they stay inactive until [`activate`](Self::activate).
    pub fn fetch_with_cache_expiration<F>(&self, cache_expiration: Duration, on_complete: F)
    where
        F: FnOnce(Outcome<()>) + Send + 'static,
    {
        let state = Arc::clone(&self.state);
        let deliver = move |outcome: Outcome<Option<FetchResponse>>| {
            let outcome = match outcome.into_result() {
                Ok(Some(response)) => {
                    tracing::info!(
                        target: category::REMOTE_CONFIG,
                        entries = response.entries.len(),
                        state = ?response.state,
                        "Remote config fetched."
                    );
                    state.lock().store_fetched(response);
                    Outcome::success(())
                }
                Ok(None) => Outcome::success(()),
                Err(error) => {
                    tracing::warn!(
                        target: category::REMOTE_CONFIG,
                        code = %error.code(),
                        "Failed to fetch remote config: {}",
                        error.message()
                    );
                    Outcome::failure(error)
                }
            };
            on_complete(outcome);
        };

        let cached = self
            .state
            .lock()
            .last_fetch
            .is_some_and(|last| last.elapsed() < cache_expiration);
        if cached {
            tracing::debug!(target: category::REMOTE_CONFIG, "fetch served from cache");
            self.bridge.issue(
                "remote_config.fetch",
                |completion| {
                    completion.succeed(None);
                },
                deliver,
            );
            return;
        }

        let this = self.clone();
        self.bridge.issue_future(
            "remote_config.fetch",
            async move { this.fetch_async().await.map(Some) },
            deliver,
        );
    }

    /// Fetches, then activates on success. The payload tells whether values changed.
    pub fn fetch_and_activate<F>(&self, on_complete: F)
    where
        F: FnOnce(Outcome<bool>) + Send + 'static,
    {
        let this = self.clone();
        self.fetch(move |outcome| match outcome.error {
            None => on_complete(Outcome::success(this.activate())),
            Some(error) => on_complete(Outcome::failure(error)),
        });
    }

    /// Performs the fetch request without storing anything.
    pub async fn fetch_async(&self) -> Result<FetchResponse, crate::core::Error> {
        let body = FetchRequest {
            app_instance_id: &self.app_instance_id,
            app_id: &self.app_id,
            sdk_version: env!("CARGO_PKG_VERSION"),
        };

        let response = self
            .client
            .post(&self.base_url)
            .query(&[("key", &self.api_key)])
            .json(&body)
            .send()
            .await
            .map_err(Error::from)?;

        if !response.status().is_success() {
            return Err(parse_error_response(response, "remote config fetch failed").await);
        }

        Ok(response.json().await.map_err(Error::from)?)
    }

    /// Makes the last fetched values visible to the getters. Returns `false` when
    /// there was nothing new to activate.
    pub fn activate(&self) -> bool {
        let mut state = self.state.lock();
        if !state.activation_pending {
            return false;
        }
        state.active = state.fetched.clone();
        state.activation_pending = false;
        true
    }

    pub fn get_string(&self, key: &str) -> String {
        self.state.lock().lookup(key).0.unwrap_or_default().to_string()
    }

    pub fn get_bool(&self, key: &str) -> bool {
        let state = self.state.lock();
        state
            .lookup(key)
            .0
            .is_some_and(|v| TRUE_VALUES.contains(&v.trim().to_ascii_lowercase().as_str()))
    }

    pub fn get_i64(&self, key: &str) -> i64 {
        let state = self.state.lock();
        state
            .lookup(key)
            .0
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or_default()
    }

    pub fn get_f64(&self, key: &str) -> f64 {
        let state = self.state.lock();
        state
            .lookup(key)
            .0
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or_default()
    }

    pub fn value_source(&self, key: &str) -> ValueSource {
        self.state.lock().lookup(key).1
    }

    /// Every key with a default or an active value, sorted.
    pub fn keys(&self) -> Vec<String> {
        let state = self.state.lock();
        state
            .defaults
            .keys()
            .chain(state.active.keys())
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn template_version(&self) -> Option<String> {
        self.state.lock().template_version.clone()
    }

    /// Returns `config` with the log routing settings overridden by the `pr-*` keys.
    ///
    /// Unset keys leave the setting alone. The caller still has to hand the result to
    /// the log router, which does not watch for changes.
    pub fn apply_log_overrides(&self, config: &FirebaseConfig) -> FirebaseConfig {
        let mut config = config.clone();
        let state = self.state.lock();

        if let Some(level) = override_level(&state, LOG_LEVEL_KEY) {
            config.log_level = level;
        }
        if let Some(level) = override_level(&state, ERROR_LOG_LEVEL_KEY) {
            config.error_log_level = level;
        }
        if let Some(categories) = override_categories(&state, FORCED_LOG_CATEGORIES_KEY) {
            config.forced_log_categories = categories;
        }
        if let Some(categories) = override_categories(&state, IGNORED_LOG_CATEGORIES_KEY) {
            config.ignored_log_categories = categories;
        }

        config
    }
}

fn override_level(state: &ConfigState, key: &str) -> Option<LogLevel> {
    let value = state.lookup(key).0.filter(|v| !v.trim().is_empty())?;
    match value.parse::<LogLevel>() {
        Ok(level) => Some(level),
        Err(e) => {
            tracing::warn!(target: category::REMOTE_CONFIG, key, "ignoring override: {}", e);
            None
        }
    }
}

fn override_categories(state: &ConfigState, key: &str) -> Option<Vec<String>> {
    let value = state.lookup(key).0?;
    Some(
        value
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect(),
    )
}
