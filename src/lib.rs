//! Client-side Firebase features for hosts that run a single main loop, such as
//! game engines.
//!
//! Native SDK callbacks arrive on arbitrary threads; every result is handed back
//! on the host's main context through [`core::game_thread::GameThread`].
//!
//! ```rust,no_run
//! # use firebase_features::{FirebaseFeatures, FirebaseOptions};
//! # use firebase_features::config::FirebaseConfig;
//! # use firebase_features::core::game_thread::GameThread;
//! # async fn run() {
//! let mut game_thread = GameThread::try_current().unwrap();
//! let options = FirebaseOptions::new("my-project", "api-key", "1:123:android:abc")
//!     .with_device_id("device-1234");
//! let firebase = FirebaseFeatures::new(options, FirebaseConfig::default(), game_thread.handle());
//!
//! if let Some(functions) = firebase.functions() {
//!     functions
//!         .get_https_callable("addMessage")
//!         .call(serde_json::json!({ "text": "hi" }), |outcome| {
//!             println!("{:?}", outcome.payload);
//!         });
//! }
//!
//! loop {
//!     game_thread.tick().await;
//! }
//! # }
//! ```

pub mod config;
pub mod core;
pub mod logging;
pub mod options;

#[cfg(feature = "crashlytics")]
pub mod crashlytics;
#[cfg(feature = "functions")]
pub mod functions;
#[cfg(feature = "google")]
pub mod google;
#[cfg(feature = "performance")]
pub mod performance;
#[cfg(feature = "remote_config")]
pub mod remote_config;

pub use options::FirebaseOptions;

use crate::config::FirebaseConfig;
use crate::core::bridge::AsyncBridge;
use crate::core::game_thread::GameThreadHandle;
use crate::core::middleware::IdTokenMiddleware;
#[cfg(feature = "crashlytics")]
use crashlytics::{CrashReporter, CrashlyticsProxy};
#[cfg(feature = "functions")]
use functions::FirebaseFunctions;
#[cfg(feature = "google")]
use google::{GooglePlatform, GoogleServices};
#[cfg(feature = "performance")]
use performance::{DeviceProbe, PerformanceBackend, PerformanceMonitor};
#[cfg(feature = "remote_config")]
use remote_config::FirebaseRemoteConfig;
#[cfg(any(feature = "crashlytics", feature = "google", feature = "performance"))]
use std::sync::Arc;

/// Entry point. Hands out the feature clients, all bound to one main context.
///
/// Features switched off in [`FirebaseConfig`] return `None`.
pub struct FirebaseFeatures {
    options: FirebaseOptions,
    config: FirebaseConfig,
    bridge: AsyncBridge,
    id_token: IdTokenMiddleware,
}

impl FirebaseFeatures {
    pub fn new(options: FirebaseOptions, config: FirebaseConfig, game_thread: GameThreadHandle) -> Self {
        Self {
            options,
            config,
            bridge: AsyncBridge::new(game_thread),
            id_token: IdTokenMiddleware::new(),
        }
    }

    pub fn options(&self) -> &FirebaseOptions {
        &self.options
    }

    pub fn config(&self) -> &FirebaseConfig {
        &self.config
    }

    pub fn game_thread(&self) -> &GameThreadHandle {
        self.bridge.game_thread()
    }

    pub fn bridge(&self) -> &AsyncBridge {
        &self.bridge
    }

    /// The signed-in user's ID token, attached to callable function requests.
    pub fn id_token(&self) -> &IdTokenMiddleware {
        &self.id_token
    }

    /// Creates the Crashlytics proxy and tags reports with the device id.
    #[cfg(feature = "crashlytics")]
    pub fn crashlytics(&self, reporter: Arc<dyn CrashReporter>) -> Option<CrashlyticsProxy> {
        if !self.config.enable_crashlytics {
            return None;
        }
        let proxy = CrashlyticsProxy::new(&self.config, reporter, self.game_thread().clone());
        proxy.initialize(&self.options.device_id);
        Some(proxy)
    }

    #[cfg(feature = "functions")]
    pub fn functions(&self) -> Option<FirebaseFunctions> {
        self.config.enable_functions.then(|| {
            FirebaseFunctions::new(&self.options, self.bridge.clone(), self.id_token.clone())
        })
    }

    #[cfg(feature = "functions")]
    pub fn functions_in_region(&self, region: &str) -> Option<FirebaseFunctions> {
        self.config.enable_functions.then(|| {
            FirebaseFunctions::with_region(
                &self.options,
                region,
                self.bridge.clone(),
                self.id_token.clone(),
            )
        })
    }

    #[cfg(feature = "google")]
    pub fn google(&self, platform: Arc<dyn GooglePlatform>) -> GoogleServices {
        GoogleServices::new(&self.config, platform, self.bridge.clone())
    }

    #[cfg(feature = "remote_config")]
    pub fn remote_config(&self) -> Option<FirebaseRemoteConfig> {
        self.config
            .enable_remote_config
            .then(|| FirebaseRemoteConfig::new(&self.options, self.bridge.clone()))
    }

    /// Starts the traces listed in the configuration.
    #[cfg(feature = "performance")]
    pub fn performance(
        &self,
        backend: Arc<dyn PerformanceBackend>,
        probe: Arc<dyn DeviceProbe>,
    ) -> Option<PerformanceMonitor> {
        self.config.enable_performances.then(|| {
            PerformanceMonitor::start(
                &self.config.traces,
                backend,
                probe,
                self.game_thread().clone(),
            )
        })
    }
}

#[cfg(all(
    test,
    feature = "crashlytics",
    feature = "functions",
    feature = "google",
    feature = "performance",
    feature = "remote_config"
))]
