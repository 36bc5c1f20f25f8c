//! Firebase Cloud Functions module.
//!
//! Calls HTTPS callable functions. Requests are posted as `{"data": ...}` and the
//! function answers with `{"result": ...}` or `{"error": {"status", "message"}}`.
//! Results reach the caller on the main context through the [`AsyncBridge`].

pub mod models;

use crate::core::bridge::AsyncBridge;
use crate::core::middleware::IdTokenMiddleware;
use crate::core::{category, parse_error_response, ErrorCode, Outcome};
use crate::options::FirebaseOptions;
use models::{CallableRequest, CallableResponse};
use parking_lot::RwLock;
use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::policies::ExponentialBackoff;
use reqwest_retry::RetryTransientMiddleware;
use serde_json::Value;
use std::sync::Arc;
use url::Url;

pub const DEFAULT_REGION: &str = "us-central1";

/// Errors raised before a callable response could be interpreted.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid function url: {0}")]
    Url(#[from] url::ParseError),
    /// Wrapper for `reqwest_middleware::Error`.
    #[error("an error occurred while sending the request: {0}")]
    Request(#[from] reqwest_middleware::Error),
    /// Wrapper for `reqwest::Error`.
    #[error("an error occurred while reading the response: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("Response is missing data field.")]
    MissingResult,
}

impl From<Error> for crate::core::Error {
    fn from(error: Error) -> Self {
        let code = match &error {
            Error::Url(_) => ErrorCode::InvalidArgument,
            Error::Request(reqwest_middleware::Error::Reqwest(e)) | Error::Reqwest(e)
                if e.is_timeout() =>
            {
                ErrorCode::DeadlineExceeded
            }
            _ => ErrorCode::Internal,
        };
        crate::core::Error::native(code, error.to_string())
    }
}

/// Entry point for callable functions of one project and region.
#[derive(Clone)]
pub struct FirebaseFunctions {
    client: ClientWithMiddleware,
    bridge: AsyncBridge,
    project_id: String,
    region: String,
    emulator_origin: Arc<RwLock<Option<String>>>,
}

impl FirebaseFunctions {
    /// Functions deployed to the default region.
    pub fn new(options: &FirebaseOptions, bridge: AsyncBridge, middleware: IdTokenMiddleware) -> Self {
        Self::with_region(options, DEFAULT_REGION, bridge, middleware)
    }

    pub fn with_region(
        options: &FirebaseOptions,
        region: &str,
        bridge: AsyncBridge,
        middleware: IdTokenMiddleware,
    ) -> Self {
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);

        let client = ClientBuilder::new(Client::new())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .with(middleware)
            .build();

        Self::new_with_client(client, &options.project_id, region, bridge)
    }

    /// Creates a `FirebaseFunctions` with a custom client.
    /// Internal use only, primarily for testing.
    pub(crate) fn new_with_client(
        client: ClientWithMiddleware,
        project_id: &str,
        region: &str,
        bridge: AsyncBridge,
    ) -> Self {
        Self {
            client,
            bridge,
            project_id: project_id.to_string(),
            region: region.to_string(),
            emulator_origin: Arc::new(RwLock::new(None)),
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Sends subsequent callables to a local emulator, e.g. `http://localhost:5001`.
    pub fn use_functions_emulator(&self, origin: &str) {
        let origin = origin.trim_end_matches('/').to_string();
        tracing::info!(target: category::FUNCTIONS, %origin, "using functions emulator");
        *self.emulator_origin.write() = Some(origin);
    }

    pub fn get_https_callable(&self, name: &str) -> HttpsCallableReference {
        HttpsCallableReference {
            client: self.client.clone(),
            bridge: self.bridge.clone(),
            name: name.to_string(),
            url: self.function_url(name),
        }
    }

    fn function_url(&self, name: &str) -> String {
        match self.emulator_origin.read().as_deref() {
            Some(origin) => format!("{}/{}/{}/{}", origin, self.project_id, self.region, name),
            None => format!(
                "https://{}-{}.cloudfunctions.net/{}",
                self.region, self.project_id, name
            ),
        }
    }
}

/// A handle on one callable function. The endpoint is fixed when the reference is
/// created.
#[derive(Clone)]
pub struct HttpsCallableReference {
    client: ClientWithMiddleware,
    bridge: AsyncBridge,
    name: String,
    url: String,
}

impl HttpsCallableReference {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Calls the function with `data`. `on_complete` runs on the main context.
    pub fn call<F>(&self, data: Value, on_complete: F)
    where
        F: FnOnce(Outcome<Value>) + Send + 'static,
    {
        let reference = self.clone();
        self.bridge.issue_future(
            "functions.call",
            async move {
                let result = reference.call_async(data).await;
                if let Err(error) = &result {
                    tracing::error!(
                        target: category::FUNCTIONS,
                        function = %reference.name,
                        code = %error.code(),
                        "Function call failed. Message: {}",
                        error.message()
                    );
                }
                result
            },
            on_complete,
        );
    }

    /// Calls the function without arguments.
    pub fn call_empty<F>(&self, on_complete: F)
    where
        F: FnOnce(Outcome<Value>) + Send + 'static,
    {
        self.call(Value::Null, on_complete);
    }

    /// Performs the request without going through the main context.
    pub async fn call_async(&self, data: Value) -> Result<Value, crate::core::Error> {
        let url = Url::parse(&self.url).map_err(Error::from)?;

        let response = self
            .client
            .post(url)
            .json(&CallableRequest { data: &data })
            .send()
            .await
            .map_err(Error::from)?;

        if !response.status().is_success() {
            return Err(parse_error_response(response, "function call failed").await);
        }

        let body: CallableResponse = response.json().await.map_err(Error::from)?;
        body.into_value()
            .ok_or_else(|| Error::MissingResult.into())
    }
}
