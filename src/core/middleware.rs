use http::Extensions;
use parking_lot::RwLock;
use reqwest::{header, Request, Response};
use reqwest_middleware::{Middleware, Next};
use std::sync::Arc;

/// Attaches the signed-in user's Firebase ID token, when there is one.
///
/// Clones share the token, so a token refreshed after sign-in is seen by every
/// client built from the same middleware.
#[derive(Clone, Default)]
pub struct IdTokenMiddleware {
    token: Arc<RwLock<Option<String>>>,
}

impl IdTokenMiddleware {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_token(&self, token: Option<String>) {
        *self.token.write() = token.filter(|t| !t.is_empty());
    }

    pub fn token(&self) -> Option<String> {
        self.token.read().clone()
    }
}

#[async_trait::async_trait]
impl Middleware for IdTokenMiddleware {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        if let Some(token) = self.token() {
            let value = header::HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|e| {
                reqwest_middleware::Error::Middleware(anyhow::anyhow!("invalid id token: {}", e))
            })?;
            req.headers_mut().insert(header::AUTHORIZATION, value);
        }

        next.run(req, extensions).await
    }
}
