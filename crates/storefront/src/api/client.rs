//! `reqwest` transport for the storefront backend.

use async_trait::async_trait;
use serde_json::Value;
use tracing::instrument;
use url::Url;

use super::{ApiError, ApiRequest, Envelope, Transport};
use crate::config::StorefrontConfig;

/// Longest slice of a response body copied into logs and errors.
const BODY_PREVIEW_CHARS: usize = 500;

/// HTTP client for the storefront backend.
///
/// Keeps a cookie jar: the backend's session cookie set on login is what
/// authenticates later calls.
#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &StorefrontConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(config.request_timeout)
            .user_agent(concat!("delguur-storefront/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_url.clone(),
        })
    }

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::InvalidPath {
                path: path.to_string(),
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl Transport for ApiClient {
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    async fn send(&self, request: ApiRequest) -> Result<Value, ApiError> {
        let url = self.url(&request.path)?;

        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .header("Accept", "application/json");
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();

        // Check for rate limiting
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(ApiError::RateLimited(retry_after));
        }

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthenticated);
        }

        // Get response body as text first for better error diagnostics
        let response_text = response.text().await?;
        let envelope = serde_json::from_str::<Envelope>(&response_text);

        if status == reqwest::StatusCode::NOT_FOUND {
            let message = envelope
                .ok()
                .map(|e| e.message)
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| request.path.clone());
            return Err(ApiError::NotFound(message));
        }

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %preview(&response_text),
                "Storefront API returned non-success status"
            );
            // Prefer the server's own message when it still sent an envelope
            let message = match envelope {
                Ok(envelope) if !envelope.message.is_empty() => envelope.message,
                _ => preview(&response_text),
            };
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let envelope = envelope.map_err(|e| {
            tracing::error!(
                error = %e,
                body = %preview(&response_text),
                "Failed to parse storefront response envelope"
            );
            ApiError::Parse(e)
        })?;

        envelope.into_data().inspect_err(|e| {
            tracing::debug!(error = %e, "Storefront API rejected request");
        })
    }
}

fn preview(body: &str) -> String {
    body.chars().take(BODY_PREVIEW_CHARS).collect()
}
