//! Storefront REST API access.
//!
//! # Architecture
//!
//! - Every endpoint answers with a `{ success, message, data? }` envelope
//! - `success: false` becomes [`ApiError::Rejected`] carrying the server message
//! - [`Transport`] is the single seam to the network; [`ApiClient`] is the
//!   `reqwest` implementation and tests swap in scripted transports
//! - [`Api`] adds typed decoding on top of any transport
//!
//! # Example
//!
//! ```rust,ignore
//! use delguur_storefront::api::{Api, ApiClient, ApiRequest};
//!
//! let api = Api::new(Arc::new(ApiClient::new(&config)?));
//! let addresses: Vec<Address> = api.call(ApiRequest::get("addresses")).await?;
//! ```

mod client;
#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use async_trait::async_trait;
pub use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use client::ApiClient;

/// Errors that can occur when talking to the storefront backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The backend answered with `success: false`.
    #[error("{0}")]
    Rejected(String),

    /// Non-success HTTP status without a usable envelope.
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The backend no longer recognizes the session.
    #[error("Session expired")]
    Unauthenticated,

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// The request URL could not be built.
    #[error("Invalid request path {path}: {reason}")]
    InvalidPath { path: String, reason: String },
}

/// A request against the storefront backend.
///
/// `path` is relative to the configured API base URL (no leading slash).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl ApiRequest {
    fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
        }
    }

    /// `GET` request.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// `POST` request.
    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// `PUT` request.
    #[must_use]
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    /// `DELETE` request.
    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Parse`] if the body cannot be serialized.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, ApiError> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }
}

/// Response envelope shared by every endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Envelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

impl Envelope {
    /// Unwrap the payload, turning `success: false` into a rejection.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Rejected`] with the server message.
    pub fn into_data(self) -> Result<Value, ApiError> {
        if self.success {
            Ok(self.data.unwrap_or(Value::Null))
        } else if self.message.is_empty() {
            Err(ApiError::Rejected("Request failed".to_string()))
        } else {
            Err(ApiError::Rejected(self.message))
        }
    }
}

/// Sends requests to the backend and returns the unwrapped envelope payload.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request.
    ///
    /// Returns the envelope's `data` (or `null` when absent).
    async fn send(&self, request: ApiRequest) -> Result<Value, ApiError>;
}

/// Typed access to a [`Transport`].
#[derive(Clone)]
pub struct Api {
    transport: Arc<dyn Transport>,
}

impl Api {
    /// Wrap a transport.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Send a request and decode its payload.
    ///
    /// # Errors
    ///
    /// Returns the transport error, or [`ApiError::Parse`] if the payload does
    /// not match `T`.
    pub async fn call<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        let path = request.path.clone();
        let data = self.transport.send(request).await?;
        serde_json::from_value(data).map_err(|e| {
            tracing::error!(path = %path, error = %e, "Unexpected payload shape");
            ApiError::Parse(e)
        })
    }

    /// Send a request whose payload is irrelevant.
    ///
    /// # Errors
    ///
    /// Returns the transport error.
    pub async fn execute(&self, request: ApiRequest) -> Result<(), ApiError> {
        self.transport.send(request).await.map(drop)
    }
}
