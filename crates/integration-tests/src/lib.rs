//! Shared harness for end-to-end tests of the storefront client.
//!
//! Each test starts a `wiremock` server that speaks the backend's
//! `{ success, message, data }` envelope and points a real [`Storefront`]
//! (with its `reqwest` transport) at it. The local store is a JSON file in a
//! temporary directory so tests can reopen it to simulate a restart.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p delguur-integration-tests
//! ```

#![allow(clippy::expect_used)]

use std::path::PathBuf;
use std::time::Duration;

use delguur_storefront::Storefront;
use delguur_storefront::config::StorefrontConfig;
use serde_json::{Value, json};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path prefix the backend is mounted under.
pub const API_PREFIX: &str = "/v1";

/// Session cookie set by the login mock.
pub const SESSION_COOKIE: &str = "dg_session=s3cr3t";

/// A mock backend plus a private storage directory.
pub struct TestBackend {
    pub server: MockServer,
    dir: TempDir,
}

impl TestBackend {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
            dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    /// Full mock path for an API path.
    #[must_use]
    pub fn path(api_path: &str) -> String {
        format!("{API_PREFIX}/{api_path}")
    }

    /// The local store file.
    #[must_use]
    pub fn store_path(&self) -> PathBuf {
        self.dir.path().join("store.json")
    }

    /// Client configuration with short timings.
    #[must_use]
    pub fn config(&self) -> StorefrontConfig {
        let mut config = StorefrontConfig::for_api_url(&format!("{}{API_PREFIX}", self.server.uri()))
            .expect("Mock server URI is a valid URL");
        config.storage_path = Some(self.store_path());
        config.request_timeout = Duration::from_secs(5);
        config.cart_debounce = Duration::from_millis(100);
        config.payment_poll_interval = Duration::from_millis(50);
        config
    }

    /// A fresh client over the shared store file.
    #[must_use]
    pub fn storefront(&self) -> Storefront {
        Storefront::new(self.config()).expect("Failed to build storefront")
    }

    /// Answer `POST user/login` with a session for user 7.
    pub async fn mock_login(&self) {
        Mock::given(method("POST"))
            .and(path(Self::path("user/login")))
            .respond_with(
                envelope(json!({
                    "token": "tok-7",
                    "user": {"id": 7, "email": "bat@example.mn", "name": "Bat"}
                }))
                .insert_header("set-cookie", format!("{SESSION_COOKIE}; Path=/")),
            )
            .mount(&self.server)
            .await;
    }

    /// A client that has already signed in.
    pub async fn signed_in(&self) -> Storefront {
        self.mock_login().await;
        let storefront = self.storefront();
        storefront
            .account()
            .login("bat@example.mn", "hunter22")
            .await
            .expect("Login against mock backend failed");
        storefront
    }
}

/// A successful envelope.
#[must_use]
pub fn envelope(data: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "success": true,
        "message": "",
        "data": data,
    }))
}

/// A `success: false` envelope.
#[must_use]
pub fn rejection(message: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "success": false,
        "message": message,
    }))
}

/// A two-line cart payload.
#[must_use]
pub fn cart_json(first_quantity: u32) -> Value {
    json!({
        "items": [
            {"id": 1, "productId": 10, "name": "Cashmere scarf", "price": "89000", "quantity": first_quantity, "stock": 20},
            {"id": 2, "productId": 11, "name": "Felt slippers", "price": "45000", "quantity": 1}
        ]
    })
}
