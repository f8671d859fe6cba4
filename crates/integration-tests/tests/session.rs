//! Sign-in, persistence across restarts and sign-out against a mock backend.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use delguur_integration_tests::{SESSION_COOKIE, TestBackend, cart_json, envelope};
use rust_decimal::Decimal;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn test_login_cookie_authenticates_later_calls() {
    let backend = TestBackend::start().await;
    Mock::given(method("GET"))
        .and(path(TestBackend::path("cart")))
        .and(header("cookie", SESSION_COOKIE))
        .respond_with(envelope(cart_json(2)))
        .expect(1)
        .mount(&backend.server)
        .await;

    let storefront = backend.signed_in().await;
    let cart = storefront.cart().fetch(false).await.unwrap();

    assert_eq!(cart.items.len(), 2);
    assert_eq!(cart.total_quantity, 3);
    assert_eq!(cart.total_amount, Decimal::from(223_000));
}

#[tokio::test]
async fn test_session_and_cache_survive_restart() {
    let backend = TestBackend::start().await;
    Mock::given(method("GET"))
        .and(path(TestBackend::path("cart")))
        .respond_with(envelope(cart_json(1)))
        .expect(1)
        .mount(&backend.server)
        .await;

    let first = backend.signed_in().await;
    first.cart().fetch(false).await.unwrap();
    drop(first);

    let restarted = backend.storefront();
    assert!(restarted.auth().is_authenticated());
    assert_eq!(restarted.auth().user().unwrap().name, "Bat");
    // Served from the store file; the mock's expect(1) fails on a second call.
    let cart = restarted.cart().fetch(false).await.unwrap();
    assert_eq!(cart.items.len(), 2);
}

#[tokio::test]
async fn test_logout_wipes_user_data_from_store() {
    let backend = TestBackend::start().await;
    Mock::given(method("GET"))
        .and(path(TestBackend::path("cart")))
        .respond_with(envelope(cart_json(1)))
        .expect(1)
        .mount(&backend.server)
        .await;
    Mock::given(method("POST"))
        .and(path(TestBackend::path("user/logout")))
        .respond_with(envelope(serde_json::Value::Null))
        .expect(1)
        .mount(&backend.server)
        .await;

    let storefront = backend.signed_in().await;
    storefront.cart().fetch(false).await.unwrap();
    storefront.logout().await;
    assert!(storefront.cart().current().is_empty());

    let restarted = backend.storefront();
    assert!(!restarted.auth().is_authenticated());
    assert!(restarted.cart().fetch(false).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_logout_survives_backend_failure() {
    let backend = TestBackend::start().await;
    Mock::given(method("POST"))
        .and(path(TestBackend::path("user/logout")))
        .respond_with(ResponseTemplate::new(500))
        .mount(&backend.server)
        .await;

    let storefront = backend.signed_in().await;
    storefront.logout().await;
    assert!(!storefront.auth().is_authenticated());
}
