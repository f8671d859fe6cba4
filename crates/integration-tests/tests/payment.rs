//! QPay invoice creation and status polling with real timers.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use delguur_core::{OrderId, OrderStatus, PaymentStatus};
use delguur_integration_tests::{TestBackend, envelope};
use serde_json::json;
use wiremock::Mock;
use wiremock::matchers::{body_json, method, path};

const ORDER: i64 = 90;

async fn mount_invoice(backend: &TestBackend, status: &str) {
    Mock::given(method("POST"))
        .and(path(TestBackend::path("qpay/create")))
        .and(body_json(json!({"orderId": ORDER})))
        .respond_with(envelope(json!({
            "invoiceId": "inv-90",
            "orderId": ORDER,
            "qrImage": "iVBORw0KGgo=",
            "qrText": "0002010102121531",
            "urls": [{"name": "Khan bank", "link": "khanbank://q?qPay_QRcode=0002"}],
            "amount": "134000",
            "status": status
        })))
        .expect(1)
        .mount(&backend.server)
        .await;
}

async fn mount_status(backend: &TestBackend, status: &str, times: Option<u64>) {
    let mock = Mock::given(method("GET"))
        .and(path(TestBackend::path(&format!("qpay/status/{ORDER}"))))
        .respond_with(envelope(json!({"status": status, "invoiceId": "inv-90"})));
    let mock = match times {
        Some(n) => mock.up_to_n_times(n),
        None => mock,
    };
    mock.mount(&backend.server).await;
}

async fn mount_paid_order(backend: &TestBackend) {
    Mock::given(method("GET"))
        .and(path(TestBackend::path(&format!("orders/{ORDER}"))))
        .respond_with(envelope(json!({"id": ORDER, "orderNo": "DG-0090", "status": "paid"})))
        .mount(&backend.server)
        .await;
}

async fn status_requests(backend: &TestBackend) -> usize {
    let wanted = TestBackend::path(&format!("qpay/status/{ORDER}"));
    backend
        .server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == wanted)
        .count()
}

#[tokio::test]
async fn test_pending_invoice_polls_until_paid() {
    let backend = TestBackend::start().await;
    mount_invoice(&backend, "PENDING").await;
    mount_status(&backend, "PENDING", Some(2)).await;
    mount_status(&backend, "PAID", None).await;
    mount_paid_order(&backend).await;

    let storefront = backend.signed_in().await;
    let payments = storefront.payments();
    let invoice = payments.create_payment(OrderId::new(ORDER)).await.unwrap();
    assert_eq!(invoice.urls.len(), 1);
    assert!(payments.is_polling());

    tokio::time::timeout(Duration::from_secs(5), async {
        while payments.is_polling() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("Polling did not stop");

    assert_eq!(payments.session().unwrap().status, PaymentStatus::Paid);
    assert_eq!(status_requests(&backend).await, 3);

    // The paid order was reloaded.
    let order = storefront
        .orders()
        .detail(OrderId::new(ORDER), false)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.status, OrderStatus::Paid);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(status_requests(&backend).await, 3);
}

#[tokio::test]
async fn test_settled_invoice_is_not_polled() {
    let backend = TestBackend::start().await;
    mount_invoice(&backend, "PAID").await;
    mount_paid_order(&backend).await;

    let storefront = backend.signed_in().await;
    storefront
        .payments()
        .create_payment(OrderId::new(ORDER))
        .await
        .unwrap();

    assert!(!storefront.payments().is_polling());
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(status_requests(&backend).await, 0);
}

#[tokio::test]
async fn test_pending_payment_resumes_after_restart() {
    let backend = TestBackend::start().await;
    mount_invoice(&backend, "PENDING").await;
    mount_status(&backend, "PENDING", None).await;

    let first = backend.signed_in().await;
    first
        .payments()
        .create_payment(OrderId::new(ORDER))
        .await
        .unwrap();
    first.payments().stop();
    drop(first);

    let before = status_requests(&backend).await;
    let restarted = backend.storefront();
    assert!(restarted.payments().is_polling());
    let session = restarted.payments().session().unwrap();
    assert_eq!(session.order_id, OrderId::new(ORDER));
    assert_eq!(session.invoice_id.as_deref(), Some("inv-90"));

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(status_requests(&backend).await > before);
    restarted.payments().stop();
}
