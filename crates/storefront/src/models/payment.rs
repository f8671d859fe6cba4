//! QPay payment models.

use delguur_core::{OrderId, PaymentStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A bank app deep link offered by QPay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankLink {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub logo: Option<String>,
    pub link: String,
}

/// Invoice created for an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QPayInvoice {
    pub invoice_id: String,
    pub order_id: OrderId,
    /// Base64-encoded PNG of the payment QR code.
    #[serde(default)]
    pub qr_image: String,
    #[serde(default)]
    pub qr_text: String,
    #[serde(default)]
    pub urls: Vec<BankLink>,
    #[serde(default)]
    pub amount: Decimal,
    /// Status at creation; already terminal if the order was settled.
    #[serde(default)]
    pub status: PaymentStatus,
}

/// Reply to a status query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusReply {
    pub status: PaymentStatus,
    #[serde(default)]
    pub invoice_id: Option<String>,
    #[serde(default)]
    pub paid_at: Option<i64>,
}

/// Snapshot of a payment in progress, persisted so it can be resumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSession {
    pub order_id: OrderId,
    #[serde(default)]
    pub invoice_id: Option<String>,
    pub status: PaymentStatus,
    /// Epoch milliseconds of the last observed status.
    pub updated_at: i64,
}
