//! Order models.

use delguur_core::{OrderId, OrderStatus, ProductId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::ResourceValue;

/// Order row in a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub id: OrderId,
    pub order_no: String,
    pub status: OrderStatus,
    pub total_amount: Decimal,
    #[serde(default)]
    pub item_count: u32,
    /// Epoch milliseconds.
    #[serde(default)]
    pub created_at: i64,
}

/// One page of the order list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPage {
    #[serde(default)]
    pub items: Vec<OrderSummary>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub page_size: u32,
}

impl ResourceValue for OrderPage {}

/// A purchased line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: ProductId,
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    pub price: Decimal,
    pub quantity: u32,
}

/// Full order with lines and delivery data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetail {
    pub id: OrderId,
    #[serde(default)]
    pub order_no: String,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub lines: Vec<OrderLine>,
    #[serde(default)]
    pub subtotal: Decimal,
    #[serde(default)]
    pub discount: Decimal,
    #[serde(default)]
    pub shipping_fee: Decimal,
    #[serde(default)]
    pub total_amount: Decimal,
    #[serde(default)]
    pub receiver_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub paid_at: Option<i64>,
}

impl ResourceValue for OrderDetail {}

/// Filters for the order list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderQuery {
    pub status: Option<OrderStatus>,
    pub page: u32,
    pub page_size: u32,
}

impl Default for OrderQuery {
    fn default() -> Self {
        Self {
            status: None,
            page: 1,
            page_size: 10,
        }
    }
}

impl OrderQuery {
    /// Cache key of this page.
    #[must_use]
    pub fn cache_key(&self) -> String {
        let status = self.status.map(|s| s.to_string());
        crate::cache::keys::order_list(status.as_deref(), self.page, self.page_size)
    }

    /// Request path including the query string.
    #[must_use]
    pub fn to_path(&self) -> String {
        let mut path = format!("orders?page={}&pageSize={}", self.page, self.page_size);
        if let Some(status) = self.status {
            path.push_str(&format!("&status={status}"));
        }
        path
    }
}
