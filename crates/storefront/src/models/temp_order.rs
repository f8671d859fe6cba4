//! Temp (buy-now) orders: a priced draft created straight from a product page.

use delguur_core::{AddressId, ProductId, TempOrderId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::checkout::CheckoutLine;

/// A product and quantity to buy now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TempOrderLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// A draft order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TempOrder {
    pub id: TempOrderId,
    #[serde(default)]
    pub lines: Vec<CheckoutLine>,
    #[serde(default)]
    pub address_id: Option<AddressId>,
    #[serde(default)]
    pub promotion_code: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub subtotal: Decimal,
    #[serde(default)]
    pub discount: Decimal,
    #[serde(default)]
    pub shipping_fee: Decimal,
    #[serde(default)]
    pub total: Decimal,
}

/// Changes to a draft; unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TempOrderUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_id: Option<AddressId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl TempOrderUpdate {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.address_id.is_none() && self.promotion_code.is_none() && self.note.is_none()
    }
}
