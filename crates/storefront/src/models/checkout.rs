//! Checkout models.

use delguur_core::{AddressId, CartItemId, OrderId, ProductId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Address, Promotion, ResourceValue};

/// A delivery option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingMethod {
    pub code: String,
    pub name: String,
    pub fee: Decimal,
    /// Subtotal from which delivery is free.
    #[serde(default)]
    pub free_over: Option<Decimal>,
}

impl ShippingMethod {
    /// Fee charged for a given subtotal.
    #[must_use]
    pub fn fee_for(&self, subtotal: Decimal) -> Decimal {
        match self.free_over {
            Some(threshold) if subtotal >= threshold => Decimal::ZERO,
            _ => self.fee,
        }
    }
}

/// Data needed to render the checkout page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutInfo {
    #[serde(default)]
    pub addresses: Vec<Address>,
    #[serde(default)]
    pub shipping_methods: Vec<ShippingMethod>,
    #[serde(default)]
    pub promotions: Vec<Promotion>,
}

impl ResourceValue for CheckoutInfo {}

/// Parameters of an order preview or submission.
///
/// Serialized field order is fixed, so equal parameters hash to the same
/// preview cache key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewParams {
    pub cart_item_ids: Vec<CartItemId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_id: Option<AddressId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl PreviewParams {
    /// Parameters for the given lines and nothing else.
    #[must_use]
    pub const fn for_items(cart_item_ids: Vec<CartItemId>) -> Self {
        Self {
            cart_item_ids,
            address_id: None,
            shipping_method: None,
            promotion_code: None,
            note: None,
        }
    }
}

/// A line as priced by the checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutLine {
    pub product_id: ProductId,
    pub name: String,
    pub price: Decimal,
    pub quantity: u32,
}

/// Server-priced order before submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPreview {
    #[serde(default)]
    pub lines: Vec<CheckoutLine>,
    #[serde(default)]
    pub subtotal: Decimal,
    #[serde(default)]
    pub discount: Decimal,
    #[serde(default)]
    pub shipping_fee: Decimal,
    #[serde(default)]
    pub total: Decimal,
}

impl ResourceValue for OrderPreview {}

/// Reply to a checkout or temp-order submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedOrder {
    pub order_id: OrderId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_serialize_stably() {
        let params = PreviewParams {
            promotion_code: Some("WINTER".to_string()),
            ..PreviewParams::for_items(vec![CartItemId::new(2), CartItemId::new(1)])
        };
        assert_eq!(
            serde_json::to_string(&params).ok().as_deref(),
            Some(r#"{"cartItemIds":[2,1],"promotionCode":"WINTER"}"#)
        );
    }

    #[test]
    fn test_shipping_fee_for() {
        let method = ShippingMethod {
            code: "ub".to_string(),
            name: "Ulaanbaatar courier".to_string(),
            fee: Decimal::from(5_000),
            free_over: Some(Decimal::from(100_000)),
        };
        assert_eq!(method.fee_for(Decimal::from(20_000)), Decimal::from(5_000));
        assert_eq!(method.fee_for(Decimal::from(100_000)), Decimal::ZERO);
    }
}
