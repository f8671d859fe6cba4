//! Promotions and promo code checks.

use delguur_core::PromotionId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How a promotion reduces the price.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    /// `value` is a percentage of the subtotal.
    #[default]
    Percent,
    /// `value` is a fixed amount.
    Fixed,
}

/// An active promotion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Promotion {
    pub id: PromotionId,
    pub code: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub discount_type: DiscountType,
    pub value: Decimal,
    /// Minimum subtotal the promotion applies to.
    #[serde(default)]
    pub min_amount: Decimal,
    #[serde(default)]
    pub expires_at: Option<i64>,
}

impl Promotion {
    /// Discount this promotion grants on `subtotal`.
    #[must_use]
    pub fn discount_for(&self, subtotal: Decimal) -> Decimal {
        if subtotal < self.min_amount {
            return Decimal::ZERO;
        }
        let discount = match self.discount_type {
            DiscountType::Percent => subtotal * self.value / Decimal::ONE_HUNDRED,
            DiscountType::Fixed => self.value,
        };
        discount.min(subtotal).round_dp(2)
    }
}

/// Result of checking a promo code against an amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionCheck {
    pub valid: bool,
    #[serde(default)]
    pub discount: Decimal,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub promotion: Option<Promotion>,
}
