//! Cart models.

use delguur_core::{CartItemId, CurrencyCode, Money, ProductId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::ResourceValue;

/// One line in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: CartItemId,
    pub product_id: ProductId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    /// Unit price.
    #[serde(default)]
    pub price: Decimal,
    pub quantity: u32,
    /// Whether the line is ticked for checkout.
    #[serde(default = "selected_by_default")]
    pub selected: bool,
    /// Units in stock, when the backend reports it.
    #[serde(default)]
    pub stock: Option<u32>,
}

const fn selected_by_default() -> bool {
    true
}

impl CartItem {
    /// Price of the whole line.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// The signed-in user's cart.
///
/// `total_quantity` and `total_amount` are derived; they are recomputed
/// after every decode and every local edit and never trusted from the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    #[serde(default)]
    pub items: Vec<CartItem>,
    /// Units across all lines.
    #[serde(default)]
    pub total_quantity: u32,
    /// Amount across selected lines.
    #[serde(default)]
    pub total_amount: Decimal,
    #[serde(default)]
    pub currency: CurrencyCode,
}

impl Cart {
    /// Recompute the derived totals.
    pub fn recompute(&mut self) {
        self.total_quantity = self.items.iter().map(|i| i.quantity).sum();
        self.total_amount = self
            .items
            .iter()
            .filter(|i| i.selected)
            .map(CartItem::line_total)
            .sum();
    }

    /// Look up a line.
    #[must_use]
    pub fn item(&self, id: CartItemId) -> Option<&CartItem> {
        self.items.iter().find(|i| i.id == id)
    }

    /// Set a line's quantity and recompute totals.
    ///
    /// Returns the previous quantity, or `None` if the line is unknown.
    pub fn set_quantity(&mut self, id: CartItemId, quantity: u32) -> Option<u32> {
        let item = self.items.iter_mut().find(|i| i.id == id)?;
        let previous = std::mem::replace(&mut item.quantity, quantity);
        self.recompute();
        Some(previous)
    }

    /// Ids of the lines ticked for checkout.
    #[must_use]
    pub fn selected_ids(&self) -> Vec<CartItemId> {
        self.items
            .iter()
            .filter(|i| i.selected)
            .map(|i| i.id)
            .collect()
    }

    /// Selected amount with currency.
    #[must_use]
    pub const fn total(&self) -> Money {
        Money::new(self.total_amount, self.currency)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl ResourceValue for Cart {
    fn normalize(&mut self) {
        self.recompute();
    }
}

/// Price breakdown for a set of cart lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartPreview {
    #[serde(default)]
    pub items: Vec<CartItem>,
    pub subtotal: Decimal,
    #[serde(default)]
    pub discount: Decimal,
    #[serde(default)]
    pub shipping_fee: Decimal,
    pub total: Decimal,
}
