//! Favorites.

use delguur_core::ProductId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A favorited product with enough detail for a list row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteItem {
    pub product_id: ProductId,
    pub name: String,
    pub price: Decimal,
    #[serde(default)]
    pub image: Option<String>,
    /// Epoch milliseconds.
    #[serde(default)]
    pub created_at: i64,
}
