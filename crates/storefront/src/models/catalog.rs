//! Catalog models: categories, home page data and products.

use delguur_core::{CategoryId, ProductId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::ResourceValue;

/// A product category; the tree is at most a few levels deep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub children: Vec<Category>,
}

impl Category {
    /// Depth-first search for a category in this subtree.
    #[must_use]
    pub fn find(&self, id: CategoryId) -> Option<&Self> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }
}

/// Home page carousel entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Banner {
    pub image: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
}

/// Product card data used in lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSummary {
    pub id: ProductId,
    pub name: String,
    pub price: Decimal,
    #[serde(default)]
    pub original_price: Option<Decimal>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub sales: u64,
}

/// Home page payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeData {
    #[serde(default)]
    pub banners: Vec<Banner>,
    #[serde(default)]
    pub featured: Vec<ProductSummary>,
    #[serde(default)]
    pub new_arrivals: Vec<ProductSummary>,
}

impl ResourceValue for HomeData {}

/// Full product detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[serde(default)]
    pub original_price: Option<Decimal>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
}

impl Product {
    /// Whether at least one unit can be ordered.
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock > 0
    }
}

/// One page of a product listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPage {
    #[serde(default)]
    pub items: Vec<ProductSummary>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub page_size: u32,
}

/// Filters for a product listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProductQuery {
    pub category: Option<CategoryId>,
    /// Free-text search; searches are never cached.
    pub keyword: Option<String>,
    pub page: u32,
    pub page_size: u32,
}

impl Default for ProductQuery {
    fn default() -> Self {
        Self {
            category: None,
            keyword: None,
            page: 1,
            page_size: 20,
        }
    }
}

impl ProductQuery {
    /// Request path including the query string.
    #[must_use]
    pub fn to_path(&self) -> String {
        let mut path = format!("products?page={}&pageSize={}", self.page, self.page_size);
        if let Some(category) = self.category {
            path.push_str(&format!("&categoryId={category}"));
        }
        if let Some(keyword) = self.keyword.as_deref() {
            path.push_str(&format!("&keyword={}", urlencoding::encode(keyword)));
        }
        path
    }
}
