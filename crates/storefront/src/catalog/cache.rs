//! In-process cache types for catalog responses.

use delguur_core::{CategoryId, ProductId};

use crate::models::{Product, ProductPage};

/// Cache key for products and product pages.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum CacheKey {
    Product(ProductId),
    Products {
        category: Option<CategoryId>,
        page: u32,
        page_size: u32,
    },
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Product(Box<Product>),
    Products(ProductPage),
}
