//! Catalog browsing.
//!
//! Categories and home page data are cached resources like every other
//! domain. Products change too often for the persistent cache and are kept in
//! process with `moka` (5-minute TTL); keyword searches are never cached.

mod cache;

use std::sync::Arc;

use delguur_core::{CategoryId, ProductId};
use moka::future::Cache;
use tracing::{debug, instrument};

use crate::api::ApiRequest;
use crate::cache::keys;
use crate::error::Result;
use crate::models::{Category, HomeData, Product, ProductPage, ProductQuery};
use crate::resource::{CachedResource, ResourceContext, ResourceSpec};

pub use cache::{CacheKey, CacheValue};

/// Maximum number of products and pages held in process.
const MAX_CACHED: u64 = 1000;

/// Public catalog: categories, home page and products.
#[derive(Clone)]
pub struct CatalogService {
    inner: Arc<CatalogInner>,
}

struct CatalogInner {
    ctx: ResourceContext,
    categories: CachedResource<Vec<Category>>,
    home: CachedResource<HomeData>,
    products: Cache<CacheKey, CacheValue>,
}

impl CatalogService {
    #[must_use]
    pub fn new(ctx: ResourceContext) -> Self {
        let products = Cache::builder()
            .max_capacity(MAX_CACHED)
            .time_to_live(keys::PRODUCT_TTL)
            .build();

        Self {
            inner: Arc::new(CatalogInner {
                categories: CachedResource::new(
                    ResourceSpec {
                        name: "categories",
                        cache_key: keys::CATEGORIES,
                        path: "categories",
                        policy: keys::CATEGORY_POLICY,
                        requires_auth: false,
                        event: None,
                    },
                    ctx.clone(),
                ),
                home: CachedResource::new(
                    ResourceSpec {
                        name: "home",
                        cache_key: keys::HOME_DATA,
                        path: "home",
                        policy: keys::HOME_POLICY,
                        requires_auth: false,
                        event: None,
                    },
                    ctx.clone(),
                ),
                ctx,
                products,
            }),
        }
    }

    /// Category tree.
    ///
    /// # Errors
    ///
    /// Returns the remote error.
    pub async fn categories(&self, force: bool) -> Result<Vec<Category>> {
        self.inner.categories.fetch(force).await
    }

    /// Look up a category anywhere in the loaded tree.
    #[must_use]
    pub fn category(&self, id: CategoryId) -> Option<Category> {
        self.inner
            .categories
            .current()
            .iter()
            .find_map(|c| c.find(id).cloned())
    }

    /// Banners and featured products.
    ///
    /// # Errors
    ///
    /// Returns the remote error.
    pub async fn home(&self, force: bool) -> Result<HomeData> {
        self.inner.home.fetch(force).await
    }

    /// A page of products.
    ///
    /// # Errors
    ///
    /// Returns the remote error.
    #[instrument(skip(self))]
    pub async fn products(&self, query: &ProductQuery) -> Result<ProductPage> {
        let cache_key = query.keyword.is_none().then(|| CacheKey::Products {
            category: query.category,
            page: query.page,
            page_size: query.page_size,
        });

        // Check cache (only for listings without a keyword)
        if let Some(key) = &cache_key
            && let Some(CacheValue::Products(page)) = self.inner.products.get(key).await
        {
            debug!("Cache hit for products");
            return Ok(page);
        }

        let page: ProductPage = self
            .inner
            .ctx
            .api
            .call(ApiRequest::get(query.to_path()))
            .await?;

        if let Some(key) = cache_key {
            self.inner
                .products
                .insert(key, CacheValue::Products(page.clone()))
                .await;
        }

        Ok(page)
    }

    /// A product by id.
    ///
    /// # Errors
    ///
    /// Returns the remote error, [`crate::api::ApiError::NotFound`] for an
    /// unknown product.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn product(&self, id: ProductId) -> Result<Product> {
        let key = CacheKey::Product(id);
        if let Some(CacheValue::Product(product)) = self.inner.products.get(&key).await {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let product: Product = self
            .inner
            .ctx
            .api
            .call(ApiRequest::get(format!("products/{id}")))
            .await?;

        self.inner
            .products
            .insert(key, CacheValue::Product(Box::new(product.clone())))
            .await;

        Ok(product)
    }

    /// Invalidate a cached product.
    pub async fn invalidate_product(&self, id: ProductId) {
        self.inner.products.invalidate(&CacheKey::Product(id)).await;
    }

    /// Invalidate all cached catalog data, persistent entries included.
    pub async fn invalidate_all(&self) {
        self.inner.categories.invalidate();
        self.inner.home.invalidate();
        self.inner.products.invalidate_all();
        self.inner.products.run_pending_tasks().await;
    }
}
