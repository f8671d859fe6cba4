//! Favorites: a cheap id set for heart icons and a detailed list page.

use delguur_core::ProductId;
use serde_json::json;
use tracing::instrument;

use crate::api::ApiRequest;
use crate::cache::keys;
use crate::error::Result;
use crate::events::DomainEvent;
use crate::models::FavoriteItem;
use crate::resource::{CachedResource, ResourceContext, ResourceSpec};

#[derive(Clone)]
pub struct FavoriteService {
    ids: CachedResource<Vec<ProductId>>,
    list: CachedResource<Vec<FavoriteItem>>,
}

impl FavoriteService {
    #[must_use]
    pub fn new(ctx: ResourceContext) -> Self {
        Self {
            ids: CachedResource::new(
                ResourceSpec {
                    name: "favorite_ids",
                    cache_key: keys::FAVORITE_IDS,
                    path: "favorites/ids",
                    policy: keys::FAVORITE_POLICY,
                    requires_auth: true,
                    event: Some(DomainEvent::FavoritesChanged),
                },
                ctx.clone(),
            ),
            list: CachedResource::new(
                ResourceSpec {
                    name: "favorite_list",
                    cache_key: keys::FAVORITE_LIST,
                    path: "favorites",
                    policy: keys::FAVORITE_POLICY,
                    requires_auth: true,
                    event: None,
                },
                ctx,
            ),
        }
    }

    /// Ids of favorited products.
    ///
    /// # Errors
    ///
    /// Returns the remote error.
    pub async fn favorite_ids(&self, force: bool) -> Result<Vec<ProductId>> {
        self.ids.fetch(force).await
    }

    /// Favorited products with details.
    ///
    /// # Errors
    ///
    /// Returns the remote error.
    pub async fn favorites(&self, force: bool) -> Result<Vec<FavoriteItem>> {
        self.list.fetch(force).await
    }

    /// Whether a product is favorited, from the loaded id set.
    #[must_use]
    pub fn is_favorite(&self, product_id: ProductId) -> bool {
        self.ids.current().contains(&product_id)
    }

    /// # Errors
    ///
    /// See [`CachedResource::mutate`].
    #[instrument(skip(self))]
    pub async fn add(&self, product_id: ProductId) -> Result<()> {
        self.ids
            .mutate(ApiRequest::post("favorites").json(&json!({ "productId": product_id }))?)
            .await?;
        self.list.invalidate();
        Ok(())
    }

    /// # Errors
    ///
    /// See [`CachedResource::mutate`].
    #[instrument(skip(self))]
    pub async fn remove(&self, product_id: ProductId) -> Result<()> {
        self.ids
            .mutate(ApiRequest::delete(format!("favorites/{product_id}")))
            .await?;
        self.list.modify(|items| items.retain(|i| i.product_id != product_id));
        self.list.invalidate();
        Ok(())
    }

    /// Add or remove; returns whether the product is now a favorite.
    ///
    /// # Errors
    ///
    /// See [`CachedResource::mutate`].
    pub async fn toggle(&self, product_id: ProductId) -> Result<bool> {
        if self.is_favorite(product_id) {
            self.remove(product_id).await?;
            Ok(false)
        } else {
            self.add(product_id).await?;
            Ok(true)
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> tokio::sync::watch::Receiver<Vec<ProductId>> {
        self.ids.subscribe()
    }

    pub fn reset(&self) {
        self.ids.reset();
        self.list.reset();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::api::Method;
    use crate::testing::TestContext;

    #[tokio::test]
    async fn test_add_refreshes_ids() {
        let t = TestContext::signed_in();
        t.transport
            .ok(Method::GET, "favorites/ids", json!([1, 2]))
            .ok(Method::GET, "favorites/ids", json!([1, 2, 5]))
            .ok(Method::POST, "favorites", json!(null));
        let service = FavoriteService::new(t.resource_context());
        service.favorite_ids(false).await.unwrap();
        assert!(!service.is_favorite(ProductId::new(5)));

        service.add(ProductId::new(5)).await.unwrap();

        assert!(service.is_favorite(ProductId::new(5)));
        assert_eq!(t.transport.calls_to(&Method::GET, "favorites/ids").len(), 2);
        let cached: Vec<ProductId> = t.cache.get(keys::FAVORITE_IDS).unwrap();
        assert!(cached.contains(&ProductId::new(5)));
    }

    #[tokio::test]
    async fn test_toggle_removes_existing() {
        let t = TestContext::signed_in();
        t.transport
            .ok(Method::GET, "favorites/ids", json!([3]))
            .ok(Method::GET, "favorites/ids", json!([]))
            .ok(Method::DELETE, "favorites/3", json!(null));
        let service = FavoriteService::new(t.resource_context());
        service.favorite_ids(false).await.unwrap();

        assert!(!service.toggle(ProductId::new(3)).await.unwrap());
        assert_eq!(t.transport.calls_to(&Method::DELETE, "favorites/3").len(), 1);
    }

    #[tokio::test]
    async fn test_signed_out_is_empty() {
        let t = TestContext::new();
        let service = FavoriteService::new(t.resource_context());
        assert!(service.favorite_ids(false).await.unwrap().is_empty());
        assert!(service.favorites(true).await.unwrap().is_empty());
        assert!(t.transport.calls().is_empty());
    }
}
