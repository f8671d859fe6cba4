//! Shopping cart.
//!
//! Adding, removing and clearing lines write through and re-fetch the cart.
//! Quantity edits from steppers go through an [`OptimisticUpdater`] so the
//! totals move immediately and rapid clicks collapse into one request.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use delguur_core::{CartItemId, ProductId};
use serde_json::json;
use tracing::instrument;

use crate::api::ApiRequest;
use crate::cache::keys;
use crate::error::{AppError, Result, add_breadcrumb};
use crate::events::DomainEvent;
use crate::models::{Cart, CartPreview};
use crate::optimistic::{MutationState, OptimisticTarget, OptimisticUpdater, PendingCommit};
use crate::resource::{CachedResource, ResourceContext, ResourceSpec};

/// Upper bound for a single line.
pub const MAX_LINE_QUANTITY: u32 = 99;

/// Cart of the signed-in user.
#[derive(Clone)]
pub struct CartService {
    cart: CachedResource<Cart>,
    quantities: OptimisticUpdater<CartItemId, u32>,
}

impl CartService {
    #[must_use]
    pub fn new(ctx: ResourceContext, debounce: Duration) -> Self {
        let cart = CachedResource::new(
            ResourceSpec {
                name: "cart",
                cache_key: keys::CART_DATA,
                path: "cart",
                policy: keys::CART_POLICY,
                requires_auth: true,
                event: Some(DomainEvent::CartChanged),
            },
            ctx,
        );
        let target = Arc::new(CartQuantities { cart: cart.clone() });
        Self {
            quantities: OptimisticUpdater::new(target, debounce),
            cart,
        }
    }

    /// The cart; empty when signed out.
    ///
    /// While quantity edits are pending, a non-forced read returns the
    /// in-memory cart so the cached copy cannot overwrite them.
    ///
    /// # Errors
    ///
    /// Returns the remote error.
    pub async fn fetch(&self, force: bool) -> Result<Cart> {
        if !force && self.quantities.has_pending() && self.cart.is_loaded() {
            return Ok(self.cart.current());
        }
        self.cart.fetch(force).await
    }

    /// Add `quantity` units of a product.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::BadRequest`] for a zero or excessive quantity,
    /// otherwise see [`CachedResource::mutate`].
    #[instrument(skip(self))]
    pub async fn add(&self, product_id: ProductId, quantity: u32) -> Result<Cart> {
        validate_quantity(quantity)?;
        let product = product_id.to_string();
        add_breadcrumb("cart", "Added to cart", Some(&[("product_id", product.as_str())]));
        self.cart
            .mutate(
                ApiRequest::post("cart")
                    .json(&json!({ "productId": product_id, "quantity": quantity }))?,
            )
            .await?;
        Ok(self.cart.current())
    }

    /// Set a line's quantity and wait for the backend.
    ///
    /// # Errors
    ///
    /// See [`CartService::add`].
    #[instrument(skip(self))]
    pub async fn update_quantity(&self, id: CartItemId, quantity: u32) -> Result<Cart> {
        validate_quantity(quantity)?;
        self.cart
            .mutate(ApiRequest::put(format!("cart/{id}")).json(&json!({ "quantity": quantity }))?)
            .await?;
        Ok(self.cart.current())
    }

    /// Set a line's quantity locally now and commit it after the debounce.
    ///
    /// The returned future resolves once the value is committed, replaced by
    /// a newer edit, or rolled back.
    ///
    /// # Errors
    ///
    /// Fails immediately when signed out, for an invalid quantity, for an
    /// unknown line, or when the quantity exceeds known stock.
    pub fn set_quantity(&self, id: CartItemId, quantity: u32) -> Result<PendingCommit> {
        self.cart.context().auth.require()?;
        validate_quantity(quantity)?;
        let cart = self.cart.current();
        let item = cart
            .item(id)
            .ok_or_else(|| AppError::NotFound(format!("cart item {id}")))?;
        if let Some(stock) = item.stock
            && quantity > stock
        {
            return Err(AppError::BadRequest(format!("Only {stock} left in stock")));
        }
        self.quantities.update(id, quantity)
    }

    /// Pending state of a line's quantity.
    #[must_use]
    pub fn quantity_state(&self, id: CartItemId) -> MutationState<u32> {
        self.quantities.state(&id)
    }

    /// # Errors
    ///
    /// See [`CachedResource::mutate`].
    #[instrument(skip(self))]
    pub async fn remove(&self, id: CartItemId) -> Result<Cart> {
        self.cart
            .mutate(ApiRequest::delete(format!("cart/{id}")))
            .await?;
        Ok(self.cart.current())
    }

    /// # Errors
    ///
    /// See [`CachedResource::mutate`].
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<()> {
        self.quantities.cancel_all();
        self.cart.mutate(ApiRequest::delete("cart/clear")).await
    }

    /// Tick or untick a line for checkout. Local only.
    pub fn select(&self, id: CartItemId, selected: bool) {
        self.cart.modify(|cart| {
            if let Some(item) = cart.items.iter_mut().find(|i| i.id == id) {
                item.selected = selected;
            }
        });
        self.cart.persist();
    }

    /// Server-side price breakdown of the selected lines.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::BadRequest`] when nothing is selected, or the
    /// remote error.
    #[instrument(skip(self))]
    pub async fn preview(&self) -> Result<CartPreview> {
        self.cart.context().auth.require()?;
        let ids = self.cart.current().selected_ids();
        if ids.is_empty() {
            return Err(AppError::BadRequest("Select at least one item".to_string()));
        }
        let request = ApiRequest::post("cart/preview").json(&json!({ "cartItemIds": ids }))?;
        Ok(self.cart.context().api.call(request).await?)
    }

    /// Drop the cart cache so the next read goes to the network.
    pub fn invalidate(&self) {
        self.cart.invalidate();
    }

    #[must_use]
    pub fn subscribe(&self) -> tokio::sync::watch::Receiver<Cart> {
        self.cart.subscribe()
    }

    #[must_use]
    pub fn current(&self) -> Cart {
        self.cart.current()
    }

    pub fn reset(&self) {
        self.quantities.cancel_all();
        self.cart.reset();
    }
}

fn validate_quantity(quantity: u32) -> Result<()> {
    if quantity == 0 {
        return Err(AppError::BadRequest("Quantity must be at least 1".to_string()));
    }
    if quantity > MAX_LINE_QUANTITY {
        return Err(AppError::BadRequest(format!(
            "Quantity cannot exceed {MAX_LINE_QUANTITY}"
        )));
    }
    Ok(())
}

struct CartQuantities {
    cart: CachedResource<Cart>,
}

#[async_trait]
impl OptimisticTarget<CartItemId, u32> for CartQuantities {
    fn apply(&self, id: &CartItemId, quantity: &u32) -> Option<u32> {
        let mut previous = None;
        self.cart.modify(|cart| previous = cart.set_quantity(*id, *quantity));
        previous
    }

    async fn commit(&self, id: &CartItemId, quantity: &u32) -> Result<()> {
        let request = ApiRequest::put(format!("cart/{id}")).json(&json!({ "quantity": quantity }))?;
        self.cart.context().api.execute(request).await?;
        Ok(())
    }

    fn settle(&self, id: &CartItemId, quantity: &u32) {
        // The backend holds `quantity` now, even if a reload replaced the line.
        self.cart.modify(|cart| {
            cart.set_quantity(*id, *quantity);
        });
        self.cart.persist();
        self.cart.context().events.publish(DomainEvent::CartChanged);
    }

    fn revert(&self, id: &CartItemId, applied: &u32, previous: &u32) {
        self.cart.modify(|cart| {
            if cart.item(*id).is_some_and(|i| i.quantity == *applied) {
                cart.set_quantity(*id, *previous);
            }
        });
    }

    fn invalidate(&self) {
        self.cart.invalidate();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::*;
    use crate::api::Method;
    use crate::models::CartItem;
    use crate::models::cart::tests::item;
    use crate::optimistic::CommitOutcome;
    use crate::testing::TestContext;

    const DEBOUNCE: Duration = Duration::from_millis(500);

    fn seeded(t: &TestContext, items: Vec<CartItem>) -> CartService {
        let mut cart = Cart {
            items,
            ..Cart::default()
        };
        cart.recompute();
        t.cache.set(keys::CART_DATA, &cart, Some(keys::CART_POLICY.ttl));
        CartService::new(t.resource_context(), DEBOUNCE)
    }

    #[tokio::test(start_paused = true)]
    async fn test_optimistic_apply_then_commit() {
        let t = TestContext::signed_in();
        t.transport.ok(Method::PUT, "cart/1", json!(null));
        let service = seeded(&t, vec![item(1, 1000, 1), item(2, 500, 2)]);
        service.fetch(false).await.unwrap();

        let pending = service.set_quantity(CartItemId::new(1), 3).unwrap();
        let cart = service.current();
        assert_eq!(cart.total_quantity, 5);
        assert_eq!(cart.total_amount, Decimal::from(4000));
        assert_eq!(service.quantity_state(CartItemId::new(1)), MutationState::Pending(3));

        assert_eq!(pending.await.unwrap(), CommitOutcome::Committed);
        let cached: Cart = t.cache.get(keys::CART_DATA).unwrap();
        assert_eq!(cached.item(CartItemId::new(1)).unwrap().quantity, 3);
        assert_eq!(cached.total_quantity, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_commit_reverts_totals() {
        let t = TestContext::signed_in();
        t.transport.reject(Method::PUT, "cart/1", "Out of stock");
        let service = seeded(&t, vec![item(1, 1000, 1), item(2, 500, 2)]);
        service.fetch(false).await.unwrap();

        let pending = service.set_quantity(CartItemId::new(1), 4).unwrap();
        assert_eq!(service.current().total_quantity, 6);

        let err = pending.await.unwrap_err();
        assert_eq!(err.to_string(), "Out of stock");
        let cart = service.current();
        assert_eq!(cart.item(CartItemId::new(1)).unwrap().quantity, 1);
        assert_eq!(cart.total_quantity, 3);
        assert_eq!(cart.total_amount, Decimal::from(2000));
        assert!(!t.cache.contains(keys::CART_DATA));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_edits_send_one_request() {
        let t = TestContext::signed_in();
        t.transport.ok(Method::PUT, "cart/1", json!(null));
        let service = seeded(&t, vec![item(1, 1000, 1)]);
        service.fetch(false).await.unwrap();

        let first = service.set_quantity(CartItemId::new(1), 2).unwrap();
        let second = service.set_quantity(CartItemId::new(1), 3).unwrap();

        assert_eq!(first.await.unwrap(), CommitOutcome::Superseded);
        assert_eq!(second.await.unwrap(), CommitOutcome::Committed);
        let puts = t.transport.calls_to(&Method::PUT, "cart/1");
        assert_eq!(puts.len(), 1);
        assert_eq!(puts[0].body, Some(json!({"quantity": 3})));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_read_keeps_pending_quantity() {
        let t = TestContext::signed_in();
        t.transport.ok(Method::PUT, "cart/1", json!(null));
        let service = seeded(&t, vec![item(1, 1000, 1), item(2, 500, 2)]);
        service.fetch(false).await.unwrap();

        let pending = service.set_quantity(CartItemId::new(1), 3).unwrap();
        let cart = service.fetch(false).await.unwrap();
        assert_eq!(cart.item(CartItemId::new(1)).unwrap().quantity, 3);

        // Past the refresh interval the cached copy would be reloaded.
        t.clock
            .advance(keys::CART_POLICY.refresh_interval + Duration::from_secs(1));
        let cart = service.fetch(false).await.unwrap();
        assert_eq!(cart.item(CartItemId::new(1)).unwrap().quantity, 3);
        assert_eq!(cart.total_quantity, 5);

        assert_eq!(pending.await.unwrap(), CommitOutcome::Committed);
        let cached: Cart = t.cache.get(keys::CART_DATA).unwrap();
        assert_eq!(cached.item(CartItemId::new(1)).unwrap().quantity, 3);
        assert_eq!(service.current().item(CartItemId::new(1)).unwrap().quantity, 3);
        assert_eq!(
            t.transport.calls_to(&Method::PUT, "cart/1")[0].body,
            Some(json!({"quantity": 3}))
        );
        assert!(t.transport.calls_to(&Method::GET, "cart").is_empty());
    }

    fn server_cart(quantity: u32) -> serde_json::Value {
        json!({"items": [
            {"id": 1, "productId": 100, "price": "1000", "quantity": quantity},
            {"id": 4, "productId": 40, "price": "1500", "quantity": 1},
        ]})
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_reload_during_debounce_then_commit() {
        let t = TestContext::signed_in();
        t.transport
            .ok(Method::POST, "cart", json!(null))
            .ok(Method::GET, "cart", server_cart(2))
            .ok(Method::PUT, "cart/1", json!(null));
        let service = seeded(&t, vec![item(1, 1000, 1)]);
        service.fetch(false).await.unwrap();

        let pending = service.set_quantity(CartItemId::new(1), 3).unwrap();
        let cart = service.add(ProductId::new(40), 1).await.unwrap();
        assert_eq!(cart.item(CartItemId::new(1)).unwrap().quantity, 2);

        assert_eq!(pending.await.unwrap(), CommitOutcome::Committed);
        let cart = service.current();
        assert_eq!(cart.item(CartItemId::new(1)).unwrap().quantity, 3);
        assert_eq!(cart.total_quantity, 4);
        let cached: Cart = t.cache.get(keys::CART_DATA).unwrap();
        assert_eq!(cached, cart);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_commit_keeps_newer_server_quantity() {
        let t = TestContext::signed_in();
        t.transport
            .ok(Method::POST, "cart", json!(null))
            .ok(Method::GET, "cart", server_cart(2))
            .reject(Method::PUT, "cart/1", "Out of stock");
        let service = seeded(&t, vec![item(1, 1000, 1)]);
        service.fetch(false).await.unwrap();

        let pending = service.set_quantity(CartItemId::new(1), 3).unwrap();
        service.add(ProductId::new(40), 1).await.unwrap();

        assert!(pending.await.is_err());
        let cart = service.current();
        assert_eq!(cart.item(CartItemId::new(1)).unwrap().quantity, 2);
        assert_eq!(cart.total_quantity, 3);
        assert!(!t.cache.contains(keys::CART_DATA));
        assert_eq!(service.quantity_state(CartItemId::new(1)), MutationState::Clean);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stock_and_bounds_are_checked_locally() {
        let t = TestContext::signed_in();
        let mut limited = item(1, 1000, 1);
        limited.stock = Some(2);
        let service = seeded(&t, vec![limited]);
        service.fetch(false).await.unwrap();

        assert!(matches!(
            service.set_quantity(CartItemId::new(1), 3),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            service.set_quantity(CartItemId::new(1), 0),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            service.set_quantity(CartItemId::new(9), 1),
            Err(AppError::NotFound(_))
        ));
        assert!(t.transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_signed_out_edit_fails() {
        let t = TestContext::new();
        let service = CartService::new(t.resource_context(), DEBOUNCE);
        assert!(service.fetch(false).await.unwrap().is_empty());
        assert!(
            service
                .set_quantity(CartItemId::new(1), 2)
                .err()
                .unwrap()
                .is_unauthenticated()
        );
        assert!(
            service
                .add(ProductId::new(1), 1)
                .await
                .unwrap_err()
                .is_unauthenticated()
        );
    }

    #[tokio::test]
    async fn test_add_refetches_cart() {
        let t = TestContext::signed_in();
        t.transport.ok(Method::POST, "cart", json!(null)).ok(
            Method::GET,
            "cart",
            json!({"items": [{"id": 4, "productId": 40, "price": "1500", "quantity": 2}]}),
        );
        let service = CartService::new(t.resource_context(), DEBOUNCE);

        let cart = service.add(ProductId::new(40), 2).await.unwrap();
        assert_eq!(cart.total_quantity, 2);
        assert_eq!(cart.total_amount, Decimal::from(3000));
        assert_eq!(
            t.transport.calls_to(&Method::POST, "cart")[0].body,
            Some(json!({"productId": 40, "quantity": 2}))
        );
    }

    #[tokio::test]
    async fn test_preview_sends_selected_lines() {
        let t = TestContext::signed_in();
        t.transport.ok(
            Method::POST,
            "cart/preview",
            json!({"subtotal": "1000", "total": "1000"}),
        );
        let service = seeded(&t, vec![item(1, 1000, 1), item(2, 500, 2)]);
        service.fetch(false).await.unwrap();
        service.select(CartItemId::new(2), false);

        let preview = service.preview().await.unwrap();
        assert_eq!(preview.total, Decimal::from(1000));
        assert_eq!(
            t.transport.calls_to(&Method::POST, "cart/preview")[0].body,
            Some(json!({"cartItemIds": [1]}))
        );
    }
}
