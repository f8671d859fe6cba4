//! Checkout: page data, priced previews and order submission.

use tracing::instrument;

use crate::api::ApiRequest;
use crate::cache::keys;
use crate::error::{AppError, Result};
use crate::events::DomainEvent;
use crate::models::{CheckoutInfo, OrderPreview, PreviewParams, SubmittedOrder};
use crate::resource::{CachedResource, KeyedResource, ResourceContext, ResourceSpec};
use crate::services::{CartService, OrderService};

#[derive(Clone)]
pub struct CheckoutService {
    info: CachedResource<CheckoutInfo>,
    previews: KeyedResource<OrderPreview>,
    cart: CartService,
    orders: OrderService,
}

impl CheckoutService {
    #[must_use]
    pub fn new(ctx: ResourceContext, cart: CartService, orders: OrderService) -> Self {
        Self {
            info: CachedResource::new(
                ResourceSpec {
                    name: "checkout_info",
                    cache_key: keys::CHECKOUT_INFO,
                    path: "checkout/info",
                    policy: keys::CHECKOUT_POLICY,
                    requires_auth: true,
                    event: Some(DomainEvent::CheckoutChanged),
                },
                ctx.clone(),
            ),
            previews: KeyedResource::new(
                "order_preview",
                keys::ORDER_PREVIEW_PREFIX,
                keys::PREVIEW_POLICY,
                ctx,
            ),
            cart,
            orders,
        }
    }

    /// Addresses, shipping methods and promotions for the checkout page.
    ///
    /// # Errors
    ///
    /// Returns the remote error.
    pub async fn info(&self, force: bool) -> Result<CheckoutInfo> {
        self.info.fetch(force).await
    }

    /// Server-priced preview, cached per distinct parameter set.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::BadRequest`] without lines, otherwise see
    /// [`KeyedResource::fetch`].
    #[instrument(skip(self, params))]
    pub async fn preview(&self, params: &PreviewParams, force: bool) -> Result<OrderPreview> {
        if params.cart_item_ids.is_empty() {
            return Err(AppError::BadRequest("Select at least one item".to_string()));
        }
        let encoded = serde_json::to_string(params).map_err(crate::api::ApiError::from)?;
        let request = ApiRequest::post("checkout/preview").json(params)?;
        self.previews
            .fetch(&keys::order_preview(&encoded), request, force)
            .await
    }

    /// Place the order.
    ///
    /// Afterwards the cart is re-read (the ordered lines are gone), order
    /// lists are dropped and cached previews are discarded.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::BadRequest`] without an address or lines, or the
    /// remote error.
    #[instrument(skip(self, params))]
    pub async fn submit(&self, params: &PreviewParams) -> Result<SubmittedOrder> {
        self.info.context().auth.require()?;
        if params.cart_item_ids.is_empty() {
            return Err(AppError::BadRequest("Select at least one item".to_string()));
        }
        if params.address_id.is_none() {
            return Err(AppError::BadRequest("Choose a shipping address".to_string()));
        }

        let request = ApiRequest::post("checkout/submit").json(params)?;
        let submitted: SubmittedOrder = self.info.context().api.call(request).await?;
        tracing::info!(order_id = %submitted.order_id, "Order submitted");

        self.previews.invalidate_all();
        self.orders.invalidate_lists();
        self.cart.invalidate();
        if let Err(e) = self.cart.fetch(true).await {
            tracing::warn!(error = %e, "Failed to refresh cart after checkout");
        }
        let events = &self.info.context().events;
        events.publish(DomainEvent::CartChanged);
        events.publish(DomainEvent::OrdersChanged);
        Ok(submitted)
    }

    pub fn reset(&self) {
        self.info.reset();
        self.previews.invalidate_all();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use delguur_core::{AddressId, CartItemId, OrderId};
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::*;
    use crate::api::Method;
    use crate::testing::TestContext;

    fn service(t: &TestContext) -> CheckoutService {
        let ctx = t.resource_context();
        CheckoutService::new(
            ctx.clone(),
            CartService::new(ctx.clone(), Duration::from_millis(500)),
            OrderService::new(ctx),
        )
    }

    #[tokio::test]
    async fn test_preview_is_cached_by_parameters() {
        let t = TestContext::signed_in();
        t.transport.ok(
            Method::POST,
            "checkout/preview",
            json!({"subtotal": "3000", "shippingFee": "5000", "total": "8000"}),
        );
        let service = service(&t);
        let params = PreviewParams::for_items(vec![CartItemId::new(1)]);

        let preview = service.preview(&params, false).await.unwrap();
        service.preview(&params, false).await.unwrap();
        assert_eq!(preview.total, Decimal::from(8000));
        assert_eq!(t.transport.calls().len(), 1);

        let other = PreviewParams {
            promotion_code: Some("WINTER".to_string()),
            ..params.clone()
        };
        service.preview(&other, false).await.unwrap();
        assert_eq!(t.transport.calls().len(), 2);

        let key = keys::order_preview(&serde_json::to_string(&params).unwrap());
        assert!(t.cache.contains(&key));
    }

    #[tokio::test]
    async fn test_submit_reconciles_cart_and_orders() {
        let t = TestContext::signed_in();
        t.transport
            .ok(Method::POST, "checkout/submit", json!({"orderId": 77}))
            .ok(Method::GET, "cart", json!({"items": []}));
        t.cache.set(&keys::order_list(None, 1, 10), &json!({"items": []}), None);
        let service = service(&t);

        let params = PreviewParams {
            address_id: Some(AddressId::new(2)),
            ..PreviewParams::for_items(vec![CartItemId::new(1)])
        };
        let submitted = service.submit(&params).await.unwrap();

        assert_eq!(submitted.order_id, OrderId::new(77));
        assert!(!t.cache.contains(&keys::order_list(None, 1, 10)));
        assert_eq!(t.transport.calls_to(&Method::GET, "cart").len(), 1);
    }

    #[tokio::test]
    async fn test_submit_requires_address() {
        let t = TestContext::signed_in();
        let err = service(&t)
            .submit(&PreviewParams::for_items(vec![CartItemId::new(1)]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert!(t.transport.calls().is_empty());
    }
}
