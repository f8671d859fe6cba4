//! Temp (buy-now) orders.
//!
//! At most one draft exists at a time. It is cached under a single key and
//! replaced whenever a new one is created.

use std::sync::Arc;

use delguur_core::TempOrderId;
use serde_json::json;
use tokio::sync::watch;
use tracing::instrument;

use crate::api::ApiRequest;
use crate::cache::keys;
use crate::error::{AppError, Result};
use crate::events::DomainEvent;
use crate::models::{SubmittedOrder, TempOrder, TempOrderLine, TempOrderUpdate};
use crate::resource::ResourceContext;
use crate::services::OrderService;

#[derive(Clone)]
pub struct TempOrderService {
    ctx: ResourceContext,
    orders: OrderService,
    draft: Arc<watch::Sender<Option<TempOrder>>>,
}

impl TempOrderService {
    #[must_use]
    pub fn new(ctx: ResourceContext, orders: OrderService) -> Self {
        let (draft, _) = watch::channel(None);
        Self {
            ctx,
            orders,
            draft: Arc::new(draft),
        }
    }

    /// Start a draft for the given lines.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::BadRequest`] without lines, or the remote error.
    #[instrument(skip(self, lines))]
    pub async fn create(&self, lines: &[TempOrderLine]) -> Result<TempOrder> {
        self.ctx.auth.require()?;
        if lines.is_empty() || lines.iter().any(|l| l.quantity == 0) {
            return Err(AppError::BadRequest("Nothing to order".to_string()));
        }
        let request = ApiRequest::post("temp-order").json(&json!({ "items": lines }))?;
        let draft: TempOrder = self.ctx.api.call(request).await?;
        self.store(draft.clone());
        self.ctx.events.publish(DomainEvent::TempOrderChanged);
        Ok(draft)
    }

    /// Load a draft, from cache when it is the one stored.
    ///
    /// # Errors
    ///
    /// Returns the remote error.
    pub async fn fetch(&self, id: TempOrderId, force: bool) -> Result<TempOrder> {
        self.ctx.auth.require()?;
        if !force {
            if let Some(draft) = self.current().filter(|d| d.id == id) {
                return Ok(draft);
            }
            if let Some(draft) = self
                .ctx
                .cache
                .get::<TempOrder>(keys::TEMP_ORDER)
                .filter(|d| d.id == id)
            {
                self.draft.send_replace(Some(draft.clone()));
                return Ok(draft);
            }
        }
        let draft: TempOrder = self
            .ctx
            .api
            .call(ApiRequest::get(format!("temp-order/{id}")))
            .await?;
        self.store(draft.clone());
        Ok(draft)
    }

    /// Change address, promotion or note; the backend re-prices the draft.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::BadRequest`] for an empty update, or the remote
    /// error.
    #[instrument(skip(self, update))]
    pub async fn update(&self, id: TempOrderId, update: &TempOrderUpdate) -> Result<TempOrder> {
        self.ctx.auth.require()?;
        if update.is_empty() {
            return Err(AppError::BadRequest("Nothing to update".to_string()));
        }
        self.ctx
            .api
            .execute(ApiRequest::put(format!("temp-order/{id}")).json(update)?)
            .await?;
        self.ctx.cache.remove(keys::TEMP_ORDER);
        let draft = self.fetch(id, true).await?;
        self.ctx.events.publish(DomainEvent::TempOrderChanged);
        Ok(draft)
    }

    /// Turn the draft into a real order.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::BadRequest`] when the draft has no address, or the
    /// remote error.
    #[instrument(skip(self))]
    pub async fn submit(&self, id: TempOrderId) -> Result<SubmittedOrder> {
        self.ctx.auth.require()?;
        if let Some(draft) = self.current().filter(|d| d.id == id)
            && draft.address_id.is_none()
        {
            return Err(AppError::BadRequest("Choose a shipping address".to_string()));
        }
        let submitted: SubmittedOrder = self
            .ctx
            .api
            .call(ApiRequest::post(format!("temp-order/{id}/submit")))
            .await?;
        tracing::info!(order_id = %submitted.order_id, "Temp order submitted");
        self.discard();
        self.orders.invalidate_lists();
        self.ctx.events.publish(DomainEvent::OrdersChanged);
        Ok(submitted)
    }

    /// Forget the draft locally.
    pub fn discard(&self) {
        self.ctx.cache.remove(keys::TEMP_ORDER);
        self.draft.send_replace(None);
        self.ctx.events.publish(DomainEvent::TempOrderChanged);
    }

    #[must_use]
    pub fn current(&self) -> Option<TempOrder> {
        self.draft.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<TempOrder>> {
        self.draft.subscribe()
    }

    pub fn reset(&self) {
        self.ctx.cache.remove(keys::TEMP_ORDER);
        self.draft.send_replace(None);
    }

    fn store(&self, draft: TempOrder) {
        self.ctx
            .cache
            .set(keys::TEMP_ORDER, &draft, Some(keys::TEMP_ORDER_POLICY.ttl));
        self.draft.send_replace(Some(draft));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use delguur_core::{AddressId, OrderId, ProductId};
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::*;
    use crate::api::Method;
    use crate::testing::TestContext;

    fn service(t: &TestContext) -> TempOrderService {
        TempOrderService::new(t.resource_context(), OrderService::new(t.resource_context()))
    }

    fn draft(address: Option<i64>, total: &str) -> serde_json::Value {
        json!({"id": 11, "addressId": address, "total": total})
    }

    #[tokio::test]
    async fn test_create_caches_draft() {
        let t = TestContext::signed_in();
        t.transport.ok(Method::POST, "temp-order", draft(None, "9000"));
        let service = service(&t);

        let created = service
            .create(&[TempOrderLine {
                product_id: ProductId::new(3),
                quantity: 1,
            }])
            .await
            .unwrap();
        assert_eq!(created.total, Decimal::from(9000));

        // Served from memory, then from cache after a restart.
        service.fetch(TempOrderId::new(11), false).await.unwrap();
        let restarted = TempOrderService::new(t.resource_context(), OrderService::new(t.resource_context()));
        restarted.fetch(TempOrderId::new(11), false).await.unwrap();
        assert_eq!(t.transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_update_refetches_priced_draft() {
        let t = TestContext::signed_in();
        t.transport
            .ok(Method::PUT, "temp-order/11", json!(null))
            .ok(Method::GET, "temp-order/11", draft(Some(2), "12000"));
        let service = service(&t);

        let update = TempOrderUpdate {
            address_id: Some(AddressId::new(2)),
            ..TempOrderUpdate::default()
        };
        let updated = service.update(TempOrderId::new(11), &update).await.unwrap();
        assert_eq!(updated.address_id, Some(AddressId::new(2)));
        assert_eq!(service.current().unwrap().total, Decimal::from(12000));
    }

    #[tokio::test]
    async fn test_submit_discards_draft() {
        let t = TestContext::signed_in();
        t.transport
            .ok(Method::GET, "temp-order/11", draft(Some(2), "12000"))
            .ok(Method::POST, "temp-order/11/submit", json!({"orderId": 90}));
        let service = service(&t);
        service.fetch(TempOrderId::new(11), false).await.unwrap();

        let submitted = service.submit(TempOrderId::new(11)).await.unwrap();
        assert_eq!(submitted.order_id, OrderId::new(90));
        assert!(service.current().is_none());
        assert!(!t.cache.contains(keys::TEMP_ORDER));
    }

    #[tokio::test]
    async fn test_submit_without_address_is_refused() {
        let t = TestContext::signed_in();
        t.transport.ok(Method::GET, "temp-order/11", draft(None, "12000"));
        let service = service(&t);
        service.fetch(TempOrderId::new(11), false).await.unwrap();

        assert!(matches!(
            service.submit(TempOrderId::new(11)).await,
            Err(AppError::BadRequest(_))
        ));
    }
}
