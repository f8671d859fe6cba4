//! Orders: paged list, detail and lifecycle actions.

use delguur_core::OrderId;
use tracing::instrument;

use crate::api::ApiRequest;
use crate::cache::keys;
use crate::error::{AppError, Result};
use crate::events::DomainEvent;
use crate::models::{OrderDetail, OrderPage, OrderQuery};
use crate::resource::{KeyedResource, ResourceContext};

#[derive(Clone)]
pub struct OrderService {
    ctx: ResourceContext,
    pages: KeyedResource<OrderPage>,
    details: KeyedResource<OrderDetail>,
}

impl OrderService {
    #[must_use]
    pub fn new(ctx: ResourceContext) -> Self {
        Self {
            pages: KeyedResource::new(
                "order_list",
                keys::ORDER_LIST_PREFIX,
                keys::ORDER_POLICY,
                ctx.clone(),
            ),
            details: KeyedResource::new(
                "order_detail",
                keys::ORDER_DETAIL_PREFIX,
                keys::ORDER_POLICY,
                ctx.clone(),
            ),
            ctx,
        }
    }

    /// One page of orders; the empty page when signed out.
    ///
    /// # Errors
    ///
    /// Returns the remote error.
    pub async fn list(&self, query: OrderQuery, force: bool) -> Result<OrderPage> {
        self.pages
            .fetch(&query.cache_key(), ApiRequest::get(query.to_path()), force)
            .await
    }

    /// One order; `None` when signed out.
    ///
    /// # Errors
    ///
    /// Returns the remote error, [`ApiError::NotFound`](crate::api::ApiError::NotFound)
    /// for an unknown order.
    pub async fn detail(&self, id: OrderId, force: bool) -> Result<Option<OrderDetail>> {
        if !self.ctx.auth.is_authenticated() {
            return Ok(None);
        }
        self.details
            .fetch(&keys::order_detail(id), ApiRequest::get(format!("orders/{id}")), force)
            .await
            .map(Some)
    }

    /// Ask the backend to start payment of an order.
    ///
    /// # Errors
    ///
    /// Returns the remote error.
    #[instrument(skip(self))]
    pub async fn pay(&self, id: OrderId) -> Result<()> {
        self.action(id, "pay").await
    }

    /// Cancel an order awaiting payment.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::BadRequest`] when a loaded detail shows the order
    /// can no longer be cancelled, otherwise the remote error.
    #[instrument(skip(self))]
    pub async fn cancel(&self, id: OrderId) -> Result<()> {
        if let Some(detail) = self.details.peek(&keys::order_detail(id))
            && !detail.status.is_cancellable()
        {
            return Err(AppError::BadRequest(format!(
                "A {} order cannot be cancelled",
                detail.status
            )));
        }
        self.action(id, "cancel").await
    }

    /// Confirm receipt of a delivered order.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::BadRequest`] when a loaded detail shows the order
    /// is not awaiting confirmation, otherwise the remote error.
    #[instrument(skip(self))]
    pub async fn confirm(&self, id: OrderId) -> Result<()> {
        if let Some(detail) = self.details.peek(&keys::order_detail(id))
            && !detail.status.is_confirmable()
        {
            return Err(AppError::BadRequest(format!(
                "A {} order cannot be confirmed",
                detail.status
            )));
        }
        self.action(id, "confirm").await
    }

    async fn action(&self, id: OrderId, verb: &str) -> Result<()> {
        self.ctx.auth.require()?;
        self.ctx
            .api
            .execute(ApiRequest::post(format!("orders/{id}/{verb}")))
            .await?;
        self.invalidate_order(id);
        self.invalidate_lists();
        // Best effort: the action already succeeded.
        if let Err(e) = self.detail(id, true).await {
            tracing::warn!(order_id = %id, error = %e, "Failed to refresh order after {verb}");
        }
        self.ctx.events.publish(DomainEvent::OrderChanged(id));
        self.ctx.events.publish(DomainEvent::OrdersChanged);
        Ok(())
    }

    /// Drop one order's cached detail.
    pub fn invalidate_order(&self, id: OrderId) {
        self.details.invalidate(&keys::order_detail(id));
    }

    /// Drop every cached order detail.
    pub fn invalidate_details(&self) -> usize {
        self.details.invalidate_all()
    }

    /// Drop every cached order page.
    pub fn invalidate_lists(&self) -> usize {
        self.pages.invalidate_all()
    }

    pub fn reset(&self) {
        self.invalidate_lists();
        self.invalidate_details();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use delguur_core::OrderStatus;
    use serde_json::json;

    use super::*;
    use crate::api::Method;
    use crate::testing::TestContext;

    fn detail(id: i64, status: &str) -> serde_json::Value {
        json!({"id": id, "orderNo": format!("D{id}"), "status": status, "totalAmount": "12000"})
    }

    #[tokio::test]
    async fn test_pages_are_cached_per_key() {
        let t = TestContext::signed_in();
        t.transport
            .ok(Method::GET, "orders?page=1&pageSize=10", json!({"items": [], "total": 0}))
            .ok(
                Method::GET,
                "orders?page=1&pageSize=10&status=paid",
                json!({"items": [], "total": 0}),
            );
        let service = OrderService::new(t.resource_context());

        service.list(OrderQuery::default(), false).await.unwrap();
        service.list(OrderQuery::default(), false).await.unwrap();
        let paid = OrderQuery {
            status: Some(OrderStatus::Paid),
            ..OrderQuery::default()
        };
        service.list(paid, false).await.unwrap();

        assert_eq!(t.transport.calls().len(), 2);
        assert!(t.cache.contains("order_list_all_1_10"));
        assert!(t.cache.contains("order_list_paid_1_10"));
    }

    #[tokio::test]
    async fn test_cancel_refreshes_detail_and_drops_lists() {
        let t = TestContext::signed_in();
        t.transport
            .ok(Method::GET, "orders/4", detail(4, "pending_payment"))
            .ok(Method::GET, "orders/4", detail(4, "cancelled"))
            .ok(Method::POST, "orders/4/cancel", json!(null))
            .ok(Method::GET, "orders?page=1&pageSize=10", json!({"items": []}));
        let service = OrderService::new(t.resource_context());
        service.detail(OrderId::new(4), false).await.unwrap();
        service.list(OrderQuery::default(), false).await.unwrap();
        let mut events = t.events.subscribe();

        service.cancel(OrderId::new(4)).await.unwrap();

        assert!(!t.cache.contains("order_list_all_1_10"));
        let refreshed = service.detail(OrderId::new(4), false).await.unwrap().unwrap();
        assert_eq!(refreshed.status, OrderStatus::Cancelled);
        assert_eq!(events.try_recv().unwrap(), DomainEvent::OrderChanged(OrderId::new(4)));
        assert_eq!(events.try_recv().unwrap(), DomainEvent::OrdersChanged);
    }

    #[tokio::test]
    async fn test_cancel_of_shipped_order_is_refused_locally() {
        let t = TestContext::signed_in();
        t.transport.ok(Method::GET, "orders/8", detail(8, "shipped"));
        let service = OrderService::new(t.resource_context());
        service.detail(OrderId::new(8), false).await.unwrap();

        let err = service.cancel(OrderId::new(8)).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert!(t.transport.calls_to(&Method::POST, "orders/8/cancel").is_empty());
    }

    #[tokio::test]
    async fn test_signed_out_reads_are_empty() {
        let t = TestContext::new();
        let service = OrderService::new(t.resource_context());

        let page = service.list(OrderQuery::default(), false).await.unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total, 0);
        assert!(service.detail(OrderId::new(4), true).await.unwrap().is_none());
        assert!(t.transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_signed_out_action_fails() {
        let t = TestContext::new();
        let err = OrderService::new(t.resource_context())
            .cancel(OrderId::new(4))
            .await
            .unwrap_err();
        assert!(err.is_unauthenticated());
        assert!(t.transport.calls().is_empty());
    }
}
