//! QPay payment sessions and status polling.
//!
//! A session moves `PENDING -> PAID | CANCELLED | EXPIRED` and never back.
//! While it is pending a background task queries the status on a fixed
//! interval; the task ends for good on the first terminal status. Every
//! observed status is persisted so a restarted client can resume polling a
//! pending payment for up to 30 minutes.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use delguur_core::{OrderId, PaymentStatus};
use serde_json::json;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::instrument;

use crate::api::ApiRequest;
use crate::cache::keys;
use crate::error::{Result, add_breadcrumb};
use crate::events::DomainEvent;
use crate::models::{PaymentSession, PaymentStatusReply, QPayInvoice};
use crate::resource::ResourceContext;
use crate::services::OrderService;

/// Drives QPay payments for the signed-in user. Cheap to clone.
#[derive(Clone)]
pub struct PaymentPoller {
    inner: Arc<PollerInner>,
}

struct PollerInner {
    ctx: ResourceContext,
    orders: OrderService,
    interval: Duration,
    session: watch::Sender<Option<PaymentSession>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PaymentPoller {
    #[must_use]
    pub fn new(ctx: ResourceContext, orders: OrderService, interval: Duration) -> Self {
        let (session, _) = watch::channel(None);
        Self {
            inner: Arc::new(PollerInner {
                ctx,
                orders,
                interval,
                session,
                task: Mutex::new(None),
            }),
        }
    }

    /// Create a QPay invoice for an order and start watching it.
    ///
    /// Polling starts only if the invoice is pending; an order that is
    /// already settled is handled right away.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::AppError::Unauthenticated`] when signed out,
    /// or the remote error.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn create_payment(&self, order_id: OrderId) -> Result<QPayInvoice> {
        self.inner.ctx.auth.require()?;
        self.stop();

        let request = ApiRequest::post("qpay/create").json(&json!({ "orderId": order_id }))?;
        let invoice: QPayInvoice = self.inner.ctx.api.call(request).await?;
        add_breadcrumb(
            "payment",
            "Created QPay invoice",
            Some(&[("invoice_id", invoice.invoice_id.as_str())]),
        );

        self.inner.begin(PaymentSession {
            order_id,
            invoice_id: Some(invoice.invoice_id.clone()),
            status: invoice.status,
            updated_at: self.inner.ctx.cache.now_millis(),
        });
        self.settle_or_poll(order_id, invoice.status).await;
        Ok(invoice)
    }

    /// Watch the payment of an existing order.
    ///
    /// The status is checked once up front; if that check fails the error
    /// is returned and no polling starts.
    ///
    /// # Errors
    ///
    /// Returns the error of the initial status check.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn watch(&self, order_id: OrderId) -> Result<PaymentStatus> {
        self.inner.ctx.auth.require()?;
        self.stop();

        let reply = self.inner.query(order_id).await?;
        self.inner.begin(PaymentSession {
            order_id,
            invoice_id: reply.invoice_id,
            status: reply.status,
            updated_at: self.inner.ctx.cache.now_millis(),
        });
        self.settle_or_poll(order_id, reply.status).await;
        Ok(reply.status)
    }

    /// Query the status once without touching the session.
    ///
    /// # Errors
    ///
    /// Returns the remote error.
    pub async fn check_status(&self, order_id: OrderId) -> Result<PaymentStatusReply> {
        self.inner.ctx.auth.require()?;
        self.inner.query(order_id).await
    }

    /// Resume polling a pending payment persisted by an earlier run.
    ///
    /// Returns the resumed session, or `None` if there is nothing pending.
    pub fn resume(&self) -> Option<PaymentSession> {
        if !self.inner.ctx.auth.is_authenticated() || self.is_polling() {
            return None;
        }
        let session = self
            .inner
            .ctx
            .cache
            .get::<PaymentSession>(keys::PAYMENT_SESSION)
            .filter(|s| s.status == PaymentStatus::Pending)?;
        tracing::info!(order_id = %session.order_id, "Resuming payment polling");
        self.inner.session.send_replace(Some(session.clone()));
        self.start_polling(session.order_id);
        Some(session)
    }

    /// Stop polling. The session is kept.
    pub fn stop(&self) {
        if let Some(task) = self.inner.lock_task().take() {
            task.abort();
        }
    }

    /// Whether a poll task is running.
    #[must_use]
    pub fn is_polling(&self) -> bool {
        self.inner
            .lock_task()
            .as_ref()
            .is_some_and(|t| !t.is_finished())
    }

    /// The current session, if any.
    #[must_use]
    pub fn session(&self) -> Option<PaymentSession> {
        self.inner.session.borrow().clone()
    }

    /// Watch session changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<PaymentSession>> {
        self.inner.session.subscribe()
    }

    /// Stop polling and forget the session.
    pub fn reset(&self) {
        self.stop();
        self.inner.session.send_replace(None);
        self.inner.ctx.cache.remove(keys::PAYMENT_SESSION);
    }

    async fn settle_or_poll(&self, order_id: OrderId, status: PaymentStatus) {
        match status {
            PaymentStatus::Pending => self.start_polling(order_id),
            PaymentStatus::Paid => self.inner.on_paid(order_id).await,
            PaymentStatus::Cancelled | PaymentStatus::Expired => {
                tracing::info!(order_id = %order_id, %status, "Payment already closed");
            }
        }
    }

    fn start_polling(&self, order_id: OrderId) {
        self.stop();
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let period = inner.interval;
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let reply = match inner.query(order_id).await {
                    Ok(reply) => reply,
                    Err(e) => {
                        tracing::warn!(order_id = %order_id, error = %e, "Payment status poll failed");
                        continue;
                    }
                };
                inner.observe(order_id, reply.status);
                if reply.status.is_terminal() {
                    if reply.status == PaymentStatus::Paid {
                        inner.on_paid(order_id).await;
                    }
                    tracing::info!(order_id = %order_id, status = %reply.status, "Payment polling finished");
                    break;
                }
            }
        });
        *self.inner.lock_task() = Some(task);
    }
}

impl PollerInner {
    fn lock_task(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.task.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn query(&self, order_id: OrderId) -> Result<PaymentStatusReply> {
        let reply = self
            .ctx
            .api
            .call(ApiRequest::get(format!("qpay/status/{order_id}")))
            .await?;
        Ok(reply)
    }

    /// Replace the session with a fresh one.
    fn begin(&self, session: PaymentSession) {
        self.persist(&session);
        self.publish_status(&session);
        self.session.send_replace(Some(session));
    }

    /// Record a polled status for the current session.
    fn observe(&self, order_id: OrderId, status: PaymentStatus) {
        let now = self.ctx.cache.now_millis();
        let mut changed = None;
        self.session.send_if_modified(|current| {
            let Some(session) = current.as_mut().filter(|s| s.order_id == order_id) else {
                return false;
            };
            session.updated_at = now;
            if session.status.is_terminal() || session.status == status {
                return false;
            }
            session.status = status;
            changed = Some(session.clone());
            true
        });

        match changed {
            Some(session) => {
                self.persist(&session);
                self.publish_status(&session);
            }
            None => {
                if let Some(session) = self.session.borrow().clone() {
                    self.persist(&session);
                }
            }
        }
    }

    fn persist(&self, session: &PaymentSession) {
        self.ctx
            .cache
            .set(keys::PAYMENT_SESSION, session, Some(keys::PAYMENT_SESSION_TTL));
    }

    fn publish_status(&self, session: &PaymentSession) {
        self.ctx.events.publish(DomainEvent::PaymentStatusChanged {
            order_id: session.order_id,
            status: session.status,
        });
    }

    async fn on_paid(&self, order_id: OrderId) {
        tracing::info!(order_id = %order_id, "Payment received");
        add_breadcrumb("payment", "Payment received", None);
        self.orders.invalidate_details();
        self.orders.invalidate_lists();
        // Best effort: the payment is already confirmed.
        if let Err(e) = self.orders.detail(order_id, true).await {
            tracing::warn!(order_id = %order_id, error = %e, "Failed to refresh paid order");
        }
        self.ctx.events.publish(DomainEvent::OrderChanged(order_id));
        self.ctx.events.publish(DomainEvent::OrdersChanged);
    }
}
