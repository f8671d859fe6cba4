//! Typed domain events.
//!
//! Services publish a [`DomainEvent`] after every successful mutation so
//! that views and other listeners can react without polling. Delivery uses a
//! tokio broadcast channel: every subscriber sees every event sent after it
//! subscribed, and a subscriber that falls more than the buffer behind skips
//! the oldest events. Dropping the receiver unsubscribes.

use delguur_core::{OrderId, PaymentStatus};
use tokio::sync::broadcast;

/// Default buffer size for the broadcast channel.
const DEFAULT_BUFFER_SIZE: usize = 256;

/// Something changed in a client-side domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainEvent {
    /// The user signed in or out.
    SessionChanged { signed_in: bool },
    CartChanged,
    AddressesChanged,
    FavoritesChanged,
    /// Order lists changed (new order, status change).
    OrdersChanged,
    /// A single order changed.
    OrderChanged(OrderId),
    CheckoutChanged,
    PromotionsChanged,
    TempOrderChanged,
    /// A payment session observed a new status.
    PaymentStatusChanged {
        order_id: OrderId,
        status: PaymentStatus,
    },
}

/// Broadcaster for domain events.
///
/// Cloning shares the underlying channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<DomainEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Create a new bus with the default buffer size.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_SIZE)
    }

    /// Create a new bus with a custom buffer size.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event.
    ///
    /// Returns the number of subscribers that received it; zero when nobody
    /// is listening, which is not an error.
    pub fn publish(&self, event: DomainEvent) -> usize {
        tracing::trace!(?event, "Publishing domain event");
        self.sender.send(event).unwrap_or_default()
    }

    /// Subscribe to events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.sender.subscribe()
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
