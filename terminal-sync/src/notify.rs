//! Change notifications for presentation subscribers
//!
//! Every store publishes a [`StoreEvent`] after each mutation so that views
//! can re-render incrementally instead of polling.

use serde::Serialize;
use terminal_core::{BookKey, ConnectionState, LocalOrderId, OrderStatus};
use tokio::sync::broadcast;
use tracing::trace;

/// Default broadcast capacity
pub const DEFAULT_NOTIFY_CAPACITY: usize = 1024;

/// A mutation that happened in one of the stores
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreEvent {
    /// Snapshot or delta applied
    BookUpdated { key: BookKey, sequence: u64 },
    /// Book is stale and waiting for a fresh snapshot
    BookResyncing { key: BookKey },
    /// Book discarded on unsubscribe
    BookRemoved { key: BookKey },
    OrderUpdated {
        local_id: LocalOrderId,
        status: OrderStatus,
    },
    PositionUpdated { key: BookKey },
    Connection { state: ConnectionState },
}

/// Broadcast hub shared by all stores of one context
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    tx: broadcast::Sender<StoreEvent>,
}

impl ChangeNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Get a receiver for all subsequent events
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.tx.subscribe()
    }

    /// Publish an event; having no subscribers is not an error
    pub fn publish(&self, event: StoreEvent) {
        if self.tx.send(event).is_err() {
            trace!("No change subscribers");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_NOTIFY_CAPACITY)
    }
}
