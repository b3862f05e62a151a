//! Feed message types exchanged with the exchange transport
//!
//! These types define the normalized protocol between a transport and the
//! sync engine. Concrete transports translate exchange-specific frames into
//! [`FeedMessage`] and [`ClientFrame`] into whatever the exchange expects.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::market::{BookKey, BookSide, Outcome, PriceLevel};
use crate::order::{FillReport, LocalOrderId, OrderSpec};

// ============================================================================
// Exchange -> Client Messages
// ============================================================================

/// Messages delivered by the exchange feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedMessage {
    /// Full replacement of one book
    Snapshot {
        market_id: String,
        outcome: Outcome,
        bids: Vec<PriceLevel>,
        asks: Vec<PriceLevel>,
        sequence: u64,
    },
    /// Incremental change to one price level (size 0 removes it)
    Delta {
        market_id: String,
        outcome: Outcome,
        side: BookSide,
        price: Decimal,
        size: Decimal,
        sequence: u64,
    },
    /// Order accepted by the exchange
    Ack {
        local_id: LocalOrderId,
        exchange_id: String,
    },
    /// Order refused by the exchange
    Reject {
        local_id: LocalOrderId,
        reason: String,
    },
    /// Execution against an acknowledged order
    Fill {
        exchange_id: String,
        price: Decimal,
        size: Decimal,
        timestamp: DateTime<Utc>,
    },
    /// Cancel confirmed by the exchange
    CancelAck { exchange_id: String },
    /// Cancel refused by the exchange (order keeps working)
    CancelReject { exchange_id: String, reason: String },
    /// Order reached its time-in-force without completing
    Expired { exchange_id: String },
}

impl FeedMessage {
    /// The book this message updates, for market data messages
    pub fn book_key(&self) -> Option<BookKey> {
        match self {
            FeedMessage::Snapshot {
                market_id, outcome, ..
            }
            | FeedMessage::Delta {
                market_id, outcome, ..
            } => Some(BookKey::new(market_id.clone(), *outcome)),
            _ => None,
        }
    }

    /// Short name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            FeedMessage::Snapshot { .. } => "snapshot",
            FeedMessage::Delta { .. } => "delta",
            FeedMessage::Ack { .. } => "ack",
            FeedMessage::Reject { .. } => "reject",
            FeedMessage::Fill { .. } => "fill",
            FeedMessage::CancelAck { .. } => "cancel_ack",
            FeedMessage::CancelReject { .. } => "cancel_reject",
            FeedMessage::Expired { .. } => "expired",
        }
    }

    /// Convenience constructor for fills
    pub fn fill(exchange_id: impl Into<String>, report: FillReport) -> Self {
        FeedMessage::Fill {
            exchange_id: exchange_id.into(),
            price: report.price,
            size: report.size,
            timestamp: report.timestamp,
        }
    }
}

// ============================================================================
// Client -> Exchange Messages
// ============================================================================

/// An order as handed to the transport, carrying its durable local identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub local_id: LocalOrderId,
    pub order: OrderSpec,
}

/// Frames sent from the client to the exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Subscribe {
        market_id: String,
    },
    Unsubscribe {
        market_id: String,
    },
    /// Ask for a fresh snapshot of one book
    SnapshotRequest {
        market_id: String,
        outcome: Outcome,
    },
    PlaceOrder(OrderRequest),
    CancelOrder {
        local_id: LocalOrderId,
        exchange_id: String,
    },
}

/// Connection state for the exchange connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Connected and receiving data
    Connected,
    /// Attempting to connect
    Connecting,
    /// Disconnected, will attempt reconnect
    Disconnected,
    /// Connection failed, not retrying
    Failed,
}
