//! Order, order state and fill types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{TerminalError, TerminalResult};
use crate::market::{BookKey, Outcome};

/// Client-generated order identity, stable across retries
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalOrderId(pub String);

impl LocalOrderId {
    /// Generate a fresh identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LocalOrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LocalOrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }

    /// +1 for buys, -1 for sells
    pub fn sign(&self) -> Decimal {
        match self {
            OrderSide::Buy => Decimal::ONE,
            OrderSide::Sell => Decimal::NEGATIVE_ONE,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    Limit,
    Market,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Limit => "LIMIT",
            OrderType::Market => "MARKET",
        }
    }
}

/// Lifecycle state of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Created locally, not yet handed to the transport
    PendingSubmit,
    /// Sent, waiting for the exchange to acknowledge
    PendingAck,
    Open,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
    Expired,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::PendingSubmit => "PENDING_SUBMIT",
            OrderStatus::PendingAck => "PENDING_ACK",
            OrderStatus::Open => "OPEN",
            OrderStatus::PartiallyFilled => "PARTIALLY_FILLED",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Rejected => "REJECTED",
            OrderStatus::Expired => "EXPIRED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled
                | OrderStatus::Cancelled
                | OrderStatus::Rejected
                | OrderStatus::Expired
        )
    }

    /// Not yet acknowledged by the exchange
    pub fn is_pending(&self) -> bool {
        matches!(self, OrderStatus::PendingSubmit | OrderStatus::PendingAck)
    }

    /// Acknowledged and resting on the exchange
    pub fn is_working(&self) -> bool {
        matches!(self, OrderStatus::Open | OrderStatus::PartiallyFilled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the user asked for, before any identity is assigned
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSpec {
    pub market_id: String,
    pub outcome: Outcome,
    pub side: OrderSide,
    pub order_type: OrderType,
    /// Limit price; must be absent for market orders
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
    pub size: Decimal,
}

impl OrderSpec {
    pub fn limit(
        market_id: impl Into<String>,
        outcome: Outcome,
        side: OrderSide,
        price: Decimal,
        size: Decimal,
    ) -> Self {
        Self {
            market_id: market_id.into(),
            outcome,
            side,
            order_type: OrderType::Limit,
            price: Some(price),
            size,
        }
    }

    pub fn market(
        market_id: impl Into<String>,
        outcome: Outcome,
        side: OrderSide,
        size: Decimal,
    ) -> Self {
        Self {
            market_id: market_id.into(),
            outcome,
            side,
            order_type: OrderType::Market,
            price: None,
            size,
        }
    }

    /// Reject specs the exchange could never accept
    ///
    /// Prices are probabilities and must lie strictly between 0 and 1.
    pub fn validate(&self) -> TerminalResult<()> {
        if self.market_id.trim().is_empty() {
            return Err(TerminalError::invalid_spec("market_id is empty"));
        }
        if self.size <= Decimal::ZERO {
            return Err(TerminalError::invalid_spec(format!(
                "size must be positive, got {}",
                self.size
            )));
        }
        match (self.order_type, self.price) {
            (OrderType::Limit, None) => {
                Err(TerminalError::invalid_spec("limit order requires a price"))
            }
            (OrderType::Limit, Some(price)) if price <= Decimal::ZERO || price >= Decimal::ONE => {
                Err(TerminalError::invalid_spec(format!(
                    "limit price must be between 0 and 1, got {}",
                    price
                )))
            }
            (OrderType::Market, Some(_)) => {
                Err(TerminalError::invalid_spec("market order must not carry a price"))
            }
            _ => Ok(()),
        }
    }

    pub fn key(&self) -> BookKey {
        BookKey::new(self.market_id.clone(), self.outcome)
    }
}

/// A locally placed order and everything known about it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub local_id: LocalOrderId,
    /// Assigned by the exchange on acknowledgement
    pub exchange_id: Option<String>,
    pub market_id: String,
    pub outcome: Outcome,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub price: Option<Decimal>,
    pub requested_size: Decimal,
    pub filled_size: Decimal,
    /// Volume-weighted price of all fills so far
    pub avg_fill_price: Option<Decimal>,
    pub status: OrderStatus,
    /// Set when a cancel has been requested but not yet confirmed
    pub cancel_requested: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reject_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Create a new order in PENDING_SUBMIT from a validated spec
    pub fn from_spec(local_id: LocalOrderId, spec: OrderSpec, now: DateTime<Utc>) -> Self {
        Self {
            local_id,
            exchange_id: None,
            market_id: spec.market_id,
            outcome: spec.outcome,
            side: spec.side,
            order_type: spec.order_type,
            price: spec.price,
            requested_size: spec.size,
            filled_size: Decimal::ZERO,
            avg_fill_price: None,
            status: OrderStatus::PendingSubmit,
            cancel_requested: false,
            reject_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn key(&self) -> BookKey {
        BookKey::new(self.market_id.clone(), self.outcome)
    }

    pub fn remaining_size(&self) -> Decimal {
        self.requested_size - self.filled_size
    }

    /// The spec this order was created from (used when re-sending)
    pub fn spec(&self) -> OrderSpec {
        OrderSpec {
            market_id: self.market_id.clone(),
            outcome: self.outcome,
            side: self.side,
            order_type: self.order_type,
            price: self.price,
            size: self.requested_size,
        }
    }
}

/// Execution report as delivered by the exchange for an acknowledged order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillReport {
    pub price: Decimal,
    pub size: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Identity used to recognise redelivered fills
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FillKey {
    pub exchange_id: String,
    pub timestamp: DateTime<Utc>,
    pub price: Decimal,
    pub size: Decimal,
}

impl FillKey {
    pub fn new(exchange_id: &str, report: &FillReport) -> Self {
        Self {
            exchange_id: exchange_id.to_string(),
            timestamp: report.timestamp,
            // Normalized so that 0.5 and 0.50 are the same fill
            price: report.price.normalize(),
            size: report.size.normalize(),
        }
    }
}

/// An applied execution against one of our orders
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fill {
    pub order_local_id: LocalOrderId,
    pub market_id: String,
    pub outcome: Outcome,
    pub side: OrderSide,
    pub price: Decimal,
    pub size: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl Fill {
    pub fn key(&self) -> BookKey {
        BookKey::new(self.market_id.clone(), self.outcome)
    }

    /// Size signed by side: positive for buys, negative for sells
    pub fn signed_size(&self) -> Decimal {
        self.size * self.side.sign()
    }
}
