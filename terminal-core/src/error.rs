//! Error types for the sync engine

use rust_decimal::Decimal;
use thiserror::Error;

use crate::market::BookKey;

/// Terminal-wide error type
///
/// Every variant is recoverable: the worst outcome of any failure is a
/// resynchronized book or a single rejected order.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TerminalError {
    #[error("Stale sequence for {key}: got {sequence}, last applied {last_applied}")]
    StaleSequence {
        key: BookKey,
        sequence: u64,
        last_applied: u64,
    },

    #[error("Crossed book for {key}: bid {best_bid} >= ask {best_ask}")]
    CrossedBook {
        key: BookKey,
        best_bid: Decimal,
        best_ask: Decimal,
    },

    #[error("Unknown order: {0}")]
    UnknownOrder(String),

    #[error("Transport disconnected: {0}")]
    TransportDisconnected(String),

    #[error("Invalid order spec: {0}")]
    InvalidOrderSpec(String),

    #[error("No snapshot received for {0}")]
    UnknownBook(BookKey),

    #[error("Book {0} is awaiting a snapshot")]
    AwaitingSnapshot(BookKey),

    #[error("Invalid price level: {0}")]
    InvalidLevel(String),

    #[error("Fill of {size} exceeds remaining {remaining} on order {local_id}")]
    Overfill {
        local_id: String,
        size: Decimal,
        remaining: Decimal,
    },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl TerminalError {
    pub fn unknown_order(msg: impl Into<String>) -> Self {
        TerminalError::UnknownOrder(msg.into())
    }

    pub fn disconnected(msg: impl Into<String>) -> Self {
        TerminalError::TransportDisconnected(msg.into())
    }

    pub fn invalid_spec(msg: impl Into<String>) -> Self {
        TerminalError::InvalidOrderSpec(msg.into())
    }

    pub fn invalid_level(msg: impl Into<String>) -> Self {
        TerminalError::InvalidLevel(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        TerminalError::Parse(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        TerminalError::Config(msg.into())
    }

    /// Whether the affected book must be rebuilt from a fresh snapshot
    pub fn requires_resync(&self) -> bool {
        matches!(
            self,
            TerminalError::StaleSequence { .. } | TerminalError::CrossedBook { .. }
        )
    }

    /// Whether the connection must be torn down and re-established
    pub fn requires_reconnect(&self) -> bool {
        matches!(self, TerminalError::TransportDisconnected(_))
    }

    /// Nothing in the engine is fatal to the process
    pub fn is_recoverable(&self) -> bool {
        true
    }
}

impl From<serde_json::Error> for TerminalError {
    fn from(err: serde_json::Error) -> Self {
        TerminalError::Parse(err.to_string())
    }
}

/// Result type alias for terminal operations
pub type TerminalResult<T> = Result<T, TerminalError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::Outcome;

    #[test]
    fn test_resync_classification() {
        let key = BookKey::new("m1", Outcome::Yes);
        let stale = TerminalError::StaleSequence {
            key: key.clone(),
            sequence: 9,
            last_applied: 10,
        };
        assert!(stale.requires_resync());
        assert!(!stale.requires_reconnect());

        let gone = TerminalError::disconnected("socket closed");
        assert!(gone.requires_reconnect());
        assert!(!gone.requires_resync());

        assert!(!TerminalError::unknown_order("abc").requires_resync());
        assert!(TerminalError::AwaitingSnapshot(key).is_recoverable());
    }

    #[test]
    fn test_display_includes_key() {
        let err = TerminalError::StaleSequence {
            key: BookKey::new("m1", Outcome::No),
            sequence: 3,
            last_applied: 7,
        };
        assert_eq!(
            err.to_string(),
            "Stale sequence for m1:NO: got 3, last applied 7"
        );
    }
}
