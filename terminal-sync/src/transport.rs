//! Exchange transport abstraction
//!
//! A transport owns the wire: it connects, manages subscriptions and turns
//! exchange frames into [`FeedMessage`]s. The feed drives it from a single
//! task, so implementations need `Send` but not `Sync`.

use async_trait::async_trait;
use terminal_core::{FeedMessage, LocalOrderId, OrderRequest, Outcome, TerminalResult};

#[async_trait]
pub trait Transport: Send {
    /// Open (or reopen) the connection
    async fn connect(&mut self) -> TerminalResult<()>;

    async fn subscribe(&mut self, market_id: &str) -> TerminalResult<()>;

    async fn unsubscribe(&mut self, market_id: &str) -> TerminalResult<()>;

    /// Ask for a fresh snapshot of one book outside the regular stream
    async fn request_snapshot(&mut self, market_id: &str, outcome: Outcome) -> TerminalResult<()>;

    /// Next message from the exchange
    ///
    /// `Ok(None)` means the connection ended cleanly. Must be cancel safe:
    /// the feed polls it inside `tokio::select!`.
    async fn next_message(&mut self) -> TerminalResult<Option<FeedMessage>>;

    /// Hand an order to the exchange; the local id is echoed back on ack
    async fn send_order(&mut self, request: &OrderRequest) -> TerminalResult<LocalOrderId>;

    async fn send_cancel(&mut self, local_id: &LocalOrderId, exchange_id: &str)
        -> TerminalResult<()>;

    async fn close(&mut self) -> TerminalResult<()> {
        Ok(())
    }
}
