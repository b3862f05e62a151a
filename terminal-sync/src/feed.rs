//! Market data feed
//!
//! The feed is the single writer of the sync engine: one task owns the
//! transport, reconnects with backoff, and applies every message to the
//! stores in arrival order. Presentation tasks talk to it through a cloneable
//! [`FeedHandle`].

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use terminal_core::{
    BookKey, ConnectionState, FeedMessage, FillReport, LocalOrderId, OrderRequest, OrderSpec,
    OrderStatus, Outcome, TerminalError, TerminalResult,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::backoff::Backoff;
use crate::config::{FeedConfig, GapPolicy};
use crate::notify::{ChangeNotifier, StoreEvent};
use crate::orderbook::OrderBookStore;
use crate::orders::{FillOutcome, OrderLifecycleTracker};
use crate::positions::PositionAggregator;
use crate::transport::Transport;

/// Commands sent to the feed task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedCommand {
    Subscribe(String),
    Unsubscribe(String),
    /// Send an order already recorded in the tracker
    SendOrder(LocalOrderId),
    /// Send a cancel already recorded in the tracker
    Cancel(LocalOrderId),
    Shutdown,
}

/// Cloneable handle used by presentation tasks to drive the feed
#[derive(Debug, Clone)]
pub struct FeedHandle {
    tx: mpsc::Sender<FeedCommand>,
    orders: Arc<OrderLifecycleTracker>,
}

impl FeedHandle {
    async fn send(&self, command: FeedCommand) -> TerminalResult<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| TerminalError::disconnected("feed task has stopped"))
    }

    fn ensure_running(&self) -> TerminalResult<()> {
        if self.tx.is_closed() {
            return Err(TerminalError::disconnected("feed task has stopped"));
        }
        Ok(())
    }

    pub async fn subscribe(&self, market_id: impl Into<String>) -> TerminalResult<()> {
        self.send(FeedCommand::Subscribe(market_id.into())).await
    }

    pub async fn unsubscribe(&self, market_id: impl Into<String>) -> TerminalResult<()> {
        self.send(FeedCommand::Unsubscribe(market_id.into())).await
    }

    /// Record the order optimistically and queue it for sending
    ///
    /// Validation happens here, so an invalid order is refused before it
    /// reaches the feed. Once the feed has stopped nothing is recorded; an
    /// order that loses the race with shutdown is rejected locally.
    pub async fn submit(&self, spec: OrderSpec) -> TerminalResult<LocalOrderId> {
        self.ensure_running()?;
        let local_id = self.orders.submit(spec)?;
        if let Err(e) = self.send(FeedCommand::SendOrder(local_id.clone())).await {
            self.orders.on_reject(&local_id, "feed stopped")?;
            return Err(e);
        }
        Ok(local_id)
    }

    /// Request cancellation; the order is CANCELLED only once the exchange confirms
    pub async fn cancel(&self, local_id: &LocalOrderId) -> TerminalResult<()> {
        self.ensure_running()?;
        self.orders.cancel(local_id)?;
        self.send(FeedCommand::Cancel(local_id.clone())).await
    }

    pub async fn shutdown(&self) -> TerminalResult<()> {
        self.send(FeedCommand::Shutdown).await
    }

    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }
}

enum Flow {
    Continue,
    Shutdown,
}

enum SessionEnd {
    Shutdown,
    Disconnected(TerminalError),
}

/// Reconnecting feed that owns a transport and writes into the stores
pub struct MarketDataFeed<T: Transport> {
    transport: T,
    books: Arc<OrderBookStore>,
    orders: Arc<OrderLifecycleTracker>,
    positions: Arc<PositionAggregator>,
    notifier: ChangeNotifier,
    config: FeedConfig,
    backoff: Backoff,
    commands: mpsc::Receiver<FeedCommand>,
    subscriptions: BTreeSet<String>,
    /// Consecutive refused snapshots per book, reset by an accepted one
    refused_snapshots: HashMap<BookKey, u32>,
}

impl<T: Transport> MarketDataFeed<T> {
    pub fn new(
        transport: T,
        books: Arc<OrderBookStore>,
        orders: Arc<OrderLifecycleTracker>,
        positions: Arc<PositionAggregator>,
        notifier: ChangeNotifier,
        config: FeedConfig,
    ) -> (Self, FeedHandle) {
        let (tx, commands) = mpsc::channel(config.command_buffer.max(1));
        let handle = FeedHandle {
            tx,
            orders: Arc::clone(&orders),
        };
        let backoff = Backoff::new(config.backoff.clone());

        (
            Self {
                transport,
                books,
                orders,
                positions,
                notifier,
                config,
                backoff,
                commands,
                subscriptions: BTreeSet::new(),
                refused_snapshots: HashMap::new(),
            },
            handle,
        )
    }

    /// Replace the jitter source, for deterministic tests
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    fn set_state(&self, state: ConnectionState) {
        self.notifier.publish(StoreEvent::Connection { state });
    }

    /// Run until shutdown or until reconnect attempts are exhausted
    ///
    /// Returns `Ok(())` on shutdown (explicit or all handles dropped) and
    /// `TransportDisconnected` when the backoff policy gives up.
    pub async fn run(mut self) -> TerminalResult<()> {
        loop {
            self.set_state(ConnectionState::Connecting);
            info!("[Feed] Connecting");

            let session = match self.transport.connect().await {
                Ok(()) => {
                    info!("[Feed] Connected");
                    self.backoff.reset();
                    self.set_state(ConnectionState::Connected);
                    match self.on_connected().await {
                        Ok(()) => self.session().await,
                        Err(e) => SessionEnd::Disconnected(e),
                    }
                }
                Err(e) => SessionEnd::Disconnected(e),
            };

            match session {
                SessionEnd::Shutdown => return self.shutdown().await,
                SessionEnd::Disconnected(e) => {
                    error!("[Feed] Connection lost: {}", e);
                    self.set_state(ConnectionState::Disconnected);
                }
            }

            if let Flow::Shutdown = self.pause().await? {
                return self.shutdown().await;
            }
        }
    }

    /// Wait out the backoff delay while still accepting commands
    async fn pause(&mut self) -> TerminalResult<Flow> {
        let delay = self.backoff.next_delay();
        if self.backoff.exhausted() {
            error!(
                "[Feed] Giving up after {} reconnect attempts",
                self.backoff.attempts()
            );
            self.set_state(ConnectionState::Failed);
            return Err(TerminalError::disconnected(format!(
                "gave up after {} attempts",
                self.backoff.attempts()
            )));
        }

        info!(
            "[Feed] Reconnecting in {:?} (attempt {})",
            delay,
            self.backoff.attempts()
        );
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => return Ok(Flow::Continue),
                command = self.commands.recv() => match command {
                    None | Some(FeedCommand::Shutdown) => return Ok(Flow::Shutdown),
                    Some(command) => self.handle_offline_command(command),
                },
            }
        }
    }

    async fn shutdown(&mut self) -> TerminalResult<()> {
        info!("[Feed] Shutting down");
        if let Err(e) = self.transport.close().await {
            warn!("[Feed] Error closing transport: {}", e);
        }
        self.set_state(ConnectionState::Disconnected);
        Ok(())
    }

    /// Restore subscriptions and in-flight requests after (re)connecting
    async fn on_connected(&mut self) -> TerminalResult<()> {
        self.refused_snapshots.clear();
        let markets: Vec<String> = self.subscriptions.iter().cloned().collect();
        for market_id in &markets {
            self.transport.subscribe(market_id).await?;
            for key in BookKey::both(market_id) {
                if self.books.contains(&key.market_id, key.outcome) {
                    self.resync(&key).await?;
                }
            }
        }
        if !markets.is_empty() {
            info!("[Feed] Re-subscribed to {} market(s)", markets.len());
        }

        for order in self.orders.pending_orders() {
            info!("[Feed] Re-sending pending order {}", order.local_id);
            self.send_order(&order.local_id).await?;
        }

        for order in self.orders.active_orders() {
            if let (true, Some(exchange_id)) = (order.cancel_requested, &order.exchange_id) {
                info!("[Feed] Re-sending cancel for {}", order.local_id);
                self.transport
                    .send_cancel(&order.local_id, exchange_id)
                    .await?;
            }
        }
        Ok(())
    }

    async fn session(&mut self) -> SessionEnd {
        loop {
            tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    None | Some(FeedCommand::Shutdown) => return SessionEnd::Shutdown,
                    Some(command) => {
                        if let Err(e) = self.handle_command(command).await {
                            if e.requires_reconnect() {
                                return SessionEnd::Disconnected(e);
                            }
                            warn!("[Feed] Command failed: {}", e);
                        }
                    }
                },

                message = self.transport.next_message() => match message {
                    Ok(Some(message)) => {
                        if let Err(e) = self.dispatch(message).await {
                            return SessionEnd::Disconnected(e);
                        }
                    }
                    Ok(None) => {
                        return SessionEnd::Disconnected(TerminalError::disconnected(
                            "stream ended",
                        ))
                    }
                    Err(e) => return SessionEnd::Disconnected(e),
                },
            }
        }
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    async fn handle_command(&mut self, command: FeedCommand) -> TerminalResult<()> {
        match command {
            FeedCommand::Subscribe(market_id) => {
                if self.subscriptions.insert(market_id.clone()) {
                    info!("[Feed] Subscribing to {}", market_id);
                    self.transport.subscribe(&market_id).await?;
                } else {
                    debug!("[Feed] Already subscribed to {}", market_id);
                }
            }
            FeedCommand::Unsubscribe(market_id) => {
                if self.subscriptions.remove(&market_id) {
                    info!("[Feed] Unsubscribing from {}", market_id);
                    self.teardown(&market_id);
                    self.transport.unsubscribe(&market_id).await?;
                }
            }
            FeedCommand::SendOrder(local_id) => self.send_order(&local_id).await?,
            FeedCommand::Cancel(local_id) => self.send_cancel(&local_id).await?,
            FeedCommand::Shutdown => {}
        }
        Ok(())
    }

    /// Commands received while disconnected only update local bookkeeping;
    /// orders and cancels go out from `on_connected`
    fn handle_offline_command(&mut self, command: FeedCommand) {
        match command {
            FeedCommand::Subscribe(market_id) => {
                self.subscriptions.insert(market_id);
            }
            FeedCommand::Unsubscribe(market_id) => {
                if self.subscriptions.remove(&market_id) {
                    self.teardown(&market_id);
                }
            }
            FeedCommand::SendOrder(local_id) | FeedCommand::Cancel(local_id) => {
                debug!("[Feed] {} queued until reconnect", local_id);
            }
            FeedCommand::Shutdown => {}
        }
    }

    fn teardown(&mut self, market_id: &str) {
        self.refused_snapshots
            .retain(|key, _| key.market_id != market_id);
        let books = self.books.remove_market(market_id);
        let orders = self.orders.release_market(market_id);
        debug!(
            "[Feed] Tore down {}: {} book(s), {} order link(s)",
            market_id, books, orders
        );
    }

    async fn send_order(&mut self, local_id: &LocalOrderId) -> TerminalResult<()> {
        let Some(order) = self.orders.get(local_id) else {
            debug!("[Feed] Order {} no longer tracked", local_id);
            return Ok(());
        };
        if !order.status.is_pending() {
            debug!("[Feed] Order {} is {}, not sending", local_id, order.status);
            return Ok(());
        }

        let request = OrderRequest {
            local_id: local_id.clone(),
            order: order.spec(),
        };
        match self.transport.send_order(&request).await {
            Ok(sent) => {
                if &sent != local_id {
                    warn!("[Feed] Transport echoed {} for order {}", sent, local_id);
                }
                if order.status == OrderStatus::PendingSubmit {
                    self.orders.mark_sent(local_id)?;
                }
                Ok(())
            }
            Err(e) if e.requires_reconnect() => Err(e),
            Err(e) => {
                self.orders.on_reject(local_id, &e.to_string())?;
                Ok(())
            }
        }
    }

    async fn send_cancel(&mut self, local_id: &LocalOrderId) -> TerminalResult<()> {
        let Some(order) = self.orders.get(local_id) else {
            return Ok(());
        };
        if order.status.is_terminal() || !order.cancel_requested {
            return Ok(());
        }
        match &order.exchange_id {
            Some(exchange_id) => self.transport.send_cancel(local_id, exchange_id).await,
            None => {
                debug!("[Feed] Cancel for {} deferred until ack", local_id);
                Ok(())
            }
        }
    }

    // ------------------------------------------------------------------------
    // Inbound messages
    // ------------------------------------------------------------------------

    /// Apply one message; only transport failures are returned
    async fn dispatch(&mut self, message: FeedMessage) -> TerminalResult<()> {
        match message {
            FeedMessage::Snapshot {
                market_id,
                outcome,
                bids,
                asks,
                sequence,
            } => {
                if !self.subscriptions.contains(&market_id) {
                    debug!(
                        "[Feed] Dropping snapshot seq {} for unsubscribed market {}",
                        sequence, market_id
                    );
                    return Ok(());
                }
                let key = BookKey::new(market_id, outcome);
                match self
                    .books
                    .apply_snapshot(&key.market_id, outcome, bids, asks, sequence)
                {
                    Ok(()) => {
                        self.refused_snapshots.remove(&key);
                    }
                    Err(e) => {
                        warn!("[Feed] Snapshot rejected: {}", e);
                        self.retry_snapshot(&key).await?;
                    }
                }
            }
            FeedMessage::Delta {
                market_id,
                outcome,
                side,
                price,
                size,
                sequence,
            } => {
                if !self.subscriptions.contains(&market_id) {
                    debug!(
                        "[Feed] Dropping delta seq {} for unsubscribed market {}",
                        sequence, market_id
                    );
                    return Ok(());
                }
                if self.has_gap(&market_id, outcome, sequence) {
                    let key = BookKey::new(market_id, outcome);
                    warn!("[Feed] Sequence gap on {} at {}", key, sequence);
                    return self.resync(&key).await;
                }
                match self
                    .books
                    .apply_delta(&market_id, outcome, side, price, size, sequence)
                {
                    Ok(()) => {}
                    Err(e @ TerminalError::StaleSequence { .. }) => {
                        debug!("[Feed] {}", e);
                        if self.config.resync_on_stale {
                            self.resync(&BookKey::new(market_id, outcome)).await?;
                        }
                    }
                    Err(e @ (TerminalError::UnknownBook(_) | TerminalError::AwaitingSnapshot(_))) => {
                        debug!("[Feed] Dropping delta: {}", e);
                    }
                    Err(e) => {
                        warn!("[Feed] {}", e);
                        self.resync(&BookKey::new(market_id, outcome)).await?;
                    }
                }
            }
            FeedMessage::Ack {
                local_id,
                exchange_id,
            } => match self.orders.on_ack(&local_id, &exchange_id) {
                Ok(order) if order.cancel_requested => {
                    info!("[Feed] Sending cancel requested before ack for {}", local_id);
                    self.transport.send_cancel(&local_id, &exchange_id).await?;
                }
                Ok(_) => {}
                Err(e) => debug!("[Feed] Ignoring ack: {}", e),
            },
            FeedMessage::Reject { local_id, reason } => {
                if let Err(e) = self.orders.on_reject(&local_id, &reason) {
                    debug!("[Feed] Ignoring reject: {}", e);
                }
            }
            FeedMessage::Fill {
                exchange_id,
                price,
                size,
                timestamp,
            } => {
                let report = FillReport {
                    price,
                    size,
                    timestamp,
                };
                match self.orders.on_fill(&exchange_id, report) {
                    Ok(FillOutcome::Applied(fill)) => {
                        self.positions.on_fill(fill);
                    }
                    Ok(FillOutcome::Duplicate) => {}
                    Err(e @ TerminalError::UnknownOrder(_)) => debug!("[Feed] Ignoring fill: {}", e),
                    Err(e) => warn!("[Feed] Fill rejected: {}", e),
                }
            }
            FeedMessage::CancelAck { exchange_id } => {
                if let Err(e) = self.orders.on_cancel_ack(&exchange_id) {
                    debug!("[Feed] Ignoring cancel ack: {}", e);
                }
            }
            FeedMessage::CancelReject {
                exchange_id,
                reason,
            } => {
                if let Err(e) = self.orders.on_cancel_reject(&exchange_id, &reason) {
                    debug!("[Feed] Ignoring cancel reject: {}", e);
                }
            }
            FeedMessage::Expired { exchange_id } => {
                if let Err(e) = self.orders.on_expire(&exchange_id) {
                    debug!("[Feed] Ignoring expiry: {}", e);
                }
            }
        }
        Ok(())
    }

    fn has_gap(&self, market_id: &str, outcome: Outcome, sequence: u64) -> bool {
        if self.config.gap_policy == GapPolicy::Tolerate
            || self.books.is_resyncing(market_id, outcome)
        {
            return false;
        }
        self.books
            .last_sequence(market_id, outcome)
            .is_some_and(|last| sequence > last.saturating_add(1))
    }

    /// Re-request a refused snapshot, up to `max_snapshot_retries` in a row
    ///
    /// Past the limit the book stays resyncing until the next reconnect or
    /// resubscribe.
    async fn retry_snapshot(&mut self, key: &BookKey) -> TerminalResult<()> {
        let refused = self.refused_snapshots.entry(key.clone()).or_default();
        *refused = refused.saturating_add(1);
        if *refused > self.config.max_snapshot_retries {
            if *refused == self.config.max_snapshot_retries.saturating_add(1) {
                error!(
                    "[Feed] {} refused {} snapshots in a row, no longer requesting",
                    key, refused
                );
            }
            return Ok(());
        }
        self.resync(key).await
    }

    /// Mark one book stale and ask for a fresh snapshot of it
    async fn resync(&mut self, key: &BookKey) -> TerminalResult<()> {
        if self.books.mark_resyncing(&key.market_id, key.outcome) {
            warn!("[Feed] Resyncing {}", key);
        }
        self.transport
            .request_snapshot(&key.market_id, key.outcome)
            .await
    }
}
