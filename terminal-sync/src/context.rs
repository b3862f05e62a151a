//! Owning context for one sync engine instance
//!
//! Replaces process-wide shared state: the stores, the notifier and the
//! configuration are created together here and torn down together.

use std::sync::Arc;

use terminal_core::{Portfolio, TerminalResult};
use tokio::sync::broadcast;
use tracing::info;

use crate::config::SyncConfig;
use crate::feed::{FeedHandle, MarketDataFeed};
use crate::notify::{ChangeNotifier, StoreEvent};
use crate::orderbook::OrderBookStore;
use crate::orders::OrderLifecycleTracker;
use crate::positions::PositionAggregator;
use crate::transport::Transport;

#[derive(Debug)]
pub struct SyncContext {
    config: SyncConfig,
    notifier: ChangeNotifier,
    books: Arc<OrderBookStore>,
    orders: Arc<OrderLifecycleTracker>,
    positions: Arc<PositionAggregator>,
}

impl SyncContext {
    pub fn new(config: SyncConfig) -> TerminalResult<Self> {
        config.validate()?;
        let notifier = ChangeNotifier::new(config.notify_capacity);

        Ok(Self {
            books: Arc::new(OrderBookStore::new(notifier.clone())),
            orders: Arc::new(OrderLifecycleTracker::new(notifier.clone())),
            positions: Arc::new(PositionAggregator::new(notifier.clone())),
            notifier,
            config,
        })
    }

    /// Build the feed for a transport; spawn `feed.run()` on the runtime
    pub fn feed<T: Transport>(&self, transport: T) -> (MarketDataFeed<T>, FeedHandle) {
        MarketDataFeed::new(
            transport,
            Arc::clone(&self.books),
            Arc::clone(&self.orders),
            Arc::clone(&self.positions),
            self.notifier.clone(),
            self.config.feed.clone(),
        )
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn books(&self) -> &Arc<OrderBookStore> {
        &self.books
    }

    pub fn orders(&self) -> &Arc<OrderLifecycleTracker> {
        &self.orders
    }

    pub fn positions(&self) -> &Arc<PositionAggregator> {
        &self.positions
    }

    pub fn subscribe_changes(&self) -> broadcast::Receiver<StoreEvent> {
        self.notifier.subscribe()
    }

    /// Portfolio summary with every position marked at its book mid price
    pub fn portfolio(&self) -> Portfolio {
        let mut portfolio = Portfolio::new();
        let mut positions: Vec<_> = self.positions.positions().into_values().collect();
        positions.sort_by(|a, b| a.key().cmp(&b.key()));

        for position in positions {
            let mark = self.books.mid_price(&position.market_id, position.outcome);
            portfolio.add_position(position, mark);
        }
        portfolio.open_orders = self.orders.open_order_count();
        portfolio
    }

    /// Drop every book; orders and positions stay readable
    pub fn teardown(&self) {
        let mut removed = 0;
        for market_id in self
            .books
            .book_keys()
            .into_iter()
            .map(|key| key.market_id)
            .collect::<std::collections::BTreeSet<_>>()
        {
            removed += self.books.remove_market(&market_id);
            self.orders.release_market(&market_id);
        }
        info!("Sync context torn down ({} book(s) removed)", removed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use terminal_core::{FillReport, OrderSide, OrderSpec, Outcome, PriceLevel};

    #[test]
    fn test_portfolio_marks_at_mid() {
        let ctx = SyncContext::new(SyncConfig::default()).unwrap();
        ctx.books()
            .apply_snapshot(
                "m1",
                Outcome::Yes,
                vec![PriceLevel::new(dec!(0.58), dec!(10))],
                vec![PriceLevel::new(dec!(0.62), dec!(10))],
                1,
            )
            .unwrap();

        let id = ctx
            .orders()
            .submit(OrderSpec::limit("m1", Outcome::Yes, OrderSide::Buy, dec!(0.50), dec!(100)))
            .unwrap();
        ctx.orders().on_ack(&id, "ex-1").unwrap();
        let report = FillReport {
            price: dec!(0.50),
            size: dec!(40),
            timestamp: Utc::now(),
        };
        if let crate::FillOutcome::Applied(fill) = ctx.orders().on_fill("ex-1", report).unwrap() {
            ctx.positions().on_fill(fill);
        }

        let portfolio = ctx.portfolio();
        assert_eq!(portfolio.open_positions(), 1);
        assert_eq!(portfolio.positions[0].mark_price, dec!(0.60));
        assert_eq!(portfolio.unrealized_pnl, dec!(4.00));
        assert_eq!(portfolio.positions_value, dec!(24.00));
        assert_eq!(portfolio.open_orders, 1);
    }

    #[test]
    fn test_teardown_keeps_orders() {
        let ctx = SyncContext::new(SyncConfig::default()).unwrap();
        ctx.books()
            .apply_snapshot("m1", Outcome::No, vec![], vec![], 1)
            .unwrap();
        let id = ctx
            .orders()
            .submit(OrderSpec::market("m1", Outcome::No, OrderSide::Sell, dec!(3)))
            .unwrap();

        ctx.teardown();
        assert!(ctx.books().book_keys().is_empty());
        assert!(ctx.orders().get(&id).is_some());
        assert!(ctx.orders().orders_for_market("m1").is_empty());
    }

    #[test]
    fn test_invalid_config_refused() {
        let mut config = SyncConfig::default();
        config.notify_capacity = 0;
        assert!(SyncContext::new(config).is_err());
    }
}
