//! Order and market-data reconciliation engine
//!
//! Sits between a streaming exchange feed and the terminal views:
//!
//! - [`OrderBookStore`]: per market+outcome books built from snapshots and
//!   sequenced deltas, with an O(1) top-of-book cache
//! - [`OrderLifecycleTracker`]: the order state machine, reconciling local
//!   submissions with exchange acks, fills and cancels
//! - [`PositionAggregator`]: positions and PnL derived from fills
//! - [`MarketDataFeed`]: the reconnecting single writer that drives a
//!   [`Transport`] and dispatches into the stores
//!
//! Every mutation is published as a [`StoreEvent`] through the context's
//! [`ChangeNotifier`].

pub mod backoff;
pub mod config;
pub mod context;
pub mod feed;
pub mod notify;
pub mod orderbook;
pub mod orders;
pub mod positions;
pub mod transport;
pub mod ws;

pub use backoff::{Backoff, BackoffConfig};
pub use config::{FeedConfig, GapPolicy, SyncConfig};
pub use context::SyncContext;
pub use feed::{FeedCommand, FeedHandle, MarketDataFeed};
pub use notify::{ChangeNotifier, StoreEvent, DEFAULT_NOTIFY_CAPACITY};
pub use orderbook::{CostEstimate, OrderBookStore};
pub use orders::{CancelRequest, FillOutcome, OrderLifecycleTracker};
pub use positions::{apply_fill, replay, PositionAggregator};
pub use transport::Transport;
pub use ws::WebSocketTransport;
