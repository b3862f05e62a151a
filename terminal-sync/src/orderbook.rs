//! Order book store
//!
//! Maintains one price-level book per (market, outcome) from snapshots and
//! sequenced deltas. The store is a pure function of the last snapshot and
//! the ordered deltas applied after it: it never repairs gaps itself, it
//! reports staleness and leaves resynchronization to the feed.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::Serialize;
use terminal_core::{
    BookDepth, BookKey, BookSide, OrderBookSnapshot, OrderSide, Outcome, PriceLevel, TerminalError,
    TerminalResult, TopOfBook,
};
use tracing::{debug, info, warn};

use crate::notify::{ChangeNotifier, StoreEvent};

/// Mutable state of a single book, guarded by its own lock
#[derive(Debug)]
struct Book {
    /// price -> size, iterated in reverse for best-first
    bids: BTreeMap<Decimal, Decimal>,
    /// price -> size, iterated forward for best-first
    asks: BTreeMap<Decimal, Decimal>,
    last_sequence: u64,
    /// Cached best levels, refreshed on every mutation
    top: TopOfBook,
    resyncing: bool,
    updated_at: DateTime<Utc>,
}

impl Book {
    fn from_levels(
        key: &BookKey,
        bids: &[PriceLevel],
        asks: &[PriceLevel],
        sequence: u64,
    ) -> TerminalResult<Self> {
        let bids = collect_side(bids)?;
        let asks = collect_side(asks)?;
        let top = compute_top(&bids, &asks);
        if top.is_crossed() {
            return Err(crossed(key, &top));
        }
        Ok(Self {
            bids,
            asks,
            last_sequence: sequence,
            top,
            resyncing: false,
            updated_at: Utc::now(),
        })
    }

    fn side_mut(&mut self, side: BookSide) -> &mut BTreeMap<Decimal, Decimal> {
        match side {
            BookSide::Bid => &mut self.bids,
            BookSide::Ask => &mut self.asks,
        }
    }

    fn bid_levels(&self) -> impl Iterator<Item = PriceLevel> + '_ {
        self.bids
            .iter()
            .rev()
            .map(|(price, size)| PriceLevel::new(*price, *size))
    }

    fn ask_levels(&self) -> impl Iterator<Item = PriceLevel> + '_ {
        self.asks
            .iter()
            .map(|(price, size)| PriceLevel::new(*price, *size))
    }
}

fn collect_side(levels: &[PriceLevel]) -> TerminalResult<BTreeMap<Decimal, Decimal>> {
    let mut side = BTreeMap::new();
    for level in levels {
        validate_level(level.price, level.size)?;
        if level.size.is_zero() {
            continue;
        }
        side.insert(level.price.normalize(), level.size);
    }
    Ok(side)
}

/// Largest size accepted on a single level; with prices capped at 1 this
/// keeps cumulative notionals far from `Decimal::MAX`
pub const MAX_LEVEL_SIZE: i64 = 1_000_000_000_000_000;

fn validate_level(price: Decimal, size: Decimal) -> TerminalResult<()> {
    if price <= Decimal::ZERO || price > Decimal::ONE {
        return Err(TerminalError::invalid_level(format!(
            "price must be in (0, 1], got {}",
            price
        )));
    }
    if size < Decimal::ZERO {
        return Err(TerminalError::invalid_level(format!(
            "size must not be negative, got {}",
            size
        )));
    }
    if size > Decimal::from(MAX_LEVEL_SIZE) {
        return Err(TerminalError::invalid_level(format!(
            "size {} exceeds {}",
            size, MAX_LEVEL_SIZE
        )));
    }
    Ok(())
}

fn compute_top(bids: &BTreeMap<Decimal, Decimal>, asks: &BTreeMap<Decimal, Decimal>) -> TopOfBook {
    TopOfBook::new(
        bids.last_key_value()
            .map(|(price, size)| PriceLevel::new(*price, *size)),
        asks.first_key_value()
            .map(|(price, size)| PriceLevel::new(*price, *size)),
    )
}

fn crossed(key: &BookKey, top: &TopOfBook) -> TerminalError {
    TerminalError::CrossedBook {
        key: key.clone(),
        best_bid: top.best_bid.map(|l| l.price).unwrap_or_default(),
        best_ask: top.best_ask.map(|l| l.price).unwrap_or_default(),
    }
}

/// Result of walking the book for an order of a given size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CostEstimate {
    /// Size that would execute immediately against resting liquidity
    pub marketable_size: Decimal,
    /// Size left over (resting at the limit, or unfillable for market orders)
    pub unfilled_size: Decimal,
    /// Total notional including the resting part priced at the limit
    pub cost: Decimal,
    /// Average price of the marketable part
    pub avg_price: Option<Decimal>,
}

/// Store of all subscribed books
pub struct OrderBookStore {
    books: DashMap<BookKey, Arc<RwLock<Book>>>,
    notifier: ChangeNotifier,
}

impl OrderBookStore {
    pub fn new(notifier: ChangeNotifier) -> Self {
        Self {
            books: DashMap::new(),
            notifier,
        }
    }

    fn book(&self, key: &BookKey) -> Option<Arc<RwLock<Book>>> {
        self.books.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Replace a book wholesale and set its sequence high-water mark
    ///
    /// Creates the book on first snapshot. A snapshot that is itself crossed
    /// is refused and the existing book (if any) stays marked for resync.
    pub fn apply_snapshot(
        &self,
        market_id: &str,
        outcome: Outcome,
        bids: Vec<PriceLevel>,
        asks: Vec<PriceLevel>,
        sequence: u64,
    ) -> TerminalResult<()> {
        let key = BookKey::new(market_id, outcome);
        let fresh = match Book::from_levels(&key, &bids, &asks, sequence) {
            Ok(book) => book,
            Err(e) => {
                warn!("Refusing snapshot for {} at seq {}: {}", key, sequence, e);
                self.mark_resyncing(market_id, outcome);
                return Err(e);
            }
        };

        match self.book(&key) {
            Some(book) => *book.write() = fresh,
            None => {
                info!("Created book {} at seq {}", key, sequence);
                self.books.insert(key.clone(), Arc::new(RwLock::new(fresh)));
            }
        }

        debug!("Snapshot applied to {} at seq {}", key, sequence);
        self.notifier
            .publish(StoreEvent::BookUpdated { key, sequence });
        Ok(())
    }

    /// Upsert one price level (size 0 removes it)
    ///
    /// Deltas at or below the last applied sequence are dropped with
    /// `StaleSequence`. A delta that would cross the book is not applied;
    /// the book is marked resyncing and `CrossedBook` is returned.
    pub fn apply_delta(
        &self,
        market_id: &str,
        outcome: Outcome,
        side: BookSide,
        price: Decimal,
        new_size: Decimal,
        sequence: u64,
    ) -> TerminalResult<()> {
        let key = BookKey::new(market_id, outcome);
        let book = self
            .book(&key)
            .ok_or_else(|| TerminalError::UnknownBook(key.clone()))?;

        let mut guard = book.write();
        if guard.resyncing {
            return Err(TerminalError::AwaitingSnapshot(key));
        }
        if sequence <= guard.last_sequence {
            return Err(TerminalError::StaleSequence {
                key,
                sequence,
                last_applied: guard.last_sequence,
            });
        }
        validate_level(price, new_size)?;

        let price = price.normalize();
        let levels = guard.side_mut(side);
        let previous = if new_size.is_zero() {
            levels.remove(&price)
        } else {
            levels.insert(price, new_size)
        };

        let top = compute_top(&guard.bids, &guard.asks);
        if top.is_crossed() {
            // Roll back so readers never observe a crossed book
            let levels = guard.side_mut(side);
            match previous {
                Some(size) => levels.insert(price, size),
                None => levels.remove(&price),
            };
            guard.resyncing = true;
            drop(guard);

            let err = crossed(&key, &top);
            warn!("Delta seq {} on {} would cross the book: {}", sequence, key, err);
            self.notifier.publish(StoreEvent::BookResyncing { key });
            return Err(err);
        }

        guard.top = top;
        guard.last_sequence = sequence;
        guard.updated_at = Utc::now();
        drop(guard);

        self.notifier
            .publish(StoreEvent::BookUpdated { key, sequence });
        Ok(())
    }

    /// Flag a book as stale until the next snapshot arrives
    ///
    /// Returns false when no such book exists.
    pub fn mark_resyncing(&self, market_id: &str, outcome: Outcome) -> bool {
        let key = BookKey::new(market_id, outcome);
        let Some(book) = self.book(&key) else {
            return false;
        };
        let newly_marked = {
            let mut guard = book.write();
            !std::mem::replace(&mut guard.resyncing, true)
        };
        if newly_marked {
            self.notifier.publish(StoreEvent::BookResyncing { key });
        }
        true
    }

    /// Whether the book is waiting for a fresh snapshot
    pub fn is_resyncing(&self, market_id: &str, outcome: Outcome) -> bool {
        self.book(&BookKey::new(market_id, outcome))
            .map(|book| book.read().resyncing)
            .unwrap_or(false)
    }

    /// Discard both outcome books of a market
    pub fn remove_market(&self, market_id: &str) -> usize {
        let mut removed = 0;
        for key in BookKey::both(market_id) {
            if self.books.remove(&key).is_some() {
                removed += 1;
                self.notifier.publish(StoreEvent::BookRemoved { key });
            }
        }
        if removed > 0 {
            info!("Removed {} book(s) for market {}", removed, market_id);
        }
        removed
    }

    pub fn contains(&self, market_id: &str, outcome: Outcome) -> bool {
        self.books.contains_key(&BookKey::new(market_id, outcome))
    }

    /// Keys of all books currently held
    pub fn book_keys(&self) -> Vec<BookKey> {
        let mut keys: Vec<BookKey> = self.books.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    pub fn last_sequence(&self, market_id: &str, outcome: Outcome) -> Option<u64> {
        self.book(&BookKey::new(market_id, outcome))
            .map(|book| book.read().last_sequence)
    }

    // ------------------------------------------------------------------------
    // Read access
    // ------------------------------------------------------------------------

    pub fn best_bid(&self, market_id: &str, outcome: Outcome) -> Option<PriceLevel> {
        self.top_of_book(market_id, outcome)
            .and_then(|top| top.best_bid)
    }

    pub fn best_ask(&self, market_id: &str, outcome: Outcome) -> Option<PriceLevel> {
        self.top_of_book(market_id, outcome)
            .and_then(|top| top.best_ask)
    }

    /// Best bid, best ask and spread; None if the book does not exist
    pub fn top_of_book(&self, market_id: &str, outcome: Outcome) -> Option<TopOfBook> {
        self.book(&BookKey::new(market_id, outcome))
            .map(|book| book.read().top)
    }

    pub fn mid_price(&self, market_id: &str, outcome: Outcome) -> Option<Decimal> {
        self.top_of_book(market_id, outcome)
            .and_then(|top| top.mid_price())
    }

    /// Best `levels` levels per side with cumulative notional
    pub fn depth(&self, market_id: &str, outcome: Outcome, levels: usize) -> Option<BookDepth> {
        let key = BookKey::new(market_id, outcome);
        let book = self.book(&key)?;
        let guard = book.read();
        Some(BookDepth::from_levels(
            key,
            guard.bid_levels().take(levels),
            guard.ask_levels().take(levels),
            guard.last_sequence,
            guard.resyncing,
        ))
    }

    /// Full copy of a book, consistent at one sequence number
    pub fn snapshot(&self, market_id: &str, outcome: Outcome) -> Option<OrderBookSnapshot> {
        let key = BookKey::new(market_id, outcome);
        let book = self.book(&key)?;
        let guard = book.read();
        Some(OrderBookSnapshot {
            key,
            bids: guard.bid_levels().collect(),
            asks: guard.ask_levels().collect(),
            sequence: guard.last_sequence,
            resyncing: guard.resyncing,
            updated_at: guard.updated_at,
        })
    }

    /// Estimate the cost of an order against the current book
    ///
    /// Buys walk the asks, sells walk the bids. With a limit price only
    /// levels at or better than the limit are marketable and the remainder
    /// is priced at the limit; market orders leave the remainder unpriced.
    pub fn estimate_cost(
        &self,
        market_id: &str,
        outcome: Outcome,
        side: OrderSide,
        size: Decimal,
        limit_price: Option<Decimal>,
    ) -> Option<CostEstimate> {
        let book = self.book(&BookKey::new(market_id, outcome))?;
        let guard = book.read();

        let levels: Box<dyn Iterator<Item = PriceLevel> + '_> = match side {
            OrderSide::Buy => Box::new(guard.ask_levels()),
            OrderSide::Sell => Box::new(guard.bid_levels()),
        };

        let mut remaining = size;
        let mut marketable_cost = Decimal::ZERO;
        for level in levels {
            if remaining <= Decimal::ZERO {
                break;
            }
            let acceptable = match (side, limit_price) {
                (_, None) => true,
                (OrderSide::Buy, Some(limit)) => level.price <= limit,
                (OrderSide::Sell, Some(limit)) => level.price >= limit,
            };
            if !acceptable {
                break;
            }
            let take = remaining.min(level.size);
            marketable_cost += take * level.price;
            remaining -= take;
        }

        let marketable_size = size - remaining;
        let resting_cost = limit_price.map(|p| p * remaining).unwrap_or_default();
        Some(CostEstimate {
            marketable_size,
            unfilled_size: remaining,
            cost: marketable_cost + resting_cost,
            avg_price: (!marketable_size.is_zero()).then(|| marketable_cost / marketable_size),
        })
    }
}

impl std::fmt::Debug for OrderBookStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderBookStore")
            .field("books", &self.books.len())
            .finish()
    }
}
