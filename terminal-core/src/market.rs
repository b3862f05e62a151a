//! Market data structures for prediction market order books

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of a binary prediction market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Yes,
    No,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Yes => "YES",
            Outcome::No => "NO",
        }
    }

    /// The complementary outcome
    pub fn opposite(&self) -> Self {
        match self {
            Outcome::Yes => Outcome::No,
            Outcome::No => Outcome::Yes,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Outcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "YES" | "Y" => Ok(Outcome::Yes),
            "NO" | "N" => Ok(Outcome::No),
            _ => Err(format!("Unknown outcome: {}", s)),
        }
    }
}

/// Side of a book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookSide {
    /// Resting buy interest (sorted by price descending)
    Bid,
    /// Resting sell interest (sorted by price ascending)
    Ask,
}

impl fmt::Display for BookSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookSide::Bid => f.write_str("bid"),
            BookSide::Ask => f.write_str("ask"),
        }
    }
}

/// Identity of one book: a market and one of its outcomes
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BookKey {
    pub market_id: String,
    pub outcome: Outcome,
}

impl BookKey {
    pub fn new(market_id: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            market_id: market_id.into(),
            outcome,
        }
    }

    /// Both books of a market
    pub fn both(market_id: &str) -> [BookKey; 2] {
        [
            BookKey::new(market_id, Outcome::Yes),
            BookKey::new(market_id, Outcome::No),
        ]
    }
}

impl fmt::Display for BookKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.market_id, self.outcome)
    }
}

// ============================================================================
// Order Book Types
// ============================================================================

/// A single price level in the order book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    /// Price (0.00 - 1.00 representing probability)
    pub price: Decimal,
    /// Total size resting at this price
    pub size: Decimal,
}

impl PriceLevel {
    pub fn new(price: Decimal, size: Decimal) -> Self {
        Self { price, size }
    }

    /// Notional value of the level (price * size)
    pub fn notional(&self) -> Decimal {
        self.price * self.size
    }
}

/// A level as shown in a depth ladder, with the running notional from the top
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthLevel {
    pub price: Decimal,
    pub size: Decimal,
    /// Cumulative notional from the best level down to this one
    pub total: Decimal,
}

/// Best bid, best ask and the spread between them
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopOfBook {
    pub best_bid: Option<PriceLevel>,
    pub best_ask: Option<PriceLevel>,
    pub spread: Option<Decimal>,
}

impl TopOfBook {
    pub fn new(best_bid: Option<PriceLevel>, best_ask: Option<PriceLevel>) -> Self {
        let spread = match (best_bid, best_ask) {
            (Some(bid), Some(ask)) => Some(ask.price - bid.price),
            _ => None,
        };
        Self {
            best_bid,
            best_ask,
            spread,
        }
    }

    /// Midpoint between best bid and best ask
    pub fn mid_price(&self) -> Option<Decimal> {
        match (self.best_bid, self.best_ask) {
            (Some(bid), Some(ask)) => Some((bid.price + ask.price) / Decimal::TWO),
            _ => None,
        }
    }

    /// A book is crossed (or locked) when the best bid reaches the best ask
    pub fn is_crossed(&self) -> bool {
        matches!(
            (self.best_bid, self.best_ask),
            (Some(bid), Some(ask)) if bid.price >= ask.price
        )
    }
}

/// Ordered depth ladder for a book, truncated to a number of levels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookDepth {
    pub key: BookKey,
    /// Best (highest) bid first
    pub bids: Vec<DepthLevel>,
    /// Best (lowest) ask first
    pub asks: Vec<DepthLevel>,
    pub sequence: u64,
    /// True while the book waits for a fresh snapshot
    pub resyncing: bool,
}

impl BookDepth {
    /// Build a ladder from levels already sorted best-first
    pub fn from_levels(
        key: BookKey,
        bids: impl IntoIterator<Item = PriceLevel>,
        asks: impl IntoIterator<Item = PriceLevel>,
        sequence: u64,
        resyncing: bool,
    ) -> Self {
        Self {
            key,
            bids: accumulate(bids),
            asks: accumulate(asks),
            sequence,
            resyncing,
        }
    }
}

fn accumulate(levels: impl IntoIterator<Item = PriceLevel>) -> Vec<DepthLevel> {
    let mut total = Decimal::ZERO;
    levels
        .into_iter()
        .map(|level| {
            total += level.notional();
            DepthLevel {
                price: level.price,
                size: level.size,
                total,
            }
        })
        .collect()
}

/// Consistent copy of a whole book at one sequence number
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    pub key: BookKey,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
    pub sequence: u64,
    pub resyncing: bool,
    pub updated_at: DateTime<Utc>,
}
