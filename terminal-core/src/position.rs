//! Position and portfolio tracking structures

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::market::{BookKey, Outcome};

/// Net holding in one outcome of one market, derived from fills
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Market identifier
    pub market_id: String,

    /// Which outcome this position is in (YES or NO)
    pub outcome: Outcome,

    /// Signed number of contracts held (negative when short)
    pub net_size: Decimal,

    /// Weighted-average cost of the open contracts
    pub avg_entry_price: Decimal,

    /// Profit/loss locked in by closing fills
    pub realized_pnl: Decimal,
}

impl Position {
    /// Create a flat position
    pub fn flat(key: &BookKey) -> Self {
        Self {
            market_id: key.market_id.clone(),
            outcome: key.outcome,
            net_size: Decimal::ZERO,
            avg_entry_price: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
        }
    }

    pub fn key(&self) -> BookKey {
        BookKey::new(self.market_id.clone(), self.outcome)
    }

    pub fn is_flat(&self) -> bool {
        self.net_size.is_zero()
    }

    /// Calculate the cost basis of the open contracts
    pub fn cost_basis(&self) -> Decimal {
        self.net_size.abs() * self.avg_entry_price
    }

    /// Calculate the current value of this position at a mark price
    pub fn market_value(&self, mark: Decimal) -> Decimal {
        self.net_size * mark
    }

    /// Calculate unrealized P&L at a mark price
    pub fn unrealized_pnl(&self, mark: Decimal) -> Decimal {
        (mark - self.avg_entry_price) * self.net_size
    }

    /// Calculate unrealized P&L as a percentage of cost basis
    pub fn pnl_percentage(&self, mark: Decimal) -> Decimal {
        if self.cost_basis().is_zero() {
            Decimal::ZERO
        } else {
            (self.unrealized_pnl(mark) / self.cost_basis()) * Decimal::ONE_HUNDRED
        }
    }
}

/// A position together with the price it was marked at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkedPosition {
    pub position: Position,
    /// Mark used for valuation; falls back to entry price when the book is empty
    pub mark_price: Decimal,
    pub unrealized_pnl: Decimal,
    /// Unrealized P&L as a percentage of cost basis
    pub pnl_percentage: Decimal,
}

/// Aggregated portfolio summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Portfolio {
    /// Open (non-flat) positions with their marks
    pub positions: Vec<MarkedPosition>,

    /// Total value of the open positions at their marks
    pub positions_value: Decimal,

    /// Sum of realized P&L, including positions that are now flat
    pub realized_pnl: Decimal,

    /// Sum of unrealized P&L
    pub unrealized_pnl: Decimal,

    /// Number of orders not yet in a terminal state
    pub open_orders: usize,
}

impl Portfolio {
    /// Create an empty portfolio
    pub fn new() -> Self {
        Self {
            positions: Vec::new(),
            positions_value: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            unrealized_pnl: Decimal::ZERO,
            open_orders: 0,
        }
    }

    /// Add a position marked at `mark` (or at entry price when unmarked)
    pub fn add_position(&mut self, position: Position, mark: Option<Decimal>) {
        self.realized_pnl += position.realized_pnl;
        if position.is_flat() {
            return;
        }
        let mark_price = mark.unwrap_or(position.avg_entry_price);
        let unrealized_pnl = position.unrealized_pnl(mark_price);
        let pnl_percentage = position.pnl_percentage(mark_price);
        self.positions_value += position.market_value(mark_price);
        self.unrealized_pnl += unrealized_pnl;
        self.positions.push(MarkedPosition {
            position,
            mark_price,
            unrealized_pnl,
            pnl_percentage,
        });
    }

    /// Number of non-flat positions
    pub fn open_positions(&self) -> usize {
        self.positions.len()
    }

    /// Get positions filtered by market
    pub fn positions_for_market(&self, market_id: &str) -> Vec<&MarkedPosition> {
        self.positions
            .iter()
            .filter(|p| p.position.market_id == market_id)
            .collect()
    }
}

impl Default for Portfolio {
    fn default() -> Self {
        Self::new()
    }
}
