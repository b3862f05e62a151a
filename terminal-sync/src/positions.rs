//! Position aggregation from fills
//!
//! Positions are derived purely from the fill log using weighted-average
//! cost, so the whole state can be rebuilt by replaying fills in timestamp
//! order after a connectivity gap.

use std::collections::HashMap;

use parking_lot::RwLock;
use rust_decimal::Decimal;
use terminal_core::{BookKey, Fill, Outcome, Position};
use tracing::debug;

use crate::notify::{ChangeNotifier, StoreEvent};

/// Apply one fill to a position using weighted-average cost
///
/// Size-increasing fills re-average the entry price. Closing fills realize
/// `(price - avg_entry_price) * closed_size` (sign-adjusted for shorts) and
/// leave the entry price alone. A fill that flips the position opens the
/// remainder at the fill price.
pub fn apply_fill(position: &mut Position, fill: &Fill) {
    let signed = fill.signed_size();
    let net = position.net_size;

    if net.is_zero() || net.is_sign_positive() == signed.is_sign_positive() {
        let new_net = net + signed;
        let cost = net.abs() * position.avg_entry_price + fill.size * fill.price;
        position.avg_entry_price = cost / new_net.abs();
        position.net_size = new_net;
        return;
    }

    let closed = fill.size.min(net.abs());
    let direction = if net.is_sign_positive() {
        Decimal::ONE
    } else {
        Decimal::NEGATIVE_ONE
    };
    position.realized_pnl += (fill.price - position.avg_entry_price) * closed * direction;
    position.net_size = net + signed;

    if fill.size > net.abs() {
        position.avg_entry_price = fill.price;
    }
}

/// Rebuild positions from a fill log, applied in timestamp order
///
/// Fills sharing a timestamp keep their log order.
pub fn replay<'a>(fills: impl IntoIterator<Item = &'a Fill>) -> HashMap<BookKey, Position> {
    let mut ordered: Vec<&Fill> = fills.into_iter().collect();
    ordered.sort_by_key(|fill| fill.timestamp);

    let mut positions: HashMap<BookKey, Position> = HashMap::new();
    for fill in ordered {
        let key = fill.key();
        let position = positions
            .entry(key)
            .or_insert_with_key(|key| Position::flat(key));
        apply_fill(position, fill);
    }
    positions
}

#[derive(Debug, Default)]
struct AggregatorState {
    positions: HashMap<BookKey, Position>,
    fills: Vec<Fill>,
}

/// Per (market, outcome) positions and the fill log they came from
pub struct PositionAggregator {
    state: RwLock<AggregatorState>,
    notifier: ChangeNotifier,
}

impl PositionAggregator {
    pub fn new(notifier: ChangeNotifier) -> Self {
        Self {
            state: RwLock::new(AggregatorState::default()),
            notifier,
        }
    }

    /// Apply an applied fill and return the updated position
    pub fn on_fill(&self, fill: Fill) -> Position {
        let key = fill.key();
        let updated = {
            let mut state = self.state.write();
            let position = state
                .positions
                .entry(key.clone())
                .or_insert_with_key(|key| Position::flat(key));
            apply_fill(position, &fill);
            let updated = position.clone();
            state.fills.push(fill);
            updated
        };

        debug!(
            "Position {}: net {} @ {} (realized {})",
            key, updated.net_size, updated.avg_entry_price, updated.realized_pnl
        );
        self.notifier.publish(StoreEvent::PositionUpdated { key });
        updated
    }

    /// Replace incremental state with a full replay of the fill log
    pub fn rebuild(&self) {
        let keys: Vec<BookKey> = {
            let mut state = self.state.write();
            state.positions = replay(state.fills.iter());
            state.positions.keys().cloned().collect()
        };
        debug!("Rebuilt {} position(s) from fill log", keys.len());
        for key in keys {
            self.notifier.publish(StoreEvent::PositionUpdated { key });
        }
    }

    pub fn positions(&self) -> HashMap<BookKey, Position> {
        self.state.read().positions.clone()
    }

    pub fn position(&self, market_id: &str, outcome: Outcome) -> Option<Position> {
        self.state
            .read()
            .positions
            .get(&BookKey::new(market_id, outcome))
            .cloned()
    }

    /// Fill log in delivery order
    pub fn fills(&self) -> Vec<Fill> {
        self.state.read().fills.clone()
    }

    pub fn total_realized_pnl(&self) -> Decimal {
        self.state
            .read()
            .positions
            .values()
            .map(|p| p.realized_pnl)
            .sum()
    }
}

impl std::fmt::Debug for PositionAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("PositionAggregator")
            .field("positions", &state.positions.len())
            .field("fills", &state.fills.len())
            .finish()
    }
}
