//! Order lifecycle tracker
//!
//! Tracks every locally placed order through
//! `PENDING_SUBMIT -> PENDING_ACK -> OPEN -> PARTIALLY_FILLED -> FILLED`
//! (or CANCELLED / REJECTED / EXPIRED), reconciling optimistic local state
//! with what the exchange reports. Events are applied in delivery order;
//! duplicates and events for unknown orders are absorbed, never fatal.

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::Utc;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use terminal_core::{
    Fill, FillKey, FillReport, LocalOrderId, Order, OrderSpec, OrderStatus, TerminalError,
    TerminalResult,
};
use tracing::{debug, info, warn};

use crate::notify::{ChangeNotifier, StoreEvent};

/// What happened to an incoming fill
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FillOutcome {
    /// Fill counted against the order; forward it to positions
    Applied(Fill),
    /// Same fill seen before; nothing changed
    Duplicate,
}

/// A cancel that should be sent to the exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelRequest {
    pub local_id: LocalOrderId,
    /// None while the order is not yet acknowledged; the cancel goes out on ack
    pub exchange_id: Option<String>,
}

#[derive(Debug, Default)]
struct TrackerState {
    orders: HashMap<LocalOrderId, Order>,
    /// Submission order, for stable listings
    submitted: Vec<LocalOrderId>,
    by_exchange_id: HashMap<String, LocalOrderId>,
    /// Book linkage: orders per subscribed market
    by_market: HashMap<String, BTreeSet<LocalOrderId>>,
    /// Fill keys of working orders, dropped once the order is terminal
    seen_fills: HashMap<String, HashSet<FillKey>>,
}

impl TrackerState {
    fn local_for_exchange(&self, exchange_id: &str) -> TerminalResult<LocalOrderId> {
        self.by_exchange_id
            .get(exchange_id)
            .cloned()
            .ok_or_else(|| TerminalError::unknown_order(format!("exchange id {}", exchange_id)))
    }

    fn order_mut(&mut self, local_id: &LocalOrderId) -> TerminalResult<&mut Order> {
        self.orders
            .get_mut(local_id)
            .ok_or_else(|| TerminalError::unknown_order(local_id.to_string()))
    }

    fn forget_fills(&mut self, exchange_id: Option<&str>) {
        if let Some(keys) = exchange_id.and_then(|id| self.seen_fills.remove(id)) {
            debug!("Dropped {} fill key(s) for {:?}", keys.len(), exchange_id);
        }
    }

    fn listed(&self, filter: impl Fn(&Order) -> bool) -> Vec<Order> {
        self.submitted
            .iter()
            .filter_map(|id| self.orders.get(id))
            .filter(|order| filter(order))
            .cloned()
            .collect()
    }
}

fn transition(order: &mut Order, status: OrderStatus) {
    debug!(
        "Order {}: {} -> {}",
        order.local_id, order.status, status
    );
    order.status = status;
    order.updated_at = Utc::now();
}

/// Tracker of all orders placed from this client
pub struct OrderLifecycleTracker {
    state: RwLock<TrackerState>,
    notifier: ChangeNotifier,
}

impl OrderLifecycleTracker {
    pub fn new(notifier: ChangeNotifier) -> Self {
        Self {
            state: RwLock::new(TrackerState::default()),
            notifier,
        }
    }

    fn publish(&self, order: &Order) {
        self.notifier.publish(StoreEvent::OrderUpdated {
            local_id: order.local_id.clone(),
            status: order.status,
        });
    }

    /// Record a new order optimistically and return its local id
    ///
    /// Invalid specs are refused synchronously and never tracked.
    pub fn submit(&self, spec: OrderSpec) -> TerminalResult<LocalOrderId> {
        spec.validate()?;

        let local_id = LocalOrderId::generate();
        let order = Order::from_spec(local_id.clone(), spec, Utc::now());
        info!(
            "Submitting {} {} {} {} x{} on {} ({})",
            order.side,
            order.outcome,
            order.order_type.as_str(),
            order.price.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string()),
            order.requested_size,
            order.market_id,
            local_id
        );

        {
            let mut state = self.state.write();
            state
                .by_market
                .entry(order.market_id.clone())
                .or_default()
                .insert(local_id.clone());
            state.submitted.push(local_id.clone());
            state.orders.insert(local_id.clone(), order.clone());
        }

        self.publish(&order);
        Ok(local_id)
    }

    /// The transport accepted the order: PENDING_SUBMIT -> PENDING_ACK
    pub fn mark_sent(&self, local_id: &LocalOrderId) -> TerminalResult<()> {
        let updated = {
            let mut state = self.state.write();
            let order = state.order_mut(local_id)?;
            if order.status != OrderStatus::PendingSubmit {
                debug!("Order {} already {}, not marking sent", local_id, order.status);
                return Ok(());
            }
            transition(order, OrderStatus::PendingAck);
            order.clone()
        };
        self.publish(&updated);
        Ok(())
    }

    /// Exchange accepted the order and assigned its id
    pub fn on_ack(&self, local_id: &LocalOrderId, exchange_id: &str) -> TerminalResult<Order> {
        let updated = {
            let mut state = self.state.write();
            let order = state.order_mut(local_id)?;

            if order.status.is_terminal() {
                return Err(TerminalError::unknown_order(format!(
                    "{} already resolved as {}",
                    local_id, order.status
                )));
            }
            if !order.status.is_pending() {
                if order.exchange_id.as_deref() != Some(exchange_id) {
                    warn!(
                        "Order {} acked again with different exchange id {} (have {:?})",
                        local_id, exchange_id, order.exchange_id
                    );
                } else {
                    debug!("Duplicate ack for order {}", local_id);
                }
                return Ok(order.clone());
            }

            order.exchange_id = Some(exchange_id.to_string());
            transition(order, OrderStatus::Open);
            let updated = order.clone();
            state
                .by_exchange_id
                .insert(exchange_id.to_string(), local_id.clone());
            updated
        };

        info!("Order {} acknowledged as {}", local_id, exchange_id);
        self.publish(&updated);
        Ok(updated)
    }

    /// Exchange refused the order; redelivery on a resolved order is a no-op
    pub fn on_reject(&self, local_id: &LocalOrderId, reason: &str) -> TerminalResult<()> {
        let updated = {
            let mut state = self.state.write();
            let order = state.order_mut(local_id)?;
            if order.status.is_terminal() {
                debug!("Ignoring reject for resolved order {} ({})", local_id, order.status);
                return Ok(());
            }
            order.reject_reason = Some(reason.to_string());
            transition(order, OrderStatus::Rejected);
            let updated = order.clone();
            state.forget_fills(updated.exchange_id.as_deref());
            updated
        };

        warn!("Order {} rejected: {}", local_id, reason);
        self.publish(&updated);
        Ok(())
    }

    /// Apply an execution report, de-duplicated by (exchange id, timestamp, price, size)
    pub fn on_fill(&self, exchange_id: &str, report: FillReport) -> TerminalResult<FillOutcome> {
        if report.size <= Decimal::ZERO || report.price <= Decimal::ZERO {
            return Err(TerminalError::invalid_level(format!(
                "fill {}@{} on {} is not positive",
                report.size, report.price, exchange_id
            )));
        }
        if report.price > Decimal::ONE {
            return Err(TerminalError::invalid_level(format!(
                "fill price {} on {} exceeds 1",
                report.price, exchange_id
            )));
        }

        let (updated, fill) = {
            let mut state = self.state.write();
            let local_id = state.local_for_exchange(exchange_id)?;
            let fill_key = FillKey::new(exchange_id, &report);
            if state
                .seen_fills
                .get(exchange_id)
                .is_some_and(|keys| keys.contains(&fill_key))
            {
                debug!("Duplicate fill {}@{} on {}", report.size, report.price, exchange_id);
                return Ok(FillOutcome::Duplicate);
            }

            let order = state.order_mut(&local_id)?;
            if order.status.is_terminal() {
                return Err(TerminalError::unknown_order(format!(
                    "fill on {} which is already {}",
                    local_id, order.status
                )));
            }
            let remaining = order.remaining_size();
            if report.size > remaining {
                return Err(TerminalError::Overfill {
                    local_id: local_id.to_string(),
                    size: report.size,
                    remaining,
                });
            }

            let notional = order
                .avg_fill_price
                .unwrap_or_default()
                .checked_mul(order.filled_size)
                .zip(report.price.checked_mul(report.size))
                .and_then(|(before, fill)| before.checked_add(fill))
                .ok_or_else(|| {
                    TerminalError::invalid_level(format!(
                        "fill {}@{} on {} overflows the order notional",
                        report.size, report.price, exchange_id
                    ))
                })?;
            order.filled_size += report.size;
            order.avg_fill_price = Some(notional / order.filled_size);
            let status = if order.filled_size == order.requested_size {
                OrderStatus::Filled
            } else {
                OrderStatus::PartiallyFilled
            };
            transition(order, status);

            let fill = Fill {
                order_local_id: local_id,
                market_id: order.market_id.clone(),
                outcome: order.outcome,
                side: order.side,
                price: report.price,
                size: report.size,
                timestamp: report.timestamp,
            };
            let updated = order.clone();
            if status.is_terminal() {
                state.forget_fills(Some(exchange_id));
            } else {
                state
                    .seen_fills
                    .entry(exchange_id.to_string())
                    .or_default()
                    .insert(fill_key);
            }
            (updated, fill)
        };

        info!(
            "Order {} filled {}@{} ({}/{})",
            updated.local_id, fill.size, fill.price, updated.filled_size, updated.requested_size
        );
        self.publish(&updated);
        Ok(FillOutcome::Applied(fill))
    }

    /// Ask for cancellation; the order stays live until the exchange confirms
    pub fn cancel(&self, local_id: &LocalOrderId) -> TerminalResult<CancelRequest> {
        let updated = {
            let mut state = self.state.write();
            let order = state.order_mut(local_id)?;
            if order.status.is_terminal() {
                return Err(TerminalError::unknown_order(format!(
                    "{} already resolved as {}",
                    local_id, order.status
                )));
            }
            order.cancel_requested = true;
            order.updated_at = Utc::now();
            order.clone()
        };

        info!("Cancel requested for order {}", local_id);
        self.publish(&updated);
        Ok(CancelRequest {
            local_id: local_id.clone(),
            exchange_id: updated.exchange_id,
        })
    }

    /// Exchange confirmed the cancel
    pub fn on_cancel_ack(&self, exchange_id: &str) -> TerminalResult<()> {
        self.resolve(exchange_id, OrderStatus::Cancelled)
    }

    /// Order expired on the exchange
    pub fn on_expire(&self, exchange_id: &str) -> TerminalResult<()> {
        self.resolve(exchange_id, OrderStatus::Expired)
    }

    fn resolve(&self, exchange_id: &str, status: OrderStatus) -> TerminalResult<()> {
        let updated = {
            let mut state = self.state.write();
            let local_id = state.local_for_exchange(exchange_id)?;
            let order = state.order_mut(&local_id)?;
            if order.status.is_terminal() {
                debug!(
                    "Ignoring {} for order {} already {}",
                    status, local_id, order.status
                );
                return Ok(());
            }
            order.cancel_requested = false;
            transition(order, status);
            let updated = order.clone();
            state.forget_fills(Some(exchange_id));
            updated
        };

        info!("Order {} is {}", updated.local_id, status);
        self.publish(&updated);
        Ok(())
    }

    /// Exchange refused the cancel; the order keeps working
    pub fn on_cancel_reject(&self, exchange_id: &str, reason: &str) -> TerminalResult<()> {
        let updated = {
            let mut state = self.state.write();
            let local_id = state.local_for_exchange(exchange_id)?;
            let order = state.order_mut(&local_id)?;
            if order.status.is_terminal() || !order.cancel_requested {
                return Ok(());
            }
            order.cancel_requested = false;
            order.updated_at = Utc::now();
            order.clone()
        };

        warn!("Cancel for order {} rejected: {}", updated.local_id, reason);
        self.publish(&updated);
        Ok(())
    }

    /// Drop the market linkage of its orders on unsubscribe
    ///
    /// The orders themselves stay available through `get` and `history`.
    pub fn release_market(&self, market_id: &str) -> usize {
        let released = self
            .state
            .write()
            .by_market
            .remove(market_id)
            .map(|ids| ids.len())
            .unwrap_or(0);
        if released > 0 {
            debug!("Released {} order(s) linked to market {}", released, market_id);
        }
        released
    }

    // ------------------------------------------------------------------------
    // Read access
    // ------------------------------------------------------------------------

    pub fn get(&self, local_id: &LocalOrderId) -> Option<Order> {
        self.state.read().orders.get(local_id).cloned()
    }

    pub fn find_by_exchange_id(&self, exchange_id: &str) -> Option<Order> {
        let state = self.state.read();
        state
            .by_exchange_id
            .get(exchange_id)
            .and_then(|id| state.orders.get(id))
            .cloned()
    }

    /// Orders not yet in a terminal state, in submission order
    pub fn active_orders(&self) -> Vec<Order> {
        self.state.read().listed(|order| !order.status.is_terminal())
    }

    /// Orders in a terminal state, in submission order
    pub fn history(&self) -> Vec<Order> {
        self.state.read().listed(|order| order.status.is_terminal())
    }

    /// Orders still waiting for an exchange acknowledgement
    pub fn pending_orders(&self) -> Vec<Order> {
        self.state.read().listed(|order| order.status.is_pending())
    }

    /// Orders linked to a subscribed market
    pub fn orders_for_market(&self, market_id: &str) -> Vec<Order> {
        let state = self.state.read();
        let Some(ids) = state.by_market.get(market_id) else {
            return Vec::new();
        };
        state
            .submitted
            .iter()
            .filter(|id| ids.contains(*id))
            .filter_map(|id| state.orders.get(id))
            .cloned()
            .collect()
    }

    pub fn open_order_count(&self) -> usize {
        self.state
            .read()
            .orders
            .values()
            .filter(|order| !order.status.is_terminal())
            .count()
    }
}

impl std::fmt::Debug for OrderLifecycleTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("OrderLifecycleTracker")
            .field("orders", &state.orders.len())
            .field(
                "fills",
                &state.seen_fills.values().map(HashSet::len).sum::<usize>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone};
    use rust_decimal_macros::dec;
    use terminal_core::{OrderSide, Outcome};

    fn tracker() -> OrderLifecycleTracker {
        OrderLifecycleTracker::new(ChangeNotifier::new(64))
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn report(price: Decimal, size: Decimal, secs: i64) -> FillReport {
        FillReport {
            price,
            size,
            timestamp: at(secs),
        }
    }

    fn acked_buy(tracker: &OrderLifecycleTracker, size: Decimal) -> LocalOrderId {
        let id = tracker
            .submit(OrderSpec::limit("m1", Outcome::Yes, OrderSide::Buy, dec!(0.50), size))
            .unwrap();
        tracker.mark_sent(&id).unwrap();
        tracker.on_ack(&id, "ex-1").unwrap();
        id
    }

    #[test]
    fn test_partial_then_duplicate_then_full() {
        let tracker = tracker();
        let id = tracker
            .submit(OrderSpec::limit("m1", Outcome::Yes, OrderSide::Buy, dec!(0.50), dec!(100)))
            .unwrap();
        assert_eq!(tracker.get(&id).unwrap().status, OrderStatus::PendingSubmit);

        let acked = tracker.on_ack(&id, "ex-1").unwrap();
        assert_eq!(acked.status, OrderStatus::Open);
        assert_eq!(acked.exchange_id.as_deref(), Some("ex-1"));

        let first = tracker.on_fill("ex-1", report(dec!(0.50), dec!(50), 1)).unwrap();
        assert!(matches!(first, FillOutcome::Applied(_)));
        let order = tracker.get(&id).unwrap();
        assert_eq!(order.status, OrderStatus::PartiallyFilled);
        assert_eq!(order.filled_size, dec!(50));

        let again = tracker.on_fill("ex-1", report(dec!(0.50), dec!(50), 1)).unwrap();
        assert_eq!(again, FillOutcome::Duplicate);
        assert_eq!(tracker.get(&id).unwrap().filled_size, dec!(50));

        tracker.on_fill("ex-1", report(dec!(0.50), dec!(50), 2)).unwrap();
        let order = tracker.get(&id).unwrap();
        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.filled_size, dec!(100));
        assert_eq!(order.avg_fill_price, Some(dec!(0.50)));
        assert_eq!(tracker.history().len(), 1);
        assert!(tracker.active_orders().is_empty());
    }

    #[test]
    fn test_invalid_spec_not_tracked() {
        let tracker = tracker();
        let err = tracker
            .submit(OrderSpec::limit("m1", Outcome::Yes, OrderSide::Buy, dec!(1.5), dec!(1)))
            .unwrap_err();
        assert!(matches!(err, TerminalError::InvalidOrderSpec(_)));
        assert!(tracker.active_orders().is_empty());
    }

    #[test]
    fn test_ack_for_unknown_or_resolved_order() {
        let tracker = tracker();
        let err = tracker
            .on_ack(&LocalOrderId::from("nope"), "ex-9")
            .unwrap_err();
        assert!(matches!(err, TerminalError::UnknownOrder(_)));

        let id = tracker
            .submit(OrderSpec::market("m1", Outcome::No, OrderSide::Buy, dec!(5)))
            .unwrap();
        tracker.on_reject(&id, "insufficient balance").unwrap();
        let err = tracker.on_ack(&id, "ex-9").unwrap_err();
        assert!(matches!(err, TerminalError::UnknownOrder(_)));
    }

    #[test]
    fn test_reject_is_idempotent() {
        let tracker = tracker();
        let id = tracker
            .submit(OrderSpec::limit("m1", Outcome::Yes, OrderSide::Sell, dec!(0.7), dec!(5)))
            .unwrap();
        tracker.mark_sent(&id).unwrap();
        tracker.on_reject(&id, "market closed").unwrap();
        tracker.on_reject(&id, "market closed").unwrap();

        let order = tracker.get(&id).unwrap();
        assert_eq!(order.status, OrderStatus::Rejected);
        assert_eq!(order.reject_reason.as_deref(), Some("market closed"));
    }

    #[test]
    fn test_cancel_waits_for_confirmation_and_races_fill() {
        let tracker = tracker();
        let id = acked_buy(&tracker, dec!(100));

        let request = tracker.cancel(&id).unwrap();
        assert_eq!(request.exchange_id.as_deref(), Some("ex-1"));
        let order = tracker.get(&id).unwrap();
        assert_eq!(order.status, OrderStatus::Open);
        assert!(order.cancel_requested);

        // A fill that raced the cancel still counts
        tracker.on_fill("ex-1", report(dec!(0.50), dec!(30), 1)).unwrap();
        assert_eq!(tracker.get(&id).unwrap().status, OrderStatus::PartiallyFilled);

        tracker.on_cancel_ack("ex-1").unwrap();
        let order = tracker.get(&id).unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_eq!(order.filled_size, dec!(30));
        assert!(!order.cancel_requested);

        // Redelivered confirmation is absorbed
        tracker.on_cancel_ack("ex-1").unwrap();
        assert!(tracker.cancel(&id).is_err());
    }

    #[test]
    fn test_cancel_before_ack_has_no_exchange_id() {
        let tracker = tracker();
        let id = tracker
            .submit(OrderSpec::limit("m1", Outcome::Yes, OrderSide::Buy, dec!(0.4), dec!(1)))
            .unwrap();
        let request = tracker.cancel(&id).unwrap();
        assert_eq!(request.exchange_id, None);

        let acked = tracker.on_ack(&id, "ex-2").unwrap();
        assert!(acked.cancel_requested);
    }

    #[test]
    fn test_cancel_reject_keeps_order_working() {
        let tracker = tracker();
        let id = acked_buy(&tracker, dec!(10));
        tracker.cancel(&id).unwrap();
        tracker.on_cancel_reject("ex-1", "too late").unwrap();

        let order = tracker.get(&id).unwrap();
        assert_eq!(order.status, OrderStatus::Open);
        assert!(!order.cancel_requested);
    }

    #[test]
    fn test_overfill_rejected() {
        let tracker = tracker();
        let id = acked_buy(&tracker, dec!(10));
        let err = tracker
            .on_fill("ex-1", report(dec!(0.50), dec!(11), 1))
            .unwrap_err();
        assert!(matches!(err, TerminalError::Overfill { .. }));
        assert_eq!(tracker.get(&id).unwrap().filled_size, Decimal::ZERO);
    }

    #[test]
    fn test_fill_price_above_one_rejected() {
        let tracker = tracker();
        let id = acked_buy(&tracker, dec!(10));
        let err = tracker
            .on_fill("ex-1", report(dec!(1.5), dec!(1), 1))
            .unwrap_err();
        assert!(matches!(err, TerminalError::InvalidLevel(_)));

        let huge = Decimal::MAX / dec!(2);
        let err = tracker.on_fill("ex-1", report(huge, dec!(10), 2)).unwrap_err();
        assert!(matches!(err, TerminalError::InvalidLevel(_)));

        let order = tracker.get(&id).unwrap();
        assert_eq!(order.filled_size, Decimal::ZERO);
        assert_eq!(order.status, OrderStatus::Open);
    }

    #[test]
    fn test_fill_keys_dropped_once_terminal() {
        let tracker = tracker();
        let id = acked_buy(&tracker, dec!(100));
        tracker.on_fill("ex-1", report(dec!(0.50), dec!(40), 1)).unwrap();
        assert_eq!(tracker.state.read().seen_fills["ex-1"].len(), 1);

        tracker.on_fill("ex-1", report(dec!(0.50), dec!(60), 2)).unwrap();
        assert_eq!(tracker.get(&id).unwrap().status, OrderStatus::Filled);
        assert!(tracker.state.read().seen_fills.is_empty());

        // Redelivery after the order resolved is still absorbed
        let err = tracker
            .on_fill("ex-1", report(dec!(0.50), dec!(40), 1))
            .unwrap_err();
        assert!(matches!(err, TerminalError::UnknownOrder(_)));
        assert_eq!(tracker.get(&id).unwrap().filled_size, dec!(100));

        let other = tracker
            .submit(OrderSpec::limit("m1", Outcome::No, OrderSide::Buy, dec!(0.30), dec!(10)))
            .unwrap();
        tracker.on_ack(&other, "ex-2").unwrap();
        tracker.on_fill("ex-2", report(dec!(0.30), dec!(5), 3)).unwrap();
        tracker.on_cancel_ack("ex-2").unwrap();
        assert!(tracker.state.read().seen_fills.is_empty());
    }

    #[test]
    fn test_fill_for_unknown_exchange_id() {
        let tracker = tracker();
        let err = tracker
            .on_fill("ghost", report(dec!(0.50), dec!(1), 1))
            .unwrap_err();
        assert!(matches!(err, TerminalError::UnknownOrder(_)));
    }

    #[test]
    fn test_expire_moves_to_history() {
        let tracker = tracker();
        let id = acked_buy(&tracker, dec!(10));
        tracker.on_expire("ex-1").unwrap();
        assert_eq!(tracker.get(&id).unwrap().status, OrderStatus::Expired);
        assert_eq!(tracker.find_by_exchange_id("ex-1").unwrap().local_id, id);
    }

    #[test]
    fn test_average_fill_price() {
        let tracker = tracker();
        let id = acked_buy(&tracker, dec!(100));
        tracker.on_fill("ex-1", report(dec!(0.40), dec!(25), 1)).unwrap();
        tracker.on_fill("ex-1", report(dec!(0.50), dec!(75), 2)).unwrap();
        assert_eq!(tracker.get(&id).unwrap().avg_fill_price, Some(dec!(0.475)));
    }

    #[test]
    fn test_release_market_keeps_history() {
        let tracker = tracker();
        let id = acked_buy(&tracker, dec!(10));
        assert_eq!(tracker.orders_for_market("m1").len(), 1);

        assert_eq!(tracker.release_market("m1"), 1);
        assert!(tracker.orders_for_market("m1").is_empty());
        assert!(tracker.get(&id).is_some());
        assert_eq!(tracker.open_order_count(), 1);
    }

    #[test]
    fn test_pending_orders_listing() {
        let tracker = tracker();
        let a = tracker
            .submit(OrderSpec::market("m1", Outcome::Yes, OrderSide::Buy, dec!(1)))
            .unwrap();
        let b = tracker
            .submit(OrderSpec::market("m2", Outcome::No, OrderSide::Sell, dec!(2)))
            .unwrap();
        tracker.mark_sent(&b).unwrap();

        let pending: Vec<LocalOrderId> =
            tracker.pending_orders().into_iter().map(|o| o.local_id).collect();
        assert_eq!(pending, vec![a.clone(), b]);

        tracker.on_ack(&a, "ex-a").unwrap();
        assert_eq!(tracker.pending_orders().len(), 1);
    }
}
