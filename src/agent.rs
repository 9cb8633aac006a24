// agora_core/src/agent.rs
//
// Agent trait and the per-agent order-tracking state machine (§4.6).
//
// Grounded on `original_source/src/agents.h`'s `Agent<AgentSpecifics>`
// (CRTP becomes a plain trait per SPEC_FULL.md §9) and its
// `handle_own_order_message` method, which this crate splits into a
// reusable `AgentOrderState` helper (the unacked/acked bookkeeping) plus
// the trait method `on_own_order_message` that a concrete agent uses to
// drive its own policy off the bookkeeping outcome.

use std::collections::HashMap;

use crate::error::{SimError, SimResult};
use crate::notifier::{EventKind, LevelView};
use crate::transport::Transport;
use crate::types::{ClientId, LocalOrderId, OrderId, Price, Side, Size, Time};

/// A read-only view of the top of book and the weighted mid, handed to
/// every agent once per simulation tick. Grounded on spec §3's
/// `MarketSnapshot` description.
#[derive(Debug, Clone)]
pub struct MarketSnapshot {
    pub time: Time,
    pub weighted_mid: f64,
    pub bids: Vec<LevelView>,
    pub asks: Vec<LevelView>,
}

impl MarketSnapshot {
    pub fn best_bid(&self) -> Option<&LevelView> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&LevelView> {
        self.asks.first()
    }
}

/// One order lifecycle notification, addressed to the agent that placed
/// the order. Carries everything `AgentOrderState::handle` needs plus
/// the raw event for a concrete agent's own policy logic.
#[derive(Debug, Clone, Copy)]
pub struct OrderMessage {
    pub kind: EventKind,
    pub order_id: OrderId,
    pub local_id: LocalOrderId,
    pub client_id: ClientId,
    pub price: Price,
    pub side: Side,
    pub shown_size: Size,
    pub remaining_size: Size,
    pub trade_size: i32,
    pub trade_price: Price,
    pub now: Time,
}

pub trait Agent {
    fn client_id(&self) -> ClientId;

    /// Time of this agent's next self-scheduled action (a placement or a
    /// cancellation it set up earlier). `Time::MAX` means "nothing
    /// scheduled."
    fn next_action_time(&self) -> Time;

    /// Called once per tick after the clock has advanced to `market.time`;
    /// may enqueue placements/cancels into `transport`.
    fn on_market_state_changed(&mut self, market: &MarketSnapshot, transport: &mut Transport);

    /// Called whenever an order this agent owns receives a lifecycle
    /// notification. Pure bookkeeping plus policy reaction; must not
    /// block and should be cheap, since it can re-enter during
    /// `transport.deliver`.
    fn on_own_order_message(&mut self, msg: OrderMessage);
}

#[derive(Debug, Clone, Copy)]
struct UnackedOrder {
    price: Price,
    side: Side,
}

#[derive(Debug, Clone, Copy)]
struct AckedOrder {
    local_id: LocalOrderId,
    price: Price,
    side: Side,
    remaining_size: Size,
    waiting_to_be_cancelled: bool,
}

/// The outcome of feeding one `OrderMessage` through the state machine,
/// for a concrete agent's policy code to react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentEvent {
    /// A genuinely new order was acknowledged.
    Acked,
    /// A repeat `Ack` for an already-`acked` id: a hidden replenishment,
    /// not a new order.
    HiddenReplenishment,
    Traded,
    Cancelled,
    /// `End` with `remaining_size == 0`: the order is fully gone.
    Ended,
    /// `End` with `remaining_size > 0`: a visible-quantity exhaustion;
    /// a hidden replenishment's `Ack` will follow.
    EndedPendingReplenish,
}

/// Tracks an agent's own in-flight and resting orders, keyed first by
/// the agent's own `local_id` (before the engine has assigned an
/// `OrderId`) and then by `OrderId` once acknowledged. Grounded on
/// `original_source/src/agents.h`'s `unacked_`/`acked_` maps.
#[derive(Debug, Default)]
pub struct AgentOrderState {
    unacked: HashMap<LocalOrderId, UnackedOrder>,
    acked: HashMap<OrderId, AckedOrder>,
}

impl AgentOrderState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a placement the agent just sent to transport, before any
    /// `Ack` has arrived.
    pub fn record_placed(&mut self, local_id: LocalOrderId, price: Price, side: Side) {
        self.unacked.insert(local_id, UnackedOrder { price, side });
    }

    /// Mark a resting (already-acked) order as pending cancellation,
    /// required before a `Cancel` notification for it will be accepted.
    pub fn request_cancel(&mut self, order_id: OrderId) -> SimResult<()> {
        let entry = self
            .acked
            .get_mut(&order_id)
            .ok_or_else(|| SimError::AgentProtocolViolation(format!("cancel requested for unknown acked order {order_id}")))?;
        entry.waiting_to_be_cancelled = true;
        Ok(())
    }

    pub fn is_acked(&self, order_id: &OrderId) -> bool {
        self.acked.contains_key(order_id)
    }

    pub fn resting_order_ids(&self) -> impl Iterator<Item = &OrderId> {
        self.acked.keys()
    }

    pub fn resting_local_id(&self, order_id: &OrderId) -> Option<LocalOrderId> {
        self.acked.get(order_id).map(|e| e.local_id)
    }

    pub fn resting_side_and_price(&self, order_id: &OrderId) -> Option<(Side, Price)> {
        self.acked.get(order_id).map(|e| (e.side, e.price))
    }

    /// Count of orders this agent has sent but not yet heard a terminal
    /// `End` for, whether still unacked or already resting. Used by
    /// policies that cap how many orders they keep outstanding at once.
    pub fn outstanding_count(&self) -> usize {
        self.unacked.len() + self.acked.len()
    }

    /// Whether an unacked (in-flight) order sits at this price/side.
    pub fn has_unacked_at(&self, price: Price, side: Side) -> bool {
        self.unacked.values().any(|u| u.price == price && u.side == side)
    }

    /// Whether a resting (acked) order sits at this price/side.
    pub fn has_resting_at(&self, price: Price, side: Side) -> bool {
        self.acked.values().any(|a| a.price == price && a.side == side)
    }

    /// Feed one notification through the §4.6 state machine.
    pub fn handle(&mut self, msg: &OrderMessage) -> SimResult<AgentEvent> {
        match msg.kind {
            EventKind::Ack => {
                if let Some(unacked) = self.unacked.remove(&msg.local_id) {
                    self.acked.insert(
                        msg.order_id,
                        AckedOrder {
                            local_id: msg.local_id,
                            price: unacked.price,
                            side: unacked.side,
                            remaining_size: msg.remaining_size,
                            waiting_to_be_cancelled: false,
                        },
                    );
                    Ok(AgentEvent::Acked)
                } else if self.acked.contains_key(&msg.order_id) {
                    Ok(AgentEvent::HiddenReplenishment)
                } else {
                    Err(SimError::AgentProtocolViolation(format!(
                        "Ack for unknown local_id={} order_id={}",
                        msg.local_id, msg.order_id
                    )))
                }
            }
            EventKind::Trade => {
                let entry = self
                    .acked
                    .get_mut(&msg.order_id)
                    .ok_or_else(|| SimError::AgentProtocolViolation(format!("Trade for unknown order_id={}", msg.order_id)))?;
                entry.remaining_size -= msg.trade_size.unsigned_abs() as Size;
                Ok(AgentEvent::Traded)
            }
            EventKind::Cancel => {
                let entry = self
                    .acked
                    .get_mut(&msg.order_id)
                    .ok_or_else(|| SimError::AgentProtocolViolation(format!("Cancel for unknown order_id={}", msg.order_id)))?;
                if !entry.waiting_to_be_cancelled {
                    return Err(SimError::AgentProtocolViolation(format!(
                        "unsolicited Cancel for order_id={}",
                        msg.order_id
                    )));
                }
                entry.remaining_size = 0;
                Ok(AgentEvent::Cancelled)
            }
            EventKind::End => {
                let entry = self
                    .acked
                    .get_mut(&msg.order_id)
                    .ok_or_else(|| SimError::AgentProtocolViolation(format!("End for unknown order_id={}", msg.order_id)))?;
                // Trust this agent's own accumulated remaining_size (zeroed by
                // Cancel, decremented by Trade), not the message's: a cancelled
                // order's End still carries the engine's pre-cancel remaining_size.
                if entry.remaining_size == 0 {
                    self.acked.remove(&msg.order_id);
                    Ok(AgentEvent::Ended)
                } else {
                    Ok(AgentEvent::EndedPendingReplenish)
                }
            }
        }
    }
}
