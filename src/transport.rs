// agora_core/src/transport.rs
//
// Transport (C7): connects agents to the matching engine asynchronously,
// via per-batch exponentially-delayed FIFOs.
//
// Grounded on `original_source/src/agents.h`'s `PassThroughTransport`
// almost line for line: `add_agent`'s duplicate-client-id rejection,
// `update_next_send_time`, `next_send_time`, `send`, and the "cannot
// find client id" fatal routing path. Uses `rand`/`rand_distr` for the
// exponential per-batch delay draw (ambient-stack choice shared with
// the reference agents in `agents/`).

use std::collections::{HashMap, VecDeque};

use rand::Rng;

use crate::agent::{Agent, OrderMessage};
use crate::engine::MatchingEngine;
use crate::error::{SimError, SimResult};
use crate::notifier::{AgentDispatch, EventKind, Notifier};
use crate::order::Order;
use crate::types::{ClientId, LocalOrderId, OrderId, Price, Side, Size, Time};
use crate::util::exp_delay_ns;

/// A placement in flight between an agent's `place` call and its
/// delivery to the engine.
#[derive(Debug, Clone, Copy)]
pub struct PlacementPayload {
    pub client_id: ClientId,
    pub local_id: LocalOrderId,
    pub price: Price,
    pub total_size: Size,
    pub show: Size,
    pub side: Side,
    pub is_shadow: bool,
}

struct PendingPlace {
    submit_time: Time,
    payload: PlacementPayload,
}

struct PendingCancel {
    submit_time: Time,
    order_id: OrderId,
}

pub struct Transport {
    current_time: Time,
    delay: Time,
    lambda: f64,
    pending_place: VecDeque<PendingPlace>,
    pending_cancel: VecDeque<PendingCancel>,
    agents: Vec<Box<dyn Agent>>,
    /// Per-(client_id, price) placement counter, diagnostics only.
    placement_counts: HashMap<(ClientId, Price), u64>,
}

impl Transport {
    pub fn new(lambda: f64) -> Self {
        Self {
            current_time: 0,
            delay: 0,
            lambda,
            pending_place: VecDeque::new(),
            pending_cancel: VecDeque::new(),
            agents: Vec::new(),
            placement_counts: HashMap::new(),
        }
    }

    pub fn set_time(&mut self, now: Time) {
        self.current_time = now;
    }

    pub fn register(&mut self, agent: Box<dyn Agent>) -> SimResult<()> {
        if self.agents.iter().any(|a| a.client_id() == agent.client_id()) {
            return Err(SimError::DuplicateAgent { client_id: agent.client_id() });
        }
        self.agents.push(agent);
        Ok(())
    }

    pub fn agents_mut(&mut self) -> &mut [Box<dyn Agent>] {
        &mut self.agents
    }

    /// Move the agent registry out so the driver can call back into each
    /// agent with `&mut self` free of the registry it would otherwise be
    /// borrowed from, then hand it back with `return_agents`. Mirrors the
    /// disjoint-borrow trick `TransportDispatch` already uses inside
    /// `deliver`, at the coarser granularity the outer simulation loop
    /// needs.
    pub fn take_agents(&mut self) -> Vec<Box<dyn Agent>> {
        std::mem::take(&mut self.agents)
    }

    pub fn return_agents(&mut self, agents: Vec<Box<dyn Agent>>) {
        self.agents = agents;
    }

    pub fn place(&mut self, payload: PlacementPayload) {
        *self.placement_counts.entry((payload.client_id, payload.price)).or_insert(0) += 1;
        self.pending_place.push_back(PendingPlace { submit_time: self.current_time, payload });
    }

    pub fn cancel(&mut self, order_id: OrderId) {
        self.pending_cancel.push_back(PendingCancel { submit_time: self.current_time, order_id });
    }

    pub fn placement_count(&self, client_id: ClientId, price: Price) -> u64 {
        self.placement_counts.get(&(client_id, price)).copied().unwrap_or(0)
    }

    /// Draw a fresh per-batch delay. Called once per outer simulation
    /// tick, before `next_send_time`.
    pub fn refresh_delay<R: Rng>(&mut self, rng: &mut R) {
        self.delay = exp_delay_ns(self.lambda, rng);
    }

    /// `min(head(place).t + delay, head(cancel).t + delay, +inf)`.
    pub fn next_send_time(&self) -> Time {
        let place_t = self.pending_place.front().map(|p| p.submit_time + self.delay);
        let cancel_t = self.pending_cancel.front().map(|p| p.submit_time + self.delay);
        match (place_t, cancel_t) {
            (Some(a), Some(b)) => a.min(b),
            (Some(a), None) => a,
            (None, Some(b)) => b,
            (None, None) => Time::MAX,
        }
    }

    /// Drain both FIFOs from the front while `head.t + delay <= now`,
    /// dispatching each to the engine and routing the resulting
    /// notifications back to the owning agent. Returns the first fatal
    /// routing error encountered, if any — the caller must treat that as
    /// terminal (an `AgentProtocolViolation`/`UnroutableNotification`
    /// means the simulation's invariants no longer hold).
    pub fn deliver(&mut self, now: Time, engine: &mut MatchingEngine, inner: &mut dyn Notifier) -> SimResult<()> {
        loop {
            let place_due = self.pending_place.front().is_some_and(|p| p.submit_time + self.delay <= now);
            let cancel_due = self.pending_cancel.front().is_some_and(|p| p.submit_time + self.delay <= now);
            if !place_due && !cancel_due {
                break;
            }
            // Same-timestamp ties: a place issued before a cancel at the
            // same delivery time is dispatched first (§5).
            if place_due {
                let pending = self.pending_place.pop_front().unwrap();
                let p = pending.payload;
                let mut dispatch = TransportDispatch { agents: &mut self.agents };
                let mut notifier = crate::notifier::AgentDispatchNotifier::new(&mut dispatch, inner);
                engine.add(p.client_id, p.local_id, p.price, p.total_size, p.show, p.side, p.is_shadow, &mut notifier)?;
                if let Some(e) = notifier.routing_error.take() {
                    return Err(e);
                }
            } else {
                let pending = self.pending_cancel.pop_front().unwrap();
                let mut dispatch = TransportDispatch { agents: &mut self.agents };
                let mut notifier = crate::notifier::AgentDispatchNotifier::new(&mut dispatch, inner);
                engine.cancel(pending.order_id, &mut notifier);
                if let Some(e) = notifier.routing_error.take() {
                    return Err(e);
                }
            }
        }
        Ok(())
    }
}

/// Borrows just the agent registry out of `Transport` so `deliver` can
/// still hold `&mut self.pending_place`/`&mut self.pending_cancel`
/// disjointly while routing notifications through the agent list.
struct TransportDispatch<'a> {
    agents: &'a mut Vec<Box<dyn Agent>>,
}

impl<'a> AgentDispatch for TransportDispatch<'a> {
    fn route(&mut self, kind: EventKind, order: &Order, now: Time, trade_size: i32, trade_price: Price) -> SimResult<()> {
        let agent = self
            .agents
            .iter_mut()
            .find(|a| a.client_id() == order.client_id)
            .ok_or(SimError::UnroutableNotification { client_id: order.client_id })?;
        agent.on_own_order_message(OrderMessage {
            kind,
            order_id: order.order_id,
            local_id: order.local_id,
            client_id: order.client_id,
            price: order.price,
            side: order.side,
            shown_size: order.shown_size,
            remaining_size: order.remaining_size,
            trade_size,
            trade_price,
            now,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::MarketSnapshot;
    use crate::notifier::NoOpNotifier;

    struct RecordingAgent {
        cid: ClientId,
        received: Vec<EventKind>,
    }

    impl Agent for RecordingAgent {
        fn client_id(&self) -> ClientId {
            self.cid
        }
        fn next_action_time(&self) -> Time {
            Time::MAX
        }
        fn on_market_state_changed(&mut self, _market: &MarketSnapshot, _transport: &mut Transport) {}
        fn on_own_order_message(&mut self, msg: OrderMessage) {
            self.received.push(msg.kind);
        }
    }

    #[test]
    fn test_register_rejects_duplicate_client_id() {
        let mut t = Transport::new(0.0);
        t.register(Box::new(RecordingAgent { cid: 1, received: vec![] })).unwrap();
        assert!(t.register(Box::new(RecordingAgent { cid: 1, received: vec![] })).is_err());
    }

    #[test]
    fn test_next_send_time_is_infinite_when_empty() {
        let t = Transport::new(0.0);
        assert_eq!(t.next_send_time(), Time::MAX);
    }

    #[test]
    fn test_degenerate_zero_delay_delivers_immediately() {
        let mut t = Transport::new(0.0);
        t.set_time(0);
        t.place(PlacementPayload { client_id: 1, local_id: 0, price: 100, total_size: 10, show: 10, side: Side::Bid, is_shadow: false });
        let mut rng = rand::thread_rng();
        t.refresh_delay(&mut rng);
        assert_eq!(t.next_send_time(), 0);
    }

    #[test]
    fn test_deliver_routes_ack_to_owning_agent() {
        let mut t = Transport::new(0.0);
        t.register(Box::new(RecordingAgent { cid: 1, received: vec![] })).unwrap();
        t.set_time(0);
        t.place(PlacementPayload { client_id: 1, local_id: 0, price: 100, total_size: 10, show: 10, side: Side::Bid, is_shadow: false });
        let mut rng = rand::thread_rng();
        t.refresh_delay(&mut rng);
        let mut engine = MatchingEngine::new().unwrap();
        let mut notifier = NoOpNotifier;
        t.deliver(0, &mut engine, &mut notifier).unwrap();
        assert_eq!(engine.order_count(), 1);
    }

    #[test]
    fn test_deliver_errors_when_no_agent_registered() {
        let mut t = Transport::new(0.0);
        t.set_time(0);
        t.place(PlacementPayload { client_id: 42, local_id: 0, price: 100, total_size: 10, show: 10, side: Side::Bid, is_shadow: false });
        let mut rng = rand::thread_rng();
        t.refresh_delay(&mut rng);
        let mut engine = MatchingEngine::new().unwrap();
        let mut notifier = NoOpNotifier;
        assert!(t.deliver(0, &mut engine, &mut notifier).is_err());
    }
}
