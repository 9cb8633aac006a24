// agora_core/src/agents/price_maker.rs
//
// Price-maker reference agent (C13): places orders around the current
// weighted mid at exponential intervals and cancels them after an
// independent exponential hold time. Grounded line-for-line on
// `original_source/src/agents.h`'s `PriceMakerAroundWM`: the
// passive-side/aggressive-flip coin flips, the `order_price_`
// exponential offset from `wm`, the ceil-for-offer/floor-for-bid
// rounding with an epsilon pushed away from `wm` itself, and the
// ordered `cancellation_times_` container (here a `BTreeMap` paired
// with a reverse `HashMap`, since Rust has no `boost::multi_index`).

use std::collections::{BTreeMap, HashMap};

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Bernoulli, Distribution, Exp, Poisson};

use crate::agent::{Agent, AgentEvent, AgentOrderState, MarketSnapshot, OrderMessage};
use crate::notifier::EventKind;
use crate::transport::{PlacementPayload, Transport};
use crate::types::{ClientId, LocalOrderId, OrderId, Price, Side, Size, Time};
use crate::util::{exp_delay_ns, safe_round_price};

/// A continuous price offset within this of `wm` is pushed further away
/// before rounding, so the resulting tick never lands exactly on `wm`.
const PRICE_EPS: f64 = 1e-9;

pub struct PriceMakerAgent {
    client_id: ClientId,
    rng: StdRng,
    placement_lambda: f64,
    cancellation_lambda: f64,
    price_scale: f64,
    size_mean: f64,
    side: Bernoulli,
    aggressive: Bernoulli,
    max_outstanding: usize,

    local_id_counter: LocalOrderId,
    state: AgentOrderState,
    placement_time: Time,
    /// `t_cancel -> order_id`, earliest first; kept in lock-step with
    /// `cancel_by_order`.
    cancel_times: BTreeMap<Time, OrderId>,
    cancel_by_order: HashMap<OrderId, Time>,
}

impl PriceMakerAgent {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client_id: ClientId,
        seed: u64,
        placement_lambda: f64,
        cancellation_lambda: f64,
        price_scale: f64,
        size_mean: f64,
        aggressive_prob: f64,
        max_outstanding: usize,
    ) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let placement_time = exp_delay_ns(placement_lambda, &mut rng);
        Self {
            client_id,
            rng,
            placement_lambda,
            cancellation_lambda,
            price_scale,
            size_mean,
            side: Bernoulli::new(0.5).expect("0.5 is a valid probability"),
            aggressive: Bernoulli::new(aggressive_prob).expect("aggressive_prob must be in [0, 1]"),
            max_outstanding,
            local_id_counter: 0,
            state: AgentOrderState::new(),
            placement_time,
            cancel_times: BTreeMap::new(),
            cancel_by_order: HashMap::new(),
        }
    }

    fn earliest_cancel_time(&self) -> Time {
        self.cancel_times.keys().next().copied().unwrap_or(Time::MAX)
    }

    fn draw_price_offset(&mut self) -> f64 {
        let dist = Exp::new(1.0 / self.price_scale).expect("price_scale must be positive");
        dist.sample(&mut self.rng)
    }

    fn draw_size(&mut self) -> Size {
        let dist = Poisson::new(self.size_mean).expect("size_mean must be positive");
        let drawn: f64 = dist.sample(&mut self.rng);
        if drawn <= 0.0 {
            1
        } else {
            drawn.min(Size::MAX as f64) as Size
        }
    }

    fn schedule_next_placement(&mut self, now: Time) {
        while self.placement_time <= now {
            self.placement_time += exp_delay_ns(self.placement_lambda, &mut self.rng);
        }
    }
}

impl Agent for PriceMakerAgent {
    fn client_id(&self) -> ClientId {
        self.client_id
    }

    fn next_action_time(&self) -> Time {
        self.placement_time.min(self.earliest_cancel_time())
    }

    fn on_market_state_changed(&mut self, market: &MarketSnapshot, transport: &mut Transport) {
        if market.time >= self.placement_time && self.state.outstanding_count() < self.max_outstanding {
            let wm = if market.weighted_mid.is_nan() { 0.0 } else { market.weighted_mid };
            let dp = self.draw_price_offset();
            let passive_side = if self.side.sample(&mut self.rng) { Side::Offer } else { Side::Bid };
            let aggressive = self.aggressive.sample(&mut self.rng);
            let side = if aggressive { passive_side.opposite() } else { passive_side };
            let continuous_price = if passive_side == Side::Offer { wm + dp } else { wm - dp };
            let price: Price = safe_round_price(if side == Side::Offer {
                (continuous_price + PRICE_EPS).ceil()
            } else {
                (continuous_price - PRICE_EPS).floor()
            });
            let size = self.draw_size();
            let local_id = self.local_id_counter;
            self.local_id_counter += 1;
            self.state.record_placed(local_id, price, side);
            transport.place(PlacementPayload {
                client_id: self.client_id,
                local_id,
                price,
                total_size: size,
                show: size,
                side,
                is_shadow: false,
            });
        }
        self.schedule_next_placement(market.time);

        while self.earliest_cancel_time() <= market.time {
            let (&t, &order_id) = self.cancel_times.iter().next().expect("checked non-empty above");
            self.cancel_times.remove(&t);
            self.cancel_by_order.remove(&order_id);
            if self.state.request_cancel(order_id).is_ok() {
                transport.cancel(order_id);
            }
        }
    }

    fn on_own_order_message(&mut self, msg: OrderMessage) {
        let event = match self.state.handle(&msg) {
            Ok(ev) => ev,
            Err(_) => return,
        };
        match event {
            AgentEvent::Acked => {
                let cancel_at = msg.now + exp_delay_ns(self.cancellation_lambda, &mut self.rng);
                self.cancel_times.insert(cancel_at, msg.order_id);
                self.cancel_by_order.insert(msg.order_id, cancel_at);
            }
            AgentEvent::Cancelled | AgentEvent::Ended => {
                if let Some(t) = self.cancel_by_order.remove(&msg.order_id) {
                    self.cancel_times.remove(&t);
                }
            }
            AgentEvent::HiddenReplenishment | AgentEvent::Traded | AgentEvent::EndedPendingReplenish => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(time: Time, wm: f64) -> MarketSnapshot {
        MarketSnapshot { time, weighted_mid: wm, bids: vec![], asks: vec![] }
    }

    #[test]
    fn test_places_order_once_due() {
        let mut agent = PriceMakerAgent::new(1, 42, 1e9, 1e9, 5.0, 10.0, 0.5, 3);
        let mut transport = Transport::new(0.0);
        let t = agent.next_action_time();
        transport.set_time(t);
        let market = snapshot(t, 100.0);
        agent.on_market_state_changed(&market, &mut transport);
        assert_eq!(agent.state.outstanding_count(), 1);
    }

    #[test]
    fn test_respects_max_outstanding() {
        let mut agent = PriceMakerAgent::new(1, 7, 1.0, 1e9, 5.0, 10.0, 0.5, 1);
        let mut transport = Transport::new(0.0);
        transport.set_time(0);
        // Force due immediately by constructing with a huge placement lambda
        // is awkward; instead directly drive two ticks at an already-due time.
        agent.placement_time = 0;
        let market = snapshot(0, 100.0);
        agent.on_market_state_changed(&market, &mut transport);
        assert_eq!(agent.state.outstanding_count(), 1);
        agent.placement_time = 0;
        agent.on_market_state_changed(&market, &mut transport);
        // still capped at 1 outstanding since nothing has been acked/cleared
        assert_eq!(agent.state.outstanding_count(), 1);
    }

    #[test]
    fn test_ack_schedules_a_cancellation() {
        let mut agent = PriceMakerAgent::new(1, 3, 1e9, 1.0, 5.0, 10.0, 0.5, 3);
        agent.state.record_placed(0, 100, Side::Bid);
        let msg = OrderMessage {
            kind: EventKind::Ack,
            order_id: OrderId([1; 12]),
            local_id: 0,
            client_id: 1,
            price: 100,
            side: Side::Bid,
            shown_size: 10,
            remaining_size: 10,
            trade_size: 0,
            trade_price: 100,
            now: 0,
        };
        agent.on_own_order_message(msg);
        assert!(agent.next_action_time() < Time::MAX);
    }
}
