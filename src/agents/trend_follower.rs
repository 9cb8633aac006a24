// agora_core/src/agents/trend_follower.rs
//
// Trend-follower reference agent (C13): tracks an EMA of `wm` and, once
// the live `wm` diverges from it by more than `spread`, chases the move
// with a single aggressive order, cancelling anything resting at a
// different price/side. Grounded on `original_source/src/agents.h`'s
// `EMA` and `TrendFollowerAgent`, including the faithfully-kept quirk
// that `EMA::update` blends in the *previous* observation `x_prev_`,
// not the current one.

use crate::agent::{Agent, AgentEvent, AgentOrderState, MarketSnapshot, OrderMessage};
use crate::transport::{PlacementPayload, Transport};
use crate::types::{ClientId, LocalOrderId, Side, Time};

/// Exponential moving average with a time constant `t_`, in seconds.
/// `update` is called once per tick with the elapsed time in seconds and
/// the new observation; the very first call seeds `ema` with the
/// observation itself.
#[derive(Debug, Clone)]
pub struct Ema {
    t: f64,
    x_prev: f64,
    t_prev: f64,
    ema: f64,
}

impl Ema {
    pub fn new(t: f64) -> Self {
        Self { t, x_prev: f64::NAN, t_prev: f64::NAN, ema: f64::NAN }
    }

    pub fn value(&self) -> f64 {
        self.ema
    }

    /// `t_now` and `x` are both in seconds/price units already; this
    /// mirrors `original_source/src/agents.h::EMA::update` exactly,
    /// including blending in `x_prev` (the observation from the call
    /// before this one) rather than `x`.
    pub fn update(&mut self, t_now: f64, x: f64) {
        if self.ema.is_nan() {
            self.ema = x;
        } else {
            let w = (-(t_now - self.t_prev) / self.t).exp();
            self.ema = w * self.ema + (1.0 - w) * self.x_prev;
        }
        self.x_prev = x;
        self.t_prev = t_now;
    }
}

pub struct TrendFollowerAgent {
    client_id: ClientId,
    local_id_counter: LocalOrderId,
    ema: Ema,
    spread: f64,
    state: AgentOrderState,
    bid_count: u64,
    ask_count: u64,
}

impl TrendFollowerAgent {
    pub fn new(client_id: ClientId, ema_t: f64, spread: f64) -> Self {
        Self {
            client_id,
            local_id_counter: 0,
            ema: Ema::new(ema_t),
            spread,
            state: AgentOrderState::new(),
            bid_count: 0,
            ask_count: 0,
        }
    }

    pub fn bid_count(&self) -> u64 {
        self.bid_count
    }

    pub fn ask_count(&self) -> u64 {
        self.ask_count
    }
}

impl Agent for TrendFollowerAgent {
    fn client_id(&self) -> ClientId {
        self.client_id
    }

    /// This agent only ever reacts to a market tick; it has nothing of
    /// its own to schedule.
    fn next_action_time(&self) -> Time {
        Time::MAX
    }

    fn on_market_state_changed(&mut self, market: &MarketSnapshot, transport: &mut Transport) {
        if market.weighted_mid.is_nan() {
            return;
        }
        self.ema.update(market.time as f64 * 1e-9, market.weighted_mid);

        let (price, side) = if market.weighted_mid > self.ema.value() + self.spread {
            let Some(ask) = market.best_ask() else { return };
            (ask.price, Side::Bid)
        } else if market.weighted_mid < self.ema.value() - self.spread {
            let Some(bid) = market.best_bid() else { return };
            (bid.price, Side::Offer)
        } else {
            return;
        };

        match side {
            Side::Bid => self.bid_count += 1,
            Side::Offer => self.ask_count += 1,
        }

        if self.state.has_unacked_at(price, side) {
            return;
        }
        let mut found_resting_at_target = false;
        for order_id in self.state.resting_order_ids().copied().collect::<Vec<_>>() {
            match self.state.resting_side_and_price(&order_id) {
                Some((s, p)) if s == side && p == price => found_resting_at_target = true,
                Some(_) => {
                    if self.state.request_cancel(order_id).is_ok() {
                        transport.cancel(order_id);
                    }
                }
                None => {}
            }
        }
        if found_resting_at_target {
            return;
        }

        let local_id = self.local_id_counter;
        self.local_id_counter += 1;
        self.state.record_placed(local_id, price, side);
        transport.place(PlacementPayload {
            client_id: self.client_id,
            local_id,
            price,
            total_size: 10,
            show: 10,
            side,
            is_shadow: false,
        });
    }

    fn on_own_order_message(&mut self, msg: OrderMessage) {
        let _ = self.state.handle(&msg);
    }
}
