// agora_core/src/driver.rs
//
// Simulation driver (C8): the global event loop. Grounded on
// `original_source/src/agents.h`'s free function `simulate(...)`
// (the `min_time`-over-agents scan, the `update_next_send_time`/
// `next_send_time` transport coupling, and the two fatal conditions it
// raises verbatim: "Market time is stuck" and "Transport next send time
// should have moved") and on spec §4.7's ten numbered steps.

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::agent::MarketSnapshot;
use crate::engine::MatchingEngine;
use crate::error::{SimError, SimResult};
use crate::notifier::Notifier;
use crate::transport::Transport;
use crate::types::Time;

/// Depth aggregated into `MarketSnapshot` after each tick, independent
/// of whatever depth an output sink later asks the engine for directly.
pub const DEFAULT_MARKET_DEPTH: usize = 5;

pub struct Driver {
    engine: MatchingEngine,
    transport: Transport,
    market: MarketSnapshot,
    rng: StdRng,
    depth: usize,
}

impl Driver {
    pub fn new(engine: MatchingEngine, transport: Transport, seed: u64) -> Self {
        Self {
            engine,
            transport,
            market: MarketSnapshot { time: 0, weighted_mid: f64::NAN, bids: vec![], asks: vec![] },
            rng: StdRng::seed_from_u64(seed),
            depth: DEFAULT_MARKET_DEPTH,
        }
    }

    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    pub fn engine(&self) -> &MatchingEngine {
        &self.engine
    }

    pub fn transport(&mut self) -> &mut Transport {
        &mut self.transport
    }

    pub fn market(&self) -> &MarketSnapshot {
        &self.market
    }

    fn refresh_market(&mut self, now: Time) {
        let views = self.engine.level2(self.depth);
        self.market = MarketSnapshot {
            time: now,
            weighted_mid: self.engine.wm(),
            bids: views.bids,
            asks: views.asks,
        };
    }

    /// Run the outer loop until `market.time > t_max`, per spec §4.7's
    /// ten steps. `on_tick` is called once per advanced tick with the
    /// refreshed `MarketSnapshot`, after step 9 — the hook an output
    /// sink (market-row / snapshot-matrix writer) attaches to, kept out
    /// of this loop so the driver has no file-format concerns of its
    /// own.
    pub fn run(&mut self, t_max: Time, notify: &mut dyn Notifier, mut on_tick: impl FnMut(&MarketSnapshot)) -> SimResult<()> {
        while self.market.time <= t_max {
            // 1-2: earliest agent-requested action time.
            let mut agents = self.transport.take_agents();
            let t_agents = agents.iter().map(|a| a.next_action_time()).min().unwrap_or(Time::MAX);

            // 3-4: refresh and read the transport's own next delivery time.
            self.transport.refresh_delay(&mut self.rng);
            let t_transport = self.transport.next_send_time();

            // 5: strict progress.
            let t = t_agents.min(t_transport);
            if t <= self.market.time {
                self.transport.return_agents(agents);
                return Err(SimError::StalledClock { at: t });
            }
            if t == Time::MAX {
                self.transport.return_agents(agents);
                break;
            }

            // 6: advance the clock.
            self.market.time = t;
            self.engine.set_time(t);
            self.transport.set_time(t);

            // 7: let every agent react to the new market state.
            for agent in agents.iter_mut() {
                agent.on_market_state_changed(&self.market, &mut self.transport);
            }
            self.transport.return_agents(agents);

            // 8: deliver due placements/cancels into the engine.
            self.transport.deliver(t, &mut self.engine, notify)?;
            if self.transport.next_send_time() <= t && self.transport.next_send_time() != Time::MAX {
                return Err(SimError::StalledTransport { at: t });
            }

            // 9: re-aggregate the book into the shared market snapshot.
            self.refresh_market(t);

            // 10: optional output emission.
            on_tick(&self.market);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Agent, OrderMessage};
    use crate::notifier::NoOpNotifier;
    use crate::transport::PlacementPayload;
    use crate::types::{ClientId, Side};

    /// Run with `RUST_LOG=agora_core=trace cargo test -- --nocapture` to
    /// see the `TracingNotifier` output a full run emits.
    fn init_tracing() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    }

    struct OneShotAgent {
        cid: ClientId,
        fired: bool,
        time: Time,
    }

    impl Agent for OneShotAgent {
        fn client_id(&self) -> ClientId {
            self.cid
        }
        fn next_action_time(&self) -> Time {
            if self.fired {
                Time::MAX
            } else {
                self.time
            }
        }
        fn on_market_state_changed(&mut self, market: &MarketSnapshot, transport: &mut Transport) {
            if !self.fired && market.time >= self.time {
                self.fired = true;
                transport.place(PlacementPayload {
                    client_id: self.cid,
                    local_id: 0,
                    price: 100,
                    total_size: 10,
                    show: 10,
                    side: Side::Bid,
                    is_shadow: false,
                });
            }
        }
        fn on_own_order_message(&mut self, _msg: OrderMessage) {}
    }

    #[test]
    fn test_run_places_one_order_and_terminates() {
        init_tracing();
        let engine = MatchingEngine::new().unwrap();
        let mut transport = Transport::new(0.0);
        transport.register(Box::new(OneShotAgent { cid: 1, fired: false, time: 10 })).unwrap();
        let mut driver = Driver::new(engine, transport, 1);
        let mut notify = NoOpNotifier;
        let mut ticks = 0;
        driver.run(1_000, &mut notify, |_m| ticks += 1).unwrap();
        assert!(ticks >= 1);
        assert_eq!(driver.engine().order_count(), 1);
    }

    #[test]
    fn test_run_terminates_when_nothing_scheduled() {
        let engine = MatchingEngine::new().unwrap();
        let transport = Transport::new(0.0);
        let mut driver = Driver::new(engine, transport, 1);
        let mut notify = NoOpNotifier;
        driver.run(1_000, &mut notify, |_m| {}).unwrap();
        assert_eq!(driver.engine().order_count(), 0);
    }
}
