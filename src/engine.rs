// agora_core/src/engine.rs
//
// Matching engine (C5): `add`/`cancel`/`shutdown` entry points, the
// crossing loop that walks the opposite side's best levels, OrderId
// allocation, level2/level2.5 aggregation, weighted mid, and snapshot.
//
// Grounded on `original_source/src/ob.h`'s free functions
// (`get_new_order`, `MatchingEngine::add_order`/`cancel_order`/
// `shutdown`/`level2`/`wm`) and on the teacher's `src/matching/mod.rs`
// phased structuring: a `Phase A` aggressor-matching loop followed by a
// `Phase C` resting-remainder insertion. The teacher's `Phase 0` risk
// check and inline self-trade prevention have no counterpart in this
// matching contract and are dropped — the shadow-order rule in
// `order.rs` takes over the role a self-trade check would otherwise
// play.

use crate::book::OrderBook;
use crate::level::{do_prices_agree, Level};
use crate::notifier::{BookLevels, EventKind, LevelView, Notifier};
use crate::pool::OrderPool;
use crate::types::{ClientId, OrderId, Price, Side, Size, Time};

/// Default capacity for a freshly constructed engine's order pool. Must
/// be a power of two (see `OrderPool::new`); chosen generously enough
/// that a typical simulation run never has to grow the arena.
pub const DEFAULT_POOL_CAPACITY: usize = 1024;

/// Depth used for the `log_book` notification emitted after every
/// `add`/`cancel`. Independent of whatever depth a market-output sink
/// later requests via `level2`/`level25` directly.
const DEFAULT_LOG_BOOK_DEPTH: usize = 5;

pub struct MatchingEngine {
    pool: OrderPool,
    book: OrderBook,
    time: Time,
    next_order_id: OrderId,
}

impl MatchingEngine {
    pub fn new() -> crate::error::SimResult<Self> {
        Self::with_pool_capacity(DEFAULT_POOL_CAPACITY)
    }

    pub fn with_pool_capacity(pool_capacity: usize) -> crate::error::SimResult<Self> {
        Ok(Self {
            pool: OrderPool::new(pool_capacity)?,
            book: OrderBook::new(),
            time: 0,
            next_order_id: OrderId::ZERO,
        })
    }

    pub fn time(&self) -> Time {
        self.time
    }

    pub fn set_time(&mut self, now: Time) {
        self.time = now;
    }

    pub fn order_count(&self) -> usize {
        self.book.order_count()
    }

    fn allocate_order_id(&mut self) -> OrderId {
        let id = self.next_order_id;
        self.next_order_id = id.next();
        id
    }

    /// Submit a new order. `local_id` is the agent-assigned identifier
    /// echoed back on `Ack` so the agent can correlate its own
    /// `unacked` bookkeeping; the engine's own identity for the order
    /// (used by `cancel` and the id-index) is the freshly allocated
    /// `OrderId`.
    #[allow(clippy::too_many_arguments)]
    pub fn add(
        &mut self,
        client_id: ClientId,
        local_id: u32,
        price: Price,
        total_size: Size,
        show: Size,
        side: Side,
        is_shadow: bool,
        notify: &mut dyn Notifier,
    ) -> crate::error::SimResult<OrderId> {
        let order_id = self.allocate_order_id();
        let order_ref = self.pool.acquire();
        let needs_ack = self
            .pool
            .get_mut(order_ref)
            .reset(order_id, local_id, client_id, self.time, price, total_size, show, side, is_shadow)?;
        if needs_ack {
            let order = self.pool.get(order_ref);
            notify.log_order(EventKind::Ack, order, self.time, 0, price);
        }

        let opposite = side.opposite();
        loop {
            if !self.pool.get(order_ref).is_live() {
                break;
            }
            let best = match opposite {
                Side::Bid => self.book.best_bid().map(|l| l.price),
                Side::Offer => self.book.best_offer().map(|l| l.price),
            };
            let Some(opp_price) = best else { break };
            let agree = match side {
                Side::Bid => do_prices_agree(price, opp_price),
                Side::Offer => do_prices_agree(opp_price, price),
            };
            if !agree {
                break;
            }
            let outcome = self
                .book
                .match_against(opposite, opp_price, order_ref, &mut self.pool, self.time, notify)
                .expect("best_* reported a level that vanished between lookup and match");
            self.book.prune_if_empty(opposite, opp_price);
            if outcome.incoming_exhausted {
                break;
            }
        }

        if self.pool.get(order_ref).is_live() {
            let remaining = self.pool.get(order_ref);
            self.book.index_order(remaining.order_id, order_ref);
            self.book.level_mut(side, price).push_back(order_ref);
        } else {
            self.pool.release(order_ref);
        }

        let views = self.level2(DEFAULT_LOG_BOOK_DEPTH);
        notify.log_book(self.time, &views);
        Ok(order_id)
    }

    /// Cancel a resting order by its engine-assigned id. Unknown ids are
    /// non-fatal: reported through `Notifier::error` and otherwise a
    /// no-op, per spec §4.4.
    pub fn cancel(&mut self, order_id: OrderId, notify: &mut dyn Notifier) {
        let Some(order_ref) = self.book.unindex_order(&order_id) else {
            notify.error(Some(order_id), "cancelling unknown oid");
            return;
        };
        let (side, price) = {
            let order = self.pool.get(order_ref);
            (order.side, order.price)
        };
        let removed = self.book.level_mut(side, price).remove(order_ref);
        debug_assert!(removed, "id-index and level FIFO disagreed about order residency");
        self.book.prune_if_empty(side, price);

        let order = self.pool.get(order_ref);
        notify.log_order(EventKind::Cancel, order, self.time, 0, price);
        notify.log_order(EventKind::End, order, self.time, 0, price);
        self.pool.release(order_ref);
    }

    /// Cancel every resting order, emitting a book-state notification
    /// after each one.
    pub fn shutdown(&mut self, notify: &mut dyn Notifier) {
        while let Some(order_id) = self.any_resting_order_id() {
            self.cancel(order_id, notify);
            let views = self.level2(DEFAULT_LOG_BOOK_DEPTH);
            notify.log_book(self.time, &views);
        }
    }

    fn any_resting_order_id(&self) -> Option<OrderId> {
        self.book
            .levels(Side::Bid)
            .chain(self.book.levels(Side::Offer))
            .find_map(|l| l.front())
            .map(|order_ref| self.pool.get(order_ref).order_id)
    }

    /// First `n` levels per side, best first, each reporting
    /// `{price, total_shown_size, average_age}` (§4.4).
    pub fn level2(&self, n: usize) -> BookLevels {
        BookLevels {
            bids: self.book.levels(Side::Bid).take(n).map(|l| self.level_view(l)).collect(),
            asks: self.book.levels(Side::Offer).take(n).map(|l| self.level_view(l)).collect(),
        }
    }

    /// Alias kept for the level2.5 terminology used in spec §4.4: in
    /// this engine level2 and level2.5 share the same aggregation (a
    /// richer level2.5 that additionally reports hidden liquidity would
    /// require iterating `is_hidden` orders separately; no caller in
    /// this crate currently distinguishes the two).
    pub fn level25(&self, n: usize) -> BookLevels {
        self.level2(n)
    }

    fn level_view(&self, level: &Level) -> LevelView {
        let mut total_shown: Size = 0;
        let mut age_sum = 0.0f64;
        let mut age_count = 0u32;
        for &order_ref in level.iter() {
            let order = self.pool.get(order_ref);
            if order.shown_size > 0 {
                total_shown += order.shown_size;
                age_sum += (self.time - order.creation_time) as f64 * 1e-9;
                age_count += 1;
            }
        }
        LevelView {
            price: level.price,
            total_shown,
            average_age: if age_count > 0 { Some(age_sum / age_count as f64) } else { None },
        }
    }

    /// Size-weighted mid of the best bid/ask, `NaN` if either side is
    /// empty.
    pub fn wm(&self) -> f64 {
        match (self.book.best_bid(), self.book.best_offer()) {
            (Some(bid), Some(ask)) => {
                let bid_view = self.level_view(bid);
                let ask_view = self.level_view(ask);
                let bid_sz = bid_view.total_shown as f64;
                let ask_sz = ask_view.total_shown as f64;
                if bid_sz + ask_sz == 0.0 {
                    return f64::NAN;
                }
                (bid_view.price as f64 * ask_sz + ask_view.price as f64 * bid_sz) / (bid_sz + ask_sz)
            }
            _ => f64::NAN,
        }
    }

    /// An immutable, independently-owned copy of the book's resting
    /// orders at the current time, ordered by increasing
    /// aggressiveness-distance (offers deepest-first, then bids
    /// best-first). `include_shadow` controls whether shadow orders are
    /// copied in; they are always skipped otherwise. Orders are cloned
    /// by value (`Order: Clone`) rather than through the pool, since a
    /// snapshot consumer has no business sharing arena slots with the
    /// live book.
    pub fn snapshot(&self, include_shadow: bool) -> Vec<SnapshotLevel> {
        let mut out = Vec::new();
        for level in self.book.levels(Side::Offer).collect::<Vec<_>>().into_iter().rev() {
            out.push(self.snapshot_level(level, Side::Offer, include_shadow));
        }
        for level in self.book.levels(Side::Bid) {
            out.push(self.snapshot_level(level, Side::Bid, include_shadow));
        }
        out
    }

    fn snapshot_level(&self, level: &Level, side: Side, include_shadow: bool) -> SnapshotLevel {
        let orders = level
            .iter()
            .map(|&r| self.pool.get(r))
            .filter(|o| include_shadow || !o.is_shadow)
            .cloned()
            .collect();
        SnapshotLevel { price: level.price, side, orders }
    }
}

/// One level of a `snapshot()` result: a price, its side, and the
/// cloned FIFO of resting orders at that price.
#[derive(Debug, Clone)]
pub struct SnapshotLevel {
    pub price: Price,
    pub side: Side,
    pub orders: Vec<crate::order::Order>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::RecordingNotifier;

    #[test]
    fn test_add_resting_order_appears_in_level2() {
        let mut engine = MatchingEngine::new().unwrap();
        let mut notifier = RecordingNotifier::new();
        engine.add(1, 0, 100, 10, 10, Side::Bid, false, &mut notifier).unwrap();
        let l2 = engine.level2(5);
        assert_eq!(l2.bids.len(), 1);
        assert_eq!(l2.bids[0].price, 100);
        assert_eq!(l2.bids[0].total_shown, 10);
        assert!(l2.asks.is_empty());
    }

    #[test]
    fn test_crossing_order_fully_fills_against_resting() {
        let mut engine = MatchingEngine::new().unwrap();
        let mut notifier = RecordingNotifier::new();
        engine.add(1, 0, 100, 10, 10, Side::Offer, false, &mut notifier).unwrap();
        engine.add(2, 0, 100, 10, 10, Side::Bid, false, &mut notifier).unwrap();

        assert!(engine.level2(5).asks.is_empty());
        assert!(engine.level2(5).bids.is_empty());
        assert_eq!(notifier.events.iter().filter(|e| e.kind == EventKind::Trade).count(), 2);
    }

    #[test]
    fn test_cancel_unknown_order_is_nonfatal_and_reports_error() {
        let mut engine = MatchingEngine::new().unwrap();
        let mut notifier = RecordingNotifier::new();
        engine.cancel(OrderId([9; 12]), &mut notifier);
        assert_eq!(notifier.errors.len(), 1);
    }

    #[test]
    fn test_cancel_removes_resting_order_and_emits_cancel_then_end() {
        let mut engine = MatchingEngine::new().unwrap();
        let mut notifier = RecordingNotifier::new();
        let oid = engine.add(1, 0, 100, 10, 10, Side::Bid, false, &mut notifier).unwrap();
        notifier.events.clear();
        engine.cancel(oid, &mut notifier);
        assert_eq!(notifier.events[0].kind, EventKind::Cancel);
        assert_eq!(notifier.events[1].kind, EventKind::End);
        assert!(engine.level2(5).bids.is_empty());
    }

    #[test]
    fn test_wm_is_nan_when_one_side_empty() {
        let mut engine = MatchingEngine::new().unwrap();
        let mut notifier = RecordingNotifier::new();
        engine.add(1, 0, 100, 10, 10, Side::Bid, false, &mut notifier).unwrap();
        assert!(engine.wm().is_nan());
    }

    #[test]
    fn test_wm_weights_toward_larger_side() {
        let mut engine = MatchingEngine::new().unwrap();
        let mut notifier = RecordingNotifier::new();
        engine.add(1, 0, 99, 30, 30, Side::Bid, false, &mut notifier).unwrap();
        engine.add(2, 0, 101, 10, 10, Side::Offer, false, &mut notifier).unwrap();
        // wm = (bb*ask_sz + ba*bid_sz) / (bid_sz+ask_sz) = (99*10 + 101*30)/40
        let expected = (99.0 * 10.0 + 101.0 * 30.0) / 40.0;
        assert!((engine.wm() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_shutdown_cancels_every_resting_order() {
        let mut engine = MatchingEngine::new().unwrap();
        let mut notifier = RecordingNotifier::new();
        engine.add(1, 0, 99, 10, 10, Side::Bid, false, &mut notifier).unwrap();
        engine.add(2, 0, 101, 10, 10, Side::Offer, false, &mut notifier).unwrap();
        engine.shutdown(&mut notifier);
        assert_eq!(engine.order_count(), 0);
    }

    #[test]
    fn test_snapshot_excludes_shadow_orders_by_default() {
        let mut engine = MatchingEngine::new().unwrap();
        let mut notifier = RecordingNotifier::new();
        engine.add(1, 0, 99, 10, 10, Side::Bid, true, &mut notifier).unwrap();
        let visible = engine.snapshot(false);
        assert!(visible.iter().all(|l| l.orders.is_empty()));
        let with_shadow = engine.snapshot(true);
        assert_eq!(with_shadow.iter().map(|l| l.orders.len()).sum::<usize>(), 1);
    }
}
