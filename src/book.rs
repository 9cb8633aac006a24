// agora_core/src/book.rs
//
// Order book (C4): both sides of the book, each a price-ordered map of
// `Level`s, plus the id-index that lets `cancel` find an order in O(1)
// without scanning every level.
//
// Grounded on `original_source/src/ob.h`'s `MatchingEngine` fields
// (`all_bids_`, `all_offers_`, `set_`) and on the teacher's
// `src/matching/mod.rs`, which already uses a `BTreeMap` keyed by price
// with the best level first — that shape survives unchanged here, only
// the per-level storage (`VecDeque<Order>` in the teacher) is swapped
// for the arena-indexed `Level` of `src/level.rs`.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

use crate::level::{DrainOutcome, Level};
use crate::notifier::Notifier;
use crate::pool::{OrderPool, OrderRef};
use crate::types::{OrderId, Price, Side, Time};

/// Bids are stored under `Reverse<Price>` so that iterating the map in
/// key order visits the highest price first — the best bid.
#[derive(Debug, Default)]
pub struct OrderBook {
    bids: BTreeMap<Reverse<Price>, Level>,
    offers: BTreeMap<Price, Level>,
    id_index: HashMap<OrderId, OrderRef>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index_order(&mut self, order_id: OrderId, order_ref: OrderRef) {
        self.id_index.insert(order_id, order_ref);
    }

    pub fn unindex_order(&mut self, order_id: &OrderId) -> Option<OrderRef> {
        self.id_index.remove(order_id)
    }

    pub fn lookup(&self, order_id: &OrderId) -> Option<OrderRef> {
        self.id_index.get(order_id).copied()
    }

    /// The level on `side` at `price`, creating an empty one if absent.
    pub fn level_mut(&mut self, side: Side, price: Price) -> &mut Level {
        match side {
            Side::Bid => self.bids.entry(Reverse(price)).or_insert_with(|| Level::new(price)),
            Side::Offer => self.offers.entry(price).or_insert_with(|| Level::new(price)),
        }
    }

    pub fn level(&self, side: Side, price: Price) -> Option<&Level> {
        match side {
            Side::Bid => self.bids.get(&Reverse(price)),
            Side::Offer => self.offers.get(&price),
        }
    }

    /// Drop a level from the map once it has gone empty — levels must
    /// not accumulate as dangling empty entries, or `best_*` and level2
    /// aggregation would have to skip them forever.
    pub fn prune_if_empty(&mut self, side: Side, price: Price) {
        match side {
            Side::Bid => {
                if self.bids.get(&Reverse(price)).is_some_and(Level::is_empty) {
                    self.bids.remove(&Reverse(price));
                }
            }
            Side::Offer => {
                if self.offers.get(&price).is_some_and(Level::is_empty) {
                    self.offers.remove(&price);
                }
            }
        }
    }

    pub fn best_bid(&self) -> Option<&Level> {
        self.bids.values().next()
    }

    pub fn best_offer(&self) -> Option<&Level> {
        self.offers.values().next()
    }

    /// Best-first iteration over one side's levels, for the matching
    /// loop in `engine.rs` and the level2/level2.5 aggregators.
    pub fn levels(&self, side: Side) -> Box<dyn Iterator<Item = &Level> + '_> {
        match side {
            Side::Bid => Box::new(self.bids.values()),
            Side::Offer => Box::new(self.offers.values()),
        }
    }

    pub fn is_empty(&self, side: Side) -> bool {
        match side {
            Side::Bid => self.bids.is_empty(),
            Side::Offer => self.offers.is_empty(),
        }
    }

    pub fn order_count(&self) -> usize {
        self.id_index.len()
    }

    /// Drain `incoming` against the best level on `side` at `price`,
    /// using a disjoint borrow of `id_index` so the level can unindex
    /// any resting order it fully releases. Returns `None` if there is
    /// no level at that price (the caller should not have called this
    /// without checking `best_bid`/`best_offer` first, but an absent
    /// level is simply treated as "nothing to drain against").
    pub fn match_against(
        &mut self,
        side: Side,
        price: Price,
        incoming: OrderRef,
        pool: &mut OrderPool,
        now: Time,
        notify: &mut dyn Notifier,
    ) -> Option<DrainOutcome> {
        let level = match side {
            Side::Bid => self.bids.get_mut(&Reverse(price)),
            Side::Offer => self.offers.get_mut(&price),
        }?;
        Some(level.match_incoming(incoming, &mut self.id_index, pool, now, notify))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_best_bid_is_highest_price() {
        let mut book = OrderBook::new();
        book.level_mut(Side::Bid, 100);
        book.level_mut(Side::Bid, 105);
        book.level_mut(Side::Bid, 99);
        assert_eq!(book.best_bid().unwrap().price, 105);
    }

    #[test]
    fn test_best_offer_is_lowest_price() {
        let mut book = OrderBook::new();
        book.level_mut(Side::Offer, 110);
        book.level_mut(Side::Offer, 101);
        book.level_mut(Side::Offer, 120);
        assert_eq!(book.best_offer().unwrap().price, 101);
    }

    #[test]
    fn test_prune_if_empty_removes_exhausted_level() {
        let mut book = OrderBook::new();
        book.level_mut(Side::Bid, 100);
        assert!(book.level(Side::Bid, 100).is_some());
        book.prune_if_empty(Side::Bid, 100);
        assert!(book.level(Side::Bid, 100).is_none());
    }

    #[test]
    fn test_id_index_roundtrip() {
        let mut book = OrderBook::new();
        let oid = OrderId([1; 12]);
        book.index_order(oid, 7);
        assert_eq!(book.lookup(&oid), Some(7));
        assert_eq!(book.unindex_order(&oid), Some(7));
        assert_eq!(book.lookup(&oid), None);
    }

    #[test]
    fn test_levels_iterate_best_first() {
        let mut book = OrderBook::new();
        book.level_mut(Side::Offer, 103);
        book.level_mut(Side::Offer, 101);
        book.level_mut(Side::Offer, 102);
        let prices: Vec<Price> = book.levels(Side::Offer).map(|l| l.price).collect();
        assert_eq!(prices, vec![101, 102, 103]);
    }
}
