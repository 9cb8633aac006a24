// agora_core/src/level.rs
//
// Price level (C3): the FIFO of resting orders at a single price, plus
// the matching loop that drains an incoming order against it.
//
// Grounded on `original_source/src/ob.h`'s `Level` (a `std::list<Order*>`
// queue plus `match`/`add`/`remove`). The intrusive list becomes a
// `VecDeque<OrderRef>` over the arena in `pool.rs`; FIFO order at a price
// is exactly queue order, so `push_back`/`pop_front` reproduce time
// priority without any extra bookkeeping.

use std::collections::{HashMap, VecDeque};

use crate::notifier::{EventKind, Notifier};
use crate::pool::{OrderPool, OrderRef};
use crate::types::{OrderId, Price, Side, Size, Time};

/// All resting orders at one price, in arrival order.
#[derive(Debug, Default)]
pub struct Level {
    pub price: Price,
    queue: VecDeque<OrderRef>,
}

/// What happened to the incoming order after draining against this level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainOutcome {
    /// Visible quantity the incoming order still carries after this
    /// level — zero means it is fully filled (or, if shadow, it simply
    /// stopped reducing — see `Order::apply_trade`).
    pub incoming_remaining_shown: Size,
    /// True once the incoming order's own `shown_size` has reached zero,
    /// i.e. it must stop crossing into further levels.
    pub incoming_exhausted: bool,
}

impl Level {
    pub fn new(price: Price) -> Self {
        Self { price, queue: VecDeque::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Append a fresh resting order to the tail of the FIFO (new arrival,
    /// or a replenished iceberg re-entering behind orders already
    /// resting at this price — per spec §4.2, a replenishment loses time
    /// priority and re-queues at the back).
    pub fn push_back(&mut self, order_ref: OrderRef) {
        self.queue.push_back(order_ref);
    }

    /// Remove a specific order from the FIFO (used by cancel). O(n) in
    /// the level depth, same complexity as the source's intrusive-list
    /// unlink-by-pointer once you account for the linear scan needed to
    /// find it — the source has an O(1) unlink only because the caller
    /// already holds the node pointer; here the id-index (`book.rs`)
    /// gives us the `OrderRef` in O(1) but removing it from the middle of
    /// a `VecDeque` is still O(n).
    pub fn remove(&mut self, order_ref: OrderRef) -> bool {
        if let Some(pos) = self.queue.iter().position(|&r| r == order_ref) {
            self.queue.remove(pos);
            true
        } else {
            false
        }
    }

    /// Drain `incoming` (itself an `OrderRef` already acquired in the
    /// pool, not yet resting anywhere) against this level's FIFO until
    /// either the level is empty or the incoming order's `remaining_size`
    /// reaches zero. Fully-filled resting orders are either replenished
    /// (re-appended to the tail, `Ack` re-emitted) or removed from the
    /// FIFO, unindexed, and released back to the pool. Likewise, if the
    /// incoming order's own visible chunk is exhausted but it still has
    /// `remaining_size > 0` (an aggressing iceberg), it is replenished
    /// in place (re-emitting `Ack`) and keeps crossing rather than being
    /// released with hidden shares unfilled.
    pub fn match_incoming(
        &mut self,
        incoming: OrderRef,
        id_index: &mut HashMap<OrderId, OrderRef>,
        pool: &mut OrderPool,
        now: Time,
        notify: &mut dyn Notifier,
    ) -> DrainOutcome {
        loop {
            if !pool.get(incoming).is_live() {
                break;
            }
            let Some(&resting_ref) = self.queue.front() else {
                break;
            };

            let traded_size = pool.get(resting_ref).shown_size.min(pool.get(incoming).shown_size);
            debug_assert!(traded_size > 0);

            let resting_is_shadow = pool.get(resting_ref).is_shadow;
            let incoming_is_shadow = pool.get(incoming).is_shadow;
            let trade_price = pool.get(resting_ref).price;

            let resting_effect = pool.get_mut(resting_ref).apply_trade(traded_size, incoming_is_shadow);
            let incoming_effect = pool.get_mut(incoming).apply_trade(traded_size, resting_is_shadow);

            {
                let resting = pool.get(resting_ref);
                notify.log_order(EventKind::Trade, resting, now, signed_trade(resting.side, resting_effect.traded_size), trade_price);
            }
            {
                let inc = pool.get(incoming);
                notify.log_order(EventKind::Trade, inc, now, signed_trade(inc.side, incoming_effect.traded_size), trade_price);
            }

            if resting_effect.ended {
                self.queue.pop_front();
                let needs_ack = pool.get_mut(resting_ref).replenish();
                if needs_ack {
                    let resting = pool.get(resting_ref);
                    notify.log_order(EventKind::Ack, resting, now, 0, resting.price);
                    self.queue.push_back(resting_ref);
                } else {
                    let resting = pool.get(resting_ref);
                    notify.log_order(EventKind::End, resting, now, 0, resting.price);
                    id_index.remove(&resting.order_id);
                    pool.release(resting_ref);
                }
            }

            if incoming_effect.ended {
                if pool.get(incoming).remaining_size > 0 {
                    let needs_ack = pool.get_mut(incoming).replenish();
                    if needs_ack {
                        let inc = pool.get(incoming);
                        notify.log_order(EventKind::Ack, inc, now, 0, inc.price);
                    }
                } else {
                    break;
                }
            }
        }

        let remaining = pool.get(incoming).shown_size;
        DrainOutcome { incoming_remaining_shown: remaining, incoming_exhausted: remaining == 0 }
    }

    /// Iterator over resting order refs, best (front) first, for level2
    /// aggregation in `engine.rs`.
    pub fn iter(&self) -> impl Iterator<Item = &OrderRef> {
        self.queue.iter()
    }

    pub fn front(&self) -> Option<OrderRef> {
        self.queue.front().copied()
    }
}

/// Attach the notifier-boundary sign convention (positive for a bid-side
/// fill, negative for an offer-side fill) per this crate's notifier
/// sign convention; internal bookkeeping stays unsigned.
fn signed_trade(side: Side, size: Size) -> i32 {
    size as i32 * side.sign()
}

/// Two prices are marketable against each other on opposite sides: a bid
/// at `bid_price` crosses an offer at `offer_price` iff `bid_price >=
/// offer_price`.
pub fn do_prices_agree(bid_price: Price, offer_price: Price) -> bool {
    bid_price >= offer_price
}
