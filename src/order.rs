// agora_core/src/order.rs
//
// Order record (C2): the mutable state of a resting or in-flight order.
//
// Grounded on `original_source/src/ob.h`'s `Order` (`reset`, `replenish`,
// `match`/`_traded`). The shadow-order extension (`is_shadow`, the
// `reduce(self, other)` rule) is not present in the retained source — the
// book predates it — and is built directly from this crate's governing
// contract's §4.2/§4.4 prose plus the worked Scenario B, which together
// pin down the one ambiguity in that prose (see DESIGN.md: a real
// aggressor trading into a shadow resting order does NOT decrement its
// own size, letting it keep consuming the level beyond its nominal size —
// the literal description of case 2's *first* sentence contradicts its
// own worked consequence and Scenario B; this crate follows the scenario).

use crate::error::{SimError, SimResult};
use crate::types::{ClientId, LocalOrderId, OrderId, Price, Side, Size, Time};

#[derive(Debug, Clone)]
pub struct Order {
    pub order_id: OrderId,
    pub local_id: LocalOrderId,
    pub client_id: ClientId,
    pub creation_time: Time,
    pub price: Price,
    pub total_size: Size,
    pub show: Size,
    pub remaining_size: Size,
    pub shown_size: Size,
    pub side: Side,
    pub is_shadow: bool,
    pub is_hidden: bool,
}

impl Default for Order {
    fn default() -> Self {
        Order {
            order_id: OrderId::ZERO,
            local_id: 0,
            client_id: 0,
            creation_time: 0,
            price: 0,
            total_size: 0,
            show: 0,
            remaining_size: 0,
            shown_size: 0,
            side: Side::Bid,
            is_shadow: false,
            is_hidden: false,
        }
    }
}

/// The outcome of applying one unit of matching to a single order. Both
/// the resting and the aggressing order each get their own `TradeEffect`
/// for the same match — see `Level::match_incoming` in `level.rs`, which
/// is the only caller and the one responsible for turning these into
/// `Notifier` calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradeEffect {
    /// Always positive: the notified traded size, regardless of whether
    /// this order's own counters actually moved (see the shadow rule).
    pub traded_size: Size,
    /// Whether this order's `remaining_size`/`shown_size` were actually
    /// decremented.
    pub reduced: bool,
    /// Whether `shown_size` reached zero as a result (only meaningful
    /// when `reduced` is true).
    pub ended: bool,
}

impl Order {
    /// Zero every field. Called by the pool on acquire and release so a
    /// stale read through a dangling handle observes zeros, never another
    /// order's state.
    pub fn clear(&mut self) {
        *self = Order::default();
    }

    /// Initializes every field and replenishes the visible quantity,
    /// returning whether an `Ack` should be emitted by the caller (the
    /// caller owns the `Notifier`, not the record).
    #[allow(clippy::too_many_arguments)]
    pub fn reset(
        &mut self,
        order_id: OrderId,
        local_id: LocalOrderId,
        client_id: ClientId,
        creation_time: Time,
        price: Price,
        total_size: Size,
        show: Size,
        side: Side,
        is_shadow: bool,
    ) -> SimResult<bool> {
        if total_size < 0 {
            return Err(SimError::InvalidArgument(format!(
                "total_size must be non-negative, got {total_size}"
            )));
        }
        if show < 0 {
            return Err(SimError::InvalidArgument(format!(
                "show must be non-negative, got {show}"
            )));
        }
        self.order_id = order_id;
        self.local_id = local_id;
        self.client_id = client_id;
        self.creation_time = creation_time;
        self.price = price;
        self.total_size = total_size;
        self.show = show;
        self.remaining_size = total_size;
        self.shown_size = 0;
        self.side = side;
        self.is_shadow = is_shadow;
        self.is_hidden = false;
        Ok(self.replenish())
    }

    /// If the visible chunk is exhausted but shares remain, reveal a fresh
    /// chunk. Returns whether an `Ack` should be (re-)emitted.
    pub fn replenish(&mut self) -> bool {
        if self.shown_size == 0 && self.remaining_size > 0 {
            self.shown_size = self.show.min(self.remaining_size);
            true
        } else {
            false
        }
    }

    /// Whether this order may currently participate as the head of a
    /// level FIFO (i.e. has visible quantity to trade).
    pub fn is_live(&self) -> bool {
        self.shown_size > 0
    }

    /// Apply one match of size `traded_size` (already computed by the
    /// caller as `min(self.shown_size, counterparty.shown_size)`) against
    /// a counterparty whose shadow flag is `other_is_shadow`.
    ///
    /// Implements the shadow rule: `reduce(self, other) := self.is_shadow
    /// || !other_is_shadow`, i.e. true for every combination except a
    /// real order (`self.is_shadow == false`) trading against a shadow
    /// counterparty (`other_is_shadow == true`), in which case this
    /// order's own sizes are left untouched even though a `Trade` is
    /// still reported for it.
    pub fn apply_trade(&mut self, traded_size: Size, other_is_shadow: bool) -> TradeEffect {
        debug_assert!(self.shown_size > 0);
        debug_assert!(traded_size > 0 && traded_size <= self.shown_size);
        let reduced = self.is_shadow || !other_is_shadow;
        if reduced {
            self.remaining_size -= traded_size;
            self.shown_size -= traded_size;
        }
        TradeEffect {
            traded_size,
            reduced,
            ended: reduced && self.shown_size == 0,
        }
    }
}
