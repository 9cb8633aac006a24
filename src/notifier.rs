// agora_core/src/notifier.rs
//
// Notifier interface (C6): the sink for order lifecycle and book-state
// events. Grounded on `original_source/src/ob.h`'s `INotifier` concept and
// `NOOPNotify` free function (the "singleton" pattern becomes a
// zero-sized type passed by reference, per this crate's §9 design note),
// and on `original_source/src/sim.h`'s `CerrLogger` (pretty-printing
// sink) and `ClientState::NotificationHandler` (the repeat-Ack →
// `is_hidden` observation, reattached here to `AgentDispatchNotifier`
// since a Rust notifier has no back-reference into the live `Order`).

use crate::order::Order;
use crate::types::{ClientId, OrderId, Price, Side, Size, Time};

/// The four lifecycle events an order can raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Ack,
    Trade,
    Cancel,
    End,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EventKind::Ack => "Ack",
            EventKind::Trade => "Trade",
            EventKind::Cancel => "Cancel",
            EventKind::End => "End",
        };
        write!(f, "{s}")
    }
}

/// One depth level as seen from outside the book: used for `log_book`
/// and for the level2/level2.5 aggregations in `engine.rs`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelView {
    pub price: Price,
    pub total_shown: Size,
    pub average_age: Option<f64>,
}

/// A shallow, read-only view of both sides of the book at a point in
/// time, best level first on each side. Lighter than `OrderBook::snapshot`
/// (§4.4), which clones full order records for replay.
#[derive(Debug, Clone, Default)]
pub struct BookLevels {
    pub bids: Vec<LevelView>,
    pub asks: Vec<LevelView>,
}

/// Sink for ack/trade/cancel/end and book events.
pub trait Notifier {
    fn log_order(&mut self, kind: EventKind, order: &Order, now: Time, trade_size: i32, trade_price: Price);
    fn log_book(&mut self, now: Time, levels: &BookLevels);
    /// A recoverable protocol error (unknown/ambiguous oid on cancel).
    /// `order_id` is `None` when the error cannot be attributed to a
    /// specific id (e.g. a malformed replay row).
    fn error(&mut self, order_id: Option<OrderId>, message: &str);
}

/// A sink that discards everything. Useful for benchmarks and for tests
/// that only assert on return values.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpNotifier;

impl Notifier for NoOpNotifier {
    fn log_order(&mut self, _kind: EventKind, _order: &Order, _now: Time, _trade_size: i32, _trade_price: Price) {}
    fn log_book(&mut self, _now: Time, _levels: &BookLevels) {}
    fn error(&mut self, _order_id: Option<OrderId>, _message: &str) {}
}

/// Emits a `tracing` event per call, at the level appropriate to the
/// event: trade/ack/cancel/end at `trace`, book-state at `debug`, errors
/// at `warn` (the caller escalates anything that must actually abort the
/// run — this sink never panics or exits).
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn log_order(&mut self, kind: EventKind, order: &Order, now: Time, trade_size: i32, trade_price: Price) {
        tracing::trace!(
            kind = %kind,
            order_id = %order.order_id,
            client_id = order.client_id,
            now,
            trade_size,
            trade_price,
            shown_size = order.shown_size,
            remaining_size = order.remaining_size,
            "order event"
        );
    }

    fn log_book(&mut self, now: Time, levels: &BookLevels) {
        tracing::debug!(now, bid_levels = levels.bids.len(), ask_levels = levels.asks.len(), "book state");
    }

    fn error(&mut self, order_id: Option<OrderId>, message: &str) {
        tracing::warn!(order_id = ?order_id, message, "notifier error");
    }
}

/// One recorded order event, shaped for the round-trip replay property of
/// spec §8: `(time, kind, oid, client_id, shown_size, price, side,
/// is_shadow, is_hidden)` plus the trade fields.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedEvent {
    pub kind: EventKind,
    pub now: Time,
    pub order_id: OrderId,
    pub client_id: ClientId,
    pub price: Price,
    pub side: Side,
    pub shown_size: Size,
    pub remaining_size: Size,
    pub is_shadow: bool,
    pub is_hidden: bool,
    pub trade_size: i32,
    pub trade_price: Price,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedError {
    pub order_id: Option<OrderId>,
    pub message: String,
}

/// Appends every event and book snapshot for later replay or property
/// comparison. Grounded on `original_source/src/sim.h`'s `ReplayData`.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    pub events: Vec<RecordedEvent>,
    pub book_snapshots: Vec<(Time, BookLevels)>,
    pub errors: Vec<RecordedError>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Notifier for RecordingNotifier {
    fn log_order(&mut self, kind: EventKind, order: &Order, now: Time, trade_size: i32, trade_price: Price) {
        self.events.push(RecordedEvent {
            kind,
            now,
            order_id: order.order_id,
            client_id: order.client_id,
            price: order.price,
            side: order.side,
            shown_size: order.shown_size,
            remaining_size: order.remaining_size,
            is_shadow: order.is_shadow,
            is_hidden: order.is_hidden,
            trade_size,
            trade_price,
        });
    }

    fn log_book(&mut self, now: Time, levels: &BookLevels) {
        self.book_snapshots.push((now, levels.clone()));
    }

    fn error(&mut self, order_id: Option<OrderId>, message: &str) {
        self.errors.push(RecordedError { order_id, message: message.to_string() });
    }
}

/// A dispatcher that routes a `{Ack, Trade, Cancel, End}` event to the
/// agent owning it. Implemented by `Transport` (the owner of the agent
/// registry); `AgentDispatchNotifier` merely forwards into it.
pub trait AgentDispatch {
    /// Route one order event. Returns `Err` if no agent's `client_id`
    /// matches — a fatal configuration error per spec §4.6.
    fn route(&mut self, kind: EventKind, order: &Order, now: Time, trade_size: i32, trade_price: Price) -> Result<(), crate::error::SimError>;
}

/// Wraps an `AgentDispatch` plus an inner sink that still receives every
/// event (for recording/logging) and all `log_book`/`error` calls.
/// `routing_errors` accumulates any fatal routing failure so the caller
/// can check it after a batch of deliveries without threading a `Result`
/// through every `Notifier::log_order` call (the trait itself is
/// infallible, matching the teacher's `INotifier` shape).
pub struct AgentDispatchNotifier<'a, D: AgentDispatch + ?Sized, N: Notifier + ?Sized> {
    dispatch: &'a mut D,
    inner: &'a mut N,
    pub routing_error: Option<crate::error::SimError>,
    /// Every `order_id` that has already received at least one `Ack`. A
    /// second `Ack` for an id already in this set is a hidden-size
    /// replenishment, not a new placement. Keyed by `order_id` alone
    /// (not `client_id`) since `OrderId` is globally unique — a client
    /// may have several orders resting at once, and keying by client_id
    /// would conflate a genuinely new order with a different order's
    /// replenishment. Grounded on `sim.h`'s `NotificationHandler::log`.
    seen_order_ids: std::collections::HashSet<OrderId>,
}

impl<'a, D: AgentDispatch + ?Sized, N: Notifier + ?Sized> AgentDispatchNotifier<'a, D, N> {
    pub fn new(dispatch: &'a mut D, inner: &'a mut N) -> Self {
        Self { dispatch, inner, routing_error: None, seen_order_ids: std::collections::HashSet::new() }
    }
}

impl<'a, D: AgentDispatch + ?Sized, N: Notifier + ?Sized> Notifier for AgentDispatchNotifier<'a, D, N> {
    fn log_order(&mut self, kind: EventKind, order: &Order, now: Time, trade_size: i32, trade_price: Price) {
        if kind == EventKind::Ack {
            // Per spec §3: an Ack for an order_id this client has already
            // been Acked on is a hidden-size replenishment observed from
            // the outside, not a new placement. The live `Order` itself
            // carries no such signal (only the engine mutates it), so we
            // stamp a clone before handing it to `inner`/`dispatch`.
            let is_hidden = !self.seen_order_ids.insert(order.order_id);
            if is_hidden {
                let mut hidden = order.clone();
                hidden.is_hidden = true;
                self.inner.log_order(kind, &hidden, now, trade_size, trade_price);
                if let Err(e) = self.dispatch.route(kind, &hidden, now, trade_size, trade_price) {
                    if self.routing_error.is_none() {
                        self.routing_error = Some(e);
                    }
                }
                return;
            }
        }
        self.inner.log_order(kind, order, now, trade_size, trade_price);
        if let Err(e) = self.dispatch.route(kind, order, now, trade_size, trade_price) {
            if self.routing_error.is_none() {
                self.routing_error = Some(e);
            }
        }
    }
    fn log_book(&mut self, now: Time, levels: &BookLevels) {
        self.inner.log_book(now, levels);
    }
    fn error(&mut self, order_id: Option<OrderId>, message: &str) {
        self.inner.error(order_id, message);
    }
}

/// Fans every call out to two sinks in sequence, `first` then `second`.
/// Used to combine e.g. a `TracingNotifier` with a `RecordingNotifier`
/// without writing a bespoke sink per combination.
pub struct Tee<A: Notifier, B: Notifier> {
    pub first: A,
    pub second: B,
}

impl<A: Notifier, B: Notifier> Tee<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

impl<A: Notifier, B: Notifier> Notifier for Tee<A, B> {
    fn log_order(&mut self, kind: EventKind, order: &Order, now: Time, trade_size: i32, trade_price: Price) {
        self.first.log_order(kind, order, now, trade_size, trade_price);
        self.second.log_order(kind, order, now, trade_size, trade_price);
    }
    fn log_book(&mut self, now: Time, levels: &BookLevels) {
        self.first.log_book(now, levels);
        self.second.log_book(now, levels);
    }
    fn error(&mut self, order_id: Option<OrderId>, message: &str) {
        self.first.error(order_id, message);
        self.second.error(order_id, message);
    }
}
