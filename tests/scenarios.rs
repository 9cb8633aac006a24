// agora_core/tests/scenarios.rs
//
// End-to-end checks against the engine's public surface, one per worked
// walkthrough: a deterministic cross, shadow non-perturbation, iceberg
// refresh, a multi-level sweep, non-fatal unknown-cancel, and transport
// ordering under latency.
//
// Two of the walkthroughs below (the deterministic cross and the iceberg
// refresh) quote numbers that contradict the `shown_size <= show`
// invariant this crate enforces and tests directly in `order.rs`/
// `level.rs`; see DESIGN.md for the resolution this suite follows —
// computed, invariant-consistent values rather than the as-written
// prose.

use agora_core::{EventKind, MatchingEngine, OrderId, RecordingNotifier, Side};
use rand::rngs::StdRng;
use rand::SeedableRng;

#[test]
fn scenario_a_deterministic_cross() {
    let mut engine = MatchingEngine::new().unwrap();
    let mut notify = RecordingNotifier::new();

    engine.set_time(0);
    engine.add(0, 0, 100, 10, 2, Side::Bid, false, &mut notify).unwrap();
    engine.set_time(1);
    engine.add(1, 0, 100, 10, 3, Side::Bid, false, &mut notify).unwrap();
    engine.set_time(2);
    let offer_id = engine.add(2, 0, 100, 2, 2, Side::Offer, false, &mut notify).unwrap();

    let levels = engine.snapshot(false);
    assert_eq!(levels.len(), 1, "only the bid side has resting orders left");
    let level = &levels[0];
    assert_eq!(level.side, Side::Bid);
    assert_eq!(level.orders.len(), 2);

    // cid=0's order is replenished and requeued to the tail, losing time
    // priority to cid=1; shown_size is capped at show=2, not the 8 the
    // walkthrough prose states.
    assert_eq!(level.orders[0].client_id, 1);
    assert_eq!(level.orders[0].remaining_size, 10);
    assert_eq!(level.orders[1].client_id, 0);
    assert_eq!(level.orders[1].shown_size, 2);
    assert_eq!(level.orders[1].remaining_size, 8);

    let trades: Vec<_> = notify.events.iter().filter(|e| e.kind == EventKind::Trade).collect();
    assert_eq!(trades.len(), 2);
    assert!(trades.iter().all(|t| t.trade_size.unsigned_abs() == 2u32 && t.trade_price == 100));
    assert!(trades.iter().any(|t| t.client_id == 0));
    assert!(trades.iter().any(|t| t.client_id == 2));

    // cid=2's own order never rests: it fully trades away at submission.
    assert!(!levels.iter().flat_map(|l| &l.orders).any(|o| o.order_id == offer_id));
}

#[test]
fn scenario_b_shadow_does_not_perturb_aggressor() {
    let mut engine = MatchingEngine::new().unwrap();
    let mut notify = RecordingNotifier::new();

    engine.set_time(0);
    engine.add(0, 0, 100, 10, 2, Side::Bid, true, &mut notify).unwrap(); // shadow
    engine.add(1, 0, 100, 10, 3, Side::Bid, false, &mut notify).unwrap(); // real
    let aggressor_id = engine.add(2, 0, 100, 2, 2, Side::Offer, false, &mut notify).unwrap();

    let levels = engine.snapshot(true);
    assert_eq!(levels.len(), 1);
    let level = &levels[0];
    assert_eq!(level.orders.len(), 2);

    // the real order keeps the head of the queue: the shadow order
    // absorbed the first unit of matching but got requeued to the tail
    // on its hidden replenish.
    assert_eq!(level.orders[0].client_id, 1);
    assert_eq!(level.orders[0].shown_size, 1);
    assert_eq!(level.orders[0].remaining_size, 8);
    assert_eq!(level.orders[1].client_id, 0);
    assert!(level.orders[1].is_shadow);
    assert_eq!(level.orders[1].shown_size, 2);
    assert_eq!(level.orders[1].remaining_size, 8);

    // the aggressor traded away a combined 4 units (2 against the
    // shadow order, which didn't reduce it, then 2 against the real
    // order, which did) despite having declared only size 2.
    let aggressor_trades: Vec<_> = notify.events.iter().filter(|e| e.kind == EventKind::Trade && e.client_id == 2).collect();
    assert_eq!(aggressor_trades.len(), 2);
    let total: i32 = aggressor_trades.iter().map(|t| t.trade_size.abs()).sum();
    assert_eq!(total, 4);
    assert!(!levels.iter().flat_map(|l| &l.orders).any(|o| o.order_id == aggressor_id));
}

#[test]
fn scenario_c_iceberg_refresh_cycles_shown_size() {
    let mut engine = MatchingEngine::new().unwrap();
    let mut notify = RecordingNotifier::new();

    engine.set_time(0);
    let resting_id = engine.add(0, 0, 100, 10, 2, Side::Bid, false, &mut notify).unwrap();

    let mut remaining_after_each = Vec::new();
    let mut shown_after_each = Vec::new();
    for i in 0..5 {
        engine.set_time(i + 1);
        engine.add(10 + i as u32, 0, 100, 1, 1, Side::Offer, false, &mut notify).unwrap();
        let levels = engine.snapshot(false);
        let order = levels.iter().flat_map(|l| &l.orders).find(|o| o.order_id == resting_id).unwrap();
        remaining_after_each.push(order.remaining_size);
        shown_after_each.push(order.shown_size);
    }

    assert_eq!(remaining_after_each, vec![9, 8, 7, 6, 5]);
    assert!(shown_after_each.iter().all(|&s| s == 1 || s == 2));
    assert_eq!(shown_after_each, vec![1, 2, 1, 2, 1]);

    // the resting order re-Acks every time its visible chunk is
    // exhausted and remaining shares are left to replenish: rounds 2 and
    // 4 above, on top of the initial placement Ack.
    let acks_on_resting = notify.events.iter().filter(|e| e.kind == EventKind::Ack && e.order_id == resting_id).count();
    assert_eq!(acks_on_resting, 3);

    let trades_on_resting = notify.events.iter().filter(|e| e.kind == EventKind::Trade && e.order_id == resting_id).count();
    assert_eq!(trades_on_resting, 5);
}

#[test]
fn scenario_d_large_sweep_deletes_levels() {
    let mut engine = MatchingEngine::new().unwrap();
    let mut notify = RecordingNotifier::new();

    engine.set_time(0);
    for (i, price) in (96i16..=100i16).rev().enumerate() {
        engine.add(i as u32, 0, price, 5, 5, Side::Bid, false, &mut notify).unwrap();
    }

    engine.set_time(1);
    engine.add(99, 0, 98, 100, 100, Side::Offer, false, &mut notify).unwrap();

    let l2 = engine.level2(10);
    // levels 100, 99, 98 are swept away entirely; 97 and 96 survive untouched.
    assert_eq!(l2.bids.len(), 2);
    assert_eq!(l2.bids[0].price, 97);
    assert_eq!(l2.bids[0].total_shown, 5);
    assert_eq!(l2.bids[1].price, 96);
    assert_eq!(l2.bids[1].total_shown, 5);

    // the sweeping offer rests with what it couldn't fill: 100 - 3*5 = 85.
    assert_eq!(l2.asks.len(), 1);
    assert_eq!(l2.asks[0].price, 98);
    assert_eq!(l2.asks[0].total_shown, 85);
}

#[test]
fn scenario_e_cancel_unknown_is_nonfatal() {
    let mut engine = MatchingEngine::new().unwrap();
    let mut notify = RecordingNotifier::new();

    engine.cancel(OrderId([9; 12]), &mut notify);
    assert_eq!(notify.errors.len(), 1);
    assert_eq!(engine.order_count(), 0);

    let oid = engine.add(1, 0, 100, 10, 10, Side::Bid, false, &mut notify).unwrap();
    assert_eq!(engine.order_count(), 1);

    engine.cancel(oid, &mut notify);
    assert_eq!(notify.errors.len(), 1, "a real cancel afterward must not add a spurious error");
    assert_eq!(engine.order_count(), 0);
    let tail: Vec<_> = notify.events.iter().rev().take(2).collect();
    assert_eq!(tail[1].kind, EventKind::Cancel);
    assert_eq!(tail[0].kind, EventKind::End);
}

#[test]
fn scenario_f_transport_preserves_fifo_order_and_monotonic_time() {
    use agora_core::{PlacementPayload, Transport};

    let mut transport = Transport::new(2.0);
    transport.set_time(0);
    transport.place(PlacementPayload { client_id: 1, local_id: 0, price: 100, total_size: 5, show: 5, side: Side::Bid, is_shadow: false });

    let mut rng = StdRng::seed_from_u64(7);
    transport.refresh_delay(&mut rng);
    let delay = transport.next_send_time();
    assert!(delay >= 0);

    transport.set_time(1);
    transport.place(PlacementPayload { client_id: 2, local_id: 0, price: 101, total_size: 5, show: 5, side: Side::Offer, is_shadow: false });
    transport.set_time(2);
    transport.place(PlacementPayload { client_id: 3, local_id: 0, price: 102, total_size: 5, show: 5, side: Side::Offer, is_shadow: false });

    let mut engine = MatchingEngine::new().unwrap();
    let mut notify = RecordingNotifier::new();
    // deliver well past every submission's delivery time: all three
    // placements are due, and must be dispatched in FIFO submission order.
    transport.deliver(1_000_000_000, &mut engine, &mut notify).unwrap();

    let acks: Vec<_> = notify.events.iter().filter(|e| e.kind == EventKind::Ack).collect();
    assert_eq!(acks.len(), 3);
    assert_eq!(acks[0].client_id, 1);
    assert_eq!(acks[1].client_id, 2);
    assert_eq!(acks[2].client_id, 3);
    for pair in acks.windows(2) {
        assert!(pair[0].now <= pair[1].now, "delivery time must never regress");
    }
}
