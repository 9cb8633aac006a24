// agora_core/src/replay.rs
//
// Book-input CSV replay (C12): `event_time_ns,order_id,action,price,side
// [,size]` rows with `action in {ENTRY, CANCEL, AMEND}`. Grounded on
// `original_source/src/sim.h`'s `ReplayData`/`replay()` for the
// same-timestamp dispatch discipline and the ENTRY/CANCEL/AMEND
// vocabulary, and on spec §6/§9 for the textual order-id grammar
// (printable ASCII passthrough, `<HH>` hex escape for everything else)
// and the AMEND-as-cancel-then-reenter resolution of that Open
// Question. Uses the `csv` crate for record tokenization, layered under
// a hand-written hex-escape codec the crate has no native support for.

use std::collections::HashMap;
use std::io::Read;

use crate::engine::MatchingEngine;
use crate::error::{SimError, SimResult};
use crate::notifier::Notifier;
use crate::types::{ClientId, OrderId, Price, Side, Size, Time};

/// One parsed replay-input row. `order_id` here is the external textual
/// identifier from the CSV, distinct from the engine's own `OrderId`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayEvent {
    Entry { time: Time, order_id: String, price: Price, side: Side, size: Size },
    Cancel { time: Time, order_id: String },
    Amend { time: Time, order_id: String, price: Price, side: Side, size: Size },
}

impl ReplayEvent {
    pub fn time(&self) -> Time {
        match self {
            ReplayEvent::Entry { time, .. } | ReplayEvent::Cancel { time, .. } | ReplayEvent::Amend { time, .. } => *time,
        }
    }
}

/// Decode the textual order-id grammar: printable ASCII passes through
/// unchanged, `<HH>` is a two-hex-digit escape for a non-printable byte.
pub fn decode_order_id_text(s: &str) -> SimResult<Vec<u8>> {
    let mut out = Vec::with_capacity(s.len());
    let mut i = 0;
    let bytes = s.as_bytes();
    while i < bytes.len() {
        if bytes[i] == b'<' {
            let end = s[i..]
                .find('>')
                .map(|p| i + p)
                .ok_or_else(|| SimError::ReplayError(format!("unterminated hex escape in order id {s:?}")))?;
            let hex = &s[i + 1..end];
            let byte = u8::from_str_radix(hex, 16)
                .map_err(|e| SimError::ReplayError(format!("bad hex escape {hex:?} in order id {s:?}: {e}")))?;
            out.push(byte);
            i = end + 1;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    Ok(out)
}

/// Encode raw bytes using the textual order-id grammar: printable ASCII
/// passthrough, everything else as `<HH>`.
pub fn encode_order_id_text(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        if b.is_ascii_graphic() || b == b' ' {
            out.push(b as char);
        } else {
            out.push_str(&format!("<{b:02X}>"));
        }
    }
    out
}

fn field<'a>(record: &'a csv::StringRecord, idx: usize, name: &str) -> SimResult<&'a str> {
    record.get(idx).ok_or_else(|| SimError::ReplayError(format!("missing field {name} at index {idx} in row {record:?}")))
}

/// Parse a CSV replay stream into an ordered sequence of events. Does
/// not itself check timestamp monotonicity — `replay()` does, since a
/// bare parse may legitimately be used to diagnose an out-of-order file.
pub fn parse_events<R: Read>(reader: R) -> SimResult<Vec<ReplayEvent>> {
    let mut rdr = csv::ReaderBuilder::new().has_headers(false).flexible(true).from_reader(reader);
    let mut events = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(|e| SimError::ReplayError(e.to_string()))?;
        let time: Time = field(&record, 0, "event_time_ns")?
            .parse()
            .map_err(|e| SimError::ReplayError(format!("bad event_time_ns: {e}")))?;
        let order_id = field(&record, 1, "order_id")?.to_string();
        let action = field(&record, 2, "action")?;
        let price: Price = field(&record, 3, "price")?.parse().map_err(|e| SimError::ReplayError(format!("bad price: {e}")))?;
        let side = Side::from_str(field(&record, 4, "side")?).map_err(SimError::ReplayError)?;
        match action {
            "ENTRY" => {
                let size: Size = field(&record, 5, "size")?.parse().map_err(|e| SimError::ReplayError(format!("bad size: {e}")))?;
                events.push(ReplayEvent::Entry { time, order_id, price, side, size });
            }
            "CANCEL" => {
                events.push(ReplayEvent::Cancel { time, order_id });
            }
            "AMEND" => {
                let size: Size = field(&record, 5, "size")?.parse().map_err(|e| SimError::ReplayError(format!("bad size: {e}")))?;
                events.push(ReplayEvent::Amend { time, order_id, price, side, size });
            }
            other => return Err(SimError::ReplayError(format!("unknown replay action {other:?}"))),
        }
    }
    Ok(events)
}

/// Drive `events` into `engine`, mapping the external textual order ids
/// to the engine's own `OrderId`s. Every replayed order is submitted
/// fully shown (no iceberg) and non-shadow, under the single `client_id`
/// given — the replay grammar carries no per-row client identity.
///
/// An `AMEND` is applied as a cancel of the existing order followed by a
/// fresh `add` at the new price/size, under a freshly assigned
/// `OrderId` — it loses time priority, matching this crate's resolution
/// of the ambiguity left open by the distilled spec (§9).
pub fn replay(events: &[ReplayEvent], engine: &mut MatchingEngine, notify: &mut dyn Notifier, client_id: ClientId) -> SimResult<()> {
    let mut active: HashMap<String, OrderId> = HashMap::new();
    let mut last_time = Time::MIN;
    for event in events {
        let t = event.time();
        if t < last_time {
            return Err(SimError::ReplayError(format!("out-of-order replay timestamp {t} after {last_time}")));
        }
        last_time = t;
        engine.set_time(t);
        match event {
            ReplayEvent::Entry { order_id, price, side, size, .. } => {
                if active.contains_key(order_id) {
                    return Err(SimError::ReplayError(format!("ENTRY for already-active order id {order_id:?}")));
                }
                let oid = engine.add(client_id, 0, *price, *size, *size, *side, false, notify)?;
                active.insert(order_id.clone(), oid);
            }
            ReplayEvent::Cancel { order_id, .. } => {
                let Some(oid) = active.remove(order_id) else {
                    return Err(SimError::ReplayError(format!("CANCEL for unknown order id {order_id:?}")));
                };
                engine.cancel(oid, notify);
            }
            ReplayEvent::Amend { order_id, price, side, size, .. } => {
                let Some(oid) = active.remove(order_id) else {
                    return Err(SimError::ReplayError(format!("AMEND for unknown order id {order_id:?}")));
                };
                engine.cancel(oid, notify);
                let new_oid = engine.add(client_id, 0, *price, *size, *size, *side, false, notify)?;
                active.insert(order_id.clone(), new_oid);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::RecordingNotifier;

    #[test]
    fn test_decode_passthrough_ascii() {
        assert_eq!(decode_order_id_text("abc123").unwrap(), b"abc123".to_vec());
    }

    #[test]
    fn test_decode_hex_escape() {
        assert_eq!(decode_order_id_text("a<0A>b").unwrap(), vec![b'a', 0x0A, b'b']);
    }

    #[test]
    fn test_encode_roundtrips_decode() {
        let raw: Vec<u8> = vec![b'x', 0x00, 0x7f, b'y'];
        let encoded = encode_order_id_text(&raw);
        assert_eq!(decode_order_id_text(&encoded).unwrap(), raw);
    }

    #[test]
    fn test_decode_unterminated_escape_is_error() {
        assert!(decode_order_id_text("a<0A").is_err());
    }

    #[test]
    fn test_parse_events_entry_cancel_amend() {
        let csv_data = "0,ord1,ENTRY,100,Bid,10\n1000,ord1,CANCEL,100,Bid\n2000,ord2,ENTRY,101,Offer,5\n3000,ord2,AMEND,102,Offer,7\n";
        let events = parse_events(csv_data.as_bytes()).unwrap();
        assert_eq!(events.len(), 4);
        assert!(matches!(events[0], ReplayEvent::Entry { .. }));
        assert!(matches!(events[1], ReplayEvent::Cancel { .. }));
        assert!(matches!(events[3], ReplayEvent::Amend { .. }));
    }

    #[test]
    fn test_replay_entry_then_cancel() {
        let events = parse_events("0,ord1,ENTRY,100,Bid,10\n1000,ord1,CANCEL,100,Bid\n".as_bytes()).unwrap();
        let mut engine = MatchingEngine::new().unwrap();
        let mut notify = RecordingNotifier::new();
        replay(&events, &mut engine, &mut notify, 1).unwrap();
        assert_eq!(engine.order_count(), 0);
    }

    #[test]
    fn test_replay_duplicate_entry_is_error() {
        let events = parse_events("0,ord1,ENTRY,100,Bid,10\n1000,ord1,ENTRY,100,Bid,5\n".as_bytes()).unwrap();
        let mut engine = MatchingEngine::new().unwrap();
        let mut notify = RecordingNotifier::new();
        assert!(replay(&events, &mut engine, &mut notify, 1).is_err());
    }

    #[test]
    fn test_replay_cancel_unknown_is_error() {
        let events = parse_events("0,ord1,CANCEL,100,Bid\n".as_bytes()).unwrap();
        let mut engine = MatchingEngine::new().unwrap();
        let mut notify = RecordingNotifier::new();
        assert!(replay(&events, &mut engine, &mut notify, 1).is_err());
    }

    #[test]
    fn test_replay_amend_reenters_at_new_price() {
        let events = parse_events("0,ord1,ENTRY,100,Bid,10\n1000,ord1,AMEND,99,Bid,20\n".as_bytes()).unwrap();
        let mut engine = MatchingEngine::new().unwrap();
        let mut notify = RecordingNotifier::new();
        replay(&events, &mut engine, &mut notify, 1).unwrap();
        let l2 = engine.level2(5);
        assert_eq!(l2.bids.len(), 1);
        assert_eq!(l2.bids[0].price, 99);
        assert_eq!(l2.bids[0].total_shown, 20);
    }

    #[test]
    fn test_replay_rejects_out_of_order_timestamps() {
        let events = vec![
            ReplayEvent::Entry { time: 1000, order_id: "a".into(), price: 100, side: Side::Bid, size: 10 },
            ReplayEvent::Entry { time: 500, order_id: "b".into(), price: 101, side: Side::Bid, size: 10 },
        ];
        let mut engine = MatchingEngine::new().unwrap();
        let mut notify = RecordingNotifier::new();
        assert!(replay(&events, &mut engine, &mut notify, 1).is_err());
    }
}
