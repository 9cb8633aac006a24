// agora_core/src/types/side.rs
//
// The book has exactly two sides. Keeping the enum tiny and `#[repr(u8)]`
// means a `Side` is one byte and one instruction to compare, and it is the
// single vocabulary used everywhere an order's side is recorded — in the
// order record, the level, the CSV replay grammar, and the agent side
// draws.

use std::fmt;

/// Order side: Bid (buyer) or Offer (seller). Represented as a single byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Side {
    Bid = 1,
    Offer = 2,
}

impl Side {
    /// Parse from a string (case-insensitive). Accepts the replay grammar's
    /// `Bid`/`Ask` spelling as well as `Offer`.
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_ascii_lowercase().as_str() {
            "bid" => Ok(Side::Bid),
            "offer" | "ask" => Ok(Side::Offer),
            _ => Err(format!("Side must be 'Bid' or 'Offer'/'Ask', got {s:?}")),
        }
    }

    /// The opposite side.
    pub fn opposite(&self) -> Side {
        match self {
            Side::Bid => Side::Offer,
            Side::Offer => Side::Bid,
        }
    }

    /// Sign multiplier used at the notifier boundary: Bid = +1, Offer = -1.
    pub fn sign(&self) -> i32 {
        match self {
            Side::Bid => 1,
            Side::Offer => -1,
        }
    }

    /// Raw u8 value.
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// Reconstruct from raw u8.
    pub fn from_u8(value: u8) -> Result<Self, String> {
        match value {
            1 => Ok(Side::Bid),
            2 => Ok(Side::Offer),
            _ => Err(format!("Invalid Side byte: {value}. Must be 1 (Bid) or 2 (Offer)")),
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Bid => write!(f, "Bid"),
            Side::Offer => write!(f, "Offer"),
        }
    }
}
