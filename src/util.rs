// agora_core/src/util.rs
//
// Small numeric helpers shared by the transport delay draw and the
// reference agents' own scheduling (§8's `safe_round` property and the
// exponential inter-arrival draw `original_source/src/agents.h` performs
// inline in several places, here lifted into one place since every
// caller needs the same "degenerate lambda means no delay" guard).

use rand::Rng;
use rand_distr::{Distribution, Exp};

use crate::types::{Price, Time};

/// Below this rate, an exponential draw is treated as always-zero rather
/// than handed to `Exp`, which panics on a non-positive rate.
pub const DEGENERATE_LAMBDA_EPSILON: f64 = 1e-12;

/// Draw a single exponential inter-arrival delay, in nanoseconds, at
/// rate `lambda` (events per second). `lambda <= DEGENERATE_LAMBDA_EPSILON`
/// always returns zero.
pub fn exp_delay_ns<R: Rng + ?Sized>(lambda: f64, rng: &mut R) -> Time {
    if lambda <= DEGENERATE_LAMBDA_EPSILON {
        return 0;
    }
    let dist = Exp::new(lambda).expect("lambda already checked positive above epsilon");
    let seconds: f64 = dist.sample(rng);
    safe_round_time(seconds)
}

/// Round a duration in seconds to the nearest nanosecond.
///
/// # Panics
/// Panics if `seconds` is not finite or would overflow `i64` nanoseconds.
pub fn safe_round_time(seconds: f64) -> Time {
    assert!(seconds.is_finite(), "duration must be finite, got {seconds}");
    let ns = (seconds * 1e9).round();
    assert!(
        ns >= i64::MIN as f64 && ns <= i64::MAX as f64,
        "duration {seconds}s rounds to {ns}ns, out of Time range"
    );
    ns as Time
}

/// Round a floating price to the nearest tick, asserting it falls within
/// `Price`'s (`i16`) range. An integral `f64` in `[i16::MIN, i16::MAX]`
/// round-trips through this function exactly (§8).
///
/// # Panics
/// Panics if `x` rounds outside `[i16::MIN, i16::MAX]`.
pub fn safe_round_price(x: f64) -> Price {
    assert!(x.is_finite(), "price must be finite, got {x}");
    let rounded = x.round();
    assert!(
        rounded >= i16::MIN as f64 && rounded <= i16::MAX as f64,
        "price {x} rounds to {rounded}, out of Price range"
    );
    rounded as Price
}
