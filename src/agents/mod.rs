// agora_core/src/agents/mod.rs
//
// Reference `Agent` implementations (C13): decision-rule examples
// transcribed from `original_source/src/agents.h`, not part of the
// contractual core. A third-party agent is structurally identical to
// these — nothing in `driver.rs`/`transport.rs` special-cases them.

mod price_maker;
mod trend_follower;

pub use price_maker::PriceMakerAgent;
pub use trend_follower::TrendFollowerAgent;
