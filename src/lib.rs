// agora_core/src/lib.rs
//
// Agora Core — discrete-event agent-based market simulator and
// price-time-priority limit-order-book matching engine.

pub mod agent;
pub mod agents;
pub mod book;
pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod level;
pub mod notifier;
pub mod order;
pub mod output;
pub mod pool;
pub mod replay;
pub mod transport;
pub mod types;
pub mod util;

pub use agent::{Agent, AgentEvent, AgentOrderState, MarketSnapshot, OrderMessage};
pub use agents::{PriceMakerAgent, TrendFollowerAgent};
pub use config::{MarketMakerConfig, OutputConfig, PriceMakerConfig, SimConfig, TrendFollowerConfig};
pub use driver::{Driver, DEFAULT_MARKET_DEPTH};
pub use engine::{MatchingEngine, SnapshotLevel, DEFAULT_POOL_CAPACITY};
pub use error::{SimError, SimResult};
pub use notifier::{
    AgentDispatch, AgentDispatchNotifier, BookLevels, EventKind, LevelView, NoOpNotifier,
    Notifier, RecordedError, RecordedEvent, RecordingNotifier, Tee, TracingNotifier,
};
pub use order::{Order, TradeEffect};
pub use output::{format_market_row, write_snapshot_matrix, SnapshotMatrixBuilder};
pub use replay::{decode_order_id_text, encode_order_id_text, parse_events, replay, ReplayEvent};
pub use transport::{PlacementPayload, Transport};
pub use types::{ClientId, LocalOrderId, OrderId, Price, Side, Size, Time};
