// agora_core/src/error.rs
//
// One error type for everything that can fail fatally. Non-fatal
// conditions (unknown/ambiguous order on cancel) never appear here — per
// spec §7 they are reported through `Notifier::error` and the call that
// triggered them still returns normally.

use crate::types::{ClientId, Time};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("agent protocol violation: {0}")]
    AgentProtocolViolation(String),

    #[error("stalled clock: driver picked t={at} which does not exceed the current time")]
    StalledClock { at: Time },

    #[error("stalled transport: next_send_time did not advance past t={at}")]
    StalledTransport { at: Time },

    #[error("replay error: {0}")]
    ReplayError(String),

    #[error("duplicate agent registration for client_id={client_id}")]
    DuplicateAgent { client_id: ClientId },

    #[error("no agent registered for client_id={client_id}")]
    UnroutableNotification { client_id: ClientId },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type SimResult<T> = Result<T, SimError>;
