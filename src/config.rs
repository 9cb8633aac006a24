// agora_core/src/config.rs
//
// Simulation configuration (C11): a `serde`-deserializable `SimConfig`
// matching spec §3.1/§6's surface, loadable from TOML. Grounded on
// `cooprefr-bettersys`'s backtest-oracle config module for the
// style (plain `Deserialize` structs, a `from_toml_str`/`from_file`
// pair, validation returning a descriptive error rather than panicking).

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{SimError, SimResult};
use crate::types::ClientId;

#[derive(Debug, Clone, Deserialize)]
pub struct PriceMakerConfig {
    pub client_id: ClientId,
    pub placement_lambda: f64,
    pub cancellation_lambda: f64,
    pub price_scale: f64,
    pub size_poisson_mean: f64,
    pub aggressive_prob: f64,
    pub max_outstanding: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrendFollowerConfig {
    pub client_id: ClientId,
    pub ema_t: f64,
    pub spread: f64,
}

/// Reserved for the out-of-core market-maker policy (§9's Open
/// Question): this crate parses the config shape but ships no
/// `Agent` implementation to build from it.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketMakerConfig {
    pub client_id: ClientId,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct OutputConfig {
    pub market_row_path: Option<PathBuf>,
    pub snapshot_matrix_path: Option<PathBuf>,
    #[serde(default = "default_depth")]
    pub depth: usize,
}

fn default_depth() -> usize {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimConfig {
    pub seed: u64,
    pub t_max_ns: i64,
    pub transport_delay_lambda: f64,
    #[serde(default)]
    pub price_makers: Vec<PriceMakerConfig>,
    #[serde(default)]
    pub trend_followers: Vec<TrendFollowerConfig>,
    #[serde(default)]
    pub market_makers: Vec<MarketMakerConfig>,
    #[serde(default)]
    pub output: Option<OutputConfig>,
}

impl SimConfig {
    pub fn from_toml_str(s: &str) -> SimResult<Self> {
        toml::from_str(s).map_err(|e| SimError::InvalidArgument(format!("invalid config: {e}")))
    }

    pub fn from_file(path: impl AsRef<Path>) -> SimResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Every `client_id` across all agent populations must be unique —
    /// the transport rejects a duplicate registration, but failing here
    /// gives a much more actionable message.
    pub fn validate(&self) -> SimResult<()> {
        let mut seen = std::collections::HashSet::new();
        let all_ids = self
            .price_makers
            .iter()
            .map(|c| c.client_id)
            .chain(self.trend_followers.iter().map(|c| c.client_id))
            .chain(self.market_makers.iter().map(|c| c.client_id));
        for id in all_ids {
            if !seen.insert(id) {
                return Err(SimError::InvalidArgument(format!("duplicate client_id {id} in configuration")));
            }
        }
        Ok(())
    }
}
