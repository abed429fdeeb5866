//! Engine configuration with validation.

use lb_01_action_tokens::TokenConfig;
use lb_02_admission::AdmissionConfig;
use lb_03_score_engine::MutationConfig;
use lb_04_rank_index::IndexConfig;
use lb_05_fanout::FanoutConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A capacity or window that must be positive is zero.
    #[error("invalid configuration: {0}")]
    InvalidValue(String),

    /// The admission proof secret is empty.
    #[error("admission proof secret must not be empty")]
    EmptyProofSecret,
}

/// Change bus sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Live broadcast channel capacity.
    pub channel_capacity: usize,
    /// Replay backlog retention (events).
    pub backlog_capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            channel_capacity: shared_bus::DEFAULT_CHANNEL_CAPACITY,
            backlog_capacity: shared_bus::DEFAULT_BACKLOG_CAPACITY,
        }
    }
}

/// Main engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Token issuer configuration.
    pub tokens: TokenConfig,
    /// Admission thresholds.
    pub admission: AdmissionConfig,
    /// Mutator tuning.
    pub mutation: MutationConfig,
    /// Rank index configuration.
    pub index: IndexConfig,
    /// Fanout configuration.
    pub fanout: FanoutConfig,
    /// Change bus sizing.
    pub bus: BusConfig,
    /// Inactivity sweep period (ms).
    pub sweep_interval_ms: u64,
}

impl EngineConfig {
    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tokens.ttl_ms == 0 {
            return Err(ConfigError::InvalidValue("tokens.ttl_ms cannot be 0".into()));
        }
        if self.tokens.max_pending_per_user == 0 {
            return Err(ConfigError::InvalidValue(
                "tokens.max_pending_per_user cannot be 0".into(),
            ));
        }
        if self.admission.proof_secret.is_empty() {
            return Err(ConfigError::EmptyProofSecret);
        }
        if self.admission.volume_window_ms == 0 || self.admission.volume_cap == 0 {
            return Err(ConfigError::InvalidValue(
                "admission volume window and cap cannot be 0".into(),
            ));
        }
        if self.index.top_k == 0 {
            return Err(ConfigError::InvalidValue("index.top_k cannot be 0".into()));
        }
        if self.fanout.outbound_buffer == 0 {
            return Err(ConfigError::InvalidValue(
                "fanout.outbound_buffer cannot be 0".into(),
            ));
        }
        if self.fanout.disconnect_after_ms <= self.fanout.idle_after_ms {
            return Err(ConfigError::InvalidValue(
                "fanout.disconnect_after_ms must exceed fanout.idle_after_ms".into(),
            ));
        }
        if self.bus.channel_capacity == 0 || self.bus.backlog_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "bus capacities cannot be 0".into(),
            ));
        }
        Ok(())
    }
}

/// Default sweep period when the config leaves it at zero.
pub const DEFAULT_SWEEP_INTERVAL_MS: u64 = 5_000;

impl EngineConfig {
    /// Sweep period, defaulted when unset.
    #[must_use]
    pub fn sweep_interval_ms(&self) -> u64 {
        if self.sweep_interval_ms == 0 {
            DEFAULT_SWEEP_INTERVAL_MS
        } else {
            self.sweep_interval_ms
        }
    }
}
