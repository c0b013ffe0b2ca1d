//! Engine Configuration
//!
//! Timeouts and intervals for the aggregator.
//! Loaded from env, a JSON file, or set in code.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::logic::error::{ThreatError, ThreatResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Per-factor evaluation budget; late factors count as not triggered
    pub factor_timeout_ms: u64,
    /// Period of the timer trigger
    pub reevaluate_interval_secs: u64,
    /// Level changes kept in memory
    pub history_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            factor_timeout_ms: constants::DEFAULT_FACTOR_TIMEOUT_MS,
            reevaluate_interval_secs: constants::DEFAULT_REEVALUATE_INTERVAL_SECS,
            history_capacity: constants::DEFAULT_HISTORY_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            factor_timeout_ms: constants::get_factor_timeout_ms(),
            reevaluate_interval_secs: constants::get_reevaluate_interval_secs(),
            history_capacity: constants::get_history_capacity(),
        }
    }

    /// Load from a JSON file; missing fields take defaults
    pub fn load(path: impl AsRef<Path>) -> ThreatResult<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: EngineConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Strict mode - short factor budget, frequent re-checks
    pub fn strict() -> Self {
        Self {
            factor_timeout_ms: 500,
            reevaluate_interval_secs: 15,
            ..Default::default()
        }
    }

    /// Relaxed mode - slow probes tolerated, infrequent re-checks
    pub fn relaxed() -> Self {
        Self {
            factor_timeout_ms: 5_000,
            reevaluate_interval_secs: 300,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> ThreatResult<()> {
        if self.factor_timeout_ms == 0 {
            return Err(ThreatError::InvalidConfig(
                "factor_timeout_ms must be > 0".to_string(),
            ));
        }
        if self.reevaluate_interval_secs == 0 {
            return Err(ThreatError::InvalidConfig(
                "reevaluate_interval_secs must be > 0".to_string(),
            ));
        }
        if self.history_capacity == 0 {
            return Err(ThreatError::InvalidConfig(
                "history_capacity must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn factor_timeout(&self) -> Duration {
        Duration::from_millis(self.factor_timeout_ms)
    }

    pub fn reevaluate_interval(&self) -> Duration {
        Duration::from_secs(self.reevaluate_interval_secs)
    }
}

// ============================================================================
// TESTS
// ============================================================================
