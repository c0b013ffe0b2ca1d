//! Error handling

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type ThreatResult<T> = Result<T, ThreatError>;

/// Engine-level errors (registry, config, lifecycle)
#[derive(Debug, Error)]
pub enum ThreatError {
    /// Registry mutation with an empty or blank identifier
    #[error("invalid factor identifier: {0:?}")]
    InvalidIdentifier(String),

    /// Configuration rejected by validation
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Request made after `ThreatAggregator::shutdown`
    #[error("threat aggregator has been shut down")]
    EngineStopped,

    /// Risk level label that is not one of NONE/LOW/MEDIUM/HIGH/CRITICAL
    #[error("unknown risk level label: {0:?}")]
    UnknownLevel(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Why a single factor produced no reading in a pass.
///
/// A factor error never aborts the pass; the factor counts as not triggered.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum FactorError {
    #[error("evaluation timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    #[error("evaluation failed: {0}")]
    Failed(String),

    #[error("evaluation panicked: {0}")]
    Panicked(String),
}

impl FactorError {
    pub fn failed(message: impl Into<String>) -> Self {
        FactorError::Failed(message.into())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, FactorError::Timeout { .. })
    }
}
