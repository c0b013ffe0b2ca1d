//! Central Configuration Constants
//!
//! Single source of truth for all engine defaults.
//! `EngineConfig::from_env` falls back to these values.

/// Default per-factor evaluation timeout (milliseconds)
pub const DEFAULT_FACTOR_TIMEOUT_MS: u64 = 2_000;

/// Default periodic re-evaluation interval (seconds)
pub const DEFAULT_REEVALUATE_INTERVAL_SECS: u64 = 60;

/// Default number of level changes kept in memory
pub const DEFAULT_HISTORY_CAPACITY: usize = 64;

/// Crate version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Tool name
pub const APP_NAME: &str = "threat-monitor";

// ============================================
// Environment variable names
// ============================================

pub const ENV_FACTOR_TIMEOUT_MS: &str = "THREAT_FACTOR_TIMEOUT_MS";
pub const ENV_REEVALUATE_INTERVAL_SECS: &str = "THREAT_REEVALUATE_INTERVAL_SECS";
pub const ENV_HISTORY_CAPACITY: &str = "THREAT_HISTORY_CAPACITY";

// ============================================
// Helper functions to read from env with fallback
// ============================================

/// Get factor timeout from environment or use default
pub fn get_factor_timeout_ms() -> u64 {
    std::env::var(ENV_FACTOR_TIMEOUT_MS)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_FACTOR_TIMEOUT_MS)
}

/// Get re-evaluation interval from environment or use default
pub fn get_reevaluate_interval_secs() -> u64 {
    std::env::var(ENV_REEVALUATE_INTERVAL_SECS)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_REEVALUATE_INTERVAL_SECS)
}

/// Get history capacity from environment or use default
pub fn get_history_capacity() -> usize {
    std::env::var(ENV_HISTORY_CAPACITY)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_HISTORY_CAPACITY)
}
