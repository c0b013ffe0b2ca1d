//! Threat Factor Contract
//!
//! One trait for every evaluator. Concrete factors are standalone
//! implementations, never subclasses of each other.

use super::types::{FactorKind, FactorReading};
use crate::logic::error::FactorError;

// ============================================================================
// THREAT FACTOR TRAIT
// ============================================================================

/// Independent evaluator of one risk category.
///
/// `evaluate` must be repeatable and must not share mutable state with
/// other factors: the aggregator runs factors of one pass in parallel and
/// abandons any that outlive the pass deadline.
pub trait ThreatFactor: Send + Sync {
    /// Stable registry key, e.g. "device-security"
    fn id(&self) -> &str;

    fn kind(&self) -> FactorKind {
        FactorKind::Custom
    }

    fn evaluate(&self) -> Result<FactorReading, FactorError>;
}

// ============================================================================
// PROBE
// ============================================================================

/// Platform hook that reads raw device state for a built-in factor.
///
/// Detection itself lives outside this crate; closures returning
/// `Result<T, String>` are probes.
pub trait Probe<T>: Send + Sync {
    fn read(&self) -> Result<T, String>;
}

impl<T, F> Probe<T> for F
where
    F: Fn() -> Result<T, String> + Send + Sync,
{
    fn read(&self) -> Result<T, String> {
        self()
    }
}
