//! Aggregation Pass
//!
//! Fan-out every factor of a snapshot onto its own worker thread, fan-in
//! with one shared deadline, then reduce with the max rule. Workers still
//! running at the deadline are abandoned, never joined.
//!
//! A factor whose abandoned worker has not returned yet is not started
//! again; it reports a timeout until that worker finishes.

use std::any::Any;
use std::collections::{BTreeMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::logic::error::{FactorError, ThreatResult};
use crate::logic::registry::RegistrySnapshot;
use crate::logic::threat::{overall_level, FactorReading, RiskLevel};
use crate::logic::trigger::Trigger;

// ============================================================================
// RESULT TYPES
// ============================================================================

/// A factor that produced no reading this pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactorFailure {
    pub factor_id: String,
    pub error: FactorError,
}

/// Outcome of one aggregation pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationResult {
    pub pass_id: u64,
    pub trigger: Trigger,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Every factor in the snapshot; failed ones appear as not triggered
    pub readings: BTreeMap<String, FactorReading>,
    pub failures: Vec<FactorFailure>,
    pub overall_level: RiskLevel,
}

impl AggregationResult {
    /// Ids of triggered factors, sorted
    pub fn triggered_factors(&self) -> Vec<String> {
        self.readings
            .iter()
            .filter(|(_, reading)| reading.triggered)
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn failure_for(&self, factor_id: &str) -> Option<&FactorError> {
        self.failures
            .iter()
            .find(|f| f.factor_id == factor_id)
            .map(|f| &f.error)
    }

    /// Overall level if every failed factor had reported `unknown`.
    ///
    /// For callers whose policy treats an unknown read as risky; the
    /// published level is not affected.
    pub fn level_treating_unknown_as(&self, unknown: RiskLevel) -> RiskLevel {
        if self.has_failures() {
            self.overall_level.combine(unknown)
        } else {
            self.overall_level
        }
    }

    pub fn to_json(&self) -> ThreatResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

// ============================================================================
// IN-FLIGHT TRACKING
// ============================================================================

/// Ids of factors with a worker still inside `evaluate`
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    ids: Arc<Mutex<HashSet<String>>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `id` running. `None` if it already is.
    fn claim(&self, id: &str) -> Option<Claim> {
        if !self.ids.lock().insert(id.to_string()) {
            return None;
        }
        Some(Claim {
            ids: Arc::clone(&self.ids),
            id: id.to_string(),
        })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.lock().contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.lock().is_empty()
    }

    /// Running ids, sorted
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.ids.lock().iter().cloned().collect();
        ids.sort();
        ids
    }
}

/// Released when the worker holding it returns, panics, or fails to start
struct Claim {
    ids: Arc<Mutex<HashSet<String>>>,
    id: String,
}

impl Drop for Claim {
    fn drop(&mut self) {
        self.ids.lock().remove(&self.id);
    }
}

// ============================================================================
// EVALUATION
// ============================================================================

type Outcome = Result<FactorReading, FactorError>;

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Evaluate every factor in `snapshot`, waiting at most `timeout` in total.
///
/// Factors listed in `in_flight` are skipped and reported as timed out.
pub fn evaluate_snapshot(
    pass_id: u64,
    trigger: Trigger,
    snapshot: &RegistrySnapshot,
    timeout: Duration,
    in_flight: &InFlight,
) -> AggregationResult {
    let started_at = Utc::now();
    let start = Instant::now();
    let timeout_ms = timeout.as_millis() as u64;

    let ids = snapshot.ids();
    let mut slots: Vec<Option<Outcome>> = vec![None; ids.len()];
    let mut outstanding = 0;
    let (tx, rx) = mpsc::channel::<(usize, Outcome)>();

    for (idx, factor) in snapshot.iter().enumerate() {
        let claim = match in_flight.claim(&ids[idx]) {
            Some(claim) => claim,
            None => {
                log::debug!(
                    "Pass {}: factor '{}' still running from an earlier pass",
                    pass_id,
                    ids[idx]
                );
                slots[idx] = Some(Err(FactorError::Timeout { timeout_ms }));
                continue;
            }
        };
        let factor = Arc::clone(factor);
        let tx = tx.clone();
        let spawned = thread::Builder::new()
            .name(format!("threat-factor-{}", idx))
            .spawn(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| factor.evaluate()))
                    .unwrap_or_else(|payload| Err(FactorError::Panicked(panic_message(&*payload))));
                drop(claim);
                // Receiver is gone when this worker missed the deadline.
                let _ = tx.send((idx, outcome));
            });
        match spawned {
            Ok(_) => outstanding += 1,
            Err(e) => {
                slots[idx] = Some(Err(FactorError::failed(format!("worker spawn failed: {}", e))));
            }
        }
    }
    drop(tx);

    let deadline = start + timeout;
    while outstanding > 0 {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok((idx, outcome)) => {
                if slots[idx].is_none() {
                    slots[idx] = Some(outcome);
                    outstanding -= 1;
                }
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    let mut readings = BTreeMap::new();
    let mut failures = Vec::new();
    for (id, slot) in ids.into_iter().zip(slots) {
        let outcome = slot.unwrap_or(Err(FactorError::Timeout { timeout_ms }));
        match outcome {
            Ok(reading) => {
                log::debug!(
                    "Pass {}: factor '{}' triggered={} level={}",
                    pass_id,
                    id,
                    reading.triggered,
                    reading.level
                );
                readings.insert(id, reading);
            }
            Err(error) => {
                log::warn!("Pass {}: factor '{}' excluded: {}", pass_id, id, error);
                readings.insert(id.clone(), FactorReading::clear());
                failures.push(FactorFailure { factor_id: id, error });
            }
        }
    }

    let overall = overall_level(readings.values());

    AggregationResult {
        pass_id,
        trigger,
        started_at,
        duration_ms: start.elapsed().as_millis() as u64,
        readings,
        failures,
        overall_level: overall,
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::registry::ThreatRegistry;
    use crate::logic::threat::{StaticFactor, ThreatFactor};

    fn registry_with(levels: &[(&str, Option<RiskLevel>)]) -> ThreatRegistry {
        let registry = ThreatRegistry::new();
        for (id, level) in levels {
            let reading = match level {
                Some(level) => FactorReading::triggered(*level),
                None => FactorReading::clear(),
            };
            let factor: Arc<dyn ThreatFactor> = Arc::new(StaticFactor::fixed(*id, reading));
            registry.register(factor).unwrap();
        }
        registry
    }

    #[test]
    fn test_empty_snapshot_is_none() {
        let result = evaluate_snapshot(
            1,
            Trigger::Manual,
            &RegistrySnapshot::default(),
            Duration::from_millis(100),
            &InFlight::new(),
        );
        assert_eq!(result.overall_level, RiskLevel::None);
        assert!(result.readings.is_empty());
        assert!(!result.has_failures());
    }

    #[test]
    fn test_max_of_triggered() {
        let registry = registry_with(&[
            ("a", Some(RiskLevel::Low)),
            ("b", Some(RiskLevel::High)),
            ("c", None),
        ]);
        let result = evaluate_snapshot(
            1,
            Trigger::Manual,
            &registry.snapshot(),
            Duration::from_secs(2),
            &InFlight::new(),
        );
        assert_eq!(result.overall_level, RiskLevel::High);
        assert_eq!(result.triggered_factors(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(result.readings.len(), 3);
    }

    #[test]
    fn test_panicking_factor_is_failure() {
        let registry = registry_with(&[("ok", Some(RiskLevel::Medium))]);
        registry
            .register(Arc::new(StaticFactor::new(
                "boom",
                crate::logic::threat::FactorKind::Custom,
                || -> Result<FactorReading, String> { panic!("probe crashed") },
            )))
            .unwrap();

        let result = evaluate_snapshot(
            7,
            Trigger::Manual,
            &registry.snapshot(),
            Duration::from_secs(2),
            &InFlight::new(),
        );
        assert_eq!(result.overall_level, RiskLevel::Medium);
        assert_eq!(
            result.failure_for("boom"),
            Some(&FactorError::Panicked("probe crashed".to_string()))
        );
        assert!(!result.readings["boom"].triggered);
    }

    #[test]
    fn test_unknown_escalation_helper() {
        let registry = registry_with(&[("ok", Some(RiskLevel::Low))]);
        registry
            .register(Arc::new(StaticFactor::new(
                "offline",
                crate::logic::threat::FactorKind::Identity,
                || -> Result<FactorReading, String> {
                    Err("identity service unreachable".to_string())
                },
            )))
            .unwrap();

        let result = evaluate_snapshot(
            1,
            Trigger::Manual,
            &registry.snapshot(),
            Duration::from_secs(2),
            &InFlight::new(),
        );
        assert_eq!(result.overall_level, RiskLevel::Low);
        assert_eq!(result.level_treating_unknown_as(RiskLevel::High), RiskLevel::High);
        assert!(result.to_json().unwrap().contains("identity service unreachable"));
    }

    #[test]
    fn test_running_factor_not_started_twice() {
        let registry = registry_with(&[("geo-zone", Some(RiskLevel::High))]);
        let in_flight = InFlight::new();
        let held = in_flight.claim("geo-zone").unwrap();
        assert!(in_flight.claim("geo-zone").is_none());

        let result = evaluate_snapshot(
            1,
            Trigger::Timer,
            &registry.snapshot(),
            Duration::from_millis(250),
            &in_flight,
        );
        assert_eq!(result.overall_level, RiskLevel::None);
        assert_eq!(
            result.failure_for("geo-zone"),
            Some(&FactorError::Timeout { timeout_ms: 250 })
        );

        drop(held);
        assert!(in_flight.is_empty());
        let result = evaluate_snapshot(
            2,
            Trigger::Timer,
            &registry.snapshot(),
            Duration::from_secs(2),
            &in_flight,
        );
        assert_eq!(result.overall_level, RiskLevel::High);
        assert!(in_flight.is_empty());
    }

    #[test]
    fn test_id_with_nul_byte_evaluates() {
        let registry = registry_with(&[("geo\0zone", Some(RiskLevel::Medium))]);
        let result = evaluate_snapshot(
            1,
            Trigger::Manual,
            &registry.snapshot(),
            Duration::from_secs(2),
            &InFlight::new(),
        );
        assert_eq!(result.overall_level, RiskLevel::Medium);
        assert!(!result.has_failures());
    }
}
