//! Threat Aggregator
//!
//! Serializes aggregation passes and publishes overall level changes.
//!
//! IDLE -> EVALUATING -> IDLE. A request that arrives while EVALUATING is
//! coalesced: it returns immediately and guarantees exactly one more pass
//! after the in-flight one, however many requests piled up.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use super::pass::{evaluate_snapshot, AggregationResult, InFlight};
use crate::logic::config::EngineConfig;
use crate::logic::error::{ThreatError, ThreatResult};
use crate::logic::events::{ChangeNotifier, ChangeSubscriber, LevelChange, SubscriptionId};
use crate::logic::history::ChangeHistory;
use crate::logic::registry::ThreatRegistry;
use crate::logic::threat::{RiskLevel, ThreatFactor};
use crate::logic::trigger::Trigger;

// ============================================================================
// OUTCOME TYPES
// ============================================================================

/// One pass plus the change it published, if any
#[derive(Debug, Clone, Serialize)]
pub struct PassReport {
    pub result: AggregationResult,
    pub change: Option<LevelChange>,
}

/// Answer to `request_evaluation`
#[derive(Debug, Clone)]
pub enum Evaluation {
    /// This caller ran the passes: its own plus any coalesced follow-ups
    Completed(Vec<PassReport>),
    /// A pass was already in flight; a follow-up pass is scheduled on it
    Coalesced,
}

impl Evaluation {
    pub fn is_coalesced(&self) -> bool {
        matches!(self, Evaluation::Coalesced)
    }

    pub fn reports(&self) -> &[PassReport] {
        match self {
            Evaluation::Completed(reports) => reports,
            Evaluation::Coalesced => &[],
        }
    }
}

#[derive(Debug, Default)]
struct PassState {
    evaluating: bool,
    /// Newest trigger received while evaluating
    pending: Option<Trigger>,
}

/// Puts the state back to IDLE if a pass unwinds, so later requests are
/// not coalesced into a pass that will never finish.
struct PassGuard<'a> {
    state: &'a Mutex<PassState>,
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            let mut state = self.state.lock();
            state.evaluating = false;
            if let Some(trigger) = state.pending.take() {
                log::error!("Pass panicked, coalesced request ({}) dropped", trigger);
            } else {
                log::error!("Pass panicked, engine back to idle");
            }
        }
    }
}

// ============================================================================
// AGGREGATOR
// ============================================================================

pub struct ThreatAggregator {
    config: EngineConfig,
    registry: Arc<ThreatRegistry>,
    notifier: Arc<ChangeNotifier>,
    history: ChangeHistory,
    last_published: RwLock<RiskLevel>,
    last_result: RwLock<Option<AggregationResult>>,
    state: Mutex<PassState>,
    in_flight: InFlight,
    next_pass_id: AtomicU64,
    passes_completed: AtomicU64,
    stopped: AtomicBool,
}

impl ThreatAggregator {
    pub fn new(config: EngineConfig) -> ThreatResult<Self> {
        Self::with_parts(
            config,
            Arc::new(ThreatRegistry::new()),
            Arc::new(ChangeNotifier::new()),
        )
    }

    /// Build around a registry/notifier shared with other owners
    pub fn with_parts(
        config: EngineConfig,
        registry: Arc<ThreatRegistry>,
        notifier: Arc<ChangeNotifier>,
    ) -> ThreatResult<Self> {
        config.validate()?;
        log::info!(
            "Threat aggregator ready (factor timeout {} ms, history {})",
            config.factor_timeout_ms,
            config.history_capacity
        );
        Ok(Self {
            history: ChangeHistory::new(config.history_capacity),
            config,
            registry,
            notifier,
            last_published: RwLock::new(RiskLevel::None),
            last_result: RwLock::new(None),
            state: Mutex::new(PassState::default()),
            in_flight: InFlight::new(),
            next_pass_id: AtomicU64::new(0),
            passes_completed: AtomicU64::new(0),
            stopped: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ThreatRegistry> {
        &self.registry
    }

    pub fn notifier(&self) -> &Arc<ChangeNotifier> {
        &self.notifier
    }

    pub fn history(&self) -> &ChangeHistory {
        &self.history
    }

    /// Shortcut for `registry().register`
    pub fn register(&self, factor: Arc<dyn ThreatFactor>) -> ThreatResult<bool> {
        self.registry.register(factor)
    }

    /// Shortcut for `registry().unregister`
    pub fn unregister(&self, id: &str) -> bool {
        self.registry.unregister(id)
    }

    /// Shortcut for `notifier().subscribe`
    pub fn subscribe(&self, subscriber: impl ChangeSubscriber + 'static) -> SubscriptionId {
        self.notifier.subscribe(subscriber)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.notifier.unsubscribe(id)
    }

    /// Last published level. Never runs a pass.
    pub fn overall_threat_level(&self) -> RiskLevel {
        *self.last_published.read()
    }

    /// Result of the most recent completed pass
    pub fn last_result(&self) -> Option<AggregationResult> {
        self.last_result.read().clone()
    }

    pub fn passes_completed(&self) -> u64 {
        self.passes_completed.load(Ordering::SeqCst)
    }

    pub fn is_evaluating(&self) -> bool {
        self.state.lock().evaluating
    }

    /// Ids of factors whose worker has not returned yet, sorted
    pub fn factors_in_flight(&self) -> Vec<String> {
        self.in_flight.ids()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Refuse further requests. Factor workers still running are left behind.
    pub fn shutdown(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            log::info!(
                "Threat aggregator stopped after {} passes (level {})",
                self.passes_completed(),
                self.overall_threat_level()
            );
        }
    }

    /// Run a pass now, or coalesce into the one in flight.
    ///
    /// The caller that starts a pass also runs any follow-up pass requested
    /// while it was busy, so the call returns only once the engine is IDLE
    /// again (or another caller has taken over).
    pub fn request_evaluation(&self, trigger: Trigger) -> ThreatResult<Evaluation> {
        if self.is_stopped() {
            return Err(ThreatError::EngineStopped);
        }

        {
            let mut state = self.state.lock();
            if state.evaluating {
                state.pending = Some(trigger);
                log::debug!("Re-evaluation ({}) coalesced into in-flight pass", trigger);
                return Ok(Evaluation::Coalesced);
            }
            state.evaluating = true;
        }

        let _guard = PassGuard { state: &self.state };
        let mut reports = Vec::new();
        let mut trigger = trigger;
        loop {
            if self.is_stopped() {
                let mut state = self.state.lock();
                state.evaluating = false;
                state.pending = None;
                break;
            }

            reports.push(self.run_pass(trigger));

            let mut state = self.state.lock();
            match state.pending.take() {
                Some(next) => trigger = next,
                None => {
                    state.evaluating = false;
                    break;
                }
            }
        }

        Ok(Evaluation::Completed(reports))
    }

    fn run_pass(&self, trigger: Trigger) -> PassReport {
        let pass_id = self.next_pass_id.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = self.registry.snapshot();
        log::debug!(
            "Pass {} started ({}), {} factor(s)",
            pass_id,
            trigger,
            snapshot.len()
        );

        let result = evaluate_snapshot(
            pass_id,
            trigger,
            &snapshot,
            self.config.factor_timeout(),
            &self.in_flight,
        );

        let change = {
            let mut last = self.last_published.write();
            if *last == result.overall_level {
                None
            } else {
                let previous = *last;
                *last = result.overall_level;
                Some(LevelChange::new(
                    pass_id,
                    previous,
                    result.overall_level,
                    trigger,
                    result.triggered_factors(),
                ))
            }
        };

        if let Some(change) = &change {
            self.history.record(change.clone());
            let delivered = self.notifier.publish(change);
            log::info!(
                "Threat level {} -> {} (pass {}, {} subscriber(s))",
                change.previous,
                change.current,
                pass_id,
                delivered
            );
        }

        if result.has_failures() {
            log::warn!(
                "Pass {} finished with {} failed factor(s)",
                pass_id,
                result.failures.len()
            );
        }

        *self.last_result.write() = Some(result.clone());
        self.passes_completed.fetch_add(1, Ordering::SeqCst);

        PassReport { result, change }
    }
}

impl Drop for ThreatAggregator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{self, AssertUnwindSafe};

    #[test]
    fn test_pass_guard_resets_state_on_panic() {
        let state = Mutex::new(PassState {
            evaluating: true,
            pending: Some(Trigger::Timer),
        });

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let _guard = PassGuard { state: &state };
            panic!("pass blew up");
        }));
        assert!(outcome.is_err());

        let state = state.lock();
        assert!(!state.evaluating);
        assert!(state.pending.is_none());
    }

    #[test]
    fn test_pass_guard_idle_on_normal_exit() {
        let state = Mutex::new(PassState {
            evaluating: true,
            pending: None,
        });
        {
            let _guard = PassGuard { state: &state };
        }
        // Normal exit leaves the state to request_evaluation.
        assert!(state.lock().evaluating);
    }
}
