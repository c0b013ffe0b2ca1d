//! Re-evaluation Triggers
//!
//! Why a pass was requested, plus the periodic timer loop that keeps
//! the published level fresh without a caller asking.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::logic::aggregator::{Evaluation, ThreatAggregator};
use crate::logic::error::{ThreatError, ThreatResult};

/// Sleep granularity of the timer loop; bounds how long `stop()` waits
const TICK: Duration = Duration::from_millis(50);

// ============================================================================
// TRIGGER
// ============================================================================

/// App lifecycle transitions that warrant a re-check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEvent {
    Launched,
    Foregrounded,
    Backgrounded,
    Authorized,
}

/// Reason a pass was requested. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "event")]
pub enum Trigger {
    Manual,
    Timer,
    Lifecycle(LifecycleEvent),
    /// Remote policy settings changed
    PolicyUpdate,
    RegistryChanged,
}

impl Trigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trigger::Manual => "manual",
            Trigger::Timer => "timer",
            Trigger::Lifecycle(_) => "lifecycle",
            Trigger::PolicyUpdate => "policy_update",
            Trigger::RegistryChanged => "registry_changed",
        }
    }
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trigger::Lifecycle(event) => write!(f, "lifecycle:{:?}", event),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

// ============================================================================
// PERIODIC LOOP
// ============================================================================

/// Handle to a running timer loop. Dropping it stops the loop.
pub struct PeriodicHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl PeriodicHandle {
    pub fn is_running(&self) -> bool {
        self.thread
            .as_ref()
            .map(|t| !t.is_finished())
            .unwrap_or(false)
    }

    /// Signal the loop and wait for it to exit
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("Threat timer thread panicked");
            }
        }
    }
}

impl Drop for PeriodicHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Request a `Trigger::Timer` pass every `interval` until stopped or the
/// aggregator shuts down. The first pass runs after one full interval.
pub fn spawn_periodic(
    aggregator: Arc<ThreatAggregator>,
    interval: Duration,
) -> ThreatResult<PeriodicHandle> {
    if interval.is_zero() {
        return Err(ThreatError::InvalidConfig(
            "re-evaluation interval must be > 0".to_string(),
        ));
    }

    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = Arc::clone(&stop);

    let thread = thread::Builder::new()
        .name("threat-timer".to_string())
        .spawn(move || {
            log::info!("Threat timer started (every {:?})", interval);
            let mut next = Instant::now() + interval;
            while !stop_flag.load(Ordering::SeqCst) {
                if Instant::now() < next {
                    thread::sleep(TICK.min(next.saturating_duration_since(Instant::now())));
                    continue;
                }
                next = Instant::now() + interval;

                match aggregator.request_evaluation(Trigger::Timer) {
                    Ok(Evaluation::Completed(reports)) => {
                        log::debug!("Timer pass finished ({} pass(es))", reports.len());
                    }
                    Ok(Evaluation::Coalesced) => {
                        log::debug!("Timer request coalesced into in-flight pass");
                    }
                    Err(ThreatError::EngineStopped) => break,
                    Err(e) => log::warn!("Timer re-evaluation failed: {}", e),
                }
            }
            log::info!("Threat timer stopped");
        })?;

    Ok(PeriodicHandle {
        stop,
        thread: Some(thread),
    })
}

// ============================================================================
// TESTS
// ============================================================================
