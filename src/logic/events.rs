//! Change Notifier - Typed Threat Level Events
//!
//! Publish/subscribe channel for overall level changes. Every subscriber
//! registered when `publish` starts gets exactly one delivery per change.
//! The subscriber list is copied before dispatch, so callbacks may
//! subscribe or unsubscribe freely.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::logic::threat::RiskLevel;
use crate::logic::trigger::Trigger;

/// Event names
pub mod names {
    pub const THREAT_LEVEL_CHANGED: &str = "threat-level:changed";
}

// ============================================================================
// CHANGE RECORD
// ============================================================================

/// One published change of the overall level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelChange {
    pub event_id: Uuid,
    pub pass_id: u64,
    pub previous: RiskLevel,
    pub current: RiskLevel,
    pub changed_at: DateTime<Utc>,
    pub trigger: Trigger,
    /// Ids of factors triggered in the pass that produced `current`
    pub triggered_factors: Vec<String>,
}

impl LevelChange {
    pub fn new(
        pass_id: u64,
        previous: RiskLevel,
        current: RiskLevel,
        trigger: Trigger,
        triggered_factors: Vec<String>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            pass_id,
            previous,
            current,
            changed_at: Utc::now(),
            trigger,
            triggered_factors,
        }
    }

    pub fn is_escalation(&self) -> bool {
        self.current > self.previous
    }

    pub fn event_name(&self) -> &'static str {
        names::THREAT_LEVEL_CHANGED
    }
}

// ============================================================================
// SUBSCRIBERS
// ============================================================================

/// Receiver of level changes. Any `Fn(&LevelChange)` closure qualifies.
pub trait ChangeSubscriber: Send + Sync {
    fn on_change(&self, change: &LevelChange);
}

impl<F> ChangeSubscriber for F
where
    F: Fn(&LevelChange) + Send + Sync,
{
    fn on_change(&self, change: &LevelChange) {
        self(change)
    }
}

/// Logs every change; rising levels at warn, rising to HIGH or above at error
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSubscriber;

impl ChangeSubscriber for LogSubscriber {
    fn on_change(&self, change: &LevelChange) {
        if change.is_escalation() && change.current.is_high() {
            log::error!(
                "[THREAT LEVEL] {} -> {} (pass {}, trigger {}, factors: {:?})",
                change.previous,
                change.current,
                change.pass_id,
                change.trigger,
                change.triggered_factors
            );
        } else if change.is_escalation() {
            log::warn!(
                "[THREAT LEVEL] {} -> {} (pass {}, trigger {}, factors: {:?})",
                change.previous,
                change.current,
                change.pass_id,
                change.trigger,
                change.triggered_factors
            );
        } else {
            log::info!(
                "[THREAT LEVEL] {} -> {} (pass {}, trigger {})",
                change.previous,
                change.current,
                change.pass_id,
                change.trigger
            );
        }
    }
}

/// Forwards changes into an mpsc channel
struct ChannelSubscriber {
    sender: Mutex<Sender<LevelChange>>,
}

impl ChangeSubscriber for ChannelSubscriber {
    fn on_change(&self, change: &LevelChange) {
        if self.sender.lock().send(change.clone()).is_err() {
            log::debug!("Change receiver dropped, event {} discarded", change.event_id);
        }
    }
}

/// Opaque subscription handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(Uuid);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// NOTIFIER
// ============================================================================

#[derive(Default)]
pub struct ChangeNotifier {
    subscribers: RwLock<Vec<(SubscriptionId, Arc<dyn ChangeSubscriber>)>>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, subscriber: impl ChangeSubscriber + 'static) -> SubscriptionId {
        self.subscribe_arc(Arc::new(subscriber))
    }

    pub fn subscribe_arc(&self, subscriber: Arc<dyn ChangeSubscriber>) -> SubscriptionId {
        let id = SubscriptionId(Uuid::new_v4());
        self.subscribers.write().push((id, subscriber));
        log::debug!("Change subscriber {} added", id);
        id
    }

    /// Subscribe with a channel instead of a callback
    pub fn subscribe_channel(&self) -> (SubscriptionId, Receiver<LevelChange>) {
        let (tx, rx) = mpsc::channel();
        let id = self.subscribe(ChannelSubscriber {
            sender: Mutex::new(tx),
        });
        (id, rx)
    }

    /// Returns false if the handle was unknown
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut guard = self.subscribers.write();
        let before = guard.len();
        guard.retain(|(sub_id, _)| *sub_id != id);
        let removed = guard.len() != before;
        if removed {
            log::debug!("Change subscriber {} removed", id);
        }
        removed
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Deliver `change` to every current subscriber. Returns the number of
    /// subscribers that handled it without panicking.
    pub fn publish(&self, change: &LevelChange) -> usize {
        // Copy out so callbacks can (un)subscribe without deadlocking.
        let targets: Vec<(SubscriptionId, Arc<dyn ChangeSubscriber>)> =
            self.subscribers.read().clone();

        let mut delivered = 0;
        for (id, subscriber) in targets {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| subscriber.on_change(change)));
            match outcome {
                Ok(()) => delivered += 1,
                Err(_) => log::error!(
                    "Subscriber {} panicked handling event {}",
                    id,
                    change.event_id
                ),
            }
        }
        delivered
    }
}

// ============================================================================
// TESTS
// ============================================================================
