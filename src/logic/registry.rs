//! Threat Registry
//!
//! Set of active factors keyed by identifier. Membership changes at
//! runtime (per policy); every aggregation pass works on a `snapshot()`
//! so a concurrent register/unregister never shows up mid-pass.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::logic::error::{ThreatError, ThreatResult};
use crate::logic::threat::ThreatFactor;

/// Frozen view of the registry at one instant, sorted by factor id.
#[derive(Clone, Default)]
pub struct RegistrySnapshot {
    factors: Vec<Arc<dyn ThreatFactor>>,
}

impl RegistrySnapshot {
    pub fn len(&self) -> usize {
        self.factors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ThreatFactor>> {
        self.factors.iter()
    }

    pub fn ids(&self) -> Vec<String> {
        self.factors.iter().map(|f| f.id().to_string()).collect()
    }
}

impl std::fmt::Debug for RegistrySnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrySnapshot")
            .field("factors", &self.ids())
            .finish()
    }
}

#[derive(Default)]
pub struct ThreatRegistry {
    factors: RwLock<HashMap<String, Arc<dyn ThreatFactor>>>,
}

impl ThreatRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace by `factor.id()`.
    ///
    /// Blank identifiers are rejected and leave the registry untouched.
    /// Returns true when an existing factor was replaced.
    pub fn register(&self, factor: Arc<dyn ThreatFactor>) -> ThreatResult<bool> {
        let id = factor.id().to_string();
        if id.trim().is_empty() {
            log::warn!("Rejected factor registration with blank id");
            return Err(ThreatError::InvalidIdentifier(id));
        }

        let replaced = self.factors.write().insert(id.clone(), factor).is_some();
        if replaced {
            log::info!("Threat factor '{}' replaced", id);
        } else {
            log::info!("Threat factor '{}' registered", id);
        }
        Ok(replaced)
    }

    /// Remove if present. Absent ids are a no-op; returns whether anything was removed.
    pub fn unregister(&self, id: &str) -> bool {
        let removed = self.factors.write().remove(id).is_some();
        if removed {
            log::info!("Threat factor '{}' unregistered", id);
        }
        removed
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        let mut factors: Vec<Arc<dyn ThreatFactor>> =
            self.factors.read().values().cloned().collect();
        factors.sort_by(|a, b| a.id().cmp(b.id()));
        RegistrySnapshot { factors }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.factors.read().contains_key(id)
    }

    /// Registered ids, sorted
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.factors.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.factors.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.factors.read().is_empty()
    }

    pub fn clear(&self) {
        let mut guard = self.factors.write();
        let count = guard.len();
        guard.clear();
        log::info!("Threat registry cleared ({} factors)", count);
    }
}

// ============================================================================
// TESTS
// ============================================================================
