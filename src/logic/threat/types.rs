//! Threat Types
//!
//! Core types for risk judgments.
//! No aggregation logic here - only data structures.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::logic::error::ThreatError;

// ============================================================================
// RISK LEVEL
// ============================================================================

/// Ordered severity of a detected condition.
///
/// Variant order is the risk order; `Ord` is derived from it and must never change.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    #[default]
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// All levels, lowest first
    pub const ALL: [RiskLevel; 5] = [
        RiskLevel::None,
        RiskLevel::Low,
        RiskLevel::Medium,
        RiskLevel::High,
        RiskLevel::Critical,
    ];

    /// Stable wire label
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::None => "NONE",
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        }
    }

    pub fn ordinal(&self) -> u8 {
        *self as u8
    }

    /// Max-combination of two levels
    pub fn combine(self, other: RiskLevel) -> RiskLevel {
        self.max(other)
    }

    pub fn is_none(&self) -> bool {
        matches!(self, RiskLevel::None)
    }

    pub fn is_high(&self) -> bool {
        matches!(self, RiskLevel::High | RiskLevel::Critical)
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = ThreatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RiskLevel::ALL
            .iter()
            .copied()
            .find(|level| level.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ThreatError::UnknownLevel(s.to_string()))
    }
}

// ============================================================================
// FACTOR KIND
// ============================================================================

/// Risk category a factor evaluates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorKind {
    DeviceSecurity,
    DeviceSoftware,
    UntrustedDeveloper,
    GeoZone,
    Identity,
    Custom,
}

impl FactorKind {
    /// Conventional registry key for the built-in categories
    pub fn default_id(&self) -> &'static str {
        match self {
            FactorKind::DeviceSecurity => "device-security",
            FactorKind::DeviceSoftware => "device-software",
            FactorKind::UntrustedDeveloper => "untrusted-developer",
            FactorKind::GeoZone => "geo-zone",
            FactorKind::Identity => "identity",
            FactorKind::Custom => "custom",
        }
    }
}

impl fmt::Display for FactorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.default_id())
    }
}

// ============================================================================
// FACTOR READING
// ============================================================================

/// Output of one `ThreatFactor::evaluate` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactorReading {
    pub triggered: bool,
    pub level: RiskLevel,
    /// Human-readable notes (which sub-check fired, offending names, ...)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

impl Default for FactorReading {
    fn default() -> Self {
        Self::clear()
    }
}

impl FactorReading {
    /// Not triggered
    pub fn clear() -> Self {
        Self {
            triggered: false,
            level: RiskLevel::None,
            details: vec![],
        }
    }

    pub fn triggered(level: RiskLevel) -> Self {
        Self {
            triggered: true,
            level,
            details: vec![],
        }
    }

    pub fn new(triggered: bool, level: RiskLevel) -> Self {
        Self {
            triggered,
            level,
            details: vec![],
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.details.push(detail.into());
        self
    }

    /// Level the aggregator counts: the reported level only when triggered.
    pub fn effective_level(&self) -> RiskLevel {
        if self.triggered {
            self.level
        } else {
            RiskLevel::None
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
