//! Threat Rules & Default Risks
//!
//! The combination rule plus the default risk assigned to each
//! built-in sub-check. Factors read these; the aggregator only uses
//! `overall_level`.

use serde::{Deserialize, Serialize};

use super::types::{FactorReading, RiskLevel};

// ============================================================================
// DEFAULT SUB-CHECK RISKS (fixed at compile time)
// ============================================================================

/// Device rooted / jailbroken / attached to a debugger
pub const COMPROMISED_DEVICE_RISK: RiskLevel = RiskLevel::High;

/// No screen lock (PIN, passcode) configured
pub const SCREEN_LOCK_RISK: RiskLevel = RiskLevel::Medium;

/// Platform device attestation failed (boot chain not trusted)
pub const ATTESTATION_RISK: RiskLevel = RiskLevel::High;

/// OS version is on the restricted list
pub const DEVICE_OS_RISK: RiskLevel = RiskLevel::Medium;

/// Device model is on the restricted list
pub const DEVICE_MODEL_RISK: RiskLevel = RiskLevel::Medium;

/// At least one untrusted developer certificate installed
pub const UNTRUSTED_DEVELOPER_RISK: RiskLevel = RiskLevel::High;

// ============================================================================
// COMBINATION RULE
// ============================================================================

/// Max of the triggered levels, NONE when nothing is triggered.
///
/// Max is commutative and associative, so reading order never matters.
pub fn overall_level<'a, I>(readings: I) -> RiskLevel
where
    I: IntoIterator<Item = &'a FactorReading>,
{
    readings
        .into_iter()
        .map(FactorReading::effective_level)
        .fold(RiskLevel::None, RiskLevel::combine)
}

// ============================================================================
// CONFIGURABLE RISKS (for per-policy adjustment)
// ============================================================================

/// Risk per device-security sub-check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSecurityRisks {
    pub compromised: RiskLevel,
    pub no_screen_lock: RiskLevel,
    pub attestation_failed: RiskLevel,
}

impl Default for DeviceSecurityRisks {
    fn default() -> Self {
        Self {
            compromised: COMPROMISED_DEVICE_RISK,
            no_screen_lock: SCREEN_LOCK_RISK,
            attestation_failed: ATTESTATION_RISK,
        }
    }
}

/// Risk per device-software sub-check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSoftwareRisks {
    pub os_restricted: RiskLevel,
    pub model_restricted: RiskLevel,
}

impl Default for DeviceSoftwareRisks {
    fn default() -> Self {
        Self {
            os_restricted: DEVICE_OS_RISK,
            model_restricted: DEVICE_MODEL_RISK,
        }
    }
}

impl DeviceSecurityRisks {
    /// One level above the defaults for every sub-check
    pub fn strict() -> Self {
        Self {
            compromised: RiskLevel::Critical,
            no_screen_lock: RiskLevel::High,
            attestation_failed: RiskLevel::Critical,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overall_empty_is_none() {
        assert_eq!(overall_level(&Vec::<FactorReading>::new()), RiskLevel::None);
    }

    #[test]
    fn test_overall_ignores_untriggered() {
        let readings = vec![
            FactorReading::new(false, RiskLevel::Critical),
            FactorReading::triggered(RiskLevel::Low),
        ];
        assert_eq!(overall_level(&readings), RiskLevel::Low);
    }

    #[test]
    fn test_overall_is_order_independent() {
        let mut readings = vec![
            FactorReading::triggered(RiskLevel::Medium),
            FactorReading::triggered(RiskLevel::High),
            FactorReading::triggered(RiskLevel::Low),
            FactorReading::clear(),
        ];
        let forward = overall_level(&readings);
        readings.reverse();
        assert_eq!(forward, RiskLevel::High);
        assert_eq!(overall_level(&readings), forward);
        readings.rotate_left(2);
        assert_eq!(overall_level(&readings), forward);
    }

    #[test]
    fn test_default_risks() {
        let sec = DeviceSecurityRisks::default();
        assert_eq!(sec.compromised, RiskLevel::High);
        assert_eq!(sec.no_screen_lock, RiskLevel::Medium);
        assert_eq!(DeviceSoftwareRisks::default().os_restricted, RiskLevel::Medium);
        assert_eq!(DeviceSecurityRisks::strict().compromised, RiskLevel::Critical);
    }
}
