//! Built-in Threat Factors
//!
//! Device security, device software, untrusted developer certificates,
//! and a generic factor for categories that report a level directly
//! (geo-zone, identity).
//!
//! Each factor maps probe output to a `FactorReading`; a probe error
//! becomes `FactorError::Failed`.

use serde::{Deserialize, Serialize};

use super::factor::{Probe, ThreatFactor};
use super::rules::{DeviceSecurityRisks, DeviceSoftwareRisks, UNTRUSTED_DEVELOPER_RISK};
use super::types::{FactorKind, FactorReading, RiskLevel};
use crate::logic::error::FactorError;

/// Fold one sub-check into a reading
fn apply_check(reading: &mut FactorReading, fired: bool, risk: RiskLevel, detail: &str) {
    if !fired {
        return;
    }
    reading.triggered = true;
    reading.level = reading.level.combine(risk);
    reading.details.push(format!("{} ({})", detail, risk));
}

// ============================================================================
// DEVICE SECURITY
// ============================================================================

/// Raw device integrity state from the platform
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSecurityStatus {
    /// Rooted, jailbroken, or attached to a debugger
    pub compromised: bool,
    pub screen_lock_enabled: bool,
    pub attestation_failed: bool,
}

pub struct DeviceSecurity {
    id: String,
    probe: Box<dyn Probe<DeviceSecurityStatus>>,
    risks: DeviceSecurityRisks,
}

impl DeviceSecurity {
    pub fn new(probe: impl Probe<DeviceSecurityStatus> + 'static) -> Self {
        Self {
            id: FactorKind::DeviceSecurity.default_id().to_string(),
            probe: Box::new(probe),
            risks: DeviceSecurityRisks::default(),
        }
    }

    pub fn with_risks(mut self, risks: DeviceSecurityRisks) -> Self {
        self.risks = risks;
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Map a status snapshot to a reading
    pub fn assess(&self, status: &DeviceSecurityStatus) -> FactorReading {
        let mut reading = FactorReading::clear();
        apply_check(&mut reading, status.compromised, self.risks.compromised, "device compromised");
        apply_check(
            &mut reading,
            !status.screen_lock_enabled,
            self.risks.no_screen_lock,
            "screen lock disabled",
        );
        apply_check(
            &mut reading,
            status.attestation_failed,
            self.risks.attestation_failed,
            "device attestation failed",
        );
        reading
    }
}

impl ThreatFactor for DeviceSecurity {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> FactorKind {
        FactorKind::DeviceSecurity
    }

    fn evaluate(&self) -> Result<FactorReading, FactorError> {
        let status = self.probe.read().map_err(FactorError::Failed)?;
        Ok(self.assess(&status))
    }
}

// ============================================================================
// DEVICE SOFTWARE
// ============================================================================

/// OS / model restriction state from the platform
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSoftwareStatus {
    pub os_restricted: bool,
    pub model_restricted: bool,
}

pub struct DeviceSoftware {
    id: String,
    probe: Box<dyn Probe<DeviceSoftwareStatus>>,
    risks: DeviceSoftwareRisks,
}

impl DeviceSoftware {
    pub fn new(probe: impl Probe<DeviceSoftwareStatus> + 'static) -> Self {
        Self {
            id: FactorKind::DeviceSoftware.default_id().to_string(),
            probe: Box::new(probe),
            risks: DeviceSoftwareRisks::default(),
        }
    }

    pub fn with_risks(mut self, risks: DeviceSoftwareRisks) -> Self {
        self.risks = risks;
        self
    }

    pub fn assess(&self, status: &DeviceSoftwareStatus) -> FactorReading {
        let mut reading = FactorReading::clear();
        apply_check(&mut reading, status.os_restricted, self.risks.os_restricted, "OS version restricted");
        apply_check(
            &mut reading,
            status.model_restricted,
            self.risks.model_restricted,
            "device model restricted",
        );
        reading
    }
}

impl ThreatFactor for DeviceSoftware {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> FactorKind {
        FactorKind::DeviceSoftware
    }

    fn evaluate(&self) -> Result<FactorReading, FactorError> {
        let status = self.probe.read().map_err(FactorError::Failed)?;
        Ok(self.assess(&status))
    }
}

// ============================================================================
// UNTRUSTED DEVELOPER
// ============================================================================

/// Triggered while any untrusted developer certificate is installed.
/// The probe returns the certificate developer names.
pub struct UntrustedDeveloper {
    id: String,
    probe: Box<dyn Probe<Vec<String>>>,
    risk: RiskLevel,
}

impl UntrustedDeveloper {
    pub fn new(probe: impl Probe<Vec<String>> + 'static) -> Self {
        Self {
            id: FactorKind::UntrustedDeveloper.default_id().to_string(),
            probe: Box::new(probe),
            risk: UNTRUSTED_DEVELOPER_RISK,
        }
    }

    pub fn with_risk(mut self, risk: RiskLevel) -> Self {
        self.risk = risk;
        self
    }

    pub fn assess(&self, developers: &[String]) -> FactorReading {
        if developers.is_empty() {
            return FactorReading::clear();
        }
        let mut reading = FactorReading::triggered(self.risk)
            .with_detail(format!("{} untrusted developer(s) detected", developers.len()));
        reading.details.extend(developers.iter().cloned());
        reading
    }
}

impl ThreatFactor for UntrustedDeveloper {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> FactorKind {
        FactorKind::UntrustedDeveloper
    }

    fn evaluate(&self) -> Result<FactorReading, FactorError> {
        let developers = self.probe.read().map_err(FactorError::Failed)?;
        Ok(self.assess(&developers))
    }
}

// ============================================================================
// STATIC FACTOR (geo-zone, identity, custom)
// ============================================================================

/// Factor whose probe already produces a `(triggered, level)` reading.
pub struct StaticFactor {
    id: String,
    kind: FactorKind,
    probe: Box<dyn Probe<FactorReading>>,
}

impl StaticFactor {
    pub fn new(
        id: impl Into<String>,
        kind: FactorKind,
        probe: impl Probe<FactorReading> + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            probe: Box::new(probe),
        }
    }

    /// Always reports the same reading
    pub fn fixed(id: impl Into<String>, reading: FactorReading) -> Self {
        Self::new(id, FactorKind::Custom, move || Ok(reading.clone()))
    }

    pub fn geo_zone(probe: impl Probe<FactorReading> + 'static) -> Self {
        Self::new(FactorKind::GeoZone.default_id(), FactorKind::GeoZone, probe)
    }

    pub fn identity(probe: impl Probe<FactorReading> + 'static) -> Self {
        Self::new(FactorKind::Identity.default_id(), FactorKind::Identity, probe)
    }
}

impl ThreatFactor for StaticFactor {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> FactorKind {
        self.kind
    }

    fn evaluate(&self) -> Result<FactorReading, FactorError> {
        self.probe.read().map_err(FactorError::Failed)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn secure_device() -> DeviceSecurityStatus {
        DeviceSecurityStatus {
            compromised: false,
            screen_lock_enabled: true,
            attestation_failed: false,
        }
    }

    #[test]
    fn test_device_security_clean() {
        let factor = DeviceSecurity::new(|| Ok(secure_device()));
        let reading = factor.evaluate().unwrap();
        assert!(!reading.triggered);
        assert_eq!(reading.effective_level(), RiskLevel::None);
        assert_eq!(factor.id(), "device-security");
    }

    #[test]
    fn test_device_security_takes_worst_subcheck() {
        let factor = DeviceSecurity::new(|| {
            Ok(DeviceSecurityStatus {
                compromised: true,
                screen_lock_enabled: false,
                attestation_failed: false,
            })
        });
        let reading = factor.evaluate().unwrap();
        assert!(reading.triggered);
        assert_eq!(reading.level, RiskLevel::High);
        assert_eq!(reading.details.len(), 2);
    }

    #[test]
    fn test_missing_screen_lock_is_medium() {
        let factor = DeviceSecurity::new(|| {
            Ok(DeviceSecurityStatus {
                screen_lock_enabled: false,
                ..secure_device()
            })
        });
        assert_eq!(factor.evaluate().unwrap().level, RiskLevel::Medium);

        let strict = DeviceSecurity::new(|| Ok(DeviceSecurityStatus::default()))
            .with_risks(DeviceSecurityRisks::strict());
        assert_eq!(strict.evaluate().unwrap().level, RiskLevel::High);
    }

    #[test]
    fn test_probe_error_is_failure() {
        let factor = DeviceSoftware::new(|| -> Result<DeviceSoftwareStatus, String> {
            Err("probe offline".to_string())
        });
        assert_eq!(
            factor.evaluate(),
            Err(FactorError::Failed("probe offline".to_string()))
        );
    }

    #[test]
    fn test_device_software_restrictions() {
        let factor = DeviceSoftware::new(|| {
            Ok(DeviceSoftwareStatus {
                os_restricted: true,
                model_restricted: false,
            })
        })
        .with_risks(DeviceSoftwareRisks {
            os_restricted: RiskLevel::Critical,
            model_restricted: RiskLevel::Low,
        });
        let reading = factor.evaluate().unwrap();
        assert!(reading.triggered);
        assert_eq!(reading.level, RiskLevel::Critical);
        assert_eq!(factor.kind(), FactorKind::DeviceSoftware);
    }

    #[test]
    fn test_untrusted_developer_lists_names() {
        let factor = UntrustedDeveloper::new(|| {
            Ok(vec!["Acme Sideload Ltd".to_string(), "QA Team".to_string()])
        });
        let reading = factor.evaluate().unwrap();
        assert!(reading.triggered);
        assert_eq!(reading.level, RiskLevel::High);
        assert_eq!(reading.details[0], "2 untrusted developer(s) detected");
        assert!(reading.details.contains(&"QA Team".to_string()));

        let none = UntrustedDeveloper::new(|| Ok(Vec::<String>::new()));
        assert!(!none.evaluate().unwrap().triggered);
    }

    #[test]
    fn test_static_factor_variants() {
        let geo = StaticFactor::geo_zone(|| Ok(FactorReading::triggered(RiskLevel::Low)));
        assert_eq!(geo.id(), "geo-zone");
        assert_eq!(geo.kind(), FactorKind::GeoZone);
        assert_eq!(geo.evaluate().unwrap().level, RiskLevel::Low);

        let fixed = StaticFactor::fixed("identity", FactorReading::clear());
        assert!(!fixed.evaluate().unwrap().triggered);
        assert!(!fixed.evaluate().unwrap().triggered);
    }
}
