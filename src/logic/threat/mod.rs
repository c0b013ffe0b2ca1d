//! Threat Module
//!
//! Risk model and evaluator contract.
//!
//! ## Structure
//! - `types`: Core types (RiskLevel, FactorKind, FactorReading)
//! - `rules`: Combination rule and default sub-check risks
//! - `factor`: `ThreatFactor` trait and `Probe` hook
//! - `factors`: Built-in factors (device security/software, untrusted developer, static)
//!
//! ## Usage
//! ```ignore
//! use threat_level_core::logic::threat::{DeviceSecurity, DeviceSecurityStatus, ThreatFactor};
//!
//! let factor = DeviceSecurity::new(|| Ok(platform::read_device_status()));
//! let reading = factor.evaluate()?;
//! if reading.triggered {
//!     println!("{} at {}", factor.id(), reading.level);
//! }
//! ```

pub mod types;
pub mod rules;
pub mod factor;
pub mod factors;

pub use types::{FactorKind, FactorReading, RiskLevel};

pub use rules::{overall_level, DeviceSecurityRisks, DeviceSoftwareRisks};

pub use factor::{Probe, ThreatFactor};

pub use factors::{
    DeviceSecurity,
    DeviceSecurityStatus,
    DeviceSoftware,
    DeviceSoftwareStatus,
    StaticFactor,
    UntrustedDeveloper,
};
