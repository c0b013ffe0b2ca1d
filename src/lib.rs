//! Threat Level Core
//!
//! Combines independent device risk factors (device security, device
//! software, untrusted developer certificates, geo-zone, identity) into a
//! single overall `RiskLevel` and publishes a `LevelChange` whenever that
//! level moves.
//!
//! Detection itself is platform code: each factor wraps a probe and the
//! engine only calls `ThreatFactor::evaluate`.

pub mod constants;
pub mod logic;

pub use logic::aggregator::{AggregationResult, Evaluation, FactorFailure, PassReport, ThreatAggregator};
pub use logic::threat::{
    DeviceSecurity, DeviceSecurityStatus, DeviceSoftware, DeviceSoftwareStatus, FactorKind,
    FactorReading, Probe, RiskLevel, StaticFactor, ThreatFactor, UntrustedDeveloper,
};
pub use logic::{
    spawn_periodic, ChangeNotifier, ChangeSubscriber, EngineConfig, FactorError, LevelChange,
    LifecycleEvent, LogSubscriber, SubscriptionId, ThreatError, ThreatRegistry, ThreatResult,
    Trigger,
};
