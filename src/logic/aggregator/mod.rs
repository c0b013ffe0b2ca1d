//! Aggregator Module
//!
//! Combines every registered factor into one overall risk level and
//! publishes a change event when that level moves.
//!
//! ## Structure
//! - `pass`: One fan-out/fan-in evaluation of a registry snapshot
//! - `engine`: `ThreatAggregator` - pass serialization, coalescing, change detection
//!
//! ## Usage
//! ```ignore
//! use std::sync::Arc;
//! use threat_level_core::logic::aggregator::ThreatAggregator;
//! use threat_level_core::logic::{EngineConfig, LogSubscriber, Trigger};
//!
//! let aggregator = Arc::new(ThreatAggregator::new(EngineConfig::from_env())?);
//! aggregator.register(Arc::new(device_security))?;
//! aggregator.subscribe(LogSubscriber);
//! aggregator.request_evaluation(Trigger::Manual)?;
//! println!("{}", aggregator.overall_threat_level());
//! ```

pub mod pass;
pub mod engine;


pub use pass::{evaluate_snapshot, AggregationResult, FactorFailure, InFlight};

pub use engine::{Evaluation, PassReport, ThreatAggregator};
