//! Logic Module - Risk Model & Aggregation Engine
//!
//! ## Structure
//! - `threat/` - Risk levels, factor contract, built-in factors
//! - `registry` - Active factor set with snapshot reads
//! - `aggregator/` - Pass execution, coalescing, change detection
//! - `events` - Change notifier (typed publish/subscribe)
//! - `history` - Recent level changes
//! - `trigger` - Trigger reasons and the periodic timer loop

pub mod error;
pub mod config;
pub mod threat;
pub mod registry;
pub mod events;
pub mod history;
pub mod aggregator;
pub mod trigger;

pub use error::{FactorError, ThreatError, ThreatResult};
pub use config::EngineConfig;
pub use registry::{RegistrySnapshot, ThreatRegistry};
pub use events::{ChangeNotifier, ChangeSubscriber, LevelChange, LogSubscriber, SubscriptionId};
pub use history::ChangeHistory;
pub use trigger::{spawn_periodic, LifecycleEvent, PeriodicHandle, Trigger};
