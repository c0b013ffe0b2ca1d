//! threat-monitor - evaluate a factor scenario file
//!
//! Usage: `threat-monitor <scenario.json> [--config <engine.json>] [--watch]`
//!
//! The scenario is a JSON array of `{"id", "kind", "triggered", "level"}`
//! entries. Each entry becomes a factor that re-reads the file on every
//! evaluation, so with `--watch` edits to the file show up on the next
//! timer pass.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use serde::Deserialize;

use threat_level_core::constants::{APP_NAME, APP_VERSION};
use threat_level_core::{
    spawn_periodic, EngineConfig, FactorKind, FactorReading, LogSubscriber, RiskLevel,
    StaticFactor, ThreatAggregator, ThreatError, ThreatResult, Trigger,
};

#[derive(Debug, Clone, Deserialize)]
struct ScenarioEntry {
    id: String,
    #[serde(default = "default_kind")]
    kind: FactorKind,
    triggered: bool,
    #[serde(default)]
    level: RiskLevel,
    #[serde(default)]
    details: Vec<String>,
}

fn default_kind() -> FactorKind {
    FactorKind::Custom
}

struct Args {
    scenario: PathBuf,
    config: Option<PathBuf>,
    watch: bool,
}

fn parse_args() -> ThreatResult<Args> {
    let mut scenario = None;
    let mut config = None;
    let mut watch = false;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--watch" => watch = true,
            "--config" => {
                let path = args.next().ok_or_else(|| {
                    ThreatError::InvalidConfig("--config needs a path".to_string())
                })?;
                config = Some(PathBuf::from(path));
            }
            other if scenario.is_none() => scenario = Some(PathBuf::from(other)),
            other => {
                return Err(ThreatError::InvalidConfig(format!(
                    "unexpected argument: {}",
                    other
                )))
            }
        }
    }

    let scenario = scenario.ok_or_else(|| {
        ThreatError::InvalidConfig(format!(
            "usage: {} <scenario.json> [--config <engine.json>] [--watch]",
            APP_NAME
        ))
    })?;

    Ok(Args {
        scenario,
        config,
        watch,
    })
}

fn load_scenario(path: &Path) -> ThreatResult<Vec<ScenarioEntry>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Factor that looks up its own entry in the scenario file on each evaluation
fn scenario_factor(path: PathBuf, id: String, kind: FactorKind) -> StaticFactor {
    let key = id.clone();
    StaticFactor::new(id, kind, move || -> Result<FactorReading, String> {
        let entries = load_scenario(&path).map_err(|e| e.to_string())?;
        let entry = entries
            .into_iter()
            .find(|e| e.id == key)
            .ok_or_else(|| format!("'{}' missing from scenario", key))?;
        let mut reading = FactorReading::new(entry.triggered, entry.level);
        reading.details = entry.details;
        Ok(reading)
    })
}

fn run() -> ThreatResult<()> {
    let args = parse_args()?;

    let config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::from_env(),
    };

    let aggregator = Arc::new(ThreatAggregator::new(config)?);
    aggregator.subscribe(LogSubscriber);

    for entry in load_scenario(&args.scenario)? {
        let factor = scenario_factor(args.scenario.clone(), entry.id, entry.kind);
        aggregator.register(Arc::new(factor))?;
    }

    let outcome = aggregator.request_evaluation(Trigger::Manual)?;
    for report in outcome.reports() {
        println!("{}", report.result.to_json()?);
    }

    if !args.watch {
        return Ok(());
    }

    let interval = aggregator.config().reevaluate_interval();
    let _timer = spawn_periodic(Arc::clone(&aggregator), interval)?;
    log::info!("Watching {:?} every {:?}", args.scenario, interval);
    loop {
        thread::sleep(interval);
        log::debug!("Current threat level: {}", aggregator.overall_threat_level());
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting {} v{}", APP_NAME, APP_VERSION);

    if let Err(e) = run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
