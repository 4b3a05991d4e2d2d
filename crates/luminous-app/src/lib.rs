//! Application wiring for the Luminous Ecosystem.

pub mod runner;

pub use runner::{EcosystemRunner, RunnerConfig};

use anyhow::Result;
use luminous_core::{EcosystemConfig, EcosystemState, StatePersistence};
use luminous_storage::{Storage, StoragePipeline};
use tracing::{info, warn};

/// Open persistence, restore or seed a world, and start the runner.
///
/// A database that cannot be opened downgrades persistence to the JSON
/// sidecar instead of failing the whole application.
pub fn bootstrap(
    db_path: &str,
    config: EcosystemConfig,
    runner_config: RunnerConfig,
) -> Result<EcosystemRunner> {
    let mut persistence: Box<dyn StatePersistence> = match StoragePipeline::new(db_path) {
        Ok(pipeline) => Box::new(pipeline),
        Err(err) => {
            warn!(error = %err, path = db_path, "database unavailable; using fallback file only");
            Box::new(Storage::fallback_only(db_path))
        }
    };

    let state = match persistence.restore() {
        Ok(Some(snapshot)) => {
            let cycle = snapshot.cycle;
            match EcosystemState::from_snapshot(config.clone(), snapshot) {
                Ok(state) => {
                    info!(cycle, "restored previous ecosystem");
                    state
                }
                Err(err) => {
                    warn!(error = %err, "saved state was unusable; starting fresh");
                    fresh_world(config)?
                }
            }
        }
        Ok(None) => fresh_world(config)?,
        Err(err) => {
            warn!(error = %err, "could not read saved state; starting fresh");
            fresh_world(config)?
        }
    };

    Ok(EcosystemRunner::spawn(state, persistence, runner_config))
}

fn fresh_world(config: EcosystemConfig) -> Result<EcosystemState> {
    let mut state = EcosystemState::new(config)?;
    state.seed_initial_entities();
    info!("seeded a fresh ecosystem");
    Ok(state)
}
