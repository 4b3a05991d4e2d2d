use anyhow::Result;
use luminous_app::{RunnerConfig, bootstrap};
use luminous_core::EcosystemConfig;
use luminous_core::grid::compose_grid;
use luminous_core::registry::EntityRegistry;
use tracing::info;

fn main() -> Result<()> {
    init_tracing();
    let runner = bootstrap(
        "luminous.db",
        EcosystemConfig::default(),
        RunnerConfig::default(),
    )?;
    info!("Luminous Ecosystem running; press Ctrl-C to stop");

    runner.subscribe(move |snapshot| {
        let mut registry = EntityRegistry::new();
        for def in &snapshot.custom_types {
            let _ = registry.register_custom(def.clone());
        }
        let rows = compose_grid(
            snapshot.environment,
            snapshot.environment_frame,
            &snapshot.entities,
            &registry,
        );
        print!("\x1b[2J\x1b[H");
        for row in rows {
            println!("{row}");
        }
        println!(
            "cycle {} | {} sea | {} entities | resonance {} complexity {} harmony {} entropy {}",
            snapshot.cycle,
            snapshot.environment,
            snapshot.entities.len(),
            snapshot.params.resonance(),
            snapshot.params.complexity(),
            snapshot.params.harmony(),
            snapshot.params.entropy(),
        );
        if let Some(entry) = snapshot.codex_entries.last() {
            println!("codex [{}]: {}", entry.cycle, entry.text);
        }
    });

    runner.join();
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
