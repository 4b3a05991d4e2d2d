//! Autonomous simulation runner.
//!
//! Owns the [`EcosystemState`] on a dedicated thread and drives it on a
//! fixed tick, with slower cadences layered on top for persistence, guardian
//! evolution, and ambient codex entries. Everything outside the thread sees
//! the world only through snapshots, so there is exactly one writer.

use luminous_core::{EcosystemSnapshot, EcosystemState, StatePersistence};
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Cadences for the runner loop.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Interval between simulation cycles.
    pub tick_interval: Duration,
    /// Interval between snapshot saves.
    pub save_interval: Duration,
    /// Interval between guardian interventions.
    pub evolution_interval: Duration,
    /// Interval between ambient codex entries.
    pub flavor_interval: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            save_interval: Duration::from_secs(10),
            evolution_interval: Duration::from_secs(60),
            flavor_interval: Duration::from_secs(30),
        }
    }
}

enum RunnerCommand {
    UpdateState(Box<EcosystemSnapshot>),
    Stop,
    Resume,
    Shutdown,
}

struct RunnerBoot {
    state: EcosystemState,
    persistence: Box<dyn StatePersistence>,
    config: RunnerConfig,
}

type Subscriber = Box<dyn Fn(&EcosystemSnapshot) + Send + 'static>;
type SubscriberList = Arc<Mutex<Vec<Subscriber>>>;

/// Handle to the runner thread.
pub struct EcosystemRunner {
    tx: mpsc::Sender<RunnerCommand>,
    subscribers: SubscriberList,
    latest: Arc<Mutex<Option<EcosystemSnapshot>>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl EcosystemRunner {
    /// Take ownership of `state` and start ticking it.
    ///
    /// When the worker thread cannot be spawned the runner degrades instead
    /// of failing: the initial snapshot is persisted once and published so
    /// subscribers still see a (frozen) world.
    pub fn spawn(
        state: EcosystemState,
        mut persistence: Box<dyn StatePersistence>,
        config: RunnerConfig,
    ) -> Self {
        let (tx, rx) = mpsc::channel::<RunnerCommand>();
        let subscribers: SubscriberList = Arc::new(Mutex::new(Vec::new()));
        let latest: Arc<Mutex<Option<EcosystemSnapshot>>> = Arc::new(Mutex::new(None));

        // The world is handed over only once the thread exists, so a failed
        // spawn leaves it with us for the degraded path below.
        let (boot_tx, boot_rx) = mpsc::channel::<RunnerBoot>();
        let worker_subscribers = Arc::clone(&subscribers);
        let worker_latest = Arc::clone(&latest);
        let spawned = thread::Builder::new()
            .name("luminous-runner".into())
            .spawn(move || {
                if let Ok(boot) = boot_rx.recv() {
                    run_loop(
                        boot.state,
                        boot.persistence,
                        boot.config,
                        rx,
                        worker_subscribers,
                        worker_latest,
                    );
                }
            });

        match spawned {
            Ok(handle) => {
                let _ = boot_tx.send(RunnerBoot {
                    state,
                    persistence,
                    config,
                });
                Self {
                    tx,
                    subscribers,
                    latest,
                    handle: Some(handle),
                }
            }
            Err(err) => {
                warn!(error = %err, "could not spawn runner thread; world is frozen");
                let snapshot = state.snapshot();
                if let Err(err) = persistence.persist(&snapshot) {
                    warn!(error = %err, "failed to persist frozen world");
                }
                *lock_unpoisoned(&latest) = Some(snapshot);
                Self {
                    tx,
                    subscribers,
                    latest,
                    handle: None,
                }
            }
        }
    }

    /// Register a callback invoked with a fresh snapshot after every cycle.
    /// A subscriber that panics is dropped; the others keep running.
    pub fn subscribe(&self, subscriber: impl Fn(&EcosystemSnapshot) + Send + 'static) {
        if self.handle.is_none()
            && let Some(snapshot) = lock_unpoisoned(&self.latest).as_ref()
        {
            subscriber(snapshot);
        }
        lock_unpoisoned(&self.subscribers).push(Box::new(subscriber));
    }

    /// Most recent snapshot published by the runner, if any cycle has run.
    #[must_use]
    pub fn latest_snapshot(&self) -> Option<EcosystemSnapshot> {
        lock_unpoisoned(&self.latest).clone()
    }

    /// Suspend ticking; the world is saved once on the way down.
    pub fn stop(&self) {
        let _ = self.tx.send(RunnerCommand::Stop);
    }

    /// Resume ticking after a stop.
    pub fn resume(&self) {
        let _ = self.tx.send(RunnerCommand::Resume);
    }

    /// Replace the running world with the given snapshot.
    pub fn update_state(&self, snapshot: EcosystemSnapshot) {
        let _ = self.tx.send(RunnerCommand::UpdateState(Box::new(snapshot)));
    }

    /// Stop the runner and wait for its thread to finish. A final snapshot
    /// is persisted before the thread exits.
    pub fn shutdown(mut self) {
        let _ = self.tx.send(RunnerCommand::Shutdown);
        self.join_handle();
    }

    /// Block until the runner thread exits.
    pub fn join(mut self) {
        self.join_handle();
    }

    fn join_handle(&mut self) {
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            warn!("runner thread panicked");
        }
    }
}

impl Drop for EcosystemRunner {
    fn drop(&mut self) {
        let _ = self.tx.send(RunnerCommand::Shutdown);
        self.join_handle();
    }
}

fn lock_unpoisoned<T>(mutex: &Arc<Mutex<T>>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn run_loop(
    mut state: EcosystemState,
    mut persistence: Box<dyn StatePersistence>,
    config: RunnerConfig,
    rx: mpsc::Receiver<RunnerCommand>,
    subscribers: SubscriberList,
    latest: Arc<Mutex<Option<EcosystemSnapshot>>>,
) {
    let mut running = true;
    let mut next_tick = Instant::now() + config.tick_interval;
    let mut last_save = Instant::now();
    let mut last_evolution = Instant::now();
    let mut last_flavor = Instant::now();
    info!("runner started");

    loop {
        // While stopped there is no next tick to pace toward, so block
        // until a command arrives instead of waking on every interval.
        let command = if running {
            let timeout = next_tick.saturating_duration_since(Instant::now());
            rx.recv_timeout(timeout)
        } else {
            rx.recv().map_err(|_| RecvTimeoutError::Disconnected)
        };
        match command {
            Ok(RunnerCommand::Stop) => {
                if running {
                    running = false;
                    save_snapshot(&mut persistence, &state);
                    info!(cycle = state.cycle(), "runner stopped ticking");
                }
            }
            Ok(RunnerCommand::Resume) => {
                if !running {
                    running = true;
                    next_tick = Instant::now() + config.tick_interval;
                    info!(cycle = state.cycle(), "runner resumed");
                }
            }
            Ok(RunnerCommand::UpdateState(snapshot)) => {
                match EcosystemState::from_snapshot(state.config().clone(), *snapshot) {
                    Ok(replacement) => {
                        state = replacement;
                        info!(cycle = state.cycle(), "world replaced from snapshot");
                    }
                    Err(err) => {
                        warn!(error = %err, "rejected snapshot; keeping current world");
                    }
                }
            }
            Ok(RunnerCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => {
                save_snapshot(&mut persistence, &state);
                info!(cycle = state.cycle(), "runner stopped");
                return;
            }
            Err(RecvTimeoutError::Timeout) => {
                next_tick += config.tick_interval;
                let events = state.step();
                debug!(
                    cycle = events.cycle,
                    spawned = events.spawned.len(),
                    despawned = events.despawned.len(),
                    "cycle complete"
                );

                let now = Instant::now();
                if now.duration_since(last_evolution) >= config.evolution_interval {
                    state.guardian_evolve();
                    last_evolution = now;
                }
                if now.duration_since(last_flavor) >= config.flavor_interval {
                    state.append_flavor_entry();
                    last_flavor = now;
                }
                if now.duration_since(last_save) >= config.save_interval {
                    save_snapshot(&mut persistence, &state);
                    last_save = now;
                }

                let snapshot = state.snapshot();
                *lock_unpoisoned(&latest) = Some(snapshot.clone());
                notify_subscribers(&subscribers, &snapshot);
            }
        }
    }
}

fn save_snapshot(persistence: &mut Box<dyn StatePersistence>, state: &EcosystemState) {
    if let Err(err) = persistence.persist(&state.snapshot()) {
        warn!(cycle = state.cycle(), error = %err, "snapshot save failed");
    }
}

fn notify_subscribers(subscribers: &SubscriberList, snapshot: &EcosystemSnapshot) {
    let mut list = lock_unpoisoned(subscribers);
    list.retain(|subscriber| {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| subscriber(snapshot)));
        if outcome.is_err() {
            warn!("subscriber panicked; removing it");
            false
        } else {
            true
        }
    });
}
