//! Simulation core for the Luminous Ecosystem.
//!
//! Owns the entire world model: the etheric parameters, the entity
//! population on its 70x15 grid, the guardian, and the codex chronicle.
//! [`EcosystemState::step`] advances one cycle through a fixed pipeline of
//! stages; every random draw flows through a single seeded [`SmallRng`] so
//! two states built from the same seed replay identically.

pub mod codex;
pub mod grid;
pub mod registry;

use crate::codex::{CodexEntry, CodexLog};
use crate::registry::{CustomEntityDef, EntityRegistry, RegistryError};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

/// Inclusive upper bound of the horizontal axis.
pub const GRID_WIDTH: i32 = 70;
/// Inclusive upper bound of the vertical axis.
pub const GRID_HEIGHT: i32 = 15;

/// Ambient codex lines drawn at the flavor cadence.
pub const FLAVOR_ENTRIES: [&str; 15] = [
    "Dimensional fluctuations creating ripple patterns in the etheric field.",
    "Resonance harmonics stabilizing across multiple entity types.",
    "Energy pathways forming between distant entities.",
    "Quantum probability fields shifting toward higher complexity.",
    "Crystalline structures forming in the void between dimensions.",
    "Thought patterns evolving toward collective consciousness.",
    "Temporal anomalies detected in entity movement patterns.",
    "Harmonic convergence points multiplying throughout the ecosystem.",
    "Prismatic refraction increasing information density.",
    "Void currents shifting toward new equilibrium states.",
    "Etheric density increasing in regions of high entity concentration.",
    "Dimensional boundaries thinning near Prismatic Drifter pathways.",
    "Resonant field strength fluctuating with harmonic cycles.",
    "Thought Weaver patterns showing signs of emergent intelligence.",
    "Crystalline Collective consciousness expanding into new dimensions.",
];

/// Focus areas the guardian rotates through while watching the ecosystem.
pub const GUARDIAN_FOCUSES: [&str; 6] = [
    "entity harmony",
    "dimensional stability",
    "energy patterns",
    "emergent consciousness",
    "resonance flows",
    "evolutionary pathways",
];

#[derive(Debug, Error)]
pub enum EcosystemError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Construction parameters for a fresh [`EcosystemState`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EcosystemConfig {
    /// Fixed seed for reproducible runs; `None` seeds from the OS.
    pub seed: Option<u64>,
    /// Maximum retained codex entries.
    pub codex_capacity: usize,
    /// Starting etheric parameters.
    pub initial_params: EtherParams,
}

impl Default for EcosystemConfig {
    fn default() -> Self {
        Self {
            seed: None,
            codex_capacity: 100,
            initial_params: EtherParams::default(),
        }
    }
}

impl EcosystemConfig {
    pub fn validate(&self) -> Result<(), EcosystemError> {
        if self.codex_capacity == 0 {
            return Err(EcosystemError::InvalidConfig(
                "codex_capacity must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Entity species. The six built-in kinds drive the simulation rules;
/// `Custom` covers types registered at runtime, which follow the default
/// lifecycle and never participate in fusion rules.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EntityKind {
    Resonant,
    Prismatic,
    Weaver,
    Dancer,
    Collective,
    Guardian,
    Custom(String),
}

impl EntityKind {
    pub const BUILTINS: [EntityKind; 6] = [
        EntityKind::Resonant,
        EntityKind::Prismatic,
        EntityKind::Weaver,
        EntityKind::Dancer,
        EntityKind::Collective,
        EntityKind::Guardian,
    ];

    /// Kinds eligible for spontaneous or guardian-driven creation.
    pub const SPAWNABLE: [EntityKind; 5] = [
        EntityKind::Resonant,
        EntityKind::Prismatic,
        EntityKind::Weaver,
        EntityKind::Dancer,
        EntityKind::Collective,
    ];

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            EntityKind::Resonant => "resonant",
            EntityKind::Prismatic => "prismatic",
            EntityKind::Weaver => "weaver",
            EntityKind::Dancer => "dancer",
            EntityKind::Collective => "collective",
            EntityKind::Guardian => "guardian",
            EntityKind::Custom(name) => name.as_str(),
        }
    }

    /// Kind name with its first letter uppercased, as used in codex lines.
    #[must_use]
    pub fn capitalized_name(&self) -> String {
        let name = self.name();
        let mut chars = name.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
            None => String::new(),
        }
    }

    #[must_use]
    pub fn is_guardian(&self) -> bool {
        *self == EntityKind::Guardian
    }
}

impl From<String> for EntityKind {
    fn from(name: String) -> Self {
        match name.as_str() {
            "resonant" => EntityKind::Resonant,
            "prismatic" => EntityKind::Prismatic,
            "weaver" => EntityKind::Weaver,
            "dancer" => EntityKind::Dancer,
            "collective" => EntityKind::Collective,
            "guardian" => EntityKind::Guardian,
            _ => EntityKind::Custom(name),
        }
    }
}

impl From<EntityKind> for String {
    fn from(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Custom(name) => name,
            other => other.name().to_string(),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ambient state of the Etheric Sea.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Tranquil,
    Harmonic,
    Prismatic,
    Quantum,
}

impl Environment {
    pub const ALL: [Environment; 4] = [
        Environment::Tranquil,
        Environment::Harmonic,
        Environment::Prismatic,
        Environment::Quantum,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Environment::Tranquil => "tranquil",
            Environment::Harmonic => "harmonic",
            Environment::Prismatic => "prismatic",
            Environment::Quantum => "quantum",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The four etheric parameters, each held in `[0, 100]`.
///
/// Fields stay private so every write path clamps; drift, convergence
/// bonuses, and flux penalties all funnel through the `adjust_` methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EtherParams {
    resonance: i32,
    complexity: i32,
    harmony: i32,
    entropy: i32,
}

impl Default for EtherParams {
    fn default() -> Self {
        Self {
            resonance: 50,
            complexity: 30,
            harmony: 65,
            entropy: 25,
        }
    }
}

impl EtherParams {
    pub const MIN: i32 = 0;
    pub const MAX: i32 = 100;

    pub fn new(
        resonance: i32,
        complexity: i32,
        harmony: i32,
        entropy: i32,
    ) -> Result<Self, EcosystemError> {
        for value in [resonance, complexity, harmony, entropy] {
            if !(Self::MIN..=Self::MAX).contains(&value) {
                return Err(EcosystemError::InvalidConfig(
                    "etheric parameters must lie in [0, 100]",
                ));
            }
        }
        Ok(Self {
            resonance,
            complexity,
            harmony,
            entropy,
        })
    }

    #[must_use]
    pub fn resonance(&self) -> i32 {
        self.resonance
    }

    #[must_use]
    pub fn complexity(&self) -> i32 {
        self.complexity
    }

    #[must_use]
    pub fn harmony(&self) -> i32 {
        self.harmony
    }

    #[must_use]
    pub fn entropy(&self) -> i32 {
        self.entropy
    }

    pub fn adjust_resonance(&mut self, delta: i32) {
        self.resonance = (self.resonance + delta).clamp(Self::MIN, Self::MAX);
    }

    pub fn adjust_complexity(&mut self, delta: i32) {
        self.complexity = (self.complexity + delta).clamp(Self::MIN, Self::MAX);
    }

    pub fn adjust_harmony(&mut self, delta: i32) {
        self.harmony = (self.harmony + delta).clamp(Self::MIN, Self::MAX);
    }

    pub fn adjust_entropy(&mut self, delta: i32) {
        self.entropy = (self.entropy + delta).clamp(Self::MIN, Self::MAX);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    #[must_use]
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Component-wise floored midpoint of two positions.
    #[must_use]
    pub fn midpoint(self, other: Self) -> Self {
        Self {
            x: (self.x + other.x).div_euclid(2),
            y: (self.y + other.y).div_euclid(2),
        }
    }
}

/// Per-axis heading, each component -1 or 1 after creation, sign-flipped
/// on wall contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Direction {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: u64,
    pub kind: EntityKind,
    pub position: Position,
    pub pattern: Vec<String>,
    pub frame: usize,
    pub age: u32,
    pub direction: Direction,
    pub speed: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuardianMood {
    Analytical,
    Catalytic,
    Protective,
    Contemplative,
    Nurturing,
}

impl GuardianMood {
    pub const ALL: [GuardianMood; 5] = [
        GuardianMood::Analytical,
        GuardianMood::Catalytic,
        GuardianMood::Protective,
        GuardianMood::Contemplative,
        GuardianMood::Nurturing,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            GuardianMood::Analytical => "analytical",
            GuardianMood::Catalytic => "catalytic",
            GuardianMood::Protective => "protective",
            GuardianMood::Contemplative => "contemplative",
            GuardianMood::Nurturing => "nurturing",
        }
    }
}

impl fmt::Display for GuardianMood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Guardian disposition tracked alongside its on-grid entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardianStatus {
    pub active: bool,
    pub mood: GuardianMood,
    pub focus: String,
    pub position: Position,
    /// Cycle of the guardian's most recent intervention.
    pub last_action: u64,
    pub action_cooldown: u32,
    /// Chronological record of guidance the guardian has offered.
    pub suggestion_history: Vec<String>,
}

impl Default for GuardianStatus {
    fn default() -> Self {
        Self {
            active: false,
            mood: GuardianMood::Analytical,
            focus: "general harmony".to_string(),
            position: Position::new(30, 5),
            last_action: 0,
            action_cooldown: 20,
            suggestion_history: Vec::new(),
        }
    }
}

/// What happened during a single [`EcosystemState::step`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickEvents {
    pub cycle: u64,
    pub environment_shift: Option<Environment>,
    pub interactions_checked: bool,
    pub spawned: Vec<EntityKind>,
    pub despawned: Vec<EntityKind>,
}

/// Serializable view of the ecosystem at a point in time.
///
/// This is the persistence and subscriber currency; it carries everything
/// except the RNG, so a restored state replays from its configured seed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EcosystemSnapshot {
    pub cycle: u64,
    pub environment: Environment,
    pub environment_frame: u64,
    pub entities: Vec<Entity>,
    pub params: EtherParams,
    pub counts: BTreeMap<String, u32>,
    pub codex_entries: Vec<CodexEntry>,
    pub guardian: GuardianStatus,
    pub custom_types: Vec<CustomEntityDef>,
}

/// Boxed error returned by persistence backends.
pub type PersistenceError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Backend-agnostic snapshot storage.
pub trait StatePersistence: Send {
    fn persist(&mut self, snapshot: &EcosystemSnapshot) -> Result<(), PersistenceError>;
    fn restore(&mut self) -> Result<Option<EcosystemSnapshot>, PersistenceError>;
    /// Millisecond timestamp of the most recent persisted snapshot.
    fn last_update(&mut self) -> Result<Option<i64>, PersistenceError>;
}

/// Persistence backend that stores nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPersistence;

impl StatePersistence for NullPersistence {
    fn persist(&mut self, _snapshot: &EcosystemSnapshot) -> Result<(), PersistenceError> {
        Ok(())
    }

    fn restore(&mut self) -> Result<Option<EcosystemSnapshot>, PersistenceError> {
        Ok(None)
    }

    fn last_update(&mut self) -> Result<Option<i64>, PersistenceError> {
        Ok(None)
    }
}

/// The authoritative world model.
#[derive(Debug)]
pub struct EcosystemState {
    config: EcosystemConfig,
    cycle: u64,
    environment: Environment,
    environment_frame: u64,
    entities: Vec<Entity>,
    params: EtherParams,
    counts: BTreeMap<String, u32>,
    codex: CodexLog,
    guardian: GuardianStatus,
    registry: EntityRegistry,
    rng: SmallRng,
    next_entity_id: u64,
}

fn seeded_rng(seed: Option<u64>) -> SmallRng {
    match seed {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => SmallRng::from_os_rng(),
    }
}

fn random_int(rng: &mut SmallRng, min: i32, max: i32) -> i32 {
    rng.random_range(min..=max)
}

fn random_axis(rng: &mut SmallRng) -> i32 {
    if rng.random::<f64>() > 0.5 { 1 } else { -1 }
}

/// Base lifespan roll for a kind, before the entropy tax.
fn rolled_lifespan(kind: &EntityKind, rng: &mut SmallRng) -> i32 {
    match kind {
        EntityKind::Resonant => 150 + random_int(rng, 0, 50),
        EntityKind::Prismatic => 200 + random_int(rng, 0, 100),
        EntityKind::Weaver => 120 + random_int(rng, 0, 80),
        EntityKind::Dancer => 100 + random_int(rng, 0, 50),
        EntityKind::Collective => 250 + random_int(rng, 0, 150),
        EntityKind::Guardian | EntityKind::Custom(_) => 150 + random_int(rng, 0, 100),
    }
}

impl EcosystemState {
    pub fn new(config: EcosystemConfig) -> Result<Self, EcosystemError> {
        config.validate()?;
        let rng = seeded_rng(config.seed);
        let mut counts = BTreeMap::new();
        for kind in &EntityKind::BUILTINS {
            counts.insert(kind.name().to_string(), 0);
        }
        let codex = CodexLog::with_capacity(config.codex_capacity);
        let params = config.initial_params;
        Ok(Self {
            config,
            cycle: 1,
            environment: Environment::Tranquil,
            environment_frame: 0,
            entities: Vec::new(),
            params,
            counts,
            codex,
            guardian: GuardianStatus::default(),
            registry: EntityRegistry::new(),
            rng,
            next_entity_id: 1,
        })
    }

    /// Restore a state from a persisted snapshot.
    ///
    /// Entity counts are recomputed from the entity list so the count
    /// invariant holds even if the snapshot was produced by an older build;
    /// zeroed kinds from the snapshot are preserved so discovery entries
    /// are not re-announced.
    pub fn from_snapshot(
        config: EcosystemConfig,
        snapshot: EcosystemSnapshot,
    ) -> Result<Self, EcosystemError> {
        config.validate()?;
        let mut registry = EntityRegistry::new();
        for def in snapshot.custom_types {
            registry.register_custom(def)?;
        }
        let mut counts = snapshot.counts;
        for value in counts.values_mut() {
            *value = 0;
        }
        for kind in &EntityKind::BUILTINS {
            counts.entry(kind.name().to_string()).or_insert(0);
        }
        for entity in &snapshot.entities {
            *counts.entry(entity.kind.name().to_string()).or_insert(0) += 1;
        }
        let next_entity_id = snapshot
            .entities
            .iter()
            .map(|entity| entity.id)
            .max()
            .unwrap_or(0)
            + 1;
        let codex = CodexLog::from_entries(config.codex_capacity, snapshot.codex_entries);
        let rng = seeded_rng(config.seed);
        Ok(Self {
            config,
            cycle: snapshot.cycle,
            environment: snapshot.environment,
            environment_frame: snapshot.environment_frame,
            entities: snapshot.entities,
            params: snapshot.params,
            counts,
            codex,
            guardian: snapshot.guardian,
            registry,
            rng,
            next_entity_id,
        })
    }

    #[must_use]
    pub fn snapshot(&self) -> EcosystemSnapshot {
        let custom_types = self
            .registry
            .custom_types()
            .into_iter()
            .filter_map(|name| self.registry.custom_def(name).cloned())
            .collect();
        EcosystemSnapshot {
            cycle: self.cycle,
            environment: self.environment,
            environment_frame: self.environment_frame,
            entities: self.entities.clone(),
            params: self.params,
            counts: self.counts.clone(),
            codex_entries: self.codex.to_vec(),
            guardian: self.guardian.clone(),
            custom_types,
        }
    }

    /// Populate a fresh sea with the canonical opening arrangement and
    /// wake the guardian.
    pub fn seed_initial_entities(&mut self) {
        self.spawn_entity(EntityKind::Resonant, Position::new(10, 10));
        self.spawn_entity(EntityKind::Resonant, Position::new(25, 8));
        self.spawn_entity(EntityKind::Resonant, Position::new(40, 12));
        self.spawn_entity(EntityKind::Prismatic, Position::new(60, 8));
        self.activate_guardian();
    }

    /// Bring the guardian online, placing its entity on the grid. Idempotent.
    pub fn activate_guardian(&mut self) {
        if self.guardian.active {
            return;
        }
        self.guardian.active = true;
        let position = self.guardian.position;
        self.spawn_entity(EntityKind::Guardian, position);
        self.roll_guardian_mood();
        self.roll_guardian_focus();
        self.codex
            .push(self.cycle, "The Etheric Guardian has manifested in the ecosystem.");
        info!(cycle = self.cycle, "guardian activated");
    }

    #[must_use]
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    #[must_use]
    pub fn environment(&self) -> Environment {
        self.environment
    }

    #[must_use]
    pub fn environment_frame(&self) -> u64 {
        self.environment_frame
    }

    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    #[must_use]
    pub fn params(&self) -> EtherParams {
        self.params
    }

    pub fn set_params(&mut self, params: EtherParams) {
        self.params = params;
    }

    #[must_use]
    pub fn count_of(&self, kind: &EntityKind) -> u32 {
        self.counts.get(kind.name()).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn guardian(&self) -> &GuardianStatus {
        &self.guardian
    }

    #[must_use]
    pub fn codex(&self) -> &CodexLog {
        &self.codex
    }

    #[must_use]
    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    #[must_use]
    pub fn config(&self) -> &EcosystemConfig {
        &self.config
    }

    /// Register a custom entity type so it can be spawned and rendered.
    pub fn register_custom_entity(&mut self, def: CustomEntityDef) -> Result<(), RegistryError> {
        self.registry.register_custom(def)
    }

    /// Advance the simulation by one cycle.
    pub fn step(&mut self) -> TickEvents {
        self.cycle += 1;
        let mut events = TickEvents {
            cycle: self.cycle,
            ..TickEvents::default()
        };
        self.stage_drift();
        self.stage_environment(&mut events);
        self.stage_entities();
        self.stage_events(&mut events);
        self.stage_lifecycle(&mut events);
        self.stage_guardian();
        events
    }

    /// Random walk of the etheric parameters, clamped to [0, 100].
    fn stage_drift(&mut self) {
        let rng = &mut self.rng;
        self.params.adjust_resonance(random_int(rng, -2, 2));
        self.params.adjust_complexity(random_int(rng, -1, 1));
        self.params.adjust_harmony(random_int(rng, -2, 2));
        self.params.adjust_entropy(random_int(rng, -1, 2));
    }

    /// Every 50th cycle the sea may shift, unless the guardian holds it
    /// steady.
    fn stage_environment(&mut self, events: &mut TickEvents) {
        self.environment_frame += 1;
        if self.cycle % 50 != 0 || self.guardian.active {
            return;
        }
        let roll = self.rng.random::<f64>() * 100.0;
        let next = if roll < 15.0 {
            Environment::Quantum
        } else if roll < 30.0 {
            Environment::Prismatic
        } else if roll < 60.0 {
            Environment::Harmonic
        } else {
            Environment::Tranquil
        };
        if next != self.environment {
            self.environment = next;
            self.codex
                .push(self.cycle, format!("Etheric Sea shifted to {next} state."));
            events.environment_shift = Some(next);
            info!(environment = %next, cycle = self.cycle, "environment shifted");
        }
    }

    /// Aging, animation frames, and bounded movement.
    fn stage_entities(&mut self) {
        let cycle = self.cycle;
        let registry = &self.registry;
        let rng = &mut self.rng;
        for entity in &mut self.entities {
            if cycle % 3 == 0 {
                entity.frame = (entity.frame + 1) % registry.variant_count(&entity.kind);
                entity.pattern = registry.variant(&entity.kind, entity.frame);
            }

            // The guardian animates but never ages or wanders.
            if entity.kind.is_guardian() {
                continue;
            }
            entity.age += 1;
            let interval = u64::from(5 - entity.speed.clamp(1, 4));
            if cycle % interval != 0 {
                continue;
            }
            if rng.random::<f64>() < 0.1 {
                entity.direction.x = random_axis(rng);
                entity.direction.y = random_axis(rng);
            }
            entity.position.x += entity.direction.x;
            entity.position.y += entity.direction.y;
            if entity.position.x < 0 {
                entity.position.x = 0;
                entity.direction.x = -entity.direction.x;
            }
            if entity.position.x > GRID_WIDTH {
                entity.position.x = GRID_WIDTH;
                entity.direction.x = -entity.direction.x;
            }
            if entity.position.y < 0 {
                entity.position.y = 0;
                entity.direction.y = -entity.direction.y;
            }
            if entity.position.y > GRID_HEIGHT {
                entity.position.y = GRID_HEIGHT;
                entity.direction.y = -entity.direction.y;
            }
        }
    }

    /// Rare-event gate: interactions plus the convergence and flux effects.
    fn stage_events(&mut self, events: &mut TickEvents) {
        if self.rng.random::<f64>() >= 0.05 {
            return;
        }
        events.interactions_checked = true;
        self.check_entity_interactions(events);

        if self.params.resonance() > 70 && self.params.harmony() > 75 {
            self.codex
                .push(self.cycle, "Harmonic convergence detected in the Etheric Sea.");
            self.params.adjust_resonance(5);
        }
        if self.params.entropy() > 60 {
            self.codex
                .push(self.cycle, "Energy flux destabilizing the ecosystem.");
            self.params.adjust_harmony(-5);
        }
    }

    /// Scan entity pairs for fusion opportunities. At most one fusion fires
    /// per call; the scan returns as soon as indices become stale.
    pub fn check_entity_interactions(&mut self, events: &mut TickEvents) {
        for i in 0..self.entities.len() {
            for j in (i + 1)..self.entities.len() {
                let (kind_i, pos_i) = (self.entities[i].kind.clone(), self.entities[i].position);
                let (kind_j, pos_j) = (self.entities[j].kind.clone(), self.entities[j].position);
                if kind_i.is_guardian() || kind_j.is_guardian() {
                    continue;
                }
                let dx = (pos_i.x - pos_j.x).abs();
                let dy = (pos_i.y - pos_j.y).abs();
                if dx >= 10 || dy >= 5 {
                    continue;
                }

                // Two resonants near a prismatic may fuse into a weaver.
                if kind_i == EntityKind::Resonant
                    && kind_j == EntityKind::Resonant
                    && self.entities.iter().any(|e| {
                        e.kind == EntityKind::Prismatic
                            && (e.position.x - pos_i.x).abs() < 15
                            && (e.position.y - pos_i.y).abs() < 8
                    })
                    && self.rng.random::<f64>() < 0.3
                    && self.params.complexity() > 40
                {
                    self.fuse_resonants(i, j, events);
                    return;
                }

                // A prismatic and a weaver may emit a dancer; parents survive.
                let is_prismatic_weaver = (kind_i == EntityKind::Prismatic
                    && kind_j == EntityKind::Weaver)
                    || (kind_i == EntityKind::Weaver && kind_j == EntityKind::Prismatic);
                if is_prismatic_weaver
                    && self.rng.random::<f64>() < 0.2
                    && self.params.resonance() > 60
                {
                    self.spawn_entity(EntityKind::Dancer, pos_i.midpoint(pos_j));
                    events.spawned.push(EntityKind::Dancer);
                    self.codex.push(
                        self.cycle,
                        "A Prismatic Drifter and Thought Weaver merged into a Void Dancer.",
                    );
                    return;
                }
            }
        }
    }

    /// Replace the resonants at `i` and `j` with a weaver at their midpoint.
    fn fuse_resonants(&mut self, i: usize, j: usize, events: &mut TickEvents) {
        let midpoint = self.entities[i].position.midpoint(self.entities[j].position);
        self.spawn_entity(EntityKind::Weaver, midpoint);
        self.codex.push(
            self.cycle,
            "Two Resonants harmonized near a Prismatic Drifter to form a Thought Weaver.",
        );
        // Higher index first so the lower one stays valid.
        if self.remove_entity_at(j.max(i)).is_some() {
            events.despawned.push(EntityKind::Resonant);
        }
        if self.remove_entity_at(j.min(i)).is_some() {
            events.despawned.push(EntityKind::Resonant);
        }
        events.spawned.push(EntityKind::Weaver);
        debug!(cycle = self.cycle, x = midpoint.x, y = midpoint.y, "resonants fused into weaver");
    }

    /// Parameter-weighted spawning and age-based despawning.
    fn stage_lifecycle(&mut self, events: &mut TickEvents) {
        if self.rng.random::<f64>() < 0.1 {
            let spawn_roll = self.rng.random::<f64>() * 100.0;
            let resonance_share = f64::from(self.params.resonance()) / 2.0;
            let complexity_share = f64::from(self.params.complexity()) / 3.0;
            if spawn_roll < resonance_share {
                let position = Position::new(
                    random_int(&mut self.rng, 5, 70),
                    random_int(&mut self.rng, 2, 15),
                );
                self.spawn_entity(EntityKind::Resonant, position);
                events.spawned.push(EntityKind::Resonant);
            } else if spawn_roll < resonance_share + complexity_share {
                let position = Position::new(
                    random_int(&mut self.rng, 5, 65),
                    random_int(&mut self.rng, 2, 12),
                );
                self.spawn_entity(EntityKind::Prismatic, position);
                events.spawned.push(EntityKind::Prismatic);
            }

            if self.params.harmony() > 80
                && self.params.complexity() > 70
                && self.count_of(&EntityKind::Weaver) >= 2
                && self.count_of(&EntityKind::Dancer) >= 1
                && self.rng.random::<f64>() < 0.1
            {
                let position = Position::new(
                    random_int(&mut self.rng, 10, 60),
                    random_int(&mut self.rng, 5, 12),
                );
                self.spawn_entity(EntityKind::Collective, position);
                events.spawned.push(EntityKind::Collective);
                self.codex.push(
                    self.cycle,
                    "High harmony and complexity allowed a Crystalline Collective to form!",
                );
            }
        }

        // Reverse scan so removals leave earlier indices untouched.
        let entropy_tax = self.params.entropy() / 10;
        for index in (0..self.entities.len()).rev() {
            if self.entities[index].kind.is_guardian() {
                continue;
            }
            let kind = self.entities[index].kind.clone();
            let lifespan = rolled_lifespan(&kind, &mut self.rng) - entropy_tax;
            let expired = i64::from(self.entities[index].age) > i64::from(lifespan);
            if expired || self.rng.random::<f64>() < 0.001 {
                if let Some(entity) = self.remove_entity_at(index) {
                    events.despawned.push(entity.kind.clone());
                    debug!(
                        cycle = self.cycle,
                        kind = %entity.kind,
                        age = entity.age,
                        "entity dissolved"
                    );
                }
            }
        }
    }

    /// Periodic guardian disposition changes.
    fn stage_guardian(&mut self) {
        if !self.guardian.active {
            return;
        }
        if self.cycle % 50 == 0 {
            self.roll_guardian_mood();
        }
        if self.cycle % 100 == 0 {
            self.roll_guardian_focus();
        }
    }

    fn roll_guardian_mood(&mut self) {
        let index = self.rng.random_range(0..GuardianMood::ALL.len());
        self.guardian.mood = GuardianMood::ALL[index];
    }

    fn roll_guardian_focus(&mut self) {
        let index = self.rng.random_range(0..GUARDIAN_FOCUSES.len());
        self.guardian.focus = GUARDIAN_FOCUSES[index].to_string();
    }

    /// One guardian intervention: usually a manifestation, occasionally the
    /// dissolution of the oldest entity when the sea is crowded. Returns
    /// whether anything changed.
    pub fn guardian_evolve(&mut self) -> bool {
        if !self.guardian.active {
            return false;
        }
        let should_remove = self.entities.len() > 5 && self.rng.random::<f64>() < 0.25;
        if should_remove {
            let Some(index) = self.oldest_entity_index() else {
                return false;
            };
            let kind_name = self.entities[index].kind.name().to_string();
            if self.remove_entity_at(index).is_none() {
                return false;
            }
            self.codex.push(
                self.cycle,
                format!("Guardian autonomously dissolved a {kind_name} entity that had completed its cycle."),
            );
            info!(cycle = self.cycle, kind = %kind_name, "guardian dissolved entity");
        } else {
            let pick = self.rng.random_range(0..EntityKind::SPAWNABLE.len());
            let kind = EntityKind::SPAWNABLE[pick].clone();
            let position = Position::new(
                random_int(&mut self.rng, 10, 70),
                random_int(&mut self.rng, 5, 15),
            );
            let kind_name = kind.name().to_string();
            self.spawn_entity(kind, position);
            self.codex.push(
                self.cycle,
                format!("Guardian autonomously manifested a new {kind_name} entity in response to ecosystem needs."),
            );
            info!(cycle = self.cycle, kind = %kind_name, "guardian manifested entity");
        }
        self.guardian.last_action = self.cycle;
        true
    }

    /// Record one ambient chronicle line from the flavor pool.
    pub fn append_flavor_entry(&mut self) {
        let index = self.rng.random_range(0..FLAVOR_ENTRIES.len());
        self.codex.push(self.cycle, FLAVOR_ENTRIES[index]);
    }

    /// Add an entity of `kind` at `position`, stamping its initial pattern
    /// from the registry. The first sighting of a non-guardian kind earns a
    /// discovery line in the codex.
    pub fn spawn_entity(&mut self, kind: EntityKind, position: Position) -> u64 {
        let pattern = self.registry.first_pattern(&kind);
        let speed = if kind == EntityKind::Prismatic { 2 } else { 1 };
        let direction = Direction {
            x: random_axis(&mut self.rng),
            y: random_axis(&mut self.rng),
        };
        let id = self.next_entity_id;
        self.next_entity_id += 1;
        self.entities.push(Entity {
            id,
            kind: kind.clone(),
            position,
            pattern,
            frame: 0,
            age: 0,
            direction,
            speed,
        });
        let count = {
            let entry = self.counts.entry(kind.name().to_string()).or_insert(0);
            *entry += 1;
            *entry
        };
        if count == 1 && !kind.is_guardian() {
            let text = format!(
                "Discovered first {} entity at cycle {}.",
                kind.capitalized_name(),
                self.cycle
            );
            self.codex.push(self.cycle, text);
        }
        debug!(cycle = self.cycle, kind = %kind, x = position.x, y = position.y, "entity spawned");
        id
    }

    /// Remove the entity at `index`, refusing to touch the guardian.
    pub fn remove_entity_at(&mut self, index: usize) -> Option<Entity> {
        if index >= self.entities.len() || self.entities[index].kind.is_guardian() {
            return None;
        }
        let entity = self.entities.remove(index);
        if let Some(count) = self.counts.get_mut(entity.kind.name()) {
            *count = count.saturating_sub(1);
        }
        Some(entity)
    }

    fn oldest_entity_index(&self) -> Option<usize> {
        let mut best: Option<(usize, u32)> = None;
        for (index, entity) in self.entities.iter().enumerate() {
            if entity.kind.is_guardian() {
                continue;
            }
            if best.is_none_or(|(_, age)| entity.age > age) {
                best = Some((index, entity.age));
            }
        }
        best.map(|(index, _)| index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_state(seed: u64) -> EcosystemState {
        let config = EcosystemConfig {
            seed: Some(seed),
            ..EcosystemConfig::default()
        };
        EcosystemState::new(config).expect("valid config")
    }

    #[test]
    fn fresh_state_matches_initial_conditions() {
        let state = seeded_state(7);
        assert_eq!(state.cycle(), 1);
        assert_eq!(state.environment(), Environment::Tranquil);
        assert_eq!(state.environment_frame(), 0);
        assert!(state.entities().is_empty());
        let params = state.params();
        assert_eq!(params.resonance(), 50);
        assert_eq!(params.complexity(), 30);
        assert_eq!(params.harmony(), 65);
        assert_eq!(params.entropy(), 25);
        let guardian = state.guardian();
        assert!(!guardian.active);
        assert_eq!(guardian.mood, GuardianMood::Analytical);
        assert_eq!(guardian.focus, "general harmony");
        assert_eq!(guardian.position, Position::new(30, 5));
        assert_eq!(guardian.last_action, 0);
        assert_eq!(guardian.action_cooldown, 20);
        assert!(guardian.suggestion_history.is_empty());
        for kind in &EntityKind::BUILTINS {
            assert_eq!(state.count_of(kind), 0);
        }
    }

    #[test]
    fn zero_codex_capacity_is_rejected() {
        let config = EcosystemConfig {
            codex_capacity: 0,
            ..EcosystemConfig::default()
        };
        assert!(matches!(
            EcosystemState::new(config),
            Err(EcosystemError::InvalidConfig(_))
        ));
    }

    #[test]
    fn seeding_places_canonical_entities_and_wakes_guardian() {
        let mut state = seeded_state(11);
        state.seed_initial_entities();
        assert_eq!(state.entities().len(), 5);
        assert_eq!(state.count_of(&EntityKind::Resonant), 3);
        assert_eq!(state.count_of(&EntityKind::Prismatic), 1);
        assert_eq!(state.count_of(&EntityKind::Guardian), 1);
        let positions: Vec<Position> = state
            .entities()
            .iter()
            .map(|entity| entity.position)
            .collect();
        assert!(positions.contains(&Position::new(10, 10)));
        assert!(positions.contains(&Position::new(25, 8)));
        assert!(positions.contains(&Position::new(40, 12)));
        assert!(positions.contains(&Position::new(60, 8)));
        assert!(state.guardian().active);
        assert!(state
            .codex()
            .contains("The Etheric Guardian has manifested in the ecosystem."));
        assert!(state.codex().contains("Discovered first Resonant entity"));
        assert!(state.codex().contains("Discovered first Prismatic entity"));
    }

    #[test]
    fn discovery_entry_fires_once_per_kind() {
        let mut state = seeded_state(3);
        state.spawn_entity(EntityKind::Dancer, Position::new(5, 5));
        state.spawn_entity(EntityKind::Dancer, Position::new(6, 6));
        let hits = state
            .codex()
            .entries()
            .filter(|entry| entry.text.contains("Discovered first Dancer"))
            .count();
        assert_eq!(hits, 1);
    }

    #[test]
    fn same_seed_replays_identically() {
        let mut a = seeded_state(42);
        let mut b = seeded_state(42);
        a.seed_initial_entities();
        b.seed_initial_entities();
        for _ in 0..200 {
            let events_a = a.step();
            let events_b = b.step();
            assert_eq!(events_a, events_b);
        }
        assert_eq!(a.snapshot(), b.snapshot());
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = seeded_state(1);
        let mut b = seeded_state(2);
        a.seed_initial_entities();
        b.seed_initial_entities();
        let mut diverged = false;
        for _ in 0..500 {
            a.step();
            b.step();
            if a.snapshot() != b.snapshot() {
                diverged = true;
                break;
            }
        }
        assert!(diverged);
    }

    #[test]
    fn step_advances_cycle_and_ages_entities() {
        let mut state = seeded_state(5);
        state.seed_initial_entities();
        let before = state.cycle();
        let events = state.step();
        assert_eq!(state.cycle(), before + 1);
        assert_eq!(events.cycle, state.cycle());
        assert!(
            state
                .entities()
                .iter()
                .filter(|entity| !entity.kind.is_guardian())
                .all(|entity| entity.age >= 1)
        );
        assert_eq!(state.environment_frame(), 1);
    }

    #[test]
    fn guardian_never_ages() {
        let mut state = seeded_state(89);
        state.seed_initial_entities();
        for _ in 0..10 {
            state.step();
        }
        let guardian = state
            .entities()
            .iter()
            .find(|entity| entity.kind.is_guardian())
            .expect("guardian present");
        assert_eq!(guardian.age, 0);
    }

    #[test]
    fn params_stay_clamped_under_prolonged_drift() {
        let mut state = seeded_state(9);
        state.seed_initial_entities();
        for _ in 0..2000 {
            state.step();
            let params = state.params();
            for value in [
                params.resonance(),
                params.complexity(),
                params.harmony(),
                params.entropy(),
            ] {
                assert!((0..=100).contains(&value), "parameter escaped range: {value}");
            }
        }
    }

    #[test]
    fn positions_stay_within_grid_bounds() {
        let mut state = seeded_state(13);
        state.seed_initial_entities();
        for _ in 0..1000 {
            state.step();
            for entity in state.entities() {
                assert!((0..=GRID_WIDTH).contains(&entity.position.x));
                assert!((0..=GRID_HEIGHT).contains(&entity.position.y));
            }
        }
    }

    #[test]
    fn adjust_methods_clamp_at_both_ends() {
        let mut params = EtherParams::default();
        params.adjust_resonance(1000);
        assert_eq!(params.resonance(), 100);
        params.adjust_resonance(-1000);
        assert_eq!(params.resonance(), 0);
        assert!(EtherParams::new(0, 0, 0, 0).is_ok());
        assert!(EtherParams::new(101, 0, 0, 0).is_err());
        assert!(EtherParams::new(0, -1, 0, 0).is_err());
    }

    #[test]
    fn guardian_cannot_be_removed() {
        let mut state = seeded_state(17);
        state.seed_initial_entities();
        let guardian_index = state
            .entities()
            .iter()
            .position(|entity| entity.kind.is_guardian())
            .expect("guardian present");
        assert!(state.remove_entity_at(guardian_index).is_none());
        assert_eq!(state.count_of(&EntityKind::Guardian), 1);
    }

    #[test]
    fn remove_decrements_count() {
        let mut state = seeded_state(19);
        state.spawn_entity(EntityKind::Resonant, Position::new(4, 4));
        assert_eq!(state.count_of(&EntityKind::Resonant), 1);
        let removed = state.remove_entity_at(0).expect("removable");
        assert_eq!(removed.kind, EntityKind::Resonant);
        assert_eq!(state.count_of(&EntityKind::Resonant), 0);
    }

    #[test]
    fn fusing_resonants_yields_weaver_at_midpoint() {
        let mut state = seeded_state(23);
        state.spawn_entity(EntityKind::Resonant, Position::new(10, 10));
        state.spawn_entity(EntityKind::Resonant, Position::new(14, 12));
        state.spawn_entity(EntityKind::Prismatic, Position::new(15, 10));
        let mut events = TickEvents::default();
        state.fuse_resonants(0, 1, &mut events);
        assert_eq!(state.count_of(&EntityKind::Resonant), 0);
        assert_eq!(state.count_of(&EntityKind::Weaver), 1);
        assert_eq!(state.entities().len(), 2);
        let weaver = state
            .entities()
            .iter()
            .find(|entity| entity.kind == EntityKind::Weaver)
            .expect("weaver spawned");
        assert_eq!(weaver.position, Position::new(12, 11));
        assert_eq!(events.spawned, vec![EntityKind::Weaver]);
        assert_eq!(
            events.despawned,
            vec![EntityKind::Resonant, EntityKind::Resonant]
        );
        assert!(state
            .codex()
            .contains("Two Resonants harmonized near a Prismatic Drifter"));
    }

    #[test]
    fn resonant_fusion_fires_under_forced_conditions() {
        let mut state = seeded_state(29);
        state.set_params(EtherParams::new(50, 80, 65, 25).expect("valid params"));
        state.spawn_entity(EntityKind::Resonant, Position::new(10, 10));
        state.spawn_entity(EntityKind::Resonant, Position::new(12, 11));
        state.spawn_entity(EntityKind::Prismatic, Position::new(15, 10));
        let mut fused = false;
        for _ in 0..10_000 {
            let mut events = TickEvents::default();
            state.check_entity_interactions(&mut events);
            if events.spawned.contains(&EntityKind::Weaver) {
                fused = true;
                break;
            }
        }
        assert!(fused, "fusion never fired under qualifying conditions");
        assert_eq!(state.count_of(&EntityKind::Weaver), 1);
    }

    #[test]
    fn prismatic_weaver_pairing_emits_dancer_and_keeps_parents() {
        let mut state = seeded_state(31);
        state.set_params(EtherParams::new(80, 30, 65, 25).expect("valid params"));
        state.spawn_entity(EntityKind::Prismatic, Position::new(20, 8));
        state.spawn_entity(EntityKind::Weaver, Position::new(24, 10));
        let mut emitted = false;
        for _ in 0..10_000 {
            let mut events = TickEvents::default();
            state.check_entity_interactions(&mut events);
            if events.spawned.contains(&EntityKind::Dancer) {
                emitted = true;
                break;
            }
        }
        assert!(emitted, "dancer emission never fired");
        assert_eq!(state.count_of(&EntityKind::Prismatic), 1);
        assert_eq!(state.count_of(&EntityKind::Weaver), 1);
        assert_eq!(state.count_of(&EntityKind::Dancer), 1);
        let dancer = state
            .entities()
            .iter()
            .find(|entity| entity.kind == EntityKind::Dancer)
            .expect("dancer spawned");
        assert_eq!(dancer.position, Position::new(22, 9));
        assert!(state
            .codex()
            .contains("A Prismatic Drifter and Thought Weaver merged into a Void Dancer."));
    }

    #[test]
    fn interactions_skip_distant_pairs() {
        let mut state = seeded_state(37);
        state.set_params(EtherParams::new(80, 80, 65, 25).expect("valid params"));
        state.spawn_entity(EntityKind::Resonant, Position::new(0, 0));
        state.spawn_entity(EntityKind::Resonant, Position::new(50, 14));
        state.spawn_entity(EntityKind::Prismatic, Position::new(2, 2));
        for _ in 0..1000 {
            let mut events = TickEvents::default();
            state.check_entity_interactions(&mut events);
            assert!(events.spawned.is_empty());
        }
    }

    #[test]
    fn lifespan_rolls_fall_in_expected_ranges() {
        let mut rng = SmallRng::seed_from_u64(41);
        for _ in 0..500 {
            let resonant = rolled_lifespan(&EntityKind::Resonant, &mut rng);
            assert!((150..=200).contains(&resonant));
            let prismatic = rolled_lifespan(&EntityKind::Prismatic, &mut rng);
            assert!((200..=300).contains(&prismatic));
            let weaver = rolled_lifespan(&EntityKind::Weaver, &mut rng);
            assert!((120..=200).contains(&weaver));
            let dancer = rolled_lifespan(&EntityKind::Dancer, &mut rng);
            assert!((100..=150).contains(&dancer));
            let collective = rolled_lifespan(&EntityKind::Collective, &mut rng);
            assert!((250..=400).contains(&collective));
            let custom = rolled_lifespan(&EntityKind::Custom("nexus".to_string()), &mut rng);
            assert!((150..=250).contains(&custom));
        }
    }

    #[test]
    fn guardian_active_pins_environment() {
        let mut state = seeded_state(43);
        state.seed_initial_entities();
        assert!(state.guardian().active);
        for _ in 0..300 {
            let events = state.step();
            assert!(events.environment_shift.is_none());
        }
        assert_eq!(state.environment(), Environment::Tranquil);
    }

    #[test]
    fn guardian_evolve_requires_active_guardian() {
        let mut state = seeded_state(47);
        state.spawn_entity(EntityKind::Resonant, Position::new(5, 5));
        assert!(!state.guardian_evolve());
        assert_eq!(state.entities().len(), 1);
    }

    #[test]
    fn guardian_evolve_spawns_when_sea_is_sparse() {
        let mut state = seeded_state(53);
        state.seed_initial_entities();
        let before = state.entities().len();
        assert!(before <= 5);
        assert!(state.guardian_evolve());
        assert_eq!(state.entities().len(), before + 1);
        assert!(state
            .codex()
            .contains("Guardian autonomously manifested a new"));
    }

    #[test]
    fn guardian_evolve_can_dissolve_oldest_when_crowded() {
        let mut state = seeded_state(59);
        state.seed_initial_entities();
        for x in 0..8 {
            state.spawn_entity(EntityKind::Resonant, Position::new(x * 5, 3));
        }
        // Age one entity so the oldest pick is unambiguous.
        state.step();
        let mut dissolved = false;
        for _ in 0..200 {
            let before = state.entities().len();
            state.guardian_evolve();
            if state.entities().len() < before {
                dissolved = true;
                break;
            }
        }
        assert!(dissolved, "guardian never dissolved despite crowding");
        assert!(state
            .codex()
            .contains("Guardian autonomously dissolved a"));
        assert_eq!(state.count_of(&EntityKind::Guardian), 1);
    }

    #[test]
    fn flavor_entries_come_from_the_pool() {
        let mut state = seeded_state(61);
        for _ in 0..10 {
            state.append_flavor_entry();
        }
        for entry in state.codex().entries() {
            assert!(FLAVOR_ENTRIES.contains(&entry.text.as_str()));
        }
    }

    #[test]
    fn snapshot_roundtrip_preserves_world() {
        let mut state = seeded_state(67);
        state.seed_initial_entities();
        state
            .register_custom_entity(CustomEntityDef {
                name: "nexus".to_string(),
                display_name: "Dimensional Nexus".to_string(),
                description: "A junction point between etheric currents.".to_string(),
                properties: [
                    "Anchors dimensional boundaries".to_string(),
                    "Amplifies nearby resonance".to_string(),
                    "Forms at etheric crossings".to_string(),
                ],
                color_class: "entity-nexus".to_string(),
                pattern: vec!["<->".to_string()],
            })
            .expect("register");
        state.spawn_entity(EntityKind::Custom("nexus".to_string()), Position::new(33, 7));
        for _ in 0..50 {
            state.step();
        }
        let snapshot = state.snapshot();
        let restored = EcosystemState::from_snapshot(state.config().clone(), snapshot.clone())
            .expect("restore");
        assert_eq!(restored.snapshot(), snapshot);
        assert_eq!(
            restored.count_of(&EntityKind::Custom("nexus".to_string())),
            state.count_of(&EntityKind::Custom("nexus".to_string()))
        );
    }

    #[test]
    fn restored_state_continues_stepping() {
        let mut state = seeded_state(71);
        state.seed_initial_entities();
        for _ in 0..30 {
            state.step();
        }
        let snapshot = state.snapshot();
        let mut restored =
            EcosystemState::from_snapshot(state.config().clone(), snapshot).expect("restore");
        let cycle = restored.cycle();
        restored.step();
        assert_eq!(restored.cycle(), cycle + 1);
    }

    #[test]
    fn snapshot_survives_json_roundtrip() {
        let mut state = seeded_state(73);
        state.seed_initial_entities();
        for _ in 0..20 {
            state.step();
        }
        let snapshot = state.snapshot();
        let json = serde_json::to_string(&snapshot).expect("serialize");
        let parsed: EcosystemSnapshot = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, snapshot);
    }

    #[test]
    fn entity_kind_serde_uses_plain_names() {
        let json = serde_json::to_string(&EntityKind::Weaver).expect("serialize");
        assert_eq!(json, "\"weaver\"");
        let parsed: EntityKind = serde_json::from_str("\"nexus\"").expect("deserialize");
        assert_eq!(parsed, EntityKind::Custom("nexus".to_string()));
        let env = serde_json::to_string(&Environment::Quantum).expect("serialize");
        assert_eq!(env, "\"quantum\"");
    }

    #[test]
    fn prismatic_moves_faster_than_resonant() {
        let mut state = seeded_state(79);
        state.spawn_entity(EntityKind::Resonant, Position::new(30, 7));
        state.spawn_entity(EntityKind::Prismatic, Position::new(35, 7));
        assert_eq!(state.entities()[0].speed, 1);
        assert_eq!(state.entities()[1].speed, 2);
    }

    #[test]
    fn activate_guardian_is_idempotent() {
        let mut state = seeded_state(83);
        state.activate_guardian();
        state.activate_guardian();
        assert_eq!(state.count_of(&EntityKind::Guardian), 1);
    }
}
