//! Lookup of entity types to glyph patterns and descriptive metadata.
//!
//! The six built-in types carry their pattern variants as static data;
//! custom types registered at runtime contribute exactly one variant each.
//! Lookups never fail: unknown types resolve to a small placeholder glyph.

use crate::{Environment, EntityKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Glyph substituted when a type is absent from both registries.
pub const PLACEHOLDER_PATTERN: [&str; 3] = ["*", "/|\\", "/ \\"];

const RESONANT_PATTERNS: [&[&str]; 2] = [
    &["  ·  ", " / \\ ", " / \\ ", " · · "],
    &["  *  ", " / \\ ", " / \\ ", " · · "],
];

const PRISMATIC_PATTERNS: [&[&str]; 2] = [
    &[
        "   ✧   ", "  /|\\  ", " / | \\ ", " / | \\ ", " · | · ", " / | \\ ", " · | · ",
    ],
    &[
        "   *   ", "  /|\\  ", " / | \\ ", " / | \\ ", " · | · ", " / | \\ ", " · | · ",
    ],
];

const WEAVER_PATTERNS: [&[&str]; 1] = [&[
    "  .·····.  ",
    " /       \\ ",
    " /  ·  ·  \\ ",
    " | \\   / | ",
    " |  \\ /  | ",
    " |   ·   | ",
    " \\  ···  / ",
    " \\ ·   · / ",
    "  `·····´  ",
]];

const DANCER_PATTERNS: [&[&str]; 3] = [
    &[" ✧ · ✧ ", "  \\|/  ", " --*-- ", "  /|\\  ", " ✧ · ✧ "],
    &["       ", "   ·   ", "       ", "   ·   ", "       "],
    &[" · ✧ · ", "  /|\\  ", " --*-- ", "  \\|/  ", " · ✧ · "],
];

const COLLECTIVE_PATTERNS: [&[&str]; 1] = [&[
    "  .·'·.  ",
    " .'   '. ",
    " /  ✧  \\ ",
    " | ✧ ✧ | ",
    " |     | ",
    " | ✧ ✧ | ",
    " \\  ✧  / ",
    " '.   .' ",
    "  `·.·´  ",
]];

const GUARDIAN_PATTERNS: [&[&str]; 2] = [
    &[
        "       ✷✷✷       ",
        "      ✷   ✷      ",
        "     ✷     ✷     ",
        "    ✷       ✷    ",
        "   ✷    ✶    ✷   ",
        "  ✷   ✶   ✶   ✷  ",
        " ✷   ✶     ✶   ✷ ",
        "✷✷✷✷✷✷✷✷✷✷✷✷✷✷✷✷✷",
        "  \\     |     /  ",
        "   \\    |    /   ",
        "    \\   |   /    ",
        "     \\  |  /     ",
        "      \\ | /      ",
        "       \\|/       ",
        "        ✶        ",
    ],
    &[
        "       ✷✷✷       ",
        "      ✷   ✷      ",
        "     ✷     ✷     ",
        "    ✷       ✷    ",
        "   ✷    ✶    ✷   ",
        "  ✷   ✶   ✶   ✷  ",
        " ✷   ✶     ✶   ✷ ",
        "✷✷✷✷✷✷✷✷✷✷✷✷✷✷✷✷✷",
        "  /     |     \\  ",
        " /      |      \\ ",
        " \\      |      / ",
        "  \\     |     /  ",
        "   \\    |    /   ",
        "     \\  |  /     ",
        "      \\ | /      ",
        "        ✶        ",
    ],
];

const TRANQUIL_BACKDROP: [&str; 7] = [
    "~~~~~~~~~~~~~~~~~~~~~~~",
    "~    ~    ~    ~    ~ ~",
    "  ~    ~    ~    ~    ~",
    "~   ~    ~    ~    ~   ",
    " ~    ~    ~    ~    ~ ",
    "~    ~    ~    ~    ~  ",
    "~~~~~~~~~~~~~~~~~~~~~~~",
];

const HARMONIC_BACKDROP: [&str; 6] = [
    "≈≈≈≈≈≈≈≈≈≈≈≈≈≈≈≈≈≈≈≈≈≈≈",
    "≈ ≈ ≈ ~ ~ ~ ≈ ≈ ≈ ≈ ≈ ≈",
    "≈ ≈ ~ ~ ~ ~ ~ ≈ ≈ ≈ ≈ ≈",
    "≈ ~ ~ ~ ~ ~ ~ ~ ≈ ≈ ≈ ≈",
    "~ ~ ~ ~ ~ ~ ~ ~ ~ ~ ≈ ≈",
    "≈≈≈≈≈≈≈≈≈≈≈≈≈≈≈≈≈≈≈≈≈≈≈",
];

const PRISMATIC_BACKDROP: [&str; 6] = [
    "*//*//*//*//*//*//*//*//",
    "//*//*//*//*//*//*//*//*",
    "*//*//*//*//*//*//*//*//",
    "//*//*//*//*//*//*//*//*",
    "*//*//*//*//*//*//*//*//",
    "//*//*//*//*//*//*//*//*",
];

const QUANTUM_BACKDROP: [&str; 6] = [
    "◊◊◊◊◊◊◊◊◊◊◊◊◊◊◊◊◊◊◊◊◊◊◊",
    "◊ ◊ ◊ ◊ ◊ ◊ ◊ ◊ ◊ ◊ ◊ ◊",
    "◊  ◊  ◊  ◊  ◊  ◊  ◊  ◊ ",
    " ◊  ◊  ◊  ◊  ◊  ◊  ◊  ◊",
    "  ◊  ◊  ◊  ◊  ◊  ◊  ◊ ◊",
    "◊◊◊◊◊◊◊◊◊◊◊◊◊◊◊◊◊◊◊◊◊◊◊",
];

/// Backdrop glyph pattern painted behind the entities for an environment.
#[must_use]
pub fn environment_backdrop(environment: Environment) -> &'static [&'static str] {
    match environment {
        Environment::Tranquil => &TRANQUIL_BACKDROP,
        Environment::Harmonic => &HARMONIC_BACKDROP,
        Environment::Prismatic => &PRISMATIC_BACKDROP,
        Environment::Quantum => &QUANTUM_BACKDROP,
    }
}

fn builtin_patterns(kind: &EntityKind) -> Option<&'static [&'static [&'static str]]> {
    match kind {
        EntityKind::Resonant => Some(&RESONANT_PATTERNS),
        EntityKind::Prismatic => Some(&PRISMATIC_PATTERNS),
        EntityKind::Weaver => Some(&WEAVER_PATTERNS),
        EntityKind::Dancer => Some(&DANCER_PATTERNS),
        EntityKind::Collective => Some(&COLLECTIVE_PATTERNS),
        EntityKind::Guardian => Some(&GUARDIAN_PATTERNS),
        EntityKind::Custom(_) => None,
    }
}

fn builtin_description(kind: &EntityKind) -> Option<&'static str> {
    match kind {
        EntityKind::Resonant => Some(
            "Simple entities that respond to resonance fields in the ecosystem. They move in patterns that reflect the overall harmony of the system. Resonants are the most common entity type and often serve as building blocks for more complex entities.",
        ),
        EntityKind::Prismatic => Some(
            "Fast-moving entities that drift through dimensional boundaries. Prismatic Drifters can traverse multiple planes of existence simultaneously, leaving trails of energy that influence nearby entities. They're known for their unpredictable movement patterns.",
        ),
        EntityKind::Weaver => Some(
            "Entities that weave thought patterns into the fabric of the ecosystem. Thought Weavers emerge when Resonants harmonize near Prismatic Drifters, creating complex structures that process and transform information flows.",
        ),
        EntityKind::Dancer => Some(
            "Entities that dance through the void between dimensions. Void Dancers move with grace and purpose, creating ripples in the etheric field that can influence the behavior of other entities. They form from the interaction of Prismatic Drifters and Thought Weavers.",
        ),
        EntityKind::Collective => Some(
            "Highly evolved entities that represent collective consciousness. Crystalline Collectives form under conditions of high harmony and complexity, creating a networked intelligence that can process multiple information streams simultaneously.",
        ),
        EntityKind::Guardian => Some(
            "The Etheric Guardian oversees the ecosystem, maintaining balance and facilitating evolution. It exists across all dimensional planes simultaneously and can influence parameters directly. The Guardian's mood and focus shift over time, affecting its interactions with the ecosystem.",
        ),
        EntityKind::Custom(_) => None,
    }
}

fn builtin_properties(kind: &EntityKind) -> Option<[&'static str; 3]> {
    match kind {
        EntityKind::Resonant => Some([
            "Responds to resonance fields",
            "Forms simple movement patterns",
            "Can combine to form more complex entities",
        ]),
        EntityKind::Prismatic => Some([
            "Moves quickly through dimensional boundaries",
            "Creates energy trails that influence other entities",
            "Unpredictable movement patterns",
        ]),
        EntityKind::Weaver => Some([
            "Processes information flows",
            "Creates thought structures",
            "Forms from Resonant and Prismatic interaction",
        ]),
        EntityKind::Dancer => Some([
            "Creates ripples in the etheric field",
            "Influences behavior of nearby entities",
            "Forms from Prismatic and Weaver interaction",
        ]),
        EntityKind::Collective => Some([
            "Represents networked intelligence",
            "Processes multiple information streams",
            "Forms under high harmony and complexity",
        ]),
        EntityKind::Guardian => Some([
            "Exists across all dimensional planes",
            "Can influence ecosystem parameters",
            "Mood and focus shift over time",
        ]),
        EntityKind::Custom(_) => None,
    }
}

fn builtin_display_name(kind: &EntityKind) -> Option<&'static str> {
    match kind {
        EntityKind::Resonant => Some("Resonant Entities"),
        EntityKind::Prismatic => Some("Prismatic Drifters"),
        EntityKind::Weaver => Some("Thought Weavers"),
        EntityKind::Dancer => Some("Void Dancers"),
        EntityKind::Collective => Some("Crystalline Collectives"),
        EntityKind::Guardian => Some("Etheric Guardian"),
        EntityKind::Custom(_) => None,
    }
}

/// Metadata supplied when registering a custom entity type at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomEntityDef {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub properties: [String; 3],
    pub color_class: String,
    pub pattern: Vec<String>,
}

/// Errors raised when registering custom entity types.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("entity type name must not be empty")]
    EmptyName,
    #[error("custom pattern must contain at least one line")]
    EmptyPattern,
    #[error("entity type `{0}` is already registered")]
    Duplicate(String),
}

/// String-keyed registry resolving entity types to pattern variants.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityRegistry {
    custom: HashMap<String, CustomEntityDef>,
}

impl EntityRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a custom entity type with a single pattern variant.
    pub fn register_custom(&mut self, def: CustomEntityDef) -> Result<(), RegistryError> {
        if def.name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if def.pattern.is_empty() {
            return Err(RegistryError::EmptyPattern);
        }
        let builtin = EntityKind::from(def.name.clone());
        if builtin_patterns(&builtin).is_some() || self.custom.contains_key(&def.name) {
            return Err(RegistryError::Duplicate(def.name));
        }
        self.custom.insert(def.name.clone(), def);
        Ok(())
    }

    /// Whether the type resolves to real pattern data (not the placeholder).
    #[must_use]
    pub fn is_known(&self, kind: &EntityKind) -> bool {
        builtin_patterns(kind).is_some() || self.custom.contains_key(kind.name())
    }

    /// Number of pattern variants for the type; at least 1 (placeholder).
    #[must_use]
    pub fn variant_count(&self, kind: &EntityKind) -> usize {
        builtin_patterns(kind).map_or(1, <[_]>::len)
    }

    /// All pattern variants for the type, or `None` on a lookup miss.
    #[must_use]
    pub fn resolve(&self, kind: &EntityKind) -> Option<Vec<Vec<String>>> {
        if let Some(patterns) = builtin_patterns(kind) {
            return Some(
                patterns
                    .iter()
                    .map(|lines| lines.iter().map(|line| (*line).to_string()).collect())
                    .collect(),
            );
        }
        self.custom
            .get(kind.name())
            .map(|def| vec![def.pattern.clone()])
    }

    /// The variant selected by an animation frame, placeholder on miss.
    #[must_use]
    pub fn variant(&self, kind: &EntityKind, frame: usize) -> Vec<String> {
        match self.resolve(kind) {
            Some(variants) => variants[frame % variants.len()].clone(),
            None => PLACEHOLDER_PATTERN.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    /// First pattern variant; used when stamping a pattern onto a new entity.
    #[must_use]
    pub fn first_pattern(&self, kind: &EntityKind) -> Vec<String> {
        self.variant(kind, 0)
    }

    /// Human-facing display name for codex and UI surfaces.
    #[must_use]
    pub fn display_name(&self, kind: &EntityKind) -> String {
        if let Some(name) = builtin_display_name(kind) {
            return name.to_string();
        }
        match self.custom.get(kind.name()) {
            Some(def) => def.display_name.clone(),
            None => kind.capitalized_name(),
        }
    }

    /// Free-text description, if the type carries one.
    #[must_use]
    pub fn description(&self, kind: &EntityKind) -> Option<&str> {
        if let Some(text) = builtin_description(kind) {
            return Some(text);
        }
        self.custom.get(kind.name()).map(|def| def.description.as_str())
    }

    /// The three characteristic properties of a known type.
    #[must_use]
    pub fn properties(&self, kind: &EntityKind) -> Option<[&str; 3]> {
        if let Some(props) = builtin_properties(kind) {
            return Some(props);
        }
        self.custom.get(kind.name()).map(|def| {
            [
                def.properties[0].as_str(),
                def.properties[1].as_str(),
                def.properties[2].as_str(),
            ]
        })
    }

    /// Color class tag used by presentation layers.
    #[must_use]
    pub fn color_class(&self, kind: &EntityKind) -> String {
        match self.custom.get(kind.name()) {
            Some(def) => def.color_class.clone(),
            None => format!("entity-{}", kind.name()),
        }
    }

    /// Names of every dynamically registered type, sorted for stable output.
    #[must_use]
    pub fn custom_types(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.custom.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn custom_def(&self, name: &str) -> Option<&CustomEntityDef> {
        self.custom.get(name)
    }
}
