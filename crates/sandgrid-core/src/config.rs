//! Grid configuration - materials, reactions and stepping options, loadable from RON
//!
//! ```ron
//! (
//!     seed: 42,
//!     materials: [
//!         (name: "empty"),
//!         (name: "water", density: 5, vertical_movement: 1, tags: ["liquid"]),
//!         (name: "fire", density: 1, vertical_movement: -1),
//!     ],
//!     reactions: [
//!         (inputs: ("liquid", "fire"), outputs: ("empty", "empty"), probability: 1.0),
//!     ],
//! )
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::simulation::{MaterialDescriptor, MaterialError, ReactionError, SideEffectToken};

/// Default number of ticks between maintenance passes
pub const DEFAULT_MAINTENANCE_INTERVAL: u32 = 64;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Ron(#[from] ron::error::SpannedError),

    #[error("reaction refers to unknown material or tag \"{0}\"")]
    UnknownMaterial(String),

    #[error(transparent)]
    Material(#[from] MaterialError),

    #[error(transparent)]
    Reaction(#[from] ReactionError),
}

/// A reaction written with names. Inputs are tags (a material name is always one of its
/// tags), outputs are material names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactionConfig {
    pub inputs: (String, String),
    pub outputs: (String, String),
    #[serde(default = "default_probability")]
    pub probability: f64,
    #[serde(default)]
    pub side_effect: Option<u64>,
    /// Disabled reactions are kept in the file but not registered
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_probability() -> f64 {
    1.0
}

fn default_enabled() -> bool {
    true
}

impl ReactionConfig {
    pub fn side_effect_token(&self) -> Option<SideEffectToken> {
        self.side_effect.map(SideEffectToken)
    }
}

/// Complete grid configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub seed: u64,

    /// Step bands on the rayon pool. Ignored on wasm.
    pub parallel: bool,

    /// Ticks between maintenance passes, 0 disables maintenance
    pub maintenance_interval: u32,

    /// Index is the material id. Id 0 should be the empty material.
    pub materials: Vec<MaterialDescriptor>,

    pub reactions: Vec<ReactionConfig>,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            parallel: true,
            maintenance_interval: DEFAULT_MAINTENANCE_INTERVAL,
            materials: vec![MaterialDescriptor::empty()],
            reactions: Vec::new(),
        }
    }
}

impl GridConfig {
    pub fn from_ron_str(source: &str) -> Result<Self, ConfigError> {
        let config: GridConfig = ron::from_str(source)?;
        log::debug!(
            "[CONFIG] Parsed {} materials, {} reactions",
            config.materials.len(),
            config.reactions.len()
        );
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        log::info!("[CONFIG] Loading {}", path.display());
        let source = std::fs::read_to_string(path)?;
        Self::from_ron_str(&source)
    }

    pub fn to_ron_string(&self) -> Result<String, ron::Error> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
    }

    /// Material id for `name`, by position in `materials`
    pub fn material_id(&self, name: &str) -> Result<u16, ConfigError> {
        self.materials
            .iter()
            .position(|m| m.name == name)
            .map(|id| id as u16)
            .ok_or_else(|| ConfigError::UnknownMaterial(name.to_string()))
    }
}
