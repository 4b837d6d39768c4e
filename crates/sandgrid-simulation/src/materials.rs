//! Material definitions and registry

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cell::cell_fields::{MAX_DARKEN, MAX_MATERIAL_ID};
use crate::rng::probability_threshold;

/// Built-in material IDs
pub struct MaterialId;

impl MaterialId {
    /// Empty space. Always present at index 0.
    pub const EMPTY: u16 = 0;

    /// Highest id that fits in a cell
    pub const MAX: u16 = MAX_MATERIAL_ID;
}

/// Limits applied when a descriptor is loaded
pub const MAX_VERTICAL_MOVEMENT: i32 = 16;
pub const MAX_HORIZONTAL_MOVEMENT: i32 = 16;

/// Default chance for a blocked surface cell to vanish (about 0.2%)
pub const DEFAULT_DISSIPATION_CHANCE: f32 = 0.002;

/// How bodies collide with a material
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollisionClass {
    #[default]
    None,
    Solid,
    Platform,
    Liquid,
}

impl CollisionClass {
    /// Flag value used by collision queries (bit set per class)
    pub fn bits(self) -> u8 {
        match self {
            CollisionClass::None => 0,
            CollisionClass::Solid => 1,
            CollisionClass::Platform => 2,
            CollisionClass::Liquid => 4,
        }
    }

    pub fn blocks_bodies(self) -> bool {
        matches!(self, CollisionClass::Solid | CollisionClass::Platform)
    }
}

/// User-facing description of a material, as loaded from configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialDescriptor {
    pub name: String,

    /// Extra names reactions can match on. The material's own name always counts.
    pub tags: Vec<String>,

    pub collision: CollisionClass,

    /// Can swap with strictly less dense cells
    pub density: i32,

    /// Vertical steps per tick, negative rises. 0 for static materials.
    pub vertical_movement: i32,

    /// Horizontal steps per tick while moving sideways (at least 1)
    pub horizontal_movement: i32,
    /// Chance to begin moving sideways when vertical movement is blocked
    pub horizontal_movement_start_chance: f32,
    /// Chance to stop after each sideways step
    pub horizontal_movement_stop_chance: f32,
    /// Chance for a sideways step to copy the cell instead of swapping
    pub horizontal_duplication_chance: f32,

    /// Surface cells may vanish when blocked sideways, so a fluid layer eventually settles
    pub dissipate_on_horizontal_movement: bool,
    pub dissipation_chance: f32,

    /// When blocked sideways, turn around once instead of stopping
    pub can_reverse_horizontal_movement: bool,

    /// Newly placed cells are darkened by up to this amount
    pub noise_darken_max: u8,

    pub can_color: bool,
}

impl Default for MaterialDescriptor {
    fn default() -> Self {
        Self {
            name: "unknown".to_string(),
            tags: Vec::new(),
            collision: CollisionClass::None,
            density: 0,
            vertical_movement: 0,
            horizontal_movement: 1,
            horizontal_movement_start_chance: 0.0,
            horizontal_movement_stop_chance: 1.0,
            horizontal_duplication_chance: 0.0,
            dissipate_on_horizontal_movement: false,
            dissipation_chance: DEFAULT_DISSIPATION_CHANCE,
            can_reverse_horizontal_movement: false,
            noise_darken_max: 0,
            can_color: false,
        }
    }
}

impl MaterialDescriptor {
    pub fn empty() -> Self {
        Self {
            name: "empty".to_string(),
            ..Default::default()
        }
    }
}

/// Material as used by the stepper: values clamped, probabilities in fixed point
#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub name: String,
    pub tags: Vec<String>,
    pub collision: CollisionClass,
    pub density: i32,
    pub vertical_movement: i32,
    pub horizontal_movement: i32,
    pub horizontal_movement_start_chance: u32,
    pub horizontal_movement_stop_chance: u32,
    pub horizontal_duplication_chance: u32,
    pub dissipate_on_horizontal_movement: bool,
    pub dissipation_chance: u32,
    pub can_reverse_horizontal_movement: bool,
    pub noise_darken_max: u8,
    pub can_color: bool,
}

impl Material {
    fn from_descriptor(id: usize, desc: &MaterialDescriptor) -> Self {
        let vertical_movement = desc
            .vertical_movement
            .clamp(-MAX_VERTICAL_MOVEMENT, MAX_VERTICAL_MOVEMENT);
        if vertical_movement != desc.vertical_movement {
            log::warn!(
                "[MATERIAL] {} ({}): vertical_movement {} clamped to {}",
                desc.name,
                id,
                desc.vertical_movement,
                vertical_movement
            );
        }

        let horizontal_movement = desc.horizontal_movement.clamp(1, MAX_HORIZONTAL_MOVEMENT);
        if horizontal_movement != desc.horizontal_movement {
            log::warn!(
                "[MATERIAL] {} ({}): horizontal_movement {} clamped to {}",
                desc.name,
                id,
                desc.horizontal_movement,
                horizontal_movement
            );
        }

        let noise_darken_max = desc.noise_darken_max.min(MAX_DARKEN);
        if noise_darken_max != desc.noise_darken_max {
            log::warn!(
                "[MATERIAL] {} ({}): noise_darken_max {} clamped to {}",
                desc.name,
                id,
                desc.noise_darken_max,
                noise_darken_max
            );
        }

        Self {
            name: desc.name.clone(),
            tags: desc.tags.clone(),
            collision: desc.collision,
            density: desc.density,
            vertical_movement,
            horizontal_movement,
            horizontal_movement_start_chance: probability_threshold(f64::from(
                desc.horizontal_movement_start_chance,
            )),
            horizontal_movement_stop_chance: probability_threshold(f64::from(
                desc.horizontal_movement_stop_chance,
            )),
            horizontal_duplication_chance: probability_threshold(f64::from(
                desc.horizontal_duplication_chance,
            )),
            dissipate_on_horizontal_movement: desc.dissipate_on_horizontal_movement,
            dissipation_chance: probability_threshold(f64::from(desc.dissipation_chance)),
            can_reverse_horizontal_movement: desc.can_reverse_horizontal_movement,
            noise_darken_max,
            can_color: desc.can_color,
        }
    }

    /// Matches its own name or one of its extra tags
    pub fn has_tag(&self, tag: &str) -> bool {
        self.name == tag || self.tags.iter().any(|t| t == tag)
    }

    /// True if this material can displace `other`
    #[inline]
    pub fn can_displace(&self, other: &Material) -> bool {
        self.density > other.density
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MaterialError {
    #[error("too many materials: {count} (at most {max})")]
    TooMany { count: usize, max: usize },
}

/// Registry of all materials, indexed by material id
pub struct MaterialTable {
    materials: Vec<Material>,
}

impl MaterialTable {
    /// Table holding only the empty material
    pub fn new() -> Self {
        Self {
            materials: vec![Material::from_descriptor(0, &MaterialDescriptor::empty())],
        }
    }

    /// Replace every material. Index in `descriptors` is the material id.
    ///
    /// An empty list keeps a single empty material at id 0.
    pub fn configure(&mut self, descriptors: &[MaterialDescriptor]) -> Result<(), MaterialError> {
        let max = usize::from(MaterialId::MAX) + 1;
        if descriptors.len() > max {
            log::error!(
                "[MATERIAL] Rejected {} materials (at most {})",
                descriptors.len(),
                max
            );
            return Err(MaterialError::TooMany {
                count: descriptors.len(),
                max,
            });
        }

        if descriptors.is_empty() {
            *self = Self::new();
            return Ok(());
        }

        self.materials = descriptors
            .iter()
            .enumerate()
            .map(|(id, desc)| Material::from_descriptor(id, desc))
            .collect();

        log::info!("[MATERIAL] Configured {} materials", self.materials.len());
        Ok(())
    }

    /// Get material by ID, falling back to the empty material for unknown ids
    #[inline]
    pub fn get(&self, id: u16) -> &Material {
        self.materials
            .get(usize::from(id))
            .unwrap_or(&self.materials[0])
    }

    pub fn contains(&self, id: u16) -> bool {
        usize::from(id) < self.materials.len()
    }

    /// Find a material id by name
    pub fn find(&self, name: &str) -> Option<u16> {
        self.materials
            .iter()
            .position(|m| m.name == name)
            .map(|id| id as u16)
    }

    /// Ids of every material carrying `tag`, in id order
    pub fn with_tag(&self, tag: &str) -> Vec<u16> {
        self.iter()
            .filter(|(_, m)| m.has_tag(tag))
            .map(|(id, _)| id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, &Material)> {
        self.materials
            .iter()
            .enumerate()
            .map(|(id, m)| (id as u16, m))
    }
}

impl Default for MaterialTable {
    fn default() -> Self {
        Self::new()
    }
}
