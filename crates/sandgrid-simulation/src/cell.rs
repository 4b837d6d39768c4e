//! Cell encoding and chunk constants
//!
//! A cell is a single `u32`. Field layout, low bit first:
//!
//! | bits   | field              |
//! |--------|--------------------|
//! | 0..12  | material id        |
//! | 12..14 | movement           |
//! | 14..16 | updated generation |
//! | 16     | active             |
//! | 17..20 | flow               |
//! | 20..24 | darken             |
//! | 24..32 | color              |

use serde::{Deserialize, Serialize};
use std::fmt;

/// Size of a chunk in cells (32x32)
pub const CHUNK_SIZE: usize = 32;

/// Total cells in a chunk
pub const CHUNK_AREA: usize = CHUNK_SIZE * CHUNK_SIZE;

/// Bit layout of a cell word
pub mod cell_fields {
    pub const MATERIAL_SHIFT: u32 = 0;
    pub const MATERIAL_MASK: u32 = 0xFFF << MATERIAL_SHIFT;

    pub const MOVEMENT_SHIFT: u32 = 12;
    pub const MOVEMENT_MASK: u32 = 0b11 << MOVEMENT_SHIFT;

    /// Alternates between 1, 2 and 3. 0 means the cell was never updated (always visit).
    pub const UPDATED_SHIFT: u32 = 14;
    pub const UPDATED_MASK: u32 = 0b11 << UPDATED_SHIFT;

    pub const ACTIVE_SHIFT: u32 = 16;
    pub const ACTIVE_MASK: u32 = 1 << ACTIVE_SHIFT;

    pub const FLOW_SHIFT: u32 = 17;
    pub const FLOW_MASK: u32 = 0b111 << FLOW_SHIFT;

    pub const DARKEN_SHIFT: u32 = 20;
    pub const DARKEN_MASK: u32 = 0xF << DARKEN_SHIFT;

    pub const COLOR_SHIFT: u32 = 24;
    pub const COLOR_MASK: u32 = 0xFF << COLOR_SHIFT;

    pub const MAX_MATERIAL_ID: u16 = 0xFFF;
    pub const MAX_FLOW: u8 = 0b111;
    pub const MAX_DARKEN: u8 = 0xF;

    /// Every field mask, in layout order
    pub const ALL: [u32; 7] = [
        MATERIAL_MASK,
        MOVEMENT_MASK,
        UPDATED_MASK,
        ACTIVE_MASK,
        FLOW_MASK,
        DARKEN_MASK,
        COLOR_MASK,
    ];

    /// Bits that only matter while stepping
    pub const TRANSIENT_MASK: u32 = UPDATED_MASK | ACTIVE_MASK;

    // Field masks must not overlap and must cover the whole word.
    const _: () = {
        let mut union = 0u32;
        let mut total = 0u32;
        let mut i = 0;
        while i < ALL.len() {
            assert!(union & ALL[i] == 0);
            union |= ALL[i];
            total += ALL[i].count_ones();
            i += 1;
        }
        assert!(union == u32::MAX);
        assert!(total == 32);
    };
}

use cell_fields::*;

/// Horizontal movement state kept across ticks
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Movement {
    #[default]
    None = 0,
    Left = 1,
    Vertical = 2,
    Right = 3,
}

impl Movement {
    pub fn from_bits(bits: u32) -> Self {
        match bits & 0b11 {
            0 => Movement::None,
            1 => Movement::Left,
            2 => Movement::Vertical,
            _ => Movement::Right,
        }
    }

    pub fn bits(self) -> u32 {
        self as u32
    }

    /// Movement for a horizontal direction (-1 or 1)
    pub fn horizontal(dir: i32) -> Self {
        debug_assert!(dir == -1 || dir == 1, "horizontal dir must be -1 or 1");
        if dir < 0 {
            Movement::Left
        } else {
            Movement::Right
        }
    }

    /// -1 for left, 1 for right, 0 otherwise
    pub fn horizontal_dir(self) -> i32 {
        match self {
            Movement::Left => -1,
            Movement::Right => 1,
            Movement::None | Movement::Vertical => 0,
        }
    }

    pub fn is_horizontal(self) -> bool {
        matches!(self, Movement::Left | Movement::Right)
    }
}

/// Rotating per-tick marker stored in the updated field (1, 2 or 3)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Generation(u8);

impl Generation {
    pub fn from_tick(tick: i64) -> Self {
        Self(tick.rem_euclid(3) as u8 + 1)
    }

    pub fn value(self) -> u32 {
        u32::from(self.0)
    }

    pub fn next(self) -> Self {
        Self(self.0 % 3 + 1)
    }
}

/// A single packed cell
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Cell(pub u32);

impl Cell {
    pub const EMPTY: Cell = Cell(0);

    /// Active cell of `material_id` with every other field cleared
    pub fn new(material_id: u16) -> Self {
        Self::EMPTY.with_material_id(material_id)
    }

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.material_id() == 0
    }

    #[inline]
    pub fn material_id(self) -> u16 {
        ((self.0 & MATERIAL_MASK) >> MATERIAL_SHIFT) as u16
    }

    /// Changing the material also activates the cell.
    #[inline]
    pub fn with_material_id(self, material_id: u16) -> Self {
        debug_assert!(material_id <= MAX_MATERIAL_ID, "material id out of range");
        Self(
            (self.0 & !MATERIAL_MASK)
                | ((u32::from(material_id) << MATERIAL_SHIFT) & MATERIAL_MASK)
                | ACTIVE_MASK,
        )
    }

    #[inline]
    pub fn set_material_id(&mut self, material_id: u16) {
        *self = self.with_material_id(material_id);
    }

    #[inline]
    pub fn movement(self) -> Movement {
        Movement::from_bits((self.0 & MOVEMENT_MASK) >> MOVEMENT_SHIFT)
    }

    #[inline]
    pub fn with_movement(self, movement: Movement) -> Self {
        Self((self.0 & !MOVEMENT_MASK) | (movement.bits() << MOVEMENT_SHIFT))
    }

    #[inline]
    pub fn set_movement(&mut self, movement: Movement) {
        *self = self.with_movement(movement);
    }

    #[inline]
    pub fn is_active(self) -> bool {
        self.0 & ACTIVE_MASK != 0
    }

    /// Deactivating also resets the updated generation so the cell is never skipped later.
    #[inline]
    pub fn set_active(&mut self, active: bool) {
        if active {
            self.0 |= ACTIVE_MASK;
        } else {
            self.0 &= !(ACTIVE_MASK | UPDATED_MASK);
        }
    }

    #[inline]
    pub fn with_active(mut self, active: bool) -> Self {
        self.set_active(active);
        self
    }

    /// Raw updated field (0 = never updated)
    #[inline]
    pub fn updated_generation(self) -> u32 {
        (self.0 & UPDATED_MASK) >> UPDATED_SHIFT
    }

    #[inline]
    pub fn is_updated(self, generation: Generation) -> bool {
        self.updated_generation() == generation.value()
    }

    #[inline]
    pub fn mark_updated(&mut self, generation: Generation) {
        self.0 = (self.0 & !UPDATED_MASK) | (generation.value() << UPDATED_SHIFT);
    }

    #[inline]
    pub fn flow(self) -> u8 {
        ((self.0 & FLOW_MASK) >> FLOW_SHIFT) as u8
    }

    #[inline]
    pub fn set_flow(&mut self, flow: u8) {
        debug_assert!(flow <= MAX_FLOW, "flow out of range");
        self.0 = (self.0 & !FLOW_MASK) | ((u32::from(flow) << FLOW_SHIFT) & FLOW_MASK);
    }

    #[inline]
    pub fn darken(self) -> u8 {
        ((self.0 & DARKEN_MASK) >> DARKEN_SHIFT) as u8
    }

    #[inline]
    pub fn set_darken(&mut self, darken: u8) {
        debug_assert!(darken <= MAX_DARKEN, "darken out of range");
        self.0 = (self.0 & !DARKEN_MASK) | ((u32::from(darken) << DARKEN_SHIFT) & DARKEN_MASK);
    }

    #[inline]
    pub fn color(self) -> u8 {
        ((self.0 & COLOR_MASK) >> COLOR_SHIFT) as u8
    }

    #[inline]
    pub fn set_color(&mut self, color: u8) {
        self.0 = (self.0 & !COLOR_MASK) | (u32::from(color) << COLOR_SHIFT);
    }

    /// Copy without the active flag and updated generation
    pub fn cleaned(self) -> Self {
        Self(self.0 & !TRANSIENT_MASK)
    }
}

impl From<u32> for Cell {
    fn from(bits: u32) -> Self {
        Self(bits)
    }
}

impl From<Cell> for u32 {
    fn from(cell: Cell) -> Self {
        cell.0
    }
}

impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cell")
            .field("material_id", &self.material_id())
            .field("movement", &self.movement())
            .field("updated", &self.updated_generation())
            .field("active", &self.is_active())
            .field("flow", &self.flow())
            .field("darken", &self.darken())
            .field("color", &self.color())
            .finish()
    }
}
