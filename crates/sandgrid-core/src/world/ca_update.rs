//! Cellular automata update logic - per-chunk stepping and material movement
//!
//! A chunk is stepped with its 3x3 neighbourhood borrowed out of the grid. Rows run
//! from the bottom of the active rectangle up, columns alternate direction every tick.
//! Cells that move or react are stamped with the tick's generation so the chunks
//! stepped later in the same tick leave them alone.

use glam::IVec2;

use super::chunk::Chunk;
use super::hooks::SideEffect;
use super::neighborhood::ChunkNeighborhood;
use super::stats::SimStats;
use crate::simulation::{
    Cell, CellRng, Generation, Material, MaterialId, MaterialTable, Movement, ReactionTable,
};

/// Outcome of trying to push a cell into a neighbouring position
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Displacement {
    Blocked,
    Swapped,
    Duplicated,
}

/// Everything a step reads but never writes
#[derive(Clone, Copy)]
pub(crate) struct StepContext<'a> {
    pub materials: &'a MaterialTable,
    pub reactions: &'a ReactionTable,
    pub tick: i64,
    pub generation: Generation,
}

/// Steps a single chunk
pub(crate) struct ChunkStepper<'a> {
    pub(super) hood: &'a mut ChunkNeighborhood,
    pub(super) ctx: StepContext<'a>,
    pub(super) rng: CellRng,
    pub(super) side_effects: &'a mut Vec<SideEffect>,
    pub(super) stats: &'a mut dyn SimStats,
}

/// New cell of `material_id` with darken noise drawn from `rng`
pub(crate) fn placed_cell(material: &Material, material_id: u16, rng: &mut CellRng) -> Cell {
    let mut cell = Cell::new(material_id);
    if material.noise_darken_max > 0 {
        cell.set_darken(rng.gen_range(0, u32::from(material.noise_darken_max) + 1) as u8);
    }
    cell
}

impl<'a> ChunkStepper<'a> {
    pub fn new(
        hood: &'a mut ChunkNeighborhood,
        ctx: StepContext<'a>,
        rng: CellRng,
        side_effects: &'a mut Vec<SideEffect>,
        stats: &'a mut dyn SimStats,
    ) -> Self {
        Self {
            hood,
            ctx,
            rng,
            side_effects,
            stats,
        }
    }

    /// Step every active cell of the center chunk.
    ///
    /// `forced` visits the whole chunk and ignores the cells' active bits.
    pub fn step(mut self, forced: bool) {
        let (rows, columns) = if forced {
            (u32::MAX, u32::MAX)
        } else {
            self.hood.center().active_masks()
        };
        self.hood.center_mut().clear_active();

        let rect = Chunk::rect_from_masks(rows, columns);
        if rect.is_empty() {
            return;
        }

        self.rng.mix(self.ctx.tick as u64);
        let left_to_right = self.ctx.tick & 1 == 0;

        for y in (rect.y_start..rect.y_end).rev() {
            if rows & (1 << y) == 0 {
                continue;
            }
            if left_to_right {
                for x in rect.x_start..rect.x_end {
                    self.step_cell(IVec2::new(x as i32, y as i32), forced);
                }
            } else {
                for x in (rect.x_start..rect.x_end).rev() {
                    self.step_cell(IVec2::new(x as i32, y as i32), forced);
                }
            }
        }
    }

    fn step_cell(&mut self, start: IVec2, forced: bool) {
        let mut cell = self.hood.get(start);

        if !forced && !cell.is_active() {
            return;
        }
        if cell.is_updated(self.ctx.generation) {
            self.hood.activate_point(start, false);
            return;
        }

        let mut pos = start;
        let (reacted, reactive) = self.try_reactions(&mut cell, pos);
        let mut active = reacted || reactive;

        if !reacted {
            active |= self.try_move(&mut cell, &mut pos);
        }

        if active {
            cell.set_active(true);
            cell.mark_updated(self.ctx.generation);
            self.hood.set(pos, cell);
            self.hood.activate_point(pos, false);
        } else {
            cell.set_active(false);
            self.hood.set(pos, cell);
        }
    }

    /// Vertical, then diagonal, then horizontal movement. Returns true if the cell
    /// should stay active.
    fn try_move(&mut self, cell: &mut Cell, pos: &mut IVec2) -> bool {
        let materials = self.ctx.materials;
        let material = materials.get(cell.material_id());
        let vertical = material.vertical_movement;
        let v_dir = if vertical < 0 { -1 } else { 1 };

        if vertical != 0 {
            let mut moved = false;
            for _ in 0..vertical.abs() {
                if self.try_swap(pos, IVec2::new(0, v_dir), material) {
                    moved = true;
                } else {
                    break;
                }
            }

            if !moved {
                let dx = if self.rng.gen_bool() { 1 } else { -1 };
                moved = self.try_swap(pos, IVec2::new(dx, v_dir), material)
                    || self.try_swap(pos, IVec2::new(-dx, v_dir), material);
            }

            if moved {
                cell.set_movement(Movement::Vertical);
                return true;
            }
        }

        let mut dir = cell.movement().horizontal_dir();
        if dir == 0 && self.rng.check_probability_u32(material.horizontal_movement_start_chance) {
            dir = self.rng.gen_sign();
        }
        if dir == 0 {
            cell.set_movement(Movement::None);
            return false;
        }

        self.move_horizontal(cell, pos, dir, v_dir, material)
    }

    fn move_horizontal(
        &mut self,
        cell: &mut Cell,
        pos: &mut IVec2,
        mut dir: i32,
        v_dir: i32,
        material: &Material,
    ) -> bool {
        let mut moved = false;
        let mut moving = true;
        let mut reversed = false;

        // A reversal retries at once and does not use up an attempt
        let mut attempts = 0;
        while attempts < material.horizontal_movement {
            let displacement = if self.try_swap(pos, IVec2::new(dir, v_dir), material) {
                Displacement::Swapped
            } else {
                self.try_push_sideways(cell, pos, dir, material)
            };

            match displacement {
                Displacement::Swapped => {
                    moved = true;
                    attempts += 1;
                    if self
                        .rng
                        .check_probability_u32(material.horizontal_movement_stop_chance)
                    {
                        moving = false;
                        break;
                    }
                }
                Displacement::Duplicated => {
                    moved = true;
                    break;
                }
                Displacement::Blocked => {
                    if material.dissipate_on_horizontal_movement
                        && !self.hood.is_row_active(*pos - IVec2::new(0, v_dir))
                        && self.rng.check_probability_u32(material.dissipation_chance)
                    {
                        *cell = Cell::new(MaterialId::EMPTY);
                        self.hood.activate_neighbors(*pos);
                        self.stats.record_dissipation();
                        return true;
                    }

                    if material.can_reverse_horizontal_movement && !reversed {
                        reversed = true;
                        dir = -dir;
                        continue;
                    }

                    moving = false;
                    break;
                }
            }
        }

        cell.set_movement(if moving {
            Movement::horizontal(dir)
        } else {
            Movement::None
        });
        moved || moving
    }

    /// Swap with the cell at `pos + offset` if it is strictly less dense
    fn try_swap(&mut self, pos: &mut IVec2, offset: IVec2, material: &Material) -> bool {
        let target = *pos + offset;
        if !ChunkNeighborhood::contains(target) {
            return false;
        }

        let mut other = self.hood.get(target);
        if !material.can_displace(self.ctx.materials.get(other.material_id())) {
            return false;
        }

        other.mark_updated(self.ctx.generation);
        self.hood.set(*pos, other);
        self.hood.activate_neighbors(*pos);
        self.hood.activate_neighbors(target);
        *pos = target;
        self.stats.record_cell_moved();
        true
    }

    /// Orthogonal sideways step, which may copy the cell instead of moving it
    fn try_push_sideways(
        &mut self,
        cell: &mut Cell,
        pos: &mut IVec2,
        dir: i32,
        material: &Material,
    ) -> Displacement {
        let target = *pos + IVec2::new(dir, 0);
        if !ChunkNeighborhood::contains(target) {
            return Displacement::Blocked;
        }

        let other = self.hood.get(target);
        if !material.can_displace(self.ctx.materials.get(other.material_id())) {
            return Displacement::Blocked;
        }

        if self
            .rng
            .check_probability_u32(material.horizontal_duplication_chance)
        {
            let mut copy = cell.with_active(true);
            copy.mark_updated(self.ctx.generation);
            self.hood.set(target, copy);
            self.hood.activate_neighbors(*pos);
            self.hood.activate_neighbors(target);
            self.stats.record_cell_moved();
            return Displacement::Duplicated;
        }

        if self.try_swap(pos, IVec2::new(dir, 0), material) {
            Displacement::Swapped
        } else {
            Displacement::Blocked
        }
    }
}
