//! Chemistry system - reactions between a cell and its already-visited neighbours
//!
//! A cell reacts with the row above it and the cell to its left:
//!
//! ```text
//! o o o
//! o @ .
//! . . .
//! ```
//!
//! The remaining neighbours react with it when they are visited themselves.

use glam::IVec2;

use super::ca_update::{ChunkStepper, placed_cell};
use super::hooks::SideEffect;
use crate::simulation::Cell;

/// Neighbour offsets tried in order
const REACTION_OFFSETS: [IVec2; 4] = [
    IVec2::new(-1, -1),
    IVec2::new(0, -1),
    IVec2::new(1, -1),
    IVec2::new(-1, 0),
];

impl ChunkStepper<'_> {
    /// Try each neighbour in turn until one reaction fires.
    ///
    /// Returns `(reacted, reactive)`: whether a reaction fired and whether any neighbour
    /// pair has reactions at all, which keeps the cell active for later ticks.
    pub(super) fn try_reactions(&mut self, cell: &mut Cell, pos: IVec2) -> (bool, bool) {
        let reactions = self.ctx.reactions;
        if reactions.is_empty() {
            return (false, false);
        }

        let mut reactive = false;
        for offset in REACTION_OFFSETS {
            let other_pos = pos + offset;
            let other = self.hood.get(other_pos);
            let lookup = reactions.lookup(cell.material_id(), other.material_id());
            if lookup.is_empty() {
                continue;
            }
            reactive = true;

            let Some(reaction) = lookup
                .reactions
                .iter()
                .find(|r| self.rng.check_probability_u32(r.probability))
            else {
                continue;
            };

            let (cell_out, other_out) = lookup.outputs(reaction);
            log::trace!(
                "[REACTION] #{} at {}: {} + {} -> {} + {}",
                reaction.id(),
                self.hood.world_coord(pos),
                cell.material_id(),
                other.material_id(),
                cell_out,
                other_out
            );

            if cell.material_id() != cell_out {
                *cell = placed_cell(self.ctx.materials.get(cell_out), cell_out, &mut self.rng);
                self.hood.activate_neighbors(pos);
            }

            if other.material_id() != other_out {
                let mut replaced =
                    placed_cell(self.ctx.materials.get(other_out), other_out, &mut self.rng);
                replaced.mark_updated(self.ctx.generation);
                self.hood.set(other_pos, replaced);
                self.hood.activate_neighbors(other_pos);
            }

            if let Some(token) = reaction.side_effect {
                self.side_effects.push(SideEffect {
                    coord: self.hood.world_coord(pos),
                    token,
                });
            }
            self.stats.record_reaction();
            return (true, true);
        }

        (false, reactive)
    }
}
