//! Grid - owns every chunk and table, and orchestrates stepping

use glam::IVec2;
use smallvec::{SmallVec, smallvec};

#[cfg(not(target_arch = "wasm32"))]
use rayon::prelude::*;

use super::ca_update::{ChunkStepper, StepContext, placed_cell};
use super::chunk::{Chunk, ChunkFlags, ChunkRect};
use super::chunk_manager::{ChunkManager, ChunkMap, chunk_key};
use super::cursor::{ChunkCursor, FloodFillCursor, GridCursor, LineCoords, RectCoords};
use super::hooks::{EvictionPolicy, GenerationPass, SideEffect, SideEffectHandler};
use super::neighborhood::ChunkNeighborhood;
use super::stats::{SimStats, StepSummary};
use crate::config::{ConfigError, DEFAULT_MAINTENANCE_INTERVAL, GridConfig};
use crate::simulation::{
    CHUNK_SIZE, Cell, CellRng, Generation, MaterialDescriptor, MaterialError, MaterialTable,
    ReactionError, ReactionHandle, ReactionTable, SideEffectToken,
};

/// One chunk column of a pass, stepped by a single worker
struct Band {
    /// The 3x3 neighbourhoods of every chunk in `steps`, moved out of the grid
    chunks: ChunkMap,
    /// (chunk, forced), bottom chunk first
    steps: SmallVec<[(IVec2, bool); 4]>,
    side_effects: Vec<SideEffect>,
    summary: StepSummary,
}

impl Band {
    fn run(&mut self, ctx: StepContext<'_>, seed: u64) {
        #[cfg(feature = "profiling")]
        puffin::profile_function!();

        for &(coord, forced) in &self.steps {
            let mut hood = ChunkNeighborhood::take(&mut self.chunks, coord);
            let rng = CellRng::new(seed.wrapping_add(chunk_key(coord)));

            ChunkStepper::new(
                &mut hood,
                ctx,
                rng,
                &mut self.side_effects,
                &mut self.summary,
            )
            .step(forced);

            let center = hood.center_mut();
            center.last_step_tick = ctx.tick;
            center.flags.remove(ChunkFlags::FORCE_STEP);
            hood.restore(&mut self.chunks);
            self.summary.record_chunk_stepped();
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn run_bands(bands: &mut [Band], ctx: StepContext<'_>, seed: u64, parallel: bool) {
    if parallel {
        bands.par_iter_mut().for_each(|band| band.run(ctx, seed));
    } else {
        bands.iter_mut().for_each(|band| band.run(ctx, seed));
    }
}

#[cfg(target_arch = "wasm32")]
fn run_bands(bands: &mut [Band], ctx: StepContext<'_>, seed: u64, _parallel: bool) {
    bands.iter_mut().for_each(|band| band.run(ctx, seed));
}

/// A sparse, chunked cell grid
pub struct Grid {
    chunks: ChunkManager,
    materials: MaterialTable,
    reactions: ReactionTable,

    tick: i64,
    seed: u64,
    parallel: bool,
    maintenance_interval: u32,

    /// Step every chunk regardless of activity
    force_step: bool,
    /// Chunks last stepped before this tick are force stepped
    last_modified_tick: i64,

    generation_passes: Vec<Box<dyn GenerationPass>>,
    eviction_policy: Option<Box<dyn EvictionPolicy>>,
    side_effect_handler: Option<Box<dyn SideEffectHandler>>,
    /// Side effects waiting for `drain_side_effects` when no handler is set
    pending_side_effects: Vec<SideEffect>,
}

impl Grid {
    /// Empty grid holding only the empty material
    pub fn new() -> Self {
        Self {
            chunks: ChunkManager::new(),
            materials: MaterialTable::new(),
            reactions: ReactionTable::new(),
            tick: 0,
            seed: 0,
            parallel: true,
            maintenance_interval: DEFAULT_MAINTENANCE_INTERVAL,
            force_step: false,
            last_modified_tick: 0,
            generation_passes: Vec::new(),
            eviction_policy: None,
            side_effect_handler: None,
            pending_side_effects: Vec::new(),
        }
    }

    /// Build a grid from a configuration, resolving reaction material names
    pub fn from_config(config: &GridConfig) -> Result<Self, ConfigError> {
        let mut grid = Self::new();
        grid.seed = config.seed;
        grid.parallel = config.parallel;
        grid.maintenance_interval = config.maintenance_interval;
        grid.configure_materials(&config.materials)?;

        for reaction in config.reactions.iter().filter(|r| r.enabled) {
            for tag in [&reaction.inputs.0, &reaction.inputs.1] {
                if grid.materials.with_tag(tag).is_empty() {
                    return Err(ConfigError::UnknownMaterial(tag.clone()));
                }
            }
            let out1 = config.material_id(&reaction.outputs.0)?;
            let out2 = config.material_id(&reaction.outputs.1)?;
            grid.add_reaction_by_tag(
                &reaction.inputs.0,
                &reaction.inputs.1,
                out1,
                out2,
                reaction.probability,
                reaction.side_effect_token(),
            )?;
        }

        log::info!(
            "[GRID] Created from config: {} materials, {} reactions, seed {}",
            grid.materials.len(),
            grid.reactions.len(),
            grid.seed
        );
        Ok(grid)
    }

    // ===== Tables =====

    /// Replace the material table. Every chunk is re-evaluated on the next step.
    pub fn configure_materials(
        &mut self,
        descriptors: &[MaterialDescriptor],
    ) -> Result<(), MaterialError> {
        self.materials.configure(descriptors)?;
        self.mark_tables_modified();
        Ok(())
    }

    pub fn materials(&self) -> &MaterialTable {
        &self.materials
    }

    pub fn reactions(&self) -> &ReactionTable {
        &self.reactions
    }

    /// Register `in1 + in2 → out1 + out2`, firing with `probability` per visit
    pub fn add_reaction(
        &mut self,
        in1: u16,
        in2: u16,
        out1: u16,
        out2: u16,
        probability: f64,
        side_effect: Option<SideEffectToken>,
    ) -> Result<ReactionHandle, ReactionError> {
        let handle = self.reactions.add(
            &self.materials,
            (in1, in2),
            (out1, out2),
            probability,
            side_effect,
        )?;
        self.mark_tables_modified();
        Ok(handle)
    }

    /// Register a reaction between every material tagged `tag1` and every material tagged
    /// `tag2`. The returned handle removes all of them at once.
    pub fn add_reaction_by_tag(
        &mut self,
        tag1: &str,
        tag2: &str,
        out1: u16,
        out2: u16,
        probability: f64,
        side_effect: Option<SideEffectToken>,
    ) -> Result<ReactionHandle, ReactionError> {
        let handle = self.reactions.add_by_tag(
            &self.materials,
            (tag1, tag2),
            (out1, out2),
            probability,
            side_effect,
        )?;
        self.mark_tables_modified();
        Ok(handle)
    }

    pub fn remove_reaction(&mut self, handle: ReactionHandle) -> bool {
        let removed = self.reactions.remove(handle);
        if removed {
            self.mark_tables_modified();
        }
        removed
    }

    pub fn clear_reactions(&mut self) {
        self.reactions.clear();
        self.mark_tables_modified();
    }

    /// Chunks stepped at or before the current tick get a full visit next step
    fn mark_tables_modified(&mut self) {
        self.last_modified_tick = self.tick + 1;
    }

    // ===== State =====

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn set_seed(&mut self, seed: u64) {
        self.seed = seed;
    }

    pub fn tick(&self) -> i64 {
        self.tick
    }

    pub fn set_tick(&mut self, tick: i64) {
        self.tick = tick;
    }

    pub fn set_parallel(&mut self, parallel: bool) {
        self.parallel = parallel;
    }

    pub fn set_maintenance_interval(&mut self, interval: u32) {
        self.maintenance_interval = interval;
    }

    /// Step every chunk on every tick until cleared
    pub fn set_force_step(&mut self, force_step: bool) {
        self.force_step = force_step;
    }

    pub fn chunk_manager(&self) -> &ChunkManager {
        &self.chunks
    }

    /// Random stream used for generation, fixed per chunk and seed
    pub fn static_rng(&self, chunk_coord: IVec2) -> CellRng {
        CellRng::new(self.seed.wrapping_add(chunk_key(chunk_coord)))
    }

    /// Random stream of a chunk for the current tick
    pub fn temporal_rng(&self, chunk_coord: IVec2) -> CellRng {
        let mut rng = self.static_rng(chunk_coord);
        rng.mix(self.tick as u64);
        rng
    }

    // ===== Hooks =====

    pub fn add_generation_pass(&mut self, pass: impl GenerationPass + 'static) {
        log::debug!("[GRID] Added generation pass '{}'", pass.name());
        self.generation_passes.push(Box::new(pass));
    }

    pub fn clear_generation_passes(&mut self) {
        self.generation_passes.clear();
    }

    pub fn set_eviction_policy(&mut self, policy: impl EvictionPolicy + 'static) {
        self.eviction_policy = Some(Box::new(policy));
    }

    pub fn clear_eviction_policy(&mut self) {
        self.eviction_policy = None;
    }

    pub fn set_side_effect_handler(&mut self, handler: impl SideEffectHandler + 'static) {
        self.side_effect_handler = Some(Box::new(handler));
    }

    pub fn clear_side_effect_handler(&mut self) {
        self.side_effect_handler = None;
    }

    /// Side effects collected while no handler was set, sorted by (y, x) per step
    pub fn drain_side_effects(&mut self) -> Vec<SideEffect> {
        std::mem::take(&mut self.pending_side_effects)
    }

    // ===== Chunks =====

    pub fn chunk_exists(&self, chunk_coord: IVec2) -> bool {
        self.chunks.contains(chunk_coord)
    }

    /// Create a chunk and run the generation passes on it.
    ///
    /// Returns false if the chunk already existed. A border chunk is promoted so it
    /// gets stepped from now on.
    pub fn try_create_chunk(&mut self, chunk_coord: IVec2) -> bool {
        if let Some(chunk) = self.chunks.get_mut(chunk_coord) {
            if chunk.is_border() {
                chunk.flags.remove(ChunkFlags::BORDER);
                log::debug!("[GRID] Promoted border chunk {}", chunk_coord);
            }
            return false;
        }

        self.create_chunk(chunk_coord, false);
        true
    }

    fn create_chunk(&mut self, chunk_coord: IVec2, border: bool) {
        let mut chunk = Box::new(Chunk::new(chunk_coord));
        if border {
            chunk.flags.insert(ChunkFlags::BORDER);
        }

        if !self.generation_passes.is_empty() {
            let rng = self.static_rng(chunk_coord);
            let mut cursor = ChunkCursor::new(&mut chunk, &self.materials, rng);
            for pass in &self.generation_passes {
                #[cfg(feature = "profiling")]
                puffin::profile_scope!("generation_pass");
                cursor.reset();
                pass.generate(&mut cursor);
            }
        }

        log::trace!("[GRID] Created chunk {} (border: {})", chunk_coord, border);
        self.chunks.insert(chunk);
    }

    /// Active rect of a chunk, `None` if it does not exist
    pub fn get_chunk_active_rect(&self, chunk_coord: IVec2) -> Option<ChunkRect> {
        self.chunks.get(chunk_coord).map(Chunk::active_rect)
    }

    /// Create the chunks covering a world rectangle and visit every cell of them on the
    /// next step
    pub fn queue_step_chunks(&mut self, min: IVec2, size: IVec2) {
        if size.x <= 0 || size.y <= 0 {
            return;
        }
        let (first, _, _) = ChunkManager::world_to_chunk_coords(min);
        let (last, _, _) = ChunkManager::world_to_chunk_coords(min + size - IVec2::ONE);

        for cy in first.y..=last.y {
            for cx in first.x..=last.x {
                let coord = IVec2::new(cx, cy);
                self.try_create_chunk(coord);
                if let Some(chunk) = self.chunks.get_mut(coord) {
                    chunk.flags.insert(ChunkFlags::FORCE_STEP);
                }
            }
        }
    }

    /// Drop every chunk and pending side effect. Tables, tick and seed are kept.
    pub fn clear(&mut self) {
        log::info!("[GRID] Cleared {} chunks", self.chunks.len());
        self.chunks.clear();
        self.pending_side_effects.clear();
    }

    // ===== Cells =====

    /// Cell at world coordinates, the empty cell if the chunk does not exist
    pub fn get_cell(&self, coord: IVec2) -> Cell {
        self.chunks.get_cell(coord).unwrap_or(Cell::EMPTY)
    }

    pub fn get_material_id(&self, coord: IVec2) -> u16 {
        self.get_cell(coord).material_id()
    }

    pub fn get_color(&self, coord: IVec2) -> u8 {
        self.get_cell(coord).color()
    }

    pub fn get_background(&self, coord: IVec2) -> Cell {
        let (chunk, x, y) = ChunkManager::world_to_chunk_coords(coord);
        self.chunks
            .get(chunk)
            .map_or(Cell::EMPTY, |c| c.get_background(x, y))
    }

    /// Place a material with fresh darken noise. Returns false if the chunk does not
    /// exist or the material is unknown.
    pub fn set_material_id(&mut self, coord: IVec2, material_id: u16) -> bool {
        if !self.materials.contains(material_id) {
            log::warn!(
                "[GRID] set_material_id: unknown material {} at {}",
                material_id,
                coord
            );
            return false;
        }

        let (chunk_coord, x, y) = ChunkManager::world_to_chunk_coords(coord);
        let mut rng = self.temporal_rng(chunk_coord);
        rng.mix((y * CHUNK_SIZE + x) as u64);
        let material = self.materials.get(material_id);

        let Some(chunk) = self.chunks.get_mut(chunk_coord) else {
            log::trace!(
                "[GRID] set_material_id: chunk {} missing (world {})",
                chunk_coord,
                coord
            );
            return false;
        };

        let old = chunk.get_cell(x, y);
        chunk.set_cell(x, y, placed_cell(material, material_id, &mut rng));
        if old.material_id() != material_id {
            log::trace!(
                "[GRID] {} set to {} (was {})",
                coord,
                material.name,
                old.material_id()
            );
        }

        self.activate_neighbors(coord);
        true
    }

    /// Tint a cell. Returns false if the chunk does not exist or its material cannot be
    /// colored.
    pub fn set_color(&mut self, coord: IVec2, color: u8) -> bool {
        let (chunk_coord, x, y) = ChunkManager::world_to_chunk_coords(coord);
        let Some(chunk) = self.chunks.get_mut(chunk_coord) else {
            return false;
        };

        let mut cell = chunk.get_cell(x, y);
        if !self.materials.get(cell.material_id()).can_color {
            return false;
        }
        cell.set_color(color);
        chunk.set_cell(x, y, cell);

        self.activate_neighbors(coord);
        true
    }

    /// Fill a world rectangle. Returns the number of cells written.
    pub fn set_cell_rect(&mut self, min: IVec2, size: IVec2, material_id: u16) -> usize {
        RectCoords::new(min, size)
            .filter(|&coord| self.set_material_id(coord, material_id))
            .count()
    }

    pub fn set_background(&mut self, coord: IVec2, cell: Cell) -> bool {
        let (chunk_coord, x, y) = ChunkManager::world_to_chunk_coords(coord);
        let Some(chunk) = self.chunks.get_mut(chunk_coord) else {
            return false;
        };
        chunk.set_background(x, y, cell);
        self.activate_neighbors(coord);
        true
    }

    /// Activate the 3x3 cells around `coord` in every chunk that exists
    fn activate_neighbors(&mut self, coord: IVec2) {
        for dy in -1..=1 {
            for dx in -1..=1 {
                let (chunk, x, y) =
                    ChunkManager::world_to_chunk_coords(coord + IVec2::new(dx, dy));
                if let Some(chunk) = self.chunks.get_mut(chunk) {
                    chunk.activate_point(x, y, true);
                }
            }
        }
    }

    /// Row-major copy of a world rectangle, 0 for missing chunks.
    ///
    /// `cleaned` strips the active flag and updated generation.
    pub fn cell_buffer(&self, min: IVec2, size: IVec2, cleaned: bool) -> Vec<u32> {
        RectCoords::new(min, size)
            .map(|coord| {
                let cell = self.get_cell(coord);
                let cell = if cleaned { cell.cleaned() } else { cell };
                cell.bits()
            })
            .collect()
    }

    // ===== Cursors =====

    pub fn iter_rect(&mut self, min: IVec2, size: IVec2) -> GridCursor<'_, RectCoords> {
        GridCursor::new(self, RectCoords::new(min, size))
    }

    pub fn iter_line(&mut self, start: IVec2, end: IVec2) -> GridCursor<'_, LineCoords> {
        GridCursor::new(self, LineCoords::new(start, end))
    }

    /// Cells of `material_id` connected to `seed`, within 256 cells of it
    pub fn iter_flood_fill(&mut self, seed: IVec2, material_id: u16) -> FloodFillCursor<'_> {
        FloodFillCursor::new(self, seed, material_id)
    }

    /// Cursor over an existing chunk with its static random stream
    pub fn iter_chunk(&mut self, chunk_coord: IVec2) -> Option<ChunkCursor<'_>> {
        let rng = self.static_rng(chunk_coord);
        let materials = &self.materials;
        self.chunks
            .get_mut(chunk_coord)
            .map(|chunk| ChunkCursor::new(chunk, materials, rng))
    }

    // ===== Stepping =====

    /// Advance the simulation by one tick
    pub fn step(&mut self) -> StepSummary {
        #[cfg(feature = "profiling")]
        puffin::profile_function!();

        self.tick += 1;
        let generation = Generation::from_tick(self.tick);
        let mut summary = StepSummary::new(self.tick);

        let to_step = self.chunks_to_step();
        if to_step.is_empty() {
            self.maintenance(&mut summary);
            return summary;
        }

        summary.chunks_created = self.create_neighbors(&to_step);

        let mut side_effects = Vec::new();
        for pass in 0..3 {
            #[cfg(feature = "profiling")]
            puffin::profile_scope!("step_pass");

            let mut bands = self.take_bands(&to_step, pass);
            if bands.is_empty() {
                continue;
            }

            let ctx = StepContext {
                materials: &self.materials,
                reactions: &self.reactions,
                tick: self.tick,
                generation,
            };
            run_bands(&mut bands, ctx, self.seed, self.parallel);

            for mut band in bands {
                self.chunks.absorb(&mut band.chunks);
                side_effects.append(&mut band.side_effects);
                summary.merge(&band.summary);
            }
        }

        self.dispatch_side_effects(side_effects, &mut summary);
        self.maintenance(&mut summary);

        log::debug!(
            "[STEP] Tick {}: {} chunks stepped, {} created, {} moves, {} reactions",
            summary.tick,
            summary.chunks_stepped,
            summary.chunks_created,
            summary.cells_moved,
            summary.reactions
        );
        summary
    }

    /// Non-border chunks that are active or forced, sorted by (x, y)
    fn chunks_to_step(&self) -> Vec<(IVec2, bool)> {
        let mut to_step: Vec<(IVec2, bool)> = self
            .chunks
            .iter()
            .filter(|chunk| !chunk.is_border())
            .filter_map(|chunk| {
                let forced = self.force_step
                    || chunk.last_step_tick == -1
                    || chunk.last_step_tick < self.last_modified_tick
                    || chunk.flags.contains(ChunkFlags::FORCE_STEP);
                (forced || chunk.is_active()).then_some((chunk.coord, forced))
            })
            .collect();
        to_step.sort_unstable_by_key(|(c, _)| (c.x, c.y));
        to_step
    }

    /// Create missing neighbours of every chunk about to be stepped, as border chunks
    fn create_neighbors(&mut self, to_step: &[(IVec2, bool)]) -> u32 {
        let mut created = 0;
        for &(coord, _) in to_step {
            for dy in -1..=1 {
                for dx in -1..=1 {
                    let neighbor = coord + IVec2::new(dx, dy);
                    if !self.chunks.contains(neighbor) {
                        self.create_chunk(neighbor, true);
                        created += 1;
                    }
                }
            }
        }
        created
    }

    /// Group the chunks of one pass into column bands and move their neighbourhoods
    /// out of the grid
    fn take_bands(&mut self, to_step: &[(IVec2, bool)], pass: i32) -> Vec<Band> {
        let mut bands: Vec<Band> = Vec::new();

        for &(coord, forced) in to_step.iter().filter(|(c, _)| c.x.rem_euclid(3) == pass) {
            match bands.last_mut() {
                Some(band) if band.steps[0].0.x == coord.x => band.steps.push((coord, forced)),
                _ => bands.push(Band {
                    chunks: ChunkMap::default(),
                    steps: smallvec![(coord, forced)],
                    side_effects: Vec::new(),
                    summary: StepSummary::default(),
                }),
            }
        }

        for band in &mut bands {
            band.steps.sort_by_key(|(c, _)| std::cmp::Reverse(c.y));
            for &(coord, _) in &band.steps {
                for dy in -1..=1 {
                    for dx in -1..=1 {
                        let key = chunk_key(coord + IVec2::new(dx, dy));
                        if let Some(chunk) = self.chunks.chunks.remove(&key) {
                            band.chunks.insert(key, chunk);
                        }
                    }
                }
            }
        }

        bands
    }

    fn dispatch_side_effects(
        &mut self,
        mut side_effects: Vec<SideEffect>,
        summary: &mut StepSummary,
    ) {
        if side_effects.is_empty() {
            return;
        }
        side_effects.sort_by_key(|e| (e.coord.y, e.coord.x));
        summary.side_effects = side_effects.len() as u32;

        match &mut self.side_effect_handler {
            Some(handler) => {
                for effect in side_effects {
                    handler.handle(effect.coord, effect.token);
                }
            }
            None => self.pending_side_effects.extend(side_effects),
        }
    }

    /// Release empty background layers and evict idle chunks
    fn maintenance(&mut self, summary: &mut StepSummary) {
        if self.maintenance_interval == 0 || self.tick % i64::from(self.maintenance_interval) != 0 {
            return;
        }

        #[cfg(feature = "profiling")]
        puffin::profile_function!();

        let released = self
            .chunks
            .iter_mut()
            .map(|chunk| chunk.release_empty_background())
            .filter(|&freed| freed)
            .count();

        let mut evicted = Vec::new();
        if let Some(policy) = &mut self.eviction_policy {
            for coord in self.chunks.sorted_coords() {
                let Some(chunk) = self.chunks.get(coord) else {
                    continue;
                };
                if !chunk.is_active() && policy.should_evict(chunk, self.tick) {
                    evicted.push(coord);
                }
            }
        }
        for &coord in &evicted {
            self.chunks.remove(coord);
        }
        summary.chunks_evicted = evicted.len() as u32;

        if released > 0 || !evicted.is_empty() {
            log::debug!(
                "[MAINTENANCE] Tick {}: released {} backgrounds, evicted {} chunks",
                self.tick,
                released,
                evicted.len()
            );
        }
    }
}

impl Default for Grid {
    fn default() -> Self {
        Self::new()
    }
}
