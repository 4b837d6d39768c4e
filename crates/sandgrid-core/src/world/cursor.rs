//! Cursors over grid cells: rectangle, line, flood fill and single chunk
//!
//! A cursor starts before its first cell; call `advance` to move onto it.
//!
//! ```ignore
//! let mut cursor = grid.iter_rect(IVec2::new(0, 0), IVec2::new(8, 8));
//! while cursor.advance() {
//!     if cursor.material_id() == 0 {
//!         cursor.set_material_id(sand);
//!     }
//! }
//! ```

use std::collections::VecDeque;

use glam::IVec2;

use super::ca_update::placed_cell;
use super::chunk::Chunk;
use super::chunk_manager::ChunkManager;
use super::grid::Grid;
use crate::simulation::{CHUNK_AREA, CHUNK_SIZE, Cell, CellRng, MaterialTable};

/// Side length of the flood fill window, centered on the seed
pub const FLOOD_FILL_EXTENT: i32 = 512;

/// Shared interface of every cursor
pub trait CellCursor {
    /// Move to the next cell. Returns false once exhausted.
    fn advance(&mut self) -> bool;

    /// World coordinate of the current cell
    fn coord(&self) -> IVec2;

    /// Current cell, or the empty cell if its chunk does not exist
    fn cell(&self) -> Cell;

    /// Place a material at the current cell. Returns false if nothing was written.
    fn set_material_id(&mut self, material_id: u16) -> bool;

    /// Tint the current cell. Returns false if its material cannot be colored.
    fn set_color(&mut self, color: u8) -> bool;

    fn material_id(&self) -> u16 {
        self.cell().material_id()
    }

    fn color(&self) -> u8 {
        self.cell().color()
    }

    fn chunk_coord(&self) -> IVec2 {
        ChunkManager::world_to_chunk_coords(self.coord()).0
    }

    fn local_coord(&self) -> (usize, usize) {
        let (_, x, y) = ChunkManager::world_to_chunk_coords(self.coord());
        (x, y)
    }

    /// Write `material_id` to every cell not visited yet. Returns the number written.
    fn fill_remaining(&mut self, material_id: u16) -> usize {
        let mut written = 0;
        while self.advance() {
            if self.set_material_id(material_id) {
                written += 1;
            }
        }
        written
    }
}

/// Row-major coordinates of a rectangle
#[derive(Clone, Debug)]
pub struct RectCoords {
    min: IVec2,
    width: i32,
    index: i64,
    len: i64,
}

impl RectCoords {
    pub fn new(min: IVec2, size: IVec2) -> Self {
        let size = size.max(IVec2::ZERO);
        Self {
            min,
            width: size.x,
            index: 0,
            len: i64::from(size.x) * i64::from(size.y),
        }
    }
}

impl Iterator for RectCoords {
    type Item = IVec2;

    fn next(&mut self) -> Option<IVec2> {
        if self.index >= self.len {
            return None;
        }
        let width = i64::from(self.width);
        let coord = self.min + IVec2::new((self.index % width) as i32, (self.index / width) as i32);
        self.index += 1;
        Some(coord)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.len - self.index) as usize;
        (remaining, Some(remaining))
    }
}

/// Bresenham line, both end points included
pub struct LineCoords {
    inner: bresenham::Bresenham,
    end: Option<IVec2>,
}

impl LineCoords {
    pub fn new(start: IVec2, end: IVec2) -> Self {
        Self {
            inner: bresenham::Bresenham::new(
                (start.x as isize, start.y as isize),
                (end.x as isize, end.y as isize),
            ),
            end: Some(end),
        }
    }
}

impl Iterator for LineCoords {
    type Item = IVec2;

    fn next(&mut self) -> Option<IVec2> {
        match self.inner.next() {
            Some((x, y)) => Some(IVec2::new(x as i32, y as i32)),
            None => self.end.take(),
        }
    }
}

/// Cursor over a sequence of world coordinates. Writes go through the grid, so
/// neighbouring cells are re-activated.
pub struct GridCursor<'a, I> {
    grid: &'a mut Grid,
    coords: I,
    current: Option<IVec2>,
}

impl<'a, I: Iterator<Item = IVec2>> GridCursor<'a, I> {
    pub(crate) fn new(grid: &'a mut Grid, coords: I) -> Self {
        Self {
            grid,
            coords,
            current: None,
        }
    }
}

impl<I: Iterator<Item = IVec2>> CellCursor for GridCursor<'_, I> {
    fn advance(&mut self) -> bool {
        self.current = self.coords.next();
        self.current.is_some()
    }

    fn coord(&self) -> IVec2 {
        debug_assert!(self.current.is_some(), "cursor not on a cell");
        self.current.unwrap_or_default()
    }

    fn cell(&self) -> Cell {
        self.grid.get_cell(self.coord())
    }

    fn set_material_id(&mut self, material_id: u16) -> bool {
        let coord = self.coord();
        self.grid.set_material_id(coord, material_id)
    }

    fn set_color(&mut self, color: u8) -> bool {
        let coord = self.coord();
        self.grid.set_color(coord, color)
    }
}

/// 4-neighbour flood fill over cells of one material, limited to a square window
/// around the seed
pub struct FloodFillCursor<'a> {
    grid: &'a mut Grid,
    filter_material_id: u16,
    seed: IVec2,
    queue: VecDeque<IVec2>,
    /// One bit per window cell
    seen: Vec<u64>,
    current: Option<IVec2>,
}

impl<'a> FloodFillCursor<'a> {
    pub(crate) fn new(grid: &'a mut Grid, seed: IVec2, filter_material_id: u16) -> Self {
        let cells = (FLOOD_FILL_EXTENT * FLOOD_FILL_EXTENT) as usize;
        let mut cursor = Self {
            grid,
            filter_material_id,
            seed,
            queue: VecDeque::new(),
            seen: vec![0; cells.div_ceil(64)],
            current: None,
        };
        cursor.mark_seen(seed);
        cursor.queue.push_back(seed);
        cursor
    }

    /// Bit index of `coord` in the window, `None` outside it
    fn window_index(&self, coord: IVec2) -> Option<usize> {
        let half = FLOOD_FILL_EXTENT / 2;
        let offset = coord - self.seed + IVec2::splat(half);
        if offset.x < 0
            || offset.y < 0
            || offset.x >= FLOOD_FILL_EXTENT
            || offset.y >= FLOOD_FILL_EXTENT
        {
            return None;
        }
        Some((offset.y * FLOOD_FILL_EXTENT + offset.x) as usize)
    }

    /// Returns false if `coord` was already seen or lies outside the window
    fn mark_seen(&mut self, coord: IVec2) -> bool {
        let Some(index) = self.window_index(coord) else {
            return false;
        };
        let (word, bit) = (index / 64, index % 64);
        if self.seen[word] & (1 << bit) != 0 {
            return false;
        }
        self.seen[word] |= 1 << bit;
        true
    }
}

impl CellCursor for FloodFillCursor<'_> {
    fn advance(&mut self) -> bool {
        while let Some(coord) = self.queue.pop_front() {
            let matches = self
                .grid
                .chunk_manager()
                .get_cell(coord)
                .is_some_and(|c| c.material_id() == self.filter_material_id);
            if !matches {
                continue;
            }

            for offset in [IVec2::NEG_Y, IVec2::NEG_X, IVec2::X, IVec2::Y] {
                let next = coord + offset;
                if self.mark_seen(next) {
                    self.queue.push_back(next);
                }
            }

            self.current = Some(coord);
            return true;
        }

        self.current = None;
        false
    }

    fn coord(&self) -> IVec2 {
        debug_assert!(self.current.is_some(), "cursor not on a cell");
        self.current.unwrap_or_default()
    }

    fn cell(&self) -> Cell {
        self.grid.get_cell(self.coord())
    }

    fn set_material_id(&mut self, material_id: u16) -> bool {
        let coord = self.coord();
        self.grid.set_material_id(coord, material_id)
    }

    fn set_color(&mut self, color: u8) -> bool {
        let coord = self.coord();
        self.grid.set_color(coord, color)
    }
}

/// Cursor over every cell of one chunk, row-major, with the chunk's static random stream.
///
/// Writes skip neighbour activation; the whole chunk is activated when the cursor is
/// dropped if anything was written.
pub struct ChunkCursor<'a> {
    chunk: &'a mut Chunk,
    materials: &'a MaterialTable,
    rng: CellRng,
    next_index: usize,
    modified: bool,
}

impl<'a> ChunkCursor<'a> {
    pub(crate) fn new(chunk: &'a mut Chunk, materials: &'a MaterialTable, rng: CellRng) -> Self {
        Self {
            chunk,
            materials,
            rng,
            next_index: 0,
            modified: false,
        }
    }

    /// Start over from the first cell
    pub fn reset(&mut self) {
        self.next_index = 0;
    }

    pub fn chunk(&self) -> &Chunk {
        self.chunk
    }

    pub fn materials(&self) -> &MaterialTable {
        self.materials
    }

    pub fn rng(&mut self) -> &mut CellRng {
        &mut self.rng
    }

    pub fn gen_bool(&mut self) -> bool {
        self.rng.gen_bool()
    }

    pub fn gen_f32(&mut self) -> f32 {
        self.rng.gen_f32()
    }

    pub fn check_probability(&mut self, probability: f32) -> bool {
        self.rng.check_probability(probability)
    }

    pub fn gen_range_i32(&mut self, min: i32, max: i32) -> i32 {
        self.rng.gen_range_i32(min, max)
    }

    pub fn gen_range_f32(&mut self, min: f32, max: f32) -> f32 {
        self.rng.gen_range_f32(min, max)
    }

    fn current_local(&self) -> (usize, usize) {
        debug_assert!(self.next_index > 0, "cursor not on a cell");
        let index = self.next_index.saturating_sub(1);
        (index % CHUNK_SIZE, index / CHUNK_SIZE)
    }
}

impl CellCursor for ChunkCursor<'_> {
    fn advance(&mut self) -> bool {
        if self.next_index >= CHUNK_AREA {
            return false;
        }
        self.next_index += 1;
        true
    }

    fn coord(&self) -> IVec2 {
        let (x, y) = self.current_local();
        ChunkManager::chunk_to_world_coords(self.chunk.coord, x, y)
    }

    fn cell(&self) -> Cell {
        let (x, y) = self.current_local();
        self.chunk.get_cell(x, y)
    }

    fn set_material_id(&mut self, material_id: u16) -> bool {
        if !self.materials.contains(material_id) {
            return false;
        }
        let (x, y) = self.current_local();
        let cell = placed_cell(self.materials.get(material_id), material_id, &mut self.rng);
        self.chunk.set_cell(x, y, cell);
        self.modified = true;
        true
    }

    fn set_color(&mut self, color: u8) -> bool {
        let (x, y) = self.current_local();
        let mut cell = self.chunk.get_cell(x, y);
        if !self.materials.get(cell.material_id()).can_color {
            return false;
        }
        cell.set_color(color);
        self.chunk.set_cell(x, y, cell);
        self.modified = true;
        true
    }

    fn chunk_coord(&self) -> IVec2 {
        self.chunk.coord
    }

    fn local_coord(&self) -> (usize, usize) {
        self.current_local()
    }
}

impl Drop for ChunkCursor<'_> {
    fn drop(&mut self) {
        if self.modified {
            self.chunk.activate_all(true);
        }
    }
}
