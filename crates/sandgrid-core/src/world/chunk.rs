//! Chunk - 32x32 region of cells
//!
//! Activity is tracked with one bit per row and one bit per column. The active
//! rectangle derived from the two masks is a superset of the cells that may change.

use bitflags::bitflags;
use glam::IVec2;

use crate::simulation::{CHUNK_AREA, CHUNK_SIZE, Cell};

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct ChunkFlags: u8 {
        /// Created as the neighbour of a stepped chunk. Receives writes, is never stepped itself.
        const BORDER = 1 << 0;
        /// Visit every cell on the next step regardless of activity
        const FORCE_STEP = 1 << 1;
    }
}

/// Half-open rectangle in chunk-local coordinates
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChunkRect {
    pub x_start: usize,
    pub x_end: usize,
    pub y_start: usize,
    pub y_end: usize,
}

impl ChunkRect {
    pub const FULL: ChunkRect = ChunkRect {
        x_start: 0,
        x_end: CHUNK_SIZE,
        y_start: 0,
        y_end: CHUNK_SIZE,
    };

    pub fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        debug_assert!(x + width <= CHUNK_SIZE && y + height <= CHUNK_SIZE);
        Self {
            x_start: x,
            x_end: x + width,
            y_start: y,
            y_end: y + height,
        }
    }

    pub fn width(&self) -> usize {
        self.x_end - self.x_start
    }

    pub fn height(&self) -> usize {
        self.y_end - self.y_start
    }

    pub fn is_empty(&self) -> bool {
        self.x_start >= self.x_end || self.y_start >= self.y_end
    }

    pub fn contains(&self, x: usize, y: usize) -> bool {
        (self.x_start..self.x_end).contains(&x) && (self.y_start..self.y_end).contains(&y)
    }
}

/// A 32x32 region of the world
#[derive(Clone)]
pub struct Chunk {
    /// Chunk coordinates (in chunk space, not cell space)
    pub coord: IVec2,

    /// Tick this chunk was last stepped. -1 until generated.
    pub last_step_tick: i64,

    pub flags: ChunkFlags,

    active_rows: u32,
    active_columns: u32,

    /// Cell data, row-major order
    /// Index = y * CHUNK_SIZE + x
    cells: [Cell; CHUNK_AREA],

    /// Non-simulated layer behind the cells, allocated on first non-empty write
    background: Option<Box<[Cell; CHUNK_AREA]>>,
    background_count: u32,
}

impl Chunk {
    pub fn new(coord: IVec2) -> Self {
        Self {
            coord,
            last_step_tick: -1,
            flags: ChunkFlags::empty(),
            active_rows: 0,
            active_columns: 0,
            cells: [Cell::EMPTY; CHUNK_AREA],
            background: None,
            background_count: 0,
        }
    }

    #[inline]
    fn index(x: usize, y: usize) -> usize {
        debug_assert!(
            x < CHUNK_SIZE && y < CHUNK_SIZE,
            "local coordinate ({x}, {y}) out of range"
        );
        y * CHUNK_SIZE + x
    }

    /// Get cell at local coordinates (0-31, 0-31)
    #[inline]
    pub fn get_cell(&self, x: usize, y: usize) -> Cell {
        self.cells[Self::index(x, y)]
    }

    /// Set cell at local coordinates. Does not touch the activity masks.
    #[inline]
    pub fn set_cell(&mut self, x: usize, y: usize, cell: Cell) {
        self.cells[Self::index(x, y)] = cell;
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn is_border(&self) -> bool {
        self.flags.contains(ChunkFlags::BORDER)
    }

    /// Count non-empty cells
    pub fn count_non_empty(&self) -> usize {
        self.cells.iter().filter(|c| !c.is_empty()).count()
    }

    pub fn get_background(&self, x: usize, y: usize) -> Cell {
        let index = Self::index(x, y);
        match &self.background {
            Some(background) => background[index],
            None => Cell::EMPTY,
        }
    }

    pub fn set_background(&mut self, x: usize, y: usize, cell: Cell) {
        let index = Self::index(x, y);
        let background = match &mut self.background {
            Some(background) => background,
            None if cell.bits() == 0 => return,
            None => self
                .background
                .insert(Box::new([Cell::EMPTY; CHUNK_AREA])),
        };

        if background[index].bits() != 0 {
            self.background_count -= 1;
        }
        background[index] = cell;
        if cell.bits() != 0 {
            self.background_count += 1;
        }
    }

    pub fn has_background(&self) -> bool {
        self.background.is_some()
    }

    pub fn background_count(&self) -> u32 {
        self.background_count
    }

    /// Free the background layer if it holds nothing. Returns true if freed.
    pub fn release_empty_background(&mut self) -> bool {
        if self.background.is_some() && self.background_count == 0 {
            self.background = None;
            true
        } else {
            false
        }
    }

    #[inline]
    pub fn activate_point(&mut self, x: usize, y: usize, activate_cell: bool) {
        let index = Self::index(x, y);
        self.active_rows |= 1 << y;
        self.active_columns |= 1 << x;
        if activate_cell {
            self.cells[index].set_active(true);
        }
    }

    /// OR the rect into both masks. Does not activate cells.
    pub fn activate_rect(&mut self, rect: ChunkRect) {
        debug_assert!(rect.x_end <= CHUNK_SIZE && rect.y_end <= CHUNK_SIZE);
        if rect.is_empty() {
            return;
        }
        self.active_rows |= (((1u64 << rect.height()) - 1) << rect.y_start) as u32;
        self.active_columns |= (((1u64 << rect.width()) - 1) << rect.x_start) as u32;
    }

    pub fn activate_all(&mut self, activate_cells: bool) {
        self.active_rows = u32::MAX;
        self.active_columns = u32::MAX;
        if activate_cells {
            for cell in &mut self.cells {
                cell.set_active(true);
            }
        }
    }

    pub fn clear_active(&mut self) {
        self.active_rows = 0;
        self.active_columns = 0;
    }

    /// (rows, columns)
    pub fn active_masks(&self) -> (u32, u32) {
        (self.active_rows, self.active_columns)
    }

    pub fn is_active(&self) -> bool {
        self.active_rows != 0
    }

    #[inline]
    pub fn is_row_active(&self, y: usize) -> bool {
        debug_assert!(y < CHUNK_SIZE);
        self.active_rows & (1 << y) != 0
    }

    /// Bounding rect of the activity masks. Empty when nothing is active.
    pub fn active_rect(&self) -> ChunkRect {
        Self::rect_from_masks(self.active_rows, self.active_columns)
    }

    pub fn rect_from_masks(rows: u32, columns: u32) -> ChunkRect {
        if rows == 0 || columns == 0 {
            return ChunkRect::default();
        }
        ChunkRect {
            x_start: columns.trailing_zeros() as usize,
            x_end: (32 - columns.leading_zeros()) as usize,
            y_start: rows.trailing_zeros() as usize,
            y_end: (32 - rows.leading_zeros()) as usize,
        }
    }
}
