//! 3x3 block of chunks around the chunk being stepped
//!
//! Coordinates are relative to the top-left cell of the center chunk, so the
//! whole block spans `-32..64` on both axes.

use glam::IVec2;

use super::chunk::{Chunk, ChunkFlags};
use super::chunk_manager::{ChunkMap, chunk_key};
use crate::simulation::{CHUNK_SIZE, Cell};

const SIZE: i32 = CHUNK_SIZE as i32;

pub(crate) struct ChunkNeighborhood {
    /// Row-major, index 4 is the center
    chunks: [Box<Chunk>; 9],
}

impl ChunkNeighborhood {
    /// Move the 3x3 block around `center` out of `map`
    pub fn take(map: &mut ChunkMap, center: IVec2) -> Self {
        let chunks = std::array::from_fn(|i| {
            let coord = center + IVec2::new(i as i32 % 3 - 1, i as i32 / 3 - 1);
            map.remove(&chunk_key(coord)).unwrap_or_else(|| {
                debug_assert!(false, "neighbour chunk {coord} missing");
                let mut chunk = Chunk::new(coord);
                chunk.flags.insert(ChunkFlags::BORDER);
                Box::new(chunk)
            })
        });
        Self { chunks }
    }

    /// Put every chunk back into `map`
    pub fn restore(self, map: &mut ChunkMap) {
        for chunk in self.chunks {
            map.insert(chunk_key(chunk.coord), chunk);
        }
    }

    pub fn center(&self) -> &Chunk {
        &self.chunks[4]
    }

    pub fn center_mut(&mut self) -> &mut Chunk {
        &mut self.chunks[4]
    }

    #[inline]
    pub fn contains(pos: IVec2) -> bool {
        (-SIZE..2 * SIZE).contains(&pos.x) && (-SIZE..2 * SIZE).contains(&pos.y)
    }

    /// Chunk index and local coordinates
    #[inline]
    fn locate(pos: IVec2) -> (usize, usize, usize) {
        debug_assert!(Self::contains(pos), "{pos} outside the neighbourhood");
        let x = (pos.x + SIZE) as usize;
        let y = (pos.y + SIZE) as usize;
        (
            (y / CHUNK_SIZE) * 3 + x / CHUNK_SIZE,
            x % CHUNK_SIZE,
            y % CHUNK_SIZE,
        )
    }

    #[inline]
    pub fn get(&self, pos: IVec2) -> Cell {
        let (i, x, y) = Self::locate(pos);
        self.chunks[i].get_cell(x, y)
    }

    #[inline]
    pub fn set(&mut self, pos: IVec2, cell: Cell) {
        let (i, x, y) = Self::locate(pos);
        self.chunks[i].set_cell(x, y, cell);
    }

    #[inline]
    pub fn activate_point(&mut self, pos: IVec2, activate_cell: bool) {
        let (i, x, y) = Self::locate(pos);
        self.chunks[i].activate_point(x, y, activate_cell);
    }

    /// Activate the 3x3 cells around `pos`, `pos` included
    pub fn activate_neighbors(&mut self, pos: IVec2) {
        for dy in -1..=1 {
            for dx in -1..=1 {
                let p = pos + IVec2::new(dx, dy);
                if Self::contains(p) {
                    self.activate_point(p, true);
                }
            }
        }
    }

    /// Row activity of the chunk holding `pos`. Outside the block counts as active.
    pub fn is_row_active(&self, pos: IVec2) -> bool {
        if !Self::contains(pos) {
            return true;
        }
        let (i, _, y) = Self::locate(pos);
        self.chunks[i].is_row_active(y)
    }

    pub fn world_coord(&self, pos: IVec2) -> IVec2 {
        self.center().coord * SIZE + pos
    }
}
