//! Chunk storage - sparse map from packed chunk key to boxed chunk

use ahash::AHashMap;
use glam::IVec2;

use super::chunk::{Chunk, ChunkFlags};
use crate::simulation::{CHUNK_SIZE, Cell};

/// Chunks keyed by [`chunk_key`]
pub type ChunkMap = AHashMap<u64, Box<Chunk>>;

/// Pack chunk coordinates into a single key: `x` in the low half, `y` in the high half
#[inline]
pub fn chunk_key(coord: IVec2) -> u64 {
    u64::from(coord.x as u32) | (u64::from(coord.y as u32) << 32)
}

/// Inverse of [`chunk_key`]
#[inline]
pub fn chunk_coord_from_key(key: u64) -> IVec2 {
    IVec2::new(key as u32 as i32, (key >> 32) as u32 as i32)
}

/// Owns every chunk of a grid
#[derive(Default)]
pub struct ChunkManager {
    pub(crate) chunks: ChunkMap,
}

impl ChunkManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert world coordinates to chunk coordinates + local offset
    #[inline]
    pub fn world_to_chunk_coords(world: IVec2) -> (IVec2, usize, usize) {
        let size = CHUNK_SIZE as i32;
        let chunk = IVec2::new(world.x.div_euclid(size), world.y.div_euclid(size));
        let local_x = world.x.rem_euclid(size) as usize;
        let local_y = world.y.rem_euclid(size) as usize;
        (chunk, local_x, local_y)
    }

    /// Convert chunk coordinates + local offset back to world coordinates
    #[inline]
    pub fn chunk_to_world_coords(chunk: IVec2, local_x: usize, local_y: usize) -> IVec2 {
        chunk * CHUNK_SIZE as i32 + IVec2::new(local_x as i32, local_y as i32)
    }

    pub fn get(&self, coord: IVec2) -> Option<&Chunk> {
        self.chunks.get(&chunk_key(coord)).map(|c| &**c)
    }

    pub fn get_mut(&mut self, coord: IVec2) -> Option<&mut Chunk> {
        self.chunks.get_mut(&chunk_key(coord)).map(|c| &mut **c)
    }

    pub fn contains(&self, coord: IVec2) -> bool {
        self.chunks.contains_key(&chunk_key(coord))
    }

    /// Insert a chunk at its own coordinate, replacing any previous one
    pub fn insert(&mut self, chunk: Box<Chunk>) -> Option<Box<Chunk>> {
        self.chunks.insert(chunk_key(chunk.coord), chunk)
    }

    pub fn remove(&mut self, coord: IVec2) -> Option<Box<Chunk>> {
        self.chunks.remove(&chunk_key(coord))
    }

    /// Cell at world coordinates, `None` if the chunk does not exist
    pub fn get_cell(&self, world: IVec2) -> Option<Cell> {
        let (chunk, x, y) = Self::world_to_chunk_coords(world);
        self.get(chunk).map(|c| c.get_cell(x, y))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.values().map(|c| &**c)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Chunk> {
        self.chunks.values_mut().map(|c| &mut **c)
    }

    /// Coordinates of every chunk, sorted by (x, y)
    pub fn sorted_coords(&self) -> Vec<IVec2> {
        let mut coords: Vec<IVec2> = self
            .chunks
            .keys()
            .map(|&k| chunk_coord_from_key(k))
            .collect();
        coords.sort_unstable_by_key(|c| (c.x, c.y));
        coords
    }

    /// Number of chunks that receive writes but are never stepped
    pub fn border_count(&self) -> usize {
        self.iter()
            .filter(|c| c.flags.contains(ChunkFlags::BORDER))
            .count()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
    }

    /// Move every chunk of `other` into this manager
    pub(crate) fn absorb(&mut self, other: &mut ChunkMap) {
        self.chunks.extend(other.drain());
    }
}
