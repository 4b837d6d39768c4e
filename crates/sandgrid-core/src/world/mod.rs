//! World management - chunks, stepping, cursors

mod ca_update;
mod chemistry_system;
mod chunk;
mod chunk_manager;
pub mod cursor;
mod grid;
pub mod hooks;
mod neighborhood;
pub mod stats;

pub use crate::simulation::CHUNK_SIZE;
pub use chunk::{Chunk, ChunkFlags, ChunkRect};
pub use chunk_manager::{ChunkManager, ChunkMap, chunk_coord_from_key, chunk_key};
pub use cursor::{
    CellCursor, ChunkCursor, FLOOD_FILL_EXTENT, FloodFillCursor, GridCursor, LineCoords,
    RectCoords,
};
pub use grid::Grid;
pub use hooks::{EvictionPolicy, GenerationPass, IdleEviction, SideEffect, SideEffectHandler};
pub use stats::{SimStats, StepSummary};
