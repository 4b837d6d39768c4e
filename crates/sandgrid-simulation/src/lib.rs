//! Cell data, materials and reactions for sandgrid
//!
//! This crate provides the foundational data types for the cell simulation:
//! - Packed cell encoding (Cell, Movement, Generation, cell_fields, CHUNK_SIZE)
//! - Material definitions (MaterialDescriptor, Material, MaterialTable)
//! - Reactions between material pairs (Reaction, ReactionTable)
//! - Deterministic per-chunk RNG (CellRng)

mod cell;
mod materials;
mod reactions;
mod rng;

pub use cell::{CHUNK_AREA, CHUNK_SIZE, Cell, Generation, Movement, cell_fields};
pub use materials::{
    CollisionClass, DEFAULT_DISSIPATION_CHANCE, MAX_HORIZONTAL_MOVEMENT, MAX_VERTICAL_MOVEMENT,
    Material, MaterialDescriptor, MaterialError, MaterialId, MaterialTable,
};
pub use reactions::{
    Reaction, ReactionError, ReactionHandle, ReactionLookup, ReactionTable, SideEffectToken,
};
pub use rng::{CellRng, probability_threshold};
