//! Cell encoding, materials, reactions and random streams

pub use sandgrid_simulation::{
    CHUNK_AREA, CHUNK_SIZE, Cell, CellRng, CollisionClass, DEFAULT_DISSIPATION_CHANCE,
    Generation, MAX_HORIZONTAL_MOVEMENT, MAX_VERTICAL_MOVEMENT, Material, MaterialDescriptor,
    MaterialError, MaterialId, MaterialTable, Movement, Reaction, ReactionError, ReactionHandle,
    ReactionLookup, ReactionTable, SideEffectToken, cell_fields, probability_threshold,
};
