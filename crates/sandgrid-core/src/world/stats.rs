//! Simulation statistics collection trait

/// Trait for collecting simulation statistics
///
/// The stepper reports through this trait so callers can plug in their own counters.
pub trait SimStats {
    /// Record that a cell was swapped or copied into a new position
    fn record_cell_moved(&mut self);

    /// Record that a reaction fired
    fn record_reaction(&mut self);

    /// Record that a blocked cell vanished
    fn record_dissipation(&mut self);

    /// Record that a chunk finished stepping
    fn record_chunk_stepped(&mut self);
}

/// Counters for a single call to `Grid::step`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StepSummary {
    /// Tick after the step
    pub tick: i64,
    pub chunks_stepped: u32,
    /// Border chunks created around stepped chunks
    pub chunks_created: u32,
    pub cells_moved: u32,
    pub reactions: u32,
    pub dissipations: u32,
    pub side_effects: u32,
    pub chunks_evicted: u32,
}

impl StepSummary {
    pub fn new(tick: i64) -> Self {
        Self {
            tick,
            ..Default::default()
        }
    }

    /// Add another summary's counters (tick is kept)
    pub fn merge(&mut self, other: &StepSummary) {
        self.chunks_stepped += other.chunks_stepped;
        self.chunks_created += other.chunks_created;
        self.cells_moved += other.cells_moved;
        self.reactions += other.reactions;
        self.dissipations += other.dissipations;
        self.side_effects += other.side_effects;
        self.chunks_evicted += other.chunks_evicted;
    }

    /// Nothing happened besides the tick advancing
    pub fn is_idle(&self) -> bool {
        self.chunks_stepped == 0
    }
}

impl SimStats for StepSummary {
    fn record_cell_moved(&mut self) {
        self.cells_moved += 1;
    }

    fn record_reaction(&mut self) {
        self.reactions += 1;
    }

    fn record_dissipation(&mut self) {
        self.dissipations += 1;
    }

    fn record_chunk_stepped(&mut self) {
        self.chunks_stepped += 1;
    }
}
