//! Extension points called by the grid: generation, eviction and side effects

use glam::IVec2;

use super::chunk::Chunk;
use super::cursor::ChunkCursor;
use crate::simulation::SideEffectToken;

/// A reaction token emitted during a step, with the world coordinate of the reacting cell
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SideEffect {
    pub coord: IVec2,
    pub token: SideEffectToken,
}

/// Receives side effects after every band of a step has finished
pub trait SideEffectHandler: Send {
    fn handle(&mut self, coord: IVec2, token: SideEffectToken);
}

impl<F> SideEffectHandler for F
where
    F: FnMut(IVec2, SideEffectToken) + Send,
{
    fn handle(&mut self, coord: IVec2, token: SideEffectToken) {
        self(coord, token)
    }
}

/// Fills a freshly created chunk before it joins the grid
///
/// Passes run in registration order, serially, with the chunk's static random stream.
pub trait GenerationPass: Send + Sync {
    fn name(&self) -> &str {
        "generation"
    }

    fn generate(&self, cursor: &mut ChunkCursor<'_>);
}

/// Decides whether an inactive chunk may be dropped during maintenance
pub trait EvictionPolicy: Send {
    fn should_evict(&mut self, chunk: &Chunk, tick: i64) -> bool;
}

/// Evicts chunks that have not been stepped for `max_idle_ticks`
#[derive(Clone, Copy, Debug)]
pub struct IdleEviction {
    pub max_idle_ticks: i64,
}

impl EvictionPolicy for IdleEviction {
    fn should_evict(&mut self, chunk: &Chunk, tick: i64) -> bool {
        chunk.last_step_tick >= 0 && tick - chunk.last_step_tick > self.max_idle_ticks
    }
}
