pub mod config;
pub mod simulation;
pub mod world;

pub use config::{ConfigError, GridConfig, ReactionConfig};
pub use world::{Grid, StepSummary};
