//! Diff pipeline implementations

mod builder;
mod local;

pub use builder::{Scaffdiff, ScaffdiffBuilder};
pub use local::DiffPipeline;
