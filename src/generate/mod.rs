//! Patch generation: scaffold two versions, diff them.
//!
//! - [`Scaffolder`] runs the external generator once per version.
//! - [`DiffEngine`] turns the two trees into a unified diff via git.
//! - [`WorkingTree`] owns the request-scoped directories and deletes them
//!   on every exit path.

pub mod engine;
pub mod scaffold;
pub mod workspace;

pub use engine::{DiffEngine, MirrorStats, mirror_tree};
pub use scaffold::Scaffolder;
pub use workspace::WorkingTree;
