//! Scaffdiff - Upgrade patches between generated project versions
//!
//! Given two versions of a project generator and a set of enabled
//! features, scaffdiff scaffolds both projects, diffs them with git and
//! caches the resulting patch under a content-derived key. Concurrent
//! requests for the same key share one generation, and large backlogs
//! are worked through in width-bounded batches.
//!
//! # Single Diff Example
//!
//! ```rust,no_run
//! use scaffdiff::{DiffLocation, Feature, FeatureSet, Scaffdiff};
//!
//! #[tokio::main]
//! async fn main() -> scaffdiff::Result<()> {
//!     let pipeline = Scaffdiff::builder()
//!         .cache_dir("diffs")
//!         .workspace_root(".scaffdiff-work")
//!         .build()?;
//!
//!     let features = FeatureSet::empty().with(Feature::Tailwind, true);
//!     let location = DiffLocation::parse("7.0.0", "7.5.0", features)?;
//!     let patch = pipeline.generate_diff(&location).await?;
//!
//!     println!("{patch}");
//!     Ok(())
//! }
//! ```
//!
//! # Backfill Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use scaffdiff::{BatchOrchestrator, Config, Scaffdiff, ScaffdiffBuilder, StaticVersions};
//!
//! #[tokio::main]
//! async fn main() -> scaffdiff::Result<()> {
//!     let config = Config::load(None)?;
//!     let pipeline = Arc::new(ScaffdiffBuilder::from_config(&config).build()?);
//!
//!     let batch = BatchOrchestrator::new(pipeline.clone(), pipeline.store())
//!         .with_group_size(config.batch.group_size);
//!     let versions = StaticVersions::new(config.versions.parsed()?);
//!
//!     let outcomes = batch.run_all_missing(&versions).await?;
//!     println!("{} generated", outcomes.iter().filter(|o| o.is_ok()).count());
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod cache;
pub mod command;
pub mod config;
pub mod error;
pub mod generate;
pub mod pipeline;
pub mod remote;
pub mod telemetry;
pub mod traits;
pub mod trigger;
pub mod types;
pub mod version;

// Re-export main types at crate root
pub use batch::{BatchOrchestrator, BatchOutcome, StaticVersions, VersionSource};
pub use cache::{DiskCacheStore, PatchStore};
pub use command::{CommandRunner, CommandSpec, ProcessRunner};
pub use config::{Config, Secrets};
pub use error::{Result, ScaffdiffError};
pub use generate::{DiffEngine, Scaffolder};
pub use pipeline::{DiffPipeline, Scaffdiff, ScaffdiffBuilder};
pub use remote::{GitRemoteStore, RemoteStore};
pub use traits::DiffGenerator;
pub use types::{CacheKey, DiffLocation, Feature, FeatureSet, Version};
pub use version::{PKG_VERSION, version_string};
