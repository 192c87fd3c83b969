//! Core DiffGenerator trait

use std::sync::Arc;

use async_trait::async_trait;

use crate::{DiffLocation, Result};

/// Turns a diff request into patch text.
///
/// [`DiffPipeline`](crate::DiffPipeline) is the production implementation;
/// [`BatchOrchestrator`](crate::BatchOrchestrator) depends only on this
/// trait so batches can be driven by any generator.
#[async_trait]
pub trait DiffGenerator: Send + Sync {
    /// Return the unified diff for `location`, generating and caching it
    /// if necessary.
    async fn generate_diff(&self, location: &DiffLocation) -> Result<Arc<str>>;
}
