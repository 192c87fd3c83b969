//! Request and cache identity types.

pub mod key;
pub mod location;

pub use key::CacheKey;
pub use location::{DiffLocation, Feature, FeatureSet, Version};
