//! Generic resource cache for API reads.
//!
//! This module provides an API-agnostic caching mechanism that:
//! - Addresses entries by structured [`Fingerprint`]s
//! - Serves fresh entries without a network call, refetches stale ones
//! - Collapses concurrent reads of one fingerprint into a single fetch
//! - Invalidates by fingerprint prefix after successful mutations

mod fingerprint;
mod layer;
mod traits;

pub use fingerprint::{Fingerprint, Segment};
pub use layer::{CacheEntry, ResourceCache};
pub use traits::{CacheResult, CacheSource, Cacheable, InvalidationRule, QueryKey};
