//! Core traits and types for the caching system.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;

use super::fingerprint::Fingerprint;

/// Values that can be stored in the resource cache.
///
/// Entries are kept as JSON, so anything that round-trips through serde
/// qualifies.
pub trait Cacheable: Serialize + DeserializeOwned + Send + 'static {}

impl<T: Serialize + DeserializeOwned + Send + 'static> Cacheable for T {}

/// A readable resource with its own fingerprint and staleness window.
pub trait QueryKey {
  fn fingerprint(&self) -> Fingerprint;

  /// How long a fetched value stays fresh
  fn stale_after(&self) -> Duration;

  /// Human-readable description for logs
  fn description(&self) -> String;
}

/// A write operation and the fingerprint prefixes it makes untrustworthy.
pub trait InvalidationRule {
  fn name(&self) -> &'static str;

  /// Prefixes to invalidate after the mutation succeeds
  fn invalidates(&self) -> Vec<Fingerprint>;
}

/// Result from a cache read, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// When the data was fetched from the network
  pub fetched_at: DateTime<Utc>,
}

impl<T> CacheResult<T> {
  /// Create a new cache result from data this call fetched.
  pub fn from_network(data: T, fetched_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      fetched_at,
    }
  }

  /// Create a new cache result from a fresh cache entry.
  pub fn from_cache(data: T, fetched_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Cache,
      fetched_at,
    }
  }

  /// Create a new cache result from a fetch started by another caller.
  pub fn joined(data: T, fetched_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Joined,
      fetched_at,
    }
  }
}

/// Indicates where cached data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// This read performed the network call
  Network,
  /// Served from a fresh cache entry, no network call
  Cache,
  /// Awaited a fetch another read had already started
  Joined,
}
