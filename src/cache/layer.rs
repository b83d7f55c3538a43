//! Cache layer that orchestrates freshness checks, in-flight de-duplication
//! and mutation-driven invalidation on top of network fetchers.

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::fingerprint::Fingerprint;
use super::traits::{CacheResult, Cacheable, InvalidationRule, QueryKey};
use crate::error::{ApiError, ApiResult};

/// Output of a completed fetch, shared by every caller that awaited it.
#[derive(Debug, Clone)]
struct Fetched {
  data: Value,
  fetched_at: DateTime<Utc>,
}

type SharedFetch = Shared<BoxFuture<'static, ApiResult<Fetched>>>;

/// A stored value with its freshness metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry {
  /// Serialized value as returned by the fetcher
  pub data: Value,
  /// Wall-clock time of the fetch
  pub fetched_at: DateTime<Utc>,
  /// Staleness window the entry was stored with
  pub stale_after: Duration,
  /// Set by invalidation; the entry is kept but never served as fresh
  pub invalidated: bool,
  loaded_at: Instant,
}

impl CacheEntry {
  /// Time since the entry was fetched
  pub fn age(&self) -> Duration {
    self.loaded_at.elapsed()
  }

  pub fn is_fresh(&self) -> bool {
    !self.invalidated && self.age() < self.stale_after
  }
}

struct InFlight {
  id: u64,
  future: SharedFetch,
  /// Invalidated while running: the result reaches current waiters only
  stale_on_arrival: bool,
}

#[derive(Default)]
struct Inner {
  entries: HashMap<Fingerprint, CacheEntry>,
  in_flight: HashMap<Fingerprint, InFlight>,
  next_id: u64,
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
  // Every critical section leaves the maps consistent, so a poisoned lock
  // still guards valid data.
  inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Keyed resource cache shared by every view of the application.
///
/// - a fresh entry is returned without touching the network
/// - a stale, invalidated or missing entry triggers a blocking refetch
/// - at most one fetch per fingerprint is in flight; concurrent reads join it,
///   and a read arriving after invalidation waits for the running fetch to
///   finish before starting its own
/// - a failed fetch leaves any existing entry in place
#[derive(Clone, Default)]
pub struct ResourceCache {
  inner: Arc<Mutex<Inner>>,
}

impl ResourceCache {
  pub fn new() -> Self {
    Self::default()
  }

  /// Read a resource described by a [`QueryKey`].
  pub async fn fetch<K, T, F, Fut>(&self, key: &K, fetcher: F) -> ApiResult<CacheResult<T>>
  where
    K: QueryKey,
    T: Cacheable,
    F: FnOnce() -> Fut,
    Fut: Future<Output = ApiResult<T>> + Send + 'static,
  {
    debug!(resource = %key.description(), "read");
    self
      .read(&key.fingerprint(), key.stale_after(), fetcher)
      .await
  }

  /// Return the cached value for `fingerprint` if fresh, otherwise fetch it.
  ///
  /// The fetcher is only called when this read starts a new fetch; a read
  /// that finds a fetch already in flight awaits that one instead. An
  /// in-flight fetch that was invalidated is awaited but not joined: its
  /// result predates the invalidation, so the read fetches again after it.
  pub async fn read<T, F, Fut>(
    &self,
    fingerprint: &Fingerprint,
    stale_after: Duration,
    fetcher: F,
  ) -> ApiResult<CacheResult<T>>
  where
    T: Cacheable,
    F: FnOnce() -> Fut,
    Fut: Future<Output = ApiResult<T>> + Send + 'static,
  {
    let (fetch, joined) = loop {
      let outdated = {
        let mut inner = lock(&self.inner);

        if let Some(entry) = inner.entries.get(fingerprint).filter(|e| e.is_fresh()) {
          debug!(%fingerprint, "cache hit");
          let data = serde_json::from_value(entry.data.clone())?;
          return Ok(CacheResult::from_cache(data, entry.fetched_at));
        }

        let pending = inner
          .in_flight
          .get(fingerprint)
          .map(|flight| (flight.future.clone(), flight.stale_on_arrival));

        match pending {
          Some((future, false)) => {
            debug!(%fingerprint, "joining in-flight fetch");
            break (future, true);
          }
          Some((future, true)) => future,
          None => {
            debug!(%fingerprint, "cache miss, fetching");
            let future = self.start_fetch(&mut inner, fingerprint, stale_after, fetcher());
            break (future, false);
          }
        }
      };

      debug!(%fingerprint, "waiting for invalidated fetch to finish");
      // Its outcome is irrelevant here; only its completion is awaited
      let _ = outdated.await;
    };

    let fetched = fetch.await?;
    let data = serde_json::from_value(fetched.data)?;

    Ok(if joined {
      CacheResult::joined(data, fetched.fetched_at)
    } else {
      CacheResult::from_network(data, fetched.fetched_at)
    })
  }

  /// Spawn the fetch and register it as the in-flight fetch for `fingerprint`.
  fn start_fetch<T, Fut>(
    &self,
    inner: &mut Inner,
    fingerprint: &Fingerprint,
    stale_after: Duration,
    request: Fut,
  ) -> SharedFetch
  where
    T: Cacheable,
    Fut: Future<Output = ApiResult<T>> + Send + 'static,
  {
    let id = inner.next_id;
    inner.next_id += 1;

    let state = Arc::clone(&self.inner);
    let key = fingerprint.clone();

    // Cancellation is not supported: the request runs on its own task, so a
    // caller that stops waiting does not abort it and the result still lands
    // in the shared cache.
    let task = tokio::spawn(async move {
      let result = match request.await {
        Ok(data) => serde_json::to_value(&data)
          .map(|data| Fetched {
            data,
            fetched_at: Utc::now(),
          })
          .map_err(ApiError::from),
        Err(error) => Err(error),
      };

      let mut inner = lock(&state);
      let registered = inner
        .in_flight
        .get(&key)
        .filter(|flight| flight.id == id)
        .map(|flight| !flight.stale_on_arrival);
      let current = match registered {
        Some(fresh) => {
          inner.in_flight.remove(&key);
          fresh
        }
        None => false,
      };

      match &result {
        Ok(fetched) if current => {
          inner.entries.insert(
            key,
            CacheEntry {
              data: fetched.data.clone(),
              fetched_at: fetched.fetched_at,
              stale_after,
              invalidated: false,
              loaded_at: Instant::now(),
            },
          );
        }
        Ok(_) => debug!(fingerprint = %key, "invalidated while in flight, result not stored"),
        Err(error) => warn!(fingerprint = %key, %error, "fetch failed, keeping existing entry"),
      }

      result
    });

    let future = async move {
      task
        .await
        .unwrap_or_else(|e| Err(ApiError::Network(format!("fetch task failed: {}", e))))
    }
    .boxed()
    .shared();

    inner.in_flight.insert(
      fingerprint.clone(),
      InFlight {
        id,
        future: future.clone(),
        stale_on_arrival: false,
      },
    );

    future
  }

  /// Run a write operation; on success invalidate what `mutation` names.
  ///
  /// A failed mutation leaves the cache untouched and returns the error.
  pub async fn mutate<M, T, F, Fut>(&self, mutation: &M, op: F) -> ApiResult<T>
  where
    M: InvalidationRule,
    F: FnOnce() -> Fut,
    Fut: Future<Output = ApiResult<T>>,
  {
    match op().await {
      Ok(value) => {
        for prefix in mutation.invalidates() {
          self.invalidate(&prefix);
        }
        debug!(mutation = mutation.name(), "mutation succeeded");
        Ok(value)
      }
      Err(error) => {
        debug!(mutation = mutation.name(), %error, "mutation failed, cache untouched");
        Err(error)
      }
    }
  }

  /// Mark every entry under `prefix` as invalidated, and every matching
  /// in-flight fetch as stale on arrival. Returns the number of entries
  /// marked.
  pub fn invalidate(&self, prefix: &Fingerprint) -> usize {
    let mut inner = lock(&self.inner);

    let mut marked = 0;
    for (fingerprint, entry) in inner.entries.iter_mut() {
      if fingerprint.starts_with(prefix) && !entry.invalidated {
        entry.invalidated = true;
        marked += 1;
      }
    }
    for (fingerprint, flight) in inner.in_flight.iter_mut() {
      if fingerprint.starts_with(prefix) {
        flight.stale_on_arrival = true;
      }
    }

    debug!(%prefix, marked, "invalidated");
    marked
  }

  /// Stored entry for `fingerprint`, fresh or not.
  pub fn peek(&self, fingerprint: &Fingerprint) -> Option<CacheEntry> {
    lock(&self.inner).entries.get(fingerprint).cloned()
  }

  /// Drop every entry. Fetches still in flight complete for their current
  /// waiters but store nothing.
  pub fn clear(&self) {
    let mut inner = lock(&self.inner);
    inner.entries.clear();
    for flight in inner.in_flight.values_mut() {
      flight.stale_on_arrival = true;
    }
  }

  pub fn len(&self) -> usize {
    lock(&self.inner).entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}
