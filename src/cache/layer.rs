//! Cache layer that coordinates keyed snapshots with network fetching.

use chrono::{DateTime, Duration, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use tracing::debug;

use super::traits::CacheResult;
use crate::error::{Error, Result};

type SharedFetch<T> = Shared<BoxFuture<'static, Result<T>>>;

struct InFlight<T> {
  id: u64,
  future: SharedFetch<T>,
}

struct Snapshot<T> {
  data: T,
  fetched_at: DateTime<Utc>,
}

struct Entry<T> {
  snapshot: Option<Snapshot<T>>,
  /// Set by invalidation, cleared by the next successful fetch
  stale: bool,
  in_flight: Option<InFlight<T>>,
  last_error: Option<Error>,
}

impl<T> Default for Entry<T> {
  fn default() -> Self {
    Self {
      snapshot: None,
      stale: false,
      in_flight: None,
      last_error: None,
    }
  }
}

/// In-memory request cache keyed by logical resource name.
///
/// - At most one fetch per key is in flight; later callers join it.
/// - `peek` never blocks and serves the last snapshot even while stale.
/// - A fetch started before `invalidate` is not stored when it lands.
/// - Failed fetches leave the previous snapshot in place.
pub struct CacheLayer<T> {
  entries: Arc<Mutex<HashMap<String, Entry<T>>>>,
  next_id: Arc<AtomicU64>,
  /// How long before cached data is considered stale
  stale_time: Duration,
}

impl<T> Clone for CacheLayer<T> {
  fn clone(&self) -> Self {
    Self {
      entries: Arc::clone(&self.entries),
      next_id: Arc::clone(&self.next_id),
      stale_time: self.stale_time,
    }
  }
}

impl<T: Clone + Send + Sync + 'static> CacheLayer<T> {
  pub fn new() -> Self {
    Self {
      entries: Arc::new(Mutex::new(HashMap::new())),
      next_id: Arc::new(AtomicU64::new(1)),
      stale_time: Duration::minutes(5),
    }
  }

  /// Set the stale time for cached data.
  pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
    self.stale_time = stale_time;
    self
  }

  fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry<T>>> {
    // Entries stay consistent under panic: every write is a single assignment
    self.entries.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn is_expired(&self, fetched_at: DateTime<Utc>) -> bool {
    Utc::now() - fetched_at > self.stale_time
  }

  /// Return the in-flight fetch for `entry`, starting one if needed.
  fn join_or_start<F, Fut>(&self, key: &str, entry: &mut Entry<T>, fetcher: F) -> (u64, SharedFetch<T>)
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>> + Send + 'static,
  {
    if let Some(in_flight) = &entry.in_flight {
      debug!(key, id = in_flight.id, "joining in-flight fetch");
      return (in_flight.id, in_flight.future.clone());
    }

    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
    debug!(key, id, "starting fetch");
    let future = fetcher().boxed().shared();
    entry.in_flight = Some(InFlight {
      id,
      future: future.clone(),
    });
    (id, future)
  }

  /// Record the outcome of fetch `id`. Returns the fetch time when the
  /// result was stored.
  fn settle(&self, key: &str, id: u64, result: &Result<T>) -> Option<DateTime<Utc>> {
    let mut entries = self.lock();
    let entry = entries.get_mut(key)?;

    if entry.in_flight.as_ref().map(|f| f.id) != Some(id) {
      // Superseded by an invalidation, or already settled by another joiner
      return None;
    }
    entry.in_flight = None;

    match result {
      Ok(data) => {
        let fetched_at = Utc::now();
        entry.snapshot = Some(Snapshot {
          data: data.clone(),
          fetched_at,
        });
        entry.stale = false;
        entry.last_error = None;
        Some(fetched_at)
      }
      Err(e) => {
        entry.last_error = Some(e.clone());
        None
      }
    }
  }

  /// Fetch with cache-first strategy.
  ///
  /// 1. Fresh snapshot: return immediately
  /// 2. Fetch in flight: join it
  /// 3. Otherwise start a fetch, store the result, return it
  pub async fn fetch<F, Fut>(&self, key: &str, fetcher: F) -> Result<CacheResult<T>>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>> + Send + 'static,
  {
    let (id, future) = {
      let mut entries = self.lock();
      let entry = entries.entry(key.to_string()).or_default();

      if let Some(snapshot) = &entry.snapshot {
        if !entry.stale && !self.is_expired(snapshot.fetched_at) {
          return Ok(CacheResult::from_cache(
            snapshot.data.clone(),
            snapshot.fetched_at,
            false,
          ));
        }
      }

      self.join_or_start(key, entry, fetcher)
    };

    let result = future.await;
    let stored_at = self.settle(key, id, &result);
    result.map(|data| CacheResult::from_network(data, stored_at.unwrap_or_else(Utc::now)))
  }

  /// Start (or join) a fetch for `key` and drive it to completion in the
  /// background. Nobody needs to await it for the cache to be updated; the
  /// handle resolves to whether this fetch's result was stored.
  pub fn revalidate<F, Fut>(&self, key: &str, fetcher: F) -> JoinHandle<bool>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>> + Send + 'static,
  {
    let (id, future) = {
      let mut entries = self.lock();
      let entry = entries.entry(key.to_string()).or_default();
      self.join_or_start(key, entry, fetcher)
    };

    let cache = self.clone();
    let key = key.to_string();
    tokio::spawn(async move {
      let result = future.await;
      cache.settle(&key, id, &result).is_some()
    })
  }

  /// Last snapshot for `key`, without blocking or fetching.
  pub fn peek(&self, key: &str) -> Option<CacheResult<T>> {
    let entries = self.lock();
    let entry = entries.get(key)?;
    let snapshot = entry.snapshot.as_ref()?;
    let stale = entry.stale || self.is_expired(snapshot.fetched_at);
    Some(CacheResult::from_cache(
      snapshot.data.clone(),
      snapshot.fetched_at,
      stale,
    ))
  }

  /// Whether a fetch for `key` is outstanding.
  pub fn is_fetching(&self, key: &str) -> bool {
    self
      .lock()
      .get(key)
      .is_some_and(|entry| entry.in_flight.is_some())
  }

  /// Error of the last failed fetch, cleared by the next success.
  pub fn last_error(&self, key: &str) -> Option<Error> {
    self.lock().get(key).and_then(|e| e.last_error.clone())
  }

  /// Mark `key` stale. Any fetch already in flight is detached so its
  /// (older) result is not stored. Returns false if nothing was cached.
  pub fn invalidate(&self, key: &str) -> bool {
    let mut entries = self.lock();
    match entries.get_mut(key) {
      Some(entry) => {
        entry.stale = true;
        entry.in_flight = None;
        true
      }
      None => false,
    }
  }

  /// Drop everything cached under `key`.
  pub fn remove(&self, key: &str) {
    self.lock().remove(key);
  }
}

impl<T: Clone + Send + Sync + 'static> Default for CacheLayer<T> {
  fn default() -> Self {
    Self::new()
  }
}
