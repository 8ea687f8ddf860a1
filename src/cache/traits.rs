//! Core traits and types for the caching system.

use chrono::{DateTime, Utc};

/// Logical name of a cached resource.
///
/// Implementors map a typed query (e.g. "notes of user X") to the string the
/// cache is keyed by.
pub trait QueryKey {
  /// Stable key for cache lookups
  fn cache_key(&self) -> String;

  /// Human-readable description for logs
  fn description(&self) -> String;
}

/// Result from a cache operation, including data and metadata about the source.
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
  /// Create a new cache result from fresh network data.
  pub fn from_network(data: T, fetched_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      fetched_at,
    }
  }

  /// Create a new cache result from cached data.
  pub fn from_cache(data: T, fetched_at: DateTime<Utc>, is_stale: bool) -> Self {
    Self {
      data,
      source: if is_stale {
        CacheSource::CacheStale
      } else {
        CacheSource::CacheFresh
      },
      fetched_at,
    }
  }

  pub fn is_stale(&self) -> bool {
    self.source == CacheSource::CacheStale
  }
}

/// Indicates where cached data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from network
  Network,
  /// Data from cache, still considered fresh
  CacheFresh,
  /// Data from cache, invalidated or expired; a refresh is due or in flight
  CacheStale,
}

/// Notifications published when a cache entry changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
  /// Entry marked stale; readers should refetch
  Invalidated(String),
  /// Entry replaced with fresh data
  Refreshed(String),
}

impl CacheEvent {
  pub fn key(&self) -> &str {
    match self {
      CacheEvent::Invalidated(k) | CacheEvent::Refreshed(k) => k,
    }
  }
}
