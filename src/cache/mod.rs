//! Client-side request cache.
//!
//! This module provides a domain-agnostic cache that:
//! - Holds the latest snapshot per logical key, plus in-flight and error state
//! - Coalesces concurrent fetches of one key into a single request
//! - Serves the previous snapshot while a refresh is in flight
//! - Is invalidated explicitly after writes; there is no local write-through

mod layer;
mod traits;

pub use layer::CacheLayer;
pub use traits::{CacheEvent, CacheResult, QueryKey};
#[cfg(test)]
pub use traits::CacheSource;
