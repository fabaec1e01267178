//! In-memory result cache keyed by order id
//!
//! Entries are stamped on write and never evicted in the background; they are
//! only overwritten or removed through [`ResultCache::clear`]. Freshness is a
//! caller decision: each reader passes its own TTL to [`CachedResult::is_fresh`],
//! so different call sites can apply different windows to the same store.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct CachedResult<T> {
    pub result: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedResult<T> {
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.cached_at)
            .to_std()
            .unwrap_or_default()
    }

    /// Strictly younger than `ttl`.
    pub fn is_fresh(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        self.age(now) < ttl
    }
}

#[derive(Debug, Clone)]
pub struct ResultCache<T> {
    entries: HashMap<String, CachedResult<T>>,
}

impl<T> Default for ResultCache<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<T> ResultCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `result`, replacing any previous entry for the order.
    pub fn put(&mut self, order_id: impl Into<String>, result: T) {
        self.put_at(order_id, result, Utc::now());
    }

    pub fn put_at(&mut self, order_id: impl Into<String>, result: T, cached_at: DateTime<Utc>) {
        let order_id = order_id.into();
        debug!(order_id = %order_id, "Caching payment result");
        self.entries
            .insert(order_id, CachedResult { result, cached_at });
    }

    pub fn get(&self, order_id: &str) -> Option<&CachedResult<T>> {
        self.entries.get(order_id)
    }

    /// Remove one entry, or every entry when `order_id` is `None`.
    pub fn clear(&mut self, order_id: Option<&str>) {
        match order_id {
            Some(id) => {
                self.entries.remove(id);
            }
            None => self.entries.clear(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
