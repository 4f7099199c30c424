// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Best-effort key/value cache with per-entry TTL.
//!
//! Values are stored as JSON so anything `Serialize` can go in. Callers treat
//! every error as a miss: the cache is never authoritative.

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Expired entries are swept once every this many writes.
const SWEEP_EVERY_WRITES: u64 = 256;

/// Cache key builders.
pub mod keys {
    pub fn user_location(user_id: &str) -> String {
        format!("user_location:{}", user_id)
    }

    pub fn drift_alerts(ride_id: &str) -> String {
        format!("drift_alerts:{}", ride_id)
    }

    pub fn ride_locations(ride_id: &str) -> String {
        format!("ride_locations:{}", ride_id)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache unavailable")]
    Unavailable,

    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Clone)]
struct CacheEntry {
    json: String,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// Shared cache handle. Clones share storage.
#[derive(Clone)]
pub struct CacheService {
    entries: Arc<DashMap<String, CacheEntry>>,
    writes: Arc<AtomicU64>,
    available: bool,
}

impl Default for CacheService {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheService {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            writes: Arc::new(AtomicU64::new(0)),
            available: true,
        }
    }

    /// A cache whose every operation fails with [`CacheError::Unavailable`].
    pub fn unavailable() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            writes: Arc::new(AtomicU64::new(0)),
            available: false,
        }
    }

    fn check(&self) -> Result<(), CacheError> {
        if self.available {
            Ok(())
        } else {
            Err(CacheError::Unavailable)
        }
    }

    /// Store a value. `ttl = None` keeps it until overwritten or deleted.
    pub fn set<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        self.check()?;
        let json = serde_json::to_string(value)?;
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                json,
                expires_at: ttl.map(|ttl| Instant::now() + ttl),
            },
        );

        let writes = self.writes.fetch_add(1, Ordering::Relaxed) + 1;
        if writes % SWEEP_EVERY_WRITES == 0 {
            self.purge_expired();
        }
        Ok(())
    }

    /// Fetch a live value. Expired entries are evicted on read.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        self.check()?;
        let now = Instant::now();

        // The read guard must be gone before `remove_if` takes the shard.
        let found = self
            .entries
            .get(key)
            .map(|entry| entry.is_live(now).then(|| entry.json.clone()));

        match found {
            Some(Some(json)) => Ok(Some(serde_json::from_str(&json)?)),
            Some(None) => {
                self.entries.remove_if(key, |_, entry| !entry.is_live(now));
                Ok(None)
            }
            None => Ok(None),
        }
    }

    pub fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.check()?;
        self.entries.remove(key);
        Ok(())
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            tracing::debug!(removed, remaining = self.entries.len(), "Swept expired cache entries");
        }
        removed
    }

    /// Number of stored entries, live or not yet swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
