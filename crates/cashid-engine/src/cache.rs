//! In-memory request cache.
//!
//! The default `RequestCache` implementation: a mutex-guarded map with lazy
//! TTL expiry. `compare_and_swap` holds the lock across compare and write,
//! which gives the per-key atomicity the validator's consume step relies on.
//! Suitable for single-process deployments and tests; shared deployments
//! substitute their own backend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use cashid_core::{CashIdError, CashIdResult, Clock, RequestCache, SystemClock, Timestamp};

struct Entry {
    value: Vec<u8>,
    expires_at: Option<Timestamp>,
}

pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
    clock: Arc<dyn Clock>,
}

fn lock_entries(
    mutex: &Mutex<HashMap<String, Entry>>,
) -> CashIdResult<MutexGuard<'_, HashMap<String, Entry>>> {
    mutex
        .lock()
        .map_err(|e| CashIdError::Cache(format!("lock poisoned: {}", e)))
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Number of live (non-expired) entries, for tests and diagnostics.
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        lock_entries(&self.entries)
            .map(|e| e.values().filter(|entry| !expired(entry, now)).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

fn expired(entry: &Entry, now: Timestamp) -> bool {
    entry.expires_at.is_some_and(|at| at <= now)
}

impl RequestCache for MemoryCache {
    fn get(&self, key: &str) -> CashIdResult<Option<Vec<u8>>> {
        let now = self.clock.now();
        let mut entries = lock_entries(&self.entries)?;
        if entries.get(key).is_some_and(|e| expired(e, now)) {
            entries.remove(key);
        }
        Ok(entries.get(key).map(|e| e.value.clone()))
    }

    fn set(&self, key: &str, value: &[u8], ttl_secs: Option<u64>) -> CashIdResult<bool> {
        let expires_at = ttl_secs.map(|ttl| self.clock.now().add_secs(ttl));
        let mut entries = lock_entries(&self.entries)?;
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_vec(),
                expires_at,
            },
        );
        Ok(true)
    }

    fn delete(&self, key: &str) -> CashIdResult<bool> {
        let mut entries = lock_entries(&self.entries)?;
        Ok(entries.remove(key).is_some())
    }

    fn has(&self, key: &str) -> CashIdResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        new_value: &[u8],
    ) -> CashIdResult<bool> {
        let now = self.clock.now();
        let mut entries = lock_entries(&self.entries)?;
        if entries.get(key).is_some_and(|e| expired(e, now)) {
            entries.remove(key);
        }
        let (matches, expires_at) = {
            let current = entries.get(key);
            let matches = match (current, expected) {
                (None, None) => true,
                (Some(entry), Some(bytes)) => entry.value.as_slice() == bytes,
                _ => false,
            };
            (matches, current.and_then(|e| e.expires_at))
        };
        if matches {
            entries.insert(
                key.to_string(),
                Entry {
                    value: new_value.to_vec(),
                    expires_at,
                },
            );
        }
        Ok(matches)
    }
}
