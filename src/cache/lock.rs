use std::sync::{Arc, Mutex, MutexGuard};

use dashmap::DashMap;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, warn};

pub(crate) fn mutex_lock<'a, T>(
    lock: &'a Mutex<T>,
    target: &'static str,
    op: &'static str,
) -> MutexGuard<'a, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(
                op,
                target_module = target,
                lock_kind = "mutex.lock",
                result = "poisoned_recovered",
                hint = "state may be stale after panic in another thread",
                "Recovered from poisoned lock"
            );
            poisoned.into_inner()
        }
    }
}

/// Serializes generation per cache key within this process.
///
/// Two duplicate triggering events resolve to the same cache directory; the
/// second generation waits for the first and then finds the artifact in
/// place instead of writing the directory concurrently.
#[derive(Default, Clone)]
pub struct GenerationLocks {
    keys: Arc<DashMap<String, Arc<AsyncMutex<()>>>>,
}

impl GenerationLocks {
    pub fn new() -> Self {
        Self {
            keys: Arc::new(DashMap::new()),
        }
    }

    /// Wait for exclusive access to `key`. Released when the guard drops.
    pub async fn acquire(&self, key: &str) -> GenerationGuard {
        let slot = self
            .keys
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();

        if slot.try_lock().is_err() {
            debug!(
                target = "cache::lock",
                cache_key = key,
                "Generation already in flight; waiting"
            );
        }

        let guard = slot.lock_owned().await;
        GenerationGuard {
            key: key.to_string(),
            keys: Arc::clone(&self.keys),
            guard: Some(guard),
        }
    }

    /// Number of keys currently tracked.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

pub struct GenerationGuard {
    key: String,
    keys: Arc<DashMap<String, Arc<AsyncMutex<()>>>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for GenerationGuard {
    fn drop(&mut self) {
        // Release first so the count below only sees the map and any waiters.
        drop(self.guard.take());
        self.keys
            .remove_if(&self.key, |_, slot| Arc::strong_count(slot) == 1);
    }
}
