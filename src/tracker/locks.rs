//! Per-key write locks
//!
//! A batch locks every key it may write. Keys are acquired in sorted order,
//! so two batches with overlapping key sets serialise without deadlocking
//! and disjoint batches never wait on each other.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Default)]
pub struct KeyLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

/// Held for the duration of one batch; dropping it releases every key
pub struct KeyGuards {
    keys: Vec<String>,
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl KeyGuards {
    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire<I>(&self, keys: I) -> KeyGuards
    where
        I: IntoIterator<Item = String>,
    {
        let keys: Vec<String> = keys.into_iter().collect::<BTreeSet<_>>().into_iter().collect();

        let mutexes: Vec<Arc<AsyncMutex<()>>> = {
            let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            // An entry only the map still references is neither held nor awaited
            locks.retain(|_, mutex| Arc::strong_count(mutex) > 1);
            keys.iter()
                .map(|key| Arc::clone(locks.entry(key.clone()).or_default()))
                .collect()
        };

        let mut guards = Vec::with_capacity(mutexes.len());
        for mutex in mutexes {
            guards.push(mutex.lock_owned().await);
        }

        KeyGuards {
            keys,
            _guards: guards,
        }
    }
    /// Keys currently tracked in the lock table
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn keys(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_keys_are_sorted_and_deduplicated() {
        let locks = KeyLocks::new();
        let guards = locks.acquire(keys(&["b", "a", "b"])).await;
        assert_eq!(guards.keys(), &["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_overlapping_sets_wait() {
        let locks = Arc::new(KeyLocks::new());
        let held = locks.acquire(keys(&["a", "b"])).await;

        let blocked = tokio::time::timeout(
            Duration::from_millis(50),
            locks.acquire(keys(&["b", "c"])),
        )
        .await;
        assert!(blocked.is_err());

        let disjoint = tokio::time::timeout(
            Duration::from_millis(50),
            locks.acquire(keys(&["c", "d"])),
        )
        .await;
        assert!(disjoint.is_ok());

        drop(held);
        drop(disjoint);
        let after = tokio::time::timeout(
            Duration::from_millis(50),
            locks.acquire(keys(&["b", "c"])),
        )
        .await;
        assert!(after.is_ok());
    }

    #[tokio::test]
    async fn test_released_keys_are_pruned() {
        let locks = KeyLocks::new();
        let first = locks.acquire(keys(&["a", "b", "c"])).await;
        drop(first);

        let held = locks.acquire(keys(&["d"])).await;
        assert_eq!(locks.len(), 1);
        assert_eq!(held.keys(), &["d".to_string()]);

        drop(held);
        let _again = locks.acquire(keys(&["a"])).await;
        assert_eq!(locks.len(), 1);
    }
}
