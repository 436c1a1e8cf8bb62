//! Named locks keyed by resource ID
//!
//! Terraform applies independent resources concurrently. When several of them
//! mutate the same parent object (rules of one firewall policy, connections of
//! one VPN gateway) the provider serializes them by locking the parent's ID.
//!
//! Entries are reference counted by holders and waiters and removed once the
//! last one goes away, so the registry only ever contains keys that are in use.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};
use tokio::sync::OwnedMutexGuard;

#[derive(Clone, Default)]
pub struct MutexKV {
    inner: Arc<Mutex<HashMap<String, Entry>>>,
}

struct Entry {
    lock: Arc<tokio::sync::Mutex<()>>,
    refs: usize,
}

impl MutexKV {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry shared by every resource
    pub fn global() -> &'static MutexKV {
        static GLOBAL: OnceLock<MutexKV> = OnceLock::new();
        GLOBAL.get_or_init(MutexKV::new)
    }

    /// Waits until no other guard for `key` is alive. Dropping the returned
    /// guard releases the lock.
    pub async fn lock(&self, key: impl Into<String>) -> MutexKVGuard {
        let key = key.into();
        let registration = self.register(&key);

        tracing::debug!(key = %key, "locking");
        let guard = registration.lock.clone().lock_owned().await;
        tracing::debug!(key = %key, "locked");

        MutexKVGuard {
            _guard: guard,
            _registration: registration,
        }
    }

    /// Number of keys currently held or waited on
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn register(&self, key: &str) -> Registration {
        let mut entries = self.entries();
        let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
            lock: Arc::new(tokio::sync::Mutex::new(())),
            refs: 0,
        });
        entry.refs += 1;

        Registration {
            owner: self.clone(),
            key: key.to_string(),
            lock: entry.lock.clone(),
        }
    }

    fn release(&self, key: &str) {
        let mut entries = self.entries();
        if let Some(entry) = entries.get_mut(key) {
            entry.refs -= 1;
            if entry.refs == 0 {
                entries.remove(key);
            }
        }
    }

    // The map is only touched in short non-async sections, so a poisoned
    // mutex still holds consistent data.
    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for MutexKV {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutexKV").field("keys", &self.len()).finish()
    }
}

/// Counts one holder or waiter. Dropped on unlock, or when a pending
/// `lock` future is cancelled.
struct Registration {
    owner: MutexKV,
    key: String,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.owner.release(&self.key);
    }
}

/// Held lock on one key
pub struct MutexKVGuard {
    // Field order matters: the mutex is released before the entry is
    // deregistered.
    _guard: OwnedMutexGuard<()>,
    _registration: Registration,
}

impl MutexKVGuard {
    pub fn key(&self) -> &str {
        &self._registration.key
    }
}

impl Drop for MutexKVGuard {
    fn drop(&mut self) {
        tracing::debug!(key = %self._registration.key, "unlocking");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn same_key_is_serialized() {
        let locks = MutexKV::new();
        let events = Arc::new(Mutex::new(Vec::new()));

        let first = locks.lock("policy-1").await;

        let waiter = {
            let locks = locks.clone();
            let events = events.clone();
            tokio::spawn(async move {
                let _guard = locks.lock("policy-1").await;
                events.lock().unwrap().push("second-start");
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        events.lock().unwrap().push("first-end");
        drop(first);

        waiter.await.unwrap();
        assert_eq!(*events.lock().unwrap(), vec!["first-end", "second-start"]);
    }

    #[tokio::test]
    async fn different_keys_do_not_block() {
        let locks = MutexKV::new();

        let _a = locks.lock("gateway-a").await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.lock("gateway-b")).await;

        assert!(b.is_ok());
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn critical_sections_never_overlap() {
        let locks = MutexKV::new();
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let locks = locks.clone();
                let inside = inside.clone();
                let max_seen = max_seen.clone();
                tokio::spawn(async move {
                    let _guard = locks.lock("instance-1").await;
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        futures::future::join_all(tasks).await;

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn entries_are_removed_after_release() {
        let locks = MutexKV::new();

        let guard = locks.lock("vpc-1").await;
        assert_eq!(guard.key(), "vpc-1");
        assert_eq!(locks.len(), 1);

        drop(guard);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn cancelled_waiter_does_not_leak_entry() {
        let locks = MutexKV::new();
        let held = locks.lock("policy-2").await;

        let pending = tokio::time::timeout(Duration::from_millis(20), locks.lock("policy-2")).await;
        assert!(pending.is_err());
        assert_eq!(locks.len(), 1);

        drop(held);
        assert!(locks.is_empty());
    }

    #[test]
    fn global_registry_is_shared() {
        let a = MutexKV::global();
        let b = MutexKV::global();
        assert!(Arc::ptr_eq(&a.inner, &b.inner));
    }
}
