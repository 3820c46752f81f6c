use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use parking_lot::Mutex;
use time::OffsetDateTime;

use super::{ResourceStore, StoreError, StoreResult};

struct Entry<V> {
    value: V,
    expires_at: OffsetDateTime,
}

struct Inner<V> {
    entries: HashMap<String, Entry<V>>,
    /// Ordered by expiry so sweeps only touch what is due.
    expiry_index: BTreeSet<(OffsetDateTime, String)>,
}

impl<V> Inner<V> {
    fn remove(&mut self, key: &str) -> Option<Entry<V>> {
        let entry = self.entries.remove(key)?;
        self.expiry_index.remove(&(entry.expires_at, key.to_string()));
        Some(entry)
    }

    fn sweep(&mut self, now: OffsetDateTime) -> usize {
        let mut removed = 0;
        while let Some((expires_at, key)) = self.expiry_index.first().cloned() {
            if expires_at > now {
                break;
            }
            self.expiry_index.remove(&(expires_at, key.clone()));
            self.entries.remove(&key);
            removed += 1;
        }
        removed
    }
}

/// In-memory [`ResourceStore`] guarded by a single mutex.
pub struct MemoryStore<V> {
    name: &'static str,
    inner: Mutex<Inner<V>>,
}

impl<V> MemoryStore<V> {
    /// Creates an empty store. `name` only appears in logs.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                expiry_index: BTreeSet::new(),
            }),
        }
    }
}

impl<V> std::fmt::Debug for MemoryStore<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("name", &self.name)
            .field("len", &self.inner.lock().entries.len())
            .finish()
    }
}

impl<V: Clone + Send + Sync> ResourceStore<V> for MemoryStore<V> {
    fn put(&self, key: &str, value: V, now: OffsetDateTime, ttl: Duration) -> StoreResult<()> {
        let expires_at = now
            .checked_add(
                time::Duration::try_from(ttl)
                    .map_err(|_| StoreError::TtlOutOfRange(key.to_string()))?,
            )
            .ok_or_else(|| StoreError::TtlOutOfRange(key.to_string()))?;

        let mut inner = self.inner.lock();
        inner.remove(key);
        inner.entries.insert(key.to_string(), Entry { value, expires_at });
        inner.expiry_index.insert((expires_at, key.to_string()));

        let swept = inner.sweep(now);
        if swept > 0 {
            tracing::debug!(store = self.name, swept, "evicted expired entries");
        }
        Ok(())
    }

    fn get(&self, key: &str, now: OffsetDateTime) -> StoreResult<Option<V>> {
        let mut inner = self.inner.lock();
        match inner.entries.get(key) {
            Some(entry) if now < entry.expires_at => Ok(Some(entry.value.clone())),
            Some(_) => {
                inner.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn delete(&self, key: &str) -> StoreResult<bool> {
        Ok(self.inner.lock().remove(key).is_some())
    }

    fn update(
        &self,
        key: &str,
        now: OffsetDateTime,
        f: &mut dyn FnMut(&mut V),
    ) -> StoreResult<Option<V>> {
        let mut inner = self.inner.lock();
        let expired = match inner.entries.get_mut(key) {
            Some(entry) if now < entry.expires_at => {
                let before = entry.value.clone();
                f(&mut entry.value);
                return Ok(Some(before));
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            inner.remove(key);
        }
        Ok(None)
    }

    fn remove_where(&self, predicate: &mut dyn FnMut(&V) -> bool) -> StoreResult<usize> {
        let mut inner = self.inner.lock();
        let doomed: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, entry)| predicate(&entry.value))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            inner.remove(key);
        }
        Ok(doomed.len())
    }

    fn sweep(&self, now: OffsetDateTime) -> StoreResult<usize> {
        Ok(self.inner.lock().sweep(now))
    }

    fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const T0: OffsetDateTime = datetime!(2025-01-01 00:00 UTC);

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn test_put_get() {
        let store = MemoryStore::new("test");
        store.put("a", 1, T0, secs(60)).unwrap();
        assert_eq!(store.get("a", T0).unwrap(), Some(1));
        assert_eq!(store.get("missing", T0).unwrap(), None);
    }

    #[test]
    fn test_expiry_boundary() {
        let store = MemoryStore::new("test");
        store.put("a", 1, T0, secs(60)).unwrap();

        let just_before = T0 + time::Duration::seconds(59) + time::Duration::milliseconds(999);
        assert_eq!(store.get("a", just_before).unwrap(), Some(1));

        // unreadable at exactly the expiry instant, and evicted
        assert_eq!(store.get("a", T0 + secs(60)).unwrap(), None);
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_put_overwrites_and_reindexes() {
        let store = MemoryStore::new("test");
        store.put("a", 1, T0, secs(10)).unwrap();
        store.put("a", 2, T0, secs(100)).unwrap();
        assert_eq!(store.len(), 1);

        // the old 10s expiry must not evict the new entry
        assert_eq!(store.sweep(T0 + secs(50)).unwrap(), 0);
        assert_eq!(store.get("a", T0 + secs(50)).unwrap(), Some(2));
    }

    #[test]
    fn test_put_sweeps_expired() {
        let store = MemoryStore::new("test");
        store.put("old", 1, T0, secs(10)).unwrap();
        store.put("new", 2, T0 + secs(20), secs(10)).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("new", T0 + secs(20)).unwrap(), Some(2));
    }

    #[test]
    fn test_sweep_only_due_entries() {
        let store = MemoryStore::new("test");
        store.put("a", 1, T0, secs(10)).unwrap();
        store.put("b", 2, T0, secs(20)).unwrap();
        store.put("c", 3, T0, secs(30)).unwrap();

        assert_eq!(store.sweep(T0 + secs(20)).unwrap(), 2);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("c", T0 + secs(20)).unwrap(), Some(3));
    }

    #[test]
    fn test_delete() {
        let store = MemoryStore::new("test");
        store.put("a", 1, T0, secs(10)).unwrap();
        assert!(store.delete("a").unwrap());
        assert!(!store.delete("a").unwrap());
        assert!(store.is_empty());
    }

    #[test]
    fn test_update_returns_previous() {
        let store = MemoryStore::new("test");
        store.put("code", false, T0, secs(10)).unwrap();

        let first = store.update("code", T0, &mut |used| *used = true).unwrap();
        assert_eq!(first, Some(false));

        let second = store.update("code", T0, &mut |used| *used = true).unwrap();
        assert_eq!(second, Some(true));
        assert_eq!(store.get("code", T0).unwrap(), Some(true));
    }

    #[test]
    fn test_update_expired_is_none() {
        let store = MemoryStore::new("test");
        store.put("code", 0, T0, secs(10)).unwrap();
        let mut called = false;
        let result = store
            .update("code", T0 + secs(10), &mut |_| called = true)
            .unwrap();
        assert_eq!(result, None);
        assert!(!called);
        assert!(store.is_empty());
    }

    #[test]
    fn test_remove_where() {
        let store = MemoryStore::new("test");
        for (i, key) in ["a", "b", "c", "d"].iter().enumerate() {
            store.put(key, i, T0, secs(10)).unwrap();
        }
        let removed = store.remove_where(&mut |v| v % 2 == 0).unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.get("b", T0).unwrap(), Some(1));
        assert_eq!(store.get("a", T0).unwrap(), None);
        // index stays consistent with entries
        assert_eq!(store.sweep(T0 + secs(10)).unwrap(), 2);
    }

    #[test]
    fn test_concurrent_check_and_set() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicUsize, Ordering};

        let store = Arc::new(MemoryStore::new("test"));
        store.put("code", false, T0, secs(10)).unwrap();
        let winners = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let winners = Arc::clone(&winners);
                std::thread::spawn(move || {
                    let before = store.update("code", T0, &mut |used| *used = true).unwrap();
                    if before == Some(false) {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(winners.load(Ordering::SeqCst), 1);
    }
}
