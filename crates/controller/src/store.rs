//! Sinks fed by reflectors and pollers, and the Build cache.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Destination for objects observed on the authority.
///
/// Every method is keyed by the object's identity. Implementations guard their
/// own state; callers never lock.
pub trait Store<T>: Send + Sync {
    /// First observation of `key`.
    fn add(&self, key: String, obj: T);

    /// Newer observation of `key`.
    fn update(&self, key: String, obj: T);

    /// `key` no longer exists on the authority.
    fn delete(&self, key: &str);

    /// Swaps the whole content for a fresh listing, in listing order.
    fn replace(&self, items: Vec<(String, T)>);
}

/// Read access the reconciliation loop gets to the Build cache.
pub trait StoreReader<T>: Send + Sync {
    /// Latest known snapshot for `key`.
    fn get(&self, key: &str) -> Option<T>;

    /// Every cached object, in no particular order.
    fn list(&self) -> Vec<T>;

    /// Every cached key, in no particular order.
    fn keys(&self) -> Vec<String>;
}

/// Random-access cache of the latest snapshot per identity.
///
/// Newer snapshots overwrite older ones wholesale.
#[derive(Debug)]
pub struct Cache<T> {
    items: Mutex<HashMap<String, T>>,
}

impl<T> Default for Cache<T> {
    fn default() -> Self {
        Self {
            items: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> Cache<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, T>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl<T: Send> Store<T> for Cache<T> {
    fn add(&self, key: String, obj: T) {
        self.lock().insert(key, obj);
    }

    fn update(&self, key: String, obj: T) {
        self.lock().insert(key, obj);
    }

    fn delete(&self, key: &str) {
        self.lock().remove(key);
    }

    fn replace(&self, items: Vec<(String, T)>) {
        let fresh: HashMap<String, T> = items.into_iter().collect();
        *self.lock() = fresh;
    }
}

impl<T: Clone + Send> StoreReader<T> for Cache<T> {
    fn get(&self, key: &str) -> Option<T> {
        self.lock().get(key).cloned()
    }

    fn list(&self) -> Vec<T> {
        self.lock().values().cloned().collect()
    }

    fn keys(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[derive(Clone, Debug)]
    enum Op {
        Add(u8, u32),
        Update(u8, u32),
        Delete(u8),
    }

    fn arb_op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..8, any::<u32>()).prop_map(|(k, v)| Op::Add(k, v)),
            (0u8..8, any::<u32>()).prop_map(|(k, v)| Op::Update(k, v)),
            (0u8..8).prop_map(Op::Delete),
        ]
    }

    #[test]
    fn replace_drops_absent_keys() {
        let cache = Cache::new();
        cache.add("a".into(), 1);
        cache.add("b".into(), 2);
        cache.replace(vec![("b".into(), 20), ("c".into(), 30)]);

        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(20));
        assert_eq!(cache.get("c"), Some(30));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn delete_of_unknown_key_is_noop() {
        let cache: Cache<u32> = Cache::new();
        cache.delete("ghost");
        assert!(cache.is_empty());
    }

    proptest! {
        /// Lookup returns the last applied value, or nothing after a delete.
        #[test]
        fn lookup_returns_last_applied(ops in prop::collection::vec(arb_op(), 0..64)) {
            let cache = Cache::new();
            let mut expected: HashMap<String, u32> = HashMap::new();
            for op in &ops {
                match *op {
                    Op::Add(k, v) => {
                        cache.add(k.to_string(), v);
                        expected.insert(k.to_string(), v);
                    }
                    Op::Update(k, v) => {
                        cache.update(k.to_string(), v);
                        expected.insert(k.to_string(), v);
                    }
                    Op::Delete(k) => {
                        cache.delete(&k.to_string());
                        expected.remove(&k.to_string());
                    }
                }
            }
            for k in 0u8..8 {
                prop_assert_eq!(cache.get(&k.to_string()), expected.get(&k.to_string()).copied());
            }
            prop_assert_eq!(cache.len(), expected.len());
        }
    }
}
