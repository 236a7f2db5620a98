//! Identity-deduplicating work queue with a suspending pop.
//!
//! A key occupies at most one slot. Re-observing a queued key swaps the
//! payload and keeps the slot, so a burst of updates to one Build yields a
//! single work item carrying the latest snapshot.
//!
//! The queue is unbounded: a producer that outpaces the consumer grows it
//! by at most one slot per distinct identity.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

use crate::store::Store;

#[derive(Debug)]
struct FifoState<T> {
    items: HashMap<String, T>,
    queue: VecDeque<String>,
}

/// FIFO of keyed objects.
#[derive(Debug)]
pub struct Fifo<T> {
    state: Mutex<FifoState<T>>,
    ready: Notify,
}

impl<T> Default for Fifo<T> {
    fn default() -> Self {
        Self {
            state: Mutex::new(FifoState {
                items: HashMap::new(),
                queue: VecDeque::new(),
            }),
            ready: Notify::new(),
        }
    }
}

impl<T> Fifo<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FifoState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn enqueue(&self, key: String, obj: T) {
        let mut state = self.lock();
        if state.items.insert(key.clone(), obj).is_none() {
            state.queue.push_back(key);
        }
        drop(state);
        self.ready.notify_one();
    }

    /// Removes and returns the oldest item, if any.
    pub fn try_pop(&self) -> Option<T> {
        let mut state = self.lock();
        while let Some(key) = state.queue.pop_front() {
            if let Some(obj) = state.items.remove(&key) {
                return Some(obj);
            }
        }
        None
    }

    /// Removes and returns the oldest item, waiting until one is queued.
    ///
    /// Each item is handed to exactly one caller.
    pub async fn pop(&self) -> T {
        loop {
            if let Some(obj) = self.try_pop() {
                if !self.is_empty() {
                    // Pass the wake-up on to any other waiting popper.
                    self.ready.notify_one();
                }
                return obj;
            }
            self.ready.notified().await;
        }
    }

    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().queue.is_empty()
    }

    /// Queued keys, oldest first.
    pub fn keys(&self) -> Vec<String> {
        self.lock().queue.iter().cloned().collect()
    }
}

impl<T: Clone> Fifo<T> {
    /// Queued item for `key`, without dequeuing it.
    pub fn get(&self, key: &str) -> Option<T> {
        self.lock().items.get(key).cloned()
    }
}

impl<T: Send> Store<T> for Fifo<T> {
    fn add(&self, key: String, obj: T) {
        self.enqueue(key, obj);
    }

    fn update(&self, key: String, obj: T) {
        self.enqueue(key, obj);
    }

    /// Deletions are not work: an already queued item is still delivered.
    fn delete(&self, _key: &str) {}

    /// Keeps queued keys still present (with refreshed payloads and their
    /// original slots), drops the rest, and appends new keys in listing order.
    fn replace(&self, items: Vec<(String, T)>) {
        let mut fresh: HashMap<String, T> = HashMap::with_capacity(items.len());
        let mut order = Vec::with_capacity(items.len());
        for (key, obj) in items {
            if fresh.insert(key.clone(), obj).is_none() {
                order.push(key);
            }
        }

        let mut state = self.lock();
        state.queue.retain(|key| fresh.contains_key(key));
        let queued: HashSet<String> = state.queue.iter().cloned().collect();
        for key in order {
            if !queued.contains(&key) {
                state.queue.push_back(key);
            }
        }
        state.items = fresh;
        let has_work = !state.queue.is_empty();
        drop(state);

        if has_work {
            self.ready.notify_one();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use proptest::prelude::*;

    use super::*;

    fn pairs(items: &[(&str, u32)]) -> Vec<(String, u32)> {
        items.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn update_keeps_slot_and_takes_latest_payload() {
        let fifo = Fifo::new();
        fifo.add("a".into(), 1);
        fifo.add("b".into(), 2);
        fifo.update("a".into(), 10);

        assert_eq!(fifo.keys(), vec!["a", "b"]);
        assert_eq!(fifo.try_pop(), Some(10));
        assert_eq!(fifo.try_pop(), Some(2));
        assert_eq!(fifo.try_pop(), None);
    }

    #[test]
    fn delete_does_not_dequeue() {
        let fifo = Fifo::new();
        fifo.add("a".into(), 1);
        fifo.delete("a");
        assert_eq!(fifo.try_pop(), Some(1));
    }

    #[test]
    fn replace_reconciles_to_listing() {
        let fifo = Fifo::new();
        fifo.replace(pairs(&[("p1", 1), ("p2", 2), ("p3", 3)]));
        assert_eq!(fifo.keys(), vec!["p1", "p2", "p3"]);

        assert_eq!(fifo.try_pop(), Some(1));

        fifo.replace(pairs(&[("p2", 20), ("p3", 30), ("p4", 40)]));
        assert_eq!(fifo.keys(), vec!["p2", "p3", "p4"]);
        assert_eq!(fifo.get("p2"), Some(20));
        assert_eq!(fifo.get("p1"), None);
    }

    #[test]
    fn replace_drops_vanished_items() {
        let fifo = Fifo::new();
        fifo.replace(pairs(&[("a", 1), ("b", 2)]));
        fifo.replace(pairs(&[("b", 3)]));
        assert_eq!(fifo.keys(), vec!["b"]);
        assert_eq!(fifo.try_pop(), Some(3));
        assert!(fifo.is_empty());
    }

    #[test]
    fn replace_collapses_duplicate_keys() {
        let fifo = Fifo::new();
        fifo.replace(pairs(&[("a", 1), ("a", 2)]));
        assert_eq!(fifo.len(), 1);
        assert_eq!(fifo.try_pop(), Some(2));
    }

    #[tokio::test]
    async fn pop_waits_for_an_item() {
        let fifo: Arc<Fifo<u32>> = Arc::new(Fifo::new());
        let popper = tokio::spawn({
            let fifo = Arc::clone(&fifo);
            async move { fifo.pop().await }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!popper.is_finished());

        fifo.add("a".into(), 7);
        let got = tokio::time::timeout(Duration::from_secs(1), popper)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got, 7);
    }

    #[tokio::test]
    async fn concurrent_poppers_never_share_an_item() {
        let fifo: Arc<Fifo<u32>> = Arc::new(Fifo::new());
        let poppers: Vec<_> = (0..4)
            .map(|_| {
                let fifo = Arc::clone(&fifo);
                tokio::spawn(async move { fifo.pop().await })
            })
            .collect();

        fifo.replace((0..4).map(|i| (format!("k{i}"), i)).collect());

        let mut got = Vec::new();
        for popper in poppers {
            got.push(
                tokio::time::timeout(Duration::from_secs(1), popper)
                    .await
                    .unwrap()
                    .unwrap(),
            );
        }
        got.sort_unstable();
        assert_eq!(got, vec![0, 1, 2, 3]);
    }

    proptest! {
        /// Length is bounded by distinct identities and draining yields each
        /// identity once with its most recent payload.
        #[test]
        fn dedup_bounds_length_and_keeps_latest(
            ops in prop::collection::vec((0u8..10, any::<u32>()), 0..100)
        ) {
            let fifo = Fifo::new();
            let mut latest: HashMap<String, u32> = HashMap::new();
            for (k, v) in &ops {
                fifo.update(k.to_string(), *v);
                latest.insert(k.to_string(), *v);
                prop_assert!(fifo.len() <= latest.len());
            }

            let mut drained = HashMap::new();
            while let Some(key) = fifo.keys().first().cloned() {
                let v = fifo.try_pop().unwrap();
                prop_assert!(drained.insert(key, v).is_none());
            }
            prop_assert_eq!(drained, latest);
        }
    }
}
