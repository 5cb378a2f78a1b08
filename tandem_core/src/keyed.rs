//! Keyed value store with per-key change notification.
//!
//! Each key owns a version counter and a `Notify`. Writers bump the
//! version and wake only that key's waiters; readers compare versions, not
//! payloads, to decide whether something changed.
//!
//! ```text
//! real path                 KeyedValue                  shadow path
//!    |                          |                            |
//!    |                          |<-- wait_for_change(k, 0) --|  (suspends)
//!    |-- set_value(k, v) ------>|  version 1, notify k       |
//!    |                          |-- Changed { 1, v } ------->|
//! ```

use crate::value::lock;
use std::collections::HashMap;
use std::pin::pin;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Version of a key that has never been written.
pub const UNWRITTEN: u64 = 0;

/// Point-in-time view of one key.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot<T> {
    /// Number of writes seen under the key
    pub version: u64,

    /// Current value, `None` if never written
    pub value: Option<T>,
}

/// Outcome of [`KeyedValue::wait_for_change`].
#[derive(Debug, Clone, PartialEq)]
pub enum Change<T> {
    /// The key moved past the version the caller had seen
    Changed { version: u64, value: T },

    /// The store was closed before the key changed
    Closed,
}

/// Mapping from an identity key to a value, with blocking change waits.
///
/// Supports replace semantics through [`set_value`](KeyedValue::set_value)
/// and, when `T = Vec<U>`, append semantics through
/// [`append`](KeyedValue::append). Keys are never removed.
pub struct KeyedValue<T> {
    state: Mutex<KeyedState<T>>,
}

struct KeyedState<T> {
    entries: HashMap<String, Entry<T>>,
    closed: bool,
}

struct Entry<T> {
    version: u64,
    value: Option<T>,
    notify: Arc<Notify>,
}

impl<T> Entry<T> {
    fn empty() -> Self {
        Self {
            version: UNWRITTEN,
            value: None,
            notify: Arc::new(Notify::new()),
        }
    }
}

impl<T: Clone> KeyedValue<T> {
    /// Creates an empty, open store.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(KeyedState {
                entries: HashMap::new(),
                closed: false,
            }),
        }
    }

    /// Replaces the value under `key` and wakes its waiters.
    ///
    /// Returns the new version of the key.
    pub fn set_value(&self, key: &str, value: T) -> u64 {
        self.update(key, |slot| *slot = Some(value))
    }

    /// Returns the current value under `key` without blocking.
    pub fn value(&self, key: &str) -> Option<T> {
        lock(&self.state)
            .entries
            .get(key)
            .and_then(|e| e.value.clone())
    }

    /// Returns the current value and version under `key`.
    pub fn snapshot(&self, key: &str) -> Snapshot<T> {
        let state = lock(&self.state);
        match state.entries.get(key) {
            Some(entry) => Snapshot {
                version: entry.version,
                value: entry.value.clone(),
            },
            None => Snapshot {
                version: UNWRITTEN,
                value: None,
            },
        }
    }

    /// Suspends until `key` moves past version `seen` or the store closes.
    ///
    /// Returns immediately if the key is already past `seen`. A closed
    /// store still reports a pending change before reporting `Closed`.
    pub async fn wait_for_change(&self, key: &str, seen: u64) -> Change<T> {
        loop {
            let notify = self.notifier(key);
            let mut notified = pin!(notify.notified());
            notified.as_mut().enable();

            if let Some(change) = self.check_change(key, seen) {
                return change;
            }

            tracing::trace!(key, seen, "waiting for keyed value change");
            notified.await;
        }
    }

    /// Closes the store, releasing every waiter on every key.
    ///
    /// Returns `false` if the store was already closed.
    pub fn close(&self) -> bool {
        let notifiers: Vec<Arc<Notify>> = {
            let mut state = lock(&self.state);
            if state.closed {
                return false;
            }
            state.closed = true;
            state.entries.values().map(|e| Arc::clone(&e.notify)).collect()
        };

        for notify in notifiers {
            notify.notify_waiters();
        }
        true
    }

    /// Returns true once `close()` has been called.
    pub fn is_closed(&self) -> bool {
        lock(&self.state).closed
    }

    /// Number of keys holding a published value.
    pub fn len(&self) -> usize {
        lock(&self.state)
            .entries
            .values()
            .filter(|e| e.value.is_some())
            .count()
    }

    /// Returns true if no key holds a published value.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn update(&self, key: &str, apply: impl FnOnce(&mut Option<T>)) -> u64 {
        let (version, notify) = {
            let mut state = lock(&self.state);
            let entry = state
                .entries
                .entry(key.to_owned())
                .or_insert_with(Entry::empty);
            apply(&mut entry.value);
            entry.version += 1;
            (entry.version, Arc::clone(&entry.notify))
        };
        notify.notify_waiters();
        version
    }

    fn notifier(&self, key: &str) -> Arc<Notify> {
        let mut state = lock(&self.state);
        let entry = state
            .entries
            .entry(key.to_owned())
            .or_insert_with(Entry::empty);
        Arc::clone(&entry.notify)
    }

    fn check_change(&self, key: &str, seen: u64) -> Option<Change<T>> {
        let state = lock(&self.state);
        if let Some(entry) = state.entries.get(key) {
            if entry.version != seen {
                if let Some(value) = &entry.value {
                    return Some(Change::Changed {
                        version: entry.version,
                        value: value.clone(),
                    });
                }
            }
        }
        if state.closed {
            return Some(Change::Closed);
        }
        None
    }
}

impl<U: Clone> KeyedValue<Vec<U>> {
    /// Appends an item to the ordered list under `key` and wakes its waiters.
    ///
    /// Returns the new version of the key, which equals the list length.
    pub fn append(&self, key: &str, item: U) -> u64 {
        self.update(key, |slot| slot.get_or_insert_with(Vec::new).push(item))
    }
}

impl<T: Clone> Default for KeyedValue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::time::Duration;

    #[test]
    fn test_missing_key_snapshot() {
        let store: KeyedValue<u32> = KeyedValue::new();
        assert_eq!(
            store.snapshot("a"),
            Snapshot {
                version: UNWRITTEN,
                value: None
            }
        );
        assert_eq!(store.value("a"), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_set_value_replaces_and_bumps_version() {
        let store = KeyedValue::new();
        assert_eq!(store.set_value("a", 1), 1);
        assert_eq!(store.set_value("a", 2), 2);
        store.set_value("b", 3);

        assert_eq!(store.value("a"), Some(2));
        assert_eq!(store.snapshot("a").version, 2);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_append_keeps_order() {
        let store: KeyedValue<Vec<&str>> = KeyedValue::new();
        store.append("k", "c1");
        store.append("k", "c2");
        store.append("other", "x");

        assert_eq!(store.value("k"), Some(vec!["c1", "c2"]));
        assert_eq!(store.snapshot("k").version, 2);
    }

    #[tokio::test]
    async fn test_wait_returns_immediately_when_ahead() {
        let store = KeyedValue::new();
        store.set_value("k", "v");

        let change = store.wait_for_change("k", UNWRITTEN).await;
        assert_eq!(
            change,
            Change::Changed {
                version: 1,
                value: "v"
            }
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_wait_suspends_until_write() {
        let store = Arc::new(KeyedValue::new());

        let waiter = tokio::spawn({
            let store = Arc::clone(&store);
            async move { store.wait_for_change("k", UNWRITTEN).await }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        // A write to another key must not release the waiter
        store.set_value("other", 1);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        store.set_value("k", 9);
        assert_eq!(
            waiter.await.unwrap(),
            Change::Changed {
                version: 1,
                value: 9
            }
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_close_releases_all_waiters() {
        let store: Arc<KeyedValue<u32>> = Arc::new(KeyedValue::new());

        let waiters: Vec<_> = ["a", "b", "c"]
            .into_iter()
            .map(|key| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.wait_for_change(key, UNWRITTEN).await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(store.close());
        assert!(!store.close());

        for waiter in waiters {
            let change = tokio::time::timeout(Duration::from_secs(5), waiter)
                .await
                .expect("close should release waiter")
                .unwrap();
            assert_eq!(change, Change::Closed);
        }
    }

    #[tokio::test]
    async fn test_closed_store_still_serves_published_values() {
        let store = KeyedValue::new();
        store.set_value("k", 5);
        store.close();

        assert_eq!(store.value("k"), Some(5));
        assert_eq!(
            store.wait_for_change("k", UNWRITTEN).await,
            Change::Changed {
                version: 1,
                value: 5
            }
        );
        assert_eq!(store.wait_for_change("k", 1).await, Change::Closed);
        assert_eq!(store.wait_for_change("missing", UNWRITTEN).await, Change::Closed);
    }

    proptest! {
        #[test]
        fn prop_append_snapshots_are_prefixes(items in proptest::collection::vec(any::<u16>(), 1..64)) {
            let store: KeyedValue<Vec<u16>> = KeyedValue::new();
            let mut seen = Vec::new();

            for item in &items {
                store.append("k", *item);
                seen.push(store.snapshot("k"));
            }

            for (i, snap) in seen.iter().enumerate() {
                prop_assert_eq!(snap.version, (i + 1) as u64);
                prop_assert_eq!(snap.value.as_deref(), Some(&items[..=i]));
            }
        }
    }
}
