//! Single-slot value cell shared between the real and shadow sides.

use std::pin::pin;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

/// Locks a mutex, recovering the guard if a previous holder panicked.
///
/// The stores only hold plain data under their locks, so a poisoned lock
/// still guards a consistent value and the shadow side must keep going.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Publish-once-or-overwrite storage for a call made at most once per
/// provider instance.
///
/// `value()` never blocks; a read before any write returns `None`.
/// `close()` releases the cell: a published value stays readable, but
/// [`wait`](Value::wait) on an empty cell returns `None` immediately
/// instead of suspending forever.
pub struct Value<T> {
    slot: Mutex<Slot<T>>,
    notify: Notify,
}

struct Slot<T> {
    value: Option<T>,
    closed: bool,
}

impl<T: Clone> Value<T> {
    /// Creates an empty, open cell.
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                value: None,
                closed: false,
            }),
            notify: Notify::new(),
        }
    }

    /// Stores a value, replacing any previous one, and wakes waiters.
    pub fn set_value(&self, value: T) {
        lock(&self.slot).value = Some(value);
        self.notify.notify_waiters();
    }

    /// Returns the current value, or `None` if nothing was published.
    pub fn value(&self) -> Option<T> {
        lock(&self.slot).value.clone()
    }

    /// Suspends until a value is published or the cell is closed.
    pub async fn wait(&self) -> Option<T> {
        loop {
            let mut notified = pin!(self.notify.notified());
            notified.as_mut().enable();
            {
                let slot = lock(&self.slot);
                if slot.value.is_some() || slot.closed {
                    return slot.value.clone();
                }
            }
            notified.await;
        }
    }

    /// Closes the cell and releases every waiter.
    ///
    /// Returns `false` if the cell was already closed.
    pub fn close(&self) -> bool {
        {
            let mut slot = lock(&self.slot);
            if slot.closed {
                return false;
            }
            slot.closed = true;
        }
        self.notify.notify_waiters();
        true
    }

    /// Returns true once `close()` has been called.
    pub fn is_closed(&self) -> bool {
        lock(&self.slot).closed
    }
}

impl<T: Clone> Default for Value<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_read_before_write_is_empty() {
        let cell: Value<u32> = Value::new();
        assert_eq!(cell.value(), None);
    }

    #[test]
    fn test_set_overwrites() {
        let cell = Value::new();
        cell.set_value("first");
        cell.set_value("second");
        assert_eq!(cell.value(), Some("second"));
    }

    #[test]
    fn test_close_keeps_published_value() {
        let cell = Value::new();
        cell.set_value(7);

        assert!(cell.close());
        assert!(!cell.close());
        assert!(cell.is_closed());
        assert_eq!(cell.value(), Some(7));
    }

    #[tokio::test]
    async fn test_wait_on_closed_empty_cell_returns_none() {
        let cell: Value<u32> = Value::new();
        cell.close();
        assert_eq!(cell.wait().await, None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_wait_wakes_on_set() {
        let cell = Arc::new(Value::new());

        let waiter = tokio::spawn({
            let cell = Arc::clone(&cell);
            async move { cell.wait().await }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        cell.set_value(42u64);
        assert_eq!(waiter.await.unwrap(), Some(42));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_close_releases_waiter() {
        let cell: Arc<Value<String>> = Arc::new(Value::new());

        let waiter = tokio::spawn({
            let cell = Arc::clone(&cell);
            async move { cell.wait().await }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        cell.close();

        let released = tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .expect("waiter should be released by close")
            .unwrap();
        assert_eq!(released, None);
    }
}
