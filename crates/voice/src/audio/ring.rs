use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::Notify;

/// A bounded, single-consumer audio ring shared between a producer task
/// (telephony reader or model-event handler) and a dedicated worker.
/// Overflow policy is the caller's choice per direction (spec §4.1: the
/// input path drops the oldest frame, the output path drops the newest).
pub struct BoundedRing<T> {
    inner: Mutex<VecDeque<T>>,
    notify: Notify,
    capacity: usize,
}

impl<T> BoundedRing<T> {
    pub fn new(capacity: usize) -> Self {
        Self { inner: Mutex::new(VecDeque::with_capacity(capacity.min(64))), notify: Notify::new(), capacity }
    }

    /// Push, evicting the oldest item first if full. Returns `true` when
    /// an item was dropped to make room.
    pub fn push_drop_oldest(&self, item: T) -> bool {
        let mut guard = self.inner.lock().expect("ring mutex poisoned");
        let dropped = if guard.len() >= self.capacity {
            guard.pop_front();
            true
        } else {
            false
        };
        guard.push_back(item);
        drop(guard);
        self.notify.notify_one();
        dropped
    }

    /// Push, rejecting the incoming item if full. Returns `true` when the
    /// item was dropped instead of enqueued.
    pub fn push_drop_newest(&self, item: T) -> bool {
        let mut guard = self.inner.lock().expect("ring mutex poisoned");
        if guard.len() >= self.capacity {
            return true;
        }
        guard.push_back(item);
        drop(guard);
        self.notify.notify_one();
        false
    }

    pub fn try_pop(&self) -> Option<T> {
        self.inner.lock().expect("ring mutex poisoned").pop_front()
    }

    pub async fn pop(&self) -> T {
        loop {
            if let Some(item) = self.try_pop() {
                return item;
            }
            self.notify.notified().await;
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("ring mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_oldest_evicts_front() {
        let ring = BoundedRing::new(2);
        assert!(!ring.push_drop_oldest(1));
        assert!(!ring.push_drop_oldest(2));
        assert!(ring.push_drop_oldest(3));
        assert_eq!(ring.try_pop(), Some(2));
        assert_eq!(ring.try_pop(), Some(3));
    }

    #[test]
    fn drop_newest_rejects_incoming() {
        let ring = BoundedRing::new(2);
        assert!(!ring.push_drop_newest(1));
        assert!(!ring.push_drop_newest(2));
        assert!(ring.push_drop_newest(3));
        assert_eq!(ring.try_pop(), Some(1));
        assert_eq!(ring.try_pop(), Some(2));
        assert_eq!(ring.try_pop(), None);
    }

    #[tokio::test]
    async fn pop_waits_for_push() {
        let ring = std::sync::Arc::new(BoundedRing::new(4));
        let ring2 = ring.clone();
        let handle = tokio::spawn(async move { ring2.pop().await });
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        ring.push_drop_newest(42);
        assert_eq!(handle.await.unwrap(), 42);
    }
}
