//! A small publish-subscribe primitive with scoped registration.
//!
//! The system this layer was distilled from uses ad-hoc observer lists with
//! a manual "detach before every return path" discipline. Per the design
//! note in spec.md §9, this is re-architected as RAII: `register` returns a
//! [`Subscription`] guard whose `Drop` impl detaches the callback, so a
//! waiter can never leak a registration on an early return or a cancelled
//! future.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::Weak;

type Callback<T> = Box<dyn Fn(&T) + Send + Sync>;

struct Slot<T> {
    id: u64,
    callback: Callback<T>,
}

/// An ordered list of subscribers to events of type `T`.
///
/// Cloning a `Subscribers<T>` clones the handle, not the list: all clones
/// share the same underlying registrations, the same way the Raft instance
/// shares one update-observer list across every component that attaches to
/// it.
pub struct Subscribers<T> {
    inner: Arc<Mutex<Inner<T>>>,
}

struct Inner<T> {
    next_id: u64,
    slots: Vec<Slot<T>>,
}

impl<T> Clone for Subscribers<T> {
    fn clone(&self) -> Self {
        Subscribers {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Default for Subscribers<T> {
    fn default() -> Self {
        Subscribers {
            inner: Arc::new(Mutex::new(Inner {
                next_id: 0,
                slots: Vec::new(),
            })),
        }
    }
}

impl<T> Subscribers<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` and returns a guard that detaches it on drop.
    pub fn register<F>(&self, callback: F) -> Subscription<T>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let mut inner = self.inner.lock().expect("subscribers lock poisoned");
        let id = inner.next_id;
        inner.next_id += 1;
        inner.slots.push(Slot {
            id,
            callback: Box::new(callback),
        });
        Subscription {
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Fires every registered callback, in registration order.
    pub fn notify(&self, event: &T) {
        let callbacks: Vec<_> = {
            let inner = self.inner.lock().expect("subscribers lock poisoned");
            inner.slots.iter().map(|s| s.id).collect()
        };
        for id in callbacks {
            let inner = self.inner.lock().expect("subscribers lock poisoned");
            if let Some(slot) = inner.slots.iter().find(|s| s.id == id) {
                (slot.callback)(event);
            }
        }
    }

    /// Returns true if no subscribers are currently registered.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().expect("subscribers lock poisoned").slots.is_empty()
    }

    /// Removes every registered subscriber, e.g. when an election mode that
    /// forbids quorum observers takes effect (spec.md §4.5, `off`/`voter`).
    pub fn clear(&self) {
        self.inner.lock().expect("subscribers lock poisoned").slots.clear();
    }
}

/// A scoped registration. Detaches its callback from the originating
/// [`Subscribers<T>`] when dropped.
pub struct Subscription<T> {
    id: u64,
    inner: Weak<Mutex<Inner<T>>>,
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            let mut inner = inner.lock().expect("subscribers lock poisoned");
            inner.slots.retain(|s| s.id != self.id);
        }
    }
}
