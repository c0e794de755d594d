//! Listener registry with disposer handles.
//!
//! [`Listeners`] fans a value out to every registered callback.
//! [`Listeners::subscribe`] returns a [`Subscription`]; dropping it or calling
//! [`Subscription::unsubscribe`] removes the callback. Unsubscribing twice is
//! a no-op, and a callback that has been disposed is never invoked again, even
//! when disposal happens while a notification is in progress.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

type Callback<T> = dyn Fn(&T) + Send + Sync;

struct Entry<T> {
    id: u64,
    active: AtomicBool,
    callback: Box<Callback<T>>,
}

struct Registry<T> {
    next_id: u64,
    entries: Vec<Arc<Entry<T>>>,
}

impl<T> Registry<T> {
    fn remove(&mut self, id: u64) {
        self.entries.retain(|entry| {
            if entry.id == id {
                entry.active.store(false, Ordering::Release);
                false
            } else {
                true
            }
        });
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // Callbacks run outside the lock, so a poisoned registry is still consistent.
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A set of callbacks notified with `&T`.
pub struct Listeners<T> {
    registry: Arc<Mutex<Registry<T>>>,
}

impl<T: 'static> Listeners<T> {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    /// Register `callback`. It stays registered until the returned
    /// [`Subscription`] is disposed or the registry is cleared.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let id = {
            let mut registry = lock(&self.registry);
            let id = registry.next_id;
            registry.next_id += 1;
            registry.entries.push(Arc::new(Entry {
                id,
                active: AtomicBool::new(true),
                callback: Box::new(callback),
            }));
            id
        };

        let weak: Weak<Mutex<Registry<T>>> = Arc::downgrade(&self.registry);
        Subscription {
            dispose: Some(Box::new(move || {
                if let Some(registry) = weak.upgrade() {
                    lock(&registry).remove(id);
                }
            })),
        }
    }

    /// Invoke every active callback with `value`, in registration order.
    ///
    /// Callbacks are called without holding the registry lock, so they may
    /// subscribe or unsubscribe freely.
    pub fn notify(&self, value: &T) {
        let snapshot: Vec<Arc<Entry<T>>> = lock(&self.registry).entries.clone();
        for entry in snapshot {
            if entry.active.load(Ordering::Acquire) {
                (entry.callback)(value);
            }
        }
    }

    /// Drop every callback. Outstanding [`Subscription`]s become inert.
    pub fn clear(&self) {
        let mut registry = lock(&self.registry);
        for entry in registry.entries.drain(..) {
            entry.active.store(false, Ordering::Release);
        }
    }

    /// Number of registered callbacks.
    pub fn len(&self) -> usize {
        lock(&self.registry).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: 'static> Default for Listeners<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Listeners<T> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<T> fmt::Debug for Listeners<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("len", &lock(&self.registry).entries.len())
            .finish()
    }
}

/// Disposer handle returned by [`Listeners::subscribe`].
pub struct Subscription {
    dispose: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Remove the callback. Calling this more than once has no effect.
    pub fn unsubscribe(&mut self) {
        if let Some(dispose) = self.dispose.take() {
            dispose();
        }
    }

    /// Whether [`unsubscribe`](Self::unsubscribe) has already run.
    pub fn is_disposed(&self) -> bool {
        self.dispose.is_none()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, impl Fn(&u32) + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&count);
        (count, move |_: &u32| {
            inner.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn notify_reaches_every_subscriber() {
        let listeners = Listeners::<u32>::new();
        let (a, cb_a) = counter();
        let (b, cb_b) = counter();
        let _sa = listeners.subscribe(cb_a);
        let _sb = listeners.subscribe(cb_b);

        listeners.notify(&1);
        listeners.notify(&2);

        assert_eq!(a.load(Ordering::SeqCst), 2);
        assert_eq!(b.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let listeners = Listeners::<u32>::new();
        let (count, cb) = counter();
        let mut sub = listeners.subscribe(cb);

        sub.unsubscribe();
        sub.unsubscribe();
        assert!(sub.is_disposed());
        assert!(listeners.is_empty());

        listeners.notify(&7);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let listeners = Listeners::<u32>::new();
        let (count, cb) = counter();
        drop(listeners.subscribe(cb));

        listeners.notify(&1);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn no_dispatch_after_dispose_during_notify() {
        let listeners = Listeners::<u32>::new();
        let (late, late_cb) = counter();

        // The first callback disposes the second one mid-notification.
        let victim: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let victim_slot = Arc::clone(&victim);
        let _first = listeners.subscribe(move |_| {
            if let Some(mut sub) = victim_slot.lock().unwrap().take() {
                sub.unsubscribe();
            }
        });
        *victim.lock().unwrap() = Some(listeners.subscribe(late_cb));

        listeners.notify(&1);
        assert_eq!(late.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn clear_makes_outstanding_subscriptions_inert() {
        let listeners = Listeners::<u32>::new();
        let (count, cb) = counter();
        let mut sub = listeners.subscribe(cb);

        listeners.clear();
        listeners.notify(&1);
        sub.unsubscribe();

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(listeners.is_empty());
    }

    #[test]
    fn subscription_outliving_registry_is_harmless() {
        let listeners = Listeners::<u32>::new();
        let (_count, cb) = counter();
        let mut sub = listeners.subscribe(cb);
        drop(listeners);
        sub.unsubscribe();
        assert!(sub.is_disposed());
    }
}
