//! Subscriber registry with stable handles.
//!
//! Callbacks are delivered synchronously in registration order. A panicking callback is
//! caught, logged and recorded as a failure report; the remaining callbacks still run.
//! Removal is by [`SubscriberId`], so registering the same closure twice yields two
//! independent subscriptions.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, Weak};

use tracing::error;

use crate::error::ProctorError;

/// Stable identifier of one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(pub u64);

pub type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Entry<E> {
    id: SubscriberId,
    callback: Callback<E>,
}

struct RegistryState<E> {
    next_id: u64,
    entries: Vec<Entry<E>>,
    failures: Vec<ProctorError>,
}

/// Ordered set of callbacks for events of type `E`.
pub struct SubscriberRegistry<E> {
    name: &'static str,
    state: Arc<Mutex<RegistryState<E>>>,
}

impl<E: 'static> SubscriberRegistry<E> {
    /// `name` appears in failure logs (e.g. "monitor", "escalation").
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Arc::new(Mutex::new(RegistryState {
                next_id: 1,
                entries: Vec::new(),
                failures: Vec::new(),
            })),
        }
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let mut state = lock(&self.state);
        let id = SubscriberId(state.next_id);
        state.next_id += 1;
        state.entries.push(Entry {
            id,
            callback: Arc::new(callback),
        });

        let weak: Weak<Mutex<RegistryState<E>>> = Arc::downgrade(&self.state);
        Subscription {
            id,
            remover: Some(Box::new(move |id| {
                if let Some(state) = weak.upgrade() {
                    lock(&state).entries.retain(|e| e.id != id);
                }
            })),
        }
    }

    /// Returns `true` if a registration was removed. Unknown ids are a no-op.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut state = lock(&self.state);
        let before = state.entries.len();
        state.entries.retain(|e| e.id != id);
        state.entries.len() != before
    }

    pub fn len(&self) -> usize {
        lock(&self.state).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke every callback with `event`. Returns the number that completed normally.
    ///
    /// The registry lock is not held while callbacks run, so a callback may subscribe,
    /// unsubscribe or query its owner.
    pub fn notify(&self, event: &E) -> usize {
        let snapshot: Vec<(SubscriberId, Callback<E>)> = lock(&self.state)
            .entries
            .iter()
            .map(|e| (e.id, Arc::clone(&e.callback)))
            .collect();

        let mut delivered = 0;
        for (id, callback) in snapshot {
            match panic::catch_unwind(AssertUnwindSafe(|| callback(event))) {
                Ok(()) => delivered += 1,
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    error!(
                        registry = self.name,
                        subscriber = id.0,
                        "[SUBSCRIBERS] Callback failed: {}",
                        message
                    );
                    lock(&self.state).failures.push(ProctorError::CallbackFailure {
                        subscriber: id.0,
                        message,
                    });
                }
            }
        }
        delivered
    }

    /// Drain the failure reports collected since the last call.
    pub fn take_failures(&self) -> Vec<ProctorError> {
        std::mem::take(&mut lock(&self.state).failures)
    }
}

/// Handle returned by [`SubscriberRegistry::subscribe`].
///
/// Dropping the handle does not unsubscribe; call [`Subscription::unsubscribe`].
pub struct Subscription {
    id: SubscriberId,
    remover: Option<Box<dyn FnOnce(SubscriberId) + Send + Sync>>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Remove exactly this registration. Calling it again is a no-op.
    pub fn unsubscribe(&mut self) {
        if let Some(remove) = self.remover.take() {
            remove(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.remover.is_some())
            .finish()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

// A poisoned registry only means a callback panicked mid-update elsewhere; the entry
// list itself is still well-formed.
fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_delivery_in_registration_order() {
        let registry: SubscriberRegistry<u32> = SubscriberRegistry::new("test");
        let seen = Arc::new(Mutex::new(Vec::new()));
        for tag in ["a", "b", "c"] {
            let seen = Arc::clone(&seen);
            registry.subscribe(move |v: &u32| seen.lock().unwrap().push(format!("{tag}{v}")));
        }
        assert_eq!(registry.notify(&7), 3);
        assert_eq!(*seen.lock().unwrap(), vec!["a7", "b7", "c7"]);
    }

    #[test]
    fn test_unsubscribe_removes_only_that_handle() {
        let registry: SubscriberRegistry<u32> = SubscriberRegistry::new("test");
        let hits = Arc::new(AtomicUsize::new(0));
        let h1 = Arc::clone(&hits);
        let h2 = Arc::clone(&hits);
        let mut first = registry.subscribe(move |_| {
            h1.fetch_add(1, Ordering::SeqCst);
        });
        let _second = registry.subscribe(move |_| {
            h2.fetch_add(10, Ordering::SeqCst);
        });

        first.unsubscribe();
        first.unsubscribe();
        registry.notify(&1);
        assert_eq!(hits.load(Ordering::SeqCst), 10);
        assert_eq!(registry.len(), 1);
        assert!(!registry.unsubscribe(first.id()));
    }

    #[test]
    fn test_panicking_callback_is_isolated() {
        let registry: SubscriberRegistry<u32> = SubscriberRegistry::new("test");
        let hits = Arc::new(AtomicUsize::new(0));
        registry.subscribe(|_| panic!("boom"));
        let h = Arc::clone(&hits);
        registry.subscribe(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(registry.notify(&1), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        let failures = registry.take_failures();
        assert_eq!(failures.len(), 1);
        assert!(matches!(
            &failures[0],
            ProctorError::CallbackFailure { subscriber: 1, message } if message == "boom"
        ));
        assert!(registry.take_failures().is_empty());
    }

    #[test]
    fn test_same_closure_registered_twice_is_two_subscriptions() {
        let registry: SubscriberRegistry<u32> = SubscriberRegistry::new("test");
        let hits = Arc::new(AtomicUsize::new(0));
        let make = |hits: Arc<AtomicUsize>| {
            move |_: &u32| {
                hits.fetch_add(1, Ordering::SeqCst);
            }
        };
        let mut a = registry.subscribe(make(Arc::clone(&hits)));
        let _b = registry.subscribe(make(Arc::clone(&hits)));
        a.unsubscribe();
        registry.notify(&0);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
