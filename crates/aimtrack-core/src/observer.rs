//! Observer/publisher primitives shared by the reactive stores.
//!
//! A [`Publisher`] keeps a list of observers and hands each published value
//! to all of them. Subscribing returns a [`Subscription`] guard; dropping the
//! guard removes the observer.
//!
//! Values are delivered through an outbox. A store queues a snapshot with
//! [`Publisher::push`] while it still holds the lock that produced it, and
//! calls [`Publisher::flush`] after releasing that lock. Only one caller
//! drains the outbox at a time, so observers see snapshots in the order the
//! store changed, even when the store is mutated from several threads.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Receives values from a [`Publisher`].
pub trait Observer<T>: Send + Sync {
    fn notify(&self, value: &T);
}

impl<T, F> Observer<T> for F
where
    F: Fn(&T) + Send + Sync,
{
    fn notify(&self, value: &T) {
        self(value)
    }
}

type ObserverList<T> = Vec<(u64, Arc<dyn Observer<T>>)>;

enum Delivery<T> {
    /// A value for every registered observer.
    Broadcast(T),
    /// The initial value of a new observer, which is registered when this is delivered.
    Welcome {
        id: u64,
        observer: Arc<dyn Observer<T>>,
        value: T,
    },
}

struct Registry<T> {
    next_id: u64,
    observers: ObserverList<T>,
    outbox: VecDeque<Delivery<T>>,
    delivering: bool,
}

impl<T> Registry<T> {
    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn pending_welcomes(&self) -> usize {
        self.outbox
            .iter()
            .filter(|delivery| matches!(delivery, Delivery::Welcome { .. }))
            .count()
    }
}

/// Cloneable fan-out point for values of type `T`.
///
/// Clones share the same observer list and outbox.
pub struct Publisher<T> {
    registry: Arc<Mutex<Registry<T>>>,
}

impl<T> Clone for Publisher<T> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
        }
    }
}

impl<T> Default for Publisher<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Clears the `delivering` flag if an observer panics mid-delivery.
struct DeliveryGuard<'a, T> {
    registry: &'a Mutex<Registry<T>>,
    armed: bool,
}

impl<T> Drop for DeliveryGuard<'_, T> {
    fn drop(&mut self) {
        if self.armed {
            Publisher::<T>::lock(self.registry).delivering = false;
        }
    }
}

enum Step<T> {
    Broadcast(Vec<Arc<dyn Observer<T>>>, T),
    Welcome(Arc<dyn Observer<T>>, T),
}

impl<T> Publisher<T> {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                observers: Vec::new(),
                outbox: VecDeque::new(),
                delivering: false,
            })),
        }
    }

    fn lock(registry: &Mutex<Registry<T>>) -> MutexGuard<'_, Registry<T>> {
        registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of observers, counting those whose initial value is still queued.
    pub fn subscriber_count(&self) -> usize {
        let registry = Self::lock(&self.registry);
        registry.observers.len() + registry.pending_welcomes()
    }

    /// Queues `value` for every observer without delivering it.
    pub fn push(&self, value: T) {
        Self::lock(&self.registry)
            .outbox
            .push_back(Delivery::Broadcast(value));
    }

    /// Delivers everything queued so far, in queue order.
    ///
    /// Observers run outside the registry lock, so they may subscribe,
    /// unsubscribe, or publish again from inside `notify`. If another caller
    /// is already delivering, this returns at once and that caller delivers
    /// the remaining values.
    pub fn flush(&self) {
        {
            let mut registry = Self::lock(&self.registry);
            if registry.delivering || registry.outbox.is_empty() {
                return;
            }
            registry.delivering = true;
        }
        let mut guard = DeliveryGuard {
            registry: &self.registry,
            armed: true,
        };

        loop {
            let step = {
                let mut registry = Self::lock(&self.registry);
                match registry.outbox.pop_front() {
                    None => {
                        // Cleared under the same lock that saw the outbox empty.
                        registry.delivering = false;
                        guard.armed = false;
                        return;
                    }
                    Some(Delivery::Broadcast(value)) => {
                        let observers = registry
                            .observers
                            .iter()
                            .map(|(_, observer)| observer.clone())
                            .collect();
                        Step::Broadcast(observers, value)
                    }
                    Some(Delivery::Welcome {
                        id,
                        observer,
                        value,
                    }) => {
                        registry.observers.push((id, observer.clone()));
                        Step::Welcome(observer, value)
                    }
                }
            };

            match step {
                Step::Broadcast(observers, value) => {
                    for observer in observers {
                        observer.notify(&value);
                    }
                }
                Step::Welcome(observer, value) => observer.notify(&value),
            }
        }
    }

    /// Queues `value` and delivers it.
    pub fn publish(&self, value: T) {
        self.push(value);
        self.flush();
    }
}

impl<T: Send + 'static> Publisher<T> {
    /// Registers an observer. It stays registered until the returned guard is dropped.
    pub fn subscribe(&self, observer: Arc<dyn Observer<T>>) -> Subscription {
        let id = {
            let mut registry = Self::lock(&self.registry);
            let id = registry.allocate_id();
            registry.observers.push((id, observer));
            id
        };
        self.subscription(id)
    }

    /// Queues `initial` for `observer` alone and registers the observer right
    /// after it is delivered.
    ///
    /// Values pushed before this call never reach the observer; values pushed
    /// after it do. Call [`Publisher::flush`] once the caller's own lock is released.
    pub fn subscribe_with(&self, observer: Arc<dyn Observer<T>>, initial: T) -> Subscription {
        let id = {
            let mut registry = Self::lock(&self.registry);
            let id = registry.allocate_id();
            registry.outbox.push_back(Delivery::Welcome {
                id,
                observer,
                value: initial,
            });
            id
        };
        self.subscription(id)
    }

    fn subscription(&self, id: u64) -> Subscription {
        let weak: Weak<Mutex<Registry<T>>> = Arc::downgrade(&self.registry);
        Subscription::new(move || {
            let Some(registry) = weak.upgrade() else {
                return;
            };
            // Removed observers are dropped after the lock is released.
            let (_removed, _unsent) = {
                let mut registry = Self::lock(&registry);
                let (removed, kept): (ObserverList<T>, ObserverList<T>) =
                    std::mem::take(&mut registry.observers)
                        .into_iter()
                        .partition(|(observer_id, _)| *observer_id == id);
                registry.observers = kept;

                let (unsent, outbox): (VecDeque<Delivery<T>>, VecDeque<Delivery<T>>) =
                    std::mem::take(&mut registry.outbox)
                        .into_iter()
                        .partition(|delivery| {
                            matches!(delivery, Delivery::Welcome { id: welcome_id, .. } if *welcome_id == id)
                        });
                registry.outbox = outbox;
                (removed, unsent)
            };
        })
    }
}

/// RAII handle for a registered observer.
///
/// Dropping the handle, or calling [`Subscription::unsubscribe`], runs the
/// teardown exactly once.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    teardown: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn new(teardown: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            teardown: Some(Box::new(teardown)),
        }
    }

    /// Wraps this subscription so `after` runs once the inner teardown finished.
    pub fn then(mut self, after: impl FnOnce() + Send + Sync + 'static) -> Self {
        let inner = self.teardown.take();
        Subscription::new(move || {
            if let Some(inner) = inner {
                inner();
            }
            after();
        })
    }

    /// Stops delivery now.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.teardown.is_some())
            .finish()
    }
}
