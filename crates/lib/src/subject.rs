//! Minimal publish/subscribe primitive.
//!
//! A [`Subject`] keeps an ordered list of observers and delivers every
//! published value to them in subscription order. Observers may unsubscribe
//! at any time, including from inside their own callback: removal is
//! immediate, so an observer removed mid-delivery is skipped for the rest of
//! that delivery while the remaining observers are still notified.

use std::sync::{
    Arc, Mutex, MutexGuard, Weak,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

/// Callback type for published values.
pub type Observer<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Unique handle for one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

trait Detach: Send + Sync {
    fn detach(&self, id: SubscriptionId);
}

/// An observer with the flag cleared when it is removed.
type Entry<T> = (SubscriptionId, Arc<AtomicBool>, Observer<T>);

struct SubjectInner<T> {
    observers: Mutex<Vec<Entry<T>>>,
    next_id: AtomicU64,
}

impl<T> SubjectInner<T> {
    fn observers(&self) -> MutexGuard<'_, Vec<Entry<T>>> {
        self.observers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<T: 'static> Detach for SubjectInner<T> {
    fn detach(&self, id: SubscriptionId) {
        self.observers().retain(|(existing, active, _)| {
            if *existing == id {
                active.store(false, Ordering::Release);
            }
            *existing != id
        });
    }
}

/// An ordered observer list with `next`/`subscribe`/`unsubscribe`.
///
/// `Subject` is a cheap-to-clone handle; clones publish to the same observers.
pub struct Subject<T> {
    inner: Arc<SubjectInner<T>>,
}

impl<T> Clone for Subject<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for Subject<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subject")
            .field("observers", &self.inner.observers().len())
            .finish()
    }
}

impl<T: 'static> Default for Subject<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Subject<T> {
    /// Creates a subject with no observers.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SubjectInner {
                observers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Delivers `value` to every current observer in subscription order.
    pub fn next(&self, value: &T) {
        // Iterate a snapshot so observers can (un)subscribe while we deliver.
        let snapshot: Vec<_> = self.inner.observers().clone();
        for (_, active, observer) in snapshot {
            if active.load(Ordering::Acquire) {
                observer(value);
            }
        }
    }

    /// Registers an observer and returns the handle that removes it.
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner
            .observers()
            .push((id, Arc::new(AtomicBool::new(true)), Arc::new(observer)));
        let subject: Weak<dyn Detach> = Arc::downgrade(&self.inner) as Weak<dyn Detach>;
        Subscription { id, subject }
    }

    /// Removes every observer.
    pub fn unsubscribe_all(&self) {
        for (_, active, _) in self.inner.observers().drain(..) {
            active.store(false, Ordering::Release);
        }
    }

    /// Returns the number of current observers.
    pub fn observer_count(&self) -> usize {
        self.inner.observers().len()
    }
}

/// Handle returned by [`Subject::subscribe`].
///
/// Dropping the handle does not unsubscribe; call [`Subscription::unsubscribe`].
#[derive(Clone)]
pub struct Subscription {
    id: SubscriptionId,
    subject: Weak<dyn Detach>,
}

impl Subscription {
    /// Returns the subscription's identifier.
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Removes the observer. Calling this more than once is harmless.
    pub fn unsubscribe(&self) {
        if let Some(subject) = self.subject.upgrade() {
            subject.detach(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
