use crate::config::StoreConfig;
use std::any::Any;
use std::fmt::Debug;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Receives change notifications from an `AnyStore`.
///
/// Observers are global to a store: every mutation notifies every attached
/// observer, whichever key changed. Closures of the form `Fn(&K)` are
/// observers too.
///
/// # Examples
///
/// ```
/// use sovran_anystore::{AnyStore, StoreObserver, StoreError};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// struct ChangeCounter(AtomicUsize);
///
/// impl StoreObserver<String> for ChangeCounter {
///     fn on_value_changed(&self, _key: &String) {
///         self.0.fetch_add(1, Ordering::SeqCst);
///     }
/// }
///
/// let store = AnyStore::<String>::new();
/// let counter = Arc::new(ChangeCounter(AtomicUsize::new(0)));
/// store.attach_sync(counter.clone());
///
/// store.insert_or_assign("a".to_string(), 1)?;
/// store.insert_or_assign("a".to_string(), 1)?;
/// assert_eq!(counter.0.load(Ordering::SeqCst), 2);
///
/// store.detach(&counter)?;
/// # Ok::<(), StoreError>(())
/// ```
pub trait StoreObserver<K>: Send + Sync {
    /// Called once per mutation of the store
    fn on_value_changed(&self, key: &K);
}

impl<K, F> StoreObserver<K> for F
where
    F: Fn(&K) + Send + Sync,
{
    fn on_value_changed(&self, key: &K) {
        self(key)
    }
}

/// Identity of an observer: the address of its shared allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ObserverId(usize);

impl ObserverId {
    pub(crate) fn of<O: ?Sized>(observer: &Arc<O>) -> Self {
        Self(Arc::as_ptr(observer) as *const () as usize)
    }
}

struct SyncRegistration<K> {
    id: ObserverId,
    observer: Arc<dyn StoreObserver<K>>,
}

/// One spawned delivery. `returned` flips once the callback is over, which
/// can be a little before the thread itself exits.
struct PendingDelivery {
    handle: JoinHandle<()>,
    returned: Arc<AtomicBool>,
}

impl PendingDelivery {
    fn callback_running(&self) -> bool {
        !self.returned.load(Ordering::Acquire)
    }
}

struct AsyncRegistration<K> {
    id: ObserverId,
    observer: Arc<dyn StoreObserver<K>>,
    pending: Vec<PendingDelivery>,
}

impl<K> AsyncRegistration<K> {
    fn prune(&mut self) {
        let before = self.pending.len();
        self.pending.retain(|delivery| !delivery.handle.is_finished());
        let pruned = before - self.pending.len();
        if pruned > 0 {
            tracing::trace!(pruned, remaining = self.pending.len(), "pruned finished deliveries");
        }
    }

    fn into_handles(self) -> impl Iterator<Item = JoinHandle<()>> {
        self.pending.into_iter().map(|delivery| delivery.handle)
    }
}

/// Observer registry and fan-out.
///
/// Lives behind the owning store's lock; every method assumes the caller
/// holds it.
pub(crate) struct NotificationCenter<K> {
    config: StoreConfig,
    sync_observers: Vec<SyncRegistration<K>>,
    async_observers: Vec<AsyncRegistration<K>>,
}

impl<K> NotificationCenter<K>
where
    K: Clone + Debug + Send + 'static,
{
    pub(crate) fn new(config: StoreConfig) -> Self {
        Self {
            config,
            sync_observers: Vec::new(),
            async_observers: Vec::new(),
        }
    }

    pub(crate) fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Returns `false` if the observer was already attached for sync delivery
    pub(crate) fn attach_sync(&mut self, observer: Arc<dyn StoreObserver<K>>) -> bool {
        let id = ObserverId::of(&observer);
        if self.is_sync_attached(id) {
            tracing::debug!(observer = ?id, "observer already attached for sync delivery");
            return false;
        }
        self.sync_observers.push(SyncRegistration { id, observer });
        tracing::debug!(observer = ?id, "attached sync observer");
        true
    }

    /// Returns `false` if the observer was already attached for async delivery
    pub(crate) fn attach_async(&mut self, observer: Arc<dyn StoreObserver<K>>) -> bool {
        let id = ObserverId::of(&observer);
        if self.async_observers.iter().any(|reg| reg.id == id) {
            tracing::debug!(observer = ?id, "observer already attached for async delivery");
            return false;
        }
        self.async_observers.push(AsyncRegistration {
            id,
            observer,
            pending: Vec::new(),
        });
        tracing::debug!(observer = ?id, "attached async observer");
        true
    }

    pub(crate) fn is_sync_attached(&self, id: ObserverId) -> bool {
        self.sync_observers.iter().any(|reg| reg.id == id)
    }

    /// Whether any delivery for `id`, other than one running on the calling
    /// thread, is still inside its callback. A thread that has returned from
    /// the callback but not yet exited does not count.
    pub(crate) fn has_running_deliveries(&self, id: ObserverId) -> bool {
        let current = thread::current().id();
        self.async_observers
            .iter()
            .filter(|reg| reg.id == id)
            .flat_map(|reg| reg.pending.iter())
            .any(|delivery| {
                delivery.callback_running() && delivery.handle.thread().id() != current
            })
    }

    /// Drops both registrations of `id` and hands back the deliveries the
    /// caller must join once the lock is released.
    pub(crate) fn detach(&mut self, id: ObserverId) -> Vec<JoinHandle<()>> {
        let before = self.sync_observers.len();
        self.sync_observers.retain(|reg| reg.id != id);
        if self.sync_observers.len() != before {
            tracing::debug!(observer = ?id, "detached sync observer");
        }

        match self.async_observers.iter().position(|reg| reg.id == id) {
            Some(index) => {
                let registration = self.async_observers.remove(index);
                tracing::debug!(
                    observer = ?id,
                    pending = registration.pending.len(),
                    "detached async observer"
                );
                registration.into_handles().collect()
            }
            None => Vec::new(),
        }
    }

    /// Runs the asynchronous half of a notification pass and returns the sync
    /// observers to call inline, in registration order.
    pub(crate) fn dispatch(&mut self, key: &K) -> Vec<(ObserverId, Arc<dyn StoreObserver<K>>)> {
        tracing::trace!(
            key = ?key,
            sync = self.sync_observers.len(),
            async_observers = self.async_observers.len(),
            "notifying observers"
        );

        for registration in &mut self.async_observers {
            registration.prune();
            let observer = Arc::clone(&registration.observer);
            match spawn_delivery(&self.config, observer, key.clone()) {
                Ok(delivery) => registration.pending.push(delivery),
                Err(e) => tracing::error!(
                    observer = ?registration.id,
                    key = ?key,
                    error = %e,
                    "failed to spawn async delivery; notification dropped"
                ),
            }
        }

        self.sync_observers
            .iter()
            .map(|reg| (reg.id, Arc::clone(&reg.observer)))
            .collect()
    }

    /// Removes every registration, returning all outstanding deliveries
    pub(crate) fn drain(&mut self) -> Vec<JoinHandle<()>> {
        self.sync_observers.clear();
        self.async_observers
            .drain(..)
            .flat_map(AsyncRegistration::into_handles)
            .collect()
    }

    pub(crate) fn sync_count(&self) -> usize {
        self.sync_observers.len()
    }

    pub(crate) fn async_count(&self) -> usize {
        self.async_observers.len()
    }
}

fn spawn_delivery<K>(
    config: &StoreConfig,
    observer: Arc<dyn StoreObserver<K>>,
    key: K,
) -> io::Result<PendingDelivery>
where
    K: Debug + Send + 'static,
{
    let mut builder = thread::Builder::new().name(config.thread_name.clone());
    if let Some(size) = config.stack_size {
        builder = builder.stack_size(size);
    }

    let returned = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&returned);
    let handle = builder.spawn(move || {
        let result = panic::catch_unwind(AssertUnwindSafe(|| observer.on_value_changed(&key)));
        flag.store(true, Ordering::Release);
        if let Err(payload) = result {
            tracing::error!(
                key = ?key,
                panic = %panic_message(payload.as_ref()),
                "async observer panicked during delivery"
            );
        }
    })?;
    Ok(PendingDelivery { handle, returned })
}

/// Waits for every handle, skipping one that belongs to the calling thread
pub(crate) fn join_deliveries(handles: Vec<JoinHandle<()>>) {
    let current = thread::current().id();
    for handle in handles {
        if handle.thread().id() == current {
            tracing::warn!("observer detached from inside its own delivery; not waiting on itself");
            continue;
        }
        if handle.join().is_err() {
            tracing::error!("async delivery thread terminated abnormally");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
