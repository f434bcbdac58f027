use crate::any_value::AnyValue;
use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::observer::{join_deliveries, NotificationCenter, ObserverId, StoreObserver};
use crate::type_tag::TypeTag;
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::fmt::Debug;
use std::hash::Hash;
use std::ops::Deref;
use std::sync::Arc;

struct StoreState<K> {
    /// How many times the current owner of the lock has entered it
    depth: Cell<usize>,
    entries: RefCell<HashMap<K, AnyValue>>,
    center: RefCell<NotificationCenter<K>>,
}

/// A held store lock that tracks its own nesting depth
struct StoreLock<'a, K> {
    guard: ReentrantMutexGuard<'a, StoreState<K>>,
}

impl<K> StoreLock<'_, K> {
    fn is_nested(&self) -> bool {
        self.guard.depth.get() > 1
    }
}

impl<K> Deref for StoreLock<'_, K> {
    type Target = StoreState<K>;

    fn deref(&self) -> &StoreState<K> {
        &self.guard
    }
}

impl<K> Drop for StoreLock<'_, K> {
    fn drop(&mut self) {
        self.guard.depth.set(self.guard.depth.get() - 1);
    }
}

/// A thread-safe heterogeneous keyed store with change notifications.
///
/// `AnyStore` maps keys of one type `K` to values of any cloneable,
/// thread-safe type. Values are read back with a checked type assertion, and
/// every mutation notifies the attached observers: sync observers inline on
/// the mutating thread, async observers on a dedicated background thread per
/// notification.
///
/// All operations are serialized by a single reentrant lock, so an observer
/// callback may call back into the store it is observing.
///
/// # Examples
///
/// ```
/// use sovran_anystore::{AnyStore, StoreError};
///
/// let store = AnyStore::<i32>::new();
///
/// store.insert_or_assign(1, "foo".to_string())?;
/// assert_eq!(store.get_as::<String>(&1)?, "foo");
/// assert!(matches!(store.get_as::<i32>(&1), Err(StoreError::TypeMismatch { .. })));
///
/// store.insert_or_assign_with(3, 123, |n: i32| n.to_string())?;
/// let dotted = store.get_and_apply(&3, |s: &String| format!("{}.", s))?;
/// assert_eq!(dotted, "123.");
/// assert_eq!(store.get_as::<String>(&3)?, "123");
/// # Ok::<(), StoreError>(())
/// ```
pub struct AnyStore<K>
where
    K: Clone + Eq + Hash + Debug + Send + 'static,
{
    state: ReentrantMutex<StoreState<K>>,
}

impl<K> AnyStore<K>
where
    K: Clone + Eq + Hash + Debug + Send + 'static,
{
    /// Creates a new, empty store with the default configuration
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Creates a new, empty store
    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            state: ReentrantMutex::new(StoreState {
                depth: Cell::new(0),
                entries: RefCell::new(HashMap::new()),
                center: RefCell::new(NotificationCenter::new(config)),
            }),
        }
    }

    /// The configuration this store was built with
    pub fn config(&self) -> StoreConfig {
        self.lock().center.borrow().config().clone()
    }

    fn lock(&self) -> StoreLock<'_, K> {
        let guard = self.state.lock();
        guard.depth.set(guard.depth.get() + 1);
        StoreLock { guard }
    }

    /// Stores a value, replacing whatever the key held before.
    ///
    /// The new value may be of a different type than the old one. Every call
    /// notifies all observers exactly once, even when the new value equals
    /// the old one; stored types need not support comparison.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::ReentrantMutation` if called from inside a
    /// `with` or `get_and_apply` closure on this store.
    pub fn insert_or_assign<V>(&self, key: K, value: V) -> Result<(), StoreError>
    where
        V: Clone + Send + Sync + 'static,
    {
        let value = AnyValue::new(value);
        let state = self.lock();
        let previous = {
            let mut entries = state
                .entries
                .try_borrow_mut()
                .map_err(|_| StoreError::ReentrantMutation)?;
            entries.insert(key.clone(), value)
        };
        drop(previous);

        self.notify(&state, &key);
        Ok(())
    }

    /// Applies `operation` to `value` and stores the result.
    ///
    /// The operation runs before the lock is taken.
    ///
    /// # Errors
    ///
    /// Same as [`AnyStore::insert_or_assign`].
    pub fn insert_or_assign_with<V, U, F>(
        &self,
        key: K,
        value: V,
        operation: F,
    ) -> Result<(), StoreError>
    where
        F: FnOnce(V) -> U,
        U: Clone + Send + Sync + 'static,
    {
        self.insert_or_assign(key, operation(value))
    }

    /// Retrieves a copy of a value from the store
    ///
    /// # Errors
    ///
    /// - Returns `StoreError::KeyNotFound` if the key doesn't exist
    /// - Returns `StoreError::TypeMismatch` if the stored value is not a `T`
    pub fn get_as<T>(&self, key: &K) -> Result<T, StoreError>
    where
        T: Clone + 'static,
    {
        self.with(key, |value: &T| value.clone())
    }

    /// Gets a value by executing a closure with read access.
    ///
    /// The closure borrows the stored value in place, so large values can be
    /// inspected without copying. It may read from the store, but any
    /// mutation attempted from inside it fails with
    /// `StoreError::ReentrantMutation`.
    ///
    /// # Examples
    ///
    /// ```
    /// use sovran_anystore::{AnyStore, StoreError};
    ///
    /// let store = AnyStore::<String>::new();
    /// store.insert_or_assign("numbers".to_string(), vec![1, 2, 3])?;
    ///
    /// let length = store.with(&"numbers".to_string(), |v: &Vec<i32>| v.len())?;
    /// assert_eq!(length, 3);
    /// # Ok::<(), StoreError>(())
    /// ```
    ///
    /// # Errors
    ///
    /// - Returns `StoreError::KeyNotFound` if the key doesn't exist
    /// - Returns `StoreError::TypeMismatch` if the stored value is not a `T`
    pub fn with<T, R, F>(&self, key: &K, f: F) -> Result<R, StoreError>
    where
        T: 'static,
        F: FnOnce(&T) -> R,
    {
        let state = self.lock();
        let entries = state.entries.borrow();
        let value = entries
            .get(key)
            .ok_or_else(|| StoreError::KeyNotFound(format!("{:?}", key)))?;
        Ok(f(value.cast::<T>()?))
    }

    /// Reads a value and returns `operation` applied to it.
    ///
    /// The stored value is left untouched.
    ///
    /// # Errors
    ///
    /// - Returns `StoreError::KeyNotFound` if the key doesn't exist
    /// - Returns `StoreError::TypeMismatch` if the stored value is not a `Tin`
    pub fn get_and_apply<Tin, Tout, F>(&self, key: &K, operation: F) -> Result<Tout, StoreError>
    where
        Tin: 'static,
        F: FnOnce(&Tin) -> Tout,
    {
        self.with(key, operation)
    }

    /// Removes a value from the store, notifying observers if one was present
    ///
    /// # Returns
    ///
    /// Returns `Ok(true)` if the key was present and removed, `Ok(false)` if not present.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::ReentrantMutation` if called from inside a
    /// `with` or `get_and_apply` closure on this store.
    pub fn remove(&self, key: &K) -> Result<bool, StoreError> {
        let state = self.lock();
        let removed = state
            .entries
            .try_borrow_mut()
            .map_err(|_| StoreError::ReentrantMutation)?
            .remove(key);

        match removed {
            Some(value) => {
                drop(value);
                self.notify(&state, key);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Returns true if the store contains the specified key
    pub fn contains_key(&self, key: &K) -> bool {
        self.lock().entries.borrow().contains_key(key)
    }

    /// Returns the number of entries in the store
    pub fn len(&self) -> usize {
        self.lock().entries.borrow().len()
    }

    /// Returns true if the store contains no entries
    pub fn is_empty(&self) -> bool {
        self.lock().entries.borrow().is_empty()
    }

    /// Returns a vector of all keys in the store
    pub fn keys(&self) -> Vec<K> {
        self.lock().entries.borrow().keys().cloned().collect()
    }

    /// Returns the type tag of the value stored under `key`
    ///
    /// # Errors
    ///
    /// Returns `StoreError::KeyNotFound` if the key doesn't exist
    pub fn type_tag_of(&self, key: &K) -> Result<TypeTag, StoreError> {
        self.lock()
            .entries
            .borrow()
            .get(key)
            .map(AnyValue::type_tag)
            .ok_or_else(|| StoreError::KeyNotFound(format!("{:?}", key)))
    }

    /// Registers an observer notified inline on every mutation.
    ///
    /// Attaching an observer that is already attached for sync delivery has
    /// no effect.
    pub fn attach_sync(&self, observer: Arc<dyn StoreObserver<K>>) {
        self.lock().center.borrow_mut().attach_sync(observer);
    }

    /// Registers an observer notified on a background thread for every
    /// mutation.
    ///
    /// Attaching an observer that is already attached for async delivery has
    /// no effect.
    pub fn attach_async(&self, observer: Arc<dyn StoreObserver<K>>) {
        self.lock().center.borrow_mut().attach_async(observer);
    }

    /// Unregisters an observer from both delivery modes.
    ///
    /// Blocks until every async delivery already dispatched to the observer
    /// has finished. Once this returns the observer is never called again by
    /// this store. The store lock is released while waiting, so running
    /// deliveries may still use the store.
    ///
    /// Detaching an observer that isn't attached is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::DetachWhileLocked` if the calling thread already
    /// holds the store lock (for instance from inside a sync callback) and
    /// deliveries for the observer are still inside their callbacks. The
    /// registration is left in place in that case. A delivery counts as
    /// finished as soon as its callback returns, even if its thread has not
    /// exited yet.
    pub fn detach<O: ?Sized>(&self, observer: &Arc<O>) -> Result<(), StoreError> {
        let id = ObserverId::of(observer);
        let pending = {
            let state = self.lock();
            let mut center = state.center.borrow_mut();
            if state.is_nested() && center.has_running_deliveries(id) {
                return Err(StoreError::DetachWhileLocked);
            }
            center.detach(id)
        };

        join_deliveries(pending);
        Ok(())
    }

    /// Number of observers attached for sync delivery
    pub fn sync_observer_count(&self) -> usize {
        self.lock().center.borrow().sync_count()
    }

    /// Number of observers attached for async delivery
    pub fn async_observer_count(&self) -> usize {
        self.lock().center.borrow().async_count()
    }

    /// Runs one notification pass for `key`. The caller holds the lock for
    /// the whole pass, so sync passes of different mutations never interleave.
    fn notify(&self, state: &StoreLock<'_, K>, key: &K) {
        let sync_observers = state.center.borrow_mut().dispatch(key);

        for (id, observer) in sync_observers {
            // An earlier callback in this pass may have detached it
            if !state.center.borrow().is_sync_attached(id) {
                continue;
            }
            observer.on_value_changed(key);
        }
    }
}

impl<K> Default for AnyStore<K>
where
    K: Clone + Eq + Hash + Debug + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> fmt::Debug for AnyStore<K>
where
    K: Clone + Eq + Hash + Debug + Send + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        let mut out = f.debug_struct("AnyStore");
        match state.entries.try_borrow() {
            Ok(entries) => out.field("entries", &*entries),
            Err(_) => out.field("entries", &"<borrowed>"),
        };
        out.finish_non_exhaustive()
    }
}

impl<K> Drop for AnyStore<K>
where
    K: Clone + Eq + Hash + Debug + Send + 'static,
{
    fn drop(&mut self) {
        let pending = self.state.get_mut().center.get_mut().drain();
        if !pending.is_empty() {
            tracing::debug!(
                pending = pending.len(),
                "waiting for async deliveries before dropping store"
            );
        }
        join_deliveries(pending);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_lock_depth_tracks_nesting() {
        let store = AnyStore::<i32>::new();
        let outer = store.lock();
        assert!(!outer.is_nested());
        {
            let inner = store.lock();
            assert!(inner.is_nested());
        }
        assert!(!outer.is_nested());
        drop(outer);
        assert_eq!(store.lock().depth.get(), 1);
    }

    #[test]
    fn test_old_value_dropped_on_assign() {
        struct DropCounter(Arc<AtomicUsize>);

        impl Clone for DropCounter {
            fn clone(&self) -> Self {
                DropCounter(Arc::clone(&self.0))
            }
        }

        impl Drop for DropCounter {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let drops = Arc::new(AtomicUsize::new(0));
        let store = AnyStore::<i32>::new();

        store.insert_or_assign(1, DropCounter(Arc::clone(&drops))).unwrap();
        assert_eq!(drops.load(Ordering::SeqCst), 0);

        store.insert_or_assign(1, 5u8).unwrap();
        assert_eq!(drops.load(Ordering::SeqCst), 1);

        store.insert_or_assign(2, DropCounter(Arc::clone(&drops))).unwrap();
        assert!(store.remove(&2).unwrap());
        assert_eq!(drops.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_detached_sync_observer_skipped_mid_pass() {
        let store = Arc::new(AnyStore::<i32>::new());
        let late_calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&late_calls);
        let late: Arc<dyn StoreObserver<i32>> = Arc::new(move |_: &i32| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let weak_store = Arc::downgrade(&store);
        let target = Arc::clone(&late);
        let early: Arc<dyn StoreObserver<i32>> = Arc::new(move |_: &i32| {
            if let Some(store) = weak_store.upgrade() {
                store.detach(&target).unwrap();
            }
        });

        store.attach_sync(early.clone());
        store.attach_sync(late.clone());
        store.insert_or_assign(1, 1).unwrap();

        assert_eq!(late_calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.sync_observer_count(), 1);
        store.detach(&early).unwrap();
    }

    #[test]
    fn test_debug_lists_entries() {
        let store = AnyStore::<i32>::new();
        store.insert_or_assign(1, "one".to_string()).unwrap();
        let rendered = format!("{:?}", store);
        assert!(rendered.contains("AnyStore"));
        assert!(rendered.contains("String"));
    }
}
