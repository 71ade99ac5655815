//! Per-handle registrations shared by every watcher implementation.
//!
//! A registry holds at most one registration per handle identity. A second
//! `watch()` on the same identity swaps the listener in place; the native
//! primitive created by the first call keeps running. Releasing is scoped to
//! the subscription that currently owns the listener, so a replaced
//! subscription's unsubscribe is a no-op.
//!
//! The DashMap shard lock is never held while a listener lock is taken, so a
//! callback may call back into its watcher from any thread.

use std::cell::RefCell;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use parking_lot::{Mutex, ReentrantMutex};
use tokio_util::sync::CancellationToken;

use super::guard::{Admission, StaleGuard};
use super::{ChangeCallback, FailureCallback, Subscription, SubscriptionId};
use crate::error::FileError;
use crate::types::{ChangeNotification, WatchOptions, now_millis};

/// Whatever keeps a native primitive alive. Dropping it releases the primitive.
pub(crate) type NativeGuard = Box<dyn Send>;

/// Aborts a spawned watch task when dropped.
pub(crate) struct TaskGuard(pub tokio::task::JoinHandle<()>);

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

struct Listener {
    id: SubscriptionId,
    callback: ChangeCallback,
    on_failed: FailureCallback,
}

/// Live state for one watched handle.
pub(crate) struct Registration {
    /// Held across the callback so a concurrent release waits for it to return.
    /// Re-entrant so the callback may unsubscribe itself.
    listener: ReentrantMutex<RefCell<Option<Listener>>>,
    guard: Mutex<StaleGuard>,
    cancel: CancellationToken,
    native: Mutex<Option<NativeGuard>>,
}

impl Registration {
    fn new(listener: Listener, options: &WatchOptions) -> Self {
        let mut guard = StaleGuard::new(options.skip_unchanged_content);
        if let Some(since) = options.since {
            guard.seed(since);
        }
        Self {
            listener: ReentrantMutex::new(RefCell::new(Some(listener))),
            guard: Mutex::new(guard),
            cancel: CancellationToken::new(),
            native: Mutex::new(None),
        }
    }

    /// Token cancelled when this registration is released.
    pub fn cancelled(&self) -> CancellationToken {
        self.cancel.clone()
    }

    #[cfg(test)]
    fn is_active(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// Whether a timestamp would pass the stale-write check.
    pub fn is_newer(&self, last_modified: u64) -> bool {
        self.guard.lock().is_newer(last_modified)
    }

    /// Timestamp for a clockless source, guaranteed to pass the guard.
    pub fn next_stamp(&self) -> u64 {
        self.guard.lock().next_stamp(now_millis())
    }

    /// Deliver a change to the current listener if the guard admits it.
    ///
    /// Returns `false` when released, stale, or unchanged.
    pub fn deliver(&self, last_modified: u64, content: String) -> bool {
        let slot = self.listener.lock();
        let callback = match slot.borrow().as_ref() {
            Some(listener) => listener.callback.clone(),
            None => return false,
        };

        let admission = self.guard.lock().admit(last_modified, &content);
        match admission {
            Admission::Accepted => {}
            Admission::Stale => {
                crate::debug_event!("guard", "stale", "{last_modified}");
                return false;
            }
            Admission::Unchanged => {
                crate::debug_event!("guard", "unchanged", "{last_modified}");
                return false;
            }
        }

        callback(ChangeNotification {
            content,
            last_modified,
        });
        true
    }

    fn set_native(&self, native: NativeGuard) {
        *self.native.lock() = Some(native);
    }

    /// Swap in a new listener. Hands it back if this registration was
    /// already released.
    fn replace_listener(&self, listener: Listener) -> Result<(), Listener> {
        let slot = self.listener.lock();
        let mut current = slot.borrow_mut();
        if current.is_none() || self.cancel.is_cancelled() {
            return Err(listener);
        }
        *current = Some(listener);
        Ok(())
    }

    /// Release whoever owns the listener right now.
    fn release_current(&self) -> Option<(SubscriptionId, FailureCallback)> {
        let slot = self.listener.lock();
        let listener = slot.borrow_mut().take()?;
        self.cancel.cancel();
        let native = self.native.lock().take();
        drop(native);
        Some((listener.id, listener.on_failed))
    }

    /// Release if `id` owns the listener. Clears the listener, cancels tasks
    /// and drops the native primitive.
    fn release_if(&self, id: SubscriptionId) -> bool {
        let slot = self.listener.lock();
        {
            let mut current = slot.borrow_mut();
            match current.as_ref() {
                Some(listener) if listener.id == id => {}
                _ => return false,
            }
            *current = None;
        }
        self.cancel.cancel();
        let native = self.native.lock().take();
        drop(native);
        true
    }
}

/// Registrations keyed by handle identity.
pub(crate) struct Registry<K: Eq + Hash> {
    name: &'static str,
    entries: DashMap<K, Arc<Registration>>,
    next_id: AtomicU64,
}

impl<K> Registry<K>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
{
    pub fn new(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            entries: DashMap::new(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &K) -> Option<Arc<Registration>> {
        self.entries.get(key).map(|entry| Arc::clone(entry.value()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Register a listener for `key`, creating the native primitive only
    /// when no live registration exists.
    ///
    /// A new registration starts from `options.since` as its baseline.
    /// `attach` receives it and returns the guard that keeps its native
    /// primitive alive.
    pub fn register<F>(
        self: &Arc<Self>,
        key: K,
        callback: ChangeCallback,
        on_failed: FailureCallback,
        options: &WatchOptions,
        attach: F,
    ) -> Result<Subscription, FileError>
    where
        F: FnOnce(&Arc<Registration>) -> Result<NativeGuard, FileError>,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut listener = Listener {
            id,
            callback,
            on_failed,
        };

        if let Some(existing) = self.get(&key) {
            match existing.replace_listener(listener) {
                Ok(()) => {
                    crate::debug_event!(self.name, "listener replaced", "{key:?} by {id}");
                    return Ok(self.subscription(key, id));
                }
                Err(returned) => listener = returned,
            }
        }

        let registration = Self::attach_new(listener, options, attach)?;
        if let Some(previous) = self.entries.insert(key.clone(), registration) {
            // Either released and not yet removed, or a concurrent register won.
            previous.release_current();
        }
        crate::debug_event!(self.name, "registered", "{key:?} as {id}");

        Ok(self.subscription(key, id))
    }

    fn subscription(self: &Arc<Self>, key: K, id: SubscriptionId) -> Subscription {
        let registry: Weak<Self> = Arc::downgrade(self);
        Subscription::new(id, move || {
            if let Some(registry) = registry.upgrade() {
                registry.release(&key, id);
            }
        })
    }

    fn attach_new<F>(
        listener: Listener,
        options: &WatchOptions,
        attach: F,
    ) -> Result<Arc<Registration>, FileError>
    where
        F: FnOnce(&Arc<Registration>) -> Result<NativeGuard, FileError>,
    {
        let id = listener.id;
        let registration = Arc::new(Registration::new(listener, options));
        match attach(&registration) {
            Ok(native) => {
                registration.set_native(native);
                Ok(registration)
            }
            Err(e) => {
                registration.release_if(id);
                Err(e)
            }
        }
    }

    fn release(&self, key: &K, id: SubscriptionId) {
        let Some(registration) = self.get(key) else {
            return;
        };
        if !registration.release_if(id) {
            crate::debug_event!(self.name, "release skipped", "{key:?} {id} was replaced");
            return;
        }
        self.entries
            .remove_if(key, |_, current| Arc::ptr_eq(current, &registration));
        crate::debug_event!(self.name, "released", "{key:?}");
    }

    /// The native primitive behind `key` stopped on its own. Releases the
    /// registration and hands `error` to the listener that owned it.
    pub fn fail(&self, key: &K, error: FileError) -> bool {
        let Some(registration) = self.get(key) else {
            return false;
        };
        let Some((id, on_failed)) = registration.release_current() else {
            return false;
        };
        self.entries
            .remove_if(key, |_, current| Arc::ptr_eq(current, &registration));
        crate::warn_event!(self.name, "watch failed", "{key:?} {id}: {error}");
        on_failed(error);
        true
    }

    /// Release every registration (host shutdown).
    pub fn clear(&self) {
        let registrations: Vec<Arc<Registration>> = self
            .entries
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        for registration in registrations {
            registration.release_current();
        }
        self.entries.clear();
    }
}
