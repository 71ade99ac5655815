//! Change notification for open files.
//!
//! # Architecture
//!
//! ```text
//! FileWatcher (one per host)
//!   - Registry: at most one Registration per handle identity
//!   - Registration: listener slot + StaleGuard + native primitive
//!         |
//!   raw signal source           coalescing / filtering
//!   ----------------------      -----------------------------
//!   browser: poll interval  ->  timestamp must increase
//!   desktop: OS events      ->  settle + Debouncer (host side)
//!   editor:  buffer events  ->  immediate
//!            OS events      ->  Debouncer, suppressed while open
//! ```

mod debouncer;
mod fs_events;
mod guard;
pub(crate) mod registry;

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::FileError;
use crate::types::{ChangeNotification, FileHandle, WatchOptions};

pub use debouncer::Debouncer;
pub use fs_events::{FsEventSource, FsGuard, FsSignal, FsSignalKind, FsSink, NotifyEventSource};
pub use guard::{Admission, StaleGuard};

/// Receives accepted changes. Called from the watcher's task.
pub type ChangeCallback = Arc<dyn Fn(ChangeNotification) + Send + Sync>;

/// Wrap a closure as a [`ChangeCallback`].
pub fn on_change<F>(f: F) -> ChangeCallback
where
    F: Fn(ChangeNotification) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Receives the reason a watch stopped on its own after `watch()` returned.
pub type FailureCallback = Arc<dyn Fn(FileError) + Send + Sync>;

/// Wrap a closure as a [`FailureCallback`].
pub fn on_failure<F>(f: F) -> FailureCallback
where
    F: Fn(FileError) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Subscribe to changes of an open file.
pub trait FileWatcher: Send + Sync {
    /// Start watching `handle`. Returns immediately; the first notification
    /// always arrives later through `on_changed`.
    ///
    /// A second call for the same handle replaces the callback and reuses
    /// the native primitive. A watch that later stops on its own is only
    /// logged; use [`watch_with_failure`](Self::watch_with_failure) to react.
    fn watch(
        &self,
        handle: &FileHandle,
        on_changed: ChangeCallback,
        options: &WatchOptions,
    ) -> Result<Subscription, FileError> {
        let on_failed = on_failure(|error| crate::warn_event!("watch", "stopped", "{error}"));
        self.watch_with_failure(handle, on_changed, on_failed, options)
    }

    /// Like `watch`, and reports a native primitive that is lost after the
    /// call returned, such as a host-side watcher that could not attach.
    ///
    /// The registration is already released when `on_failed` runs, so
    /// `is_watching` is false and no further changes are delivered.
    fn watch_with_failure(
        &self,
        handle: &FileHandle,
        on_changed: ChangeCallback,
        on_failed: FailureCallback,
        options: &WatchOptions,
    ) -> Result<Subscription, FileError>;

    fn is_watching(&self, handle: &FileHandle) -> bool;
}

/// Identifies one `watch()` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub(crate) u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

type Release = Box<dyn FnOnce() + Send>;

/// Token returned by `watch()`.
///
/// `unsubscribe` runs the release exactly once no matter how often it is
/// called. Dropping the token unsubscribes as well.
pub struct Subscription {
    id: SubscriptionId,
    release: Mutex<Option<Release>>,
}

impl Subscription {
    pub(crate) fn new(id: SubscriptionId, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            id,
            release: Mutex::new(Some(Box::new(release))),
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Stop watching. Idempotent.
    pub fn unsubscribe(&self) {
        let release = self.release.lock().take();
        if let Some(release) = release {
            release();
        }
    }

    /// False once `unsubscribe` has run.
    pub fn is_active(&self) -> bool {
        self.release.lock().is_some()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

/// Runtime to spawn watch tasks on. `watch()` is synchronous, so it must be
/// called from within a tokio runtime.
pub(crate) fn runtime_for(target: &str) -> Result<tokio::runtime::Handle, FileError> {
    tokio::runtime::Handle::try_current().map_err(|e| FileError::watch_setup(target, e))
}
