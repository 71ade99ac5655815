//! Polling watcher for capability handles.
//!
//! Sandboxed handles get no change notifications, so each registration
//! polls the modification time on a fixed interval and re-reads the content
//! only when the timestamp strictly increases. The baseline is the caller's
//! `WatchOptions::since`; without one the first tick delivers the current
//! content.

use std::sync::Arc;

use tokio::time::{Duration, Instant, MissedTickBehavior, interval_at};

use super::host::{BrowserHandle, browser_handle};
use crate::error::FileError;
use crate::types::{FileHandle, WatchOptions};
use crate::watch::registry::{NativeGuard, Registration, Registry, TaskGuard};
use crate::watch::{ChangeCallback, FailureCallback, FileWatcher, Subscription, runtime_for};

pub struct BrowserFileWatcher {
    registry: Arc<Registry<usize>>,
}

impl BrowserFileWatcher {
    pub fn new() -> Self {
        Self {
            registry: Registry::new("poll"),
        }
    }
}

impl Default for BrowserFileWatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl FileWatcher for BrowserFileWatcher {
    fn watch_with_failure(
        &self,
        handle: &FileHandle,
        on_changed: ChangeCallback,
        on_failed: FailureCallback,
        options: &WatchOptions,
    ) -> Result<Subscription, FileError> {
        let handle = browser_handle(handle)?.clone();
        let runtime = runtime_for(&handle.file().name())?;
        let every = options.effective_poll_interval();

        self.registry.register(
            handle.identity(),
            on_changed,
            on_failed,
            options,
            |registration| {
                let task = runtime.spawn(poll(handle, Arc::clone(registration), every));
                Ok(Box::new(TaskGuard(task)) as NativeGuard)
            },
        )
    }

    fn is_watching(&self, handle: &FileHandle) -> bool {
        browser_handle(handle).is_ok_and(|handle| self.registry.contains(&handle.identity()))
    }
}

async fn poll(handle: BrowserHandle, registration: Arc<Registration>, every: Duration) {
    let cancel = registration.cancelled();
    let name = handle.file().name();
    crate::debug_event!("poll", "started", "{name} every {}ms", every.as_millis());

    let mut ticker = interval_at(Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        // A failed cycle never stops the loop; the next tick retries.
        if let Err(e) = poll_once(&handle, &registration, &name).await {
            crate::warn_event!("poll", "transient error", "{name}: {e}");
        }
    }

    crate::debug_event!("poll", "stopped", "{name}");
}

async fn poll_once(
    handle: &BrowserHandle,
    registration: &Registration,
    name: &str,
) -> Result<(), FileError> {
    let last_modified = handle.file().last_modified().await?;
    if !registration.is_newer(last_modified) {
        tracing::trace!("[poll] unchanged: {name}");
        return Ok(());
    }

    let bytes = handle.file().read_bytes().await?;
    let content = String::from_utf8_lossy(&bytes).into_owned();
    if registration.deliver(last_modified, content) {
        crate::log_event!("poll", "changed", "{name} @ {last_modified}");
    }
    Ok(())
}
