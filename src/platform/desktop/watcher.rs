//! Watcher that multiplexes the host's single push channel.
//!
//! One listener task receives every host push and routes it to the
//! registration for its path. Payloads for paths that are no longer
//! registered were in flight when the watch stopped and are dropped.
//! `WatchFailed` releases the registration and reports to its listener.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;

use super::desktop_handle;
use super::ipc::{FileChangedPayload, HostClient, HostPush, WatchFailedPayload};
use crate::error::FileError;
use crate::types::{FileHandle, WatchOptions};
use crate::watch::registry::{NativeGuard, Registry, TaskGuard};
use crate::watch::{ChangeCallback, FailureCallback, FileWatcher, Subscription, runtime_for};

/// Sends `WatchStop` when the registration releases its native watch.
struct HostWatchGuard {
    client: HostClient,
    path: PathBuf,
}

impl Drop for HostWatchGuard {
    fn drop(&mut self) {
        self.client.watch_stop(&self.path);
    }
}

pub struct DesktopFileWatcher {
    client: HostClient,
    registry: Arc<Registry<PathBuf>>,
    _listener: TaskGuard,
}

impl DesktopFileWatcher {
    /// Start the listener. Must be called from within a tokio runtime.
    pub fn new(
        client: HostClient,
        pushed: mpsc::UnboundedReceiver<HostPush>,
    ) -> Result<Self, FileError> {
        let runtime = runtime_for("desktop host channel")?;
        let registry = Registry::new("desktop");
        let listener = runtime.spawn(demultiplex(pushed, Arc::clone(&registry)));
        Ok(Self {
            client,
            registry,
            _listener: TaskGuard(listener),
        })
    }

    /// Number of paths with a live watch.
    pub fn active_watches(&self) -> usize {
        self.registry.len()
    }
}

impl FileWatcher for DesktopFileWatcher {
    fn watch_with_failure(
        &self,
        handle: &FileHandle,
        on_changed: ChangeCallback,
        on_failed: FailureCallback,
        options: &WatchOptions,
    ) -> Result<Subscription, FileError> {
        let path = desktop_handle(handle)?.path().to_path_buf();
        let debounce = options.effective_debounce();
        let client = self.client.clone();

        self.registry.register(
            path.clone(),
            on_changed,
            on_failed,
            options,
            move |_| {
                client.watch_start(&path, debounce)?;
                Ok(Box::new(HostWatchGuard { client, path }) as NativeGuard)
            },
        )
    }

    fn is_watching(&self, handle: &FileHandle) -> bool {
        desktop_handle(handle)
            .is_ok_and(|handle| self.registry.contains(&handle.path().to_path_buf()))
    }
}

async fn demultiplex(
    mut pushed: mpsc::UnboundedReceiver<HostPush>,
    registry: Arc<Registry<PathBuf>>,
) {
    while let Some(push) = pushed.recv().await {
        match push {
            HostPush::FileChanged(payload) => route_change(&registry, payload),
            HostPush::WatchFailed(WatchFailedPayload {
                handle_path,
                reason,
            }) => {
                let error = FileError::watch_setup(handle_path.display().to_string(), reason);
                if !registry.fail(&handle_path, error) {
                    crate::debug_event!(
                        "desktop",
                        "dropped",
                        "failure for unwatched {}",
                        handle_path.display()
                    );
                }
            }
        }
    }
    crate::debug_event!("desktop", "host channel closed");
}

fn route_change(registry: &Registry<PathBuf>, payload: FileChangedPayload) {
    let Some(registration) = registry.get(&payload.handle_path) else {
        crate::debug_event!(
            "desktop",
            "dropped",
            "{} is no longer watched",
            payload.handle_path.display()
        );
        return;
    };

    let last_modified = payload.last_modified;
    if registration.deliver(last_modified, payload.content) {
        crate::log_event!(
            "desktop",
            "changed",
            "{} @ {last_modified}",
            payload.handle_path.display()
        );
    }
}
