//! Editor watcher: buffer changes first, disk changes second.
//!
//! Each registration follows two sources. Buffer edits to an open document
//! are delivered immediately with the buffer text. Disk signals are
//! debounced and delivered only while the document is closed; when it is
//! open the buffer event already covered the change.
//!
//! Both sources are subscribed before `watch()` returns, and the baseline
//! comes from `WatchOptions::since`, so nothing that happens after the call
//! is missed while the follower task starts.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Duration;

use super::host::{DocumentUri, EditorHost, editor_handle};
use crate::error::FileError;
use crate::types::{FileHandle, WatchOptions};
use crate::watch::registry::{NativeGuard, Registration, Registry, TaskGuard};
use crate::watch::{
    ChangeCallback, Debouncer, FailureCallback, FileWatcher, FsSignal, FsSignalKind, Subscription,
    runtime_for,
};

pub struct EditorFileWatcher {
    host: Arc<dyn EditorHost>,
    registry: Arc<Registry<DocumentUri>>,
}

impl EditorFileWatcher {
    pub fn new(host: Arc<dyn EditorHost>) -> Self {
        Self {
            host,
            registry: Registry::new("editor"),
        }
    }
}

impl FileWatcher for EditorFileWatcher {
    fn watch_with_failure(
        &self,
        handle: &FileHandle,
        on_changed: ChangeCallback,
        on_failed: FailureCallback,
        options: &WatchOptions,
    ) -> Result<Subscription, FileError> {
        let uri = editor_handle(handle)?.uri().clone();
        let runtime = runtime_for(uri.as_str())?;
        let debounce = options.effective_debounce();
        let host = Arc::clone(&self.host);

        self.registry.register(
            uri.clone(),
            on_changed,
            on_failed,
            options,
            move |registration| {
                let (sink, signals) = mpsc::unbounded_channel();
                let fs_guard = host.create_file_watcher(&uri, sink)?;
                let buffer_changes = host.document_changes();
                let follower = Follower {
                    host,
                    uri,
                    registration: Arc::clone(registration),
                    debounce,
                };
                let task = runtime.spawn(follower.run(signals, buffer_changes));
                Ok(Box::new((fs_guard, TaskGuard(task))) as NativeGuard)
            },
        )
    }

    fn is_watching(&self, handle: &FileHandle) -> bool {
        editor_handle(handle).is_ok_and(|handle| self.registry.contains(handle.uri()))
    }
}

struct Follower {
    host: Arc<dyn EditorHost>,
    uri: DocumentUri,
    registration: Arc<Registration>,
    debounce: Duration,
}

impl Follower {
    async fn run(
        self,
        mut signals: mpsc::UnboundedReceiver<FsSignal>,
        mut buffer_changes: broadcast::Receiver<DocumentUri>,
    ) {
        let cancel = self.registration.cancelled();
        let mut debouncer = Debouncer::new(self.debounce);
        let mut buffers_open = true;
        crate::debug_event!("editor", "following", "{}", self.uri);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                changed = buffer_changes.recv(), if buffers_open => match changed {
                    Ok(changed) if changed == self.uri => self.buffer_changed(),
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        crate::debug_event!("editor", "lagged", "{skipped} buffer events");
                        self.buffer_changed();
                    }
                    Err(RecvError::Closed) => buffers_open = false,
                },
                Some(signal) = signals.recv() => {
                    if signal.kind == FsSignalKind::Changed {
                        debouncer.record(());
                    }
                }
                _ = debouncer.wait_ready() => {
                    debouncer.take_ready();
                    if let Err(e) = self.disk_changed().await {
                        crate::warn_event!("editor", "skipping change", "{e}");
                    }
                }
            }
        }

        crate::debug_event!("editor", "stopped", "{}", self.uri);
    }

    fn buffer_changed(&self) {
        let Some(document) = self.host.open_document(&self.uri) else {
            return;
        };
        let stamp = self.registration.next_stamp();
        if self.registration.deliver(stamp, document.text()) {
            crate::log_event!("editor", "buffer changed", "{} v{}", self.uri, document.version());
        }
    }

    async fn disk_changed(&self) -> Result<(), FileError> {
        if self.host.open_document(&self.uri).is_some() {
            crate::debug_event!("editor", "suppressed", "{} is open in a buffer", self.uri);
            return Ok(());
        }

        let bytes = self.host.read_bytes(&self.uri).await?;
        let last_modified = self.host.stat(&self.uri).await?;
        let content = String::from_utf8_lossy(&bytes).into_owned();
        if self.registration.deliver(last_modified, content) {
            crate::log_event!("editor", "disk changed", "{} @ {last_modified}", self.uri);
        }
        Ok(())
    }
}
