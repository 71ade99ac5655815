//! The privileged side of the desktop host.
//!
//! Owns the OS dialog and filesystem access. Keeps one native watcher per
//! watched path; every watcher shares one signal channel, and accepted
//! changes are pushed to the UI process on the push channel. A watch that
//! cannot be started is reported on the same channel.
//!
//! A change is pushed only after the file has been quiet for the debounce
//! window *and* its modification time is older than the settle threshold,
//! so editors that write in several chunks produce one notification.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Duration;

use super::ipc::{
    FileChangedPayload, FileStat, HostEndpoint, HostPush, HostRequest, OpenFileResult,
    WatchFailedPayload,
};
use crate::error::FileError;
use crate::platform::dialog::FileDialog;
use crate::types::{
    DEFAULT_DEBOUNCE, DEFAULT_SETTLE, PickerFilter, file_name_of, millis_since_epoch,
};
use crate::watch::{Debouncer, FsEventSource, FsGuard, FsSignal, FsSignalKind};

struct HostWatch {
    _guard: FsGuard,
    debounce: Duration,
}

/// Event loop serving one UI process.
pub struct DesktopHost {
    requests: mpsc::UnboundedReceiver<HostRequest>,
    push: mpsc::UnboundedSender<HostPush>,
    dialog: Arc<dyn FileDialog>,
    filter: PickerFilter,
    events: Arc<dyn FsEventSource>,
    settle: Duration,
    signal_tx: mpsc::UnboundedSender<FsSignal>,
    signal_rx: mpsc::UnboundedReceiver<FsSignal>,
    watches: HashMap<PathBuf, HostWatch>,
    debouncer: Debouncer<PathBuf>,
}

impl DesktopHost {
    pub fn new(
        endpoint: HostEndpoint,
        dialog: Arc<dyn FileDialog>,
        events: Arc<dyn FsEventSource>,
    ) -> Self {
        let (requests, push) = endpoint.into_parts();
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        Self {
            requests,
            push,
            dialog,
            filter: PickerFilter::default(),
            events,
            settle: DEFAULT_SETTLE,
            signal_tx,
            signal_rx,
            watches: HashMap::new(),
            debouncer: Debouncer::new(DEFAULT_DEBOUNCE),
        }
    }

    /// Minimum age of the last write before a change is pushed.
    pub fn settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn filter(mut self, filter: PickerFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Run on the current runtime until the UI side goes away.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) {
        crate::log_event!("host", "started");

        loop {
            tokio::select! {
                request = self.requests.recv() => match request {
                    Some(request) => self.handle_request(request),
                    None => break,
                },
                Some(signal) = self.signal_rx.recv() => self.handle_signal(signal),
                _ = self.debouncer.wait_ready() => self.flush().await,
            }
        }

        // Window closed: tear down every native watcher
        let count = self.watches.len();
        self.watches.clear();
        crate::log_event!("host", "stopped", "released {count} watches");
    }

    fn handle_request(&mut self, request: HostRequest) {
        match request {
            HostRequest::OpenDialog { reply } => {
                let dialog = Arc::clone(&self.dialog);
                let filter = self.filter.clone();
                tokio::spawn(async move {
                    let result = dialog.pick_file(&filter).await.map(|picked| {
                        picked.map(|file_path| OpenFileResult {
                            name: file_name_of(&file_path),
                            file_path,
                        })
                    });
                    let _ = reply.send(result);
                });
            }
            HostRequest::ReadFile { path, reply } => {
                tokio::spawn(async move {
                    let _ = reply.send(read_lossy(&path).await);
                });
            }
            HostRequest::Stat { path, reply } => {
                tokio::spawn(async move {
                    let _ = reply.send(stat(&path).await.map(|(file_stat, _)| file_stat));
                });
            }
            HostRequest::WatchStart { path, debounce } => self.start_watch(path, debounce),
            HostRequest::WatchStop { path } => self.stop_watch(&path),
        }
    }

    fn start_watch(&mut self, path: PathBuf, debounce: Duration) {
        if let Some(watch) = self.watches.get_mut(&path) {
            watch.debounce = debounce;
            crate::debug_event!("host", "already watching", "{}", path.display());
            return;
        }

        match self.events.subscribe(&path, self.signal_tx.clone()) {
            Ok(guard) => {
                crate::log_event!("host", "watching", "{}", path.display());
                self.watches.insert(
                    path,
                    HostWatch {
                        _guard: guard,
                        debounce,
                    },
                );
            }
            Err(e) => {
                tracing::error!("[host] failed to watch {}: {e}", path.display());
                self.send(HostPush::WatchFailed(WatchFailedPayload {
                    handle_path: path,
                    reason: e.to_string(),
                }));
            }
        }
    }

    fn send(&self, push: HostPush) {
        if self.push.send(push).is_err() {
            crate::debug_event!("host", "ui gone");
        }
    }

    fn stop_watch(&mut self, path: &Path) {
        self.debouncer.remove(&path.to_path_buf());
        if self.watches.remove(path).is_some() {
            crate::log_event!("host", "unwatched", "{}", path.display());
        }
    }

    fn handle_signal(&mut self, signal: FsSignal) {
        let Some(watch) = self.watches.get(&signal.path) else {
            crate::debug_event!("host", "ignored", "{} is not watched", signal.path.display());
            return;
        };

        match signal.kind {
            FsSignalKind::Changed => {
                let debounce = watch.debounce;
                self.debouncer.record_for(signal.path, debounce);
            }
            FsSignalKind::Removed => {
                // Atomic saves remove then recreate; the create arrives as a change
                crate::debug_event!("host", "removed", "{}", signal.path.display());
            }
        }
    }

    async fn flush(&mut self) {
        for path in self.debouncer.take_ready() {
            if !self.watches.contains_key(&path) {
                continue;
            }

            let (file_stat, modified) = match stat(&path).await {
                Ok(found) => found,
                Err(e) => {
                    crate::warn_event!("host", "skipping change", "{e}");
                    continue;
                }
            };

            let age = SystemTime::now()
                .duration_since(modified)
                .unwrap_or(Duration::MAX);
            if age < self.settle {
                crate::debug_event!("host", "settling", "{}", path.display());
                self.debouncer.record_for(path, self.settle - age);
                continue;
            }

            let content = match read_lossy(&path).await {
                Ok(content) => content,
                Err(e) => {
                    crate::warn_event!("host", "skipping change", "{e}");
                    continue;
                }
            };

            crate::debug_event!("host", "push", "{} @ {}", path.display(), file_stat.last_modified);
            self.send(HostPush::FileChanged(FileChangedPayload {
                handle_path: path,
                content,
                last_modified: file_stat.last_modified,
            }));
        }
    }
}

async fn read_lossy(path: &Path) -> Result<String, FileError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| FileError::read(path.display().to_string(), e))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

async fn stat(path: &Path) -> Result<(FileStat, SystemTime), FileError> {
    let target = || path.display().to_string();
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| FileError::read(target(), e))?;
    let modified = metadata.modified().map_err(|e| FileError::read(target(), e))?;
    Ok((
        FileStat {
            size: metadata.len(),
            last_modified: millis_since_epoch(modified),
        },
        modified,
    ))
}
