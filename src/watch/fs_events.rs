//! OS-level change events scoped to a single file.
//!
//! The parent directory is watched non-recursively and events are filtered
//! by file name, so editors that save by writing a temp file and renaming
//! it over the original are still seen.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use notify::event::{AccessKind, AccessMode, ModifyKind};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::error::FileError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsSignalKind {
    Changed,
    Removed,
}

/// A raw, undebounced change signal for one watched path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsSignal {
    /// The path passed to `subscribe`.
    pub path: PathBuf,
    pub kind: FsSignalKind,
}

pub type FsSink = mpsc::UnboundedSender<FsSignal>;

/// Keeps an OS watcher alive. Dropping it closes the watcher.
pub struct FsGuard {
    _inner: Box<dyn Send>,
}

impl FsGuard {
    pub fn new(inner: impl Send + 'static) -> Self {
        Self {
            _inner: Box::new(inner),
        }
    }
}

/// Source of raw filesystem change signals.
pub trait FsEventSource: Send + Sync {
    /// Start forwarding change signals for `path` into `sink`.
    fn subscribe(&self, path: &Path, sink: FsSink) -> Result<FsGuard, FileError>;
}

/// `notify::RecommendedWatcher` per subscription.
#[derive(Debug, Default, Clone, Copy)]
pub struct NotifyEventSource;

impl NotifyEventSource {
    pub fn new() -> Self {
        Self
    }

    fn classify(kind: &EventKind) -> Option<FsSignalKind> {
        match kind {
            EventKind::Modify(ModifyKind::Metadata(_)) => None,
            EventKind::Modify(_) | EventKind::Create(_) => Some(FsSignalKind::Changed),
            EventKind::Access(AccessKind::Close(AccessMode::Write)) => Some(FsSignalKind::Changed),
            EventKind::Remove(_) => Some(FsSignalKind::Removed),
            _ => None,
        }
    }
}

impl FsEventSource for NotifyEventSource {
    fn subscribe(&self, path: &Path, sink: FsSink) -> Result<FsGuard, FileError> {
        let target = path.display().to_string();
        let file_name: OsString = path
            .file_name()
            .ok_or_else(|| FileError::watch_setup(&target, "path has no file name"))?
            .to_os_string();
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let reported = path.to_path_buf();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            match res {
                Ok(event) => {
                    let Some(kind) = Self::classify(&event.kind) else {
                        return;
                    };
                    let ours = event
                        .paths
                        .iter()
                        .any(|p| p.file_name() == Some(file_name.as_os_str()));
                    if ours {
                        let _ = sink.send(FsSignal {
                            path: reported.clone(),
                            kind,
                        });
                    }
                }
                Err(e) => {
                    crate::warn_event!("fs-events", "watch error", "{e}");
                }
            }
        })?;

        watcher
            .watch(&parent, RecursiveMode::NonRecursive)
            .map_err(|e| FileError::watch_setup(&target, e))?;

        crate::debug_event!("fs-events", "watching", "{} via {}", target, parent.display());
        Ok(FsGuard::new(watcher))
    }
}
