//! Live-reload controller: the consumer side of provider + watcher.
//!
//! ```text
//!  Idle --open--> Loaded <--toggle--> Watching
//!                   ^                    |
//!                   +---- open other ----+
//! ```
//!
//! Watch events arrive on a channel tagged with the generation of the watch
//! that produced them. An event is applied only if its generation is current
//! and the view is `Watching`, so a change racing a toggle-off (or a
//! re-open) never resurrects stale content. A watch that fails after it was
//! started drops the view back to `Loaded`.
//!
//! Every watch starts from the modification time of the content on screen,
//! so a write landing while the watcher spins up is still reported.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::error::FileError;
use crate::provider::FileProvider;
use crate::types::{ChangeNotification, FileHandle, FileMetadata, WatchOptions, is_markdown_file};
use crate::watch::{FileWatcher, Subscription, on_change, on_failure};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewState {
    /// No file open.
    Idle,
    /// File open, watch off.
    Loaded,
    /// File open, watch on.
    Watching,
}

/// User-visible messages produced by controller actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "notice", rename_all = "snake_case")]
pub enum Notice {
    Opened { name: String, read_only: bool },
    WatchEnabled,
    WatchDisabled,
    WatchUnavailable { reason: String },
    Reloaded,
    ReloadUnavailable,
    ReadFailed { reason: String },
    ContentUpdated { last_modified: u64 },
    NotMarkdown { name: String },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Opened {
                name,
                read_only: false,
            } => write!(f, "Opened {name}"),
            Notice::Opened {
                name,
                read_only: true,
            } => write!(f, "Opened {name} (read-only, live reload unavailable)"),
            Notice::WatchEnabled => f.write_str("Watching for changes"),
            Notice::WatchDisabled => f.write_str("Stopped watching"),
            Notice::WatchUnavailable { reason } => write!(f, "Live reload unavailable: {reason}"),
            Notice::Reloaded => f.write_str("Reloaded"),
            Notice::ReloadUnavailable => {
                f.write_str("Reload unavailable for this file. Open the file again to reload.")
            }
            Notice::ReadFailed { reason } => write!(f, "Failed to read file: {reason}"),
            Notice::ContentUpdated { .. } => f.write_str("File updated"),
            Notice::NotMarkdown { .. } => f.write_str("Please drop a Markdown file"),
        }
    }
}

struct OpenFile {
    name: String,
    /// `None` for read-only opens.
    handle: Option<FileHandle>,
    /// Modification time of the displayed content, when known.
    last_modified: Option<u64>,
}

/// Something the active watch reported.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    Changed(ChangeNotification),
    /// The watch stopped on its own; the view is back to `Loaded`.
    Failed(FileError),
}

type Tagged = (u64, WatchEvent);

pub struct LiveReloadController {
    provider: Arc<dyn FileProvider>,
    watcher: Arc<dyn FileWatcher>,
    options: WatchOptions,
    current: Option<OpenFile>,
    content: String,
    state: ViewState,
    subscription: Option<Subscription>,
    generation: u64,
    changes_tx: mpsc::UnboundedSender<Tagged>,
    changes_rx: mpsc::UnboundedReceiver<Tagged>,
    notices: Vec<Notice>,
}

impl LiveReloadController {
    pub fn new(provider: Arc<dyn FileProvider>, watcher: Arc<dyn FileWatcher>) -> Self {
        let (changes_tx, changes_rx) = mpsc::unbounded_channel();
        Self {
            provider,
            watcher,
            options: WatchOptions::default(),
            current: None,
            content: String::new(),
            state: ViewState::Idle,
            subscription: None,
            generation: 0,
            changes_tx,
            changes_rx,
            notices: Vec::new(),
        }
    }

    pub fn with_options(mut self, options: WatchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn state(&self) -> ViewState {
        self.state
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn file_name(&self) -> Option<&str> {
        self.current.as_ref().map(|file| file.name.as_str())
    }

    /// True when the open file has no live handle.
    pub fn is_read_only(&self) -> bool {
        self.current.as_ref().is_some_and(|file| file.handle.is_none())
    }

    /// Drain queued notices.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Ask the provider for a file and open it. Returns `Ok(false)` when the
    /// user cancelled; nothing is read or watched in that case.
    ///
    /// `UnsupportedCapability` is returned as-is so the caller can fall back
    /// to [`open_read_only`](Self::open_read_only).
    pub async fn open_with_picker(&mut self) -> Result<bool, FileError> {
        match self.provider.open_file_picker().await? {
            Some(metadata) => {
                self.open(metadata).await?;
                Ok(true)
            }
            None => {
                crate::debug_event!("controller", "picker cancelled");
                Ok(false)
            }
        }
    }

    /// Open a file with a live handle: read it, then watch it if the
    /// provider can.
    ///
    /// On a read failure the previously open file stays open.
    pub async fn open(&mut self, metadata: FileMetadata) -> Result<(), FileError> {
        // Stat first: a write between stat and read is reported again, never lost.
        let last_modified = self.modified_time(&metadata.handle).await;
        let content = match self.provider.read_file(&metadata.handle).await {
            Ok(content) => content,
            Err(e) => {
                self.notices.push(Notice::ReadFailed {
                    reason: e.to_string(),
                });
                return Err(e);
            }
        };

        self.stop_watch();
        crate::log_event!("controller", "opened", "{}", metadata.name);
        self.notices.push(Notice::Opened {
            name: metadata.name.clone(),
            read_only: false,
        });
        self.current = Some(OpenFile {
            name: metadata.name,
            handle: Some(metadata.handle),
            last_modified,
        });
        self.content = content;
        self.state = ViewState::Loaded;

        if self.provider.supports_watching() {
            self.start_watch();
        }
        Ok(())
    }

    /// Open content that has no live handle. Watch and reload are disabled
    /// until another file is opened.
    pub fn open_read_only(&mut self, name: impl Into<String>, content: impl Into<String>) {
        self.stop_watch();
        let name = name.into();
        crate::log_event!("controller", "opened read-only", "{name}");
        self.notices.push(Notice::Opened {
            name: name.clone(),
            read_only: true,
        });
        self.current = Some(OpenFile {
            name,
            handle: None,
            last_modified: None,
        });
        self.content = content.into();
        self.state = ViewState::Loaded;
    }

    /// Open a dropped item. A live handle opens normally; without one the
    /// dropped content is shown read-only. Returns `Ok(false)` if the item
    /// is not a markdown file.
    pub async fn open_dropped(
        &mut self,
        name: &str,
        content: String,
        handle: Option<FileHandle>,
    ) -> Result<bool, FileError> {
        if !is_markdown_file(name) {
            self.notices.push(Notice::NotMarkdown {
                name: name.to_string(),
            });
            return Ok(false);
        }

        match handle {
            Some(handle) => {
                self.open(FileMetadata {
                    name: name.to_string(),
                    path: None,
                    handle,
                })
                .await?
            }
            None => self.open_read_only(name, content),
        }
        Ok(true)
    }

    /// Re-read the open file. On failure the file stays open and the
    /// displayed content is unchanged.
    pub async fn reload(&mut self) -> Result<(), FileError> {
        let handle = match &self.current {
            None => return Ok(()),
            Some(OpenFile { handle: None, .. }) => {
                self.notices.push(Notice::ReloadUnavailable);
                return Ok(());
            }
            Some(OpenFile {
                handle: Some(handle),
                ..
            }) => handle.clone(),
        };

        let last_modified = self.modified_time(&handle).await;
        match self.provider.read_file(&handle).await {
            Ok(content) => {
                self.content = content;
                if let Some(file) = self.current.as_mut() {
                    file.last_modified = last_modified;
                }
                self.notices.push(Notice::Reloaded);
                Ok(())
            }
            Err(e) => {
                crate::warn_event!("controller", "reload failed", "{e}");
                self.notices.push(Notice::ReadFailed {
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Flip between `Loaded` and `Watching`. No-op without an open file.
    pub fn toggle_watch(&mut self) -> ViewState {
        match self.state {
            ViewState::Idle => {}
            ViewState::Watching => {
                self.stop_watch();
                self.notices.push(Notice::WatchDisabled);
            }
            ViewState::Loaded if self.is_read_only() => {
                self.notices.push(Notice::WatchUnavailable {
                    reason: "file was opened without a live handle".to_string(),
                });
            }
            ViewState::Loaded => self.start_watch(),
        }
        self.state
    }

    /// Wait for the next watch event that applies to the current view.
    pub async fn next_event(&mut self) -> Option<WatchEvent> {
        loop {
            let (generation, event) = self.changes_rx.recv().await?;
            if self.apply(generation, &event) {
                return Some(event);
            }
        }
    }

    /// Apply every event already queued. Returns how many were applied.
    pub fn apply_pending(&mut self) -> usize {
        let mut applied = 0;
        while let Ok((generation, event)) = self.changes_rx.try_recv() {
            if self.apply(generation, &event) {
                applied += 1;
            }
        }
        applied
    }

    fn apply(&mut self, generation: u64, event: &WatchEvent) -> bool {
        if generation != self.generation || self.state != ViewState::Watching {
            crate::debug_event!("controller", "ignored event", "from watch #{generation}");
            return false;
        }
        match event {
            WatchEvent::Changed(notification) => {
                self.content = notification.content.clone();
                if let Some(file) = self.current.as_mut() {
                    file.last_modified = Some(notification.last_modified);
                }
                self.notices.push(Notice::ContentUpdated {
                    last_modified: notification.last_modified,
                });
            }
            WatchEvent::Failed(error) => {
                crate::warn_event!("controller", "watch lost", "{error}");
                self.stop_watch();
                self.notices.push(Notice::WatchUnavailable {
                    reason: error.to_string(),
                });
            }
        }
        true
    }

    async fn modified_time(&self, handle: &FileHandle) -> Option<u64> {
        match self.provider.get_file_metadata(handle).await {
            Ok(info) => info.last_modified,
            Err(e) => {
                crate::debug_event!("controller", "no baseline", "{e}");
                None
            }
        }
    }

    fn start_watch(&mut self) {
        let Some((handle, since)) = self.current.as_ref().and_then(|file| {
            file.handle
                .clone()
                .map(|handle| (handle, file.last_modified))
        }) else {
            return;
        };
        if !self.provider.supports_watching() {
            self.notices.push(Notice::WatchUnavailable {
                reason: "this host cannot watch files".to_string(),
            });
            return;
        }

        self.generation += 1;
        let generation = self.generation;
        let changes = self.changes_tx.clone();
        let callback = on_change(move |notification| {
            // Receiver lives as long as the controller
            let _ = changes.send((generation, WatchEvent::Changed(notification)));
        });
        let failures = self.changes_tx.clone();
        let on_failed = on_failure(move |error| {
            let _ = failures.send((generation, WatchEvent::Failed(error)));
        });

        let mut options = self.options.clone();
        options.since = since;
        match self
            .watcher
            .watch_with_failure(&handle, callback, on_failed, &options)
        {
            Ok(subscription) => {
                self.subscription = Some(subscription);
                self.state = ViewState::Watching;
                self.notices.push(Notice::WatchEnabled);
            }
            Err(e) => {
                crate::warn_event!("controller", "watch failed", "{e}");
                self.state = ViewState::Loaded;
                self.notices.push(Notice::WatchUnavailable {
                    reason: e.to_string(),
                });
            }
        }
    }

    fn stop_watch(&mut self) {
        self.generation += 1;
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        if self.state == ViewState::Watching {
            self.state = ViewState::Loaded;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FileInfo;
    use crate::watch::{ChangeCallback, FailureCallback, SubscriptionId};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::platform::desktop::DesktopHandle;

    #[derive(Default)]
    struct MockProvider {
        content: Mutex<String>,
        last_modified: Mutex<Option<u64>>,
        fail_reads: Mutex<bool>,
        reads: AtomicUsize,
    }

    #[async_trait]
    impl FileProvider for MockProvider {
        async fn open_file_picker(&self) -> Result<Option<FileMetadata>, FileError> {
            Ok(None)
        }

        async fn read_file(&self, _handle: &FileHandle) -> Result<String, FileError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            if *self.fail_reads.lock() {
                return Err(FileError::read("notes.md", "permission revoked"));
            }
            Ok(self.content.lock().clone())
        }

        fn supports_watching(&self) -> bool {
            true
        }

        async fn get_file_metadata(&self, _handle: &FileHandle) -> Result<FileInfo, FileError> {
            Ok(FileInfo {
                name: "notes.md".to_string(),
                path: None,
                last_modified: *self.last_modified.lock(),
            })
        }

        async fn is_file_accessible(&self, _handle: &FileHandle) -> bool {
            true
        }
    }

    /// Keeps every callback it was given so tests can fire stale ones.
    #[derive(Default)]
    struct MockWatcher {
        callbacks: Mutex<Vec<(ChangeCallback, FailureCallback)>>,
        baselines: Mutex<Vec<Option<u64>>>,
        released: Arc<AtomicUsize>,
    }

    impl MockWatcher {
        fn fire(&self, index: usize, content: &str, last_modified: u64) {
            let callback = self.callbacks.lock()[index].0.clone();
            callback(ChangeNotification {
                content: content.to_string(),
                last_modified,
            });
        }

        fn lose(&self, index: usize, reason: &str) {
            let on_failed = self.callbacks.lock()[index].1.clone();
            on_failed(FileError::watch_setup("/docs/notes.md", reason));
        }
    }

    impl FileWatcher for MockWatcher {
        fn watch_with_failure(
            &self,
            _handle: &FileHandle,
            on_changed: ChangeCallback,
            on_failed: FailureCallback,
            options: &WatchOptions,
        ) -> Result<Subscription, FileError> {
            self.baselines.lock().push(options.since);
            let mut callbacks = self.callbacks.lock();
            callbacks.push((on_changed, on_failed));
            let released = Arc::clone(&self.released);
            Ok(Subscription::new(
                SubscriptionId(callbacks.len() as u64),
                move || {
                    released.fetch_add(1, Ordering::SeqCst);
                },
            ))
        }

        fn is_watching(&self, _handle: &FileHandle) -> bool {
            false
        }
    }

    fn metadata(name: &str) -> FileMetadata {
        FileMetadata {
            name: name.to_string(),
            path: Some(PathBuf::from(format!("/docs/{name}"))),
            handle: FileHandle::Desktop(DesktopHandle::new(format!("/docs/{name}"))),
        }
    }

    fn controller() -> (LiveReloadController, Arc<MockProvider>, Arc<MockWatcher>) {
        let provider = Arc::new(MockProvider::default());
        *provider.content.lock() = "# A".to_string();
        let watcher = Arc::new(MockWatcher::default());
        let controller = LiveReloadController::new(provider.clone(), watcher.clone());
        (controller, provider, watcher)
    }

    #[tokio::test]
    async fn test_open_starts_watching() {
        let (mut controller, _, watcher) = controller();
        controller.open(metadata("notes.md")).await.unwrap();

        assert_eq!(controller.state(), ViewState::Watching);
        assert_eq!(controller.content(), "# A");
        assert_eq!(controller.file_name(), Some("notes.md"));

        watcher.fire(0, "# B", 100);
        match controller.next_event().await {
            Some(WatchEvent::Changed(change)) => assert_eq!(change.content, "# B"),
            other => panic!("expected a change, got {other:?}"),
        }
        assert_eq!(controller.content(), "# B");

        let notices = controller.take_notices();
        assert_eq!(
            notices,
            vec![
                Notice::Opened {
                    name: "notes.md".to_string(),
                    read_only: false
                },
                Notice::WatchEnabled,
                Notice::ContentUpdated { last_modified: 100 },
            ]
        );
    }

    #[tokio::test]
    async fn test_change_racing_toggle_off_is_ignored() {
        let (mut controller, _, watcher) = controller();
        controller.open(metadata("notes.md")).await.unwrap();

        watcher.fire(0, "# B", 100);
        assert_eq!(controller.toggle_watch(), ViewState::Loaded);
        assert_eq!(controller.apply_pending(), 0);
        assert_eq!(controller.content(), "# A");
        assert_eq!(watcher.released.load(Ordering::SeqCst), 1);

        // Re-enabling does not revive the old registration's notifications
        assert_eq!(controller.toggle_watch(), ViewState::Watching);
        watcher.fire(0, "# stale", 150);
        watcher.fire(1, "# C", 200);
        assert_eq!(controller.apply_pending(), 1);
        assert_eq!(controller.content(), "# C");
    }

    #[tokio::test]
    async fn test_watch_starts_from_displayed_modification_time() {
        let (mut controller, provider, watcher) = controller();
        *provider.last_modified.lock() = Some(50);
        controller.open(metadata("notes.md")).await.unwrap();

        watcher.fire(0, "# B", 100);
        assert_eq!(controller.apply_pending(), 1);
        controller.toggle_watch();
        controller.toggle_watch();

        *provider.last_modified.lock() = Some(300);
        controller.reload().await.unwrap();
        controller.toggle_watch();
        controller.toggle_watch();

        assert_eq!(*watcher.baselines.lock(), vec![Some(50), Some(100), Some(300)]);
    }

    #[tokio::test]
    async fn test_lost_watch_returns_to_loaded() {
        let (mut controller, _, watcher) = controller();
        controller.open(metadata("notes.md")).await.unwrap();
        controller.take_notices();

        watcher.lose(0, "watch limit reached");
        match controller.next_event().await {
            Some(WatchEvent::Failed(FileError::WatchSetup { reason, .. })) => {
                assert_eq!(reason, "watch limit reached");
            }
            other => panic!("expected a failure, got {other:?}"),
        }
        assert_eq!(controller.state(), ViewState::Loaded);
        assert_eq!(watcher.released.load(Ordering::SeqCst), 1);
        assert!(matches!(
            controller.take_notices().as_slice(),
            [Notice::WatchUnavailable { reason }] if reason.contains("watch limit reached")
        ));

        // A late change from the lost watch is ignored; the user can retry.
        watcher.fire(0, "# late", 100);
        assert_eq!(controller.apply_pending(), 0);
        assert_eq!(controller.toggle_watch(), ViewState::Watching);
    }

    #[tokio::test]
    async fn test_reopen_tears_down_previous_watch() {
        let (mut controller, provider, watcher) = controller();
        controller.open(metadata("a.md")).await.unwrap();
        *provider.content.lock() = "# other".to_string();
        controller.open(metadata("b.md")).await.unwrap();

        assert_eq!(watcher.released.load(Ordering::SeqCst), 1);
        watcher.fire(0, "# from a", 100);
        assert_eq!(controller.apply_pending(), 0);
        assert_eq!(controller.content(), "# other");
        assert_eq!(controller.file_name(), Some("b.md"));
    }

    #[tokio::test]
    async fn test_reload_failure_keeps_file_open() {
        let (mut controller, provider, _) = controller();
        controller.open(metadata("notes.md")).await.unwrap();
        controller.take_notices();

        *provider.fail_reads.lock() = true;
        assert!(controller.reload().await.is_err());
        assert_eq!(controller.state(), ViewState::Watching);
        assert_eq!(controller.content(), "# A");
        assert!(matches!(
            controller.take_notices().as_slice(),
            [Notice::ReadFailed { .. }]
        ));

        *provider.fail_reads.lock() = false;
        *provider.content.lock() = "# B".to_string();
        controller.reload().await.unwrap();
        assert_eq!(controller.content(), "# B");
        assert_eq!(controller.take_notices(), vec![Notice::Reloaded]);
    }

    #[tokio::test]
    async fn test_read_only_mode_explains_disabled_actions() {
        let (mut controller, provider, watcher) = controller();
        controller.open_read_only("dropped.md", "# dropped");

        assert!(controller.is_read_only());
        assert_eq!(controller.state(), ViewState::Loaded);
        assert_eq!(controller.toggle_watch(), ViewState::Loaded);
        controller.reload().await.unwrap();

        assert_eq!(provider.reads.load(Ordering::SeqCst), 0);
        assert!(watcher.callbacks.lock().is_empty());
        let notices = controller.take_notices();
        assert!(matches!(
            notices.as_slice(),
            [
                Notice::Opened { read_only: true, .. },
                Notice::WatchUnavailable { .. },
                Notice::ReloadUnavailable
            ]
        ));
    }

    #[tokio::test]
    async fn test_idle_actions_are_noops() {
        let (mut controller, provider, _) = controller();
        assert_eq!(controller.toggle_watch(), ViewState::Idle);
        controller.reload().await.unwrap();
        assert!(controller.take_notices().is_empty());
        assert_eq!(provider.reads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_dropped_non_markdown_is_rejected() {
        let (mut controller, _, _) = controller();
        let opened = controller
            .open_dropped("photo.png", String::new(), None)
            .await
            .unwrap();
        assert!(!opened);
        assert_eq!(controller.state(), ViewState::Idle);
        assert_eq!(controller.take_notices()[0].to_string(), "Please drop a Markdown file");
    }

    #[tokio::test]
    async fn test_dropped_with_handle_opens_live() {
        let (mut controller, _, _) = controller();
        let handle = metadata("notes.md").handle;
        assert!(
            controller
                .open_dropped("notes.md", "# ignored".to_string(), Some(handle))
                .await
                .unwrap()
        );
        assert_eq!(controller.state(), ViewState::Watching);
        assert_eq!(controller.content(), "# A");
    }
}
