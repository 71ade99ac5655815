//! Controller flows against the browser platform with an in-memory host.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use mdlive::platform::browser::{BrowserHandle, BrowserHost, CapabilityFile, PickerError};
use mdlive::{
    ChangeNotification, FileError, FileMetadata, LiveReloadController, Notice, PickerFilter,
    Platform, ViewState, WatchEvent,
};

struct MemoryFile {
    name: String,
    state: Mutex<(String, u64)>,
    failing: AtomicBool,
    reads: AtomicUsize,
}

impl MemoryFile {
    fn new(name: &str, content: &str, last_modified: u64) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            state: Mutex::new((content.to_string(), last_modified)),
            failing: AtomicBool::new(false),
            reads: AtomicUsize::new(0),
        })
    }

    fn write(&self, content: &str, last_modified: u64) {
        *self.state.lock() = (content.to_string(), last_modified);
    }
}

#[async_trait]
impl CapabilityFile for MemoryFile {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn read_bytes(&self) -> Result<Vec<u8>, FileError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(FileError::Read {
                target: self.name.clone(),
                reason: "not found".to_string(),
            });
        }
        Ok(self.state.lock().0.clone().into_bytes())
    }

    async fn last_modified(&self) -> Result<u64, FileError> {
        Ok(self.state.lock().1)
    }
}

struct MemoryHost {
    file: Arc<MemoryFile>,
    supported: bool,
    cancel: bool,
}

#[async_trait]
impl BrowserHost for MemoryHost {
    fn supports_file_system_access(&self) -> bool {
        self.supported
    }

    async fn show_open_file_picker(
        &self,
        _filter: &PickerFilter,
    ) -> Result<Arc<dyn CapabilityFile>, PickerError> {
        if self.cancel {
            return Err(PickerError::Aborted);
        }
        Ok(Arc::clone(&self.file) as Arc<dyn CapabilityFile>)
    }
}

fn controller_for(file: &Arc<MemoryFile>, supported: bool, cancel: bool) -> LiveReloadController {
    let platform = Platform::browser(
        Arc::new(MemoryHost {
            file: Arc::clone(file),
            supported,
            cancel,
        }),
        PickerFilter::default(),
    );
    LiveReloadController::new(platform.provider, platform.watcher)
}

async fn next_change(controller: &mut LiveReloadController) -> ChangeNotification {
    match tokio::time::timeout(Duration::from_secs(5), controller.next_event()).await {
        Ok(Some(WatchEvent::Changed(change))) => change,
        other => panic!("expected a change, got {other:?}"),
    }
}

#[tokio::test]
async fn test_legacy_host_falls_back_to_read_only() {
    let file = MemoryFile::new("notes.md", "# A", 50);
    let mut controller = controller_for(&file, false, false);

    let err = controller.open_with_picker().await.unwrap_err();
    assert!(err.is_unsupported());
    assert_eq!(controller.state(), ViewState::Idle);

    controller.open_read_only("notes.md", "# A");
    assert_eq!(controller.state(), ViewState::Loaded);
    assert!(controller.is_read_only());
    assert_eq!(controller.content(), "# A");

    // Watch and reload are unavailable without a live handle.
    assert_eq!(controller.toggle_watch(), ViewState::Loaded);
    controller.reload().await.unwrap();
    let notices = controller.take_notices();
    assert!(notices.contains(&Notice::ReloadUnavailable));
    assert!(
        notices
            .iter()
            .any(|notice| matches!(notice, Notice::WatchUnavailable { .. }))
    );
}

#[tokio::test]
async fn test_cancelled_picker_reads_nothing() {
    let file = MemoryFile::new("notes.md", "# A", 50);
    let mut controller = controller_for(&file, true, true);

    assert!(!controller.open_with_picker().await.unwrap());
    assert_eq!(controller.state(), ViewState::Idle);
    assert_eq!(controller.file_name(), None);
    assert_eq!(file.reads.load(Ordering::SeqCst), 0);
    assert!(controller.take_notices().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_open_watch_and_follow_changes() {
    let file = MemoryFile::new("notes.md", "# A", 50);
    let mut controller = controller_for(&file, true, false);

    assert!(controller.open_with_picker().await.unwrap());
    assert_eq!(controller.state(), ViewState::Watching);
    assert_eq!(controller.file_name(), Some("notes.md"));
    assert_eq!(controller.content(), "# A");

    // Lands before the poll task has run once.
    file.write("# B", 100);
    let change = next_change(&mut controller).await;
    assert_eq!(change.content, "# B");
    assert_eq!(controller.content(), "# B");
    assert!(
        controller
            .take_notices()
            .contains(&Notice::ContentUpdated { last_modified: 100 })
    );
}

#[tokio::test(start_paused = true)]
async fn test_change_queued_before_toggle_off_is_ignored() {
    let file = MemoryFile::new("notes.md", "# A", 50);
    let mut controller = controller_for(&file, true, false);
    controller.open_with_picker().await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    // Poll delivers into the queue; the view has not consumed it yet.
    file.write("# B", 100);
    tokio::time::sleep(Duration::from_millis(1000)).await;

    assert_eq!(controller.toggle_watch(), ViewState::Loaded);
    assert_eq!(controller.apply_pending(), 0);
    assert_eq!(controller.content(), "# A");

    // Re-enabling starts a fresh watch; the old change stays dropped.
    assert_eq!(controller.toggle_watch(), ViewState::Watching);
    assert_eq!(controller.apply_pending(), 0);
    assert_eq!(controller.content(), "# A");
    tokio::time::sleep(Duration::from_millis(10)).await;

    file.write("# C", 200);
    let change = next_change(&mut controller).await;
    assert_eq!(change.content, "# C");
    assert_eq!(controller.content(), "# C");
}

#[tokio::test]
async fn test_failed_open_keeps_current_file() {
    let first = MemoryFile::new("first.md", "# First", 50);
    let mut controller = controller_for(&first, true, false);
    controller.open_with_picker().await.unwrap();
    controller.take_notices();

    let broken = MemoryFile::new("broken.md", "", 50);
    broken.failing.store(true, Ordering::SeqCst);
    let err = controller
        .open(FileMetadata {
            name: "broken.md".to_string(),
            path: None,
            handle: BrowserHandle::new(broken as Arc<dyn CapabilityFile>).into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, FileError::Read { .. }));

    assert_eq!(controller.file_name(), Some("first.md"));
    assert_eq!(controller.content(), "# First");
    assert_eq!(controller.state(), ViewState::Watching);
    assert!(matches!(
        controller.take_notices().as_slice(),
        [Notice::ReadFailed { .. }]
    ));
}

#[tokio::test]
async fn test_reload_reads_current_content() {
    let file = MemoryFile::new("notes.md", "# A", 50);
    let mut controller = controller_for(&file, true, false);
    controller.open_with_picker().await.unwrap();
    controller.toggle_watch();

    file.write("# B", 100);
    controller.reload().await.unwrap();
    assert_eq!(controller.content(), "# B");
    assert_eq!(controller.state(), ViewState::Loaded);

    file.failing.store(true, Ordering::SeqCst);
    assert!(controller.reload().await.is_err());
    assert_eq!(controller.content(), "# B");
}

#[tokio::test]
async fn test_dropped_items() {
    let file = MemoryFile::new("notes.md", "# A", 50);
    let mut controller = controller_for(&file, true, false);

    assert!(
        !controller
            .open_dropped("photo.png", String::new(), None)
            .await
            .unwrap()
    );
    assert_eq!(controller.state(), ViewState::Idle);
    let notice = controller.take_notices().remove(0);
    assert_eq!(notice.to_string(), "Please drop a Markdown file");

    assert!(
        controller
            .open_dropped("dropped.md", "# Dropped".to_string(), None)
            .await
            .unwrap()
    );
    assert!(controller.is_read_only());
    assert_eq!(controller.content(), "# Dropped");

    let handle = BrowserHandle::new(Arc::clone(&file) as Arc<dyn CapabilityFile>).into();
    assert!(
        controller
            .open_dropped("notes.md", String::new(), Some(handle))
            .await
            .unwrap()
    );
    assert!(!controller.is_read_only());
    assert_eq!(controller.content(), "# A");
    assert_eq!(controller.state(), ViewState::Watching);
}
