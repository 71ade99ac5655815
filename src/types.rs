//! Core data model shared by every host: handles, metadata, notifications.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::platform::browser::BrowserHandle;
use crate::platform::desktop::DesktopHandle;
use crate::platform::editor::EditorHandle;

/// Default poll interval for hosts without change notifications.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Default coalescing window for event-based hosts.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Default write-settle threshold for OS-level change events.
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(100);

/// Shortest poll interval a watch will run with.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Upper bound for poll intervals, debounce windows and settle thresholds.
pub const MAX_WATCH_WINDOW: Duration = Duration::from_secs(60 * 60);

/// Opaque token identifying an open file.
///
/// Only the provider/watcher pair that issued a handle interprets it.
/// Generic code passes it back untouched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileHandle {
    /// Capability-scoped handle, no path disclosure.
    Browser(BrowserHandle),
    /// Absolute filesystem path owned by the privileged process.
    Desktop(DesktopHandle),
    /// Editor document identifier.
    Editor(EditorHandle),
}

impl FileHandle {
    /// Name of the host variant, for logs and error messages.
    pub fn host_name(&self) -> &'static str {
        match self {
            FileHandle::Browser(_) => "browser",
            FileHandle::Desktop(_) => "desktop",
            FileHandle::Editor(_) => "editor",
        }
    }
}

/// Produced once at open time by `open_file_picker`.
#[derive(Clone, Debug)]
pub struct FileMetadata {
    pub name: String,
    /// Absent when the host cannot disclose a filesystem path.
    pub path: Option<PathBuf>,
    pub handle: FileHandle,
}

/// Result of `get_file_metadata`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<u64>,
}

/// An accepted change, delivered to `on_changed`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeNotification {
    pub content: String,
    /// Milliseconds since the Unix epoch.
    pub last_modified: u64,
}

/// Per-watch configuration.
///
/// `poll_interval` only affects polling hosts, `debounce` only event-based ones.
/// Both are clamped to `MIN_POLL_INTERVAL..=MAX_WATCH_WINDOW` when used.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WatchOptions {
    pub poll_interval: Option<Duration>,
    pub debounce: Option<Duration>,
    /// Suppress notifications whose timestamp advanced but whose bytes did not.
    pub skip_unchanged_content: bool,
    /// Modification time of the content the caller already shows.
    ///
    /// Installed as the stale-write baseline before `watch()` returns. Without
    /// it the first observed state counts as a change.
    pub since: Option<u64>,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            poll_interval: None,
            debounce: None,
            skip_unchanged_content: true,
            since: None,
        }
    }
}

impl WatchOptions {
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn debounce(mut self, window: Duration) -> Self {
        self.debounce = Some(window);
        self
    }

    pub fn skip_unchanged_content(mut self, skip: bool) -> Self {
        self.skip_unchanged_content = skip;
        self
    }

    pub fn since(mut self, last_modified: u64) -> Self {
        self.since = Some(last_modified);
        self
    }

    pub fn effective_poll_interval(&self) -> Duration {
        self.poll_interval
            .unwrap_or(DEFAULT_POLL_INTERVAL)
            .clamp(MIN_POLL_INTERVAL, MAX_WATCH_WINDOW)
    }

    pub fn effective_debounce(&self) -> Duration {
        self.debounce.unwrap_or(DEFAULT_DEBOUNCE).min(MAX_WATCH_WINDOW)
    }
}

/// Extension filter shown by file-selection surfaces.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickerFilter {
    pub description: String,
    pub extensions: Vec<String>,
}

impl Default for PickerFilter {
    fn default() -> Self {
        Self {
            description: "Markdown Files".to_string(),
            extensions: vec!["md".to_string(), "markdown".to_string(), "txt".to_string()],
        }
    }
}

impl PickerFilter {
    /// Case-insensitive extension match on a file name.
    pub fn matches(&self, name: &str) -> bool {
        Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                self.extensions
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(ext))
            })
    }
}

/// True for `.md`, `.markdown` and `.txt` names.
pub fn is_markdown_file(name: &str) -> bool {
    PickerFilter::default().matches(name)
}

/// Final path component as a display name.
pub fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Milliseconds since the Unix epoch, clamped to zero for pre-epoch times.
pub fn millis_since_epoch(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

pub fn now_millis() -> u64 {
    millis_since_epoch(SystemTime::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_picker_filter_matches() {
        let filter = PickerFilter::default();
        assert!(filter.matches("notes.md"));
        assert!(filter.matches("README.MARKDOWN"));
        assert!(filter.matches("todo.txt"));
        assert!(!filter.matches("image.png"));
        assert!(!filter.matches("Makefile"));
    }

    #[test]
    fn test_is_markdown_file() {
        assert!(is_markdown_file("a.md"));
        assert!(!is_markdown_file("a.mdx"));
    }

    #[test]
    fn test_watch_options_defaults() {
        let options = WatchOptions::default();
        assert_eq!(options.effective_poll_interval(), Duration::from_millis(1000));
        assert_eq!(options.effective_debounce(), Duration::from_millis(300));
        assert!(options.skip_unchanged_content);

        let options = WatchOptions::default().debounce(Duration::from_millis(50));
        assert_eq!(options.effective_debounce(), Duration::from_millis(50));
        assert_eq!(options.since, None);
        assert_eq!(WatchOptions::default().since(50).since, Some(50));
    }

    #[test]
    fn test_watch_options_clamp_out_of_range_durations() {
        let options = WatchOptions::default()
            .poll_interval(Duration::ZERO)
            .debounce(Duration::MAX);
        assert_eq!(options.effective_poll_interval(), MIN_POLL_INTERVAL);
        assert_eq!(options.effective_debounce(), MAX_WATCH_WINDOW);

        let options = WatchOptions::default().poll_interval(Duration::from_secs(u64::MAX));
        assert_eq!(options.effective_poll_interval(), MAX_WATCH_WINDOW);
        assert_eq!(
            WatchOptions::default().debounce(Duration::ZERO).effective_debounce(),
            Duration::ZERO
        );
    }

    #[test]
    fn test_file_name_of() {
        assert_eq!(file_name_of(Path::new("/docs/notes.md")), "notes.md");
    }
}
