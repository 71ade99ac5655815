//! Browser-tab host: capability-scoped handles, polling for changes.

mod host;
mod provider;
mod sandbox;
mod watcher;

pub use host::{BrowserHandle, BrowserHost, CapabilityFile, PickerError};
pub use provider::{BrowserFileProvider, FILE_SYSTEM_ACCESS};
pub use sandbox::{FsCapabilityFile, FsCapabilityHost};
pub use watcher::BrowserFileWatcher;
