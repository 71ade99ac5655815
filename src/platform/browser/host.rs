//! Primitives a sandboxed browser-like host exposes.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::FileError;
use crate::types::{FileHandle, PickerFilter};

/// A capability-scoped file: read current bytes, read current modification
/// time, nothing else. The filesystem path is never disclosed.
#[async_trait]
pub trait CapabilityFile: Send + Sync {
    fn name(&self) -> String;

    async fn read_bytes(&self) -> Result<Vec<u8>, FileError>;

    /// Modification time in milliseconds since the Unix epoch.
    async fn last_modified(&self) -> Result<u64, FileError>;
}

/// Why the picker did not produce a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickerError {
    /// The user dismissed the picker.
    Aborted,
    /// The host refused (permissions, no user activation).
    NotAllowed(String),
    Failed(String),
}

/// The host's file-selection surface.
#[async_trait]
pub trait BrowserHost: Send + Sync {
    /// Whether capability handles can be obtained at all.
    fn supports_file_system_access(&self) -> bool;

    async fn show_open_file_picker(
        &self,
        filter: &PickerFilter,
    ) -> Result<Arc<dyn CapabilityFile>, PickerError>;
}

/// Handle variant issued by the browser provider. Equality is object identity.
#[derive(Clone)]
pub struct BrowserHandle {
    file: Arc<dyn CapabilityFile>,
}

impl BrowserHandle {
    /// Wrap a capability obtained outside the picker (e.g., a dropped item).
    pub fn new(file: Arc<dyn CapabilityFile>) -> Self {
        Self { file }
    }

    pub(crate) fn file(&self) -> &Arc<dyn CapabilityFile> {
        &self.file
    }

    /// Address of the capability object, stable while any clone is alive.
    pub(crate) fn identity(&self) -> usize {
        Arc::as_ptr(&self.file) as *const () as usize
    }
}

impl PartialEq for BrowserHandle {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for BrowserHandle {}

impl fmt::Debug for BrowserHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BrowserHandle").field(&self.file.name()).finish()
    }
}

impl From<BrowserHandle> for FileHandle {
    fn from(handle: BrowserHandle) -> Self {
        FileHandle::Browser(handle)
    }
}

pub(crate) fn browser_handle(handle: &FileHandle) -> Result<&BrowserHandle, FileError> {
    match handle {
        FileHandle::Browser(handle) => Ok(handle),
        _ => Err(FileError::ForeignHandle {
            expected: "browser",
        }),
    }
}
