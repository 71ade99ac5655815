//! File access capability shared by all hosts.

use async_trait::async_trait;

use crate::error::FileError;
use crate::types::{FileHandle, FileInfo, FileMetadata};

/// Open, read and inspect files on the current host.
///
/// One implementation per host. All of them honor the same contract:
///
/// - `open_file_picker` returns `Ok(None)` exactly when the user cancels.
/// - `read_file` decodes bytes as UTF-8 text.
/// - `supports_watching` never touches the filesystem.
/// - `is_file_accessible` never fails.
#[async_trait]
pub trait FileProvider: Send + Sync {
    /// Show the host's file-selection surface, restricted to markdown/text files.
    async fn open_file_picker(&self) -> Result<Option<FileMetadata>, FileError>;

    /// Read the current contents of the file behind `handle`.
    async fn read_file(&self, handle: &FileHandle) -> Result<String, FileError>;

    /// Whether a live watch can be attached on this host.
    fn supports_watching(&self) -> bool;

    /// Side-effect-free inspection.
    async fn get_file_metadata(&self, handle: &FileHandle) -> Result<FileInfo, FileError>;

    /// Whether the handle still refers to a readable file.
    async fn is_file_accessible(&self, handle: &FileHandle) -> bool;
}
