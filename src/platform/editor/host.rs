//! Primitives an editor host exposes to an embedded viewer.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::FileError;
use crate::types::{FileHandle, PickerFilter};
use crate::watch::{FsGuard, FsSink};

const FILE_SCHEME: &str = "file://";

/// Editor document identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentUri(String);

impl DocumentUri {
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    pub fn from_path(path: &Path) -> Self {
        Self(format!("{FILE_SCHEME}{}", path.display()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Filesystem path for `file://` URIs.
    pub fn fs_path(&self) -> Option<PathBuf> {
        self.0.strip_prefix(FILE_SCHEME).map(PathBuf::from)
    }

    /// Last path segment.
    pub fn file_name(&self) -> String {
        self.0
            .rsplit('/')
            .find(|segment| !segment.is_empty())
            .unwrap_or(&self.0)
            .to_string()
    }
}

impl fmt::Display for DocumentUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An open document in the editor. Its text may differ from disk.
pub trait TextDocument: Send + Sync {
    fn uri(&self) -> DocumentUri;

    fn text(&self) -> String;

    fn version(&self) -> u64;

    /// True when the buffer has edits not yet saved.
    fn is_dirty(&self) -> bool;
}

#[async_trait]
pub trait EditorHost: Send + Sync {
    async fn show_open_dialog(
        &self,
        filter: &PickerFilter,
    ) -> Result<Option<DocumentUri>, FileError>;

    /// The open document for `uri`, if any.
    fn open_document(&self, uri: &DocumentUri) -> Option<Arc<dyn TextDocument>>;

    /// Buffer-change events for every open document.
    fn document_changes(&self) -> broadcast::Receiver<DocumentUri>;

    /// Native file-change signals for `uri`. Dropping the guard disposes them.
    fn create_file_watcher(&self, uri: &DocumentUri, sink: FsSink) -> Result<FsGuard, FileError>;

    async fn read_bytes(&self, uri: &DocumentUri) -> Result<Vec<u8>, FileError>;

    /// Modification time in milliseconds since the Unix epoch.
    async fn stat(&self, uri: &DocumentUri) -> Result<u64, FileError>;
}

/// Handle variant issued by the editor provider. Equality is URI equality.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EditorHandle {
    uri: DocumentUri,
}

impl EditorHandle {
    pub fn new(uri: DocumentUri) -> Self {
        Self { uri }
    }

    pub(crate) fn uri(&self) -> &DocumentUri {
        &self.uri
    }
}

impl From<EditorHandle> for FileHandle {
    fn from(handle: EditorHandle) -> Self {
        FileHandle::Editor(handle)
    }
}

pub(crate) fn editor_handle(handle: &FileHandle) -> Result<&EditorHandle, FileError> {
    match handle {
        FileHandle::Editor(handle) => Ok(handle),
        _ => Err(FileError::ForeignHandle { expected: "editor" }),
    }
}
