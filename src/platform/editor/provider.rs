//! File provider over editor documents.
//!
//! Reads prefer the in-memory buffer: when the document is open in the
//! editor, its text (possibly unsaved) is what the viewer should render.

use std::sync::Arc;

use async_trait::async_trait;

use super::host::{EditorHandle, EditorHost, editor_handle};
use crate::error::FileError;
use crate::provider::FileProvider;
use crate::types::{FileHandle, FileInfo, FileMetadata, PickerFilter};

pub struct EditorFileProvider {
    host: Arc<dyn EditorHost>,
    filter: PickerFilter,
}

impl EditorFileProvider {
    pub fn new(host: Arc<dyn EditorHost>) -> Self {
        Self {
            host,
            filter: PickerFilter::default(),
        }
    }

    pub fn with_filter(mut self, filter: PickerFilter) -> Self {
        self.filter = filter;
        self
    }
}

#[async_trait]
impl FileProvider for EditorFileProvider {
    async fn open_file_picker(&self) -> Result<Option<FileMetadata>, FileError> {
        let Some(uri) = self.host.show_open_dialog(&self.filter).await? else {
            crate::debug_event!("editor", "dialog cancelled");
            return Ok(None);
        };

        crate::debug_event!("editor", "picked", "{uri}");
        Ok(Some(FileMetadata {
            name: uri.file_name(),
            path: uri.fs_path(),
            handle: FileHandle::Editor(EditorHandle::new(uri)),
        }))
    }

    async fn read_file(&self, handle: &FileHandle) -> Result<String, FileError> {
        let uri = editor_handle(handle)?.uri();
        if let Some(document) = self.host.open_document(uri) {
            return Ok(document.text());
        }
        let bytes = self.host.read_bytes(uri).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn supports_watching(&self) -> bool {
        true
    }

    async fn get_file_metadata(&self, handle: &FileHandle) -> Result<FileInfo, FileError> {
        let uri = editor_handle(handle)?.uri();
        let last_modified = self.host.stat(uri).await?;
        Ok(FileInfo {
            name: uri.file_name(),
            path: uri.fs_path(),
            last_modified: Some(last_modified),
        })
    }

    async fn is_file_accessible(&self, handle: &FileHandle) -> bool {
        let Ok(handle) = editor_handle(handle) else {
            return false;
        };
        self.host.open_document(handle.uri()).is_some() || self.host.stat(handle.uri()).await.is_ok()
    }
}
