//! File provider over capability-scoped handles.

use std::sync::Arc;

use async_trait::async_trait;

use super::host::{BrowserHandle, BrowserHost, PickerError, browser_handle};
use crate::error::FileError;
use crate::provider::FileProvider;
use crate::types::{FileHandle, FileInfo, FileMetadata, PickerFilter};

pub const FILE_SYSTEM_ACCESS: &str = "File System Access API";

pub struct BrowserFileProvider {
    host: Arc<dyn BrowserHost>,
    filter: PickerFilter,
}

impl BrowserFileProvider {
    pub fn new(host: Arc<dyn BrowserHost>) -> Self {
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
impl FileProvider for BrowserFileProvider {
    async fn open_file_picker(&self) -> Result<Option<FileMetadata>, FileError> {
        if !self.host.supports_file_system_access() {
            return Err(FileError::UnsupportedCapability {
                capability: FILE_SYSTEM_ACCESS,
            });
        }

        match self.host.show_open_file_picker(&self.filter).await {
            Ok(file) => {
                let name = file.name();
                crate::debug_event!("browser", "picked", "{name}");
                Ok(Some(FileMetadata {
                    name,
                    path: None,
                    handle: FileHandle::Browser(BrowserHandle::new(file)),
                }))
            }
            Err(PickerError::Aborted) => {
                crate::debug_event!("browser", "picker cancelled");
                Ok(None)
            }
            Err(PickerError::NotAllowed(reason)) | Err(PickerError::Failed(reason)) => {
                Err(FileError::Picker { reason })
            }
        }
    }

    async fn read_file(&self, handle: &FileHandle) -> Result<String, FileError> {
        let file = browser_handle(handle)?.file();
        let bytes = file.read_bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn supports_watching(&self) -> bool {
        self.host.supports_file_system_access()
    }

    async fn get_file_metadata(&self, handle: &FileHandle) -> Result<FileInfo, FileError> {
        let file = browser_handle(handle)?.file();
        let last_modified = file.last_modified().await?;
        Ok(FileInfo {
            name: file.name(),
            path: None,
            last_modified: Some(last_modified),
        })
    }

    async fn is_file_accessible(&self, handle: &FileHandle) -> bool {
        match browser_handle(handle) {
            Ok(handle) => handle.file().last_modified().await.is_ok(),
            Err(_) => false,
        }
    }
}
