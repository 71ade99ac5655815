//! File provider that forwards every operation to the privileged host.

use async_trait::async_trait;

use super::ipc::HostClient;
use super::{DesktopHandle, desktop_handle};
use crate::error::FileError;
use crate::provider::FileProvider;
use crate::types::{FileHandle, FileInfo, FileMetadata, file_name_of};

pub struct DesktopFileProvider {
    client: HostClient,
}

impl DesktopFileProvider {
    pub fn new(client: HostClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FileProvider for DesktopFileProvider {
    async fn open_file_picker(&self) -> Result<Option<FileMetadata>, FileError> {
        let Some(picked) = self.client.open_dialog().await? else {
            crate::debug_event!("desktop", "dialog cancelled");
            return Ok(None);
        };

        crate::debug_event!("desktop", "picked", "{}", picked.file_path.display());
        Ok(Some(FileMetadata {
            name: picked.name,
            path: Some(picked.file_path.clone()),
            handle: FileHandle::Desktop(DesktopHandle::new(picked.file_path)),
        }))
    }

    async fn read_file(&self, handle: &FileHandle) -> Result<String, FileError> {
        let handle = desktop_handle(handle)?;
        self.client.read_file(handle.path()).await
    }

    fn supports_watching(&self) -> bool {
        true
    }

    async fn get_file_metadata(&self, handle: &FileHandle) -> Result<FileInfo, FileError> {
        let path = desktop_handle(handle)?.path();
        let stat = self.client.stat(path).await?;
        Ok(FileInfo {
            name: file_name_of(path),
            path: Some(path.to_path_buf()),
            last_modified: Some(stat.last_modified),
        })
    }

    async fn is_file_accessible(&self, handle: &FileHandle) -> bool {
        match desktop_handle(handle) {
            Ok(handle) => self.client.stat(handle.path()).await.is_ok(),
            Err(_) => false,
        }
    }
}
