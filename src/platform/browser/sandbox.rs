//! Capability handles backed by local files.
//!
//! Emulates a sandboxed host on a normal filesystem: handles expose only the
//! file name, bytes and modification time, never the path.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use super::host::{BrowserHost, CapabilityFile, PickerError};
use crate::error::FileError;
use crate::platform::dialog::FileDialog;
use crate::types::{PickerFilter, file_name_of, millis_since_epoch};

pub struct FsCapabilityFile {
    path: PathBuf,
    name: String,
}

impl FsCapabilityFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = file_name_of(&path);
        Self { path, name }
    }
}

#[async_trait]
impl CapabilityFile for FsCapabilityFile {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn read_bytes(&self) -> Result<Vec<u8>, FileError> {
        tokio::fs::read(&self.path)
            .await
            .map_err(|e| FileError::read(&self.name, e))
    }

    async fn last_modified(&self) -> Result<u64, FileError> {
        let metadata = tokio::fs::metadata(&self.path)
            .await
            .map_err(|e| FileError::read(&self.name, e))?;
        let modified = metadata
            .modified()
            .map_err(|e| FileError::read(&self.name, e))?;
        Ok(millis_since_epoch(modified))
    }
}

pub struct FsCapabilityHost {
    dialog: Arc<dyn FileDialog>,
    file_system_access: bool,
}

impl FsCapabilityHost {
    pub fn new(dialog: Arc<dyn FileDialog>) -> Self {
        Self {
            dialog,
            file_system_access: true,
        }
    }

    /// Behave like a host without capability handles.
    pub fn without_file_system_access(mut self) -> Self {
        self.file_system_access = false;
        self
    }
}

#[async_trait]
impl BrowserHost for FsCapabilityHost {
    fn supports_file_system_access(&self) -> bool {
        self.file_system_access
    }

    async fn show_open_file_picker(
        &self,
        filter: &PickerFilter,
    ) -> Result<Arc<dyn CapabilityFile>, PickerError> {
        if !self.file_system_access {
            return Err(PickerError::NotAllowed(
                "capability handles are disabled".to_string(),
            ));
        }
        match self.dialog.pick_file(filter).await {
            Ok(Some(path)) => Ok(Arc::new(FsCapabilityFile::new(path))),
            Ok(None) => Err(PickerError::Aborted),
            Err(e) => Err(PickerError::Failed(e.to_string())),
        }
    }
}
