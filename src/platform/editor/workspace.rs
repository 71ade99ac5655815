//! In-process editor document model.
//!
//! Tracks open buffers over the local filesystem. Edits bump the version,
//! mark the buffer dirty and broadcast a change event; saves write the
//! buffer back to disk.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::broadcast;

use super::host::{DocumentUri, EditorHost, TextDocument};
use crate::error::FileError;
use crate::platform::dialog::FileDialog;
use crate::types::{PickerFilter, millis_since_epoch};
use crate::watch::{FsEventSource, FsGuard, FsSink};

const CHANGE_CAPACITY: usize = 64;

struct Buffer {
    text: String,
    version: u64,
    dirty: bool,
}

pub struct Document {
    uri: DocumentUri,
    buffer: RwLock<Buffer>,
}

impl TextDocument for Document {
    fn uri(&self) -> DocumentUri {
        self.uri.clone()
    }

    fn text(&self) -> String {
        self.buffer.read().text.clone()
    }

    fn version(&self) -> u64 {
        self.buffer.read().version
    }

    fn is_dirty(&self) -> bool {
        self.buffer.read().dirty
    }
}

pub struct Workspace {
    dialog: Arc<dyn FileDialog>,
    events: Arc<dyn FsEventSource>,
    documents: DashMap<DocumentUri, Arc<Document>>,
    changes: broadcast::Sender<DocumentUri>,
}

impl Workspace {
    pub fn new(dialog: Arc<dyn FileDialog>, events: Arc<dyn FsEventSource>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            dialog,
            events,
            documents: DashMap::new(),
            changes,
        }
    }

    /// Open `uri` in a buffer, loading it from disk. Opening twice returns
    /// the existing buffer.
    pub async fn open(&self, uri: &DocumentUri) -> Result<Arc<dyn TextDocument>, FileError> {
        if let Some(document) = self.documents.get(uri) {
            return Ok(Arc::clone(document.value()) as Arc<dyn TextDocument>);
        }

        let bytes = self.read_bytes(uri).await?;
        let document = Arc::new(Document {
            uri: uri.clone(),
            buffer: RwLock::new(Buffer {
                text: String::from_utf8_lossy(&bytes).into_owned(),
                version: 1,
                dirty: false,
            }),
        });
        let document = Arc::clone(
            self.documents
                .entry(uri.clone())
                .or_insert(document)
                .value(),
        );
        crate::debug_event!("workspace", "opened", "{uri}");
        Ok(document as Arc<dyn TextDocument>)
    }

    /// Replace the buffer text. Returns the new version, or `None` when the
    /// document is not open.
    pub fn edit(&self, uri: &DocumentUri, text: impl Into<String>) -> Option<u64> {
        let document = self.documents.get(uri).map(|entry| Arc::clone(entry.value()))?;
        let version = {
            let mut buffer = document.buffer.write();
            buffer.text = text.into();
            buffer.version += 1;
            buffer.dirty = true;
            buffer.version
        };
        // No receivers is fine
        let _ = self.changes.send(uri.clone());
        Some(version)
    }

    /// Write the buffer back to disk.
    pub async fn save(&self, uri: &DocumentUri) -> Result<(), FileError> {
        let document = self
            .documents
            .get(uri)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| FileError::read(uri.to_string(), "document is not open"))?;
        let path = disk_path(uri)?;
        let text = document.text();
        tokio::fs::write(&path, text)
            .await
            .map_err(|e| FileError::read(uri.to_string(), e))?;
        document.buffer.write().dirty = false;
        crate::debug_event!("workspace", "saved", "{uri}");
        Ok(())
    }

    /// Close the buffer, discarding unsaved edits.
    pub fn close(&self, uri: &DocumentUri) -> bool {
        let closed = self.documents.remove(uri).is_some();
        if closed {
            crate::debug_event!("workspace", "closed", "{uri}");
        }
        closed
    }
}

fn disk_path(uri: &DocumentUri) -> Result<PathBuf, FileError> {
    uri.fs_path()
        .ok_or_else(|| FileError::read(uri.to_string(), "not a file:// document"))
}

#[async_trait]
impl EditorHost for Workspace {
    async fn show_open_dialog(
        &self,
        filter: &PickerFilter,
    ) -> Result<Option<DocumentUri>, FileError> {
        let picked = self.dialog.pick_file(filter).await?;
        Ok(picked.map(|path| DocumentUri::from_path(&path)))
    }

    fn open_document(&self, uri: &DocumentUri) -> Option<Arc<dyn TextDocument>> {
        self.documents
            .get(uri)
            .map(|entry| Arc::clone(entry.value()) as Arc<dyn TextDocument>)
    }

    fn document_changes(&self) -> broadcast::Receiver<DocumentUri> {
        self.changes.subscribe()
    }

    fn create_file_watcher(&self, uri: &DocumentUri, sink: FsSink) -> Result<FsGuard, FileError> {
        let path = uri
            .fs_path()
            .ok_or_else(|| FileError::watch_setup(uri.to_string(), "not a file:// document"))?;
        self.events.subscribe(&path, sink)
    }

    async fn read_bytes(&self, uri: &DocumentUri) -> Result<Vec<u8>, FileError> {
        let path = disk_path(uri)?;
        tokio::fs::read(&path)
            .await
            .map_err(|e| FileError::read(uri.to_string(), e))
    }

    async fn stat(&self, uri: &DocumentUri) -> Result<u64, FileError> {
        let path = disk_path(uri)?;
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| FileError::read(uri.to_string(), e))?;
        let modified = metadata
            .modified()
            .map_err(|e| FileError::read(uri.to_string(), e))?;
        Ok(millis_since_epoch(modified))
    }
}
