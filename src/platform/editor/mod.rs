//! Editor host: documents may be open in buffers with unsaved edits.

mod host;
mod provider;
mod watcher;
mod workspace;

pub use host::{DocumentUri, EditorHandle, EditorHost, TextDocument};
pub use provider::EditorFileProvider;
pub use watcher::EditorFileWatcher;
pub use workspace::{Document, Workspace};
