//! Desktop host: a privileged process with full filesystem access, reached
//! over a typed message channel.

mod host;
pub mod ipc;
mod provider;
mod watcher;

use std::path::{Path, PathBuf};

use crate::error::FileError;
use crate::types::FileHandle;

pub use host::DesktopHost;
pub use ipc::{
    FileChangedPayload, HostClient, HostPush, HostRequest, RendererEndpoint, WatchFailedPayload,
};
pub use provider::DesktopFileProvider;
pub use watcher::DesktopFileWatcher;

/// Handle variant issued by the desktop provider. Equality is path equality.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DesktopHandle {
    path: PathBuf,
}

impl DesktopHandle {
    /// Wrap a path the host pushed on its own (menu open, command line).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

impl From<DesktopHandle> for FileHandle {
    fn from(handle: DesktopHandle) -> Self {
        FileHandle::Desktop(handle)
    }
}

pub(crate) fn desktop_handle(handle: &FileHandle) -> Result<&DesktopHandle, FileError> {
    match handle {
        FileHandle::Desktop(handle) => Ok(handle),
        _ => Err(FileError::ForeignHandle {
            expected: "desktop",
        }),
    }
}
