//! Message channel between the UI process and the privileged host.
//!
//! Requests are invoke-style (with a reply) or fire-and-forget signals.
//! Host events travel on a single push channel shared by every active
//! watch; the renderer side demultiplexes by `handle_path`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Duration;

use crate::error::FileError;

/// Answer to an open-dialog request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenFileResult {
    pub file_path: PathBuf,
    pub name: String,
}

/// Push envelope for an accepted change on the host side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileChangedPayload {
    pub handle_path: PathBuf,
    pub content: String,
    pub last_modified: u64,
}

/// Push envelope for a watch the host could not start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchFailedPayload {
    pub handle_path: PathBuf,
    pub reason: String,
}

/// Everything the host pushes without being asked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum HostPush {
    FileChanged(FileChangedPayload),
    WatchFailed(WatchFailedPayload),
}

impl HostPush {
    pub fn handle_path(&self) -> &Path {
        match self {
            HostPush::FileChanged(payload) => &payload.handle_path,
            HostPush::WatchFailed(payload) => &payload.handle_path,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStat {
    pub size: u64,
    pub last_modified: u64,
}

type Reply<T> = oneshot::Sender<Result<T, FileError>>;

/// Messages from the UI process to the host.
#[derive(Debug)]
pub enum HostRequest {
    OpenDialog { reply: Reply<Option<OpenFileResult>> },
    ReadFile { path: PathBuf, reply: Reply<String> },
    Stat { path: PathBuf, reply: Reply<FileStat> },
    /// Fire-and-forget. A failure comes back as `HostPush::WatchFailed`.
    WatchStart { path: PathBuf, debounce: Duration },
    /// Fire-and-forget.
    WatchStop { path: PathBuf },
}

/// Create a connected host/renderer pair.
pub fn channel() -> (HostEndpoint, RendererEndpoint) {
    let (request_tx, request_rx) = mpsc::unbounded_channel();
    let (push_tx, push_rx) = mpsc::unbounded_channel();
    (
        HostEndpoint {
            requests: request_rx,
            push: push_tx,
        },
        RendererEndpoint {
            client: HostClient {
                requests: request_tx,
            },
            pushed: push_rx,
        },
    )
}

/// The privileged side of the channel.
#[derive(Debug)]
pub struct HostEndpoint {
    requests: mpsc::UnboundedReceiver<HostRequest>,
    push: mpsc::UnboundedSender<HostPush>,
}

impl HostEndpoint {
    pub fn into_parts(
        self,
    ) -> (
        mpsc::UnboundedReceiver<HostRequest>,
        mpsc::UnboundedSender<HostPush>,
    ) {
        (self.requests, self.push)
    }
}

/// The UI side of the channel.
#[derive(Debug)]
pub struct RendererEndpoint {
    pub client: HostClient,
    pub pushed: mpsc::UnboundedReceiver<HostPush>,
}

/// Cheap, cloneable request sender.
#[derive(Debug, Clone)]
pub struct HostClient {
    requests: mpsc::UnboundedSender<HostRequest>,
}

impl HostClient {
    async fn invoke<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> HostRequest,
    ) -> Result<T, FileError> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(make(reply))
            .map_err(|_| FileError::ChannelClosed)?;
        response.await.map_err(|_| FileError::ChannelClosed)?
    }

    pub async fn open_dialog(&self) -> Result<Option<OpenFileResult>, FileError> {
        self.invoke(|reply| HostRequest::OpenDialog { reply }).await
    }

    pub async fn read_file(&self, path: &Path) -> Result<String, FileError> {
        let path = path.to_path_buf();
        self.invoke(|reply| HostRequest::ReadFile { path, reply })
            .await
    }

    pub async fn stat(&self, path: &Path) -> Result<FileStat, FileError> {
        let path = path.to_path_buf();
        self.invoke(|reply| HostRequest::Stat { path, reply }).await
    }

    /// Ask the host to start watching. Only fails if the host is gone.
    pub fn watch_start(&self, path: &Path, debounce: Duration) -> Result<(), FileError> {
        self.requests
            .send(HostRequest::WatchStart {
                path: path.to_path_buf(),
                debounce,
            })
            .map_err(|_| FileError::watch_setup(path.display().to_string(), "host is gone"))
    }

    /// Ask the host to stop watching. A missing host has nothing to stop.
    pub fn watch_stop(&self, path: &Path) {
        let _ = self.requests.send(HostRequest::WatchStop {
            path: path.to_path_buf(),
        });
    }
}
