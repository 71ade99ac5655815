//! Error types for file access and live-reload operations.
//!
//! Cancellation is not an error: pickers return `Ok(None)` when the user
//! dismisses them. Everything here is recoverable by the caller.

use thiserror::Error;

/// Errors from providers and watchers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FileError {
    /// The host lacks a native primitive this operation needs.
    #[error("{capability} is not supported in this environment")]
    UnsupportedCapability { capability: &'static str },

    /// The file could not be read (deleted, moved, permission revoked).
    #[error("Cannot read {target}: {reason}")]
    Read { target: String, reason: String },

    /// The native watch primitive could not be attached.
    #[error("Cannot watch {target}: {reason}")]
    WatchSetup { target: String, reason: String },

    /// The file-selection surface failed for a reason other than cancellation.
    #[error("File picker failed: {reason}")]
    Picker { reason: String },

    /// A handle issued by a different host was passed in.
    #[error("Handle was not issued by the {expected} host")]
    ForeignHandle { expected: &'static str },

    /// The privileged host process is gone.
    #[error("Host channel closed unexpectedly")]
    ChannelClosed,
}

impl FileError {
    pub(crate) fn read(target: impl Into<String>, reason: impl ToString) -> Self {
        FileError::Read {
            target: target.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn watch_setup(target: impl Into<String>, reason: impl ToString) -> Self {
        FileError::WatchSetup {
            target: target.into(),
            reason: reason.to_string(),
        }
    }

    /// True for errors that should force the UI into a no-watch, read-only mode.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, FileError::UnsupportedCapability { .. })
    }
}

impl From<notify::Error> for FileError {
    fn from(e: notify::Error) -> Self {
        let target = e
            .paths
            .first()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<unknown>".to_string());
        FileError::WatchSetup {
            target,
            reason: e.to_string(),
        }
    }
}
