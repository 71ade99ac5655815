//! File-selection surfaces used by hosts that run outside a GUI.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader, Lines};

use crate::error::FileError;
use crate::types::PickerFilter;

/// A host-native "open file" surface. `Ok(None)` means the user cancelled.
#[async_trait]
pub trait FileDialog: Send + Sync {
    async fn pick_file(&self, filter: &PickerFilter) -> Result<Option<PathBuf>, FileError>;
}

/// Reject a choice whose file name the filter does not accept.
fn accept(path: PathBuf, filter: &PickerFilter) -> Result<PathBuf, FileError> {
    let name = path.file_name().map(|n| n.to_string_lossy().into_owned());
    if name.as_deref().is_some_and(|n| filter.matches(n)) {
        return Ok(path);
    }
    Err(FileError::Picker {
        reason: format!(
            "{} is not one of: {}",
            path.display(),
            filter.extensions.join(", ")
        ),
    })
}

/// Answers with a path chosen up front (command line argument), once.
/// Later calls behave like a cancelled dialog.
#[derive(Debug)]
pub struct PresetDialog {
    choice: Mutex<Option<PathBuf>>,
}

impl PresetDialog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            choice: Mutex::new(Some(path.into())),
        }
    }

    /// A dialog the user always cancels.
    pub fn cancelled() -> Self {
        Self {
            choice: Mutex::new(None),
        }
    }
}

#[async_trait]
impl FileDialog for PresetDialog {
    async fn pick_file(&self, filter: &PickerFilter) -> Result<Option<PathBuf>, FileError> {
        let choice = self.choice.lock().take();
        choice.map(|path| accept(path, filter)).transpose()
    }
}

type LineSource = Lines<BufReader<Box<dyn AsyncRead + Send + Unpin>>>;

/// Line reader over the terminal.
///
/// Stdin is buffered once for the whole process; the file prompt and the
/// command loop both read through this, so type-ahead is never dropped.
pub struct TerminalInput {
    lines: tokio::sync::Mutex<LineSource>,
}

impl TerminalInput {
    pub fn stdin() -> Arc<Self> {
        Self::from_reader(tokio::io::stdin())
    }

    pub fn from_reader(reader: impl AsyncRead + Send + Unpin + 'static) -> Arc<Self> {
        let reader: Box<dyn AsyncRead + Send + Unpin> = Box::new(reader);
        Arc::new(Self {
            lines: tokio::sync::Mutex::new(BufReader::new(reader).lines()),
        })
    }

    /// Next line without its terminator, `None` at end of input.
    ///
    /// Cancel-safe: usable as a `tokio::select!` arm.
    pub async fn next_line(&self) -> io::Result<Option<String>> {
        self.lines.lock().await.next_line().await
    }
}

/// Prompts for a path on the terminal. An empty line cancels.
pub struct PromptDialog {
    input: Arc<TerminalInput>,
}

impl PromptDialog {
    pub fn new(input: Arc<TerminalInput>) -> Self {
        Self { input }
    }
}

#[async_trait]
impl FileDialog for PromptDialog {
    async fn pick_file(&self, filter: &PickerFilter) -> Result<Option<PathBuf>, FileError> {
        let picker_err = |e: io::Error| FileError::Picker {
            reason: e.to_string(),
        };

        let mut stderr = tokio::io::stderr();
        let prompt = format!(
            "Open file ({}: {}): ",
            filter.description,
            filter.extensions.join(", ")
        );
        stderr.write_all(prompt.as_bytes()).await.map_err(picker_err)?;
        stderr.flush().await.map_err(picker_err)?;

        let Some(line) = self.input.next_line().await.map_err(picker_err)? else {
            return Ok(None);
        };
        let answer = line.trim();
        if answer.is_empty() {
            return Ok(None);
        }
        accept(PathBuf::from(answer), filter).map(Some)
    }
}
