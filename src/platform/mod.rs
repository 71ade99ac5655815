//! Host strategies and the composition root that selects one.
//!
//! Each host contributes a `FileProvider` + `FileWatcher` pair. Callers pick
//! one pair explicitly at startup and pass it down; nothing here is global.

pub mod browser;
pub mod desktop;
pub mod dialog;
pub mod editor;

use std::fmt;
use std::sync::Arc;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tokio::time::Duration;

use crate::config::Settings;
use crate::error::FileError;
use crate::provider::FileProvider;
use crate::types::PickerFilter;
use crate::watch::{FileWatcher, FsEventSource, NotifyEventSource, runtime_for};

use browser::{BrowserFileProvider, BrowserFileWatcher, BrowserHost, FsCapabilityHost};
use desktop::{DesktopFileProvider, DesktopFileWatcher, DesktopHost};
use dialog::FileDialog;
use editor::{EditorFileProvider, EditorFileWatcher, EditorHost, Workspace};

/// Which host strategy to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum HostKind {
    #[default]
    Desktop,
    Browser,
    Editor,
}

impl fmt::Display for HostKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HostKind::Desktop => "desktop",
            HostKind::Browser => "browser",
            HostKind::Editor => "editor",
        })
    }
}

/// A provider/watcher pair for one host.
#[derive(Clone)]
pub struct Platform {
    pub kind: HostKind,
    pub provider: Arc<dyn FileProvider>,
    pub watcher: Arc<dyn FileWatcher>,
}

impl fmt::Debug for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Platform").field("kind", &self.kind).finish()
    }
}

impl Platform {
    pub fn browser(host: Arc<dyn BrowserHost>, filter: PickerFilter) -> Self {
        Self {
            kind: HostKind::Browser,
            provider: Arc::new(BrowserFileProvider::new(host).with_filter(filter)),
            watcher: Arc::new(BrowserFileWatcher::new()),
        }
    }

    /// Spawn the privileged host on the current runtime and connect to it.
    pub fn desktop(
        dialog: Arc<dyn FileDialog>,
        events: Arc<dyn FsEventSource>,
        settle: Duration,
        filter: PickerFilter,
    ) -> Result<Self, FileError> {
        let runtime = runtime_for("desktop host")?;
        let (host, renderer) = desktop::ipc::channel();
        let host = DesktopHost::new(host, dialog, events)
            .settle(settle)
            .filter(filter);
        runtime.spawn(host.run());

        let watcher = DesktopFileWatcher::new(renderer.client.clone(), renderer.pushed)?;
        Ok(Self {
            kind: HostKind::Desktop,
            provider: Arc::new(DesktopFileProvider::new(renderer.client)),
            watcher: Arc::new(watcher),
        })
    }

    pub fn editor(host: Arc<dyn EditorHost>, filter: PickerFilter) -> Self {
        Self {
            kind: HostKind::Editor,
            provider: Arc::new(EditorFileProvider::new(Arc::clone(&host)).with_filter(filter)),
            watcher: Arc::new(EditorFileWatcher::new(host)),
        }
    }

    /// Build the pair named by `settings.host`, backed by the local
    /// filesystem and `dialog`.
    pub fn from_settings(
        settings: &Settings,
        dialog: Arc<dyn FileDialog>,
    ) -> Result<Self, FileError> {
        let filter = settings.picker.clone();
        let platform = match settings.host {
            HostKind::Desktop => Self::desktop(
                dialog,
                Arc::new(NotifyEventSource::new()),
                settings.watch.settle(),
                filter,
            )?,
            HostKind::Browser => {
                let mut host = FsCapabilityHost::new(dialog);
                if !settings.browser.file_system_access {
                    host = host.without_file_system_access();
                }
                Self::browser(Arc::new(host), filter)
            }
            HostKind::Editor => {
                let workspace = Workspace::new(dialog, Arc::new(NotifyEventSource::new()));
                Self::editor(Arc::new(workspace), filter)
            }
        };
        crate::debug_event!("platform", "selected", "{}", platform.kind);
        Ok(platform)
    }
}
