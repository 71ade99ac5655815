//! Live file access for a markdown viewer across browser, desktop and
//! editor hosts.
//!
//! One `FileProvider` + `FileWatcher` pair per host, all with the same
//! contract; [`controller::LiveReloadController`] drives a view from either.

pub mod cli;
pub mod config;
pub mod controller;
pub mod error;
pub mod logging;
pub mod platform;
pub mod provider;
pub mod types;
pub mod watch;

pub use config::Settings;
pub use controller::{LiveReloadController, Notice, ViewState, WatchEvent};
pub use error::FileError;
pub use platform::{HostKind, Platform};
pub use provider::FileProvider;
pub use types::{
    ChangeNotification, FileHandle, FileInfo, FileMetadata, PickerFilter, WatchOptions,
    is_markdown_file,
};
pub use watch::{FailureCallback, FileWatcher, Subscription, SubscriptionId, on_change, on_failure};
