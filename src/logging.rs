//! Diagnostics for the viewer and its watchers.
//!
//! Every line goes to stderr as `HH:MM:SS.mmm LEVEL target: [component] event: detail`.
//! Components in use: `poll`, `host`, `desktop`, `editor`, `workspace`,
//! `guard`, `controller`, `view`, plus the registry names `browser`,
//! `desktop`, `editor` for subscription bookkeeping.
//!
//! # Configuration
//!
//! ```toml
//! [logging]
//! default = "warn"
//!
//! [logging.modules]
//! "mdlive::watch::registry" = "debug"     # register/replace/release
//! "mdlive::platform::desktop" = "info"    # pushed payloads
//! ```
//!
//! `RUST_LOG` replaces the whole configured filter when set:
//! ```bash
//! RUST_LOG=mdlive::platform::browser=debug mdlive view --host browser notes.md
//! RUST_LOG=mdlive::platform::editor=trace,mdlive::watch=debug mdlive view --host editor notes.md
//! ```

use std::sync::OnceLock;

use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

static INSTALLED: OnceLock<bool> = OnceLock::new();

/// Wall-clock time of day with millisecond precision.
struct TimeOfDay;

impl TimeOfDay {
    const FORMAT: &'static str = "%H:%M:%S%.3f";
}

impl FormatTime for TimeOfDay {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = chrono::Local::now();
        write!(w, "{}", now.format(Self::FORMAT))
    }
}

/// Filter directive built from config: the default level, then per-target
/// overrides in a stable order.
fn filter_directive(config: &LoggingConfig) -> String {
    let mut modules: Vec<_> = config.modules.iter().collect();
    modules.sort();
    let overrides = modules
        .into_iter()
        .map(|(target, level)| format!("{target}={level}"));
    std::iter::once(config.default.clone())
        .chain(overrides)
        .collect::<Vec<_>>()
        .join(",")
}

fn env_filter(config: &LoggingConfig) -> EnvFilter {
    match std::env::var("RUST_LOG") {
        Ok(directive) if !directive.trim().is_empty() => EnvFilter::new(directive),
        _ => EnvFilter::new(filter_directive(config)),
    }
}

/// Install the global subscriber.
///
/// Returns whether this process ended up with our subscriber; later calls
/// report the outcome of the first one. Stdout stays free for rendered
/// content and JSON lines.
pub fn init_with_config(config: &LoggingConfig) -> bool {
    *INSTALLED.get_or_init(|| {
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_timer(TimeOfDay)
            .with_target(true)
            .with_filter(env_filter(config));
        tracing_subscriber::registry().with(layer).try_init().is_ok()
    })
}

/// Install with `LoggingConfig::default()` (warnings and errors only).
pub fn init() -> bool {
    init_with_config(&LoggingConfig::default())
}

/// Shared body of the component macros.
#[doc(hidden)]
#[macro_export]
macro_rules! component_event {
    ($level:ident, $component:expr, $event:expr) => {
        tracing::$level!("[{}] {}", $component, $event)
    };
    ($level:ident, $component:expr, $event:expr, $($arg:tt)*) => {
        tracing::$level!("[{}] {}: {}", $component, $event, format!($($arg)*))
    };
}

/// Info-level event for a component.
///
/// ```ignore
/// log_event!("desktop", "changed", "{} @ {last_modified}", path.display());
/// log_event!("host", "started");
/// ```
#[macro_export]
macro_rules! log_event {
    ($($body:tt)+) => { $crate::component_event!(info, $($body)+) };
}

/// Debug-level event for a component.
///
/// ```ignore
/// debug_event!("guard", "stale", "{last_modified}");
/// ```
#[macro_export]
macro_rules! debug_event {
    ($($body:tt)+) => { $crate::component_event!(debug, $($body)+) };
}

/// Warning for a component, used when a watch stops on its own.
#[macro_export]
macro_rules! warn_event {
    ($($body:tt)+) => { $crate::component_event!(warn, $($body)+) };
}
