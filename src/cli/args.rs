//! CLI argument parsing using clap.

use clap::{
    Args, Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

use crate::platform::HostKind;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Live markdown viewer
#[derive(Parser, Debug)]
#[command(
    name = "mdlive",
    version = env!("CARGO_PKG_VERSION"),
    about = "Open a markdown file and follow it live",
    long_about = "Open a markdown file through a browser, desktop or editor host and print every change as it lands.",
    next_line_help = true,
    styles = clap_cargo_style(),
    after_help = "Examples:\n  mdlive view notes.md\n  mdlive view --host browser --poll-interval 250 notes.md\n  mdlive view --host editor --json notes.md\n  mdlive cat notes.md"
)]
pub struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize project
    #[command(about = "Set up .mdlive directory with default configuration")]
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Open a file and follow its changes
    #[command(
        about = "Open a file and print live updates",
        after_help = "While running:\n  r  reload\n  w  toggle watch\n  q  quit"
    )]
    View(ViewArgs),

    /// Read a file once
    #[command(about = "Print a file and its metadata through a host provider")]
    Cat {
        /// File to read
        file: PathBuf,

        /// Host strategy (overrides config)
        #[arg(long, value_enum)]
        host: Option<HostKind>,
    },

    /// Show current configuration settings
    #[command(about = "Display active settings")]
    Config,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ViewArgs {
    /// File to open; prompts on the terminal when omitted
    pub file: Option<PathBuf>,

    /// Host strategy (overrides config)
    #[arg(long, value_enum)]
    pub host: Option<HostKind>,

    /// Open without watching
    #[arg(long)]
    pub no_watch: bool,

    /// Fall back to a one-shot read when the host has no picker
    #[arg(long)]
    pub legacy: bool,

    /// Poll interval in milliseconds (browser host)
    #[arg(long, value_name = "MS", value_parser = clap::value_parser!(u64).range(1..=3_600_000))]
    pub poll_interval: Option<u64>,

    /// Debounce window in milliseconds (desktop and editor hosts)
    #[arg(long, value_name = "MS", value_parser = clap::value_parser!(u64).range(0..=3_600_000))]
    pub debounce: Option<u64>,

    /// Emit JSON lines instead of text
    #[arg(long)]
    pub json: bool,
}
