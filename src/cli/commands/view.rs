//! View command - open a file and follow it until quit.

use std::sync::Arc;

use anyhow::{Context, Result};
use console::style;
use serde::Serialize;

use crate::cli::ViewArgs;
use crate::config::Settings;
use crate::controller::{LiveReloadController, Notice, ViewState, WatchEvent};
use crate::platform::Platform;
use crate::platform::dialog::{FileDialog, PresetDialog, PromptDialog, TerminalInput};
use crate::types::{ChangeNotification, file_name_of};

/// One JSON line on stdout.
#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum Line<'a> {
    Content {
        name: Option<&'a str>,
        state: ViewState,
        content: &'a str,
    },
    Change {
        #[serde(rename = "lastModified")]
        last_modified: u64,
        content: &'a str,
    },
    Notice {
        message: String,
        detail: &'a Notice,
    },
}

struct Output {
    json: bool,
}

impl Output {
    fn emit(&self, line: &Line<'_>) -> Result<()> {
        println!("{}", serde_json::to_string(line)?);
        Ok(())
    }

    fn content(&self, controller: &LiveReloadController) -> Result<()> {
        if self.json {
            return self.emit(&Line::Content {
                name: controller.file_name(),
                state: controller.state(),
                content: controller.content(),
            });
        }
        let header = format!("--- {} ---", controller.file_name().unwrap_or("untitled"));
        eprintln!("{}", style(header).cyan().bold());
        println!("{}", controller.content());
        Ok(())
    }

    fn change(&self, change: &ChangeNotification) -> Result<()> {
        if self.json {
            return self.emit(&Line::Change {
                last_modified: change.last_modified,
                content: &change.content,
            });
        }
        eprintln!(
            "{}",
            style(format!("--- updated @ {} ---", change.last_modified)).cyan()
        );
        println!("{}", change.content);
        Ok(())
    }

    fn notices(&self, notices: Vec<Notice>) -> Result<()> {
        for notice in &notices {
            if self.json {
                self.emit(&Line::Notice {
                    message: notice.to_string(),
                    detail: notice,
                })?;
            } else {
                eprintln!("{} {notice}", style("*").yellow());
            }
        }
        Ok(())
    }
}

/// Run the view command.
pub async fn run(args: ViewArgs, mut settings: Settings) -> Result<()> {
    if let Some(host) = args.host {
        settings.host = host;
    }
    if let Some(ms) = args.poll_interval {
        settings.watch.poll_interval_ms = ms;
    }
    if let Some(ms) = args.debounce {
        settings.watch.debounce_ms = ms;
    }

    let input = TerminalInput::stdin();
    let dialog: Arc<dyn FileDialog> = match &args.file {
        Some(path) => Arc::new(PresetDialog::new(path)),
        None => Arc::new(PromptDialog::new(Arc::clone(&input))),
    };
    let platform = Platform::from_settings(&settings, dialog)?;
    crate::log_event!("view", "host", "{}", platform.kind);

    let mut controller = LiveReloadController::new(platform.provider, platform.watcher)
        .with_options(settings.watch.options());
    let out = Output { json: args.json };

    match controller.open_with_picker().await {
        Ok(true) => {}
        Ok(false) => {
            eprintln!("No file selected.");
            return Ok(());
        }
        Err(e) if e.is_unsupported() && args.legacy => {
            let path = args
                .file
                .as_ref()
                .context("--legacy needs a FILE argument")?;
            crate::log_event!("view", "legacy read", "{e}");
            let content = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("cannot read {}", path.display()))?;
            controller.open_read_only(file_name_of(path), content);
        }
        Err(e) => return Err(e).context("cannot open file"),
    }

    if args.no_watch && controller.state() == ViewState::Watching {
        controller.toggle_watch();
    }
    out.notices(controller.take_notices())?;
    out.content(&controller)?;

    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = input.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match line.trim() {
                    "q" => break,
                    "r" => {
                        if controller.reload().await.is_ok() && !controller.is_read_only() {
                            out.content(&controller)?;
                        }
                    }
                    "w" => {
                        controller.toggle_watch();
                    }
                    "" => {}
                    other => eprintln!("Unknown command '{other}' (r = reload, w = watch, q = quit)"),
                },
                Ok(None) => stdin_open = false,
                Err(e) => {
                    crate::warn_event!("view", "stdin closed", "{e}");
                    stdin_open = false;
                }
            },
            Some(event) = controller.next_event() => {
                if let WatchEvent::Changed(change) = event {
                    out.change(&change)?;
                }
            }
        }
        out.notices(controller.take_notices())?;
    }

    crate::debug_event!("view", "quit");
    Ok(())
}
