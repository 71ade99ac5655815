//! Cat command - one-shot read through a host provider.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use console::style;

use crate::config::Settings;
use crate::platform::{HostKind, Platform, dialog::PresetDialog};

/// Run the cat command.
pub async fn run(file: &Path, host: Option<HostKind>, mut settings: Settings) -> Result<()> {
    if let Some(host) = host {
        settings.host = host;
    }

    let platform = Platform::from_settings(&settings, Arc::new(PresetDialog::new(file)))?;
    let metadata = platform
        .provider
        .open_file_picker()
        .await?
        .ok_or_else(|| anyhow!("no file selected"))?;

    let content = platform
        .provider
        .read_file(&metadata.handle)
        .await
        .with_context(|| format!("cannot read {}", metadata.name))?;
    let info = platform.provider.get_file_metadata(&metadata.handle).await?;

    let mut summary = format!("{} via {} host", info.name, platform.kind);
    if let Some(modified) = info.last_modified {
        summary.push_str(&format!(", modified {modified}"));
    }
    eprintln!("{}", style(summary).dim());
    print!("{content}");
    if !content.ends_with('\n') {
        println!();
    }
    Ok(())
}
