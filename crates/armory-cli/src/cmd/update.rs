//! Update command - install newer versions of installed packages

use anyhow::{Result, bail};
use armory_core::Reporter;
use armory_core::install::InstallOrchestrator;
use armory_core::installed::InstalledCommands;
use armory_core::update::{PendingUpdate, UpdateEngine};
use crossterm::style::Stylize;

use crate::GlobalArgs;
use crate::ui::Theme;

/// Show pending updates and install the ones the operator picks
pub async fn update(global: &GlobalArgs, armory: Option<&str>) -> Result<()> {
    let output = super::output(global);
    let client = super::refreshed_client(global, &output).await?;
    let commands = InstalledCommands::scan(client.dirs());
    let installer = InstallOrchestrator::new(&client, &commands, &output);
    let engine = UpdateEngine::new(&installer);

    let pending = engine.pending(armory)?;
    if pending.is_empty() {
        output.success("All packages are up to date.");
        return Ok(());
    }

    print_pending(&Theme::default(), &pending);

    let selected = if output.is_assume_yes() {
        (0..pending.len()).collect()
    } else {
        let answer = output
            .ask("Install updates? (all, comma separated numbers, or none):")
            .unwrap_or_default();
        parse_selection(&answer, pending.len())?
    };
    if selected.is_empty() {
        output.info("Update cancelled.");
        return Ok(());
    }

    let mut failed = 0;
    for i in &selected {
        let update = &pending[*i];
        match engine.apply(update).await {
            Ok(_) => {
                let version = update.newest().map_or("?", |v| v.version.as_str());
                output.success(&format!("Updated {} to {version}", update.name));
            }
            Err(e) => {
                output.error(&format!("Failed to update {}: {e}", update.name));
                failed += 1;
            }
        }
    }
    if failed > 0 {
        bail!("{failed} of {} update(s) failed", selected.len());
    }
    Ok(())
}

fn print_pending(theme: &Theme, pending: &[PendingUpdate]) {
    let name_width = theme.layout.name_width;
    let kind_width = theme.layout.kind_width;
    let version_width = theme.layout.version_width;

    println!();
    for (i, update) in pending.iter().enumerate() {
        let Some(newest) = update.newest() else {
            continue;
        };
        let kind = update.kind.to_string();
        println!(
            "  [{}] {} {} {}  ->  {} {}",
            i + 1,
            format!("{:<name_width$}", update.name).with(theme.colors.package_name),
            format!("{kind:<kind_width$}").dark_grey(),
            format!("{:<version_width$}", update.installed_version).dark_grey(),
            newest.version.as_str().with(theme.colors.success),
            format!("({})", newest.armory_name).with(theme.colors.armory),
        );
    }
    println!();
}

/// Parse the operator's pick: `all`, `none` (or nothing), or 1-based
/// indices separated by commas. Returns sorted, deduplicated 0-based
/// indices.
fn parse_selection(answer: &str, len: usize) -> Result<Vec<usize>> {
    let answer = answer.trim().to_lowercase();
    match answer.as_str() {
        "" | "none" | "n" => return Ok(Vec::new()),
        "all" | "a" => return Ok((0..len).collect()),
        _ => {}
    }

    let mut picked = Vec::new();
    for part in answer.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let Ok(n) = part.parse::<usize>() else {
            bail!("invalid selection '{part}'");
        };
        if n == 0 || n > len {
            bail!("selection {n} is out of range 1-{len}");
        }
        picked.push(n - 1);
    }
    picked.sort_unstable();
    picked.dedup();
    Ok(picked)
}
