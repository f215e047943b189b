//! Install command

use anyhow::{Result, bail};
use armory_core::Reporter;
use armory_core::install::InstallOrchestrator;
use armory_core::installed::InstalledCommands;

use crate::GlobalArgs;

/// Install a package, a bundle, or everything (`all`)
pub async fn install(
    global: &GlobalArgs,
    name: &str,
    force: bool,
    armory: Option<&str>,
) -> Result<()> {
    let output = super::output(global);
    let client = super::refreshed_client(global, &output).await?;
    let commands = InstalledCommands::scan(client.dirs());
    let installer = InstallOrchestrator::new(&client, &commands, &output);

    let report = installer.install_by_name(name, armory, force).await?;
    for installed in &report.installed {
        output.success(&format!("Installed {installed}"));
    }
    if !report.failed.is_empty() {
        bail!(
            "{} of {} install(s) failed",
            report.failed.len(),
            report.attempts()
        );
    }
    Ok(())
}
