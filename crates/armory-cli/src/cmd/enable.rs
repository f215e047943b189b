//! Enable / disable commands

use anyhow::Result;
use armory_core::Reporter;

use crate::GlobalArgs;

/// Enable or disable an armory
pub async fn set_enabled(global: &GlobalArgs, name: &str, enabled: bool) -> Result<()> {
    let output = super::output(global);
    let mut client = super::open_client(global)?;
    let report = client.set_enabled(name, enabled).await?;
    output.refresh_failures(&report);

    let state = if enabled { "Enabled" } else { "Disabled" };
    output.success(&format!("{state} armory '{name}'"));
    Ok(())
}
