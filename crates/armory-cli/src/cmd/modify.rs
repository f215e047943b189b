//! Modify command

use anyhow::Result;
use armory_core::{ArmoryChanges, Reporter};

use crate::GlobalArgs;

/// Change an armory's fields and re-verify it
pub async fn modify(
    global: &GlobalArgs,
    name: &str,
    changes: &ArmoryChanges,
    save: bool,
) -> Result<()> {
    let output = super::output(global);
    let mut client = super::open_client(global)?;
    if changes.is_empty() {
        output.warning(&format!("No changes for armory '{name}'"));
        return Ok(());
    }

    let report = client.modify(name, changes, &output, save).await?;
    output.refresh_failures(&report);

    let new_name = changes.name.as_deref().unwrap_or(name);
    output.success(&format!("Updated armory '{new_name}'"));
    Ok(())
}
