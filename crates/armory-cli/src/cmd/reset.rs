//! Reset command

use anyhow::Result;
use armory_core::Reporter;

use crate::GlobalArgs;

/// Forget all configured armories and restore the default
pub async fn reset(global: &GlobalArgs) -> Result<()> {
    let output = super::output(global);
    if !output.confirm("Forget all armories and restore the default?", false) {
        output.info("Reset cancelled.");
        return Ok(());
    }

    let mut client = super::open_client(global)?;
    let report = client.reset().await?;
    output.refresh_failures(&report);
    output.success("Armory configuration reset");
    Ok(())
}
