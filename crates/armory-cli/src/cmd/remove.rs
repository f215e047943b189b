//! Remove command

use anyhow::Result;
use armory_core::Reporter;

use crate::GlobalArgs;

/// Remove an armory and forget everything fetched from it
pub fn remove(global: &GlobalArgs, name: &str) -> Result<()> {
    let output = super::output(global);
    let mut client = super::open_client(global)?;
    let removed = client.remove(name)?;
    output.success(&format!("Removed armory '{}'", removed.name));
    Ok(())
}
