//! Refresh command

use anyhow::Result;
use armory_core::Reporter;

use crate::GlobalArgs;

/// Refetch every enabled armory regardless of cache age
pub async fn refresh(global: &GlobalArgs) -> Result<()> {
    let output = super::output(global);
    let client = super::open_client(global)?;
    let report = client.refresh_forced().await;
    output.refresh_failures(&report);

    let msg = format!(
        "Fetched {} index(es) and {} package signature(s)",
        report.indexes_fetched, report.packages_fetched
    );
    if report.is_clean() {
        output.success(&msg);
    } else {
        output.info(&msg);
    }
    Ok(())
}
