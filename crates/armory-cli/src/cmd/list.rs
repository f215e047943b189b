//! List command - the default when no subcommand is given

use std::collections::HashSet;

use anyhow::Result;
use armory_core::Reporter;
use armory_core::installed::InstalledCommands;

use crate::GlobalArgs;
use crate::ui::table;

/// Print every available package and bundle
pub async fn list(global: &GlobalArgs) -> Result<()> {
    let output = super::output(global);
    let client = super::refreshed_client(global, &output).await?;

    let packages = client.packages(None)?;
    if packages.is_empty() {
        output.info("No packages available. Check `armory info` for armory status.");
        return Ok(());
    }
    let installed: HashSet<String> = InstalledCommands::scan(client.dirs())
        .commands()
        .into_iter()
        .collect();

    println!("{}", table::packages(&packages, &installed));

    let bundles = client.bundles(None)?;
    if !bundles.is_empty() {
        println!();
        println!("{}", table::bundles(&bundles));
    }
    Ok(())
}
