//! Search command

use std::collections::HashSet;

use anyhow::{Result, anyhow};
use armory_core::Reporter;
use armory_core::installed::InstalledCommands;
use regex::Regex;

use crate::GlobalArgs;
use crate::ui::table;

/// Search package names and command names with a regex
pub async fn search(global: &GlobalArgs, pattern: &str) -> Result<()> {
    let output = super::output(global);
    let re = Regex::new(pattern).map_err(|e| anyhow!("invalid pattern '{pattern}': {e}"))?;
    let client = super::refreshed_client(global, &output).await?;

    let results = client.search(&re);
    if results.is_empty() {
        output.info(&format!("No packages found matching '{pattern}'"));
        return Ok(());
    }
    let installed: HashSet<String> = InstalledCommands::scan(client.dirs())
        .commands()
        .into_iter()
        .collect();
    println!("{}", table::packages(&results, &installed));
    Ok(())
}
