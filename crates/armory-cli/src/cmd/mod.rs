//! Command modules - one file per CLI command

pub mod add;
pub mod completions;
pub mod enable;
pub mod info;
pub mod install;
pub mod list;
pub mod modify;
pub mod refresh;
pub mod remove;
pub mod reset;
pub mod search;
pub mod update;

use anyhow::{Result, anyhow};
use armory_core::{AppDirs, ArmoryClient};

use crate::GlobalArgs;
use crate::ui::Output;

/// Open a session over the app directory with this invocation's HTTP settings.
pub fn open_client(global: &GlobalArgs) -> Result<ArmoryClient> {
    let dirs = AppDirs::from_env()
        .ok_or_else(|| anyhow!("could not determine home directory; set ARMORY_HOME"))?;
    Ok(ArmoryClient::open(dirs, &global.http())?)
}

/// Output honoring `--yes`.
pub fn output(global: &GlobalArgs) -> Output {
    Output::new().assume_yes(global.yes)
}

/// Open a session and bring its caches up to date, printing one line per
/// failed fetch.
pub async fn refreshed_client(global: &GlobalArgs, output: &Output) -> Result<ArmoryClient> {
    let client = open_client(global)?;
    let report = client.refresh().await;
    output.refresh_failures(&report);
    Ok(client)
}
