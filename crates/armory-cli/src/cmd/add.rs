//! Add command

use anyhow::Result;
use armory_core::Reporter;
use armory_schema::ArmoryConfig;

use crate::GlobalArgs;

/// Armory fields given on the command line
#[derive(Debug, Clone)]
pub struct NewArmory {
    pub name: String,
    pub url: String,
    pub pubkey: String,
    pub auth: Option<String>,
    pub authcmd: Option<String>,
}

impl NewArmory {
    fn into_config(self) -> ArmoryConfig {
        ArmoryConfig {
            name: self.name.trim().to_string(),
            public_key: self.pubkey.trim().to_string(),
            repo_url: self.url.trim().to_string(),
            authorization: self.auth.unwrap_or_default(),
            authorization_cmd: self.authcmd.unwrap_or_default(),
            enabled: true,
        }
    }
}

/// Verify a new armory's index and add it
pub async fn add(global: &GlobalArgs, armory: NewArmory, save: bool) -> Result<()> {
    let output = super::output(global);
    let mut client = super::open_client(global)?;
    let config = armory.into_config();
    let name = config.name.clone();

    let report = client.add(config, save).await?;
    output.refresh_failures(&report);

    let packages = client.packages(Some(&name))?.len();
    if save {
        output.success(&format!("Added armory '{name}' ({packages} packages)"));
    } else {
        output.success(&format!(
            "Verified armory '{name}' ({packages} packages); not saved"
        ));
    }
    Ok(())
}
