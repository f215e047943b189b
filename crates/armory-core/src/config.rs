//! Persistence of armory configs (`armories.json`) and credential lookup.

use std::io::Write;
use std::path::Path;

use armory_schema::ArmoryConfig;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{ArmoryError, FetchError};

/// Load configs from `path`. A missing file yields an empty set.
///
/// Entries without a name, public key or URL are skipped.
///
/// # Errors
///
/// Returns [`ArmoryError::Persist`] if the file exists but cannot be read or
/// parsed.
pub fn load(path: &Path) -> Result<Vec<ArmoryConfig>, ArmoryError> {
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(ArmoryError::persist(path, e)),
    };
    let configs: Vec<ArmoryConfig> =
        serde_json::from_slice(&data).map_err(|e| ArmoryError::persist(path, e))?;

    Ok(configs
        .into_iter()
        .filter(|c| {
            let complete =
                !c.name.is_empty() && !c.public_key.is_empty() && !c.repo_url.is_empty();
            if !complete {
                warn!("Skipping incomplete armory config '{}'", c.name);
            }
            complete
        })
        .collect())
}

/// Atomically write `configs` to `path`.
///
/// # Errors
///
/// Returns [`ArmoryError::Persist`] on any IO or serialization failure.
pub fn save(path: &Path, configs: &[ArmoryConfig]) -> Result<(), ArmoryError> {
    write_json(path, configs)?;
    debug!("Saved {} armory configs to {}", configs.len(), path.display());
    Ok(())
}

// Readers see either the old file or the new one, never a partial write.
pub(crate) fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), ArmoryError> {
    let parent = path
        .parent()
        .ok_or_else(|| ArmoryError::persist(path, "path has no parent directory"))?;
    std::fs::create_dir_all(parent).map_err(|e| ArmoryError::persist(path, e))?;

    let data = serde_json::to_vec_pretty(value).map_err(|e| ArmoryError::persist(path, e))?;
    let mut tmp =
        tempfile::NamedTempFile::new_in(parent).map_err(|e| ArmoryError::persist(path, e))?;
    tmp.write_all(&data)
        .map_err(|e| ArmoryError::persist(path, e))?;
    tmp.persist(path)
        .map_err(|e| ArmoryError::persist(path, e.error))?;
    Ok(())
}

/// Delete the persisted file, if any.
///
/// # Errors
///
/// Returns [`ArmoryError::Persist`] if the file exists and cannot be removed.
pub fn reset(path: &Path) -> Result<(), ArmoryError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ArmoryError::persist(path, e)),
    }
}

/// Credential to send to `armory`: the trimmed stdout of its authorization
/// command if one is set, otherwise its static authorization value.
///
/// # Errors
///
/// Returns [`FetchError::AuthCommand`] if the command cannot be spawned or
/// exits unsuccessfully.
pub async fn resolve_authorization(armory: &ArmoryConfig) -> Result<String, FetchError> {
    if armory.authorization_cmd.is_empty() {
        return Ok(armory.authorization.clone());
    }

    let mut command = if cfg!(windows) {
        let mut c = tokio::process::Command::new("cmd");
        c.arg("/C");
        c
    } else {
        let mut c = tokio::process::Command::new("sh");
        c.arg("-c");
        c
    };
    let output = command
        .arg(&armory.authorization_cmd)
        .output()
        .await
        .map_err(|e| FetchError::AuthCommand(e.to_string()))?;

    if !output.status.success() {
        return Err(FetchError::AuthCommand(format!(
            "'{}' exited with {}",
            armory.authorization_cmd, output.status
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Copy of `armory` with its credential resolved into `authorization`.
///
/// # Errors
///
/// See [`resolve_authorization`].
pub async fn authorized(armory: &ArmoryConfig) -> Result<ArmoryConfig, FetchError> {
    let mut resolved = armory.clone();
    resolved.authorization = resolve_authorization(armory).await?;
    Ok(resolved)
}
