//! The set of configured armories (trust roots).
//!
//! The registry is plain data plus the ordering and uniqueness rules. Anything
//! that needs the network (verifying a new armory, refreshing after a change)
//! lives on [`crate::client::ArmoryClient`], which is the only caller that
//! mutates a registry.

use std::path::{Path, PathBuf};

use armory_schema::ArmoryConfig;
use tracing::debug;

use crate::config;
use crate::error::ArmoryError;

/// Configured armories, backed by `armories.json`.
#[derive(Debug, Clone)]
pub struct ArmoryRegistry {
    path: PathBuf,
    armories: Vec<ArmoryConfig>,
    default_removed: bool,
}

impl ArmoryRegistry {
    /// Load the registry persisted at `path`.
    ///
    /// # Errors
    ///
    /// See [`config::load`].
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ArmoryError> {
        let path = path.into();
        let armories = config::load(&path)?;
        Ok(Self::with_configs(path, armories))
    }

    /// Registry over `armories`, persisted to `path` on save.
    pub fn with_configs(path: impl Into<PathBuf>, armories: Vec<ArmoryConfig>) -> Self {
        Self {
            path: path.into(),
            armories,
            default_removed: false,
        }
    }

    /// Backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All armories in insertion order, with the "Default" armory last.
    ///
    /// The built-in default is synthesized when no stored config carries its
    /// name or its public key, unless it was removed during this session.
    pub fn list(&self) -> Vec<ArmoryConfig> {
        let mut out: Vec<ArmoryConfig> = self
            .armories
            .iter()
            .filter(|a| !a.is_default())
            .cloned()
            .collect();
        if self.default_removed {
            return out;
        }
        match self.armories.iter().find(|a| a.is_default()) {
            Some(stored) => out.push(stored.clone()),
            None => {
                let builtin = ArmoryConfig::builtin_default();
                // A renamed default keeps the built-in key.
                if !out.iter().any(|a| a.public_key == builtin.public_key) {
                    out.push(builtin);
                }
            }
        }
        out
    }

    /// Enabled armories, in [`Self::list`] order.
    pub fn enabled(&self) -> Vec<ArmoryConfig> {
        self.list().into_iter().filter(|a| a.enabled).collect()
    }

    /// Look up an armory by name.
    pub fn get(&self, name: &str) -> Option<ArmoryConfig> {
        self.list().into_iter().find(|a| a.name == name)
    }

    /// Look up an armory by public key.
    pub fn get_by_key(&self, public_key: &str) -> Option<ArmoryConfig> {
        self.list().into_iter().find(|a| a.public_key == public_key)
    }

    /// Fail if `candidate` would collide with an armory other than `replacing`.
    ///
    /// # Errors
    ///
    /// Returns [`ArmoryError::MissingField`], [`ArmoryError::DuplicateName`]
    /// or [`ArmoryError::DuplicatePublicKey`].
    pub fn check_candidate(
        &self,
        candidate: &ArmoryConfig,
        replacing: Option<&str>,
    ) -> Result<(), ArmoryError> {
        if candidate.name.is_empty() {
            return Err(ArmoryError::MissingField("name"));
        }
        if candidate.repo_url.is_empty() {
            return Err(ArmoryError::MissingField("url"));
        }
        if candidate.public_key.is_empty() {
            return Err(ArmoryError::MissingField("public key"));
        }
        for existing in self.list() {
            if Some(existing.name.as_str()) == replacing {
                continue;
            }
            if existing.name == candidate.name {
                return Err(ArmoryError::DuplicateName(existing.name));
            }
            if existing.public_key == candidate.public_key {
                return Err(ArmoryError::DuplicatePublicKey(existing.name));
            }
        }
        Ok(())
    }

    /// Add a new armory.
    ///
    /// # Errors
    ///
    /// See [`Self::check_candidate`].
    pub fn insert(&mut self, armory: ArmoryConfig) -> Result<(), ArmoryError> {
        self.check_candidate(&armory, None)?;
        if armory.is_default() {
            self.default_removed = false;
        }
        debug!("Registered armory '{}'", armory.name);
        self.armories.push(armory);
        Ok(())
    }

    /// Remove an armory and return it.
    ///
    /// # Errors
    ///
    /// Returns [`ArmoryError::UnknownArmory`] if no armory has that name.
    pub fn remove(&mut self, name: &str) -> Result<ArmoryConfig, ArmoryError> {
        let removed = self
            .get(name)
            .ok_or_else(|| ArmoryError::UnknownArmory(name.to_string()))?;
        self.armories.retain(|a| a.name != name);
        if removed.is_default() {
            self.default_removed = true;
        }
        debug!("Removed armory '{name}'");
        Ok(removed)
    }

    /// Enable or disable an armory and return its new config.
    ///
    /// # Errors
    ///
    /// Returns [`ArmoryError::UnknownArmory`] if no armory has that name.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> Result<ArmoryConfig, ArmoryError> {
        let entry = self.entry_mut(name)?;
        entry.enabled = enabled;
        Ok(entry.clone())
    }

    /// Replace the armory named `name` with `armory`, keeping its position.
    ///
    /// # Errors
    ///
    /// Returns [`ArmoryError::UnknownArmory`], or a collision error from
    /// [`Self::check_candidate`].
    pub fn replace(&mut self, name: &str, armory: ArmoryConfig) -> Result<(), ArmoryError> {
        self.check_candidate(&armory, Some(name))?;
        let entry = self.entry_mut(name)?;
        *entry = armory;
        Ok(())
    }

    /// Persist the current set.
    ///
    /// # Errors
    ///
    /// See [`config::save`].
    pub fn save(&self) -> Result<(), ArmoryError> {
        config::save(&self.path, &self.list())
    }

    /// Delete the persisted file and fall back to the built-in default.
    ///
    /// # Errors
    ///
    /// See [`config::reset`].
    pub fn reset(&mut self) -> Result<(), ArmoryError> {
        config::reset(&self.path)?;
        self.armories.clear();
        self.default_removed = false;
        Ok(())
    }

    // A synthesized default becomes a stored entry the first time it is mutated.
    fn entry_mut(&mut self, name: &str) -> Result<&mut ArmoryConfig, ArmoryError> {
        if !self.armories.iter().any(|a| a.name == name) {
            match self.get(name) {
                Some(synthesized) => self.armories.push(synthesized),
                None => return Err(ArmoryError::UnknownArmory(name.to_string())),
            }
        }
        self.armories
            .iter_mut()
            .find(|a| a.name == name)
            .ok_or_else(|| ArmoryError::UnknownArmory(name.to_string()))
    }
}
