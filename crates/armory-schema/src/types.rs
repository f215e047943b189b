//! Armory configuration, index, and package types.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::{DEFAULT_ARMORY_NAME, DEFAULT_ARMORY_PUBLIC_KEY, DEFAULT_ARMORY_REPO_URL};

/// One operator-configured armory, as persisted in `armories.json`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ArmoryConfig {
    /// Unique label (e.g. "Default")
    pub name: String,

    /// Minisign public key; trust anchor and index cache key
    pub public_key: String,

    /// Index endpoint
    pub repo_url: String,

    /// Static `Authorization` header value
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub authorization: String,

    /// Shell command whose stdout becomes the `Authorization` header value
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub authorization_cmd: String,

    /// Disabled armories are never fetched, searched or installed from
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl ArmoryConfig {
    /// The built-in public armory.
    pub fn builtin_default() -> Self {
        Self {
            name: DEFAULT_ARMORY_NAME.to_string(),
            public_key: DEFAULT_ARMORY_PUBLIC_KEY.to_string(),
            repo_url: DEFAULT_ARMORY_REPO_URL.to_string(),
            authorization: String::new(),
            authorization_cmd: String::new(),
            enabled: true,
        }
    }

    /// Whether this is the config named "Default".
    pub fn is_default(&self) -> bool {
        self.name == DEFAULT_ARMORY_NAME
    }

    /// Whether requests to this armory carry credentials.
    pub fn requires_auth(&self) -> bool {
        !self.authorization.is_empty() || !self.authorization_cmd.is_empty()
    }

    /// Provenance record attached to everything fetched from this armory.
    pub fn provenance(&self) -> Provenance {
        Provenance {
            armory_name: self.name.clone(),
            armory_pk: self.public_key.clone(),
            repo_url: self.repo_url.clone(),
        }
    }
}

/// Where a cached index or package came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Provenance {
    /// Name of the armory at fetch time
    pub armory_name: String,
    /// Public key of the armory at fetch time
    pub armory_pk: String,
    /// Index endpoint at fetch time
    pub repo_url: String,
}

/// Whether a package provides a single aliased command or an extension.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum PackageKind {
    /// Third-party tool wrapped as one console command.
    Alias,
    /// Extension module that may register several commands.
    Extension,
}

impl fmt::Display for PackageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Alias => f.write_str("Alias"),
            Self::Extension => f.write_str("Extension"),
        }
    }
}

/// Stable identity of a package within one armory.
///
/// Command names are not unique across armories, so the cache keys packages
/// by a digest over where the package lives and who vouches for it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageId(String);

impl PackageId {
    /// Hex SHA-256 over `repo_url + public_key + armory_name + command_name`.
    pub fn derive(repo_url: &str, public_key: &str, armory_name: &str, command_name: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(repo_url.as_bytes());
        hasher.update(public_key.as_bytes());
        hasher.update(armory_name.as_bytes());
        hasher.update(command_name.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Borrow the hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PackageId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A package entry in an armory index.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ArmoryPackage {
    /// Package name
    pub name: String,

    /// Command the package provides (primary command for extensions)
    pub command_name: String,

    /// Location of the package's signature and archive
    pub repo_url: String,

    /// Key the package is signed with (may differ from the armory's)
    pub public_key: String,

    /// Set by the parser from the index section the entry came from
    #[serde(skip)]
    pub is_alias: bool,

    /// Provenance: armory name
    #[serde(skip)]
    pub armory_name: String,

    /// Provenance: armory public key
    #[serde(skip)]
    pub armory_pk: String,
}

impl ArmoryPackage {
    /// Provenance-qualified identity.
    pub fn id(&self) -> PackageId {
        PackageId::derive(
            &self.repo_url,
            &self.public_key,
            &self.armory_name,
            &self.command_name,
        )
    }

    /// Alias or extension.
    pub fn kind(&self) -> PackageKind {
        if self.is_alias {
            PackageKind::Alias
        } else {
            PackageKind::Extension
        }
    }
}

/// A named set of packages installed together.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ArmoryBundle {
    /// Bundle name
    pub name: String,

    /// Command names of the member packages
    #[serde(default)]
    pub packages: Vec<String>,

    /// Provenance: armory name
    #[serde(skip)]
    pub armory_name: String,
}

/// One armory's catalog.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct ArmoryIndex {
    /// Alias packages
    #[serde(default)]
    pub aliases: Vec<ArmoryPackage>,

    /// Extension packages
    #[serde(default)]
    pub extensions: Vec<ArmoryPackage>,

    /// Bundles
    #[serde(default)]
    pub bundles: Vec<ArmoryBundle>,
}

impl ArmoryIndex {
    /// Parse a verified index document and stamp provenance onto every entry.
    ///
    /// # Errors
    ///
    /// Returns the JSON error if `bytes` is not a valid index document.
    pub fn from_verified_json(bytes: &[u8], armory: &ArmoryConfig) -> serde_json::Result<Self> {
        let mut index: Self = serde_json::from_slice(bytes)?;
        index.stamp(armory);
        Ok(index)
    }

    /// Mark each entry's section and stamp `armory` as its provenance.
    ///
    /// Provenance fields are not serialized, so an index read back from disk
    /// needs this before its package ids are meaningful.
    pub fn stamp(&mut self, armory: &ArmoryConfig) {
        for pkg in &mut self.aliases {
            pkg.is_alias = true;
            pkg.armory_name.clone_from(&armory.name);
            pkg.armory_pk.clone_from(&armory.public_key);
        }
        for pkg in &mut self.extensions {
            pkg.is_alias = false;
            pkg.armory_name.clone_from(&armory.name);
            pkg.armory_pk.clone_from(&armory.public_key);
        }
        for bundle in &mut self.bundles {
            bundle.armory_name.clone_from(&armory.name);
        }
    }

    /// All packages, aliases first.
    pub fn packages(&self) -> impl Iterator<Item = &ArmoryPackage> {
        self.aliases.iter().chain(self.extensions.iter())
    }

    /// Total number of packages listed.
    pub fn len(&self) -> usize {
        self.aliases.len() + self.extensions.len()
    }

    /// Whether the index lists no packages.
    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty() && self.extensions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn armory() -> ArmoryConfig {
        ArmoryConfig {
            name: "alpha".to_string(),
            public_key: "K1".to_string(),
            repo_url: "https://alpha.example/index".to_string(),
            authorization: String::new(),
            authorization_cmd: String::new(),
            enabled: true,
        }
    }

    #[test]
    fn test_index_stamps_provenance() {
        let doc = r#"{
            "aliases": [{"name": "foo", "command_name": "foo", "repo_url": "https://x/foo", "public_key": "P"}],
            "extensions": [{"name": "bar", "command_name": "bar-cmd", "repo_url": "https://x/bar", "public_key": "P"}],
            "bundles": [{"name": "kit", "packages": ["foo", "bar-cmd"]}]
        }"#;
        let index = ArmoryIndex::from_verified_json(doc.as_bytes(), &armory()).unwrap();

        assert!(index.aliases[0].is_alias);
        assert!(!index.extensions[0].is_alias);
        assert_eq!(index.extensions[0].armory_pk, "K1");
        assert_eq!(index.bundles[0].armory_name, "alpha");
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_missing_sections_default_to_empty() {
        let index = ArmoryIndex::from_verified_json(b"{}", &armory()).unwrap();
        assert!(index.is_empty());
        assert!(index.bundles.is_empty());
    }

    #[test]
    fn test_package_id_depends_on_provenance() {
        let mut a = ArmoryPackage {
            name: "foo".to_string(),
            command_name: "foo".to_string(),
            repo_url: "https://x/foo".to_string(),
            public_key: "P".to_string(),
            is_alias: true,
            armory_name: "alpha".to_string(),
            armory_pk: "K1".to_string(),
        };
        let first = a.id();
        assert_eq!(first.as_str().len(), 64);

        a.armory_name = "beta".to_string();
        assert_ne!(first, a.id());
    }

    #[test]
    fn test_config_defaults_enabled() {
        let cfg: ArmoryConfig =
            serde_json::from_str(r#"{"name":"a","public_key":"k","repo_url":"https://a"}"#).unwrap();
        assert!(cfg.enabled);
        assert!(!cfg.requires_auth());
        assert!(ArmoryConfig::builtin_default().is_default());
    }
}
