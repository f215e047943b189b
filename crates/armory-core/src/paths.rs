//! Client directory layout (armory root, caches, install dirs).

use dirs::home_dir;
use std::path::{Path, PathBuf};

use armory_schema::manifest::clean_relative_path;

/// Returns the client application directory, or None if the user's home cannot be resolved.
///
/// `ARMORY_HOME` overrides the default `~/.sliver-client`.
pub fn try_armory_home() -> Option<PathBuf> {
    if let Ok(val) = std::env::var("ARMORY_HOME") {
        return Some(PathBuf::from(val));
    }
    home_dir().map(|h| h.join(".sliver-client"))
}

/// On-disk layout under the application directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppDirs {
    root: PathBuf,
}

impl AppDirs {
    /// Layout rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Layout rooted at [`try_armory_home`].
    pub fn from_env() -> Option<Self> {
        try_armory_home().map(Self::new)
    }

    /// Application directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persisted armory configs: <root>/armories.json
    pub fn config_path(&self) -> PathBuf {
        self.root.join("armories.json")
    }

    /// Persisted fetch caches: <root>/armory-cache.json
    pub fn cache_path(&self) -> PathBuf {
        self.root.join("armory-cache.json")
    }

    /// Installed aliases: <root>/aliases
    pub fn aliases_dir(&self) -> PathBuf {
        self.root.join("aliases")
    }

    /// Installed extensions: <root>/extensions
    pub fn extensions_dir(&self) -> PathBuf {
        self.root.join("extensions")
    }

    /// Install directory of one alias, keyed by command name.
    pub fn alias_dir(&self, command_name: &str) -> PathBuf {
        self.aliases_dir().join(path_component(command_name))
    }

    /// Install directory of one extension, keyed by package name.
    pub fn extension_dir(&self, name: &str) -> PathBuf {
        self.extensions_dir().join(path_component(name))
    }
}

// Names come from signed manifests, but still must not escape the install root.
fn path_component(name: &str) -> String {
    clean_relative_path(name).map_or_else(|| "_".to_string(), |p| p.replace('/', "_"))
}
