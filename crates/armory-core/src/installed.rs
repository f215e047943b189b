//! Installed packages and the set of registered console commands.
//!
//! The install directories are the only local record of what is installed:
//! each holds the `alias.json` / `extension.json` extracted from the package
//! archive.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use armory_schema::{
    ALIAS_MANIFEST_FILE, AliasManifest, EXTENSION_MANIFEST_FILE, ExtensionManifest,
    PackageManifest,
};
use tracing::{debug, warn};

use crate::error::ArmoryError;
use crate::paths::AppDirs;

/// The console's command table.
///
/// Installs consult it to detect already-installed commands and to skip
/// dependencies that are already available, and register every command a
/// successful install provides.
pub trait CommandRegistry: Send + Sync {
    /// Whether a command with this name is registered.
    fn is_registered(&self, command: &str) -> bool;

    /// Register the commands of a package installed into `dir`.
    ///
    /// # Errors
    ///
    /// Implementations may reject a manifest they cannot load.
    fn register(&self, manifest: &PackageManifest, dir: &Path) -> Result<(), ArmoryError>;
}

/// Parsed manifests of every installed alias, sorted by command name.
///
/// Directories without a readable, valid `alias.json` are skipped.
pub fn installed_aliases(dirs: &AppDirs) -> Vec<AliasManifest> {
    let mut out: Vec<AliasManifest> = manifest_files(&dirs.aliases_dir(), ALIAS_MANIFEST_FILE)
        .filter_map(|path| read_manifest(&path, AliasManifest::parse))
        .collect();
    out.sort_by(|a, b| a.command_name.cmp(&b.command_name));
    out
}

/// Parsed manifests of every installed extension, sorted by name.
///
/// Directories without a readable, valid `extension.json` are skipped.
pub fn installed_extensions(dirs: &AppDirs) -> Vec<ExtensionManifest> {
    let mut out: Vec<ExtensionManifest> =
        manifest_files(&dirs.extensions_dir(), EXTENSION_MANIFEST_FILE)
            .filter_map(|path| read_manifest(&path, ExtensionManifest::parse))
            .collect();
    out.sort_by(|a, b| a.name.cmp(&b.name));
    out
}

fn manifest_files(root: &Path, file_name: &'static str) -> impl Iterator<Item = std::path::PathBuf> {
    walkdir::WalkDir::new(root)
        .min_depth(2)
        .max_depth(2)
        .into_iter()
        .flatten()
        .filter(move |e| e.file_type().is_file() && e.file_name() == file_name)
        .map(walkdir::DirEntry::into_path)
}

fn read_manifest<T, E: std::fmt::Display>(
    path: &Path,
    parse: impl FnOnce(&[u8]) -> Result<T, E>,
) -> Option<T> {
    let parsed = std::fs::read(path)
        .map_err(|e| e.to_string())
        .and_then(|data| parse(&data).map_err(|e| e.to_string()));
    match parsed {
        Ok(manifest) => Some(manifest),
        Err(e) => {
            warn!("Skipping {}: {e}", path.display());
            None
        }
    }
}

/// Command table backed by the install directories.
///
/// Seeded from the installed manifests; every successful install adds its
/// commands.
#[derive(Debug, Default)]
pub struct InstalledCommands {
    commands: Mutex<HashSet<String>>,
}

impl InstalledCommands {
    /// Commands of everything currently installed under `dirs`.
    pub fn scan(dirs: &AppDirs) -> Self {
        let mut commands: HashSet<String> = installed_aliases(dirs)
            .into_iter()
            .map(|a| a.command_name)
            .collect();
        for ext in installed_extensions(dirs) {
            commands.extend(ext.commands.into_iter().map(|c| c.command_name));
        }
        debug!("{} commands installed", commands.len());
        Self {
            commands: Mutex::new(commands),
        }
    }

    /// Snapshot of the registered command names, sorted.
    pub fn commands(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect();
        out.sort();
        out
    }
}

impl CommandRegistry for InstalledCommands {
    fn is_registered(&self, command: &str) -> bool {
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(command)
    }

    fn register(&self, manifest: &PackageManifest, dir: &Path) -> Result<(), ArmoryError> {
        let mut commands = self.commands.lock().unwrap_or_else(PoisonError::into_inner);
        for name in manifest.command_names() {
            debug!("Registered command '{name}' from {}", dir.display());
            commands.insert(name.to_string());
        }
        Ok(())
    }
}
