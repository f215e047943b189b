//! Update detection for installed aliases and extensions.

use std::collections::BTreeMap;

use armory_schema::{AliasManifest, ExtensionManifest, PackageId, PackageKind, version};

use crate::cache::CachedPackage;
use crate::error::ArmoryError;
use crate::install::{InstallOrchestrator, Overwrite};
use crate::installed::{installed_aliases, installed_extensions};

/// A cached version newer than the installed one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailableVersion {
    /// Version string from the signed manifest
    pub version: String,
    /// Armory offering it
    pub armory_name: String,
    /// Cache key of the offering package
    pub id: PackageId,
}

/// An installed package with newer versions available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpdate {
    /// Command name for aliases, package name for extensions
    pub name: String,
    /// Alias or extension
    pub kind: PackageKind,
    /// Installed version
    pub installed_version: String,
    /// Newer versions, newest first
    pub available: Vec<AvailableVersion>,
}

impl PendingUpdate {
    /// The newest available version.
    pub fn newest(&self) -> Option<&AvailableVersion> {
        self.available.first()
    }
}

/// Compare installed manifests with cached packages.
///
/// Aliases match by command name and extensions by package name. When
/// `armory_pk` is set only that armory's packages are considered. The result
/// is sorted by name, aliases before extensions of the same name.
pub fn diff(
    aliases: &[AliasManifest],
    extensions: &[ExtensionManifest],
    packages: &[CachedPackage],
    armory_pk: Option<&str>,
) -> Vec<PendingUpdate> {
    let mut pending: BTreeMap<(String, PackageKind), PendingUpdate> = BTreeMap::new();
    let installed = aliases
        .iter()
        .map(|a| (PackageKind::Alias, a.command_name.as_str(), a.version.as_str()))
        .chain(
            extensions
                .iter()
                .map(|e| (PackageKind::Extension, e.name.as_str(), e.version.as_str())),
        );

    for (kind, name, current) in installed {
        let mut available: Vec<AvailableVersion> = packages
            .iter()
            .filter(|p| p.kind() == kind && armory_pk.is_none_or(|pk| p.armory_pk() == pk))
            .filter(|p| match kind {
                PackageKind::Alias => p.package.command_name == name,
                PackageKind::Extension => p.name() == name,
            })
            .filter(|p| version::is_newer(current, p.version()))
            .map(|p| AvailableVersion {
                version: p.version().to_string(),
                armory_name: p.armory_name().to_string(),
                id: p.id(),
            })
            .collect();
        if available.is_empty() {
            continue;
        }
        available.sort_by(|a, b| {
            version::compare(&b.version, &a.version).then_with(|| a.armory_name.cmp(&b.armory_name))
        });
        pending.insert(
            (name.to_string(), kind),
            PendingUpdate {
                name: name.to_string(),
                kind,
                installed_version: current.to_string(),
                available,
            },
        );
    }
    pending.into_values().collect()
}

/// Finds and applies updates for the packages installed under a client's
/// app directory.
pub struct UpdateEngine<'a> {
    installer: &'a InstallOrchestrator<'a>,
}

impl<'a> UpdateEngine<'a> {
    /// Engine installing updates through `installer`.
    pub fn new(installer: &'a InstallOrchestrator<'a>) -> Self {
        Self { installer }
    }

    /// Pending updates, optionally only from the armory named `armory`.
    ///
    /// # Errors
    ///
    /// Returns [`ArmoryError::UnknownArmory`] if `armory` is not configured.
    pub fn pending(&self, armory: Option<&str>) -> Result<Vec<PendingUpdate>, ArmoryError> {
        let client = self.installer.client();
        let packages = client.packages(armory)?;
        let dirs = client.dirs();
        Ok(diff(
            &installed_aliases(dirs),
            &installed_extensions(dirs),
            &packages,
            None,
        ))
    }

    /// Install the newest version of `update`, replacing the installed one.
    ///
    /// # Errors
    ///
    /// Returns [`ArmoryError::CacheOutOfDate`] if the offering package left
    /// the cache, or the install failure.
    pub async fn apply(&self, update: &PendingUpdate) -> Result<Vec<String>, ArmoryError> {
        let newest = update.newest().ok_or(ArmoryError::CacheOutOfDate)?;
        let package = self
            .installer
            .client()
            .cache()
            .package(&newest.id)
            .ok_or(ArmoryError::CacheOutOfDate)?;
        self.installer
            .install_package(&package, Overwrite::Always)
            .await
    }
}
