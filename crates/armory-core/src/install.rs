//! Installation Flow Typestate Pattern
//!
//! Models a package install as a series of explicit state transitions:
//!
//! ```text
//! Requested --[verify_metadata()]--> MetadataVerified --[fetch()]--> ArtifactFetched
//!   --[verify()]--> SignatureVerified --[extract()]--> Extracted --[register()]--> Registered
//! ```
//!
//! Only [`SignatureVerified`] can be extracted, so nothing reaches the
//! filesystem before the archive bytes have been verified against the
//! package key.

use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};

use armory_schema::manifest::clean_relative_path;
use armory_schema::{
    ALIAS_MANIFEST_FILE, ArmoryBundle, ArmoryConfig, EXTENSION_MANIFEST_FILE, PackageFile,
    PackageId, PackageKind, PackageManifest, version,
};
use tracing::{debug, warn};

use crate::archive::read_file_from_tar_gz;
use crate::cache::CachedPackage;
use crate::client::ArmoryClient;
use crate::error::{ArmoryError, FetchError};
use crate::installed::CommandRegistry;
use crate::minisign::{PublicKey, Signature};
use crate::paths::AppDirs;
use crate::refresh::Refresher;
use crate::reporter::Reporter;
use crate::resolver::DependencyResolver;

/// What to do when the install directory already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overwrite {
    /// Ask the operator; declining cancels the install
    Prompt,
    /// Replace it without asking
    Always,
}

/// State 1: a package requested by cache identity.
#[derive(Debug, Clone)]
pub struct Requested {
    /// Package cache key
    pub id: PackageId,
}

/// State 2: the package re-resolved from the cache, with the enabled armory
/// it came from.
#[derive(Debug)]
pub struct MetadataVerified {
    /// Armory the package was fetched for
    pub armory: ArmoryConfig,
    /// Cached package with its verified manifest
    pub cached: CachedPackage,
}

/// State 3: signature and archive downloaded, archive not yet verified.
#[derive(Debug)]
pub struct ArtifactFetched {
    cached: CachedPackage,
    signature: Signature,
    archive: Vec<u8>,
}

/// State 4: archive bytes verified against the package key.
#[derive(Debug)]
pub struct SignatureVerified {
    cached: CachedPackage,
    archive: Vec<u8>,
}

/// State 5: manifest and declared files written to the install directory.
#[derive(Debug)]
pub struct Extracted {
    /// Manifest read from the archive
    pub manifest: PackageManifest,
    /// Install directory
    pub dir: PathBuf,
}

/// State 6: commands registered with the console.
#[derive(Debug)]
pub struct Registered {
    /// Manifest of the installed package
    pub manifest: PackageManifest,
    /// Install directory
    pub dir: PathBuf,
}

impl Requested {
    /// Request the package cached under `id`.
    pub fn new(id: PackageId) -> Self {
        Self { id }
    }

    /// Look the package up again in the cache and find its armory.
    ///
    /// # Errors
    ///
    /// Returns [`ArmoryError::CacheOutOfDate`] if the package is no longer
    /// cached or its armory is gone or disabled.
    pub fn verify_metadata(self, client: &ArmoryClient) -> Result<MetadataVerified, ArmoryError> {
        let cached = client
            .cache()
            .package(&self.id)
            .ok_or(ArmoryError::CacheOutOfDate)?;
        let armory = client
            .registry()
            .get_by_key(cached.armory_pk())
            .filter(|a| a.enabled)
            .ok_or(ArmoryError::CacheOutOfDate)?;
        Ok(MetadataVerified { armory, cached })
    }
}

impl MetadataVerified {
    /// Download the signature and archive from the package's source.
    ///
    /// # Errors
    ///
    /// Returns the fetch error, or [`FetchError::EmptyArchive`].
    pub async fn fetch(self, refresher: &Refresher) -> Result<ArtifactFetched, ArmoryError> {
        let fetched = refresher
            .fetch_artifact(&self.armory, &self.cached.package)
            .await?;
        let archive = fetched.archive.ok_or(FetchError::EmptyArchive)?;
        debug!(
            "Fetched {} ({} bytes)",
            self.cached.package.command_name,
            archive.len()
        );
        Ok(ArtifactFetched {
            cached: self.cached,
            signature: fetched.signature,
            archive,
        })
    }
}

impl ArtifactFetched {
    /// Verify the archive bytes against the package key.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Signature`] (or [`FetchError::InvalidPublicKey`])
    /// on any mismatch.
    pub fn verify(self) -> Result<SignatureVerified, ArmoryError> {
        let key = PublicKey::parse(&self.cached.package.public_key)?;
        self.signature.verify(&key, &self.archive)?;
        Ok(SignatureVerified {
            cached: self.cached,
            archive: self.archive,
        })
    }
}

impl SignatureVerified {
    /// Write the manifest and every declared file into the install directory.
    ///
    /// The archive is staged in a temporary file. An existing install
    /// directory is replaced, after asking when `overwrite` is
    /// [`Overwrite::Prompt`]. If anything fails after the directory has been
    /// created, it is removed.
    ///
    /// # Errors
    ///
    /// Returns [`ArmoryError::Cancelled`] if the operator declines the
    /// overwrite, or an archive, manifest or IO error.
    pub fn extract(
        self,
        dirs: &AppDirs,
        overwrite: Overwrite,
        reporter: &dyn Reporter,
    ) -> Result<Extracted, ArmoryError> {
        let mut staged = tempfile::NamedTempFile::new()?;
        staged.write_all(&self.archive)?;
        staged.flush()?;

        let kind = self.cached.package.kind();
        let manifest_file = match kind {
            PackageKind::Alias => ALIAS_MANIFEST_FILE,
            PackageKind::Extension => EXTENSION_MANIFEST_FILE,
        };
        let raw_manifest = read_file_from_tar_gz(staged.path(), manifest_file)?;
        let manifest = PackageManifest::parse(kind, &raw_manifest)?;
        let dir = match &manifest {
            PackageManifest::Alias(alias) => dirs.alias_dir(&alias.command_name),
            PackageManifest::Extension(ext) => dirs.extension_dir(&ext.name),
        };

        if dir.exists() {
            let replace = overwrite == Overwrite::Always
                || reporter.confirm(
                    &format!("{kind} '{}' is already installed. Overwrite?", manifest.name()),
                    false,
                );
            if !replace {
                return Err(ArmoryError::Cancelled);
            }
            std::fs::remove_dir_all(&dir)?;
        }

        std::fs::create_dir_all(&dir)?;
        let written = write_files(staged.path(), &dir, manifest_file, &raw_manifest, &manifest);
        if let Err(e) = written {
            if let Err(cleanup) = std::fs::remove_dir_all(&dir) {
                warn!("Failed to clean up {}: {cleanup}", dir.display());
            }
            return Err(e);
        }
        Ok(Extracted { manifest, dir })
    }
}

fn declared_files(manifest: &PackageManifest) -> Vec<&PackageFile> {
    match manifest {
        PackageManifest::Alias(alias) => alias.files.iter().collect(),
        PackageManifest::Extension(ext) => ext.files(),
    }
}

fn write_files(
    archive: &Path,
    dir: &Path,
    manifest_file: &str,
    raw_manifest: &[u8],
    manifest: &PackageManifest,
) -> Result<(), ArmoryError> {
    std::fs::write(dir.join(manifest_file), raw_manifest)?;
    for file in declared_files(manifest) {
        let relative = clean_relative_path(&file.path)
            .ok_or_else(|| ArmoryError::Archive(format!("invalid file path '{}'", file.path)))?;
        let data = read_file_from_tar_gz(archive, &relative)?;
        let target = dir.join(&relative);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&target, data)?;
    }
    Ok(())
}

impl Extracted {
    /// Register the package's commands.
    ///
    /// # Errors
    ///
    /// Returns the registry's error; the install directory is removed.
    pub fn register(self, commands: &dyn CommandRegistry) -> Result<Registered, ArmoryError> {
        if let Err(e) = commands.register(&self.manifest, &self.dir) {
            if let Err(cleanup) = std::fs::remove_dir_all(&self.dir) {
                warn!("Failed to clean up {}: {cleanup}", self.dir.display());
            }
            return Err(e);
        }
        Ok(Registered {
            manifest: self.manifest,
            dir: self.dir,
        })
    }
}

/// Outcome of a batch install.
#[derive(Debug, Default)]
pub struct InstallReport {
    /// Names of installed packages, dependencies included, in install order
    pub installed: Vec<String>,
    /// Packages that failed, with why
    pub failed: Vec<(String, ArmoryError)>,
}

impl InstallReport {
    /// Number of packages attempted.
    pub fn attempts(&self) -> usize {
        self.installed.len() + self.failed.len()
    }
}

/// Runs installs against one client session.
pub struct InstallOrchestrator<'a> {
    client: &'a ArmoryClient,
    commands: &'a dyn CommandRegistry,
    reporter: &'a dyn Reporter,
}

impl<'a> InstallOrchestrator<'a> {
    /// Orchestrator installing from `client`'s cache into its app directory.
    pub fn new(
        client: &'a ArmoryClient,
        commands: &'a dyn CommandRegistry,
        reporter: &'a dyn Reporter,
    ) -> Self {
        Self {
            client,
            commands,
            reporter,
        }
    }

    /// Session the orchestrator installs from
    pub fn client(&self) -> &'a ArmoryClient {
        self.client
    }

    /// Install `name`, or everything when `name` is `all`.
    ///
    /// An alias with that command name is preferred, then an extension with
    /// that name or command, then a bundle. When several armories offer the
    /// package the operator picks one.
    ///
    /// # Errors
    ///
    /// Returns [`ArmoryError::AlreadyInstalled`] unless `force`,
    /// [`ArmoryError::NotFound`], [`ArmoryError::Cancelled`], or the install
    /// failure. A listed package whose signature failed verification during
    /// refresh reports that failure instead of `NotFound`. Bundle members
    /// fail individually in the report.
    pub async fn install_by_name(
        &self,
        name: &str,
        armory: Option<&str>,
        force: bool,
    ) -> Result<InstallReport, ArmoryError> {
        if name == "all" {
            return self.install_all(armory).await;
        }
        if !force && self.commands.is_registered(name) {
            return Err(ArmoryError::AlreadyInstalled(name.to_string()));
        }
        let overwrite = if force { Overwrite::Always } else { Overwrite::Prompt };

        let packages = self.client.packages(armory)?;
        let mut candidates: Vec<&CachedPackage> = packages
            .iter()
            .filter(|p| p.kind() == PackageKind::Alias && p.package.command_name == name)
            .collect();
        if candidates.is_empty() {
            candidates = packages
                .iter()
                .filter(|p| {
                    p.kind() == PackageKind::Extension
                        && (p.name() == name || p.package.command_name == name || p.manifest.provides(name))
                })
                .collect();
        }

        let chosen = match candidates.as_slice() {
            [] => {
                if let Some(err) = self.client.signature_failure(name, armory)? {
                    return Err(err.into());
                }
                let bundle = self
                    .client
                    .bundles(armory)?
                    .into_iter()
                    .find(|b| b.name == name)
                    .ok_or_else(|| ArmoryError::NotFound(name.to_string()))?;
                return Ok(self.install_bundle(&bundle, armory, overwrite).await);
            }
            [only] => *only,
            many => {
                let options: Vec<String> = many
                    .iter()
                    .map(|p| format!("{} {} ({})", p.name(), p.version(), p.armory_name()))
                    .collect();
                let picked = self
                    .reporter
                    .select(&format!("'{name}' is available from several armories"), &options)
                    .ok_or(ArmoryError::Cancelled)?;
                *many.get(picked).ok_or(ArmoryError::Cancelled)?
            }
        };

        let installed = self.install_package(chosen, overwrite).await?;
        Ok(InstallReport {
            installed,
            failed: Vec::new(),
        })
    }

    /// Install every cached package of enabled armories, optionally only
    /// those of `armory`, after one confirmation.
    ///
    /// When several armories offer the same package the newest version is
    /// installed. Existing installs are replaced without prompting, and a
    /// failure does not stop the remaining installs.
    ///
    /// # Errors
    ///
    /// Returns [`ArmoryError::Cancelled`] if the operator declines, or
    /// [`ArmoryError::UnknownArmory`].
    pub async fn install_all(&self, armory: Option<&str>) -> Result<InstallReport, ArmoryError> {
        let packages = newest_per_package(self.client.packages(armory)?);
        let aliases = packages.iter().filter(|p| p.kind() == PackageKind::Alias).count();
        let extensions = packages.len() - aliases;
        if packages.is_empty() {
            self.reporter.info("No packages to install");
            return Ok(InstallReport::default());
        }
        if !self.reporter.confirm(
            &format!("Install {aliases} alias(es) and {extensions} extension(s)?"),
            true,
        ) {
            return Err(ArmoryError::Cancelled);
        }

        let mut report = InstallReport::default();
        let mut done: HashSet<(PackageKind, String)> = HashSet::new();
        for pkg in &packages {
            if done.contains(&package_identity(pkg)) {
                continue;
            }
            match self.install_tree(pkg, Overwrite::Always).await {
                Ok(registered) => {
                    for r in registered {
                        done.insert(manifest_identity(&r.manifest));
                        report.installed.push(r.manifest.name().to_string());
                    }
                }
                Err(e) => {
                    self.reporter
                        .error(&format!("Failed to install {}: {e}", pkg.name()));
                    report.failed.push((pkg.name().to_string(), e));
                }
            }
        }
        Ok(report)
    }

    /// Install every member of `bundle`. Members fail individually.
    pub async fn install_bundle(
        &self,
        bundle: &ArmoryBundle,
        armory: Option<&str>,
        overwrite: Overwrite,
    ) -> InstallReport {
        let packages = self.client.packages(armory).unwrap_or_default();
        let mut report = InstallReport::default();
        for member in &bundle.packages {
            let found = packages.iter().find(|p| {
                p.package.command_name == *member
                    || p.name() == member
                    || (p.kind() == PackageKind::Extension && p.manifest.provides(member))
            });
            let result = match found {
                Some(pkg) => self.install_package(pkg, overwrite).await,
                None => Err(ArmoryError::NotFound(member.clone())),
            };
            match result {
                Ok(installed) => report.installed.extend(installed),
                Err(e) => {
                    self.reporter
                        .error(&format!("Failed to install {member} from bundle {}: {e}", bundle.name));
                    report.failed.push((member.clone(), e));
                }
            }
        }
        report
    }

    /// Install `package` after any missing dependencies. Returns the names
    /// installed, dependencies first.
    ///
    /// # Errors
    ///
    /// Returns the first dependency or install failure.
    pub async fn install_package(
        &self,
        package: &CachedPackage,
        overwrite: Overwrite,
    ) -> Result<Vec<String>, ArmoryError> {
        let registered = self.install_tree(package, overwrite).await?;
        Ok(registered
            .iter()
            .map(|r| r.manifest.name().to_string())
            .collect())
    }

    async fn install_tree(
        &self,
        package: &CachedPackage,
        overwrite: Overwrite,
    ) -> Result<Vec<Registered>, ArmoryError> {
        let mut installed = Vec::new();
        if package.kind() == PackageKind::Extension {
            let candidates = self.client.packages(None)?;
            let deps = DependencyResolver::new(&candidates, self.commands).resolve(package)?;
            for dep in deps {
                self.reporter.info(&format!(
                    "Installing dependency {} for {}",
                    dep.name(),
                    package.name()
                ));
                installed.push(self.install_one(dep.id(), overwrite).await?);
            }
        }
        installed.push(self.install_one(package.id(), overwrite).await?);
        Ok(installed)
    }

    async fn install_one(
        &self,
        id: PackageId,
        overwrite: Overwrite,
    ) -> Result<Registered, ArmoryError> {
        let verified = Requested::new(id).verify_metadata(self.client)?;
        self.reporter.info(&format!(
            "Installing {} {} {} ({})",
            verified.cached.kind(),
            verified.cached.name(),
            verified.cached.version(),
            verified.armory.name
        ));
        let registered = verified
            .fetch(self.client.refresher())
            .await?
            .verify()?
            .extract(self.client.dirs(), overwrite, self.reporter)?
            .register(self.commands)?;
        self.reporter.success(&format!(
            "Installed {} {} to {}",
            registered.manifest.name(),
            registered.manifest.version(),
            registered.dir.display()
        ));
        Ok(registered)
    }
}

// Aliases are identified by command name, extensions by package name.
fn package_identity(pkg: &CachedPackage) -> (PackageKind, String) {
    match pkg.kind() {
        PackageKind::Alias => (PackageKind::Alias, pkg.package.command_name.clone()),
        PackageKind::Extension => (PackageKind::Extension, pkg.name().to_string()),
    }
}

fn manifest_identity(manifest: &PackageManifest) -> (PackageKind, String) {
    match manifest {
        PackageManifest::Alias(alias) => (PackageKind::Alias, alias.command_name.clone()),
        PackageManifest::Extension(ext) => (PackageKind::Extension, ext.name.clone()),
    }
}

// One entry per identity, keeping the newest version.
fn newest_per_package(packages: Vec<CachedPackage>) -> Vec<CachedPackage> {
    let mut newest: HashMap<(PackageKind, String), CachedPackage> = HashMap::new();
    for pkg in packages {
        let identity = package_identity(&pkg);
        match newest.get(&identity) {
            Some(current) if !version::is_newer(current.version(), pkg.version()) => {}
            _ => {
                newest.insert(identity, pkg);
            }
        }
    }
    let mut out: Vec<CachedPackage> = newest.into_values().collect();
    out.sort_by(|a, b| a.kind().cmp(&b.kind()).then_with(|| a.name().cmp(b.name())));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpConfig;
    use crate::installed::InstalledCommands;
    use crate::minisign::testing::signing_key;
    use crate::registry::ArmoryRegistry;
    use crate::reporter::NullReporter;
    use crate::sources::testing::{MockPackage, serve_armory, serve_armory_with_bundles};
    use tempfile::{TempDir, tempdir};

    async fn session(dir: &TempDir, armories: Vec<ArmoryConfig>) -> ArmoryClient {
        let dirs = AppDirs::new(dir.path());
        let mut default = ArmoryConfig::builtin_default();
        default.enabled = false;
        let mut configs = armories;
        configs.push(default);
        let registry = ArmoryRegistry::with_configs(dirs.config_path(), configs);
        let client = ArmoryClient::with_registry(dirs, registry, &HttpConfig::default()).unwrap();
        let report = client.refresh().await;
        assert!(report.is_clean(), "{:?}", report.failures);
        client
    }

    #[tokio::test]
    async fn test_install_alias() {
        let mut server = mockito::Server::new_async().await;
        let (alpha, _m) = serve_armory(
            &mut server,
            "alpha",
            &signing_key(1),
            &[MockPackage::alias("foo", "v1.0.0")],
        )
        .await;
        let dir = tempdir().unwrap();
        let client = session(&dir, vec![alpha]).await;
        let commands = InstalledCommands::default();

        let report = InstallOrchestrator::new(&client, &commands, &NullReporter)
            .install_by_name("foo", None, false)
            .await
            .unwrap();

        assert_eq!(report.installed, vec!["foo"]);
        let installed = client.dirs().alias_dir("foo");
        assert!(installed.join(ALIAS_MANIFEST_FILE).exists());
        assert_eq!(std::fs::read(installed.join("foo.exe")).unwrap(), b"foo");
        assert!(commands.is_registered("foo"));
    }

    #[tokio::test]
    async fn test_already_installed_requires_force() {
        let mut server = mockito::Server::new_async().await;
        let (alpha, _m) = serve_armory(
            &mut server,
            "alpha",
            &signing_key(1),
            &[MockPackage::alias("foo", "v1.0.0")],
        )
        .await;
        let dir = tempdir().unwrap();
        let client = session(&dir, vec![alpha]).await;
        let commands = InstalledCommands::default();
        let installer = InstallOrchestrator::new(&client, &commands, &NullReporter);
        installer.install_by_name("foo", None, false).await.unwrap();

        assert!(matches!(
            installer.install_by_name("foo", None, false).await,
            Err(ArmoryError::AlreadyInstalled(_))
        ));
        let forced = installer.install_by_name("foo", None, true).await.unwrap();
        assert_eq!(forced.installed, vec!["foo"]);
    }

    #[tokio::test]
    async fn test_existing_directory_prompt_declined() {
        let mut server = mockito::Server::new_async().await;
        let (alpha, _m) = serve_armory(
            &mut server,
            "alpha",
            &signing_key(1),
            &[MockPackage::alias("foo", "v1.0.0")],
        )
        .await;
        let dir = tempdir().unwrap();
        let client = session(&dir, vec![alpha]).await;
        let leftover = client.dirs().alias_dir("foo");
        std::fs::create_dir_all(&leftover).unwrap();
        std::fs::write(leftover.join("keep"), b"x").unwrap();
        let commands = InstalledCommands::default();

        let err = InstallOrchestrator::new(&client, &commands, &NullReporter)
            .install_by_name("foo", None, false)
            .await
            .unwrap_err();

        assert!(matches!(err, ArmoryError::Cancelled));
        assert!(leftover.join("keep").exists());
    }

    #[tokio::test]
    async fn test_bad_archive_signature_writes_nothing() {
        let mut server = mockito::Server::new_async().await;
        let (alpha, _m) = serve_armory(
            &mut server,
            "alpha",
            &signing_key(1),
            &[MockPackage::alias("foo", "v1.0.0").tampered()],
        )
        .await;
        let dir = tempdir().unwrap();
        let client = session(&dir, vec![alpha]).await;
        let commands = InstalledCommands::default();

        let err = InstallOrchestrator::new(&client, &commands, &NullReporter)
            .install_by_name("foo", None, false)
            .await
            .unwrap_err();

        assert!(err.is_signature_failure());
        assert!(!client.dirs().aliases_dir().exists());
        assert!(!commands.is_registered("foo"));
    }

    #[tokio::test]
    async fn test_dependencies_installed_first() {
        let mut server = mockito::Server::new_async().await;
        let (alpha, _m) = serve_armory(
            &mut server,
            "alpha",
            &signing_key(1),
            &[
                MockPackage::extension("nanodump", "v0.0.5").depends_on("coff-loader"),
                MockPackage::extension("coff-loader", "v1.0.0"),
            ],
        )
        .await;
        let dir = tempdir().unwrap();
        let client = session(&dir, vec![alpha]).await;
        let commands = InstalledCommands::default();

        let report = InstallOrchestrator::new(&client, &commands, &NullReporter)
            .install_by_name("nanodump", None, false)
            .await
            .unwrap();

        assert_eq!(report.installed, vec!["coff-loader", "nanodump"]);
        let ext_dir = client.dirs().extension_dir("coff-loader");
        assert!(ext_dir.join("coff-loader.x64.dll").exists());
    }

    #[tokio::test]
    async fn test_install_all_attempts_every_package() {
        let mut server = mockito::Server::new_async().await;
        let (alpha, _m) = serve_armory(
            &mut server,
            "alpha",
            &signing_key(1),
            &[
                MockPackage::alias("a1", "v1"),
                MockPackage::alias("a2", "v1"),
                MockPackage::extension("e1", "v1"),
                MockPackage::extension("e2", "v1"),
                MockPackage::extension("e3", "v1").tampered(),
            ],
        )
        .await;
        let dir = tempdir().unwrap();
        let client = session(&dir, vec![alpha]).await;
        let commands = InstalledCommands::default();

        let report = InstallOrchestrator::new(&client, &commands, &NullReporter)
            .install_by_name("all", None, false)
            .await
            .unwrap();

        assert_eq!(report.attempts(), 5);
        assert_eq!(report.installed.len(), 4);
        assert_eq!(report.failed[0].0, "e3");
    }

    #[tokio::test]
    async fn test_install_all_keeps_alias_and_extension_with_same_name() {
        let mut server = mockito::Server::new_async().await;
        let (alpha, _a) = serve_armory(
            &mut server,
            "alpha",
            &signing_key(1),
            &[MockPackage::alias("foo", "v1")],
        )
        .await;
        let (beta, _b) = serve_armory(
            &mut server,
            "beta",
            &signing_key(2),
            &[MockPackage::extension("foo", "v1")],
        )
        .await;
        let dir = tempdir().unwrap();
        let client = session(&dir, vec![alpha, beta]).await;
        let commands = InstalledCommands::default();

        let report = InstallOrchestrator::new(&client, &commands, &NullReporter)
            .install_all(None)
            .await
            .unwrap();

        assert_eq!(report.attempts(), 2);
        assert!(report.failed.is_empty());
        assert!(client.dirs().alias_dir("foo").join(ALIAS_MANIFEST_FILE).exists());
        assert!(
            client
                .dirs()
                .extension_dir("foo")
                .join(EXTENSION_MANIFEST_FILE)
                .exists()
        );
    }

    #[tokio::test]
    async fn test_listed_package_with_bad_signature_is_not_reported_missing() {
        let mut server = mockito::Server::new_async().await;
        let (alpha, _m) = serve_armory(
            &mut server,
            "alpha",
            &signing_key(1),
            &[MockPackage::alias("foo", "v1.0.0").wrong_signer()],
        )
        .await;
        let dir = tempdir().unwrap();
        let dirs = AppDirs::new(dir.path());
        let mut default = ArmoryConfig::builtin_default();
        default.enabled = false;
        let registry = ArmoryRegistry::with_configs(dirs.config_path(), vec![alpha, default]);
        let client = ArmoryClient::with_registry(dirs, registry, &HttpConfig::default()).unwrap();
        let report = client.refresh().await;
        assert_eq!(report.failures.len(), 1);
        let commands = InstalledCommands::default();

        let err = InstallOrchestrator::new(&client, &commands, &NullReporter)
            .install_by_name("foo", None, false)
            .await
            .unwrap_err();

        assert!(err.is_signature_failure(), "{err:?}");
        assert!(!client.dirs().aliases_dir().exists());
    }

    #[tokio::test]
    async fn test_ambiguous_name_needs_selection() {
        let mut server = mockito::Server::new_async().await;
        let (alpha, _a) = serve_armory(
            &mut server,
            "alpha",
            &signing_key(1),
            &[MockPackage::alias("foo", "v1.0.0")],
        )
        .await;
        let (beta, _b) = serve_armory(
            &mut server,
            "beta",
            &signing_key(2),
            &[MockPackage::alias("foo", "v1.1.0")],
        )
        .await;
        let dir = tempdir().unwrap();
        let client = session(&dir, vec![alpha, beta]).await;
        let commands = InstalledCommands::default();
        let installer = InstallOrchestrator::new(&client, &commands, &NullReporter);

        assert!(matches!(
            installer.install_by_name("foo", None, false).await,
            Err(ArmoryError::Cancelled)
        ));
        let report = installer
            .install_by_name("foo", Some("beta"), false)
            .await
            .unwrap();
        assert_eq!(report.installed, vec!["foo"]);
    }

    #[tokio::test]
    async fn test_bundle_is_best_effort() {
        let mut server = mockito::Server::new_async().await;
        let (alpha, _m) = serve_armory_with_bundles(
            &mut server,
            "alpha",
            &signing_key(1),
            &[MockPackage::alias("foo", "v1"), MockPackage::alias("bar", "v1")],
            &[("kit", &["foo", "missing", "bar"][..])],
        )
        .await;
        let dir = tempdir().unwrap();
        let client = session(&dir, vec![alpha]).await;
        let commands = InstalledCommands::default();

        let report = InstallOrchestrator::new(&client, &commands, &NullReporter)
            .install_by_name("kit", None, false)
            .await
            .unwrap();

        assert_eq!(report.installed, vec!["foo", "bar"]);
        assert_eq!(report.failed.len(), 1);
        assert!(matches!(report.failed[0].1, ArmoryError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_unknown_name() {
        let mut server = mockito::Server::new_async().await;
        let (alpha, _m) = serve_armory(&mut server, "alpha", &signing_key(1), &[]).await;
        let dir = tempdir().unwrap();
        let client = session(&dir, vec![alpha]).await;
        let commands = InstalledCommands::default();

        let err = InstallOrchestrator::new(&client, &commands, &NullReporter)
            .install_by_name("nope", None, false)
            .await
            .unwrap_err();
        assert!(matches!(err, ArmoryError::NotFound(_)));
    }
}
