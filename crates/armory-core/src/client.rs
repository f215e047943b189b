//! Session facade over the registry, the caches and the refresher.
//!
//! Every registry mutation goes through [`ArmoryClient`] so that verification,
//! cache eviction, persistence and the follow-up refresh happen in one order:
//! nothing is committed to the registry until the armory it describes has
//! been fetched and verified (unless the operator explicitly keeps an
//! unverified config after a failed modify).

use std::collections::HashSet;
use std::sync::Arc;

use armory_schema::{ArmoryBundle, ArmoryConfig, ArmoryIndex, PackageKind};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::cache::{ArmoryCache, CacheEntry, CachedPackage};
use crate::error::{ArmoryError, FetchError};
use crate::http::{HttpConfig, check_scheme};
use crate::minisign::PublicKey;
use crate::paths::AppDirs;
use crate::refresh::{RefreshReport, Refresher};
use crate::registry::ArmoryRegistry;
use crate::reporter::Reporter;
use crate::snapshot;

/// Fields to change on an existing armory. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArmoryChanges {
    /// New name
    pub name: Option<String>,
    /// New index URL
    pub repo_url: Option<String>,
    /// New public key
    pub public_key: Option<String>,
    /// New static authorization value
    pub authorization: Option<String>,
    /// New authorization command
    pub authorization_cmd: Option<String>,
}

impl ArmoryChanges {
    /// Whether no field would change.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.repo_url.is_none()
            && self.public_key.is_none()
            && self.authorization.is_none()
            && self.authorization_cmd.is_none()
    }

    /// `current` with the changes applied.
    pub fn apply(&self, current: &ArmoryConfig) -> ArmoryConfig {
        let mut next = current.clone();
        if let Some(name) = &self.name {
            next.name.clone_from(name);
        }
        if let Some(url) = &self.repo_url {
            next.repo_url.clone_from(url);
        }
        if let Some(key) = &self.public_key {
            next.public_key.clone_from(key);
        }
        if let Some(auth) = &self.authorization {
            next.authorization.clone_from(auth);
        }
        if let Some(cmd) = &self.authorization_cmd {
            next.authorization_cmd.clone_from(cmd);
        }
        next
    }
}

/// One operator session: configured armories plus what was fetched from them.
#[derive(Debug)]
pub struct ArmoryClient {
    dirs: AppDirs,
    registry: ArmoryRegistry,
    refresher: Refresher,
}

impl ArmoryClient {
    /// Load the registry under `dirs` and the caches saved by the last
    /// session.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file is unreadable or the HTTP clients
    /// cannot be built.
    pub fn open(dirs: AppDirs, http: &HttpConfig) -> Result<Self, ArmoryError> {
        let registry = ArmoryRegistry::load(dirs.config_path())?;
        Self::with_registry(dirs, registry, http)
    }

    /// Session over an already loaded registry.
    ///
    /// Cache entries saved under `dirs` are restored unless the cache is
    /// being ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP clients cannot be built.
    pub fn with_registry(
        dirs: AppDirs,
        registry: ArmoryRegistry,
        http: &HttpConfig,
    ) -> Result<Self, ArmoryError> {
        let refresher = Refresher::new(Arc::new(ArmoryCache::default()), http)?;
        if !http.ignore_cache {
            snapshot::restore(refresher.cache(), &dirs.cache_path(), &registry.list());
        }
        Ok(Self {
            dirs,
            registry,
            refresher,
        })
    }

    /// Application directories
    pub fn dirs(&self) -> &AppDirs {
        &self.dirs
    }

    /// Configured armories
    pub fn registry(&self) -> &ArmoryRegistry {
        &self.registry
    }

    /// Fetch caches
    pub fn cache(&self) -> &Arc<ArmoryCache> {
        self.refresher.cache()
    }

    /// Refresher used for every fetch of this session
    pub fn refresher(&self) -> &Refresher {
        &self.refresher
    }

    /// Refresh stale or failed entries of every enabled armory, then save
    /// the caches for the next session.
    pub async fn refresh(&self) -> RefreshReport {
        let report = self.refresher.all(&self.registry.list()).await;
        self.save_cache();
        report
    }

    fn save_cache(&self) {
        if let Err(e) = snapshot::save(self.cache(), &self.dirs.cache_path()) {
            warn!("Could not save fetch cache: {e}");
        }
    }

    /// Drop both caches and refetch everything.
    pub async fn refresh_forced(&self) -> RefreshReport {
        self.cache().clear();
        self.refresh().await
    }

    /// Verify and register a new armory, then refresh.
    ///
    /// The URL scheme and public key are checked before any request, and the
    /// index is fetched and verified before the registry changes. When `save`
    /// is false the armory only lives for this session.
    ///
    /// # Errors
    ///
    /// Returns a collision error, a scheme or key error, or the verification
    /// failure. The registry is unchanged on error.
    pub async fn add(
        &mut self,
        armory: ArmoryConfig,
        save: bool,
    ) -> Result<RefreshReport, ArmoryError> {
        self.registry.check_candidate(&armory, None)?;
        let entry = self.verify(&armory).await?;

        self.cache().indexes.store(armory.public_key.clone(), entry);
        info!("Added armory '{}'", armory.name);
        self.registry.insert(armory)?;
        if save {
            self.registry.save()?;
        }
        Ok(self.refresh().await)
    }

    /// Remove an armory and evict everything fetched on its behalf.
    ///
    /// # Errors
    ///
    /// Returns [`ArmoryError::UnknownArmory`] or a persistence error.
    pub fn remove(&mut self, name: &str) -> Result<ArmoryConfig, ArmoryError> {
        let removed = self.registry.remove(name)?;
        self.cache().evict_armory(&removed.public_key);
        self.registry.save()?;
        self.save_cache();
        Ok(removed)
    }

    /// Enable or disable an armory, persist, then refresh.
    ///
    /// Disabling evicts the armory's cache entries before the refresh, so
    /// none of its packages remain visible.
    ///
    /// # Errors
    ///
    /// Returns [`ArmoryError::UnknownArmory`] or a persistence error.
    pub async fn set_enabled(
        &mut self,
        name: &str,
        enabled: bool,
    ) -> Result<RefreshReport, ArmoryError> {
        let updated = self.registry.set_enabled(name, enabled)?;
        if !enabled {
            self.cache().evict_armory(&updated.public_key);
        }
        self.registry.save()?;
        Ok(self.refresh().await)
    }

    /// Change fields of an existing armory and re-verify it.
    ///
    /// If verification fails the operator is asked whether to revert; the
    /// default reverts, leaving the registry and caches untouched. Declining
    /// keeps the unverified config. On commit the old key's cache entries
    /// are evicted and a refresh follows.
    ///
    /// # Errors
    ///
    /// Returns [`ArmoryError::UnknownArmory`], a collision error, the
    /// verification failure when the operator reverts, or a persistence
    /// error.
    pub async fn modify(
        &mut self,
        name: &str,
        changes: &ArmoryChanges,
        reporter: &dyn Reporter,
        save: bool,
    ) -> Result<RefreshReport, ArmoryError> {
        let current = self
            .registry
            .get(name)
            .ok_or_else(|| ArmoryError::UnknownArmory(name.to_string()))?;
        if changes.is_empty() {
            reporter.warning(&format!("No changes for armory '{name}'"));
            return Ok(RefreshReport::default());
        }

        let staged = changes.apply(&current);
        self.registry.check_candidate(&staged, Some(name))?;

        let verified = match self.verify(&staged).await {
            Ok(entry) => Some(entry),
            Err(e) => {
                reporter.error(&format!("Could not verify armory '{}': {e}", staged.name));
                if reporter.confirm("Revert to the previous configuration?", true) {
                    return Err(e);
                }
                reporter.warning(&format!("Keeping unverified configuration for '{}'", staged.name));
                None
            }
        };

        self.cache().evict_armory(&current.public_key);
        self.registry.replace(name, staged.clone())?;
        if let Some(entry) = verified {
            self.cache().indexes.store(staged.public_key.clone(), entry);
        }
        if save {
            self.registry.save()?;
        }
        debug!("Modified armory '{name}' -> '{}'", staged.name);
        Ok(self.refresh().await)
    }

    /// Forget every configured armory, clear the caches and refresh the
    /// built-in default.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the config file cannot be removed.
    pub async fn reset(&mut self) -> Result<RefreshReport, ArmoryError> {
        self.registry.reset()?;
        self.cache().clear();
        Ok(self.refresh().await)
    }

    async fn verify(&self, armory: &ArmoryConfig) -> Result<CacheEntry<ArmoryIndex>, ArmoryError> {
        check_scheme(&armory.repo_url)?;
        PublicKey::parse(&armory.public_key)?;
        Ok(self.refresher.verify_one(armory).await?)
    }

    fn enabled_keys(&self) -> HashSet<String> {
        self.registry
            .enabled()
            .into_iter()
            .map(|a| a.public_key)
            .collect()
    }

    /// Cached packages of enabled armories, optionally only those of the
    /// armory named `armory`.
    ///
    /// # Errors
    ///
    /// Returns [`ArmoryError::UnknownArmory`] if `armory` is not configured.
    pub fn packages(&self, armory: Option<&str>) -> Result<Vec<CachedPackage>, ArmoryError> {
        let filter = self.armory_key(armory)?;
        let enabled = self.enabled_keys();
        Ok(self
            .cache()
            .packages(filter.as_deref())
            .into_iter()
            .filter(|p| enabled.contains(p.armory_pk()))
            .collect())
    }

    /// Bundles of enabled armories, optionally only those of `armory`.
    ///
    /// # Errors
    ///
    /// Returns [`ArmoryError::UnknownArmory`] if `armory` is not configured.
    pub fn bundles(&self, armory: Option<&str>) -> Result<Vec<ArmoryBundle>, ArmoryError> {
        let filter = self.armory_key(armory)?;
        let enabled: HashSet<String> = self
            .registry
            .enabled()
            .into_iter()
            .map(|a| a.name)
            .collect();
        Ok(self
            .cache()
            .bundles(filter.as_deref())
            .into_iter()
            .filter(|b| enabled.contains(&b.armory_name))
            .collect())
    }

    fn armory_key(&self, armory: Option<&str>) -> Result<Option<String>, ArmoryError> {
        armory
            .map(|name| {
                self.registry
                    .get(name)
                    .map(|a| a.public_key)
                    .ok_or_else(|| ArmoryError::UnknownArmory(name.to_string()))
            })
            .transpose()
    }

    /// Packages of enabled armories whose name or one of whose commands
    /// matches `pattern`.
    pub fn search(&self, pattern: &Regex) -> Vec<CachedPackage> {
        let enabled = self.enabled_keys();
        self.cache()
            .packages(None)
            .into_iter()
            .filter(|p| enabled.contains(p.armory_pk()))
            .filter(|p| {
                pattern.is_match(p.name())
                    || p.manifest.command_names().iter().any(|c| pattern.is_match(c))
            })
            .collect()
    }

    /// Packages named `name`, then extensions that provide a command `name`.
    pub fn lookup(&self, name: &str) -> Vec<CachedPackage> {
        let mut packages = self.packages(None).unwrap_or_default();
        packages.retain(|p| {
            p.name() == name
                || p.package.command_name == name
                || (p.kind() == PackageKind::Extension && p.manifest.provides(name))
        });
        packages.sort_by_key(|p| p.name() != name);
        packages
    }

    /// Signature failure recorded for a package named `name` (or with that
    /// command name) listed by an enabled armory, optionally only `armory`.
    ///
    /// Such packages never reach [`Self::packages`], so callers that find no
    /// candidate check here before reporting "not found".
    ///
    /// # Errors
    ///
    /// Returns [`ArmoryError::UnknownArmory`] if `armory` is not configured.
    pub fn signature_failure(
        &self,
        name: &str,
        armory: Option<&str>,
    ) -> Result<Option<FetchError>, ArmoryError> {
        let filter = self.armory_key(armory)?;
        let enabled = self.enabled_keys();
        let cache = self.cache();
        for (pk, entry) in cache.indexes.entries() {
            if !enabled.contains(&pk) || filter.as_deref().is_some_and(|want| want != pk) {
                continue;
            }
            let Some(index) = entry.value() else {
                continue;
            };
            let failure = index
                .packages()
                .filter(|p| p.name == name || p.command_name == name)
                .filter_map(|p| cache.packages.get(p.id().as_str()))
                .find_map(|e| e.error().filter(|err| err.is_signature()).cloned());
            if failure.is_some() {
                return Ok(failure);
            }
        }
        Ok(None)
    }

    /// Error of the last index fetch of `armory`, if it failed.
    pub fn index_error(&self, armory: &ArmoryConfig) -> Option<FetchError> {
        self.cache()
            .indexes
            .get(&armory.public_key)
            .and_then(|entry| entry.error().cloned())
    }
}
