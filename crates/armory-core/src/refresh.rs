//! Concurrent refresh of the index and package caches.
//!
//! A refresh runs in two fan-out rounds: one task per enabled armory for its
//! index, then one task per listed package for a signature-only fetch. Each
//! task computes a complete [`CacheEntry`] and publishes it with a single
//! store, so a failure in one task never affects its siblings.

use std::collections::HashSet;
use std::sync::Arc;

use armory_schema::{ArmoryConfig, ArmoryIndex, ArmoryPackage};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::cache::{ArmoryCache, CacheEntry, CachedPackage};
use crate::config;
use crate::error::FetchError;
use crate::http::{HttpClients, HttpConfig};
use crate::sources::{FetchedPackage, Source, SourceParser, decode_manifest};

/// One failed fetch of a refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshFailure {
    /// Armory the fetch was made for
    pub armory: String,
    /// Package name, or `None` for the armory's index
    pub package: Option<String>,
    /// What went wrong
    pub error: FetchError,
}

/// Outcome of a refresh.
#[derive(Debug, Clone, Default)]
pub struct RefreshReport {
    /// Indexes fetched and verified
    pub indexes_fetched: usize,
    /// Package signatures fetched and verified
    pub packages_fetched: usize,
    /// Per-armory and per-package failures
    pub failures: Vec<RefreshFailure>,
}

impl RefreshReport {
    /// Whether every fetch succeeded.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn failed(&mut self, armory: &str, package: Option<&str>, error: FetchError) {
        match package {
            Some(pkg) => warn!("Package '{pkg}' from armory '{armory}': {error}"),
            None => warn!("Armory '{armory}': {error}"),
        }
        self.failures.push(RefreshFailure {
            armory: armory.to_string(),
            package: package.map(str::to_string),
            error,
        });
    }
}

// Result of the first round for one armory.
struct IndexRound {
    armory: ArmoryConfig,
    authorized: Result<ArmoryConfig, FetchError>,
    fetched: Option<Result<ArmoryIndex, FetchError>>,
}

/// Drives fetches into an [`ArmoryCache`].
#[derive(Debug, Clone)]
pub struct Refresher {
    cache: Arc<ArmoryCache>,
    clients: HttpClients,
    ignore_cache: bool,
    limit: Option<Arc<Semaphore>>,
}

impl Refresher {
    /// Refresher writing into `cache` with clients built from `http`.
    ///
    /// # Errors
    ///
    /// See [`HttpClients::new`].
    pub fn new(cache: Arc<ArmoryCache>, http: &HttpConfig) -> Result<Self, FetchError> {
        Ok(Self {
            cache,
            clients: HttpClients::new(http)?,
            ignore_cache: http.ignore_cache,
            limit: http
                .max_concurrency
                .filter(|n| *n > 0)
                .map(|n| Arc::new(Semaphore::new(n))),
        })
    }

    /// The cache being refreshed.
    pub fn cache(&self) -> &Arc<ArmoryCache> {
        &self.cache
    }

    /// Refresh every enabled armory in `armories` and the packages they list.
    ///
    /// Fresh successful entries are skipped unless the cache is being
    /// ignored. Packages of an armory whose index was fetched in this round
    /// are always re-fetched. Afterwards the cache only holds entries of
    /// enabled armories, and only packages their indexes still list.
    pub async fn all(&self, armories: &[ArmoryConfig]) -> RefreshReport {
        let mut report = RefreshReport::default();
        let enabled: Vec<&ArmoryConfig> = armories.iter().filter(|a| a.enabled).collect();

        let mut rounds = JoinSet::new();
        for armory in &enabled {
            let armory = (*armory).clone();
            let needs_index = self
                .cache
                .indexes
                .needs_refresh(&armory.public_key, self.ignore_cache);
            let needs_credentials = needs_index || self.has_stale_packages(&armory.public_key);
            let clients = self.clients.clone();
            let limit = self.limit.clone();
            rounds.spawn(async move {
                let _permit = permit(limit).await;
                // Nothing is fetched for a fully fresh armory.
                let authorized = if needs_credentials {
                    config::authorized(&armory).await
                } else {
                    Ok(armory.clone())
                };
                let fetched = match (&authorized, needs_index) {
                    (_, false) => None,
                    (Ok(authed), true) => Some(fetch_index(&clients, authed).await),
                    (Err(e), true) => Some(Err(e.clone())),
                };
                IndexRound {
                    armory,
                    authorized,
                    fetched,
                }
            });
        }

        // (authorized armory, index, force packages)
        let mut listed: Vec<(ArmoryConfig, ArmoryIndex, bool)> = Vec::new();
        while let Some(joined) = rounds.join_next().await {
            let round = match joined {
                Ok(round) => round,
                Err(e) => {
                    warn!("Index task failed: {e}");
                    continue;
                }
            };
            let armory = round.armory;
            let refetched = round.fetched.is_some();
            if let Some(outcome) = round.fetched {
                match &outcome {
                    Ok(index) => {
                        debug!("Armory '{}' lists {} packages", armory.name, index.len());
                        report.indexes_fetched += 1;
                    }
                    Err(e) => report.failed(&armory.name, None, e.clone()),
                }
                self.cache.indexes.store(
                    armory.public_key.clone(),
                    CacheEntry::new(armory.provenance(), outcome),
                );
            }

            let authed = match round.authorized {
                Ok(authed) => authed,
                Err(e) => {
                    if !refetched {
                        report.failed(&armory.name, None, e);
                    }
                    continue;
                }
            };
            let index = self
                .cache
                .indexes
                .get(&armory.public_key)
                .and_then(|entry| entry.value().cloned());
            if let Some(index) = index {
                listed.push((authed, index, refetched || self.ignore_cache));
            }
        }

        let mut packages = JoinSet::new();
        for (armory, index, force) in &listed {
            for pkg in index.packages() {
                let id = pkg.id();
                if !self.cache.packages.needs_refresh(id.as_str(), *force) {
                    continue;
                }
                let armory = armory.clone();
                let pkg = pkg.clone();
                let clients = self.clients.clone();
                let limit = self.limit.clone();
                packages.spawn(async move {
                    let _permit = permit(limit).await;
                    let outcome = fetch_package_metadata(&clients, &armory, &pkg).await;
                    (armory, pkg, outcome)
                });
            }
        }

        while let Some(joined) = packages.join_next().await {
            let (armory, pkg, outcome) = match joined {
                Ok(done) => done,
                Err(e) => {
                    warn!("Package task failed: {e}");
                    continue;
                }
            };
            match &outcome {
                Ok(_) => report.packages_fetched += 1,
                Err(e) => report.failed(&armory.name, Some(&pkg.name), e.clone()),
            }
            self.cache.packages.store(
                pkg.id().as_str(),
                CacheEntry::new(armory.provenance(), outcome),
            );
        }

        for (armory, index, _) in &listed {
            let ids: HashSet<String> = index.packages().map(|p| p.id().to_string()).collect();
            let pruned = self.cache.prune_unlisted(&armory.public_key, &ids);
            if pruned > 0 {
                debug!("Dropped {pruned} unlisted packages of '{}'", armory.name);
            }
        }
        let active: HashSet<String> = enabled.iter().map(|a| a.public_key.clone()).collect();
        self.cache.retain_armories(&active);

        report
    }

    // Whether a package listed by the cached index of `armory_pk` is stale.
    fn has_stale_packages(&self, armory_pk: &str) -> bool {
        self.cache.indexes.get(armory_pk).is_some_and(|entry| {
            entry.value().is_some_and(|index| {
                index
                    .packages()
                    .any(|p| self.cache.packages.needs_refresh(p.id().as_str(), false))
            })
        })
    }

    /// Fetch and verify the index of `armory` regardless of cache state.
    ///
    /// The entry is returned, not stored; callers publish it once they commit
    /// to the armory.
    ///
    /// # Errors
    ///
    /// Returns the fetch or verification error.
    pub async fn verify_one(
        &self,
        armory: &ArmoryConfig,
    ) -> Result<CacheEntry<ArmoryIndex>, FetchError> {
        let authed = config::authorized(armory).await?;
        let index = fetch_index(&self.clients, &authed).await?;
        Ok(CacheEntry::new(armory.provenance(), Ok(index)))
    }

    /// Fetch the signature and archive of `package` through the same source
    /// its metadata came from.
    ///
    /// # Errors
    ///
    /// Returns the fetch or trusted comment verification error.
    pub async fn fetch_artifact(
        &self,
        armory: &ArmoryConfig,
        package: &ArmoryPackage,
    ) -> Result<FetchedPackage, FetchError> {
        let authed = config::authorized(armory).await?;
        Source::for_url(&package.repo_url, &self.clients)?
            .fetch_package(&authed, package, false)
            .await
    }
}

async fn permit(limit: Option<Arc<Semaphore>>) -> Option<OwnedSemaphorePermit> {
    match limit {
        Some(semaphore) => semaphore.acquire_owned().await.ok(),
        None => None,
    }
}

async fn fetch_index(
    clients: &HttpClients,
    armory: &ArmoryConfig,
) -> Result<ArmoryIndex, FetchError> {
    Source::for_url(&armory.repo_url, clients)?
        .fetch_index(armory)
        .await
}

async fn fetch_package_metadata(
    clients: &HttpClients,
    armory: &ArmoryConfig,
    package: &ArmoryPackage,
) -> Result<CachedPackage, FetchError> {
    let fetched = Source::for_url(&package.repo_url, clients)?
        .fetch_package(armory, package, true)
        .await?;
    let manifest = decode_manifest(package, &fetched.signature)?;
    Ok(CachedPackage {
        package: package.clone(),
        signature: fetched.signature,
        manifest,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::minisign::testing::{public_key_text, signing_key};
    use crate::sources::testing::{
        MockPackage, alias_manifest, generic_index_body, generic_package_body, serve_armory,
        tar_gz,
    };
    use armory_schema::PackageId;

    fn refresher() -> Refresher {
        Refresher::new(Arc::new(ArmoryCache::default()), &HttpConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_refresh_populates_both_caches() {
        let mut server = mockito::Server::new_async().await;
        let (alpha, _mocks) = serve_armory(
            &mut server,
            "alpha",
            &signing_key(1),
            &[
                MockPackage::alias("foo", "v1.0.0"),
                MockPackage::extension("bar", "v2.0.0"),
            ],
        )
        .await;

        let refresher = refresher();
        let report = refresher.all(std::slice::from_ref(&alpha)).await;

        assert!(report.is_clean(), "{:?}", report.failures);
        assert_eq!(report.indexes_fetched, 1);
        assert_eq!(report.packages_fetched, 2);
        let packages = refresher.cache().packages(Some(&alpha.public_key));
        let names: Vec<&str> = packages.iter().map(CachedPackage::name).collect();
        assert_eq!(names, vec!["bar", "foo"]);
        assert_eq!(packages[1].version(), "v1.0.0");
    }

    #[tokio::test]
    async fn test_fresh_entries_cause_no_requests() {
        let mut server = mockito::Server::new_async().await;
        let key = signing_key(1);
        let pkg_url = format!("{}/pkg/foo", server.url());
        let index = serde_json::json!({"aliases": [{
            "name": "foo", "command_name": "foo", "repo_url": pkg_url,
            "public_key": public_key_text(&key),
        }]})
        .to_string();
        let archive = tar_gz(&[("alias.json", b"{}")]);
        let index_mock = server
            .mock("GET", "/index")
            .with_body(generic_index_body(&key, &index))
            .expect(1)
            .create_async()
            .await;
        let pkg_mock = server
            .mock("GET", "/pkg/foo")
            .with_body(generic_package_body(
                &key,
                &alias_manifest("foo", "v1.0.0"),
                &archive,
                "https://unused.example/foo.tar.gz",
            ))
            .expect(1)
            .create_async()
            .await;

        let alpha = crate::sources::testing::armory("alpha", &key, &format!("{}/index", server.url()));
        let refresher = refresher();
        refresher.all(std::slice::from_ref(&alpha)).await;
        let second = refresher.all(std::slice::from_ref(&alpha)).await;

        assert_eq!(second.indexes_fetched, 0);
        assert_eq!(second.packages_fetched, 0);
        index_mock.assert_async().await;
        pkg_mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_failed_entry_is_refetched() {
        let mut server = mockito::Server::new_async().await;
        let (alpha, _mocks) =
            serve_armory(&mut server, "alpha", &signing_key(1), &[]).await;

        let refresher = refresher();
        refresher.cache().indexes.store(
            alpha.public_key.clone(),
            CacheEntry::new(
                alpha.provenance(),
                Err(FetchError::Network("reset".to_string())),
            ),
        );
        let report = refresher.all(std::slice::from_ref(&alpha)).await;

        assert_eq!(report.indexes_fetched, 1);
        let entry = refresher.cache().indexes.get(&alpha.public_key).unwrap();
        assert!(entry.value().is_some());
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let mut server = mockito::Server::new_async().await;
        let (alpha, _a) = serve_armory(
            &mut server,
            "alpha",
            &signing_key(1),
            &[MockPackage::alias("foo", "v1.0.0")],
        )
        .await;
        // beta's index is signed by a key it does not trust
        let (mut beta, _b) = serve_armory(&mut server, "beta", &signing_key(2), &[]).await;
        beta.public_key = public_key_text(&signing_key(3));

        let refresher = refresher();
        let report = refresher.all(&[alpha.clone(), beta.clone()]).await;

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].armory, "beta");
        assert!(report.failures[0].error.is_signature());
        assert_eq!(refresher.cache().packages(Some(&alpha.public_key)).len(), 1);
        let beta_entry = refresher.cache().indexes.get(&beta.public_key).unwrap();
        assert!(beta_entry.error().is_some());
    }

    #[tokio::test]
    async fn test_disabled_armory_dropped_and_unlisted_pruned() {
        let mut server = mockito::Server::new_async().await;
        let (alpha, _a) = serve_armory(
            &mut server,
            "alpha",
            &signing_key(1),
            &[MockPackage::alias("foo", "v1.0.0")],
        )
        .await;
        let (mut beta, _b) = serve_armory(
            &mut server,
            "beta",
            &signing_key(2),
            &[MockPackage::alias("foo", "v1.0.0")],
        )
        .await;

        let refresher = refresher();
        refresher.all(&[alpha.clone(), beta.clone()]).await;
        assert_eq!(refresher.cache().packages(None).len(), 2);

        // A package alpha no longer lists
        let stale = PackageId::derive("https://gone", "P", "alpha", "gone");
        let existing = refresher.cache().packages(Some(&alpha.public_key))[0].clone();
        refresher.cache().packages.store(
            stale.as_str(),
            CacheEntry::new(alpha.provenance(), Ok(existing)),
        );

        beta.enabled = false;
        let report = refresher.all(&[alpha.clone(), beta.clone()]).await;

        assert!(report.is_clean());
        assert!(refresher.cache().package(&stale).is_none());
        assert!(refresher.cache().indexes.get(&beta.public_key).is_none());
        let remaining = refresher.cache().packages(None);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].armory_name(), "alpha");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_fresh_armory_skips_authorization_command() {
        let mut server = mockito::Server::new_async().await;
        let (mut alpha, _mocks) = serve_armory(
            &mut server,
            "alpha",
            &signing_key(1),
            &[MockPackage::alias("foo", "v1.0.0")],
        )
        .await;
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("auth.log");
        alpha.authorization_cmd = format!("echo run >> '{}'; echo token", log.display());

        let refresher = refresher();
        assert!(refresher.all(std::slice::from_ref(&alpha)).await.is_clean());
        let second = refresher.all(std::slice::from_ref(&alpha)).await;

        assert_eq!(second.indexes_fetched, 0);
        assert_eq!(std::fs::read_to_string(&log).unwrap().lines().count(), 1);
    }

    #[tokio::test]
    async fn test_verify_one_does_not_store() {
        let mut server = mockito::Server::new_async().await;
        let (alpha, _mocks) = serve_armory(
            &mut server,
            "alpha",
            &signing_key(1),
            &[MockPackage::alias("foo", "v1.0.0")],
        )
        .await;

        let refresher = refresher();
        let entry = refresher.verify_one(&alpha).await.unwrap();
        assert_eq!(entry.value().unwrap().aliases.len(), 1);
        assert!(refresher.cache().indexes.is_empty());

        let mut ftp = alpha.clone();
        ftp.repo_url = "ftp://host/armory".to_string();
        assert!(matches!(
            refresher.verify_one(&ftp).await,
            Err(FetchError::Scheme { .. })
        ));
    }
}
