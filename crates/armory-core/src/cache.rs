//! Concurrency-safe TTL caches for armory indexes and package metadata.
//!
//! Entries are immutable once built: a refresh computes the whole entry
//! (value or error) and swaps it in with a single map insert, so readers
//! see either the previous entry or the new one. Callers never lock.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use armory_schema::{
    ArmoryBundle, ArmoryIndex, ArmoryPackage, PackageId, PackageKind, PackageManifest, Provenance,
};
use chrono::{DateTime, TimeDelta, Utc};
use tracing::debug;

use crate::error::FetchError;
use crate::minisign::Signature;

/// How long a successful fetch stays fresh.
pub const CACHE_TTL: TimeDelta = TimeDelta::hours(1);

/// Outcome of one fetch, with where and when it happened.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// Completion time of the fetch
    pub fetched: DateTime<Utc>,
    /// Armory the fetch was made on behalf of
    pub provenance: Provenance,
    /// Value, or the error that prevented it
    pub outcome: Result<V, FetchError>,
}

impl<V> CacheEntry<V> {
    /// Entry stamped with the current time.
    pub fn new(provenance: Provenance, outcome: Result<V, FetchError>) -> Self {
        Self {
            fetched: Utc::now(),
            provenance,
            outcome,
        }
    }

    /// Failed entries are never fresh; successful ones are fresh while
    /// younger than `ttl`.
    pub fn is_fresh_at(&self, now: DateTime<Utc>, ttl: TimeDelta) -> bool {
        self.outcome.is_ok() && now.signed_duration_since(self.fetched) < ttl
    }

    /// The value, if the fetch succeeded.
    pub fn value(&self) -> Option<&V> {
        self.outcome.as_ref().ok()
    }

    /// The error, if the fetch failed.
    pub fn error(&self) -> Option<&FetchError> {
        self.outcome.as_ref().err()
    }
}

/// Package metadata authenticated by a signature-only fetch.
#[derive(Debug, Clone)]
pub struct CachedPackage {
    /// Index entry, with provenance
    pub package: ArmoryPackage,
    /// Verified signature; its trusted comment carried `manifest`
    pub signature: Signature,
    /// Manifest decoded from the trusted comment
    pub manifest: PackageManifest,
}

impl CachedPackage {
    /// Cache key
    pub fn id(&self) -> PackageId {
        self.package.id()
    }

    /// Package name from the signed manifest
    pub fn name(&self) -> &str {
        self.manifest.name()
    }

    /// Version from the signed manifest
    pub fn version(&self) -> &str {
        self.manifest.version()
    }

    /// Alias or extension
    pub fn kind(&self) -> PackageKind {
        self.manifest.kind()
    }

    /// Name of the armory the package came from
    pub fn armory_name(&self) -> &str {
        &self.package.armory_name
    }

    /// Public key of the armory the package came from
    pub fn armory_pk(&self) -> &str {
        &self.package.armory_pk
    }
}

/// A keyed store of [`CacheEntry`] values.
#[derive(Debug)]
pub struct TtlCache<V> {
    entries: RwLock<HashMap<String, Arc<CacheEntry<V>>>>,
    ttl: TimeDelta,
}

impl<V> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new(CACHE_TTL)
    }
}

impl<V> TtlCache<V> {
    /// Empty cache with the given freshness window.
    pub fn new(ttl: TimeDelta) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    // A panicking writer cannot leave a half-written entry behind, so a
    // poisoned lock still guards consistent data.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<CacheEntry<V>>>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<CacheEntry<V>>>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether `key` must be fetched: absent, failed, stale, or `force`.
    pub fn needs_refresh(&self, key: &str, force: bool) -> bool {
        if force {
            return true;
        }
        self.get(key)
            .is_none_or(|entry| !entry.is_fresh_at(Utc::now(), self.ttl))
    }

    /// Publish a fully computed entry.
    pub fn store(&self, key: impl Into<String>, entry: CacheEntry<V>) -> Arc<CacheEntry<V>> {
        let entry = Arc::new(entry);
        self.write().insert(key.into(), Arc::clone(&entry));
        entry
    }

    /// Current entry for `key`.
    pub fn get(&self, key: &str) -> Option<Arc<CacheEntry<V>>> {
        self.read().get(key).cloned()
    }

    /// Drop the entry for `key`.
    pub fn remove(&self, key: &str) -> Option<Arc<CacheEntry<V>>> {
        self.write().remove(key)
    }

    /// Keep only entries for which `keep` returns true. Returns how many were dropped.
    pub fn retain(&self, mut keep: impl FnMut(&str, &CacheEntry<V>) -> bool) -> usize {
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|k, e| keep(k, &**e));
        before - entries.len()
    }

    /// Snapshot of all entries.
    pub fn entries(&self) -> Vec<(String, Arc<CacheEntry<V>>)> {
        self.read()
            .iter()
            .map(|(k, e)| (k.clone(), Arc::clone(e)))
            .collect()
    }

    /// Drop everything.
    pub fn clear(&self) {
        self.write().clear();
    }

    /// Number of entries, failed ones included.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

/// Armory indexes keyed by armory public key.
pub type IndexCache = TtlCache<ArmoryIndex>;

/// Package metadata keyed by [`PackageId`].
pub type PackageCache = TtlCache<CachedPackage>;

/// Both caches of a session.
#[derive(Debug, Default)]
pub struct ArmoryCache {
    /// Index cache
    pub indexes: IndexCache,
    /// Package cache
    pub packages: PackageCache,
}

impl ArmoryCache {
    /// Evict the index of the armory with `armory_pk` and every package
    /// fetched on its behalf. Returns how many package entries were dropped.
    pub fn evict_armory(&self, armory_pk: &str) -> usize {
        self.indexes.remove(armory_pk);
        let dropped = self
            .packages
            .retain(|_, entry| entry.provenance.armory_pk != armory_pk);
        debug!("Evicted armory {armory_pk} ({dropped} packages)");
        dropped
    }

    /// Drop package entries of `armory_pk` whose id is not in `listed`.
    pub fn prune_unlisted(&self, armory_pk: &str, listed: &HashSet<String>) -> usize {
        self.packages.retain(|id, entry| {
            entry.provenance.armory_pk != armory_pk || listed.contains(id)
        })
    }

    /// Drop all entries of armories not in `active_pks`.
    pub fn retain_armories(&self, active_pks: &HashSet<String>) {
        self.indexes.retain(|pk, _| active_pks.contains(pk));
        self.packages
            .retain(|_, entry| active_pks.contains(&entry.provenance.armory_pk));
    }

    /// Drop everything.
    pub fn clear(&self) {
        self.indexes.clear();
        self.packages.clear();
    }

    /// Successfully fetched packages, optionally restricted to one armory.
    pub fn packages(&self, armory_pk: Option<&str>) -> Vec<CachedPackage> {
        let mut out: Vec<CachedPackage> = self
            .packages
            .entries()
            .into_iter()
            .filter(|(_, e)| armory_pk.is_none_or(|pk| e.provenance.armory_pk == pk))
            .filter_map(|(_, e)| e.value().cloned())
            .collect();
        out.sort_by(|a, b| {
            a.name()
                .cmp(b.name())
                .then_with(|| a.armory_name().cmp(b.armory_name()))
        });
        out
    }

    /// Successfully fetched package with this id.
    pub fn package(&self, id: &PackageId) -> Option<CachedPackage> {
        self.packages
            .get(id.as_str())
            .and_then(|e| e.value().cloned())
    }

    /// Bundles from every successfully fetched index, optionally restricted
    /// to one armory.
    pub fn bundles(&self, armory_pk: Option<&str>) -> Vec<ArmoryBundle> {
        self.indexes
            .entries()
            .into_iter()
            .filter(|(pk, _)| armory_pk.is_none_or(|want| pk == want))
            .filter_map(|(_, e)| e.value().map(|index| index.bundles.clone()))
            .flatten()
            .collect()
    }
}
