//! On-disk copy of the fetch caches (`armory-cache.json`), so freshness
//! carries over from one session to the next.
//!
//! Only successful entries are written. On restore a record is accepted only
//! while its armory is enabled with the same name, key and URL, and every
//! package signature is verified again against its package key before the
//! entry is published.

use std::path::Path;

use armory_schema::{ArmoryConfig, ArmoryIndex, ArmoryPackage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::{ArmoryCache, CacheEntry, CachedPackage};
use crate::config;
use crate::error::{ArmoryError, FetchError};
use crate::sources::{decode_manifest, verify_package_signature};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    armories: Vec<ArmoryRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ArmoryRecord {
    name: String,
    public_key: String,
    repo_url: String,
    fetched: DateTime<Utc>,
    index: ArmoryIndex,
    #[serde(default)]
    packages: Vec<PackageRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PackageRecord {
    id: String,
    fetched: DateTime<Utc>,
    signature: String,
}

/// Write every successful index and package entry of `cache` to `path`.
///
/// # Errors
///
/// Returns [`ArmoryError::Persist`] on any IO or serialization failure.
pub fn save(cache: &ArmoryCache, path: &Path) -> Result<(), ArmoryError> {
    let packages = cache.packages.entries();
    let mut snapshot = Snapshot::default();
    for (pk, entry) in cache.indexes.entries() {
        let Some(index) = entry.value() else {
            continue;
        };
        let records = packages
            .iter()
            .filter(|(_, e)| e.provenance.armory_pk == pk)
            .filter_map(|(id, e)| {
                e.value().map(|pkg| PackageRecord {
                    id: id.clone(),
                    fetched: e.fetched,
                    signature: pkg.signature.to_text(),
                })
            })
            .collect();
        snapshot.armories.push(ArmoryRecord {
            name: entry.provenance.armory_name.clone(),
            repo_url: entry.provenance.repo_url.clone(),
            public_key: pk,
            fetched: entry.fetched,
            index: index.clone(),
            packages: records,
        });
    }

    config::write_json(path, &snapshot)?;
    debug!(
        "Saved {} cached indexes to {}",
        snapshot.armories.len(),
        path.display()
    );
    Ok(())
}

/// Publish the entries saved at `path` that still belong to an enabled
/// armory of `armories`. Returns how many entries were restored.
///
/// A missing file restores nothing. An unreadable file is logged and
/// ignored.
pub fn restore(cache: &ArmoryCache, path: &Path, armories: &[ArmoryConfig]) -> usize {
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return 0,
        Err(e) => {
            warn!("Ignoring fetch cache {}: {e}", path.display());
            return 0;
        }
    };
    let snapshot: Snapshot = match serde_json::from_slice(&data) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!("Ignoring fetch cache {}: {e}", path.display());
            return 0;
        }
    };

    let now = Utc::now();
    let mut restored = 0;
    for record in snapshot.armories {
        let Some(armory) = armories.iter().find(|a| {
            a.enabled
                && a.name == record.name
                && a.public_key == record.public_key
                && a.repo_url == record.repo_url
        }) else {
            debug!("Dropping cached index of '{}'", record.name);
            continue;
        };
        if record.fetched > now {
            continue;
        }

        let mut index = record.index;
        index.stamp(armory);
        for saved in record.packages {
            let Some(package) = index.packages().find(|p| p.id().as_str() == saved.id) else {
                continue;
            };
            if saved.fetched > now {
                continue;
            }
            match reverify(package, &saved.signature) {
                Ok(cached) => {
                    let entry = CacheEntry {
                        fetched: saved.fetched,
                        provenance: armory.provenance(),
                        outcome: Ok(cached),
                    };
                    cache.packages.store(saved.id, entry);
                    restored += 1;
                }
                Err(e) => warn!("Dropping cached package '{}': {e}", package.name),
            }
        }

        let entry = CacheEntry {
            fetched: record.fetched,
            provenance: armory.provenance(),
            outcome: Ok(index),
        };
        cache.indexes.store(armory.public_key.clone(), entry);
        restored += 1;
    }
    debug!("Restored {restored} cache entries from {}", path.display());
    restored
}

fn reverify(package: &ArmoryPackage, signature: &str) -> Result<CachedPackage, FetchError> {
    let signature = verify_package_signature(package, signature.as_bytes())?;
    let manifest = decode_manifest(package, &signature)?;
    Ok(CachedPackage {
        package: package.clone(),
        signature,
        manifest,
    })
}
