//! Extension dependency resolution.
//!
//! Extension commands may declare `depends_on`, naming a command another
//! extension provides. Edges can cross packages and armories and may form
//! cycles, so the walk tracks every command name it has seen and stops after
//! [`MAX_DEPENDENCY_DEPTH`] packages.

use std::collections::{HashSet, VecDeque};

use armory_schema::{PackageKind, version};
use tracing::debug;

use crate::cache::CachedPackage;
use crate::error::ArmoryError;
use crate::installed::CommandRegistry;

/// Maximum number of dependency packages resolved for one root.
pub const MAX_DEPENDENCY_DEPTH: usize = 10;

/// Resolves dependencies against a snapshot of cached packages.
pub struct DependencyResolver<'a> {
    candidates: &'a [CachedPackage],
    registry: &'a dyn CommandRegistry,
}

impl<'a> DependencyResolver<'a> {
    /// Resolver choosing providers among `candidates`, skipping commands
    /// `registry` already has.
    pub fn new(candidates: &'a [CachedPackage], registry: &'a dyn CommandRegistry) -> Self {
        Self {
            candidates,
            registry,
        }
    }

    /// Dependency packages of `root`, in install order (deepest first).
    ///
    /// Aliases have no dependencies. The root's own name and commands never
    /// count as dependencies, each command name is considered once, and
    /// commands already registered are skipped. The walk is truncated after
    /// [`MAX_DEPENDENCY_DEPTH`] packages.
    ///
    /// # Errors
    ///
    /// Returns [`ArmoryError::Dependency`] if no cached extension provides a
    /// required command.
    pub fn resolve(&self, root: &CachedPackage) -> Result<Vec<CachedPackage>, ArmoryError> {
        let Some(ext) = root.manifest.as_extension() else {
            return Ok(Vec::new());
        };

        let mut seen: HashSet<String> = ext.commands.iter().map(|c| c.command_name.clone()).collect();
        seen.insert(ext.name.clone());
        let mut queue: VecDeque<(String, String)> = ext
            .commands
            .iter()
            .map(|c| (ext.name.clone(), c.depends_on.clone()))
            .collect();
        let mut resolved: Vec<CachedPackage> = Vec::new();

        while let Some((owner, dependency)) = queue.pop_front() {
            if dependency.is_empty() || !seen.insert(dependency.clone()) {
                continue;
            }
            if resolved.len() >= MAX_DEPENDENCY_DEPTH {
                debug!("Dependency walk of '{}' truncated at '{dependency}'", ext.name);
                break;
            }
            if self.registry.is_registered(&dependency) {
                debug!("Dependency '{dependency}' of '{owner}' is already installed");
                continue;
            }

            let provider = self.provider(&dependency, root.armory_pk()).ok_or_else(|| {
                ArmoryError::Dependency {
                    dependency: dependency.clone(),
                    package: owner.clone(),
                    reason: "no cached extension provides this command".to_string(),
                }
            })?;
            debug!(
                "'{owner}' depends on '{dependency}', provided by '{}' from '{}'",
                provider.name(),
                provider.armory_name()
            );

            if let Some(dep_ext) = provider.manifest.as_extension() {
                seen.insert(dep_ext.name.clone());
                seen.extend(dep_ext.commands.iter().map(|c| c.command_name.clone()));
                queue.extend(
                    dep_ext
                        .commands
                        .iter()
                        .map(|c| (dep_ext.name.clone(), c.depends_on.clone())),
                );
            }
            resolved.push(provider.clone());
        }

        resolved.reverse();
        Ok(resolved)
    }

    // Prefer the root's armory, then the newest version, then armory name.
    fn provider(&self, command: &str, root_pk: &str) -> Option<&'a CachedPackage> {
        self.candidates
            .iter()
            .filter(|p| p.kind() == PackageKind::Extension && p.manifest.provides(command))
            .min_by(|a, b| {
                (b.armory_pk() == root_pk)
                    .cmp(&(a.armory_pk() == root_pk))
                    .then_with(|| version::compare(b.version(), a.version()))
                    .then_with(|| a.armory_name().cmp(b.armory_name()))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::installed::InstalledCommands;
    use crate::sources::testing::cached_extension;

    fn ext(name: &str, depends_on: &str) -> CachedPackage {
        cached_extension("alpha", "K1", name, "v1.0.0", &[name], depends_on)
    }

    fn names(packages: &[CachedPackage]) -> Vec<&str> {
        packages.iter().map(CachedPackage::name).collect()
    }

    #[test]
    fn test_chain_in_install_order() {
        let candidates = vec![ext("a", "b"), ext("b", "c"), ext("c", "")];
        let registry = InstalledCommands::default();
        let resolved = DependencyResolver::new(&candidates, &registry)
            .resolve(&candidates[0])
            .unwrap();
        assert_eq!(names(&resolved), vec!["c", "b"]);
    }

    #[test]
    fn test_cycle_terminates() {
        let candidates = vec![ext("a", "b"), ext("b", "a")];
        let registry = InstalledCommands::default();
        let resolved = DependencyResolver::new(&candidates, &registry)
            .resolve(&candidates[0])
            .unwrap();
        assert_eq!(names(&resolved), vec!["b"]);
    }

    #[test]
    fn test_self_edge_ignored() {
        let root = cached_extension("alpha", "K1", "kit", "v1", &["kit-a", "kit-b"], "kit-b");
        let candidates = vec![root.clone()];
        let registry = InstalledCommands::default();
        let resolved = DependencyResolver::new(&candidates, &registry)
            .resolve(&root)
            .unwrap();
        assert!(resolved.is_empty());
    }

    #[test]
    fn test_depth_is_bounded() {
        let names_owned: Vec<String> = (0..15).map(|i| format!("e{i}")).collect();
        let candidates: Vec<CachedPackage> = names_owned
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let next = names_owned.get(i + 1).map_or("", String::as_str);
                ext(name, next)
            })
            .collect();
        let registry = InstalledCommands::default();
        let resolved = DependencyResolver::new(&candidates, &registry)
            .resolve(&candidates[0])
            .unwrap();
        assert_eq!(resolved.len(), MAX_DEPENDENCY_DEPTH);
        assert_eq!(resolved.last().unwrap().name(), "e1");
    }

    #[test]
    fn test_registered_dependency_skipped() {
        let candidates = vec![ext("a", "b"), ext("b", "")];
        let registry = InstalledCommands::default();
        registry
            .register(&candidates[1].manifest, std::path::Path::new("/x"))
            .unwrap();
        let resolved = DependencyResolver::new(&candidates, &registry)
            .resolve(&candidates[0])
            .unwrap();
        assert!(resolved.is_empty());
    }

    #[test]
    fn test_missing_provider_is_an_error() {
        let candidates = vec![ext("a", "coff-loader")];
        let registry = InstalledCommands::default();
        let err = DependencyResolver::new(&candidates, &registry)
            .resolve(&candidates[0])
            .unwrap_err();
        assert!(matches!(
            err,
            ArmoryError::Dependency { dependency, package, .. }
                if dependency == "coff-loader" && package == "a"
        ));
    }

    #[test]
    fn test_provider_preference() {
        let root = cached_extension("beta", "K2", "a", "v1", &["a"], "loader");
        let candidates = vec![
            root.clone(),
            cached_extension("alpha", "K1", "loader", "v9.0.0", &["loader"], ""),
            cached_extension("beta", "K2", "loader", "v1.0.0", &["loader"], ""),
            cached_extension("gamma", "K3", "loader", "v10.0.0", &["loader"], ""),
        ];
        let registry = InstalledCommands::default();
        let resolver = DependencyResolver::new(&candidates, &registry);

        let picked = resolver.resolve(&root).unwrap();
        assert_eq!(picked[0].armory_name(), "beta");

        let foreign = cached_extension("delta", "K4", "a", "v1", &["a"], "loader");
        let picked = resolver.resolve(&foreign).unwrap();
        assert_eq!(picked[0].armory_name(), "gamma");
    }
}
