//! Shared types and wire format for armories.
//!
//! Everything an armory publishes (its index, the packages it lists, the
//! manifests carried in package signatures) and everything the client
//! persists (armory configs, installed manifests) is defined here so the
//! core library and the CLI agree on one JSON shape.

pub mod manifest;
pub mod types;
pub mod version;

// Re-exports
pub use manifest::{
    AliasManifest, ExtCommand, ExtensionArgument, ExtensionManifest, ManifestError, PackageFile,
    PackageManifest,
};
pub use types::*;

/// Name of the built-in armory.
pub const DEFAULT_ARMORY_NAME: &str = "Default";

/// Releases endpoint of the public armory.
pub const DEFAULT_ARMORY_REPO_URL: &str = "https://api.github.com/repos/sliverarmory/armory/releases";

/// Root of Trust: minisign public key of the public armory.
pub const DEFAULT_ARMORY_PUBLIC_KEY: &str =
    "RWSBpxpRWDrD7Fe+VvRE3c2VEDC2NK80rlNCj+BX0gz44Xw07r6KQD9L";

/// Manifest file name inside an alias archive and install directory.
pub const ALIAS_MANIFEST_FILE: &str = "alias.json";

/// Manifest file name inside an extension archive and install directory.
pub const EXTENSION_MANIFEST_FILE: &str = "extension.json";
