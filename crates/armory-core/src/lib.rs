//! Core library for armory: the trust registry, the fetch/verify caches,
//! source parsers, dependency resolution, installs and updates.

pub mod archive;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod install;
pub mod installed;
pub mod minisign;
pub mod paths;
pub mod refresh;
pub mod registry;
pub mod resolver;
pub mod snapshot;
pub mod sources;
pub mod update;

pub mod reporter;

pub use client::{ArmoryChanges, ArmoryClient};
pub use error::{ArmoryError, FetchError};
pub use paths::*;
pub use reporter::{NullReporter, Reporter};

/// User Agent string for every request
pub const USER_AGENT: &str = concat!("armory/", env!("CARGO_PKG_VERSION"));
