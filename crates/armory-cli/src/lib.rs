//! armory - package manager for console aliases and extensions
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_panics_doc)]
//!
//! Discovers, verifies and installs packages published by configured
//! armories.
//!
//! # Directory Layout
//!
//! ```text
//! ~/.sliver-client/
//! ├── armories.json   # Configured armories
//! ├── aliases/        # One directory per alias command
//! └── extensions/     # One directory per extension
//! ```

pub mod cmd;
pub mod ui;

use std::time::Duration;

use armory_core::http::{DEFAULT_TIMEOUT, HttpConfig};
use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "armory")]
#[command(author, version, about = "armory - package manager for console aliases and extensions")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Transport and prompt settings shared by every command.
#[derive(Debug, Clone, Args)]
pub struct GlobalArgs {
    /// Request timeout in seconds
    #[arg(long, global = true, env = "ARMORY_TIMEOUT", default_value_t = DEFAULT_TIMEOUT.as_secs())]
    pub timeout: u64,

    /// Proxy URL for all requests
    #[arg(long, global = true, env = "ARMORY_PROXY")]
    pub proxy: Option<String>,

    /// Skip TLS certificate verification
    #[arg(long, global = true)]
    pub insecure: bool,

    /// Refetch everything regardless of cache age
    #[arg(long, global = true)]
    pub ignore_cache: bool,

    /// Answer yes to every prompt
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,
}

impl GlobalArgs {
    /// HTTP settings for this invocation.
    pub fn http(&self) -> HttpConfig {
        HttpConfig {
            timeout: Duration::from_secs(self.timeout),
            proxy: self.proxy.clone(),
            insecure: self.insecure,
            ignore_cache: self.ignore_cache,
            ..HttpConfig::default()
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Install an alias, extension or bundle (`all` installs everything)
    Install {
        /// Command, package or bundle name
        name: String,
        /// Reinstall even if already installed
        #[arg(long, short = 'f')]
        force: bool,
        /// Only consider packages from this armory
        #[arg(long, short = 'a')]
        armory: Option<String>,
    },
    /// Check installed packages for newer versions
    Update {
        /// Only consider packages from this armory
        #[arg(long, short = 'a')]
        armory: Option<String>,
    },
    /// Search package names and commands with a regex
    Search {
        /// Regular expression
        pattern: String,
    },
    /// Show package details, or armory details when no name is given
    Info {
        /// Package name
        name: Option<String>,
    },
    /// Add and verify a new armory
    Add {
        /// Armory name
        name: String,
        /// Index URL
        #[arg(long)]
        url: String,
        /// Minisign public key
        #[arg(long)]
        pubkey: String,
        /// Static authorization header value
        #[arg(long, conflicts_with = "authcmd")]
        auth: Option<String>,
        /// Command whose output is the authorization header value
        #[arg(long)]
        authcmd: Option<String>,
        /// Keep the armory for this invocation only
        #[arg(long)]
        no_save: bool,
    },
    /// Remove an armory
    #[command(alias = "remove")]
    Rm {
        /// Armory name
        name: String,
    },
    /// Enable an armory
    Enable {
        /// Armory name
        name: String,
    },
    /// Disable an armory
    Disable {
        /// Armory name
        name: String,
    },
    /// Change and re-verify an armory
    Modify {
        /// Armory name
        name: String,
        /// New name
        #[arg(long = "name", value_name = "NAME")]
        new_name: Option<String>,
        /// New index URL
        #[arg(long)]
        url: Option<String>,
        /// New minisign public key
        #[arg(long)]
        pubkey: Option<String>,
        /// New static authorization header value
        #[arg(long)]
        auth: Option<String>,
        /// New authorization command
        #[arg(long)]
        authcmd: Option<String>,
        /// Keep the change for this invocation only
        #[arg(long)]
        no_save: bool,
    },
    /// Refetch every armory index and package signature
    Refresh,
    /// Forget all armories and restore the default
    Reset,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}
