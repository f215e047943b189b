//! Domain-specific errors for armory operations

use std::path::PathBuf;

use armory_schema::ManifestError;
use thiserror::Error;

/// Failure of a single fetch from an armory or package source.
///
/// Fetch errors are recorded in cache entries and may be read by many
/// consumers, so they carry rendered messages instead of source errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The URL uses a scheme other than http/https.
    #[error("unsupported url scheme '{scheme}' (only http and https are allowed)")]
    Scheme {
        /// Offending scheme
        scheme: String,
    },

    /// The URL could not be parsed.
    #[error("invalid url '{0}'")]
    InvalidUrl(String),

    /// Connection, TLS, timeout or body read failure.
    #[error("network error: {0}")]
    Network(String),

    /// Non-success HTTP status.
    #[error("unexpected http status {status} from {url}")]
    Http {
        /// Status code
        status: u16,
        /// Requested URL
        url: String,
    },

    /// GitHub API answered 403.
    #[error("you hit the github api rate limit")]
    RateLimited,

    /// A signature is malformed, made by another key, or does not match.
    #[error("signature verification failed: {0}")]
    Signature(String),

    /// The response body is not what the source format requires.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// A configured or published public key cannot be parsed.
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    /// A release does not carry an expected asset.
    #[error("release asset '{0}' not found")]
    MissingAsset(String),

    /// The package archive was requested but the source returned nothing.
    #[error("downloaded archive is empty")]
    EmptyArchive,

    /// The armory's authorization command failed.
    #[error("authorization command failed: {0}")]
    AuthCommand(String),
}

impl FetchError {
    /// Whether this failure is security relevant and must not be reported
    /// as a plain lookup failure.
    pub fn is_signature(&self) -> bool {
        matches!(self, Self::Signature(_) | Self::InvalidPublicKey(_))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

/// Errors surfaced by registry mutations, installs and updates.
#[derive(Error, Debug)]
pub enum ArmoryError {
    /// An armory with this name already exists.
    #[error("an armory named '{0}' already exists")]
    DuplicateName(String),

    /// An armory with this public key already exists.
    #[error("armory '{0}' already uses that public key")]
    DuplicatePublicKey(String),

    /// A required config field is empty.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// No armory with this name is configured.
    #[error("no armory named '{0}'")]
    UnknownArmory(String),

    /// Fetch or verification failure.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The archive is missing a declared file, or the file is empty.
    #[error("archive error: {0}")]
    Archive(String),

    /// A dependency could not be resolved.
    #[error("could not resolve dependency '{dependency}' for '{package}': {reason}")]
    Dependency {
        /// Command name of the dependency
        dependency: String,
        /// Package that requires it
        package: String,
        /// Why resolution failed
        reason: String,
    },

    /// No package or bundle matches.
    #[error("no package or bundle named '{0}' was found")]
    NotFound(String),

    /// The command is already installed and `--force` was not given.
    #[error("package '{0}' is already installed - use --force to overwrite it")]
    AlreadyInstalled(String),

    /// The cache no longer holds an entry the operation needs.
    #[error("the package cache is out of date - run `armory refresh` and try again")]
    CacheOutOfDate,

    /// The operator declined a prompt.
    #[error("operation cancelled")]
    Cancelled,

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Manifest parse/validation failure.
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// The armory config file could not be read or written.
    #[error("failed to persist {}: {message}", path.display())]
    Persist {
        /// Config path
        path: PathBuf,
        /// Underlying error
        message: String,
    },
}

impl ArmoryError {
    /// Whether the failure originates in signature verification.
    pub fn is_signature_failure(&self) -> bool {
        matches!(self, Self::Fetch(err) if err.is_signature())
    }

    /// Create a persistence error with context.
    pub fn persist(path: impl Into<PathBuf>, msg: impl std::fmt::Display) -> Self {
        Self::Persist {
            path: path.into(),
            message: msg.to_string(),
        }
    }
}
