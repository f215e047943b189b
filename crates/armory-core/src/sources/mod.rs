//! Source parsers: how an armory index or a package is fetched and
//! authenticated, chosen by the hostname of the URL being fetched.
//!
//! Verification happens inside the parser. An index is only decoded after
//! its bytes verify against the armory key, and package metadata is only
//! returned after the trusted comment verifies against the package key.

mod generic;
mod github;

pub use generic::GenericSource;
pub use github::{GitHubReleaseSource, GitHubWebSource};

use armory_schema::{ArmoryConfig, ArmoryIndex, ArmoryPackage, PackageManifest};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::FetchError;
use crate::http::{HttpClients, check_scheme};
use crate::minisign::{PublicKey, Signature};

/// Signature and, unless only the signature was requested, the archive.
#[derive(Debug, Clone)]
pub struct FetchedPackage {
    /// Parsed signature with a verified trusted comment
    pub signature: Signature,
    /// Raw `.tar.gz` bytes; `None` for signature-only fetches
    pub archive: Option<Vec<u8>>,
}

/// Fetch-and-verify strategy for one kind of armory host.
///
/// `armory.authorization` must already hold the resolved credential.
#[async_trait]
pub trait SourceParser: Send + Sync {
    /// Fetch and verify the armory's index.
    async fn fetch_index(&self, armory: &ArmoryConfig) -> Result<ArmoryIndex, FetchError>;

    /// Fetch a package's signature, and its archive unless `sig_only`.
    async fn fetch_package(
        &self,
        armory: &ArmoryConfig,
        package: &ArmoryPackage,
        sig_only: bool,
    ) -> Result<FetchedPackage, FetchError>;
}

/// The closed set of source variants.
#[derive(Debug, Clone)]
pub enum Source {
    /// Direct JSON endpoint
    Generic(GenericSource),
    /// GitHub REST API releases endpoint (`api.github.com`)
    GitHubRelease(GitHubReleaseSource),
    /// GitHub web releases (`github.com`)
    GitHubWeb(GitHubWebSource),
}

impl Source {
    /// Select the variant for `url` by lowercase hostname.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Scheme`] or [`FetchError::InvalidUrl`] without
    /// touching the network.
    pub fn for_url(url: &str, clients: &HttpClients) -> Result<Self, FetchError> {
        let parsed = check_scheme(url)?;
        let host = parsed.host_str().unwrap_or_default().to_lowercase();
        Ok(match host.as_str() {
            "api.github.com" => Self::GitHubRelease(GitHubReleaseSource::new(clients.standard.clone())),
            "github.com" => Self::GitHubWeb(GitHubWebSource::new(clients.clone())),
            _ => Self::Generic(GenericSource::new(clients.standard.clone())),
        })
    }

    fn parser(&self) -> &dyn SourceParser {
        match self {
            Self::Generic(s) => s,
            Self::GitHubRelease(s) => s,
            Self::GitHubWeb(s) => s,
        }
    }
}

#[async_trait]
impl SourceParser for Source {
    async fn fetch_index(&self, armory: &ArmoryConfig) -> Result<ArmoryIndex, FetchError> {
        self.parser().fetch_index(armory).await
    }

    async fn fetch_package(
        &self,
        armory: &ArmoryConfig,
        package: &ArmoryPackage,
        sig_only: bool,
    ) -> Result<FetchedPackage, FetchError> {
        self.parser().fetch_package(armory, package, sig_only).await
    }
}

/// Verify raw index bytes against the armory key, then decode them.
pub(crate) fn verify_index(
    armory: &ArmoryConfig,
    minisig: &[u8],
    index: &[u8],
) -> Result<ArmoryIndex, FetchError> {
    let key = PublicKey::parse(&armory.public_key)?;
    let signature = Signature::parse(minisig)?;
    signature.verify(&key, index)?;
    ArmoryIndex::from_verified_json(index, armory).map_err(|e| FetchError::Decode(e.to_string()))
}

/// Parse a package signature and verify its trusted comment against the
/// package key.
pub(crate) fn verify_package_signature(
    package: &ArmoryPackage,
    minisig: &[u8],
) -> Result<Signature, FetchError> {
    let signature = Signature::parse(minisig)?;
    if signature.trusted_comment().trim().is_empty() {
        return Err(FetchError::Signature("missing trusted comment".to_string()));
    }
    let key = PublicKey::parse(&package.public_key)?;
    signature.verify_comment(&key)?;
    Ok(signature)
}

/// Decode the manifest carried in a verified trusted comment.
///
/// # Errors
///
/// Returns [`FetchError::Decode`] if the comment is not base64 or the
/// manifest is invalid.
pub fn decode_manifest(
    package: &ArmoryPackage,
    signature: &Signature,
) -> Result<PackageManifest, FetchError> {
    let data = STANDARD
        .decode(signature.trusted_comment().trim())
        .map_err(|e| FetchError::Decode(format!("trusted comment: {e}")))?;
    PackageManifest::parse(package.kind(), &data).map_err(|e| FetchError::Decode(e.to_string()))
}

pub(crate) fn decode_b64(field: &str, value: &str) -> Result<Vec<u8>, FetchError> {
    STANDARD
        .decode(value.trim())
        .map_err(|e| FetchError::Decode(format!("{field}: {e}")))
}
