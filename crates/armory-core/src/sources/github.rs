use armory_schema::{ArmoryConfig, ArmoryIndex, ArmoryPackage};
use async_trait::async_trait;
use reqwest::header::LOCATION;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use super::{FetchedPackage, GenericSource, SourceParser, verify_index, verify_package_signature};
use crate::error::FetchError;
use crate::http::{Get, HttpClients};

const INDEX_ASSET: &str = "armory.json";
const INDEX_SIG_ASSET: &str = "armory.minisig";
const OCTET_STREAM: &str = "application/octet-stream";

#[derive(Debug, Deserialize)]
struct Release {
    #[serde(default)]
    tag_name: String,
    #[serde(default)]
    assets: Vec<Asset>,
}

#[derive(Debug, Deserialize)]
struct Asset {
    name: String,
    url: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Releases {
    Many(Vec<Release>),
    One(Release),
}

impl Release {
    fn asset(&self, name: &str) -> Result<&Asset, FetchError> {
        self.assets
            .iter()
            .find(|a| a.name == name)
            .ok_or_else(|| FetchError::MissingAsset(name.to_string()))
    }

    // Exact `<command><suffix>` first, then any asset with the suffix.
    fn package_asset(&self, command_name: &str, suffix: &str) -> Result<&Asset, FetchError> {
        let exact = format!("{command_name}{suffix}");
        self.asset(&exact).or_else(|_| {
            self.assets
                .iter()
                .find(|a| a.name.ends_with(suffix))
                .ok_or(FetchError::MissingAsset(exact))
        })
    }
}

fn rate_limited(err: FetchError) -> FetchError {
    match err {
        FetchError::Http { status: 403, .. } => FetchError::RateLimited,
        other => other,
    }
}

/// Armory published as GitHub releases, read through the REST API.
///
/// The repo URL is a releases endpoint; the first release returned is the
/// latest. Index assets are `armory.json` + `armory.minisig`, package assets
/// are `<command>.minisig` + `<command>.tar.gz`.
#[derive(Debug, Clone)]
pub struct GitHubReleaseSource {
    client: Client,
}

impl GitHubReleaseSource {
    /// Parser using `client` for every request.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn latest_release(&self, url: &str, authorization: &str) -> Result<Release, FetchError> {
        let body = Get::new(url)
            .authorized(authorization)
            .bytes(&self.client)
            .await
            .map_err(rate_limited)?;
        let releases: Releases =
            serde_json::from_slice(&body).map_err(|e| FetchError::Decode(e.to_string()))?;
        let release = match releases {
            Releases::Many(list) => list.into_iter().next(),
            Releases::One(release) => Some(release),
        };
        release.ok_or_else(|| FetchError::MissingAsset("latest release".to_string()))
    }

    async fn download(&self, asset: &Asset, authorization: &str) -> Result<Vec<u8>, FetchError> {
        Get::new(&asset.url)
            .authorized(authorization)
            .accept(OCTET_STREAM)
            .bytes(&self.client)
            .await
            .map_err(rate_limited)
    }
}

#[async_trait]
impl SourceParser for GitHubReleaseSource {
    async fn fetch_index(&self, armory: &ArmoryConfig) -> Result<ArmoryIndex, FetchError> {
        let auth = armory.authorization.as_str();
        let release = self.latest_release(&armory.repo_url, auth).await?;
        debug!("Armory '{}' latest release {}", armory.name, release.tag_name);

        let minisig = self.download(release.asset(INDEX_SIG_ASSET)?, auth).await?;
        let index = self.download(release.asset(INDEX_ASSET)?, auth).await?;
        verify_index(armory, &minisig, &index)
    }

    async fn fetch_package(
        &self,
        armory: &ArmoryConfig,
        package: &ArmoryPackage,
        sig_only: bool,
    ) -> Result<FetchedPackage, FetchError> {
        let auth = armory.authorization.as_str();
        let release = self.latest_release(&package.repo_url, auth).await?;

        let sig_asset = release.package_asset(&package.command_name, ".minisig")?;
        let minisig = self.download(sig_asset, auth).await?;
        let signature = verify_package_signature(package, &minisig)?;

        if sig_only {
            return Ok(FetchedPackage {
                signature,
                archive: None,
            });
        }

        let tar_asset = release.package_asset(&package.command_name, ".tar.gz")?;
        let archive = self.download(tar_asset, auth).await?;
        if archive.is_empty() {
            return Err(FetchError::EmptyArchive);
        }
        Ok(FetchedPackage {
            signature,
            archive: Some(archive),
        })
    }
}

/// Package hosted as github.com release downloads, without the API.
///
/// The latest tag is read from the redirect of `<repo>/releases/latest`;
/// assets are downloaded anonymously from `<repo>/releases/download/<tag>/`.
/// Indexes on github.com are served like generic armories.
#[derive(Debug, Clone)]
pub struct GitHubWebSource {
    clients: HttpClients,
}

impl GitHubWebSource {
    /// Parser using `clients` (redirects must be observable for tag lookup).
    pub fn new(clients: HttpClients) -> Self {
        Self { clients }
    }

    async fn latest_tag(&self, repo_url: &str) -> Result<String, FetchError> {
        let url = format!("{}/releases/latest", repo_url.trim_end_matches('/'));
        let response = Get::new(&url).send(&self.clients.no_redirect).await?;
        let status = response.status();
        if !status.is_redirection() {
            return Err(match status {
                StatusCode::FORBIDDEN => FetchError::RateLimited,
                _ => FetchError::Http {
                    status: status.as_u16(),
                    url,
                },
            });
        }
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| FetchError::Decode("release redirect without location".to_string()))?;
        location
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .ok_or_else(|| FetchError::Decode(format!("no tag in redirect to {location}")))
    }
}

#[async_trait]
impl SourceParser for GitHubWebSource {
    async fn fetch_index(&self, armory: &ArmoryConfig) -> Result<ArmoryIndex, FetchError> {
        GenericSource::new(self.clients.standard.clone())
            .fetch_index(armory)
            .await
    }

    async fn fetch_package(
        &self,
        _armory: &ArmoryConfig,
        package: &ArmoryPackage,
        sig_only: bool,
    ) -> Result<FetchedPackage, FetchError> {
        let tag = self.latest_tag(&package.repo_url).await?;
        let base = format!(
            "{}/releases/download/{tag}/{}",
            package.repo_url.trim_end_matches('/'),
            package.command_name
        );

        let minisig = Get::new(&format!("{base}.minisig"))
            .bytes(&self.clients.standard)
            .await?;
        let signature = verify_package_signature(package, &minisig)?;

        if sig_only {
            return Ok(FetchedPackage {
                signature,
                archive: None,
            });
        }

        let archive = Get::new(&format!("{base}.tar.gz"))
            .bytes(&self.clients.standard)
            .await?;
        if archive.is_empty() {
            return Err(FetchError::EmptyArchive);
        }
        Ok(FetchedPackage {
            signature,
            archive: Some(archive),
        })
    }
}
