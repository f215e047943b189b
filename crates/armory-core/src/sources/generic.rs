use armory_schema::{ArmoryConfig, ArmoryIndex, ArmoryPackage};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{FetchedPackage, SourceParser, decode_b64, verify_index, verify_package_signature};
use crate::error::FetchError;
use crate::http::{Get, check_scheme};

#[derive(Deserialize)]
struct SignedIndex {
    minisig: String,
    armory_index: String,
}

#[derive(Deserialize)]
struct SignedPackage {
    minisig: String,
    tar_gz_url: String,
}

/// Armory served as plain JSON documents.
///
/// The index URL returns `{"minisig": b64, "armory_index": b64}`; each
/// package URL returns `{"minisig": b64, "tar_gz_url": url}`.
#[derive(Debug, Clone)]
pub struct GenericSource {
    client: Client,
}

impl GenericSource {
    /// Parser using `client` for every request.
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn decode_json<'a, T: Deserialize<'a>>(body: &'a [u8]) -> Result<T, FetchError> {
    serde_json::from_slice(body).map_err(|e| FetchError::Decode(e.to_string()))
}

#[async_trait]
impl SourceParser for GenericSource {
    async fn fetch_index(&self, armory: &ArmoryConfig) -> Result<ArmoryIndex, FetchError> {
        let body = Get::new(&armory.repo_url)
            .authorized(&armory.authorization)
            .bytes(&self.client)
            .await?;
        let doc: SignedIndex = decode_json(&body)?;
        let minisig = decode_b64("minisig", &doc.minisig)?;
        let index = decode_b64("armory_index", &doc.armory_index)?;
        verify_index(armory, &minisig, &index)
    }

    async fn fetch_package(
        &self,
        armory: &ArmoryConfig,
        package: &ArmoryPackage,
        sig_only: bool,
    ) -> Result<FetchedPackage, FetchError> {
        let body = Get::new(&package.repo_url)
            .authorized(&armory.authorization)
            .bytes(&self.client)
            .await?;
        let doc: SignedPackage = decode_json(&body)?;
        let minisig = decode_b64("minisig", &doc.minisig)?;
        let signature = verify_package_signature(package, &minisig)?;

        if sig_only {
            return Ok(FetchedPackage {
                signature,
                archive: None,
            });
        }

        check_scheme(&doc.tar_gz_url)?;
        debug!("Downloading {} from {}", package.command_name, doc.tar_gz_url);
        let archive = Get::new(&doc.tar_gz_url)
            .authorized(&armory.authorization)
            .bytes(&self.client)
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
