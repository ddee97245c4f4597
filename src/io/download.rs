//! Asset downloads with streaming SHA-256 hashing.
//!
//! Every fetch writes a `.sha256` side-car next to the file; a present
//! side-car means the download cache already holds the bytes and the fetch
//! is skipped entirely.

use std::path::Path;

use futures::StreamExt;
use reqwest::Client;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unexpected status code {0} for {1}")]
    Status(u16, String),

    #[error("download cancelled")]
    Cancelled,
}

/// Default keyserver consulted for synthesized `.pub` assets.
pub const KEYSERVER_URL: &str = "https://keyserver.ubuntu.com/pks/lookup";

/// Shared download machinery for one pipeline run.
#[derive(Clone)]
pub struct Downloader {
    client: Client,
    cancel: CancellationToken,
}

impl Downloader {
    pub fn new(client: Client, cancel: CancellationToken) -> Self {
        Self { client, cancel }
    }

    /// Fetch `url` into `dest`, returning the hex SHA-256 of the content.
    /// A valid side-car short-circuits the download.
    pub async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        headers: &[(&str, String)],
    ) -> Result<String, DownloadError> {
        let sidecar = sidecar_path(dest);
        if dest.exists() && sidecar.exists() {
            let cached = tokio::fs::read_to_string(&sidecar).await?;
            debug!("file already downloaded: {}", dest.display());
            return Ok(cached.trim().to_string());
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        debug!("downloading asset: {url}");

        let mut request = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, crate::USER_AGENT);
        for (name, value) in headers {
            request = request.header(*name, value);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status(status.as_u16(), url.to_string()));
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut hasher = Sha256::new();

        loop {
            let chunk = tokio::select! {
                _ = self.cancel.cancelled() => {
                    drop(file);
                    let _ = tokio::fs::remove_file(dest).await;
                    return Err(DownloadError::Cancelled);
                }
                chunk = stream.next() => chunk,
            };

            let Some(chunk) = chunk else {
                break;
            };
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            hasher.update(&chunk);
        }

        file.flush().await?;

        let hash = hex::encode(hasher.finalize());
        tokio::fs::write(&sidecar, &hash).await?;

        trace!("downloaded asset to: {}", dest.display());

        Ok(hash)
    }

    /// Fetch a public key from the keyserver by hex key id.
    pub async fn fetch_gpg_key(&self, key_id: &str, dest: &Path) -> Result<String, DownloadError> {
        let url = format!("{KEYSERVER_URL}?op=get&options=mr&search=0x{key_id}");
        self.fetch(&url, dest, &[]).await
    }
}

fn sidecar_path(dest: &Path) -> std::path::PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".sha256");
    dest.with_file_name(name)
}
