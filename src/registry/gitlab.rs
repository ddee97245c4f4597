//! GitLab-shaped release source.
//!
//! Covers the `/api/v4/projects/{path}/releases` surface: enough to
//! resolve a version and enumerate asset links.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::core::version::{InstallSpec, LATEST};
use crate::registry::{version_from_tag, Release, ReleaseAsset, ReleaseSource, SourceError, SourceOptions};

const API_BASE: &str = "https://gitlab.com/api/v4";

#[derive(Debug, Deserialize)]
struct GitlabRelease {
    tag_name: String,
    #[serde(default)]
    upcoming_release: bool,
    assets: GitlabAssets,
}

#[derive(Debug, Deserialize)]
struct GitlabAssets {
    #[serde(default)]
    links: Vec<GitlabLink>,
}

#[derive(Debug, Deserialize)]
struct GitlabLink {
    name: String,
    #[serde(default)]
    direct_asset_url: Option<String>,
    url: String,
}

pub struct GitlabSource {
    client: reqwest::Client,
    token: Option<String>,

    owner: String,
    repo: String,
    version: String,
}

impl GitlabSource {
    pub fn new(client: reqwest::Client, spec: &InstallSpec, opts: &SourceOptions) -> Self {
        Self {
            client,
            token: opts.gitlab_token.clone(),
            owner: spec.owner.clone(),
            repo: spec.repo.clone(),
            version: spec.version.clone(),
        }
    }

    /// URL-encoded `owner/repo` project path.
    fn project_path(&self) -> String {
        format!("{}%2F{}", self.owner, self.repo)
    }

    async fn get_release(&self, url: &str) -> Result<GitlabRelease, SourceError> {
        let mut request = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, crate::USER_AGENT);
        if let Some(token) = &self.token {
            request = request.header("PRIVATE-TOKEN", token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16(), url.to_string()));
        }
        Ok(response.json().await?)
    }

    async fn find_release(&self) -> Result<GitlabRelease, SourceError> {
        let base = format!("{}/projects/{}/releases", API_BASE, self.project_path());

        let candidates = if self.version == LATEST {
            vec![format!("{base}/permalink/latest")]
        } else {
            vec![
                format!("{base}/{}", self.version),
                format!("{base}/v{}", self.version),
            ]
        };

        for url in &candidates {
            match self.get_release(url).await {
                Ok(release) => return Ok(release),
                Err(SourceError::Status(404, _)) => continue,
                Err(err) => return Err(err),
            }
        }

        Err(SourceError::ReleaseNotFound(format!(
            "{}/{}@{}",
            self.owner, self.repo, self.version
        )))
    }
}

#[async_trait]
impl ReleaseSource for GitlabSource {
    fn source(&self) -> &'static str {
        "gitlab"
    }

    fn owner(&self) -> &str {
        &self.owner
    }

    fn repo(&self) -> &str {
        &self.repo
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn download_headers(&self) -> Vec<(&'static str, String)> {
        match &self.token {
            Some(token) => vec![("PRIVATE-TOKEN", token.clone())],
            None => Vec::new(),
        }
    }

    async fn pre_run(&mut self) -> Result<Release, SourceError> {
        let release = self.find_release().await?;
        self.version = version_from_tag(&release.tag_name);
        debug!("resolved release: {}", release.tag_name);

        let assets: Vec<ReleaseAsset> = release
            .assets
            .links
            .into_iter()
            .map(|link| ReleaseAsset {
                name: link.name,
                url: link.direct_asset_url.unwrap_or(link.url),
            })
            .collect();

        if assets.is_empty() {
            return Err(SourceError::NoAssets);
        }

        Ok(Release {
            tag: release.tag_name,
            prerelease: release.upcoming_release,
            assets,
        })
    }
}
