//! GitHub release source.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::core::version::{InstallSpec, LATEST};
use crate::registry::{version_from_tag, Release, ReleaseAsset, ReleaseSource, SourceError, SourceOptions};

const API_BASE: &str = "https://api.github.com";

#[derive(Debug, Deserialize)]
struct GithubRelease {
    id: u64,
    tag_name: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    prerelease: bool,
}

#[derive(Debug, Deserialize)]
struct GithubAsset {
    name: String,
    browser_download_url: String,
}

pub struct GithubSource {
    client: reqwest::Client,
    api_base: String,
    token: Option<String>,

    owner: String,
    repo: String,
    /// Requested at construction, resolved by `pre_run`.
    version: String,
    include_pre_releases: bool,
}

impl GithubSource {
    pub fn new(client: reqwest::Client, spec: &InstallSpec, opts: &SourceOptions) -> Self {
        Self {
            client,
            api_base: opts
                .api_base
                .clone()
                .unwrap_or_else(|| API_BASE.to_string()),
            token: opts.github_token.clone(),
            owner: spec.owner.clone(),
            repo: spec.repo.clone(),
            version: spec.version.clone(),
            include_pre_releases: opts.include_pre_releases,
        }
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        let mut request = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, crate::USER_AGENT)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        request
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<T, SourceError> {
        let response = self.request(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            if status.as_u16() == 404 && self.token.is_none() {
                warn!("no authentication token provided, a 404 error may be due to permissions");
            }
            return Err(SourceError::Status(status.as_u16(), url.to_string()));
        }
        Ok(response.json().await?)
    }

    /// Find the release for the requested version, preferring the
    /// `releases/latest` endpoint and falling back to the full listing.
    async fn find_release(&self) -> Result<GithubRelease, SourceError> {
        if self.version == LATEST && !self.include_pre_releases {
            let url = format!(
                "{}/repos/{}/{}/releases/latest",
                self.api_base, self.owner, self.repo
            );
            match self.get_json::<GithubRelease>(&url).await {
                Ok(release) => return Ok(release),
                Err(SourceError::Status(404, _)) => {}
                Err(err) => return Err(err),
            }
        }

        let url = format!(
            "{}/repos/{}/{}/releases?per_page=100",
            self.api_base, self.owner, self.repo
        );
        let releases: Vec<GithubRelease> = self.get_json(&url).await?;

        for release in releases {
            if self.version == LATEST {
                if release.prerelease && !self.include_pre_releases {
                    continue;
                }
                return Ok(release);
            }

            if release.tag_name == self.version
                || release.tag_name == format!("v{}", self.version)
                || release.name.as_deref() == Some(&format!("v{}", self.version))
            {
                return Ok(release);
            }
        }

        Err(SourceError::ReleaseNotFound(format!(
            "{}/{}@{}",
            self.owner, self.repo, self.version
        )))
    }

    /// List every asset of the release; the API pages at 100.
    async fn release_assets(&self, release_id: u64) -> Result<Vec<ReleaseAsset>, SourceError> {
        let mut assets = Vec::new();
        let mut page = 1;

        loop {
            let url = format!(
                "{}/repos/{}/{}/releases/{}/assets?per_page=100&page={}",
                self.api_base, self.owner, self.repo, release_id, page
            );
            let batch: Vec<GithubAsset> = self.get_json(&url).await?;
            let count = batch.len();

            assets.extend(batch.into_iter().map(|a| ReleaseAsset {
                name: a.name,
                url: a.browser_download_url,
            }));

            if count < 100 {
                break;
            }
            page += 1;
        }

        Ok(assets)
    }
}

#[async_trait]
impl ReleaseSource for GithubSource {
    fn source(&self) -> &'static str {
        "github"
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
            Some(token) => vec![("Authorization", format!("Bearer {token}"))],
            None => Vec::new(),
        }
    }

    async fn pre_run(&mut self) -> Result<Release, SourceError> {
        let release = self.find_release().await?;
        self.version = version_from_tag(&release.tag_name);
        debug!("resolved release: {} ({})", release.tag_name, release.id);

        let assets = self.release_assets(release.id).await?;
        if assets.is_empty() {
            return Err(SourceError::NoAssets);
        }

        Ok(Release {
            tag: release.tag_name,
            prerelease: release.prerelease,
            assets,
        })
    }
}
