//! Release sources: the narrow contract the install pipeline needs from a
//! code-hosting provider, plus the concrete GitHub and GitLab clients.

pub mod github;
pub mod gitlab;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::version::InstallSpec;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("release not found: {0}")]
    ReleaseNotFound(String),

    #[error("no assets found")]
    NoAssets,

    #[error("unexpected status code {0} for {1}")]
    Status(u16, String),
}

/// One downloadable file attached to a release.
#[derive(Debug, Clone)]
pub struct ReleaseAsset {
    pub name: String,
    pub url: String,
}

/// A resolved release: its tag and its files.
#[derive(Debug, Clone, Default)]
pub struct Release {
    pub tag: String,
    pub prerelease: bool,
    pub assets: Vec<ReleaseAsset>,
}

/// The operations the pipeline needs from a provider. `pre_run` resolves
/// the requested version (possibly `latest`) to a concrete release and
/// lists its assets.
#[async_trait]
pub trait ReleaseSource: Sync {
    fn source(&self) -> &'static str;
    fn owner(&self) -> &str;
    fn repo(&self) -> &str;
    fn version(&self) -> &str;

    fn app(&self) -> String {
        format!("{}/{}", self.owner(), self.repo())
    }

    /// Extra request headers for downloading this source's assets.
    fn download_headers(&self) -> Vec<(&'static str, String)>;

    async fn pre_run(&mut self) -> Result<Release, SourceError>;
}

/// Sum over the supported providers.
pub enum Source {
    Github(github::GithubSource),
    Gitlab(gitlab::GitlabSource),
}

/// Provider-independent knobs for release resolution.
#[derive(Debug, Clone, Default)]
pub struct SourceOptions {
    pub github_token: Option<String>,
    pub gitlab_token: Option<String>,
    pub include_pre_releases: bool,
    /// Override for the GitHub API base, e.g. a pass-through cache.
    pub api_base: Option<String>,
}

impl Source {
    pub fn new(client: reqwest::Client, spec: &InstallSpec, opts: SourceOptions) -> Self {
        match spec.provider.as_str() {
            "gitlab" => Self::Gitlab(gitlab::GitlabSource::new(client, spec, &opts)),
            _ => Self::Github(github::GithubSource::new(client, spec, &opts)),
        }
    }

    pub fn as_release_source(&self) -> &dyn ReleaseSource {
        match self {
            Self::Github(s) => s,
            Self::Gitlab(s) => s,
        }
    }

    pub fn as_release_source_mut(&mut self) -> &mut dyn ReleaseSource {
        match self {
            Self::Github(s) => s,
            Self::Gitlab(s) => s,
        }
    }
}

/// Strip a leading `v` from a release tag to get the bare version.
pub fn version_from_tag(tag: &str) -> String {
    tag.strip_prefix('v').unwrap_or(tag).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_from_tag() {
        assert_eq!(version_from_tag("v3.29.3"), "3.29.3");
        assert_eq!(version_from_tag("3.29.3"), "3.29.3");
        assert_eq!(version_from_tag("version-1"), "ersion-1");
    }

    #[test]
    fn test_source_dispatch() {
        let spec = InstallSpec::parse("gitlab/owner/repo").unwrap();
        let source = Source::new(reqwest::Client::new(), &spec, SourceOptions::default());
        assert_eq!(source.as_release_source().source(), "gitlab");

        let spec = InstallSpec::parse("owner/repo").unwrap();
        let source = Source::new(reqwest::Client::new(), &spec, SourceOptions::default());
        assert_eq!(source.as_release_source().source(), "github");
        assert_eq!(source.as_release_source().app(), "owner/repo");
    }
}
