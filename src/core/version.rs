//! Install target parsing
//!
//! Supports:
//! - Latest: `owner/repo` or `owner/repo@latest`
//! - Exact: `owner/repo@3.29.3`
//! - Explicit provider: `github/owner/repo`, `gitlab/owner/repo@1.2.3`

use anyhow::{bail, Result};

pub const LATEST: &str = "latest";

/// Providers an install spec may name.
pub const PROVIDERS: &[&str] = &["github", "gitlab"];

/// Parsed install target with optional provider and version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallSpec {
    pub provider: String,
    pub owner: String,
    pub repo: String,
    pub version: String,
}

impl InstallSpec {
    /// Parse a target like `ekristen/aws-nuke@3.29.3` or
    /// `gitlab/owner/repo`. The provider defaults to `github`; the version
    /// defaults to `latest`.
    pub fn parse(spec: &str) -> Result<Self> {
        let (path, version) = match spec.split_once('@') {
            Some((path, version)) => {
                if version.is_empty() {
                    bail!("invalid install spec: missing version after @");
                }
                (path, version.to_string())
            }
            None => (spec, LATEST.to_string()),
        };

        let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
        let (provider, owner, repo) = match parts.as_slice() {
            [owner, repo] => ("github", *owner, *repo),
            [provider, owner, repo] => {
                if !PROVIDERS.contains(provider) {
                    bail!("unknown provider: {provider}");
                }
                (*provider, *owner, *repo)
            }
            _ => bail!("invalid install spec: expected [provider/]owner/repo[@version]"),
        };

        Ok(Self {
            provider: provider.to_string(),
            owner: owner.to_string(),
            repo: repo.to_string(),
            version,
        })
    }

    /// `owner/repo`, the app identifier within its provider.
    pub fn app(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    /// Inventory key: `provider/owner/repo`.
    pub fn key(&self) -> String {
        format!("{}/{}/{}", self.provider, self.owner, self.repo)
    }

    pub fn is_latest(&self) -> bool {
        self.version == LATEST
    }
}

impl std::fmt::Display for InstallSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.key(), self.version)
    }
}
