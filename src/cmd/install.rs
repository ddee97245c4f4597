//! `dist install [provider/]owner/repo[@version]`

use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::core::platform::{self, Platform};
use crate::core::version::{InstallSpec, LATEST};
use crate::inventory::Inventory;
use crate::io::download::Downloader;
use crate::ops::install::opt_version_dir;
use crate::ops::pipeline::{Pipeline, PipelineOptions};
use crate::registry::{ReleaseSource, Source, SourceOptions};

#[derive(Args, Debug, Clone)]
pub struct InstallArgs {
    /// Target to install: [provider/]owner/repo[@version]
    pub spec: String,

    /// Specify a version to install
    #[arg(long, default_value = LATEST)]
    pub version: String,

    /// Specify the OS to install for
    #[arg(long)]
    pub os: Option<String>,

    /// Specify the architecture to install for
    #[arg(long)]
    pub arch: Option<String>,

    /// Force the installation even if it is already installed
    #[arg(long)]
    pub force: bool,

    /// Include pre-releases in the list of available versions
    #[arg(long, alias = "pre", env = "DISTILLERY_INCLUDE_PRE_RELEASES")]
    pub include_pre_releases: bool,

    /// Disable checksum verification
    #[arg(long, env = "DISTILLERY_NO_CHECKSUM_VERIFY")]
    pub no_checksum_verify: bool,

    /// Disable signature verification
    #[arg(long, env = "DISTILLERY_NO_SIGNATURE_VERIFY")]
    pub no_signature_verify: bool,

    /// Disable the scoring check
    #[arg(long)]
    pub no_score_check: bool,

    /// GitHub token to use for GitHub API requests
    #[arg(long, env = "DISTILLERY_GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// GitLab token to use for GitLab API requests
    #[arg(long, env = "DISTILLERY_GITLAB_TOKEN", hide_env_values = true)]
    pub gitlab_token: Option<String>,

    /// Use the pass-through cache for GitHub API requests
    #[arg(long, env = "DISTILLERY_USE_CACHE")]
    pub use_dist_cache: bool,

    /// Base URL for the pass-through cache
    #[arg(
        long,
        env = "DISTILLERY_CACHE_URL",
        default_value = "https://api.github.cache.dist.sh",
        hide = true
    )]
    pub dist_cache_url: String,
}

impl InstallArgs {
    /// Args for a Distfile-driven install: just the target string, with
    /// the environment still honored for tokens and verification toggles.
    pub fn for_spec(spec: &str) -> Self {
        let env_flag = |name: &str| std::env::var(name).is_ok_and(|v| !v.is_empty() && v != "0");

        Self {
            spec: spec.to_string(),
            version: LATEST.to_string(),
            os: None,
            arch: None,
            force: false,
            include_pre_releases: env_flag("DISTILLERY_INCLUDE_PRE_RELEASES"),
            no_checksum_verify: env_flag("DISTILLERY_NO_CHECKSUM_VERIFY"),
            no_signature_verify: env_flag("DISTILLERY_NO_SIGNATURE_VERIFY"),
            no_score_check: false,
            github_token: std::env::var("DISTILLERY_GITHUB_TOKEN").ok(),
            gitlab_token: std::env::var("DISTILLERY_GITLAB_TOKEN").ok(),
            use_dist_cache: env_flag("DISTILLERY_USE_CACHE"),
            dist_cache_url: std::env::var("DISTILLERY_CACHE_URL")
                .unwrap_or_else(|_| "https://api.github.cache.dist.sh".to_string()),
        }
    }
}

/// Resolve the target spec, applying config aliases and the `--version`
/// flag. A version given with `@` wins over both.
fn resolve_spec(config: &Config, args: &InstallArgs) -> Result<InstallSpec> {
    let (name, explicit_version) = match args.spec.split_once('@') {
        Some((name, version)) => (name, Some(version)),
        None => (args.spec.as_str(), None),
    };

    let target = match config.get_alias(name) {
        Some(alias) => {
            let version = match explicit_version {
                Some(version) => {
                    if alias.version != LATEST {
                        warn!("version specified via cli and alias, ignoring alias version");
                    }
                    version.to_string()
                }
                None => alias.version.clone(),
            };
            format!("{}@{}", alias.name, version)
        }
        None => args.spec.clone(),
    };

    let mut spec = InstallSpec::parse(&target)?;
    if spec.is_latest() && args.version != LATEST {
        spec.version = args.version.clone();
    }
    Ok(spec)
}

pub async fn execute(config: &Config, args: InstallArgs) -> Result<()> {
    let start = Instant::now();

    info!(app = %args.spec, "starting installation");

    config
        .ensure_dirs()
        .context("failed to create directories")?;

    let spec = resolve_spec(config, &args)?;

    let os = args.os.as_deref().unwrap_or_else(|| platform::host_os());
    let arch = args.arch.as_deref().unwrap_or_else(|| platform::host_arch());
    let platform = Platform::new(os, arch);

    if args.use_dist_cache {
        warn!("[EXPERIMENTAL FEATURE] using the pass-through cache, this may not work as expected");
    }
    info!("preparing source");

    let client = reqwest::Client::builder()
        .build()
        .context("failed to build http client")?;

    let mut source = Source::new(
        client.clone(),
        &spec,
        SourceOptions {
            github_token: args.github_token.clone(),
            gitlab_token: args.gitlab_token.clone(),
            include_pre_releases: args.include_pre_releases,
            api_base: args.use_dist_cache.then(|| args.dist_cache_url.clone()),
        },
    );

    if spec.is_latest() {
        info!("resolving latest version");
    }

    let release = source.as_release_source_mut().pre_run().await?;
    let src = source.as_release_source();

    if !args.force {
        let inv = Inventory::load(&config.bin_path, &config.opt_path);
        let key = format!("{}/{}", src.source(), src.app());
        let installed = if spec.is_latest() {
            inv.get_latest(&key)
        } else {
            inv.get_version(&key, &spec.version)
        };

        if installed.is_some_and(|v| v.version == src.version()) {
            warn!(
                "version {} is already installed (reinstall with --force)",
                src.version()
            );
            return Ok(());
        }
    }

    info!("installing version {}", src.version());

    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_cancel.cancel();
        }
    });

    let downloads_dir = config
        .downloads_path()
        .join(src.source())
        .join(src.owner())
        .join(src.repo())
        .join(src.version());
    let opt_dir = opt_version_dir(
        &config.opt_path,
        src.source(),
        src.owner(),
        src.repo(),
        src.version(),
    );

    let mut pipeline = Pipeline::new(
        PipelineOptions {
            platform,
            settings: config.settings,
            no_checksum_verify: args.no_checksum_verify,
            no_signature_verify: args.no_signature_verify,
            no_score_check: args.no_score_check,
        },
        Downloader::new(client, cancel),
        downloads_dir,
        config.bin_path.clone(),
        opt_dir,
    );

    pipeline.add_release_assets(&release, src.version());
    pipeline.run(src).await?;

    info!(
        "successfully installed version {} in {:.2}s",
        src.version(),
        start.elapsed().as_secs_f64()
    );

    Ok(())
}
