//! `dist run [Distfile] [--parallel N]`

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::cmd::install::{self, InstallArgs};
use crate::config::Config;
use crate::core::distfile;

/// Find a Distfile: the working directory first, then `$HOME`.
fn discover() -> Result<PathBuf> {
    let cwd = std::env::current_dir()?;
    let local = cwd.join("Distfile");
    if local.exists() {
        return Ok(local);
    }

    if let Some(home) = dirs::home_dir() {
        let home_distfile = home.join("Distfile");
        if home_distfile.exists() {
            return Ok(home_distfile);
        }
    }

    bail!("no Distfile found in current directory or $HOME")
}

pub async fn execute(config: &Config, distfile: Option<PathBuf>, parallel: usize) -> Result<()> {
    let path = match distfile {
        Some(path) => {
            if !path.exists() {
                bail!("no Distfile found");
            }
            path
        }
        None => discover()?,
    };

    config.ensure_dirs()?;

    let directives = distfile::parse_file(&path)?;
    let parallel = parallel.max(1);

    if parallel > 1 {
        info!("running parallel installs with concurrency: {parallel}");
    }

    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_cancel.cancel();
        }
    });

    let semaphore = Arc::new(Semaphore::new(parallel));
    let config = Arc::new(config.clone());
    let mut set: JoinSet<bool> = JoinSet::new();

    for directive in directives {
        if directive.action != "install" {
            // Unknown directives parse but nothing executes them.
            continue;
        }
        let Some(spec) = directive.args.first().cloned() else {
            continue;
        };

        // Workers already running finish on their own; nothing new
        // launches after a cancel.
        if cancel.is_cancelled() {
            break;
        }

        let semaphore = semaphore.clone();
        let config = config.clone();

        set.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return false;
            };

            info!(app = %spec, "Setting up {spec}");

            match install::execute(&config, InstallArgs::for_spec(&spec)).await {
                Ok(()) => {
                    info!(app = %spec, "Completed {spec}");
                    true
                }
                Err(err) => {
                    error!(app = %spec, "Failed {spec}: {err}");
                    false
                }
            }
        });
    }

    let mut failed = false;
    while let Some(result) = set.join_next().await {
        match result {
            Ok(ok) => failed = failed || !ok,
            Err(err) => {
                error!("install task panicked: {err}");
                failed = true;
            }
        }
    }

    if failed {
        bail!("one or more install commands failed");
    }

    Ok(())
}
