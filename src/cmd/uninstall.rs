//! `dist uninstall [provider/]owner/repo [--no-dry-run]`

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{info, trace, warn};

use crate::config::Config;
use crate::core::version::InstallSpec;

pub fn execute(config: &Config, spec: &str, no_dry_run: bool) -> Result<()> {
    let target = match config.get_alias(spec.split('@').next().unwrap_or(spec)) {
        Some(alias) => alias.name.clone(),
        None => spec.to_string(),
    };
    let spec = InstallSpec::parse(&target)?;

    let path = config
        .opt_path
        .join(&spec.provider)
        .join(&spec.owner)
        .join(&spec.repo);

    trace!("path: {}", path.display());

    if !path.exists() {
        warn!("{} does not appear to be installed", spec.app());
        return Ok(());
    }

    if !no_dry_run {
        warn!("dry-run enabled, no changes will be made, use --no-dry-run to perform actions");
    }

    let mut files = discover_bins(&path)?;
    files.extend(discover_symlinks(&config.bin_path, &path)?);

    let msg = if no_dry_run { "removed" } else { "will remove" };

    for file in &files {
        warn!("{msg} - {}", file.display());
        if no_dry_run {
            std::fs::remove_file(file)?;
        }
    }

    warn!("{msg} - {}", path.display());

    if no_dry_run {
        std::fs::remove_dir_all(&path)?;
        info!("uninstall complete");
    }

    Ok(())
}

/// Installed files under the tuple's opt tree.
fn discover_bins(path: &Path) -> Result<Vec<PathBuf>> {
    let mut bins = Vec::new();

    for entry in walkdir::WalkDir::new(path).into_iter().flatten() {
        if entry.file_type().is_file() {
            bins.push(entry.path().to_path_buf());
        }
    }

    Ok(bins)
}

/// Bin-dir symlinks pointing into the tuple's opt tree.
fn discover_symlinks(bin_dir: &Path, opt_tree: &Path) -> Result<Vec<PathBuf>> {
    let mut symlinks = Vec::new();

    let Ok(read_dir) = std::fs::read_dir(bin_dir) else {
        return Ok(symlinks);
    };

    for entry in read_dir.flatten() {
        let path = entry.path();
        let Ok(meta) = std::fs::symlink_metadata(&path) else {
            continue;
        };
        if !meta.file_type().is_symlink() {
            continue;
        }
        let Ok(target) = std::fs::read_link(&path) else {
            continue;
        };
        if target.starts_with(opt_tree) {
            symlinks.push(path);
        }
    }

    Ok(symlinks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn test_uninstall_removes_tree_and_links() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("config.yaml");
        std::fs::write(
            &file,
            format!("path: {}\n", dir.path().join("home").display()),
        )
        .unwrap();
        let config = Config::load(&file).unwrap();
        config.ensure_dirs().unwrap();

        let opt = config
            .opt_path
            .join("github")
            .join("ekristen")
            .join("aws-nuke")
            .join("3.29.3");
        std::fs::create_dir_all(&opt).unwrap();
        let binary = opt.join("aws-nuke");
        std::fs::write(&binary, b"bin").unwrap();
        std::os::unix::fs::symlink(&binary, config.bin_path.join("aws-nuke")).unwrap();
        std::os::unix::fs::symlink(&binary, config.bin_path.join("aws-nuke@3.29.3")).unwrap();

        // Dry run leaves everything in place.
        execute(&config, "ekristen/aws-nuke", false).unwrap();
        assert!(binary.exists());
        assert!(config.bin_path.join("aws-nuke").exists());

        execute(&config, "ekristen/aws-nuke", true).unwrap();
        assert!(!binary.exists());
        assert!(std::fs::symlink_metadata(config.bin_path.join("aws-nuke")).is_err());
        assert!(std::fs::symlink_metadata(config.bin_path.join("aws-nuke@3.29.3")).is_err());

        // Uninstalling again is a no-op warning.
        execute(&config, "ekristen/aws-nuke", true).unwrap();
    }
}
