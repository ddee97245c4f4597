//! Installed-binary inventory, reconstructed from the bin-dir symlink graph.
//!
//! The bin dir is the source of truth: `name` symlinks point at the
//! currently-active version under the opt tree, `name@version` symlinks pin
//! each installed version. Nothing here is persisted; every load walks the
//! directory fresh.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::warn;

/// One installed version of a binary.
#[derive(Debug, Clone)]
pub struct Version {
    pub version: String,
    /// The `name@version` symlink.
    pub path: PathBuf,
    /// The opt-tree file the symlink points at.
    pub target: PathBuf,
    /// True when the default (unversioned) symlink points at the same
    /// target.
    pub latest: bool,
}

/// All installed versions of one `(source, owner, repo)` tuple.
#[derive(Debug, Clone)]
pub struct Bin {
    pub name: String,
    pub source: String,
    pub owner: String,
    pub repo: String,
    pub versions: Vec<Version>,
}

/// Snapshot of everything installed, keyed by `source/owner/repo`.
#[derive(Debug, Default)]
pub struct Inventory {
    bins: BTreeMap<String, Bin>,
}

impl Inventory {
    /// Walk `bin_path` and rebuild the inventory from its symlinks. Plain
    /// files are ignored; anything else in there is not ours.
    pub fn load(bin_path: &Path, opt_path: &Path) -> Self {
        let mut entries: Vec<(PathBuf, PathBuf)> = Vec::new();

        let read_dir = match std::fs::read_dir(bin_path) {
            Ok(read_dir) => read_dir,
            Err(_) => return Self::default(),
        };

        for entry in read_dir.flatten() {
            let path = entry.path();
            let meta = match std::fs::symlink_metadata(&path) {
                Ok(meta) => meta,
                Err(err) => {
                    warn!("failed to stat {}: {err}", path.display());
                    continue;
                }
            };
            if !meta.file_type().is_symlink() {
                continue;
            }
            match std::fs::read_link(&path) {
                Ok(target) => entries.push((path, target)),
                Err(err) => warn!("failed to read symlink {}: {err}", path.display()),
            }
        }

        Self::from_entries(entries, opt_path)
    }

    /// Build the inventory from `(symlink, target)` pairs.
    fn from_entries(entries: Vec<(PathBuf, PathBuf)>, opt_path: &Path) -> Self {
        let mut bins: BTreeMap<String, Bin> = BTreeMap::new();
        let mut latest_targets: BTreeMap<String, PathBuf> = BTreeMap::new();

        for (path, target) in &entries {
            let Some((key, source, owner, repo)) = tuple_from_target(target, opt_path) else {
                continue;
            };

            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let (name, version) = match file_name.split_once('@') {
                Some((name, version)) => (name.to_string(), Some(version.to_string())),
                None => (file_name.clone(), None),
            };

            let bin = bins.entry(key.clone()).or_insert_with(|| Bin {
                name,
                source,
                owner,
                repo,
                versions: Vec::new(),
            });

            match version {
                Some(version) => bin.versions.push(Version {
                    version,
                    path: path.clone(),
                    target: target.clone(),
                    latest: false,
                }),
                None => {
                    latest_targets.insert(key, target.clone());
                }
            }
        }

        for (key, bin) in bins.iter_mut() {
            let Some(latest_target) = latest_targets.get(key) else {
                continue;
            };
            for version in bin.versions.iter_mut() {
                if &version.target == latest_target {
                    version.latest = true;
                }
            }
        }

        Self { bins }
    }

    pub fn get_bin(&self, key: &str) -> Option<&Bin> {
        self.bins.get(key)
    }

    /// A specific installed version; `latest` resolves to the version the
    /// default symlink points at.
    pub fn get_version(&self, key: &str, version: &str) -> Option<&Version> {
        let bin = self.get_bin(key)?;
        bin.versions
            .iter()
            .find(|v| (v.latest && version == "latest") || v.version == version)
    }

    pub fn get_latest(&self, key: &str) -> Option<&Version> {
        self.get_bin(key)?.versions.iter().find(|v| v.latest)
    }

    pub fn sorted_keys(&self) -> Vec<&str> {
        self.bins.keys().map(|k| k.as_str()).collect()
    }

    /// Number of distinct installed binaries.
    pub fn count(&self) -> usize {
        self.bins.len()
    }

    /// Number of installed versions across all binaries.
    pub fn full_count(&self) -> usize {
        self.bins.values().map(|b| b.versions.len()).sum()
    }
}

/// Derive `(key, source, owner, repo)` from a symlink target by stripping
/// the opt prefix and taking the first three path segments.
fn tuple_from_target(target: &Path, opt_path: &Path) -> Option<(String, String, String, String)> {
    let relative = target.strip_prefix(opt_path).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    if parts.len() < 3 {
        warn!("unexpected symlink target layout: {}", target.display());
        return None;
    }

    let (source, owner, repo) = (parts[0].clone(), parts[1].clone(), parts[2].clone());
    let key = format!("{source}/{owner}/{repo}");
    Some((key, source, owner, repo))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(bin: &str, link: &str, target: &str) -> (PathBuf, PathBuf) {
        (
            PathBuf::from(bin).join(link),
            PathBuf::from("/home/test/.distillery/opt").join(target),
        )
    }

    fn opt() -> PathBuf {
        PathBuf::from("/home/test/.distillery/opt")
    }

    #[test]
    fn test_inventory_from_symlinks() {
        let entries = vec![
            entry("/bin", "aws-nuke", "github/ekristen/aws-nuke/3.29.3/aws-nuke"),
            entry(
                "/bin",
                "aws-nuke@3.29.3",
                "github/ekristen/aws-nuke/3.29.3/aws-nuke",
            ),
            entry(
                "/bin",
                "aws-nuke@3.28.0",
                "github/ekristen/aws-nuke/3.28.0/aws-nuke",
            ),
        ];

        let inv = Inventory::from_entries(entries, &opt());

        assert_eq!(inv.count(), 1);
        assert_eq!(inv.full_count(), 2);

        let bin = inv.get_bin("github/ekristen/aws-nuke").unwrap();
        assert_eq!(bin.name, "aws-nuke");
        assert_eq!(bin.source, "github");
        assert_eq!(bin.owner, "ekristen");
        assert_eq!(bin.repo, "aws-nuke");

        let latest = inv.get_latest("github/ekristen/aws-nuke").unwrap();
        assert_eq!(latest.version, "3.29.3");

        let pinned = inv.get_version("github/ekristen/aws-nuke", "3.28.0").unwrap();
        assert!(!pinned.latest);

        assert_eq!(
            inv.get_version("github/ekristen/aws-nuke", "latest")
                .unwrap()
                .version,
            "3.29.3"
        );
    }

    #[test]
    fn test_at_most_one_latest_per_bin() {
        let entries = vec![
            entry("/bin", "tool", "github/o/r/2.0.0/tool"),
            entry("/bin", "tool@1.0.0", "github/o/r/1.0.0/tool"),
            entry("/bin", "tool@2.0.0", "github/o/r/2.0.0/tool"),
        ];

        let inv = Inventory::from_entries(entries, &opt());
        let bin = inv.get_bin("github/o/r").unwrap();
        assert_eq!(bin.versions.iter().filter(|v| v.latest).count(), 1);
    }

    #[test]
    fn test_sorted_keys() {
        let entries = vec![
            entry("/bin", "b@1.0.0", "github/zeta/b/1.0.0/b"),
            entry("/bin", "a@1.0.0", "github/alpha/a/1.0.0/a"),
        ];
        let inv = Inventory::from_entries(entries, &opt());
        assert_eq!(inv.sorted_keys(), vec!["github/alpha/a", "github/zeta/b"]);
    }

    #[test]
    fn test_foreign_targets_ignored() {
        let entries = vec![(
            PathBuf::from("/bin/something"),
            PathBuf::from("/usr/local/bin/something"),
        )];
        let inv = Inventory::from_entries(entries, &opt());
        assert_eq!(inv.count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_load_reads_only_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("bin");
        let opt = dir.path().join("opt");
        let target_dir = opt.join("github/o/r/1.0.0");
        std::fs::create_dir_all(&bin).unwrap();
        std::fs::create_dir_all(&target_dir).unwrap();

        let target = target_dir.join("tool");
        std::fs::write(&target, b"#!/bin/sh\n").unwrap();
        std::fs::write(bin.join("not-a-symlink"), b"plain file").unwrap();
        std::os::unix::fs::symlink(&target, bin.join("tool")).unwrap();
        std::os::unix::fs::symlink(&target, bin.join("tool@1.0.0")).unwrap();

        let inv = Inventory::load(&bin, &opt);
        assert_eq!(inv.count(), 1);
        let latest = inv.get_latest("github/o/r").unwrap();
        assert_eq!(latest.version, "1.0.0");
        assert!(latest.latest);
    }
}
