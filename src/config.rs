//! Configuration loading: YAML or TOML, selected by file extension.
//!
//! All path values get `$HOME`/`$VAR` expansion, relative paths resolve
//! against the working directory, and `..`/`//` segments are normalized.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::version::LATEST;

/// How to react when a verification input is missing or unusable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Policy {
    Ignore,
    #[default]
    Warn,
    Error,
}

/// Behavior knobs for the verification chain.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    #[serde(rename = "checksum-missing")]
    pub checksum_missing: Policy,
    #[serde(rename = "checksum-unknown")]
    pub checksum_unknown: Policy,
    #[serde(rename = "signature-missing")]
    pub signature_missing: Policy,
}

/// A short name the user can install instead of a full spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alias {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_version() -> String {
    LATEST.to_string()
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    path: Option<String>,
    #[serde(rename = "bin-path")]
    bin_path: Option<String>,
    #[serde(rename = "opt-path")]
    opt_path: Option<String>,
    #[serde(rename = "cache-path")]
    cache_path: Option<String>,
    aliases: HashMap<String, Alias>,
    settings: Settings,
}

/// Resolved configuration with the full directory layout.
#[derive(Debug, Clone)]
pub struct Config {
    pub path: PathBuf,
    pub bin_path: PathBuf,
    pub opt_path: PathBuf,
    pub cache_path: PathBuf,
    pub aliases: HashMap<String, Alias>,
    pub settings: Settings,
}

impl Config {
    /// Load from `file`, falling back to defaults when it does not exist.
    pub fn load(file: &Path) -> Result<Self> {
        let raw = if file.exists() {
            let content = std::fs::read_to_string(file)
                .with_context(|| format!("failed to read config: {}", file.display()))?;
            match file.extension().and_then(|e| e.to_str()) {
                Some("toml") => toml::from_str(&content)
                    .with_context(|| format!("invalid toml config: {}", file.display()))?,
                _ => serde_yaml::from_str(&content)
                    .with_context(|| format!("invalid yaml config: {}", file.display()))?,
            }
        } else {
            FileConfig::default()
        };

        Ok(Self::from_raw(raw))
    }

    fn from_raw(raw: FileConfig) -> Self {
        let home = raw
            .path
            .map(|p| process_path(&p))
            .unwrap_or_else(default_home);

        let bin_path = raw
            .bin_path
            .map(|p| process_path(&p))
            .unwrap_or_else(|| home.join("bin"));
        let opt_path = raw
            .opt_path
            .map(|p| process_path(&p))
            .unwrap_or_else(|| home.join("opt"));
        let cache_path = raw
            .cache_path
            .map(|p| process_path(&p))
            .unwrap_or_else(|| home.join("cache"));

        Self {
            path: home,
            bin_path,
            opt_path,
            cache_path,
            aliases: raw.aliases,
            settings: raw.settings,
        }
    }

    /// Default config file: `<user config dir>/distillery.yaml`
    /// (`~/.config` on macOS).
    pub fn default_file() -> PathBuf {
        let dir = if cfg!(target_os = "macos") {
            dirs::home_dir().map(|h| h.join(".config"))
        } else {
            dirs::config_dir()
        };
        dir.unwrap_or_else(|| PathBuf::from("."))
            .join("distillery.yaml")
    }

    pub fn downloads_path(&self) -> PathBuf {
        self.cache_path.join("downloads")
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.cache_path.join("metadata")
    }

    /// Create the directory tree this tool installs into.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [
            &self.path,
            &self.bin_path,
            &self.opt_path,
            &self.cache_path,
            &self.downloads_path(),
            &self.metadata_path(),
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    pub fn get_alias(&self, name: &str) -> Option<&Alias> {
        self.aliases.get(name)
    }
}

fn default_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".distillery")
}

/// Expand `$VAR` references (unset variables expand to nothing), resolve
/// relative paths against the working directory, and normalize `.`/`..`
/// and repeated separators.
pub fn process_path(path: &str) -> PathBuf {
    let expanded = expand_vars(path);

    let expanded = if expanded.starts_with('/') {
        expanded
    } else {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
        format!("{}/{}", cwd.display(), expanded)
    };

    let mut parts: Vec<&str> = Vec::new();
    for part in expanded.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            part => parts.push(part),
        }
    }

    PathBuf::from(format!("/{}", parts.join("/")))
}

fn expand_vars(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut chars = path.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }

        let mut name = String::new();
        while let Some(&(_, next)) = chars.peek() {
            if next.is_ascii_alphanumeric() || next == '_' {
                name.push(next);
                chars.next();
            } else {
                break;
            }
        }

        if name.is_empty() {
            out.push('$');
        } else if name == "HOME" {
            if let Some(home) = dirs::home_dir() {
                out.push_str(&home.to_string_lossy());
            }
        } else if let Ok(value) = std::env::var(&name) {
            out.push_str(&value);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_config(
            dir.path(),
            "base.yaml",
            "path: /home/test/.distillery\n\
cache-path: /home/test/.cache\n\
aliases:\n\
  dist:\n\
    name: ekristen/distillery\n\
    version: latest\n\
  aws-nuke:\n\
    name: ekristen/aws-nuke\n\
    version: 3.29.3\n",
        );

        let content = std::fs::read_to_string(&file).unwrap();
        let val: serde_yaml::Value = serde_yaml::from_str(&content).unwrap();
        eprintln!("DEBUG value: {:?}", val);
        let raw: FileConfig = serde_yaml::from_str(&content).unwrap();
        eprintln!("DEBUG raw aliases: {:?}", raw.aliases);
        let cfg = Config::load(&file).unwrap();
        eprintln!("DEBUG aliases: {:?}", cfg.aliases);
        assert_eq!(cfg.path, PathBuf::from("/home/test/.distillery"));
        assert_eq!(cfg.cache_path, PathBuf::from("/home/test/.cache"));
        assert_eq!(cfg.bin_path, PathBuf::from("/home/test/.distillery/bin"));
        assert_eq!(cfg.opt_path, PathBuf::from("/home/test/.distillery/opt"));

        let alias = cfg.get_alias("aws-nuke").unwrap();
        assert_eq!(alias.name, "ekristen/aws-nuke");
        assert_eq!(alias.version, "3.29.3");
        assert_eq!(cfg.get_alias("dist").unwrap().version, "latest");
    }

    #[test]
    fn test_load_toml() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_config(
            dir.path(),
            "base.toml",
            "path = \"/home/test/.distillery\"\n\
             cache-path = \"/home/test/.cache\"\n\n\
             [aliases.dist]\n\
             name = \"ekristen/distillery\"\n\n\
             [settings]\n\
             signature-missing = \"error\"\n",
        );

        let cfg = Config::load(&file).unwrap();
        assert_eq!(cfg.path, PathBuf::from("/home/test/.distillery"));
        assert_eq!(cfg.cache_path, PathBuf::from("/home/test/.cache"));
        assert_eq!(cfg.get_alias("dist").unwrap().version, "latest");
        assert_eq!(cfg.settings.signature_missing, Policy::Error);
        assert_eq!(cfg.settings.checksum_missing, Policy::Warn);
    }

    #[test]
    fn test_missing_file_defaults() {
        let cfg = Config::load(Path::new("/nonexistent/config.yaml")).unwrap();
        assert!(cfg.path.ends_with(".distillery"));
        assert_eq!(cfg.bin_path, cfg.path.join("bin"));
        assert_eq!(cfg.downloads_path(), cfg.cache_path.join("downloads"));
    }

    #[test]
    fn test_process_path() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(process_path("$HOME/.config/test"), home.join(".config/test"));

        assert_eq!(process_path("/test/.."), PathBuf::from("/"));

        std::env::set_var("DISTILLERY_TEST_VAR", "value");
        assert_eq!(
            process_path("/$DISTILLERY_TEST_VAR/path"),
            PathBuf::from("/value/path")
        );

        assert_eq!(
            process_path("/$DISTILLERY_UNSET_VAR/test"),
            PathBuf::from("/test")
        );

        let cwd = std::env::current_dir().unwrap();
        assert_eq!(process_path("test/path"), cwd.join("test/path"));

        assert_eq!(process_path("/test//path"), PathBuf::from("/test/path"));
    }
}
