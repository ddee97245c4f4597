//! Target platform model: canonical OS/arch names plus the alias and
//! architecture-family token sets used for asset matching.

pub const WINDOWS: &str = "windows";
pub const LINUX: &str = "linux";
pub const DARWIN: &str = "darwin";
pub const FREEBSD: &str = "freebsd";

pub const AMD64: &str = "amd64";
pub const ARM64: &str = "arm64";

/// Tokens vendors use for the amd64 family.
pub const AMD64_ARCHITECTURES: &[&str] =
    &["amd64", "x86_64", "64bit", "x64", "x86", "64-bit", "x86-64"];

/// Tokens vendors use for the arm64 family.
pub const ARM64_ARCHITECTURES: &[&str] = &["arm64", "aarch64", "armv8-a", "arm64-bit"];

/// A target operating system and architecture with the token sets derived
/// from them.
#[derive(Debug, Clone)]
pub struct Platform {
    pub name: String,
    pub arch: String,
    aliases: Vec<String>,
    architectures: Vec<String>,
    extensions: Vec<String>,
    library_names: Vec<String>,
}

impl Platform {
    pub fn new(os: &str, arch: &str) -> Self {
        let mut platform = Self {
            name: os.to_string(),
            arch: arch.to_string(),
            aliases: Vec::new(),
            architectures: vec![arch.to_string()],
            extensions: Vec::new(),
            library_names: Vec::new(),
        };

        match os {
            WINDOWS => {
                platform.aliases = vec!["win".to_string()];
                platform.extensions = vec![".exe".to_string()];
            }
            LINUX => {
                platform.extensions = vec![".AppImage".to_string()];
            }
            DARWIN => {
                platform.aliases = vec!["macos".to_string(), "sonoma".to_string()];
                platform.architectures.push("universal".to_string());
            }
            _ => {}
        }

        match arch {
            AMD64 => platform
                .architectures
                .extend(AMD64_ARCHITECTURES.iter().map(|s| s.to_string())),
            ARM64 => platform
                .architectures
                .extend(ARM64_ARCHITECTURES.iter().map(|s| s.to_string())),
            _ => {}
        }

        platform.architectures.sort();
        platform.architectures.dedup();

        platform
    }

    /// Platform for the running host, normalized to release-asset naming
    /// (`x86_64` → `amd64`, `aarch64` → `arm64`).
    pub fn host() -> Self {
        Self::new(host_os(), host_arch())
    }

    /// The OS name followed by its aliases.
    pub fn os_names(&self) -> Vec<String> {
        let mut names = vec![self.name.clone()];
        names.extend(self.aliases.iter().cloned());
        names
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn architectures(&self) -> &[String] {
        &self.architectures
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    pub fn library_names(&self) -> &[String] {
        &self.library_names
    }

    /// Operating systems this platform is definitely not.
    pub fn invalid_os(&self) -> Vec<String> {
        let names: &[&str] = match self.name.as_str() {
            WINDOWS => &[LINUX, DARWIN, FREEBSD],
            LINUX => &[WINDOWS, DARWIN],
            DARWIN => &[WINDOWS, LINUX, FREEBSD],
            _ => &[],
        };
        names.iter().map(|s| s.to_string()).collect()
    }

    /// The architecture family this platform is not.
    pub fn invalid_architectures(&self) -> Vec<String> {
        let archs: &[&str] = match self.arch.as_str() {
            ARM64 => AMD64_ARCHITECTURES,
            AMD64 => ARM64_ARCHITECTURES,
            _ => &[],
        };
        archs.iter().map(|s| s.to_string()).collect()
    }
}

/// Host OS under its release-asset name.
pub fn host_os() -> &'static str {
    match std::env::consts::OS {
        "macos" => DARWIN,
        "windows" => WINDOWS,
        "freebsd" => FREEBSD,
        _ => LINUX,
    }
}

/// Host architecture under its release-asset name.
pub fn host_arch() -> &'static str {
    match std::env::consts::ARCH {
        "aarch64" => ARM64,
        "arm" => "arm",
        _ => AMD64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linux_amd64_tokens() {
        let p = Platform::new(LINUX, AMD64);
        assert_eq!(p.os_names(), vec!["linux"]);
        assert!(p.architectures().contains(&"x86_64".to_string()));
        assert!(p.architectures().contains(&"64bit".to_string()));
        assert_eq!(p.extensions(), &[".AppImage".to_string()]);
        assert_eq!(p.invalid_os(), vec!["windows", "darwin"]);
        assert!(p.invalid_architectures().contains(&"aarch64".to_string()));
    }

    #[test]
    fn test_darwin_aliases_and_universal() {
        let p = Platform::new(DARWIN, ARM64);
        assert!(p.os_names().contains(&"macos".to_string()));
        assert!(p.os_names().contains(&"sonoma".to_string()));
        assert!(p.architectures().contains(&"universal".to_string()));
        assert!(p.architectures().contains(&"aarch64".to_string()));
    }

    #[test]
    fn test_windows_extension() {
        let p = Platform::new(WINDOWS, AMD64);
        assert_eq!(p.os_names(), vec!["windows", "win"]);
        assert_eq!(p.extensions(), &[".exe".to_string()]);
    }

    #[test]
    fn test_architectures_deduped_sorted() {
        let p = Platform::new(LINUX, AMD64);
        let mut sorted = p.architectures().to_vec();
        sorted.sort();
        sorted.dedup();
        assert_eq!(p.architectures(), sorted.as_slice());
    }
}
