//! Release asset records: classification by filename, derived parent kinds,
//! checksum modes, and the arena the discovery passes operate over.

use std::path::PathBuf;

use tracing::trace;

/// What a release file is, as far as the resolver cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Unknown,
    Archive,
    Binary,
    Installer,
    Checksum,
    Signature,
    Key,
    Sbom,
    Data,
}

impl std::fmt::Display for AssetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AssetKind::Unknown => "unknown",
            AssetKind::Archive => "archive",
            AssetKind::Binary => "binary",
            AssetKind::Installer => "installer",
            AssetKind::Checksum => "checksum",
            AssetKind::Signature => "signature",
            AssetKind::Key => "key",
            AssetKind::Sbom => "sbom",
            AssetKind::Data => "data",
        };
        f.write_str(s)
    }
}

/// How a checksum file lists its digests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumMode {
    None,
    /// One digest covering a single file.
    Single,
    /// `digest  filename` rows.
    Multi,
}

/// Registered extension table. Lookups are case-sensitive and keyed on the
/// extension exactly as extracted, mirroring how release assets are named
/// in practice (lowercase).
const EXTENSION_TYPES: &[(&str, &str)] = &[
    ("deb", "application/vnd.debian.binary-package"),
    ("rpm", "application/x-rpm"),
    ("msi", "application/octet-stream"),
    ("apk", "application/vnd.android.package-archive"),
    ("pkg", "application/octet-stream"),
    ("gz", "application/gzip"),
    ("tgz", "application/tar+gzip"),
    ("zip", "application/zip"),
    ("xz", "application/x-xz"),
    ("tar", "application/x-tar"),
    ("bz2", "application/x-bzip2"),
    ("zst", "application/zstd"),
    ("exe", "application/vnd.microsoft.portable-executable"),
    ("sig", "text/plain"),
    ("asc", "text/plain"),
    ("pem", "application/x-pem-file"),
    ("pub", "text/plain"),
    ("cert", "application/x-x509-ca-cert"),
    ("crt", "application/x-x509-ca-cert"),
    ("sbom.json", "application/json"),
    ("bom.json", "application/json"),
    ("json", "application/json"),
    ("sbom", "application/octet-stream"),
    ("bom", "application/octet-stream"),
];

/// Resolve an extension to its registered type key, if any.
pub fn registered_extension(ext: &str) -> Option<&'static str> {
    EXTENSION_TYPES
        .iter()
        .find(|(key, _)| *key == ext)
        .map(|(key, _)| *key)
}

/// MIME-equivalence used by the scoring resolver's extension rule: two
/// extensions are equivalent when they resolve to the same registered
/// type, or when neither is registered at all.
pub fn extensions_equivalent(a: &str, b: &str) -> bool {
    registered_extension(a) == registered_extension(b)
}

/// Final `.ext` of a name, dot included, empty if none.
fn final_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) => &name[idx..],
        None => "",
    }
}

fn has_checksum_suffix(name: &str) -> bool {
    const SUFFIXES: &[&str] = &[
        ".sha512",
        ".sha512sum",
        ".sha256",
        ".sha256sum",
        ".md5",
        ".md5sum",
        ".sha1",
        ".sha1sum",
        ".shasum",
    ];
    SUFFIXES.iter().any(|s| name.ends_with(s))
}

/// Classify a release filename into an [`AssetKind`].
///
/// Order matters: registered extensions first, then checksum name
/// heuristics, then ambient key cues; everything else is `Unknown`.
pub fn classify(name: &str) -> AssetKind {
    let mut kind = AssetKind::Unknown;

    let ext = final_extension(name).trim_start_matches('.');
    if !ext.is_empty() {
        kind = match registered_extension(ext) {
            Some("deb") | Some("rpm") | Some("msi") | Some("apk") | Some("pkg") => {
                AssetKind::Installer
            }
            Some("gz") | Some("tgz") | Some("zip") | Some("xz") | Some("tar") | Some("bz2")
            | Some("zst") => AssetKind::Archive,
            Some("exe") => AssetKind::Binary,
            Some("sig") | Some("asc") => AssetKind::Signature,
            Some("pem") | Some("pub") | Some("cert") | Some("crt") => AssetKind::Key,
            Some("sbom.json") | Some("bom.json") | Some("sbom") | Some("bom") => AssetKind::Sbom,
            Some("json") => {
                if name.contains(".sbom") || name.contains(".bom") {
                    AssetKind::Sbom
                } else {
                    AssetKind::Data
                }
            }
            _ => AssetKind::Unknown,
        };
    }

    if kind == AssetKind::Unknown {
        trace!("classifying asset based on name: {name}");
        let lower = name.to_lowercase();
        if has_checksum_suffix(&lower)
            || lower.contains("checksums")
            || (lower.contains("sha") && lower.contains("sums"))
            || lower.contains("sums")
        {
            kind = AssetKind::Checksum;
        }
    }

    if kind == AssetKind::Unknown
        && (name.contains("-pivkey-") || (name.contains("pkcs") && name.contains("key")))
    {
        kind = AssetKind::Key;
    }

    trace!("classified: {name} - {kind}");

    kind
}

/// Checksum listing mode implied by a filename.
pub fn checksum_mode(name: &str) -> ChecksumMode {
    let name = name.to_lowercase();
    if has_checksum_suffix(&name) {
        return ChecksumMode::Single;
    }
    if name.contains("checksums")
        || name.contains("checksum")
        || (name.contains("sha") && name.contains("sums"))
        || name.contains("sums")
    {
        return ChecksumMode::Multi;
    }
    ChecksumMode::None
}

/// Strip recognizable extensions from a filename, one trailing segment at a
/// time. A segment longer than five characters (dot included) or containing
/// an underscore is part of the name, not an extension.
pub fn base_name(name: &str) -> &str {
    let mut current = name;
    loop {
        let ext = final_extension(current);
        if ext.len() > 5 || ext.contains('_') {
            break;
        }
        let stripped = current.strip_suffix(ext).unwrap_or(current);
        if stripped == current {
            break;
        }
        current = stripped;
    }
    current
}

/// Parent name used to derive the parent kind of a signature, key, or
/// checksum asset: the final extension removed wherever it occurs, plus a
/// trailing `-keyless`.
fn parent_name(name: &str) -> String {
    let ext = final_extension(name);
    let stripped = if ext.is_empty() {
        name.to_string()
    } else {
        name.replace(ext, "")
    };
    stripped
        .strip_suffix("-keyless")
        .unwrap_or(&stripped)
        .to_string()
}

/// Index of an asset in its [`AssetSet`]. Stable for the life of the
/// pipeline; match back-references hold these instead of owning the asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AssetId(usize);

/// A file extracted (or copied) out of the downloaded asset.
#[derive(Debug, Clone)]
pub struct ExtractedFile {
    pub name: String,
    pub alias: Option<String>,
    pub installable: bool,
}

impl ExtractedFile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            installable: false,
        }
    }
}

/// One file in a release, annotated through discovery and the download,
/// verify, extract, install steps.
#[derive(Debug, Clone)]
pub struct Asset {
    pub name: String,
    pub display_name: String,
    pub kind: AssetKind,
    /// Set iff `kind` is Signature, Key, or Checksum.
    pub parent_kind: Option<AssetKind>,

    pub os: String,
    pub arch: String,
    pub version: String,

    /// Where the asset body comes from. `None` for synthesized keys, which
    /// are fetched from a GPG keyserver instead of the release.
    pub download_url: Option<String>,
    pub from_keyserver: bool,

    pub download_path: Option<PathBuf>,
    pub hash: Option<String>,

    /// Signature↔key partner, when one was matched.
    pub matched: Option<AssetId>,

    pub files: Vec<ExtractedFile>,
}

impl Asset {
    pub fn new(name: &str, display_name: &str, os: &str, arch: &str, version: &str) -> Self {
        let kind = classify(name);
        let parent_kind = match kind {
            AssetKind::Signature | AssetKind::Key | AssetKind::Checksum => {
                Some(classify(&parent_name(name)))
            }
            _ => None,
        };

        Self {
            name: name.to_string(),
            display_name: display_name.to_string(),
            kind,
            parent_kind,
            os: os.to_string(),
            arch: arch.to_string(),
            version: version.to_string(),
            download_url: None,
            from_keyserver: false,
            download_path: None,
            hash: None,
            matched: None,
            files: Vec::new(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.download_url = Some(url.into());
        self
    }

    /// Name with all recognizable extensions stripped.
    pub fn base_name(&self) -> &str {
        base_name(&self.name)
    }

    pub fn checksum_mode(&self) -> ChecksumMode {
        checksum_mode(&self.name)
    }

    /// The display name when present, else the filename.
    pub fn label(&self) -> &str {
        if self.display_name.is_empty() {
            &self.name
        } else {
            &self.display_name
        }
    }
}

/// Arena owning every asset of a pipeline run. Assets are only ever
/// appended; ids stay valid until the run ends.
#[derive(Debug, Default)]
pub struct AssetSet {
    items: Vec<Asset>,
}

impl AssetSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, asset: Asset) -> AssetId {
        self.items.push(asset);
        AssetId(self.items.len() - 1)
    }

    pub fn get(&self, id: AssetId) -> &Asset {
        &self.items[id.0]
    }

    pub fn get_mut(&mut self, id: AssetId) -> &mut Asset {
        &mut self.items[id.0]
    }

    pub fn ids(&self) -> impl Iterator<Item = AssetId> {
        (0..self.items.len()).map(AssetId)
    }

    pub fn iter(&self) -> impl Iterator<Item = (AssetId, &Asset)> {
        self.items.iter().enumerate().map(|(i, a)| (AssetId(i), a))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Id of the asset with this exact name, if present.
    pub fn find_by_name(&self, name: &str) -> Option<AssetId> {
        self.iter().find(|(_, a)| a.name == name).map(|(id, _)| id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_archives_and_binaries() {
        assert_eq!(classify("tool-1.0.0-linux-amd64.tar.gz"), AssetKind::Archive);
        assert_eq!(classify("tool-1.0.0-windows-amd64.zip"), AssetKind::Archive);
        assert_eq!(classify("tool-1.0.0.tar.xz"), AssetKind::Archive);
        assert_eq!(classify("tool-1.0.0.tar.zst"), AssetKind::Archive);
        assert_eq!(classify("tool.exe"), AssetKind::Binary);
        assert_eq!(classify("tool-linux-amd64"), AssetKind::Unknown);
    }

    #[test]
    fn test_classify_installers() {
        assert_eq!(classify("tool_1.0.0_amd64.deb"), AssetKind::Installer);
        assert_eq!(classify("tool-1.0.0.x86_64.rpm"), AssetKind::Installer);
        assert_eq!(classify("tool-1.0.0.msi"), AssetKind::Installer);
        assert_eq!(classify("tool-1.0.0.apk"), AssetKind::Installer);
    }

    #[test]
    fn test_classify_checksums() {
        assert_eq!(classify("checksums.txt"), AssetKind::Checksum);
        assert_eq!(classify("tool_1.0.0_SHA256SUMS"), AssetKind::Checksum);
        assert_eq!(
            classify("tool-1.0.0-linux-amd64.tar.gz.sha256"),
            AssetKind::Checksum
        );
        assert_eq!(classify("tool.md5sum"), AssetKind::Checksum);
    }

    #[test]
    fn test_classify_signatures_and_keys() {
        assert_eq!(
            classify("tool-1.0.0-linux-amd64.tar.gz.sig"),
            AssetKind::Signature
        );
        assert_eq!(classify("checksums.txt.asc"), AssetKind::Signature);
        assert_eq!(classify("cosign.pub"), AssetKind::Key);
        assert_eq!(classify("signing.pem"), AssetKind::Key);
        assert_eq!(classify("tool-pivkey-2024"), AssetKind::Key);
    }

    #[test]
    fn test_classify_sbom_and_data() {
        assert_eq!(classify("tool.spdx.sbom.json"), AssetKind::Sbom);
        assert_eq!(classify("tool.bom"), AssetKind::Sbom);
        assert_eq!(classify("metadata.json"), AssetKind::Data);
    }

    #[test]
    fn test_classify_is_deterministic() {
        for name in ["checksums.txt", "tool.tar.gz", "cosign.pub", "random-file"] {
            assert_eq!(classify(name), classify(name));
        }
    }

    #[test]
    fn test_parent_kind_derivation() {
        let sig = Asset::new(
            "tool-1.0.0-linux-amd64.tar.gz.sig",
            "",
            "linux",
            "amd64",
            "1.0.0",
        );
        assert_eq!(sig.kind, AssetKind::Signature);
        assert_eq!(sig.parent_kind, Some(AssetKind::Archive));

        let checksum_sig = Asset::new("checksums.txt.sig", "", "linux", "amd64", "1.0.0");
        assert_eq!(checksum_sig.parent_kind, Some(AssetKind::Checksum));

        let keyless = Asset::new("tool-keyless.sig", "", "linux", "amd64", "1.0.0");
        assert_eq!(keyless.parent_kind, Some(AssetKind::Unknown));

        let binary = Asset::new("tool.tar.gz", "", "linux", "amd64", "1.0.0");
        assert_eq!(binary.parent_kind, None);
    }

    #[test]
    fn test_checksum_mode() {
        assert_eq!(checksum_mode("tool.tar.gz.sha256"), ChecksumMode::Single);
        assert_eq!(checksum_mode("tool.sha512sum"), ChecksumMode::Single);
        assert_eq!(checksum_mode("checksums.txt"), ChecksumMode::Multi);
        assert_eq!(checksum_mode("tool_SHA256SUMS"), ChecksumMode::Multi);
        assert_eq!(checksum_mode("tool.tar.gz"), ChecksumMode::None);
    }

    #[test]
    fn test_base_name_stripping() {
        assert_eq!(
            base_name("tool-1.0.0-linux-amd64.tar.gz"),
            "tool-1.0.0-linux-amd64"
        );
        assert_eq!(base_name("checksums.txt.sig"), "checksums");
        assert_eq!(base_name("tool_v1.2.3"), "tool_v1");
        // Long trailing segments are part of the name, not an extension.
        assert_eq!(base_name("tool.AppImage4x"), "tool.AppImage4x");
    }

    #[test]
    fn test_extension_equivalence() {
        assert!(extensions_equivalent("gz", "gz"));
        assert!(!extensions_equivalent("gz", "tgz"));
        // Unregistered extensions are equivalent to each other.
        assert!(extensions_equivalent("txt", "sha256"));
        assert!(!extensions_equivalent("txt", "gz"));
    }

    #[test]
    fn test_asset_set_arena() {
        let mut set = AssetSet::new();
        let a = set.push(Asset::new("a.sig", "", "linux", "amd64", "1.0.0"));
        let b = set.push(Asset::new("a.pub", "", "linux", "amd64", "1.0.0"));

        set.get_mut(a).matched = Some(b);
        set.get_mut(b).matched = Some(a);

        assert_eq!(set.get(a).matched, Some(b));
        assert_eq!(set.get(b).matched, Some(a));
        assert_eq!(set.find_by_name("a.pub"), Some(b));
        assert_eq!(set.len(), 2);
    }
}
