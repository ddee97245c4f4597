//! The per-install pipeline: discover the right assets, download them,
//! verify, extract, and install.
//!
//! Discovery runs in a fixed order (signature/key matching, then binary,
//! checksum, and signature selection) because later passes score against
//! the names chosen by earlier ones.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, info, trace, warn};

use crate::config::Policy;
use crate::config::Settings;
use crate::core::asset::{Asset, AssetId, AssetKind, AssetSet, ChecksumMode};
use crate::core::platform::Platform;
use crate::core::score::{self, ScoreOptions, ACCEPT_THRESHOLD};
use crate::io::download::Downloader;
use crate::io::extract;
use crate::ops::error::InstallError;
use crate::ops::install;
use crate::registry::{Release, ReleaseSource};
use crate::verify::{checksum, cosign, gpg};

/// What the discovered signature signs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureMode {
    None,
    File,
    Checksum,
}

/// Behavior switches for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub platform: Platform,
    pub settings: Settings,
    pub no_checksum_verify: bool,
    pub no_signature_verify: bool,
    pub no_score_check: bool,
}

/// State for one install. Owns every asset record and the temp dir; the
/// temp dir is removed when the pipeline is dropped, whatever happened.
pub struct Pipeline {
    options: PipelineOptions,
    downloader: Downloader,
    downloads_dir: PathBuf,
    bin_dir: PathBuf,
    opt_dir: PathBuf,

    pub assets: AssetSet,
    pub binary: Option<AssetId>,
    pub checksum: Option<AssetId>,
    pub signature: Option<AssetId>,
    pub key: Option<AssetId>,

    pub checksum_mode: ChecksumMode,
    pub signature_mode: SignatureMode,

    temp: Option<TempDir>,
}

impl Pipeline {
    pub fn new(
        options: PipelineOptions,
        downloader: Downloader,
        downloads_dir: PathBuf,
        bin_dir: PathBuf,
        opt_dir: PathBuf,
    ) -> Self {
        Self {
            options,
            downloader,
            downloads_dir,
            bin_dir,
            opt_dir,
            assets: AssetSet::new(),
            binary: None,
            checksum: None,
            signature: None,
            key: None,
            checksum_mode: ChecksumMode::None,
            signature_mode: SignatureMode::None,
            temp: None,
        }
    }

    /// Register the release's files as assets targeting this platform.
    pub fn add_release_assets(&mut self, release: &Release, version: &str) {
        let platform = self.options.platform.clone();
        for asset in &release.assets {
            self.assets.push(
                Asset::new(&asset.name, "", &platform.name, &platform.arch, version)
                    .with_url(&asset.url),
            );
        }
    }

    /// Run every step after `pre_run`: discover, download, verify, extract,
    /// install. The temp dir is cleaned up on success and failure alike.
    pub async fn run(&mut self, source: &dyn ReleaseSource) -> Result<(), InstallError> {
        self.discover(&[source.repo().to_string()], source.version())?;
        self.download(source).await?;

        let result = self.run_local_steps();
        self.cleanup();
        result
    }

    fn run_local_steps(&mut self) -> Result<(), InstallError> {
        self.verify()?;
        self.extract()?;
        self.install()
    }

    /// Categorize the release's assets: pair signatures with keys, then
    /// pick the binary, its checksum file, and its signature.
    pub fn discover(&mut self, names: &[String], version: &str) -> Result<(), InstallError> {
        self.discover_match();
        self.discover_binary(names, version)?;
        self.discover_checksum();
        self.determine_modes();
        self.discover_signature(version);
        Ok(())
    }

    /// Pair signatures with their keys by base name; leftovers pair
    /// greedily; `.asc` signatures with no key at all get a synthesized
    /// `.pub` sibling fetched from a keyserver later.
    fn discover_match(&mut self) {
        let ids: Vec<AssetId> = self.assets.ids().collect();

        for &sig_id in &ids {
            let sig = self.assets.get(sig_id);
            if sig.kind != AssetKind::Signature || sig.matched.is_some() {
                continue;
            }

            let sig_name = sig.name.clone();
            let sig_base = sig.base_name().to_string();
            let sig_stem = strip_final_ext(&sig_name).to_string();
            trace!("signature base name: {sig_stem}");

            for &key_id in &ids {
                let key = self.assets.get(key_id);
                if key.kind != AssetKind::Key {
                    continue;
                }

                let key_stem = strip_final_ext(&key.name);
                let key_base = key.base_name();

                if key_stem.eq_ignore_ascii_case(&sig_stem)
                    || sig_base.eq_ignore_ascii_case(key_base)
                {
                    trace!("matched key: {} to signature: {}", key.name, sig_name);
                    self.assets.get_mut(sig_id).matched = Some(key_id);
                    self.assets.get_mut(key_id).matched = Some(sig_id);
                    break;
                }
            }
        }

        // Leftover keys serve every still-unmatched signature; cosign
        // keyed signing commonly covers several files with one key.
        for &key_id in &ids {
            let key = self.assets.get(key_id);
            if key.kind != AssetKind::Key || key.matched.is_some() {
                continue;
            }
            trace!("unmatched key: {}", key.name);

            for &sig_id in &ids {
                let sig = self.assets.get(sig_id);
                if sig.kind != AssetKind::Signature || sig.matched.is_some() {
                    continue;
                }

                self.assets.get_mut(sig_id).matched = Some(key_id);
                if self.assets.get(key_id).matched.is_none() {
                    self.assets.get_mut(key_id).matched = Some(sig_id);
                }
            }
        }

        let mut found_gpg = false;
        for &sig_id in &ids {
            let sig = self.assets.get(sig_id);
            if sig.kind != AssetKind::Signature
                || sig.matched.is_some()
                || !sig.name.ends_with(".asc")
            {
                continue;
            }

            let key_name = sig.name.replace(".asc", ".pub");
            let (os, arch) = (sig.os.clone(), sig.arch.clone());
            trace!("synthesizing key {key_name} for signature {}", sig.name);

            if !found_gpg {
                info!("gpg detected will fetch public key for signature");
                found_gpg = true;
            }

            let mut key = Asset::new(&key_name, "", &os, &arch, "");
            key.from_keyserver = true;
            key.matched = Some(sig_id);
            let key_id = self.assets.push(key);
            self.assets.get_mut(sig_id).matched = Some(key_id);
        }
    }

    fn bucket_names(&self) -> HashMap<AssetKind, Vec<String>> {
        let mut buckets: HashMap<AssetKind, Vec<String>> = HashMap::new();
        for (_, asset) in self.assets.iter() {
            buckets
                .entry(asset.kind)
                .or_default()
                .push(asset.name.clone());
        }
        buckets
    }

    /// Pick the binary among binaries, archives, and unknowns.
    fn discover_binary(&mut self, names: &[String], version: &str) -> Result<(), InstallError> {
        trace!("discover: starting - {}", self.assets.len());
        let buckets = self.bucket_names();
        let platform = &self.options.platform;

        let mut terms = names.to_vec();
        terms.extend(platform.library_names().iter().cloned());

        let opts = ScoreOptions {
            os: platform.os_names(),
            arch: platform.architectures().to_vec(),
            extensions: platform.extensions().to_vec(),
            terms,
            weighted_terms: vec![("source".to_string(), -20)],
            versions: vec![version.to_string()],
            invalid_os: platform.invalid_os(),
            invalid_arch: platform.invalid_architectures(),
            invalid_extensions: vec![".zst".to_string()],
            ..Default::default()
        };

        const BINARY_KINDS: [AssetKind; 3] =
            [AssetKind::Unknown, AssetKind::Binary, AssetKind::Archive];

        let mut scored = HashMap::new();
        let mut high_enough = false;

        for kind in BINARY_KINDS {
            let Some(candidates) = buckets.get(&kind) else {
                continue;
            };
            let ranked = score::score(candidates, &opts);
            for entry in &ranked {
                debug!("file scoring sorted ({kind}): {} ({})", entry.name, entry.score);
                if entry.score >= ACCEPT_THRESHOLD {
                    high_enough = true;
                }
            }
            scored.insert(kind, ranked);
        }

        let closest = || {
            scored
                .values()
                .flatten()
                .max_by_key(|s| s.score)
                .map(|s| format!("{} ({})", s.name, s.score))
                .unwrap_or_else(|| "none".to_string())
        };

        if !high_enough && !self.options.no_score_check {
            return Err(InstallError::NoMatchingAsset { closest: closest() });
        }

        let floor = if self.options.no_score_check {
            i32::MIN
        } else {
            ACCEPT_THRESHOLD
        };

        for kind in BINARY_KINDS {
            let Some(ranked) = scored.get(&kind) else {
                continue;
            };
            let Some(top) = ranked.first() else {
                continue;
            };
            if top.score < floor {
                trace!("skipped ({kind}) too low: {} ({})", top.name, top.score);
                continue;
            }

            self.binary = self.assets.find_by_name(&top.name);
            if self.binary.is_some() {
                trace!("top scored ({kind}): {} ({})", top.name, top.score);
                break;
            }
        }

        if self.binary.is_none() {
            return Err(InstallError::NoMatchingAsset { closest: closest() });
        }

        Ok(())
    }

    /// Pick the checksum file that covers the chosen binary.
    fn discover_checksum(&mut self) {
        let Some(binary_id) = self.binary else {
            return;
        };
        let binary_name = self.assets.get(binary_id).name.clone();

        let buckets = self.bucket_names();
        let Some(candidates) = buckets.get(&AssetKind::Checksum) else {
            return;
        };

        let platform = &self.options.platform;
        let opts = ScoreOptions {
            os: platform.aliases().to_vec(),
            arch: platform.architectures().to_vec(),
            names: vec![binary_name],
            extensions: [
                "sha256", "md5", "sha1", "txt", "sha256sum", "sha1sum", "md5sum", "sha512",
                "sha512sum",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            weighted_terms: vec![
                ("checksums".to_string(), 100),
                ("SHA512".to_string(), 50),
                ("sha512sum".to_string(), 50),
                ("SHA256".to_string(), 40),
                ("sha256sum".to_string(), 40),
                ("MD5".to_string(), 30),
                ("md5sum".to_string(), 30),
                ("SHA1".to_string(), 20),
                ("sha1sum".to_string(), 20),
                ("SHA".to_string(), 15),
                ("shasum".to_string(), 15),
                ("SUMS".to_string(), 10),
            ],
            invalid_os: platform.invalid_os(),
            invalid_arch: platform.invalid_architectures(),
            ..Default::default()
        };

        let ranked = score::score(candidates, &opts);
        let Some(top) = ranked.first() else {
            return;
        };

        if top.score < ACCEPT_THRESHOLD {
            trace!("skipped (checksum) too low: {} ({})", top.name, top.score);
            return;
        }

        debug!("scored checksum: {} ({})", top.name, top.score);
        self.checksum = self.assets.find_by_name(&top.name);
    }

    /// Decide the checksum listing mode and what any signature signs.
    fn determine_modes(&mut self) {
        self.checksum_mode = match self.checksum {
            Some(id) => self.assets.get(id).checksum_mode(),
            None => ChecksumMode::None,
        };

        self.signature_mode = SignatureMode::None;
        for (_, asset) in self.assets.iter() {
            if asset.kind != AssetKind::Signature {
                continue;
            }
            if self.signature_mode == SignatureMode::File {
                break;
            }

            match asset.parent_kind {
                Some(AssetKind::Binary) | Some(AssetKind::Archive) | Some(AssetKind::Unknown) => {
                    self.signature_mode = SignatureMode::File;
                }
                Some(AssetKind::Checksum) => {
                    self.signature_mode = SignatureMode::Checksum;
                }
                _ => {}
            }
        }

        trace!("checksum mode: {:?}", self.checksum_mode);
        trace!("signature mode: {:?}", self.signature_mode);
    }

    /// Pick the signature for the signed file (binary or checksum), and
    /// carry its matched key along.
    fn discover_signature(&mut self, version: &str) {
        let signed_name = match self.signature_mode {
            SignatureMode::Checksum => self.checksum.map(|id| self.assets.get(id).name.clone()),
            SignatureMode::File => self.binary.map(|id| self.assets.get(id).name.clone()),
            SignatureMode::None => None,
        };

        let mut names = Vec::new();
        if let Some(signed) = signed_name {
            names.push(signed.clone());
            for ext in ["sig", "asc"] {
                names.push(format!("{signed}.{ext}"));
            }
        }

        let buckets = self.bucket_names();
        let Some(candidates) = buckets.get(&AssetKind::Signature) else {
            return;
        };

        trace!("signature names: {names:?}");

        let platform = &self.options.platform;
        let opts = ScoreOptions {
            extensions: ["sig", "asc", "sig.asc", "gpg", "keyless.sig"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            names,
            versions: vec![version.to_string()],
            invalid_os: platform.invalid_os(),
            invalid_arch: platform.invalid_architectures(),
            ..Default::default()
        };

        let ranked = score::score(candidates, &opts);
        let Some(top) = ranked.first() else {
            return;
        };

        if top.score < ACCEPT_THRESHOLD {
            trace!("skipped (signature) too low: {} ({})", top.name, top.score);
            return;
        }

        self.signature = self.assets.find_by_name(&top.name);
        self.key = self.signature.and_then(|id| self.assets.get(id).matched);
    }

    /// Download the designated assets, in a fixed order so the signature is
    /// on disk before a synthesized key needs its key id.
    pub async fn download(&mut self, source: &dyn ReleaseSource) -> Result<(), InstallError> {
        info!("downloading assets");
        let headers = source.download_headers();

        for id in [self.binary, self.signature, self.checksum, self.key]
            .into_iter()
            .flatten()
        {
            self.download_asset(id, &headers).await?;
        }

        Ok(())
    }

    async fn download_asset(
        &mut self,
        id: AssetId,
        headers: &[(&'static str, String)],
    ) -> Result<(), InstallError> {
        let (name, from_keyserver, url) = {
            let asset = self.assets.get(id);
            (
                asset.name.clone(),
                asset.from_keyserver,
                asset.download_url.clone(),
            )
        };
        let dest = self.downloads_dir.join(&name);

        if from_keyserver {
            return self.download_keyserver_key(id, &dest).await;
        }

        let Some(url) = url else {
            return Ok(());
        };

        let hash = self.downloader.fetch(&url, &dest, headers).await?;
        let asset = self.assets.get_mut(id);
        asset.download_path = Some(dest);
        asset.hash = Some(hash);
        Ok(())
    }

    /// Fetch a synthesized key from the keyserver, keyed by the id inside
    /// the already-downloaded signature.
    async fn download_keyserver_key(
        &mut self,
        id: AssetId,
        dest: &Path,
    ) -> Result<(), InstallError> {
        let sig_path = self
            .assets
            .get(id)
            .matched
            .and_then(|sig_id| self.assets.get(sig_id).download_path.clone());

        let Some(sig_path) = sig_path else {
            return self.degrade_signature("no signature available for key lookup");
        };

        let sig_bytes = std::fs::read(&sig_path)?;
        let key_id = match gpg::signature_key_id(&sig_bytes) {
            Ok(key_id) => key_id,
            Err(err) => {
                return self.degrade_signature(&format!("unable to determine key id: {err}"));
            }
        };

        debug!("fetching public key {key_id} from keyserver");
        let hash = self.downloader.fetch_gpg_key(&key_id, dest).await?;
        let asset = self.assets.get_mut(id);
        asset.download_path = Some(dest.to_path_buf());
        asset.hash = Some(hash);
        Ok(())
    }

    /// Apply the missing-signature policy and drop the signature pair.
    fn degrade_signature(&mut self, reason: &str) -> Result<(), InstallError> {
        match self.options.settings.signature_missing {
            Policy::Error => Err(InstallError::SignatureInvalid(reason.to_string())),
            Policy::Warn => {
                warn!("skipping signature verification ({reason})");
                self.signature = None;
                self.key = None;
                Ok(())
            }
            Policy::Ignore => {
                self.signature = None;
                self.key = None;
                Ok(())
            }
        }
    }

    /// Checksum first, then signature; verification must finish before
    /// anything is extracted.
    pub fn verify(&mut self) -> Result<(), InstallError> {
        self.verify_checksum()?;
        self.verify_signature()
    }

    fn binary_id(&self) -> Result<AssetId, InstallError> {
        self.binary
            .ok_or_else(|| InstallError::Other("no binary discovered".to_string()))
    }

    fn downloaded_path(&self, id: AssetId) -> Result<PathBuf, InstallError> {
        self.assets
            .get(id)
            .download_path
            .clone()
            .ok_or_else(|| InstallError::Other("asset not downloaded".to_string()))
    }

    fn verify_checksum(&self) -> Result<(), InstallError> {
        if self.options.no_checksum_verify {
            warn!("skipping checksum verification (user-requested)");
            return Ok(());
        }

        let Some(checksum_id) = self.checksum else {
            return match self.options.settings.checksum_missing {
                Policy::Ignore => Ok(()),
                Policy::Warn => {
                    warn!("skipping checksum verification (no checksum)");
                    Ok(())
                }
                Policy::Error => Err(InstallError::ChecksumMissing),
            };
        };

        let binary_id = self.binary_id()?;
        let binary_name = self.assets.get(binary_id).name.clone();
        let binary_path = self.downloaded_path(binary_id)?;
        let checksum_path = self.downloaded_path(checksum_id)?;

        debug!("verifying checksum");
        trace!("binary: {binary_name}");

        match checksum::compare(&binary_name, &binary_path, &checksum_path) {
            Ok(true) => {
                info!("checksum verified");
                Ok(())
            }
            Ok(false) => Err(InstallError::ChecksumMismatch),
            Err(checksum::ChecksumError::UnsupportedHashLength(len)) => {
                match self.options.settings.checksum_unknown {
                    Policy::Error => {
                        Err(checksum::ChecksumError::UnsupportedHashLength(len).into())
                    }
                    Policy::Warn => {
                        warn!("skipping checksum verification (unsupported hash length)");
                        Ok(())
                    }
                    Policy::Ignore => Ok(()),
                }
            }
            Err(err) => Err(err.into()),
        }
    }

    fn verify_signature(&self) -> Result<(), InstallError> {
        if self.options.no_signature_verify {
            warn!("skipping signature verification (user-requested)");
            return Ok(());
        }

        let Some(signature_id) = self.signature else {
            return match self.options.settings.signature_missing {
                Policy::Ignore => Ok(()),
                Policy::Warn => {
                    warn!("skipping signature verification (no signature)");
                    Ok(())
                }
                Policy::Error => Err(InstallError::SignatureMissing),
            };
        };

        if self.assets.get(signature_id).name.ends_with(".asc") {
            self.verify_gpg_signature(signature_id)
        } else {
            self.verify_cosign_signature(signature_id)
        }
    }

    /// Path of the file the signature covers.
    fn signed_file_path(&self) -> Result<PathBuf, InstallError> {
        match (self.signature_mode, self.checksum) {
            (SignatureMode::Checksum, Some(checksum_id)) => self.downloaded_path(checksum_id),
            _ => self.downloaded_path(self.binary_id()?),
        }
    }

    fn verify_gpg_signature(&self, signature_id: AssetId) -> Result<(), InstallError> {
        let Some(key_id) = self.key else {
            warn!("skipping signature verification (no key)");
            return Ok(());
        };

        let data = std::fs::read(self.signed_file_path()?)?;
        let sig_bytes = std::fs::read(self.downloaded_path(signature_id)?)?;
        let key_bytes = std::fs::read(self.downloaded_path(key_id)?)?;

        gpg::verify_detached(&key_bytes, &sig_bytes, &data)
            .map_err(|err| InstallError::SignatureInvalid(err.to_string()))?;

        info!("gpg signature verified");
        Ok(())
    }

    fn verify_cosign_signature(&self, signature_id: AssetId) -> Result<(), InstallError> {
        let data = std::fs::read(self.signed_file_path()?)?;
        let sig_bytes = std::fs::read(self.downloaded_path(signature_id)?)?;

        let Some(key_id) = self.key else {
            // A bundle carries its own certificate; without either there
            // is nothing to verify against.
            return match cosign::Bundle::parse(&sig_bytes) {
                Some(bundle) => {
                    cosign::verify_bundle(&bundle, &data)
                        .map_err(|err| InstallError::SignatureInvalid(err.to_string()))?;
                    info!("signature verified");
                    Ok(())
                }
                None => {
                    warn!("skipping signature verification (no key)");
                    Ok(())
                }
            };
        };

        let key_encoded = std::fs::read(self.downloaded_path(key_id)?)?;
        let key_content = cosign::decode_base64_or_raw(&key_encoded);
        let key = cosign::parse_public_key(&key_content)
            .map_err(|err| InstallError::SignatureInvalid(err.to_string()))?;

        let sig = cosign::decode_base64_or_raw(&sig_bytes);
        cosign::verify_signature(&key, &data, &sig)
            .map_err(|err| InstallError::SignatureInvalid(err.to_string()))?;

        info!("signature verified");
        Ok(())
    }

    /// Unpack the binary asset into a fresh temp dir.
    pub fn extract(&mut self) -> Result<(), InstallError> {
        let binary_id = self.binary_id()?;
        let path = self.downloaded_path(binary_id)?;
        let asset = self.assets.get(binary_id);

        let temp = tempfile::Builder::new().prefix("distillery").tempdir()?;
        debug!("opened and extracting file: {}", path.display());

        let files = extract::extract(
            &path,
            temp.path(),
            asset.kind == AssetKind::Archive,
            &asset.name,
        )?;

        self.assets.get_mut(binary_id).files = files;
        self.temp = Some(temp);
        Ok(())
    }

    /// Stage the executable into the opt tree and link it in bin.
    pub fn install(&mut self) -> Result<(), InstallError> {
        let binary_id = self.binary_id()?;
        let temp_path = self
            .temp
            .as_ref()
            .map(|t| t.path().to_path_buf())
            .ok_or_else(|| InstallError::Other("nothing extracted".to_string()))?;

        std::fs::create_dir_all(&self.bin_dir)?;
        let bin_dir = self.bin_dir.clone();
        let opt_dir = self.opt_dir.clone();

        install::install_asset(self.assets.get_mut(binary_id), &temp_path, &bin_dir, &opt_dir)
    }

    /// Remove the temp dir. Also runs on drop; calling it explicitly keeps
    /// failures visible.
    pub fn cleanup(&mut self) {
        if let Some(temp) = self.temp.take() {
            trace!("cleaning up temp dir: {}", temp.path().display());
            if let Err(err) = temp.close() {
                warn!("unable to cleanup: {err}");
            }
        }
    }
}

/// Name minus its final `.ext` segment.
fn strip_final_ext(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) => &name[..idx],
        None => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::platform::{AMD64, LINUX};
    use reqwest::Client;
    use tokio_util::sync::CancellationToken;

    fn test_pipeline(no_score_check: bool) -> Pipeline {
        let dir = std::env::temp_dir().join("distillery-pipeline-tests");
        Pipeline::new(
            PipelineOptions {
                platform: Platform::new(LINUX, AMD64),
                settings: Settings::default(),
                no_checksum_verify: false,
                no_signature_verify: false,
                no_score_check,
            },
            Downloader::new(Client::new(), CancellationToken::new()),
            dir.join("downloads"),
            dir.join("bin"),
            dir.join("opt"),
        )
    }

    fn push(pipeline: &mut Pipeline, name: &str, version: &str) -> AssetId {
        pipeline
            .assets
            .push(Asset::new(name, "", LINUX, AMD64, version))
    }

    #[test]
    fn test_discover_selects_binary_checksum_signature() {
        let mut p = test_pipeline(false);
        let binary = push(&mut p, "tool-1.0.0-linux-amd64.tar.gz", "1.0.0");
        push(&mut p, "tool-1.0.0-darwin-arm64.tar.gz", "1.0.0");
        push(&mut p, "tool-1.0.0-windows-amd64.zip", "1.0.0");
        let checksums = push(&mut p, "checksums.txt", "1.0.0");
        let sig = push(&mut p, "checksums.txt.sig", "1.0.0");
        let key = push(&mut p, "cosign.pub", "1.0.0");

        p.discover(&["tool".to_string()], "1.0.0").unwrap();

        assert_eq!(p.binary, Some(binary));
        assert_eq!(p.checksum, Some(checksums));
        assert_eq!(p.signature, Some(sig));
        assert_eq!(p.key, Some(key));
        assert_eq!(p.checksum_mode, ChecksumMode::Multi);
        assert_eq!(p.signature_mode, SignatureMode::Checksum);

        // The match is bidirectional.
        assert_eq!(p.assets.get(sig).matched, Some(key));
        assert_eq!(p.assets.get(key).matched, Some(sig));
    }

    #[test]
    fn test_discover_signature_over_binary() {
        let mut p = test_pipeline(false);
        let binary = push(&mut p, "tool-1.0.0-linux-amd64.tar.gz", "1.0.0");
        let sig = push(&mut p, "tool-1.0.0-linux-amd64.tar.gz.sig", "1.0.0");
        let key = push(&mut p, "tool-1.0.0-linux-amd64.tar.gz.pem", "1.0.0");

        p.discover(&["tool".to_string()], "1.0.0").unwrap();

        assert_eq!(p.binary, Some(binary));
        assert_eq!(p.signature_mode, SignatureMode::File);
        assert_eq!(p.signature, Some(sig));
        assert_eq!(p.key, Some(key));
    }

    #[test]
    fn test_discover_synthesizes_gpg_key() {
        let mut p = test_pipeline(false);
        push(&mut p, "tool-1.0.0-linux-amd64.tar.gz", "1.0.0");
        let sig = push(&mut p, "tool-1.0.0-linux-amd64.tar.gz.asc", "1.0.0");

        p.discover(&["tool".to_string()], "1.0.0").unwrap();

        let key_id = p.assets.get(sig).matched.expect("signature gets a key");
        let key = p.assets.get(key_id);
        assert_eq!(key.name, "tool-1.0.0-linux-amd64.tar.gz.pub");
        assert!(key.from_keyserver);
        assert_eq!(key.matched, Some(sig));
        assert_eq!(p.signature, Some(sig));
        assert_eq!(p.key, Some(key_id));
    }

    #[test]
    fn test_discover_no_matching_asset() {
        let mut p = test_pipeline(false);
        push(&mut p, "tool-solaris-sparc.tar.gz", "1.0.0");

        let err = p.discover(&["tool".to_string()], "1.0.0").unwrap_err();
        match err {
            InstallError::NoMatchingAsset { closest } => {
                assert!(closest.contains("tool-solaris-sparc.tar.gz"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_no_score_check_disables_floor() {
        let mut p = test_pipeline(true);
        let only = push(&mut p, "tool-solaris-sparc.tar.gz", "1.0.0");

        p.discover(&["tool".to_string()], "1.0.0").unwrap();
        assert_eq!(p.binary, Some(only));
    }

    #[test]
    fn test_checksum_missing_policy_error() {
        let mut p = test_pipeline(false);
        p.options.settings.checksum_missing = Policy::Error;
        let binary = push(&mut p, "tool-1.0.0-linux-amd64.tar.gz", "1.0.0");
        p.binary = Some(binary);

        let err = p.verify_checksum().unwrap_err();
        assert!(matches!(err, InstallError::ChecksumMissing));
    }

    #[test]
    fn test_signature_missing_policy_warn_passes() {
        let mut p = test_pipeline(false);
        let binary = push(&mut p, "tool-1.0.0-linux-amd64.tar.gz", "1.0.0");
        p.binary = Some(binary);

        // Default policy is warn: both verifiers absent still verifies.
        p.verify().unwrap();
    }
}
