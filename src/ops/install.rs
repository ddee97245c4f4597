//! Executable staging: decide which extracted files are installable, derive
//! their canonical names, copy them into the opt tree, and point the bin
//! symlinks at them.

use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::{debug, trace, warn};

use crate::core::asset::Asset;
use crate::core::platform::{self, Platform, LINUX, WINDOWS};
use crate::ops::error::InstallError;

/// Content types that mark a file as an executable.
const EXECUTABLE_MIMETYPES: &[&str] = &[
    "application/x-mach-binary",
    "application/x-executable",
    "application/x-elf",
    "application/vnd.microsoft.portable-executable",
];

/// Detected extensions that are never executables.
const IGNORE_FILE_EXTENSIONS: &[&str] = &["txt", "sbom", "json"];

/// Mark each staged file installable or not based on its content type.
pub fn determine_installable(asset: &mut Asset, temp: &Path) {
    trace!("files to process: {}", asset.files.len());

    for file in &mut asset.files {
        let full_path = temp.join(&file.name);
        debug!("checking file for installable: {}", file.name);

        let detected = match infer::get_from_path(&full_path) {
            Ok(detected) => detected,
            Err(err) => {
                warn!("unable to determine mimetype: {err}");
                continue;
            }
        };

        if let Some(kind) = detected {
            debug!("found mimetype: {}", kind.mime_type());

            if IGNORE_FILE_EXTENSIONS.contains(&kind.extension()) {
                trace!("ignoring file: {}", file.name);
                continue;
            }

            if EXECUTABLE_MIMETYPES.contains(&kind.mime_type()) {
                debug!("found installable executable: {}", file.name);
                file.installable = true;
            }
        }

        // Toolchains sometimes emit PIE binaries that content detection
        // reports as shared libraries (or not at all); the ELF magic is
        // the tie-breaker on Linux.
        if !file.installable
            && asset.os == LINUX
            && detected.map_or(true, |k| k.mime_type() == "application/x-sharedlib")
        {
            file.installable = is_elf(&full_path);
        }
    }
}

/// True when the file starts with the ELF magic.
fn is_elf(path: &Path) -> bool {
    use std::io::Read;

    let Ok(mut file) = std::fs::File::open(path) else {
        return false;
    };
    let mut magic = [0u8; 4];
    if file.read_exact(&mut magic).is_err() {
        return false;
    }
    magic == [0x7f, b'E', b'L', b'F']
}

/// Canonical destination name: the staged filename with OS/arch/version
/// decorations stripped.
pub fn destination_name(filename: &str, asset: &Asset) -> String {
    let platform = Platform::new(&asset.os, &asset.arch);

    let mut name = filename.to_string();
    trace!("pre-dstFilename: {name}");

    name = name.replace(&asset.os, "");
    name = name.replace(&asset.arch, "");

    for alias in platform.aliases() {
        name = name.replace(alias, "");
    }
    for arch in platform.architectures() {
        name = name.replace(arch, "");
    }

    if !asset.version.is_empty() {
        name = name.replace(&format!("v{}", asset.version), "");
        name = name.replace(&asset.version, "");
    }

    if let Ok(version_fragment) = Regex::new(r"\d+\.\d+") {
        name = version_fragment.replace_all(&name, "").to_string();
    }

    if asset.os == WINDOWS || name.ends_with(".exe") {
        name = name.strip_suffix(".exe").unwrap_or(&name).to_string();
    }

    name = name
        .trim()
        .trim_end_matches('-')
        .trim_end_matches('_')
        .to_string();

    if asset.os == WINDOWS {
        name = format!("{name}.exe");
    }

    trace!("post-dstFilename: {name}");

    name
}

/// Install the asset's staged files: copy installables to `opt_dir` and
/// create the default and versioned symlinks in `bin_dir` when the host
/// matches the asset's platform.
pub fn install_asset(
    asset: &mut Asset,
    temp: &Path,
    bin_dir: &Path,
    opt_dir: &Path,
) -> Result<(), InstallError> {
    std::fs::create_dir_all(opt_dir)?;

    determine_installable(asset, temp);

    let mut found = false;

    for file in &asset.files {
        if !file.installable {
            trace!("skipping file: {}", file.name);
            continue;
        }

        found = true;
        debug!("installing file: {}", file.name);

        let full_path = temp.join(&file.name);
        let staged_name = match &file.alias {
            Some(alias) => alias.clone(),
            None => full_path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| file.name.clone()),
        };

        let dst_name = destination_name(&staged_name, asset);

        let opt_file = opt_dir.join(&dst_name);
        debug!("copying executable: {} to {}", full_path.display(), opt_file.display());
        copy_executable(&full_path, &opt_file)?;

        if platform::host_os() == asset.os && platform::host_arch() == asset.arch {
            let default_link = bin_dir.join(&dst_name);
            let versioned_link = bin_dir.join(format!(
                "{dst_name}@{}",
                asset.version.trim_start_matches('v')
            ));

            debug!("creating symlink: {} to {}", default_link.display(), opt_file.display());
            debug!("creating symlink: {} to {}", versioned_link.display(), opt_file.display());

            let _ = std::fs::remove_file(&default_link);
            let _ = std::fs::remove_file(&versioned_link);
            symlink(&opt_file, &default_link)?;
            symlink(&opt_file, &versioned_link)?;
        }
    }

    if !found {
        return Err(InstallError::NoExecutableInRelease);
    }

    Ok(())
}

fn copy_executable(src: &Path, dst: &Path) -> std::io::Result<()> {
    std::fs::copy(src, dst)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(dst, std::fs::Permissions::from_mode(0o755))?;
    }

    Ok(())
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

/// The opt subtree for one installed version.
pub fn opt_version_dir(
    opt_root: &Path,
    source: &str,
    owner: &str,
    repo: &str,
    version: &str,
) -> PathBuf {
    opt_root.join(source).join(owner).join(repo).join(version)
}
