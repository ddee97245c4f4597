//! Archive extraction
//!
//! Identifies the downloaded file's format by extension first and content
//! sniff second, then unpacks it into the pipeline temp dir. Files that are
//! not archives fall through as direct copies.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::core::asset::ExtractedFile;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("unable to identify or invalid archive format: {0}")]
    UnidentifiedArchive(String),

    #[error("archive error: {0}")]
    Archive(String),
}

/// Formats the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Tar,
    TarGz,
    TarBz2,
    TarXz,
    TarZst,
    Zip,
    /// A gzip file that is not a tarball.
    Gzip,
    /// A zstd file that is not a tarball.
    Zstd,
}

/// Identify by filename, falling back to content sniffing.
pub fn identify(path: &Path) -> Option<ArchiveFormat> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        return Some(ArchiveFormat::TarGz);
    }
    if name.ends_with(".tar.bz2") || name.ends_with(".tbz2") {
        return Some(ArchiveFormat::TarBz2);
    }
    if name.ends_with(".tar.xz") || name.ends_with(".txz") {
        return Some(ArchiveFormat::TarXz);
    }
    if name.ends_with(".tar.zst") || name.ends_with(".tzst") {
        return Some(ArchiveFormat::TarZst);
    }
    if name.ends_with(".tar") {
        return Some(ArchiveFormat::Tar);
    }
    if name.ends_with(".zip") {
        return Some(ArchiveFormat::Zip);
    }
    if name.ends_with(".gz") {
        return Some(ArchiveFormat::Gzip);
    }
    if name.ends_with(".zst") {
        return Some(ArchiveFormat::Zstd);
    }

    // No meaningful extension; sniff the content.
    let mut header = [0u8; 512];
    let mut file = File::open(path).ok()?;
    let read = file.read(&mut header).ok()?;
    let kind = infer::get(&header[..read])?;

    match kind.mime_type() {
        "application/zip" => Some(ArchiveFormat::Zip),
        "application/x-tar" => Some(ArchiveFormat::Tar),
        "application/gzip" => Some(ArchiveFormat::Gzip),
        "application/zstd" => Some(ArchiveFormat::Zstd),
        _ => None,
    }
}

/// Extract `path` into `dest`, returning the files laid down.
///
/// `expect_archive` is true when the asset classified as an archive; an
/// unidentifiable format is then an error instead of a direct-file copy.
/// `direct_alias` names the original asset for the direct-file record.
pub fn extract(
    path: &Path,
    dest: &Path,
    expect_archive: bool,
    direct_alias: &str,
) -> Result<Vec<ExtractedFile>, ExtractError> {
    fs::create_dir_all(dest)?;

    let format = identify(path);
    debug!("identified archive format: {format:?}");

    let Some(format) = format else {
        if expect_archive {
            warn!("unable to identify archive format");
            return Err(ExtractError::UnidentifiedArchive(
                path.file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default(),
            ));
        }
        return extract_direct(path, dest, direct_alias);
    };

    let file = File::open(path)?;
    let reader = BufReader::new(file);

    match format {
        ArchiveFormat::Tar => extract_tar(reader, dest),
        ArchiveFormat::TarGz => extract_tar(flate2::read::GzDecoder::new(reader), dest),
        ArchiveFormat::TarBz2 => extract_tar(bzip2::read::BzDecoder::new(reader), dest),
        ArchiveFormat::TarXz => extract_tar(xz2::read::XzDecoder::new(reader), dest),
        ArchiveFormat::TarZst => extract_tar(
            zstd::stream::Decoder::new(reader).map_err(ExtractError::Io)?,
            dest,
        ),
        ArchiveFormat::Zip => extract_zip(path, dest),
        ArchiveFormat::Gzip => {
            extract_single(flate2::read::GzDecoder::new(reader), path, ".gz", dest)
        }
        ArchiveFormat::Zstd => extract_single(
            zstd::stream::Decoder::new(reader).map_err(ExtractError::Io)?,
            path,
            ".zst",
            dest,
        ),
    }
}

/// A file we could not identify: copy it under its own basename and alias
/// it back to the asset.
fn extract_direct(
    path: &Path,
    dest: &Path,
    alias: &str,
) -> Result<Vec<ExtractedFile>, ExtractError> {
    trace!("processing direct file");
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    fs::copy(path, dest.join(&name))?;

    let mut record = ExtractedFile::new(name);
    record.alias = Some(alias.to_string());
    Ok(vec![record])
}

fn extract_tar<R: Read>(reader: R, dest: &Path) -> Result<Vec<ExtractedFile>, ExtractError> {
    let mut archive = tar::Archive::new(reader);
    let mut files = Vec::new();

    for entry in archive.entries()? {
        let mut entry = entry?;
        let entry_path = entry.path()?.to_path_buf();

        let Some(relative) = sanitize(&entry_path) else {
            warn!("skipping entry outside archive root: {}", entry_path.display());
            continue;
        };
        let target = dest.join(&relative);

        let entry_type = entry.header().entry_type();
        if entry_type.is_dir() {
            if !target.exists() {
                fs::create_dir_all(&target)?;
                trace!("tar > create directory {}", target.display());
            }
            continue;
        }

        if entry_type.is_symlink() || entry_type.is_hard_link() {
            // Followed as a regular copy; nothing is linked inside temp.
            let Some(link) = entry.link_name()? else {
                continue;
            };
            let resolved = dest.join(link.as_ref());
            if resolved.is_file() {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::copy(&resolved, &target)?;
                files.push(ExtractedFile::new(relative.to_string_lossy().to_string()));
            } else {
                warn!("skipping link entry without target: {}", entry_path.display());
            }
            continue;
        }

        if !entry_type.is_file() {
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut out = File::create(&target)?;
        io::copy(&mut entry, &mut out)?;

        #[cfg(unix)]
        if let Ok(mode) = entry.header().mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&target, fs::Permissions::from_mode(mode))?;
        }

        trace!("tar > create file {}", target.display());
        files.push(ExtractedFile::new(relative.to_string_lossy().to_string()));
    }

    Ok(files)
}

fn extract_zip(path: &Path, dest: &Path) -> Result<Vec<ExtractedFile>, ExtractError> {
    let file = File::open(path)?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| ExtractError::Archive(e.to_string()))?;
    let mut files = Vec::new();

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| ExtractError::Archive(e.to_string()))?;

        let Some(relative) = entry.enclosed_name().map(|p| p.to_path_buf()) else {
            warn!("skipping entry outside archive root: {}", entry.name());
            continue;
        };
        let target = dest.join(&relative);

        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut out = File::create(&target)?;
        io::copy(&mut entry, &mut out)?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&target, fs::Permissions::from_mode(mode))?;
        }

        trace!("zip > create file {}", target.display());
        files.push(ExtractedFile::new(relative.to_string_lossy().to_string()));
    }

    Ok(files)
}

/// Plain compressed file (gzip or zstd without a tar inside): decompress to
/// the basename minus the compression suffix.
fn extract_single<R: Read>(
    mut reader: R,
    path: &Path,
    suffix: &str,
    dest: &Path,
) -> Result<Vec<ExtractedFile>, ExtractError> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let name = name.strip_suffix(suffix).unwrap_or(&name).to_string();

    let mut out = File::create(dest.join(&name))?;
    io::copy(&mut reader, &mut out)?;

    Ok(vec![ExtractedFile::new(name)])
}

/// Reject absolute entries and any `..` traversal.
fn sanitize(path: &Path) -> Option<PathBuf> {
    use std::path::Component;

    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if out.as_os_str().is_empty() {
        None
    } else {
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn make_tar_gz(path: &Path, entries: &[(&str, &[u8], u32)]) {
        let file = File::create(path).unwrap();
        let encoder = GzEncoder::new(file, Compression::default());
        let mut builder = tar::Builder::new(encoder);

        for (name, content, mode) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(*mode);
            header.set_cksum();
            builder.append_data(&mut header, name, *content).unwrap();
        }

        builder.into_inner().unwrap().finish().unwrap();
    }

    #[test]
    fn test_identify_by_extension() {
        assert_eq!(identify(Path::new("a.tar.gz")), Some(ArchiveFormat::TarGz));
        assert_eq!(identify(Path::new("a.tgz")), Some(ArchiveFormat::TarGz));
        assert_eq!(identify(Path::new("a.tar.zst")), Some(ArchiveFormat::TarZst));
        assert_eq!(identify(Path::new("a.tar.xz")), Some(ArchiveFormat::TarXz));
        assert_eq!(identify(Path::new("a.tar.bz2")), Some(ArchiveFormat::TarBz2));
        assert_eq!(identify(Path::new("a.zip")), Some(ArchiveFormat::Zip));
        assert_eq!(identify(Path::new("a.gz")), Some(ArchiveFormat::Gzip));
    }

    #[test]
    fn test_identify_by_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no-extension");
        make_tar_gz(&path, &[("tool", b"content", 0o755)]);
        assert_eq!(identify(&path), Some(ArchiveFormat::Gzip));
    }

    #[test]
    fn test_extract_tar_gz() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("tool-1.0.0-linux-amd64.tar.gz");
        make_tar_gz(
            &archive,
            &[
                ("tool", b"#!/bin/sh\necho tool\n", 0o755),
                ("docs/README.md", b"# tool\n", 0o644),
            ],
        );

        let dest = dir.path().join("staging");
        let files = extract(&archive, &dest, true, "tool-1.0.0-linux-amd64.tar.gz").unwrap();

        assert_eq!(files.len(), 2);
        assert!(dest.join("tool").is_file());
        assert!(dest.join("docs/README.md").is_file());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(dest.join("tool")).unwrap().permissions().mode();
            assert_eq!(mode & 0o111, 0o111);
        }
    }

    #[test]
    fn test_extract_zip() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("tool.zip");

        let file = File::create(&archive).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::FileOptions::default().unix_permissions(0o755);
        writer.start_file("tool.exe", options).unwrap();
        writer.write_all(b"MZ fake").unwrap();
        writer.finish().unwrap();

        let dest = dir.path().join("staging");
        let files = extract(&archive, &dest, true, "tool.zip").unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "tool.exe");
        assert!(dest.join("tool.exe").is_file());
    }

    #[test]
    fn test_extract_plain_gzip() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("tool.gz");

        let file = File::create(&archive).unwrap();
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(b"raw binary").unwrap();
        encoder.finish().unwrap();

        let dest = dir.path().join("staging");
        let files = extract(&archive, &dest, false, "tool.gz").unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "tool");
        assert_eq!(fs::read(dest.join("tool")).unwrap(), b"raw binary");
    }

    #[test]
    fn test_direct_file_fallthrough() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tool-linux-amd64");
        fs::write(&path, b"\x7fELF fake binary").unwrap();

        let dest = dir.path().join("staging");
        let files = extract(&path, &dest, false, "tool-linux-amd64").unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].alias.as_deref(), Some("tool-linux-amd64"));
        assert!(dest.join("tool-linux-amd64").is_file());
    }

    #[test]
    fn test_unidentified_archive_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tool.rar");
        fs::write(&path, b"not really an archive").unwrap();

        let dest = dir.path().join("staging");
        let err = extract(&path, &dest, true, "tool.rar").unwrap_err();
        assert!(matches!(err, ExtractError::UnidentifiedArchive(_)));
    }
}
