//! Checksum file parsing and digest comparison.
//!
//! Handles both single-digest files (`tool.tar.gz.sha256`) and multi-file
//! listings (`checksums.txt`). The hash algorithm is inferred from the
//! digest length, never from the filename.

use std::io::Read;
use std::path::Path;

use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChecksumError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("file not listed in checksum file: {0}")]
    NotListed(String),

    #[error("unsupported hash length: {0}")]
    UnsupportedHashLength(usize),
}

enum Hasher {
    Md5(Md5),
    Sha1(Sha1),
    Sha256(Sha256),
    Sha512(Sha512),
}

impl Hasher {
    /// Pick the algorithm by hex digest length: 32 MD5, 40 SHA-1,
    /// 64 SHA-256, 128 SHA-512.
    fn for_digest_len(len: usize) -> Result<Self, ChecksumError> {
        match len {
            32 => Ok(Self::Md5(Md5::new())),
            40 => Ok(Self::Sha1(Sha1::new())),
            64 => Ok(Self::Sha256(Sha256::new())),
            128 => Ok(Self::Sha512(Sha512::new())),
            other => Err(ChecksumError::UnsupportedHashLength(other)),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Self::Md5(h) => h.update(data),
            Self::Sha1(h) => h.update(data),
            Self::Sha256(h) => h.update(data),
            Self::Sha512(h) => h.update(data),
        }
    }

    fn finalize(self) -> Vec<u8> {
        match self {
            Self::Md5(h) => h.finalize().to_vec(),
            Self::Sha1(h) => h.finalize().to_vec(),
            Self::Sha256(h) => h.finalize().to_vec(),
            Self::Sha512(h) => h.finalize().to_vec(),
        }
    }
}

/// Compare `file_path` against the digest listed for `expected_name` in
/// `checksum_path`. Returns whether the digests match.
pub fn compare(
    expected_name: &str,
    file_path: &Path,
    checksum_path: &Path,
) -> Result<bool, ChecksumError> {
    let content = std::fs::read_to_string(checksum_path)?;
    let expected = listed_digest(&content, expected_name)?;

    let mut hasher = Hasher::for_digest_len(expected.len())?;

    let mut file = std::fs::File::open(file_path)?;
    let mut buffer = [0u8; 65536];
    loop {
        let count = file.read(&mut buffer)?;
        if count == 0 {
            break;
        }
        hasher.update(&buffer[..count]);
    }

    let actual = hasher.finalize();
    let Ok(expected_bytes) = hex::decode(expected.to_lowercase()) else {
        return Ok(false);
    };

    Ok(constant_time_eq(&expected_bytes, &actual))
}

/// Extract the digest for `expected_name` from checksum file text.
///
/// A file with exactly one non-comment line holding a bare hex digest is a
/// single-file checksum; the digest is authoritative regardless of name.
/// Anything else is parsed as `<hex><sep><name>` rows (two spaces, one
/// space, or a tab; a leading `*` binary marker on the name is dropped).
fn listed_digest(content: &str, expected_name: &str) -> Result<String, ChecksumError> {
    let lines: Vec<&str> = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .collect();

    if lines.len() == 1 && is_hex(lines[0]) {
        return Ok(lines[0].to_string());
    }

    let base = Path::new(expected_name)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| expected_name.to_string());

    for line in lines {
        let Some(idx) = line.find([' ', '\t']) else {
            continue;
        };
        let digest = &line[..idx];
        let name = line[idx..].trim_start().trim_start_matches('*');

        if !is_hex(digest) {
            continue;
        }
        if name == base {
            return Ok(digest.to_string());
        }
    }

    Err(ChecksumError::NotListed(base))
}

fn is_hex(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_hexdigit())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b) {
        diff |= x ^ y;
    }
    diff == 0
}
