//! Domain-specific errors for the install pipeline

use thiserror::Error;

use crate::io::download::DownloadError;
use crate::io::extract::ExtractError;
use crate::registry::SourceError;
use crate::verify::checksum::ChecksumError;

#[derive(Error, Debug)]
pub enum InstallError {
    #[error("{0}")]
    Source(#[from] SourceError),

    #[error("no matching asset found, score too low (closest: {closest}, threshold: 40) -- override with --no-score-check")]
    NoMatchingAsset { closest: String },

    #[error("the requested binary was not found in the release")]
    NoExecutableInRelease,

    #[error("checksum verification failed (no checksum)")]
    ChecksumMissing,

    #[error("checksum verification failed")]
    ChecksumMismatch,

    #[error("checksum error: {0}")]
    Checksum(#[from] ChecksumError),

    #[error("signature verification failed (no signature)")]
    SignatureMissing,

    #[error("signature verification failed: {0}")]
    SignatureInvalid(String),

    #[error("download failed: {0}")]
    Download(#[from] DownloadError),

    #[error("{0}")]
    Extract(#[from] ExtractError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}
