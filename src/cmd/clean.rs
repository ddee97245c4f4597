//! `dist clean`

use anyhow::Result;
use tracing::info;

use crate::config::Config;

/// Drop the download and metadata caches; installed binaries stay.
pub fn execute(config: &Config) -> Result<()> {
    for dir in [config.downloads_path(), config.metadata_path()] {
        if dir.exists() {
            std::fs::remove_dir_all(&dir)?;
            info!("removed {}", dir.display());
        }
        std::fs::create_dir_all(&dir)?;
    }

    Ok(())
}
