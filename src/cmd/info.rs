//! `dist info`

use anyhow::Result;
use tracing::{info, warn};

use crate::config::Config;
use crate::core::platform::{host_arch, host_os};

pub fn execute(config: &Config) -> Result<()> {
    info!("version information");
    info!("  {}/{}", crate::NAME, env!("CARGO_PKG_VERSION"));
    info!("system information");
    info!("     os: {}", host_os());
    info!("   arch: {}", host_arch());
    info!("configuration");
    info!("   home: {}", config.path.display());
    info!("    bin: {}", config.bin_path.display());
    info!("    opt: {}", config.opt_path.display());
    info!("  cache: {}", config.cache_path.display());

    warn!("To cleanup all of {}, remove the following directories:", crate::NAME);
    warn!("  - {}", config.cache_path.display());
    warn!("  - {}", config.bin_path.display());
    warn!("  - {}", config.opt_path.display());

    let path = std::env::var("PATH").unwrap_or_default();
    let bin = config.bin_path.to_string_lossy().to_string();
    if !std::env::split_paths(&path).any(|p| p.to_string_lossy() == bin) {
        warn!("Problem: {} will not work correctly", crate::NAME);
        warn!("  - {} is not in your PATH", bin);
    }

    Ok(())
}
