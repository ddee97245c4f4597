//! `dist proof [--latest-only]`

use anyhow::Result;

use crate::config::Config;
use crate::core::distfile;
use crate::inventory::Inventory;

pub fn execute(config: &Config, latest_only: bool) -> Result<()> {
    config.ensure_dirs()?;

    let inv = Inventory::load(&config.bin_path, &config.opt_path);
    print!("{}", distfile::build(&inv, latest_only));

    Ok(())
}
