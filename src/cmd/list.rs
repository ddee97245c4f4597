//! `dist list`

use anyhow::Result;

use crate::config::Config;
use crate::inventory::Inventory;
use crate::ui::Table;

pub fn execute(config: &Config) -> Result<()> {
    let inv = Inventory::load(&config.bin_path, &config.opt_path);

    let mut table = Table::new(&["Name", "Versions"]);

    for key in inv.sorted_keys() {
        let Some(bin) = inv.get_bin(key) else {
            continue;
        };

        let mut versions: Vec<&str> = bin.versions.iter().map(|v| v.version.as_str()).collect();
        versions.sort();
        versions.reverse();

        let extra = if versions.len() > 3 {
            format!(" (+{})", versions.len() - 3)
        } else {
            String::new()
        };
        versions.truncate(3);

        table.row(vec![
            key.to_string(),
            format!("{}{extra}", versions.join(", ")),
        ]);
    }

    if table.is_empty() {
        println!("no binaries installed");
        return Ok(());
    }

    table.print();
    Ok(())
}
