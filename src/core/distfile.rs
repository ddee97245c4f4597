//! Distfile parsing and emission.
//!
//! A Distfile is a line-oriented list of directives, one per non-blank,
//! non-comment line:
//!
//! ```text
//! # comment
//! install ekristen/aws-nuke@3.29.3
//! install github/owner/repo@latest
//! ```

use std::collections::HashSet;
use std::path::Path;

use crate::inventory::Inventory;

/// One Distfile line. Directives with unknown actions are kept so callers
/// can report them; only `install` is executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub action: String,
    pub args: Vec<String>,
}

/// Parse Distfile text. Blank lines and `#` comments are skipped.
pub fn parse(content: &str) -> Vec<Directive> {
    let mut directives = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut fields = line.split_whitespace();
        let Some(action) = fields.next() else {
            continue;
        };

        directives.push(Directive {
            action: action.to_string(),
            args: fields.map(|s| s.to_string()).collect(),
        });
    }

    directives
}

/// Parse a Distfile from disk.
pub fn parse_file(path: &Path) -> std::io::Result<Vec<Directive>> {
    Ok(parse(&std::fs::read_to_string(path)?))
}

/// Emit a Distfile from the inventory: one `install` line per distinct
/// `(source, owner, repo, version)`. With `latest_only`, only versions the
/// default symlink points at are included.
pub fn build(inv: &Inventory, latest_only: bool) -> String {
    let mut out = String::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();

    for key in inv.sorted_keys() {
        let Some(bin) = inv.get_bin(key) else {
            continue;
        };

        let mut versions: Vec<&str> = bin
            .versions
            .iter()
            .filter(|v| !latest_only || v.latest)
            .map(|v| v.version.as_str())
            .collect();
        versions.sort();

        for version in versions {
            if seen.insert((key.to_string(), version.to_string())) {
                out.push_str(&format!("install {key}@{version}\n"));
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_skips_comments_and_blanks() {
        let content = "\n# setup\ninstall ekristen/aws-nuke@3.29.3\n\ninstall github/owner/repo@latest\n";
        let directives = parse(content);

        assert_eq!(directives.len(), 2);
        assert_eq!(directives[0].action, "install");
        assert_eq!(directives[0].args, vec!["ekristen/aws-nuke@3.29.3"]);
        assert_eq!(directives[1].args, vec!["github/owner/repo@latest"]);
    }

    #[test]
    fn test_parse_keeps_unknown_directives() {
        let directives = parse("frobnicate a b c\ninstall owner/repo\n");
        assert_eq!(directives[0].action, "frobnicate");
        assert_eq!(directives[0].args, vec!["a", "b", "c"]);
        assert_eq!(directives[1].action, "install");
    }

    #[test]
    fn test_parse_emit_idempotent() {
        let text = "install github/a/a@1.0.0\ninstall github/b/b@2.0.0\n";
        let directives = parse(text);

        let emitted: String = directives
            .iter()
            .map(|d| format!("{} {}\n", d.action, d.args.join(" ")))
            .collect();

        assert_eq!(emitted, text);
        assert_eq!(parse(&emitted), directives);
    }
}
