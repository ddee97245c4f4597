//! Keyword scoring for release asset names.
//!
//! Every candidate gets a score from two sources: weighted keyword
//! containment (OS, arch, extension, caller terms) and an accuracy pass
//! over the hyphen/underscore tokens of the filename. Callers pick the
//! top-scored candidate at or above the acceptance threshold.

use std::collections::{HashMap, HashSet};

use tracing::trace;

use crate::core::asset::{base_name, extensions_equivalent};

/// Score at which a candidate becomes eligible for selection.
pub const ACCEPT_THRESHOLD: i32 = 40;

/// Score given to an exact caller-requested name.
pub const EXACT_MATCH_SCORE: i32 = 200;

/// Token lists driving one scoring pass. Always passed by value; there are
/// no module-level defaults.
#[derive(Debug, Default, Clone)]
pub struct ScoreOptions {
    pub os: Vec<String>,
    pub arch: Vec<String>,
    pub extensions: Vec<String>,
    pub names: Vec<String>,
    pub versions: Vec<String>,
    pub terms: Vec<String>,
    pub weighted_terms: Vec<(String, i32)>,
    pub invalid_os: Vec<String>,
    pub invalid_arch: Vec<String>,
    pub invalid_extensions: Vec<String>,
    pub invalid_terms: Vec<String>,
}

impl ScoreOptions {
    /// Every known token: OS, arch, terms, names, versions, and each
    /// version with a `v` prefix.
    fn all_strings(&self) -> Vec<String> {
        let mut all = Vec::new();
        all.extend(self.os.iter().cloned());
        all.extend(self.arch.iter().cloned());
        all.extend(self.terms.iter().cloned());
        all.extend(self.names.iter().cloned());
        all.extend(self.versions.iter().cloned());
        all.extend(self.versions.iter().map(|v| format!("v{v}")));
        all
    }
}

/// A candidate name with its computed score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scored {
    pub name: String,
    pub score: i32,
}

fn add_rule(rules: &mut Vec<(String, i32)>, key: String, weight: i32) {
    match rules.iter_mut().find(|(k, _)| *k == key) {
        Some(entry) => entry.1 = weight,
        None => rules.push((key, weight)),
    }
}

/// Score `candidates` against `opts`, sorted best first (ties broken by
/// name). An exact match against `opts.names` short-circuits the whole
/// pass with [`EXACT_MATCH_SCORE`].
pub fn score(candidates: &[String], opts: &ScoreOptions) -> Vec<Scored> {
    let mut scores: HashMap<String, i32> = HashMap::new();

    for name in candidates {
        if opts.names.iter().any(|n| n == name) {
            return vec![Scored {
                name: name.clone(),
                score: EXACT_MATCH_SCORE,
            }];
        }

        let mut rules: Vec<(String, i32)> = Vec::new();

        // Trailer binaries from release tooling and keyless signature
        // companions are never the right pick.
        add_rule(&mut rules, "update".to_string(), -100);
        add_rule(&mut rules, "-keyless.sig".to_string(), -10);

        for os in &opts.os {
            add_rule(&mut rules, os.to_lowercase(), 40);
        }
        for arch in &opts.arch {
            add_rule(&mut rules, arch.to_lowercase(), 30);
        }
        for ext in &opts.extensions {
            add_rule(&mut rules, ext.to_lowercase(), 20);
        }
        for term in &opts.terms {
            add_rule(&mut rules, term.to_lowercase(), 10);
        }
        for os in &opts.invalid_os {
            add_rule(&mut rules, os.to_lowercase(), -40);
        }
        for arch in &opts.invalid_arch {
            add_rule(&mut rules, arch.to_lowercase(), -30);
        }
        for ext in &opts.invalid_extensions {
            add_rule(&mut rules, ext.to_lowercase(), -20);
        }
        for (term, weight) in &opts.weighted_terms {
            add_rule(&mut rules, term.to_lowercase(), *weight);
        }

        let lower = name.to_lowercase();
        let mut total = 0;

        for (key, weight) in &rules {
            if *weight == 20 {
                // Extension rules match MIME-equivalently, not by substring.
                let ext = lower.rsplit_once('.').map(|(_, e)| e).unwrap_or("");
                if !ext.is_empty()
                    && opts
                        .extensions
                        .iter()
                        .any(|fe| extensions_equivalent(ext, fe))
                {
                    total += weight;
                }
            } else if lower.contains(key.as_str()) {
                total += weight;
            }
        }

        total += accuracy_score(name, opts.all_strings());

        trace!("scoring {name} with score {total}");
        scores.insert(name.clone(), total);
    }

    sort_by_score(scores)
}

/// Token-level accuracy: +10 for a token equal to the whole stripped
/// filename, +2 per known token, -5 per unknown one. Multi-segment known
/// terms are shielded with placeholders so the split does not cut them up.
fn accuracy_score(filename: &str, mut known_terms: Vec<String>) -> i32 {
    let filename = base_name(filename);

    known_terms.sort_by(|a, b| b.len().cmp(&a.len()));

    let mut replacements: HashMap<String, &str> = HashMap::new();
    let mut modified = filename.to_string();
    for (i, term) in known_terms.iter().enumerate() {
        if term.contains('-') || term.contains('_') {
            let placeholder = format!("PLACEHOLDER{i}");
            modified = modified.replace(term.as_str(), &placeholder);
            replacements.insert(placeholder, term);
        }
    }

    let tokens: Vec<&str> = modified
        .split(['-', '_'])
        .filter(|t| !t.is_empty())
        .map(|t| replacements.get(t).copied().unwrap_or(t))
        .collect();

    let known: HashSet<&str> = known_terms.iter().map(|s| s.as_str()).collect();

    let mut score = 0;
    for token in tokens {
        if filename == token {
            score += 10;
        } else if known.contains(token) {
            score += 2;
        } else {
            score -= 5;
        }
    }

    score
}

fn sort_by_score(scores: HashMap<String, i32>) -> Vec<Scored> {
    let mut sorted: Vec<Scored> = scores
        .into_iter()
        .map(|(name, score)| Scored { name, score })
        .collect();

    sorted.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.name.cmp(&b.name)));

    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::platform::{Platform, AMD64, LINUX};

    fn binary_options(platform: &Platform, terms: &[&str], version: &str) -> ScoreOptions {
        ScoreOptions {
            os: platform.os_names(),
            arch: platform.architectures().to_vec(),
            extensions: platform.extensions().to_vec(),
            terms: terms.iter().map(|s| s.to_string()).collect(),
            weighted_terms: vec![("source".to_string(), -20)],
            versions: vec![version.to_string()],
            invalid_os: platform.invalid_os(),
            invalid_arch: platform.invalid_architectures(),
            invalid_extensions: vec![".zst".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_exact_name_short_circuit() {
        let candidates = vec![
            "foo_v1.2.3_linux_amd64.tar.gz".to_string(),
            "foo_v1.2.3_darwin_arm64.tar.gz".to_string(),
        ];
        let opts = ScoreOptions {
            names: vec!["foo_v1.2.3_linux_amd64.tar.gz".to_string()],
            ..Default::default()
        };

        let scored = score(&candidates, &opts);
        assert_eq!(scored.len(), 1);
        assert_eq!(scored[0].name, "foo_v1.2.3_linux_amd64.tar.gz");
        assert_eq!(scored[0].score, EXACT_MATCH_SCORE);
    }

    #[test]
    fn test_linux_amd64_selection() {
        let candidates = vec![
            "tool-1.0.0-linux-amd64.tar.gz".to_string(),
            "tool-1.0.0-darwin-arm64.tar.gz".to_string(),
            "tool-1.0.0-windows-amd64.zip".to_string(),
            "tool-1.0.0.src.tar.gz".to_string(),
        ];
        let platform = Platform::new(LINUX, AMD64);
        let scored = score(&candidates, &binary_options(&platform, &["tool"], "1.0.0"));

        assert_eq!(scored[0].name, "tool-1.0.0-linux-amd64.tar.gz");
        assert!(scored[0].score >= ACCEPT_THRESHOLD);
        // The other platforms and the source tarball all fall under the bar.
        for s in &scored[1..] {
            assert!(s.score < ACCEPT_THRESHOLD, "{} scored {}", s.name, s.score);
        }
    }

    #[test]
    fn test_sorted_descending_ties_by_name() {
        let candidates = vec![
            "b-plain".to_string(),
            "a-plain".to_string(),
            "c-plain".to_string(),
        ];
        let scored = score(&candidates, &ScoreOptions::default());

        assert_eq!(scored.len(), 3);
        for pair in scored.windows(2) {
            assert!(
                pair[0].score > pair[1].score
                    || (pair[0].score == pair[1].score && pair[0].name < pair[1].name)
            );
        }
    }

    #[test]
    fn test_update_binary_penalized() {
        let candidates = vec![
            "tool-linux-amd64".to_string(),
            "tool-update-linux-amd64".to_string(),
        ];
        let platform = Platform::new(LINUX, AMD64);
        let scored = score(&candidates, &binary_options(&platform, &["tool"], "1.0.0"));

        assert_eq!(scored[0].name, "tool-linux-amd64");
        let update = scored.iter().find(|s| s.name.contains("update")).unwrap();
        assert!(update.score < 0);
    }

    #[test]
    fn test_checksum_weighting_prefers_checksums_file() {
        let candidates = vec![
            "checksums.txt".to_string(),
            "tool-1.0.0-linux-amd64.tar.gz.sbom".to_string(),
        ];
        let opts = ScoreOptions {
            names: vec!["tool-1.0.0-linux-amd64.tar.gz".to_string()],
            extensions: vec![
                "sha256".to_string(),
                "md5".to_string(),
                "sha1".to_string(),
                "txt".to_string(),
            ],
            weighted_terms: vec![("checksums".to_string(), 100)],
            ..Default::default()
        };

        let scored = score(&candidates, &opts);
        assert_eq!(scored[0].name, "checksums.txt");
        assert!(scored[0].score >= ACCEPT_THRESHOLD);
    }
}
