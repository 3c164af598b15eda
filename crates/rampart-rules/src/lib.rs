//! Built-in rule packs.
//!
//! Each pack is a list of [`Rule`]s with stable, pack-prefixed ids. Hosts get
//! a ready [`PackBuilder`] from [`builtin_pack`] and attach their own
//! suppressions and options before building.

pub mod baseline;
pub mod healthcare;

use rampart_core::{PackBuilder, Rule};

pub const BASELINE: &str = "baseline";
pub const HEALTHCARE: &str = "healthcare";

/// Names accepted by [`builtin_pack`].
pub const BUILTIN_PACKS: &[&str] = &[BASELINE, HEALTHCARE];

/// Rules of a built-in pack, or `None` for an unknown name.
pub fn builtin_rules(name: &str) -> Option<Vec<Rule>> {
    match name {
        BASELINE => Some(baseline::rules()),
        HEALTHCARE => Some(healthcare::rules()),
        _ => None,
    }
}

/// Builder for a built-in pack, preloaded with its rules.
pub fn builtin_pack(name: &str) -> Option<PackBuilder> {
    builtin_rules(name).map(|rules| PackBuilder::new(name).rules(rules))
}

/// Closest built-in name to `name`, for "did you mean" hints.
pub fn suggest_pack(name: &str) -> Option<&'static str> {
    BUILTIN_PACKS
        .iter()
        .map(|candidate| (levenshtein(name, candidate), *candidate))
        .filter(|(distance, _)| *distance <= 3)
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, candidate)| candidate)
}

fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut current = vec![i + 1; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            current[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(current[j] + 1);
        }
        prev = current;
    }
    prev[b.len()]
}
