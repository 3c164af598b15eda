//! Diagnostic emitter.
//!
//! Dispositions are accumulated into a [`DiagnosticSet`] keyed by
//! `(rule id, resource path)`. Recording the same key twice replaces the
//! earlier entry, and iteration is always in key order, so identical inputs
//! serialize to identical bytes.

use crate::classify::{Classification, Disposition};
use crate::rules::{Level, Rule};
use crate::tree::ResourcePath;
use serde::{Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Externally visible result for one `(rule, resource)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub rule_id: String,
    pub path: ResourcePath,
    pub disposition: Disposition,
    pub level: Level,
    /// Always starts with `"<rule_id>:"`.
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub justification: Option<String>,
    pub fingerprint: String,
}

impl Diagnostic {
    /// Build a diagnostic from a classification. `NotApplicable` produces
    /// nothing.
    pub fn from_classification(
        rule: &Rule,
        path: &ResourcePath,
        classification: Classification,
        verbose: bool,
    ) -> Option<Self> {
        let message = match classification.disposition {
            Disposition::NotApplicable => return None,
            Disposition::Compliant => format!("{}: compliant", rule.id()),
            Disposition::EvaluationError => format!(
                "{}: evaluation error: {}",
                rule.id(),
                classification.error.as_deref().unwrap_or("unknown error")
            ),
            _ => {
                let mut message = format!("{}: {}", rule.id(), rule.info());
                if verbose && !rule.explanation().is_empty() {
                    message.push(' ');
                    message.push_str(rule.explanation());
                }
                message
            }
        };

        Some(Self {
            rule_id: rule.id().to_string(),
            path: path.clone(),
            disposition: classification.disposition,
            level: classification.level,
            message,
            justification: classification.justification,
            fingerprint: fingerprint(rule.id(), path),
        })
    }

    pub fn key(&self) -> DiagnosticKey {
        (self.rule_id.clone(), self.path.clone())
    }

    pub fn is_waived(&self) -> bool {
        self.disposition == Disposition::Suppressed
    }

    /// True when this entry fails a gate set at `threshold`.
    pub fn fails_gate(&self, threshold: Level) -> bool {
        self.disposition.is_failure() && self.level >= threshold
    }
}

/// Stable fingerprint: `sha256(rule_id:path)`.
pub fn fingerprint(rule_id: &str, path: &ResourcePath) -> String {
    format!(
        "sha256:{}",
        hex::encode(Sha256::digest(format!("{}:{}", rule_id, path).as_bytes()))
    )
}

pub type DiagnosticKey = (String, ResourcePath);

/// Counts over one diagnostic set. Level buckets count unwaived entries only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiagnosticSummary {
    pub total: usize,
    pub errors: usize,
    pub warnings: usize,
    pub infos: usize,
    pub suppressed: usize,
    pub compliant: usize,
    pub evaluation_errors: usize,
}

/// Keyed, ordered accumulator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagnosticSet {
    entries: BTreeMap<DiagnosticKey, Diagnostic>,
}

impl DiagnosticSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert, replacing any entry with the same key. Returns the replaced entry.
    pub fn record(&mut self, diagnostic: Diagnostic) -> Option<Diagnostic> {
        self.entries.insert(diagnostic.key(), diagnostic)
    }

    pub fn get(&self, rule_id: &str, path: &ResourcePath) -> Option<&Diagnostic> {
        self.entries.get(&(rule_id.to_string(), path.clone()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Every recorded entry, including compliant and waived ones.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> + '_ {
        self.entries.values()
    }

    /// Entries the host should surface.
    pub fn reported(&self, verbose: bool) -> Vec<&Diagnostic> {
        self.iter()
            .filter(|d| d.disposition.is_reported(verbose))
            .collect()
    }

    /// Unwaived failures at exactly `level`.
    pub fn failures_at(&self, level: Level) -> Vec<&Diagnostic> {
        self.iter()
            .filter(|d| d.disposition.is_failure() && d.level == level)
            .collect()
    }

    pub fn summary(&self) -> DiagnosticSummary {
        let mut summary = DiagnosticSummary::default();
        for d in self.iter() {
            summary.total += 1;
            match d.disposition {
                Disposition::Compliant => summary.compliant += 1,
                Disposition::Suppressed => summary.suppressed += 1,
                Disposition::NotApplicable => {}
                Disposition::Violation | Disposition::EvaluationError => {
                    if d.disposition == Disposition::EvaluationError {
                        summary.evaluation_errors += 1;
                    }
                    match d.level {
                        Level::Error => summary.errors += 1,
                        Level::Warn => summary.warnings += 1,
                        Level::Info => summary.infos += 1,
                    }
                }
            }
        }
        summary
    }

    /// False iff some unwaived violation or evaluation error is at or above
    /// `threshold`.
    pub fn passes(&self, threshold: Level) -> bool {
        !self.iter().any(|d| d.fails_gate(threshold))
    }
}

impl Serialize for DiagnosticSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.entries.values())
    }
}

impl<'a> IntoIterator for &'a DiagnosticSet {
    type Item = &'a Diagnostic;
    type IntoIter = std::collections::btree_map::Values<'a, DiagnosticKey, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.values()
    }
}
