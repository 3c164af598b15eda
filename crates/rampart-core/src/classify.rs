//! Compliance classifier: `Verdict x Coverage -> Disposition`.
//!
//! Single-step and stateless. Each traversal recomputes every disposition
//! from scratch.

use crate::rules::{Level, Verdict};
use crate::suppression::{Coverage, IgnoreQuery, SuppressionIgnore, SuppressionMatcher};
use crate::tree::ResourcePath;
use serde::{Deserialize, Serialize};

/// Final, suppression-adjusted classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Compliant,
    NotApplicable,
    /// Unwaived violation.
    Violation,
    /// Waived violation.
    Suppressed,
    EvaluationError,
}

impl Disposition {
    /// Whether the host sees this entry in its reported list.
    pub fn is_reported(&self, verbose: bool) -> bool {
        match self {
            Disposition::Violation | Disposition::EvaluationError => true,
            Disposition::Suppressed | Disposition::Compliant => verbose,
            Disposition::NotApplicable => false,
        }
    }

    /// Whether this entry can fail a pass/fail gate.
    pub fn is_failure(&self) -> bool {
        matches!(self, Disposition::Violation | Disposition::EvaluationError)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Compliant => "compliant",
            Disposition::NotApplicable => "not_applicable",
            Disposition::Violation => "violation",
            Disposition::Suppressed => "suppressed",
            Disposition::EvaluationError => "evaluation_error",
        }
    }
}

impl std::fmt::Display for Disposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The pure state transition. Suppressions only ever touch `NonCompliant`.
pub fn fold(verdict: &Verdict, coverage: Coverage<'_>) -> Disposition {
    match verdict {
        Verdict::Compliant => Disposition::Compliant,
        Verdict::NotApplicable => Disposition::NotApplicable,
        Verdict::EvaluationError(_) => Disposition::EvaluationError,
        Verdict::NonCompliant if coverage.is_covered() => Disposition::Suppressed,
        Verdict::NonCompliant => Disposition::Violation,
    }
}

/// Classifier output for one `(rule, node)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub disposition: Disposition,
    /// Effective level. Evaluation errors are always `Error`.
    pub level: Level,
    /// Set for waived violations.
    pub justification: Option<String>,
    /// Set for evaluation errors.
    pub error: Option<String>,
}

/// Combines the suppression registry with the host's ignore condition.
pub struct Classifier<'a> {
    matcher: &'a SuppressionMatcher,
    ignore: &'a dyn SuppressionIgnore,
}

impl<'a> Classifier<'a> {
    pub fn new(matcher: &'a SuppressionMatcher, ignore: &'a dyn SuppressionIgnore) -> Self {
        Self { matcher, ignore }
    }

    pub fn classify(
        &self,
        rule_id: &str,
        level: Level,
        path: &ResourcePath,
        verdict: &Verdict,
    ) -> Classification {
        let coverage = match verdict {
            Verdict::NonCompliant => self.effective_coverage(rule_id, level, path),
            _ => Coverage::NotCovered,
        };
        let disposition = fold(verdict, coverage);

        match disposition {
            Disposition::EvaluationError => Classification {
                disposition,
                level: Level::Error,
                justification: None,
                error: match verdict {
                    Verdict::EvaluationError(reason) => Some(reason.clone()),
                    _ => None,
                },
            },
            Disposition::Suppressed => {
                let justification = coverage.justification().unwrap_or_default();
                tracing::info!(
                    rule_id = %rule_id,
                    path = %path,
                    justification = %justification,
                    "violation suppressed"
                );
                Classification {
                    disposition,
                    level,
                    justification: Some(justification.to_string()),
                    error: None,
                }
            }
            _ => Classification {
                disposition,
                level,
                justification: None,
                error: None,
            },
        }
    }

    fn effective_coverage(&self, rule_id: &str, level: Level, path: &ResourcePath) -> Coverage<'a> {
        let coverage = self.matcher.coverage(rule_id, path);
        let Some(justification) = coverage.justification() else {
            return coverage;
        };
        let query = IgnoreQuery {
            rule_id,
            level,
            path,
            justification,
        };
        match self.ignore.ignore(&query) {
            Some(reason) => {
                tracing::warn!(
                    rule_id = %rule_id,
                    path = %path,
                    reason = %reason,
                    "suppression ignored by host condition"
                );
                Coverage::NotCovered
            }
            None => coverage,
        }
    }
}
