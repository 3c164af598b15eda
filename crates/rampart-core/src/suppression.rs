//! Suppressions: operator-authored, justified waivers of violations.
//!
//! # Matching
//!
//! | Tier | Target | Rule selector |
//! |------|--------|---------------|
//! | 1 | exact path | exact id |
//! | 2 | exact path | `*` |
//! | 3 | strict ancestor, `applies_to_children` | exact id or `*` |
//! | 4 | `*` (pack-wide) | exact id or `*` |
//!
//! The lowest tier wins; within a tier the first registered record wins.
//! Ancestry is decided segment by segment on [`ResourcePath`], never by
//! string prefix.
//!
//! A record whose justification is missing or too short never matches.

use crate::rules::Level;
use crate::tree::ResourcePath;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Selector meaning "every rule" or "every resource".
pub const WILDCARD: &str = "*";

/// Which resources a suppression targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSelector {
    Path(ResourcePath),
    /// Pack-wide.
    Everywhere,
}

impl TargetSelector {
    pub fn parse(raw: &str) -> Self {
        if raw.trim() == WILDCARD {
            TargetSelector::Everywhere
        } else {
            TargetSelector::Path(ResourcePath::parse(raw.trim()))
        }
    }
}

impl std::fmt::Display for TargetSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetSelector::Path(path) => write!(f, "{}", path),
            TargetSelector::Everywhere => f.write_str(WILDCARD),
        }
    }
}

/// Which rules a suppression waives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleSelector {
    Exact(String),
    /// Every rule of the pack.
    AllRules,
}

impl RuleSelector {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw == WILDCARD {
            RuleSelector::AllRules
        } else {
            RuleSelector::Exact(raw.to_string())
        }
    }

    fn matches(&self, rule_id: &str) -> bool {
        match self {
            RuleSelector::Exact(id) => id == rule_id,
            RuleSelector::AllRules => true,
        }
    }
}

/// Suppression record as supplied by the host or the YAML configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Suppression {
    /// Resource path, or `*` for the whole pack.
    pub target: String,

    /// Rule ids, or `["*"]` for every rule in the pack.
    pub rules: Vec<String>,

    /// Mandatory rationale.
    #[serde(default)]
    pub justification: Option<String>,

    /// Also cover every descendant of `target`.
    #[serde(default)]
    pub applies_to_children: bool,
}

impl Suppression {
    pub fn new(
        target: impl Into<String>,
        rule: impl Into<String>,
        justification: impl Into<String>,
    ) -> Self {
        Self {
            target: target.into(),
            rules: vec![rule.into()],
            justification: Some(justification.into()),
            applies_to_children: false,
        }
    }

    /// Waive every rule of the pack on `target`.
    pub fn all_rules(target: impl Into<String>, justification: impl Into<String>) -> Self {
        Self::new(target, WILDCARD, justification)
    }

    pub fn with_rule(mut self, rule: impl Into<String>) -> Self {
        self.rules.push(rule.into());
        self
    }

    pub fn applying_to_children(mut self) -> Self {
        self.applies_to_children = true;
        self
    }

    /// Check the record. `min_justification_len` is clamped to at least 1.
    pub fn validate(&self, min_justification_len: usize) -> Result<(), SuppressionError> {
        if self.target.trim().is_empty() {
            return Err(SuppressionError::EmptyTarget);
        }
        if let TargetSelector::Path(path) = TargetSelector::parse(&self.target) {
            if path.is_empty() {
                return Err(SuppressionError::EmptyTargetPath {
                    target: self.target.clone(),
                });
            }
        }
        if self.rules.is_empty() || self.rules.iter().any(|r| r.trim().is_empty()) {
            return Err(SuppressionError::EmptyRuleSelector {
                target: self.target.clone(),
            });
        }
        let min = min_justification_len.max(1);
        let len = self
            .justification
            .as_deref()
            .map(|j| j.trim().chars().count())
            .unwrap_or(0);
        if len == 0 {
            return Err(SuppressionError::MissingJustification {
                target: self.target.clone(),
                rules: self.rules.join(", "),
            });
        }
        if len < min {
            return Err(SuppressionError::JustificationTooShort {
                target: self.target.clone(),
                rules: self.rules.join(", "),
                min,
                actual: len,
            });
        }
        Ok(())
    }
}

/// Invalid suppression record.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SuppressionError {
    #[error("suppression has an empty target")]
    EmptyTarget,

    /// Only separators, e.g. `"/"`. Use `*` for a pack-wide waiver.
    #[error("suppression target '{target}' names no resource (use '*' for pack-wide)")]
    EmptyTargetPath { target: String },

    #[error("suppression on '{target}' has an empty rule selector")]
    EmptyRuleSelector { target: String },

    #[error("suppression of [{rules}] on '{target}' has no justification")]
    MissingJustification { target: String, rules: String },

    #[error(
        "suppression of [{rules}] on '{target}' has a justification of {actual} characters (minimum: {min})"
    )]
    JustificationTooShort {
        target: String,
        rules: String,
        min: usize,
        actual: usize,
    },
}

#[derive(Debug, Clone)]
struct ActiveSuppression {
    target: TargetSelector,
    rule: RuleSelector,
    justification: String,
    applies_to_children: bool,
}

impl ActiveSuppression {
    fn tier(&self, rule_id: &str, path: &ResourcePath) -> Option<u8> {
        if !self.rule.matches(rule_id) {
            return None;
        }
        match &self.target {
            TargetSelector::Path(target) if target == path => match self.rule {
                RuleSelector::Exact(_) => Some(1),
                RuleSelector::AllRules => Some(2),
            },
            TargetSelector::Path(target)
                if self.applies_to_children && target.is_strict_ancestor_of(path) =>
            {
                Some(3)
            }
            TargetSelector::Path(_) => None,
            TargetSelector::Everywhere => Some(4),
        }
    }
}

/// Outcome of a suppression lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coverage<'a> {
    Covered {
        justification: &'a str,
        target: &'a TargetSelector,
    },
    NotCovered,
}

impl<'a> Coverage<'a> {
    pub fn is_covered(&self) -> bool {
        matches!(self, Coverage::Covered { .. })
    }

    pub fn justification(&self) -> Option<&'a str> {
        match self {
            Coverage::Covered { justification, .. } => Some(justification),
            Coverage::NotCovered => None,
        }
    }
}

/// Read-only registry of valid suppressions.
#[derive(Debug, Clone, Default)]
pub struct SuppressionMatcher {
    entries: Vec<ActiveSuppression>,
}

impl SuppressionMatcher {
    /// Validate and index `records`. Invalid records are left out of the
    /// matcher and returned alongside it; the caller decides whether that is
    /// fatal.
    pub fn compile(
        records: &[Suppression],
        min_justification_len: usize,
    ) -> (Self, Vec<SuppressionError>) {
        let mut entries = Vec::new();
        let mut rejected = Vec::new();

        for record in records {
            if let Err(e) = record.validate(min_justification_len) {
                rejected.push(e);
                continue;
            }
            let justification = record
                .justification
                .as_deref()
                .unwrap_or_default()
                .trim()
                .to_string();
            let target = TargetSelector::parse(&record.target);
            for rule in &record.rules {
                entries.push(ActiveSuppression {
                    target: target.clone(),
                    rule: RuleSelector::parse(rule),
                    justification: justification.clone(),
                    applies_to_children: record.applies_to_children,
                });
            }
        }

        (Self { entries }, rejected)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find the covering suppression for `(rule_id, path)`, if any.
    pub fn coverage(&self, rule_id: &str, path: &ResourcePath) -> Coverage<'_> {
        let mut best: Option<(u8, &ActiveSuppression)> = None;
        for entry in &self.entries {
            if let Some(tier) = entry.tier(rule_id, path) {
                if best.map_or(true, |(t, _)| tier < t) {
                    best = Some((tier, entry));
                    if tier == 1 {
                        break;
                    }
                }
            }
        }
        match best {
            Some((_, entry)) => Coverage::Covered {
                justification: &entry.justification,
                target: &entry.target,
            },
            None => Coverage::NotCovered,
        }
    }
}

/// What a [`SuppressionIgnore`] condition is asked about.
#[derive(Debug, Clone, Copy)]
pub struct IgnoreQuery<'a> {
    pub rule_id: &'a str,
    pub level: Level,
    pub path: &'a ResourcePath,
    pub justification: &'a str,
}

/// Host veto over suppressions. Returning a reason makes the suppression
/// behave as if it did not cover the violation.
pub trait SuppressionIgnore: Send + Sync {
    fn ignore(&self, query: &IgnoreQuery<'_>) -> Option<String>;
}

/// Honor every valid suppression.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverIgnore;

impl SuppressionIgnore for NeverIgnore {
    fn ignore(&self, _query: &IgnoreQuery<'_>) -> Option<String> {
        None
    }
}

/// Error-level violations cannot be waived.
#[derive(Debug, Clone, Copy, Default)]
pub struct IgnoreErrors;

impl SuppressionIgnore for IgnoreErrors {
    fn ignore(&self, query: &IgnoreQuery<'_>) -> Option<String> {
        (query.level == Level::Error)
            .then(|| format!("{} is error-level and cannot be suppressed", query.rule_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(records: &[Suppression]) -> SuppressionMatcher {
        let (m, rejected) = SuppressionMatcher::compile(records, 1);
        assert!(rejected.is_empty(), "unexpected rejects: {:?}", rejected);
        m
    }

    fn path(raw: &str) -> ResourcePath {
        ResourcePath::parse(raw)
    }

    #[test]
    fn test_exact_match() {
        let m = matcher(&[Suppression::new("App/rBucket", "S1", "dev sandbox")]);
        assert_eq!(
            m.coverage("S1", &path("App/rBucket")).justification(),
            Some("dev sandbox")
        );
        assert!(!m.coverage("S2", &path("App/rBucket")).is_covered());
        assert!(!m.coverage("S1", &path("App/rOther")).is_covered());
    }

    #[test]
    fn test_prefix_does_not_cross_segment_boundary() {
        let m = matcher(&[Suppression::all_rules("rVpc", "shared vpc").applying_to_children()]);
        assert!(!m.coverage("S1", &path("rVpcExtra")).is_covered());
        assert!(!m.coverage("S1", &path("rVpcExtra/rSubnet")).is_covered());
        assert!(m.coverage("S1", &path("rVpc/rSubnet")).is_covered());
        assert!(m.coverage("S1", &path("rVpc")).is_covered());
    }

    #[test]
    fn test_children_require_flag() {
        let m = matcher(&[Suppression::new("rVpc", "S1", "shared vpc")]);
        assert!(m.coverage("S1", &path("rVpc")).is_covered());
        assert!(!m.coverage("S1", &path("rVpc/rSubnet")).is_covered());
    }

    #[test]
    fn test_tier_order_beats_registration_order() {
        let m = matcher(&[
            Suppression::all_rules("*", "pack-wide"),
            Suppression::all_rules("App", "ancestor").applying_to_children(),
            Suppression::all_rules("App/b", "exact wildcard"),
            Suppression::new("App/b", "S1", "exact rule"),
        ]);
        let p = path("App/b");
        assert_eq!(m.coverage("S1", &p).justification(), Some("exact rule"));
        assert_eq!(m.coverage("S2", &p).justification(), Some("exact wildcard"));
        assert_eq!(m.coverage("S2", &path("App/c")).justification(), Some("ancestor"));
        assert_eq!(m.coverage("S2", &path("Other/c")).justification(), Some("pack-wide"));
    }

    #[test]
    fn test_first_registered_wins_within_tier() {
        let m = matcher(&[
            Suppression::new("App", "S1", "first").applying_to_children(),
            Suppression::all_rules("App/vpc", "second").applying_to_children(),
        ]);
        assert_eq!(
            m.coverage("S1", &path("App/vpc/subnet")).justification(),
            Some("first")
        );
    }

    #[test]
    fn test_missing_justification_never_matches() {
        let mut record = Suppression::new("App/b", "S1", "");
        let (m, rejected) = SuppressionMatcher::compile(std::slice::from_ref(&record), 1);
        assert!(m.is_empty());
        assert!(matches!(rejected[0], SuppressionError::MissingJustification { .. }));

        record.justification = None;
        let (m, rejected) = SuppressionMatcher::compile(&[record], 1);
        assert!(!m.coverage("S1", &path("App/b")).is_covered());
        assert_eq!(rejected.len(), 1);
    }

    #[test]
    fn test_separator_only_target_rejected() {
        for target in ["/", "//", " / "] {
            let record = Suppression::new(target, "S1", "typo target").applying_to_children();
            let (m, rejected) = SuppressionMatcher::compile(std::slice::from_ref(&record), 1);
            assert!(m.is_empty());
            assert_eq!(
                rejected,
                vec![SuppressionError::EmptyTargetPath {
                    target: target.to_string()
                }]
            );
            assert!(!m.coverage("S1", &path("App/b")).is_covered());
        }
        assert!(Suppression::all_rules("*", "sandbox").validate(1).is_ok());
    }

    #[test]
    fn test_whitespace_justification_is_missing() {
        let err = Suppression::new("App/b", "S1", "   ").validate(1).unwrap_err();
        assert!(matches!(err, SuppressionError::MissingJustification { .. }));
    }

    #[test]
    fn test_min_justification_len() {
        let record = Suppression::new("App/b", "S1", "too short");
        let err = record.validate(10).unwrap_err();
        assert_eq!(
            err,
            SuppressionError::JustificationTooShort {
                target: "App/b".into(),
                rules: "S1".into(),
                min: 10,
                actual: 9,
            }
        );
        assert!(record.validate(9).is_ok());
    }

    #[test]
    fn test_multiple_rules_expand() {
        let m = matcher(&[Suppression::new("App/b", "S1", "legacy").with_rule("S2")]);
        assert_eq!(m.len(), 2);
        assert!(m.coverage("S2", &path("App/b")).is_covered());
    }

    #[test]
    fn test_ignore_errors_condition() {
        let p = path("App/b");
        let query = IgnoreQuery {
            rule_id: "S1",
            level: Level::Error,
            path: &p,
            justification: "x",
        };
        assert!(IgnoreErrors.ignore(&query).is_some());
        assert!(NeverIgnore.ignore(&query).is_none());
        let warn = IgnoreQuery {
            level: Level::Warn,
            ..query
        };
        assert!(IgnoreErrors.ignore(&warn).is_none());
    }

    #[test]
    fn test_suppression_yaml_shape() {
        let record: Suppression = serde_yaml::from_str(
            "target: App/vpc\nrules: ['*']\njustification: shared\napplies_to_children: true\n",
        )
        .unwrap();
        assert!(record.applies_to_children);
        let bad: Result<Suppression, _> =
            serde_yaml::from_str("target: App\nrules: [S1]\nreason: typo\n");
        assert!(bad.is_err());
    }
}
