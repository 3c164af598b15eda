//! Pack registry.
//!
//! A [`Pack`] is a named rule set plus its suppressions and options, built
//! explicitly through [`PackBuilder`]. Configuration problems (duplicate rule
//! ids, overrides for unknown rules, invalid suppressions in strict mode) are
//! raised by [`PackBuilder::build`], before any traversal.

use crate::classify::Classifier;
use crate::diagnostics::{Diagnostic, DiagnosticSet, DiagnosticSummary};
use crate::rules::{Level, Rule};
use crate::suppression::{NeverIgnore, Suppression, SuppressionError, SuppressionIgnore, SuppressionMatcher};
use crate::tree::ResourceTree;
use crate::walker::{TreeWalker, WalkStats};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

/// Pack behavior knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackOptions {
    /// Report waived and compliant entries too, and append rule explanations.
    pub verbose: bool,
    /// Reject invalid suppressions at build time instead of dropping them.
    pub strict_suppressions: bool,
    /// Minimum trimmed justification length (at least 1).
    pub min_justification_len: usize,
    /// Per-rule level overrides.
    pub severity_overrides: BTreeMap<String, Level>,
    /// Lowest level that fails the gate.
    pub gate_threshold: Level,
}

impl Default for PackOptions {
    fn default() -> Self {
        Self {
            verbose: false,
            strict_suppressions: true,
            min_justification_len: 1,
            severity_overrides: BTreeMap::new(),
            gate_threshold: Level::Error,
        }
    }
}

/// Pack construction error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PackError {
    #[error("Invalid pack name '{name}': must be lowercase alphanumeric with hyphens")]
    InvalidPackName { name: String },

    #[error("Pack '{pack}' has an empty rule ID")]
    EmptyRuleId { pack: String },

    #[error("Pack '{pack}' has rule ID '{rule_id}' with surrounding whitespace")]
    PaddedRuleId { pack: String, rule_id: String },

    #[error("Pack '{pack}' has duplicate rule ID '{rule_id}'")]
    DuplicateRuleId { pack: String, rule_id: String },

    #[error("Pack '{pack}' overrides severity of unknown rule '{rule_id}'")]
    UnknownOverride { pack: String, rule_id: String },

    #[error("Pack '{pack}' has an invalid suppression: {source}")]
    InvalidSuppression {
        pack: String,
        #[source]
        source: SuppressionError,
    },
}

pub struct PackBuilder {
    name: String,
    rules: Vec<Rule>,
    suppressions: Vec<Suppression>,
    options: PackOptions,
    ignore: Box<dyn SuppressionIgnore>,
}

impl PackBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rules: Vec::new(),
            suppressions: Vec::new(),
            options: PackOptions::default(),
            ignore: Box::new(NeverIgnore),
        }
    }

    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(mut self, rules: impl IntoIterator<Item = Rule>) -> Self {
        self.rules.extend(rules);
        self
    }

    pub fn suppression(mut self, suppression: Suppression) -> Self {
        self.suppressions.push(suppression);
        self
    }

    pub fn suppressions(mut self, suppressions: impl IntoIterator<Item = Suppression>) -> Self {
        self.suppressions.extend(suppressions);
        self
    }

    pub fn options(mut self, options: PackOptions) -> Self {
        self.options = options;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.options.verbose = verbose;
        self
    }

    pub fn strict_suppressions(mut self, strict: bool) -> Self {
        self.options.strict_suppressions = strict;
        self
    }

    pub fn min_justification_len(mut self, min: usize) -> Self {
        self.options.min_justification_len = min;
        self
    }

    pub fn gate_threshold(mut self, threshold: Level) -> Self {
        self.options.gate_threshold = threshold;
        self
    }

    pub fn severity_override(mut self, rule_id: impl Into<String>, level: Level) -> Self {
        self.options.severity_overrides.insert(rule_id.into(), level);
        self
    }

    pub fn ignore_condition(mut self, ignore: impl SuppressionIgnore + 'static) -> Self {
        self.ignore = Box::new(ignore);
        self
    }

    pub fn build(self) -> Result<Pack, PackError> {
        if !is_valid_pack_name(&self.name) {
            return Err(PackError::InvalidPackName { name: self.name });
        }

        let mut seen = HashSet::new();
        for rule in &self.rules {
            if rule.id().trim().is_empty() {
                return Err(PackError::EmptyRuleId { pack: self.name });
            }
            // Suppression selectors are trimmed, so a padded id could never be waived.
            if rule.id().trim() != rule.id() {
                return Err(PackError::PaddedRuleId {
                    pack: self.name.clone(),
                    rule_id: rule.id().to_string(),
                });
            }
            if !seen.insert(rule.id()) {
                return Err(PackError::DuplicateRuleId {
                    pack: self.name.clone(),
                    rule_id: rule.id().to_string(),
                });
            }
        }

        if let Some(unknown) = self
            .options
            .severity_overrides
            .keys()
            .find(|id| !seen.contains(id.as_str()))
        {
            return Err(PackError::UnknownOverride {
                pack: self.name.clone(),
                rule_id: unknown.clone(),
            });
        }

        let (matcher, rejected) =
            SuppressionMatcher::compile(&self.suppressions, self.options.min_justification_len);
        if let Some(first) = rejected.first() {
            if self.options.strict_suppressions {
                return Err(PackError::InvalidSuppression {
                    pack: self.name,
                    source: first.clone(),
                });
            }
            for error in &rejected {
                tracing::warn!(pack = %self.name, error = %error, "ignoring invalid suppression");
            }
        }

        Ok(Pack {
            name: self.name,
            rules: self.rules,
            matcher,
            options: self.options,
            ignore: self.ignore,
            diagnostics: DiagnosticSet::new(),
            last_run: None,
        })
    }
}

/// A configured rule pack and the diagnostics of its latest traversal.
pub struct Pack {
    name: String,
    rules: Vec<Rule>,
    matcher: SuppressionMatcher,
    options: PackOptions,
    ignore: Box<dyn SuppressionIgnore>,
    diagnostics: DiagnosticSet,
    last_run: Option<WalkStats>,
}

impl Pack {
    pub fn builder(name: impl Into<String>) -> PackBuilder {
        PackBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn rule(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id() == id)
    }

    pub fn options(&self) -> &PackOptions {
        &self.options
    }

    /// Level after applying overrides.
    pub fn effective_level(&self, rule: &Rule) -> Level {
        effective_level(&self.options, rule)
    }

    /// Evaluate every rule against every node of `tree`.
    ///
    /// Diagnostics from a previous run are discarded first, so running twice
    /// on the same inputs yields the same set.
    pub fn run(&mut self, tree: &dyn ResourceTree) -> &DiagnosticSet {
        let Pack {
            name,
            rules,
            matcher,
            options,
            ignore,
            diagnostics,
            last_run,
        } = self;

        diagnostics.clear();
        tracing::debug!(pack = %name, rules = rules.len(), "pack run started");

        let classifier = Classifier::new(matcher, &**ignore);
        let stats = TreeWalker::new(rules).walk(tree, |evaluation| {
            let level = effective_level(options, evaluation.rule);
            let classification = classifier.classify(
                evaluation.rule.id(),
                level,
                evaluation.node.path(),
                &evaluation.verdict,
            );
            if let Some(diagnostic) = Diagnostic::from_classification(
                evaluation.rule,
                evaluation.node.path(),
                classification,
                options.verbose,
            ) {
                diagnostics.record(diagnostic);
            }
        });

        tracing::debug!(
            pack = %name,
            nodes = stats.nodes,
            evaluations = stats.evaluations,
            contained_panics = stats.contained_panics,
            recorded = diagnostics.len(),
            "pack run finished"
        );
        *last_run = Some(stats);
        &self.diagnostics
    }

    /// Every recorded entry of the latest run.
    pub fn diagnostics(&self) -> &DiagnosticSet {
        &self.diagnostics
    }

    /// Entries the host should surface, honoring `verbose`.
    pub fn reported(&self) -> Vec<&Diagnostic> {
        self.diagnostics.reported(self.options.verbose)
    }

    pub fn summary(&self) -> DiagnosticSummary {
        self.diagnostics.summary()
    }

    pub fn passes(&self) -> bool {
        self.diagnostics.passes(self.options.gate_threshold)
    }

    pub fn last_run(&self) -> Option<WalkStats> {
        self.last_run
    }

    /// Hand the diagnostics to the host, leaving the pack reset.
    pub fn take_diagnostics(&mut self) -> DiagnosticSet {
        self.last_run = None;
        std::mem::take(&mut self.diagnostics)
    }

    pub fn reset(&mut self) {
        self.diagnostics.clear();
        self.last_run = None;
    }
}

fn effective_level(options: &PackOptions, rule: &Rule) -> Level {
    options
        .severity_overrides
        .get(rule.id())
        .copied()
        .unwrap_or_else(|| rule.level())
}

/// Lowercase alphanumeric plus inner hyphens.
pub(crate) fn is_valid_pack_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !name.starts_with('-')
        && !name.ends_with('-')
}
