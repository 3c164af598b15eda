//! Rule-pack engine.
//!
//! Data flows one way: a [`Pack`] configures the [`walker::TreeWalker`], which
//! drives each [`Rule`] over every [`ResourceNode`]; the
//! [`suppression::SuppressionMatcher`] and [`classify::Classifier`] turn the raw
//! [`Verdict`] into a [`Disposition`], and the [`DiagnosticSet`] records it.

pub mod classify;
pub mod config;
pub mod diagnostics;
pub mod pack;
pub mod report;
pub mod rules;
pub mod suppression;
pub mod tree;
pub mod walker;

// Convenience re-exports
pub use classify::{Classification, Disposition};
pub use config::{load_config, load_config_from_file, ConfigError, LoadedConfig, PackConfig};
pub use diagnostics::{Diagnostic, DiagnosticSet, DiagnosticSummary};
pub use pack::{Pack, PackBuilder, PackError, PackOptions};
pub use report::ComplianceReport;
pub use rules::{Applicability, Level, Rule, RuleInput, Verdict};
pub use suppression::{IgnoreErrors, NeverIgnore, Suppression, SuppressionError, SuppressionIgnore};
pub use tree::{Property, ResourceNode, ResourcePath, ResourceTree, Tree, TreeError, TreeSpec};
