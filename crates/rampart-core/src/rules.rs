//! Rule contract.
//!
//! A rule is an immutable value wrapping a plain `fn` predicate. Predicates see
//! one node (plus read-only access to the rest of the tree for cross-resource
//! checks) and return a [`Verdict`]. Plain function pointers cannot capture
//! state, so rules stay stateless between invocations.

use crate::tree::{Property, ResourceNode, ResourceTree};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Rule severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    #[serde(alias = "warning")]
    Warn,
    Error,
}

impl Level {
    pub fn as_sarif_level(&self) -> &'static str {
        match self {
            Level::Error => "error",
            Level::Warn => "warning",
            Level::Info => "note",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Error => write!(f, "error"),
            Level::Warn => write!(f, "warn"),
            Level::Info => write!(f, "info"),
        }
    }
}

/// Direct result of one rule applied to one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Compliant,
    NonCompliant,
    NotApplicable,
    /// The rule could not reach a decision.
    EvaluationError(String),
}

impl Verdict {
    pub fn error(reason: impl Into<String>) -> Self {
        Verdict::EvaluationError(reason.into())
    }

    /// `Compliant` when `ok`, otherwise `NonCompliant`.
    pub fn from_bool(ok: bool) -> Self {
        if ok {
            Verdict::Compliant
        } else {
            Verdict::NonCompliant
        }
    }
}

/// What a predicate gets to look at.
#[derive(Clone, Copy)]
pub struct RuleInput<'a> {
    node: &'a ResourceNode,
    tree: &'a dyn ResourceTree,
}

impl<'a> RuleInput<'a> {
    pub fn new(node: &'a ResourceNode, tree: &'a dyn ResourceTree) -> Self {
        Self { node, tree }
    }

    pub fn node(&self) -> &'a ResourceNode {
        self.node
    }

    /// The whole tree, for cross-resource checks.
    pub fn tree(&self) -> &'a dyn ResourceTree {
        self.tree
    }

    pub fn property(&self, key: &str) -> Property<'a> {
        self.node.property(key)
    }
}

pub type RuleFn = fn(&RuleInput<'_>) -> Verdict;
pub type NodePredicate = fn(&ResourceNode) -> bool;

/// Which nodes a rule is in scope for.
#[derive(Clone)]
pub enum Applicability {
    /// Every node.
    Any,
    /// Nodes whose subtype tag is one of these.
    Kinds(Vec<String>),
    Predicate(NodePredicate),
}

impl Applicability {
    pub fn matches(&self, node: &ResourceNode) -> bool {
        match self {
            Applicability::Any => true,
            Applicability::Kinds(kinds) => kinds.iter().any(|k| k == node.kind()),
            Applicability::Predicate(pred) => pred(node),
        }
    }
}

impl fmt::Debug for Applicability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Applicability::Any => write!(f, "Any"),
            Applicability::Kinds(kinds) => f.debug_tuple("Kinds").field(kinds).finish(),
            Applicability::Predicate(_) => write!(f, "Predicate(..)"),
        }
    }
}

/// A registered compliance rule.
#[derive(Clone)]
pub struct Rule {
    id: String,
    level: Level,
    info: String,
    explanation: String,
    applicability: Applicability,
    check: RuleFn,
}

impl Rule {
    pub fn new(id: impl Into<String>, level: Level, check: RuleFn) -> Self {
        Self {
            id: id.into(),
            level,
            info: String::new(),
            explanation: String::new(),
            applicability: Applicability::Any,
            check,
        }
    }

    /// One-line description shown in diagnostics.
    pub fn with_info(mut self, info: impl Into<String>) -> Self {
        self.info = info.into();
        self
    }

    /// Longer rationale, appended to messages in verbose mode.
    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = explanation.into();
        self
    }

    pub fn for_kinds<I, S>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.applicability = Applicability::Kinds(kinds.into_iter().map(Into::into).collect());
        self
    }

    pub fn when(mut self, predicate: NodePredicate) -> Self {
        self.applicability = Applicability::Predicate(predicate);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn info(&self) -> &str {
        &self.info
    }

    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    pub fn applicability(&self) -> &Applicability {
        &self.applicability
    }

    pub fn is_applicable(&self, node: &ResourceNode) -> bool {
        self.applicability.matches(node)
    }

    /// Run the predicate. No applicability check and no panic containment;
    /// the walker owns both.
    pub fn evaluate(&self, input: &RuleInput<'_>) -> Verdict {
        (self.check)(input)
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("id", &self.id)
            .field("level", &self.level)
            .field("applicability", &self.applicability)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Fail-closed helpers for rule authors. Missing and unresolved values are
// always NonCompliant: an unconfigured control counts as absent.
// ---------------------------------------------------------------------------

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Compliant only for `true` (or the string `"true"`).
pub fn require_true(node: &ResourceNode, key: &str) -> Verdict {
    let ok = match node.property(key) {
        Property::Resolved(Value::Bool(b)) => *b,
        Property::Resolved(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    };
    Verdict::from_bool(ok)
}

/// Compliant when the property is resolved to a non-blank value.
pub fn require_present(node: &ResourceNode, key: &str) -> Verdict {
    Verdict::from_bool(matches!(node.property(key), Property::Resolved(v) if !is_blank(v)))
}

/// Compliant for a resolved, non-empty list. An empty list is treated the
/// same as an absent one.
pub fn require_non_empty_list(node: &ResourceNode, key: &str) -> Verdict {
    Verdict::from_bool(
        matches!(node.property(key), Property::Resolved(Value::Array(items)) if !items.is_empty()),
    )
}

/// Compliant when the property is a number (or numeric string) `>= min`.
pub fn require_at_least(node: &ResourceNode, key: &str, min: f64) -> Verdict {
    let ok = node
        .property(key)
        .resolved()
        .and_then(as_number)
        .is_some_and(|n| n >= min);
    Verdict::from_bool(ok)
}

/// Compliant when the property is a string equal to one of `allowed`.
pub fn require_one_of(node: &ResourceNode, key: &str, allowed: &[&str]) -> Verdict {
    let ok = match node.property(key) {
        Property::Resolved(Value::String(s)) => allowed.contains(&s.as_str()),
        _ => false,
    };
    Verdict::from_bool(ok)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{ResourcePath, Tree};
    use serde_json::{json, Map};

    fn node() -> ResourceNode {
        ResourceNode::new(ResourcePath::parse("App/q"), "AWS::SQS::Queue", Map::new())
            .with_property("Encrypted", json!(true))
            .with_property("EncryptedStr", json!("TRUE"))
            .with_property("Pending", json!({ "$unresolved": "Token[7]" }))
            .with_property("Empty", json!([]))
            .with_property("Blank", json!("  "))
            .with_property("Groups", json!(["sg-1"]))
            .with_property("Retention", json!("30"))
            .with_property("Protocol", json!("TLSv1.2"))
    }

    #[test]
    fn test_level_ordering() {
        assert!(Level::Info < Level::Warn);
        assert!(Level::Warn < Level::Error);
    }

    #[test]
    fn test_level_serde_names() {
        let level: Level = serde_yaml::from_str("warning").unwrap();
        assert_eq!(level, Level::Warn);
        assert_eq!(serde_json::to_string(&Level::Error).unwrap(), "\"error\"");
    }

    #[test]
    fn test_require_true_fails_closed() {
        let n = node();
        assert_eq!(require_true(&n, "Encrypted"), Verdict::Compliant);
        assert_eq!(require_true(&n, "EncryptedStr"), Verdict::Compliant);
        assert_eq!(require_true(&n, "Pending"), Verdict::NonCompliant);
        assert_eq!(require_true(&n, "Missing"), Verdict::NonCompliant);
        assert_eq!(require_true(&n, "Protocol"), Verdict::NonCompliant);
    }

    #[test]
    fn test_empty_and_absent_lists_match() {
        let n = node();
        assert_eq!(require_non_empty_list(&n, "Empty"), Verdict::NonCompliant);
        assert_eq!(require_non_empty_list(&n, "Missing"), Verdict::NonCompliant);
        assert_eq!(require_non_empty_list(&n, "Groups"), Verdict::Compliant);
        assert_eq!(require_present(&n, "Empty"), Verdict::NonCompliant);
        assert_eq!(require_present(&n, "Blank"), Verdict::NonCompliant);
        assert_eq!(require_present(&n, "Pending"), Verdict::NonCompliant);
    }

    #[test]
    fn test_thresholds_and_allow_lists() {
        let n = node();
        assert_eq!(require_at_least(&n, "Retention", 7.0), Verdict::Compliant);
        assert_eq!(require_at_least(&n, "Retention", 90.0), Verdict::NonCompliant);
        assert_eq!(require_at_least(&n, "Pending", 1.0), Verdict::NonCompliant);
        assert_eq!(
            require_one_of(&n, "Protocol", &["TLSv1.2", "TLSv1.3"]),
            Verdict::Compliant
        );
        assert_eq!(require_one_of(&n, "Protocol", &["TLSv1.3"]), Verdict::NonCompliant);
    }

    #[test]
    fn test_applicability_dispatch() {
        let n = node();
        let by_kind = Rule::new("R1", Level::Error, |_| Verdict::Compliant).for_kinds(["AWS::SQS::Queue"]);
        let other = Rule::new("R2", Level::Error, |_| Verdict::Compliant).for_kinds(["AWS::S3::Bucket"]);
        let by_pred = Rule::new("R3", Level::Warn, |_| Verdict::Compliant)
            .when(|node| node.properties().contains_key("Groups"));
        assert!(by_kind.is_applicable(&n));
        assert!(!other.is_applicable(&n));
        assert!(by_pred.is_applicable(&n));
    }

    #[test]
    fn test_evaluate_sees_node_and_tree() {
        let tree = Tree::from_nodes([node()]).unwrap();
        let rule = Rule::new("R1", Level::Error, |input| {
            Verdict::from_bool(input.tree().node(input.node().path()).is_some())
        });
        let n = tree.node(&ResourcePath::parse("App/q")).unwrap();
        assert_eq!(rule.evaluate(&RuleInput::new(n, &tree)), Verdict::Compliant);
    }
}
