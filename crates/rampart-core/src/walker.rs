//! Tree walker.
//!
//! Visits every node exactly once, in ascending [`ResourcePath`] order, and
//! evaluates every registered rule against it in registration order. A rule
//! that panics is contained to its own `(rule, node)` pair.

use crate::rules::{Rule, RuleInput, Verdict};
use crate::tree::{ResourceNode, ResourceTree};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// One `(rule, node, verdict)` triple produced by the walk.
#[derive(Debug)]
pub struct Evaluation<'a> {
    pub rule: &'a Rule,
    pub node: &'a ResourceNode,
    pub verdict: Verdict,
}

/// Counters for one walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStats {
    pub nodes: usize,
    pub evaluations: usize,
    /// Nodes the provider reported more than once (visited once).
    pub duplicate_nodes: usize,
    pub contained_panics: usize,
}

pub struct TreeWalker<'r> {
    rules: &'r [Rule],
}

impl<'r> TreeWalker<'r> {
    pub fn new(rules: &'r [Rule]) -> Self {
        Self { rules }
    }

    /// Walk `tree`, handing each evaluation to `visit`.
    pub fn walk<'t, F>(&self, tree: &'t dyn ResourceTree, mut visit: F) -> WalkStats
    where
        F: FnMut(Evaluation<'_>),
    {
        let mut nodes: Vec<&'t ResourceNode> = tree.nodes().collect();
        let provided = nodes.len();
        // Stable sort keeps the provider's first occurrence for duplicate paths.
        nodes.sort_by(|a, b| a.path().cmp(b.path()));
        nodes.dedup_by(|later, earlier| later.path() == earlier.path());

        let mut stats = WalkStats {
            nodes: nodes.len(),
            duplicate_nodes: provided - nodes.len(),
            ..WalkStats::default()
        };

        for node in nodes {
            let input = RuleInput::new(node, tree);
            for rule in self.rules {
                let verdict = evaluate_contained(rule, &input, &mut stats);
                stats.evaluations += 1;
                visit(Evaluation {
                    rule,
                    node,
                    verdict,
                });
            }
        }

        stats
    }
}

fn evaluate_contained(rule: &Rule, input: &RuleInput<'_>, stats: &mut WalkStats) -> Verdict {
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        if !rule.is_applicable(input.node()) {
            return None;
        }
        Some(rule.evaluate(input))
    }));

    match outcome {
        Ok(None) => Verdict::NotApplicable,
        Ok(Some(Verdict::NotApplicable)) => {
            Verdict::error("rule returned not-applicable for an in-scope node")
        }
        Ok(Some(verdict)) => verdict,
        Err(payload) => {
            stats.contained_panics += 1;
            let message = panic_message(payload.as_ref());
            tracing::warn!(
                rule_id = %rule.id(),
                path = %input.node().path(),
                panic = %message,
                "rule panicked; recorded as evaluation error"
            );
            Verdict::error(format!("rule panicked: {}", message))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{require_true, Level};
    use crate::tree::{ResourcePath, Tree, TreeSpec};
    use serde_json::{json, Map};

    fn tree() -> Tree {
        Tree::from_spec(
            TreeSpec::new("App", "Stack")
                .child(TreeSpec::new("b", "Bucket").property("Encrypted", json!(true)))
                .child(TreeSpec::new("a", "Bucket"))
                .child(TreeSpec::new("q", "Queue")),
        )
        .unwrap()
    }

    fn encryption_rule() -> Rule {
        Rule::new("Enc", Level::Error, |input| require_true(input.node(), "Encrypted"))
            .for_kinds(["Bucket"])
    }

    fn collect(rules: &[Rule], tree: &dyn ResourceTree) -> (Vec<(String, String, Verdict)>, WalkStats) {
        let mut out = Vec::new();
        let stats = TreeWalker::new(rules).walk(tree, |e| {
            out.push((e.rule.id().to_string(), e.node.path().to_string(), e.verdict));
        });
        (out, stats)
    }

    #[test]
    fn test_every_pair_visited_in_path_order() {
        let t = tree();
        let (out, stats) = collect(&[encryption_rule()], &t);
        let paths: Vec<&str> = out.iter().map(|(_, p, _)| p.as_str()).collect();
        assert_eq!(paths, vec!["App", "App/a", "App/b", "App/q"]);
        assert_eq!(stats.evaluations, 4);
        assert_eq!(out[0].2, Verdict::NotApplicable);
        assert_eq!(out[1].2, Verdict::NonCompliant);
        assert_eq!(out[2].2, Verdict::Compliant);
        assert_eq!(out[3].2, Verdict::NotApplicable);
    }

    #[test]
    fn test_panicking_rule_is_contained() {
        let boom = Rule::new("Boom", Level::Warn, |input| {
            if input.node().path().id() == Some("a") {
                panic!("cannot read property");
            }
            Verdict::Compliant
        })
        .for_kinds(["Bucket"]);
        let t = tree();
        let (out, stats) = collect(&[boom, encryption_rule()], &t);

        assert_eq!(stats.contained_panics, 1);
        let boom_on_a = out
            .iter()
            .find(|(r, p, _)| r == "Boom" && p == "App/a")
            .unwrap();
        assert_eq!(
            boom_on_a.2,
            Verdict::EvaluationError("rule panicked: cannot read property".into())
        );
        let enc_on_a = out.iter().find(|(r, p, _)| r == "Enc" && p == "App/a").unwrap();
        assert_eq!(enc_on_a.2, Verdict::NonCompliant);
        let boom_on_b = out.iter().find(|(r, p, _)| r == "Boom" && p == "App/b").unwrap();
        assert_eq!(boom_on_b.2, Verdict::Compliant);
    }

    #[test]
    fn test_in_scope_not_applicable_becomes_error() {
        let declines = Rule::new("Declines", Level::Warn, |_| Verdict::NotApplicable).for_kinds(["Queue"]);
        let t = tree();
        let (out, _) = collect(&[declines], &t);
        let on_queue = out.iter().find(|(_, p, _)| p == "App/q").unwrap();
        assert!(matches!(on_queue.2, Verdict::EvaluationError(_)));
    }

    struct Repeating(Vec<ResourceNode>);

    impl ResourceTree for Repeating {
        fn nodes(&self) -> Box<dyn Iterator<Item = &ResourceNode> + '_> {
            Box::new(self.0.iter())
        }
    }

    #[test]
    fn test_duplicate_paths_visited_once() {
        let node = ResourceNode::new(ResourcePath::parse("App/x"), "Bucket", Map::new());
        let t = Repeating(vec![node.clone(), node.clone(), node]);
        let (out, stats) = collect(&[encryption_rule()], &t);
        assert_eq!(out.len(), 1);
        assert_eq!(stats.duplicate_nodes, 2);
    }
}
