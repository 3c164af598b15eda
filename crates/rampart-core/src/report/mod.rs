//! Host-facing reports built from a pack's latest run.

pub mod json;
pub mod sarif;

use crate::classify::Disposition;
use crate::diagnostics::DiagnosticSummary;
use crate::pack::Pack;
use crate::rules::Level;
use serde::Serialize;

/// Compliance column of a report row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Compliance {
    #[serde(rename = "Compliant")]
    Compliant,
    #[serde(rename = "Non-Compliant")]
    NonCompliant,
    #[serde(rename = "Suppressed")]
    Suppressed,
    #[serde(rename = "Evaluation-Error")]
    EvaluationError,
}

impl Compliance {
    fn from_disposition(disposition: Disposition) -> Option<Self> {
        match disposition {
            Disposition::Compliant => Some(Compliance::Compliant),
            Disposition::Violation => Some(Compliance::NonCompliant),
            Disposition::Suppressed => Some(Compliance::Suppressed),
            Disposition::EvaluationError => Some(Compliance::EvaluationError),
            Disposition::NotApplicable => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub rule_id: String,
    pub resource_path: String,
    pub compliance: Compliance,
    pub level: Level,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception_reason: Option<String>,
}

/// Every evaluated `(rule, resource)` pair of one pack run, compliant ones
/// included, sorted by rule id then path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComplianceReport {
    pub pack: String,
    pub tool_version: String,
    pub passed: bool,
    pub summary: DiagnosticSummary,
    pub rows: Vec<ReportRow>,
}

impl ComplianceReport {
    pub fn from_pack(pack: &Pack) -> Self {
        let rows = pack
            .diagnostics()
            .iter()
            .filter_map(|d| {
                Some(ReportRow {
                    rule_id: d.rule_id.clone(),
                    resource_path: d.path.to_string(),
                    compliance: Compliance::from_disposition(d.disposition)?,
                    level: d.level,
                    message: d.message.clone(),
                    exception_reason: d.justification.clone(),
                })
            })
            .collect();

        Self {
            pack: pack.name().to_string(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            passed: pack.passes(),
            summary: pack.summary(),
            rows,
        }
    }

    pub fn non_compliant(&self) -> impl Iterator<Item = &ReportRow> + '_ {
        self.rows
            .iter()
            .filter(|r| matches!(r.compliance, Compliance::NonCompliant | Compliance::EvaluationError))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{require_true, Rule};
    use crate::suppression::Suppression;
    use crate::tree::{Tree, TreeSpec};
    use serde_json::json;

    pub(super) fn sample_pack() -> Pack {
        let mut pack = Pack::builder("baseline")
            .rule(
                Rule::new("baseline-Enc", Level::Error, |input| {
                    require_true(input.node(), "Encrypted")
                })
                .with_info("Bucket is not encrypted.")
                .for_kinds(["Bucket"]),
            )
            .suppression(Suppression::new("App/legacy", "baseline-Enc", "migrating in Q3"))
            .build()
            .unwrap();
        let tree = Tree::from_spec(
            TreeSpec::new("App", "Stack")
                .child(TreeSpec::new("open", "Bucket"))
                .child(TreeSpec::new("legacy", "Bucket"))
                .child(TreeSpec::new("locked", "Bucket").property("Encrypted", json!(true))),
        )
        .unwrap();
        pack.run(&tree);
        pack
    }

    #[test]
    fn test_report_rows_cover_all_evaluated_pairs() {
        let report = ComplianceReport::from_pack(&sample_pack());
        assert_eq!(report.pack, "baseline");
        assert!(!report.passed);
        let rows: Vec<(&str, Compliance)> = report
            .rows
            .iter()
            .map(|r| (r.resource_path.as_str(), r.compliance))
            .collect();
        assert_eq!(
            rows,
            vec![
                ("App/legacy", Compliance::Suppressed),
                ("App/locked", Compliance::Compliant),
                ("App/open", Compliance::NonCompliant),
            ]
        );
        assert_eq!(report.rows[0].exception_reason.as_deref(), Some("migrating in Q3"));
        assert_eq!(report.non_compliant().count(), 1);
    }
}
