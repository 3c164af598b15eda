use super::ComplianceReport;
use anyhow::{Context, Result};
use std::path::Path;

pub fn to_json(report: &ComplianceReport) -> serde_json::Result<serde_json::Value> {
    serde_json::to_value(report)
}

/// Write `report` as pretty JSON, creating parent directories as needed.
pub fn write_json_report(report: &ComplianceReport, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating report directory {}", parent.display()))?;
        }
    }
    let body = serde_json::to_string_pretty(report).context("serializing compliance report")?;
    std::fs::write(path, body + "\n")
        .with_context(|| format!("writing compliance report {}", path.display()))?;
    Ok(())
}
