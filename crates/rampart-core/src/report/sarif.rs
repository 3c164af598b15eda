//! SARIF 2.1.0 rendering of a pack run.
//!
//! Unwaived violations and evaluation errors become plain results. Waived
//! violations are kept as results carrying an `external` suppression with the
//! operator's justification, so code-scanning UIs can show them as dismissed.
//! Compliant entries are never emitted.

use crate::classify::Disposition;
use crate::diagnostics::Diagnostic;
use crate::pack::Pack;
use serde_json::{json, Map, Value};

pub const SARIF_SCHEMA: &str =
    "https://raw.githubusercontent.com/oasis-tcs/sarif-spec/main/sarif-2.1/schema/sarif-schema-2.1.0.json";

/// SARIF output options.
#[derive(Debug, Clone, Default)]
pub struct SarifOptions {
    /// Artifact the resource tree was materialized from (e.g. a synthesized
    /// template). Without it results only carry logical locations.
    pub artifact_uri: Option<String>,
    /// Configuration digest, recorded in run properties.
    pub config_digest: Option<String>,
}

pub fn to_sarif(pack: &Pack) -> Value {
    to_sarif_with_options(pack, SarifOptions::default())
}

pub fn to_sarif_with_options(pack: &Pack, options: SarifOptions) -> Value {
    let tool_version = env!("CARGO_PKG_VERSION");

    let rules: Vec<Value> = pack
        .rules()
        .iter()
        .map(|r| {
            let mut rule = json!({
                "id": r.id(),
                "shortDescription": { "text": r.info() },
                "defaultConfiguration": {
                    "level": pack.effective_level(r).as_sarif_level()
                },
                "properties": { "pack": pack.name() }
            });
            if !r.explanation().is_empty() {
                if let Some(obj) = rule.as_object_mut() {
                    obj.insert("fullDescription".into(), json!({ "text": r.explanation() }));
                }
            }
            rule
        })
        .collect();

    let results: Vec<Value> = pack
        .diagnostics()
        .iter()
        .filter(|d| {
            matches!(
                d.disposition,
                Disposition::Violation | Disposition::EvaluationError | Disposition::Suppressed
            )
        })
        .map(|d| result_for(d, options.artifact_uri.as_deref()))
        .collect();

    let mut run_props = Map::new();
    run_props.insert("pack".into(), json!(pack.name()));
    run_props.insert("passed".into(), json!(pack.passes()));
    if let Some(digest) = &options.config_digest {
        run_props.insert("configDigest".into(), json!(digest));
    }

    json!({
        "$schema": SARIF_SCHEMA,
        "version": "2.1.0",
        "runs": [{
            "tool": {
                "driver": {
                    "name": "rampart",
                    "version": tool_version,
                    "semanticVersion": tool_version,
                    "rules": rules
                }
            },
            "automationDetails": {
                "id": format!("rampart/{}/{}", pack.name(), tool_version)
            },
            "invocations": [{ "executionSuccessful": true }],
            "results": results,
            "properties": run_props
        }]
    })
}

fn result_for(d: &Diagnostic, artifact_uri: Option<&str>) -> Value {
    let mut location = Map::new();
    location.insert(
        "logicalLocations".into(),
        json!([{
            "fullyQualifiedName": d.path.to_string(),
            "name": d.path.id().unwrap_or_default(),
            "kind": "resource"
        }]),
    );
    if let Some(uri) = artifact_uri {
        location.insert(
            "physicalLocation".into(),
            json!({
                "artifactLocation": { "uri": uri, "uriBaseId": "%SRCROOT%" },
                "region": { "startLine": 1, "startColumn": 1 }
            }),
        );
    }

    let mut result = Map::new();
    result.insert("ruleId".into(), json!(d.rule_id));
    result.insert("level".into(), json!(d.level.as_sarif_level()));
    result.insert("message".into(), json!({ "text": d.message }));
    result.insert("locations".into(), json!([Value::Object(location)]));
    result.insert(
        "partialFingerprints".into(),
        json!({ "rampartFingerprint/v1": d.fingerprint }),
    );
    result.insert(
        "properties".into(),
        json!({ "disposition": d.disposition.as_str() }),
    );
    if d.disposition == Disposition::Suppressed {
        result.insert(
            "suppressions".into(),
            json!([{
                "kind": "external",
                "justification": d.justification.as_deref().unwrap_or_default()
            }]),
        );
    }
    Value::Object(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::tests::sample_pack;

    #[test]
    fn test_sarif_structure() {
        let sarif = to_sarif(&sample_pack());
        assert_eq!(sarif["version"], "2.1.0");
        assert_eq!(sarif["$schema"], SARIF_SCHEMA);

        let run = &sarif["runs"][0];
        assert_eq!(run["tool"]["driver"]["name"], "rampart");
        assert_eq!(run["tool"]["driver"]["rules"][0]["id"], "baseline-Enc");
        assert_eq!(run["properties"]["passed"], false);

        let results = run["results"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        let waived = &results[0];
        assert_eq!(waived["locations"][0]["logicalLocations"][0]["fullyQualifiedName"], "App/legacy");
        assert_eq!(waived["suppressions"][0]["justification"], "migrating in Q3");
        let open = &results[1];
        assert!(open.get("suppressions").is_none());
        assert!(open["message"]["text"].as_str().unwrap().starts_with("baseline-Enc:"));
        assert!(open["locations"][0].get("physicalLocation").is_none());
    }

    #[test]
    fn test_sarif_with_artifact_and_digest() {
        let sarif = to_sarif_with_options(
            &sample_pack(),
            SarifOptions {
                artifact_uri: Some("cdk.out/App.template.json".into()),
                config_digest: Some("sha256:abc".into()),
            },
        );
        let run = &sarif["runs"][0];
        assert_eq!(run["properties"]["configDigest"], "sha256:abc");
        assert_eq!(
            run["results"][0]["locations"][0]["physicalLocation"]["artifactLocation"]["uri"],
            "cdk.out/App.template.json"
        );
    }

    #[test]
    fn test_sarif_is_deterministic() {
        assert_eq!(
            serde_json::to_string(&to_sarif(&sample_pack())).unwrap(),
            serde_json::to_string(&to_sarif(&sample_pack())).unwrap()
        );
    }
}
