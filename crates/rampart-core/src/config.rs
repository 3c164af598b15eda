//! YAML pack configuration.
//!
//! Strict parsing: unknown keys are rejected (`deny_unknown_fields`), and every
//! loaded document gets a digest `sha256(canonical JSON)` so hosts can record
//! exactly which configuration produced a diagnostic set.

use crate::pack::{PackBuilder, PackOptions};
use crate::rules::Level;
use crate::suppression::Suppression;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

fn default_true() -> bool {
    true
}

fn default_min_justification_len() -> usize {
    1
}

fn default_gate_threshold() -> Level {
    Level::Error
}

/// Pack configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackConfig {
    #[serde(default)]
    pub verbose: bool,

    #[serde(default = "default_true")]
    pub strict_suppressions: bool,

    #[serde(default = "default_min_justification_len")]
    pub min_justification_len: usize,

    #[serde(default = "default_gate_threshold")]
    pub gate_threshold: Level,

    #[serde(default)]
    pub severity_overrides: BTreeMap<String, Level>,

    #[serde(default)]
    pub suppressions: Vec<Suppression>,
}

impl Default for PackConfig {
    fn default() -> Self {
        let options = PackOptions::default();
        Self {
            verbose: options.verbose,
            strict_suppressions: options.strict_suppressions,
            min_justification_len: options.min_justification_len,
            gate_threshold: options.gate_threshold,
            severity_overrides: options.severity_overrides,
            suppressions: Vec::new(),
        }
    }
}

impl PackConfig {
    pub fn options(&self) -> PackOptions {
        PackOptions {
            verbose: self.verbose,
            strict_suppressions: self.strict_suppressions,
            min_justification_len: self.min_justification_len,
            severity_overrides: self.severity_overrides.clone(),
            gate_threshold: self.gate_threshold,
        }
    }

    /// Attach this document to a builder.
    ///
    /// Scalar options are taken from the document. Severity overrides and
    /// suppressions are added to whatever the builder already holds; on a
    /// conflicting override the document wins.
    pub fn apply(&self, builder: PackBuilder) -> PackBuilder {
        let builder = builder
            .verbose(self.verbose)
            .strict_suppressions(self.strict_suppressions)
            .min_justification_len(self.min_justification_len)
            .gate_threshold(self.gate_threshold);
        self.severity_overrides
            .iter()
            .fold(builder, |builder, (rule_id, level)| {
                builder.severity_override(rule_id.clone(), *level)
            })
            .suppressions(self.suppressions.iter().cloned())
    }
}

/// Where a configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Inline,
    File(PathBuf),
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Inline => write!(f, "inline"),
            ConfigSource::File(path) => write!(f, "file:{}", path.display()),
        }
    }
}

/// A parsed configuration with its digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedConfig {
    pub config: PackConfig,
    /// `sha256:<hex>` of the canonical JSON form.
    pub digest: String,
    pub source: ConfigSource,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config YAML: {message}")]
    YamlParseError { message: String },

    #[error("Failed to canonicalize config: {message}")]
    Canonicalize { message: String },
}

/// Parse a configuration document.
pub fn load_config(content: &str) -> Result<LoadedConfig, ConfigError> {
    load_config_with_source(content, ConfigSource::Inline)
}

pub fn load_config_from_file(path: &Path) -> Result<LoadedConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;
    load_config_with_source(&content, ConfigSource::File(path.to_path_buf()))
}

fn load_config_with_source(content: &str, source: ConfigSource) -> Result<LoadedConfig, ConfigError> {
    // An empty document means "all defaults".
    let config: PackConfig = if content.trim().is_empty() {
        PackConfig::default()
    } else {
        serde_yaml::from_str(content).map_err(|e| ConfigError::YamlParseError {
            message: format_yaml_error(e),
        })?
    };
    let digest = compute_config_digest(&config)?;
    tracing::debug!(source = %source, digest = %digest, "loaded pack config");
    Ok(LoadedConfig {
        config,
        digest,
        source,
    })
}

fn compute_config_digest(config: &PackConfig) -> Result<String, ConfigError> {
    let json = serde_json::to_value(config).map_err(|e| ConfigError::Canonicalize {
        message: e.to_string(),
    })?;
    let canonical = serde_json::to_string(&json).map_err(|e| ConfigError::Canonicalize {
        message: e.to_string(),
    })?;
    Ok(format!(
        "sha256:{}",
        hex::encode(Sha256::digest(canonical.as_bytes()))
    ))
}

fn format_yaml_error(e: serde_yaml::Error) -> String {
    let msg = e.to_string();
    if msg.contains("unknown field") {
        return format!("Unknown field detected (check for typos): {}", msg);
    }
    if msg.contains("duplicate key") {
        return format!("Duplicate key detected: {}", msg);
    }
    msg
}
