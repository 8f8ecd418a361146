//! Pipeline configuration.
//!
//! Every section has serde defaults, so a config file only needs the keys it
//! overrides:
//!
//! ```json
//! { "selector": { "tolerance": 0.05 }, "oracle": { "max_in_flight": 2 } }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use theoria_model::DocumentFormat;
use theoria_oracle::OracleClientConfig;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub extractor: ExtractorConfig,
    pub classifier: ClassifierConfig,
    pub selector: SelectorConfig,
    pub output: OutputConfig,
    pub batch: BatchConfig,
    pub oracle: OracleClientConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Re-ask the oracle once when extraction comes back empty or unusable.
    pub retry_empty_once: bool,
    /// Upper bound on stored context, in characters.
    pub max_context_chars: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            retry_empty_once: true,
            max_context_chars: 400,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Re-queries after an answer outside the category enumeration.
    pub max_category_retries: u32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            max_category_retries: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Scores within this distance of the maximum count as tied.
    pub tolerance: f64,
    /// Below this maximum score no paradigm dominates and `property_graph` is used.
    pub dominance_floor: f64,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            tolerance: 0.05,
            dominance_floor: 0.30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: DocumentFormat,
    pub directory: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: DocumentFormat::Json,
            directory: PathBuf::from("schemas"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Papers processed concurrently.
    pub paper_concurrency: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            paper_concurrency: 4,
        }
    }
}

impl PipelineConfig {
    /// Load from a JSON or YAML file (by extension; JSON otherwise).
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = match DocumentFormat::from_path(path) {
            Some(DocumentFormat::Yaml) => serde_yaml::from_str(&text)
                .with_context(|| format!("invalid YAML config {}", path.display()))?,
            _ => serde_json::from_str(&text)
                .with_context(|| format!("invalid JSON config {}", path.display()))?,
        };
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_files_keep_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"selector":{"tolerance":0.1},"oracle":{"max_attempts":2}}"#)
                .unwrap();
        assert_eq!(config.selector.tolerance, 0.1);
        assert_eq!(config.selector.dominance_floor, 0.30);
        assert_eq!(config.classifier.max_category_retries, 2);
        assert_eq!(config.oracle.max_attempts, 2);
        assert_eq!(config.oracle.max_in_flight, 4);
    }

    #[test]
    fn yaml_output_format_parses() {
        let config: PipelineConfig =
            serde_yaml::from_str("output:\n  format: yaml\n  directory: out\n").unwrap();
        assert_eq!(config.output.format, DocumentFormat::Yaml);
        assert_eq!(config.output.directory, PathBuf::from("out"));
    }
}
