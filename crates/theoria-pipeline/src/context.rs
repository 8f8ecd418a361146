//! Per-run state threaded through every phase.

use crate::config::PipelineConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use theoria_oracle::OracleClient;
use uuid::Uuid;

/// One input paper, already delivered as clean text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paper {
    pub citation: String,
    #[serde(default)]
    pub annotation: String,
    pub text: String,
}

impl Paper {
    pub fn new(citation: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            citation: citation.into(),
            annotation: String::new(),
            text: text.into(),
        }
    }

    pub fn with_annotation(mut self, annotation: impl Into<String>) -> Self {
        self.annotation = annotation.into();
        self
    }

    /// Load a `.json` paper record (`{citation, annotation?, text}`) or a
    /// plain-text file, whose file stem becomes the citation.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read paper {}", path.display()))?;
        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            return serde_json::from_str(&raw)
                .with_context(|| format!("invalid paper record {}", path.display()));
        }
        let citation = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("untitled")
            .to_string();
        Ok(Self::new(citation, raw))
    }
}

/// Explicit pipeline state; nothing phase-related lives in globals.
///
/// The oracle client is the only shared handle: clones of it share the rate
/// gate and circuit breaker with every other in-flight paper.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub run_id: Uuid,
    pub paper: Paper,
    pub config: Arc<PipelineConfig>,
    pub oracle: OracleClient,
}

impl PipelineContext {
    pub fn new(paper: Paper, config: Arc<PipelineConfig>, oracle: OracleClient) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            paper,
            config,
            oracle,
        }
    }

    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "paper",
            run_id = %self.run_id,
            citation = %self.paper.citation,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_plain_text_with_stem_citation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("smith-2019.txt");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"Learners acquire Skills.")
            .unwrap();

        let paper = Paper::load(&path).unwrap();
        assert_eq!(paper.citation, "smith-2019");
        assert_eq!(paper.text, "Learners acquire Skills.");
        assert!(paper.annotation.is_empty());
    }

    #[test]
    fn loads_json_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.json");
        std::fs::write(
            &path,
            r#"{"citation":"Doe (2020)","annotation":"note","text":"A B."}"#,
        )
        .unwrap();

        let paper = Paper::load(&path).unwrap();
        assert_eq!(paper.citation, "Doe (2020)");
        assert_eq!(paper.annotation, "note");
    }
}
