//! Emitter: validated schema → persisted document.
//!
//! Writes go to a temporary file in the target directory which is then
//! persisted over the final path, so a reader never observes a partially
//! written document. A schema without an `ok` report is refused.
//!
//! Emission is synchronous and runs on the paper's own task: documents are a
//! few kilobytes, and with no await point between write and result a paper
//! reported as cancelled has never written anything.

use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use theoria_model::{DocumentFormat, ModelError, SchemaDefinition, SchemaDocument, ValidationReport};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum EmitError {
    #[error("refusing to emit a schema with {0} validation error(s)")]
    NotValidated(usize),
    #[error("render: {0}")]
    Render(#[from] ModelError),
    #[error("io on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("persist: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// What was written, and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitReceipt {
    pub path: PathBuf,
    pub format: DocumentFormat,
    pub bytes: usize,
    /// Hex SHA-256 of the written document.
    pub sha256: String,
}

#[derive(Debug, Clone)]
pub struct Emitter {
    directory: PathBuf,
    format: DocumentFormat,
}

impl Emitter {
    pub fn new(directory: impl Into<PathBuf>, format: DocumentFormat) -> Self {
        Self {
            directory: directory.into(),
            format,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn format(&self) -> DocumentFormat {
        self.format
    }

    /// Target path for a file stem: `<dir>/<stem>.<ext>`.
    pub fn path_for(&self, stem: &str) -> PathBuf {
        self.directory
            .join(format!("{stem}.{}", self.format.extension()))
    }

    /// Emit under the citation's slug.
    pub fn emit(
        &self,
        schema: &SchemaDefinition,
        report: &ValidationReport,
    ) -> Result<EmitReceipt, EmitError> {
        self.emit_as(&slug(&schema.citation), schema, report)
    }

    /// Emit under an explicit file stem.
    pub fn emit_as(
        &self,
        stem: &str,
        schema: &SchemaDefinition,
        report: &ValidationReport,
    ) -> Result<EmitReceipt, EmitError> {
        if !report.ok {
            return Err(EmitError::NotValidated(report.errors.len()));
        }

        let text = render(schema, self.format)?;
        let path = self.path_for(stem);
        let io_err = |source| EmitError::Io {
            path: path.clone(),
            source,
        };

        std::fs::create_dir_all(&self.directory).map_err(io_err)?;
        let mut tmp = NamedTempFile::new_in(&self.directory).map_err(io_err)?;
        tmp.write_all(text.as_bytes()).map_err(io_err)?;
        tmp.flush().map_err(io_err)?;
        tmp.persist(&path)?;

        let receipt = EmitReceipt {
            sha256: digest(&text),
            bytes: text.len(),
            format: self.format,
            path,
        };
        info!(path = %receipt.path.display(), bytes = receipt.bytes, "schema emitted");
        Ok(receipt)
    }
}

/// Serialize a schema exactly as [`Emitter::emit`] would write it.
pub fn render(schema: &SchemaDefinition, format: DocumentFormat) -> Result<String, EmitError> {
    Ok(SchemaDocument::from_definition(schema).render(format)?)
}

pub fn digest(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

/// File-name-safe form of a citation: lowercase alphanumerics joined by `-`.
pub fn slug(citation: &str) -> String {
    let mut out = String::new();
    for c in citation.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            out.push(c);
        } else if !out.is_empty() && !out.ends_with('-') {
            out.push('-');
        }
    }
    let trimmed = out.trim_end_matches('-');
    if trimmed.is_empty() {
        "schema".to_string()
    } else {
        trimmed.to_string()
    }
}

/// One file stem per citation, in order. Citations that slug alike get
/// `-2`, `-3`, ... so no two papers of a batch share an output file.
pub fn unique_stems<'a, I>(citations: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut taken = HashSet::new();
    citations
        .into_iter()
        .map(|citation| {
            let base = slug(citation);
            let mut stem = base.clone();
            let mut n = 1;
            while !taken.insert(stem.clone()) {
                n += 1;
                stem = format!("{base}-{n}");
            }
            stem
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use theoria_model::{
        Category, ClassifiedTerm, IssueCode, ModelType, ModelTypeDecision, RootEntry,
        RootPropertySpec, RootRole, Term, TermId,
    };

    fn schema() -> SchemaDefinition {
        let mut nodes = RootPropertySpec::new(RootRole::Nodes, ModelType::PropertyGraph);
        nodes.items.push(RootEntry::term("A"));
        SchemaDefinition {
            citation: "Doe & Roe (2020)".into(),
            annotation: String::new(),
            model_type: ModelTypeDecision {
                selected: ModelType::PropertyGraph,
                scores: BTreeMap::from([(ModelType::PropertyGraph, 0.3)]),
                rationale: "r".into(),
                composition: None,
            },
            root_properties: BTreeMap::from([
                ("nodes".to_string(), nodes),
                (
                    "edges".to_string(),
                    RootPropertySpec::new(RootRole::Edges, ModelType::PropertyGraph),
                ),
            ]),
            definitions: vec![ClassifiedTerm::new(TermId(0), Term::new("A", ""), Category::Entity)],
        }
    }

    fn ok() -> ValidationReport {
        ValidationReport::from_issues(vec![], vec![])
    }

    #[test]
    fn slugs_are_file_safe() {
        assert_eq!(slug("Doe & Roe (2020)"), "doe-roe-2020");
        assert_eq!(slug("  "), "schema");
        assert_eq!(slug("Ünal, 2019"), "ünal-2019");
    }

    #[test]
    fn colliding_citations_get_distinct_stems() {
        let stems = unique_stems(["Smith 2019", "Smith, 2019", "smith-2019-2", "Smith (2019)"]);
        assert_eq!(stems, vec!["smith-2019", "smith-2019-2", "smith-2019-2-2", "smith-2019-3"]);
        assert_eq!(unique_stems(["A", "B"]), vec!["a", "b"]);
    }

    #[test]
    fn emits_and_reports_digest() {
        let dir = tempfile::tempdir().unwrap();
        let emitter = Emitter::new(dir.path().join("out"), DocumentFormat::Json);
        let receipt = emitter.emit(&schema(), &ok()).unwrap();

        assert_eq!(receipt.path, dir.path().join("out/doe-roe-2020.json"));
        let written = std::fs::read_to_string(&receipt.path).unwrap();
        assert_eq!(written.len(), receipt.bytes);
        assert_eq!(receipt.sha256, digest(&written));
        assert_eq!(receipt.sha256.len(), 64);

        let back = SchemaDocument::parse(&written, DocumentFormat::Json)
            .unwrap()
            .into_definition()
            .unwrap();
        assert_eq!(back.definitions, schema().definitions);
    }

    #[test]
    fn refuses_failed_reports() {
        let dir = tempfile::tempdir().unwrap();
        let emitter = Emitter::new(dir.path(), DocumentFormat::Yaml);
        let report = ValidationReport::failure(IssueCode::SubtypeCycle, "cycle");
        assert!(matches!(
            emitter.emit(&schema(), &report),
            Err(EmitError::NotValidated(1))
        ));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn re_emitting_overwrites_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let emitter = Emitter::new(dir.path(), DocumentFormat::Yaml);
        let first = emitter.emit(&schema(), &ok()).unwrap();
        let second = emitter.emit(&schema(), &ok()).unwrap();
        assert_eq!(first, second);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
