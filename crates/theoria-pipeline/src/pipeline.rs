//! Per-paper runner.
//!
//! ```text
//! Paper ─► extract ─► classify ─► select ─► synthesize ─► validate ─► emit
//!          (oracle)   (oracle)
//! ```
//!
//! Phases run strictly in order; only the two oracle phases suspend. A fatal
//! error anywhere ends this paper's run with `HardFail` and its report, and
//! nothing is written.

use crate::classifier;
use crate::config::PipelineConfig;
use crate::context::{Paper, PipelineContext};
use crate::emitter::{slug, EmitReceipt, Emitter};
use crate::error::PipelineError;
use crate::extractor;
use crate::selector;
use crate::signals::StructuralSignals;
use crate::synthesizer;
use crate::validator;
use serde::Serialize;
use std::sync::Arc;
use theoria_model::{ClassifiedTerm, ModelTypeDecision, SchemaDefinition, Term, ValidationReport};
use theoria_oracle::{OracleClient, TextOracle};
use tracing::{error, info, Instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutcomeKind {
    Success,
    Partial,
    HardFail,
}

#[derive(Debug)]
pub enum RunOutcome {
    /// Validated, with no ambiguous terms.
    Success {
        schema: Box<SchemaDefinition>,
        report: ValidationReport,
        receipt: Option<EmitReceipt>,
    },
    /// Validated, but at least one term is flagged ambiguous.
    Partial {
        schema: Box<SchemaDefinition>,
        report: ValidationReport,
        receipt: Option<EmitReceipt>,
    },
    HardFail {
        report: ValidationReport,
        error: PipelineError,
    },
}

impl RunOutcome {
    pub fn hard_fail(error: PipelineError) -> Self {
        RunOutcome::HardFail {
            report: error.report(),
            error,
        }
    }

    pub fn kind(&self) -> OutcomeKind {
        match self {
            RunOutcome::Success { .. } => OutcomeKind::Success,
            RunOutcome::Partial { .. } => OutcomeKind::Partial,
            RunOutcome::HardFail { .. } => OutcomeKind::HardFail,
        }
    }

    pub fn report(&self) -> &ValidationReport {
        match self {
            RunOutcome::Success { report, .. }
            | RunOutcome::Partial { report, .. }
            | RunOutcome::HardFail { report, .. } => report,
        }
    }

    pub fn schema(&self) -> Option<&SchemaDefinition> {
        match self {
            RunOutcome::Success { schema, .. } | RunOutcome::Partial { schema, .. } => Some(&**schema),
            RunOutcome::HardFail { .. } => None,
        }
    }

    pub fn receipt(&self) -> Option<&EmitReceipt> {
        match self {
            RunOutcome::Success { receipt, .. } | RunOutcome::Partial { receipt, .. } => {
                receipt.as_ref()
            }
            RunOutcome::HardFail { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&PipelineError> {
        match self {
            RunOutcome::HardFail { error, .. } => Some(error),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct PaperResult {
    /// Position of the paper in its batch (0 for single runs).
    pub index: usize,
    pub run_id: Uuid,
    pub citation: String,
    pub outcome: RunOutcome,
}

/// Phases 1–2 plus the selector, without synthesis or emission.
#[derive(Debug, Clone, Serialize)]
pub struct Inspection {
    pub citation: String,
    pub terms: Vec<Term>,
    pub classified: Vec<ClassifiedTerm>,
    pub signals: StructuralSignals,
    pub decision: ModelTypeDecision,
}

/// Cheap to clone: every clone shares the oracle client (and so its rate gate
/// and circuit breaker) and the emitter.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: Arc<PipelineConfig>,
    oracle: OracleClient,
    emitter: Option<Arc<Emitter>>,
}

impl Pipeline {
    /// Pipeline over `oracle` that emits to `config.output`.
    pub fn new(config: PipelineConfig, oracle: Arc<dyn TextOracle>) -> Self {
        let client = OracleClient::new(oracle, &config.oracle);
        let emitter = Emitter::new(config.output.directory.clone(), config.output.format);
        Self::with_client(Arc::new(config), client).with_emitter(emitter)
    }

    /// Pipeline over an existing client; emits nothing until an emitter is set.
    pub fn with_client(config: Arc<PipelineConfig>, oracle: OracleClient) -> Self {
        Self {
            config,
            oracle,
            emitter: None,
        }
    }

    pub fn with_emitter(mut self, emitter: Emitter) -> Self {
        self.emitter = Some(Arc::new(emitter));
        self
    }

    pub fn without_emitter(mut self) -> Self {
        self.emitter = None;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn oracle(&self) -> &OracleClient {
        &self.oracle
    }

    pub fn emitter(&self) -> Option<&Emitter> {
        self.emitter.as_deref()
    }

    fn context(&self, paper: Paper) -> PipelineContext {
        PipelineContext::new(paper, self.config.clone(), self.oracle.clone())
    }

    /// Run one paper end to end. Emits under the citation's slug.
    pub async fn run(&self, paper: Paper) -> PaperResult {
        let stem = slug(&paper.citation);
        self.run_indexed(0, paper, stem).await
    }

    pub(crate) async fn run_indexed(&self, index: usize, paper: Paper, stem: String) -> PaperResult {
        let ctx = self.context(paper);
        let span = ctx.span();
        let outcome = self.execute(&ctx, &stem).instrument(span).await;
        PaperResult {
            index,
            run_id: ctx.run_id,
            citation: ctx.paper.citation,
            outcome,
        }
    }

    async fn execute(&self, ctx: &PipelineContext, stem: &str) -> RunOutcome {
        let (schema, report) = match self.build(ctx).await {
            Ok(built) => built,
            Err(err) => {
                error!(error = %err, "paper run failed");
                return RunOutcome::hard_fail(err);
            }
        };

        let receipt = match &self.emitter {
            Some(emitter) => match emitter.emit_as(stem, &schema, &report) {
                Ok(receipt) => Some(receipt),
                Err(err) => {
                    error!(error = %err, "emission failed");
                    return RunOutcome::hard_fail(err.into());
                }
            },
            None => None,
        };

        let ambiguous = schema.ambiguous_terms().count();
        info!(
            model_type = %schema.model_type.selected,
            definitions = schema.definitions.len(),
            ambiguous,
            "paper run complete"
        );

        let schema = Box::new(schema);
        if ambiguous > 0 {
            RunOutcome::Partial {
                schema,
                report,
                receipt,
            }
        } else {
            RunOutcome::Success {
                schema,
                report,
                receipt,
            }
        }
    }

    /// Phases up to a validated schema.
    async fn build(
        &self,
        ctx: &PipelineContext,
    ) -> Result<(SchemaDefinition, ValidationReport), PipelineError> {
        let terms = extractor::extract(ctx).await?;
        let classified = classifier::classify(ctx, &terms).await?;
        let decision = selector::select(&classified, &ctx.config.selector)?;
        let schema = synthesizer::synthesize(
            &ctx.paper.citation,
            &ctx.paper.annotation,
            &classified,
            decision,
        );

        let report = validator::validate(&schema, &classified);
        if !report.ok {
            return Err(PipelineError::ValidationFailure(report));
        }
        Ok((schema, report))
    }

    /// Extract, classify and select without synthesizing or emitting.
    pub async fn inspect(&self, paper: Paper) -> Result<Inspection, PipelineError> {
        let ctx = self.context(paper);
        let span = ctx.span();
        async {
            let terms = extractor::extract(&ctx).await?;
            let classified = classifier::classify(&ctx, &terms).await?;
            let decision = selector::select(&classified, &ctx.config.selector)?;
            Ok(Inspection {
                citation: ctx.paper.citation.clone(),
                signals: StructuralSignals::compute(&classified),
                terms,
                classified,
                decision,
            })
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use theoria_model::{Category, IssueCode, ModelType};
    use theoria_oracle::{ClassificationWire, ExtractedTermWire, OracleClientConfig, ScriptedOracle};

    fn quiet_config() -> PipelineConfig {
        PipelineConfig {
            oracle: OracleClientConfig {
                jitter: false,
                initial_backoff_ms: 1,
                ..OracleClientConfig::default()
            },
            ..PipelineConfig::default()
        }
    }

    fn pipeline(oracle: ScriptedOracle) -> Pipeline {
        let config = quiet_config();
        let client = OracleClient::new(Arc::new(oracle), &config.oracle);
        Pipeline::with_client(Arc::new(config), client)
    }

    fn graph_oracle_with(instructs: ClassificationWire) -> ScriptedOracle {
        ScriptedOracle::new()
            .extract_terms(&[
                ExtractedTermWire::new("Tutor"),
                ExtractedTermWire::new("Pupil"),
                ExtractedTermWire::new("instructs"),
            ])
            .classify_as("Tutor", ClassificationWire::new("entity"))
            .classify_as("Pupil", ClassificationWire::new("entity"))
            .classify_as("instructs", instructs)
    }

    fn graph_oracle() -> ScriptedOracle {
        graph_oracle_with(
            ClassificationWire::new("relationship").with_signature(["Tutor"], ["Pupil"]),
        )
    }

    #[tokio::test]
    async fn clean_run_succeeds_without_emitting() {
        let result = pipeline(graph_oracle())
            .run(Paper::new("Roe (2021)", "A Tutor instructs a Pupil."))
            .await;
        assert_eq!(result.citation, "Roe (2021)");
        assert_eq!(result.outcome.kind(), OutcomeKind::Success);
        assert!(result.outcome.receipt().is_none());

        let schema = result.outcome.schema().unwrap();
        assert_eq!(schema.model_type.selected, ModelType::PropertyGraph);
        assert_eq!(schema.definitions.len(), 3);
    }

    #[tokio::test]
    async fn ambiguous_terms_make_a_partial_run() {
        let oracle = graph_oracle_with(ClassificationWire::new("relationship"));
        let result = pipeline(oracle)
            .run(Paper::new("Roe (2021)", "A Tutor instructs a Pupil."))
            .await;
        assert_eq!(result.outcome.kind(), OutcomeKind::Partial);
        assert_eq!(result.outcome.report().warnings.len(), 1);
        let schema = result.outcome.schema().unwrap();
        let instructs = schema.definition_by_name("instructs").unwrap();
        assert_eq!(instructs.category, Category::Relationship);
        assert!(instructs.signature_invariant_holds());
    }

    #[tokio::test]
    async fn empty_text_is_a_hard_fail() {
        let result = pipeline(graph_oracle()).run(Paper::new("Empty", "   ")).await;
        assert_eq!(result.outcome.kind(), OutcomeKind::HardFail);
        assert!(result.outcome.report().has_code(IssueCode::ExtractionFailure));
        assert!(result.outcome.schema().is_none());
    }

    #[tokio::test]
    async fn inspect_reports_decision_without_schema() {
        let inspection = pipeline(graph_oracle())
            .inspect(Paper::new("Roe (2021)", "A Tutor instructs a Pupil."))
            .await
            .unwrap();
        assert_eq!(inspection.terms.len(), 3);
        assert_eq!(inspection.signals.term_count, 3);
        assert_eq!(inspection.decision.selected, ModelType::PropertyGraph);
    }
}
