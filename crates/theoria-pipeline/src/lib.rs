//! Theoria pipeline
//!
//! Turns the text of a scientific paper into a validated, paradigm-shaped
//! schema of the theory it describes.
//!
//! ```text
//! ┌──────────┐   ┌────────────┐   ┌──────────┐   ┌─────────────┐   ┌───────────┐   ┌─────────┐
//! │ Extract  │──►│ Classify   │──►│ Select   │──►│ Synthesize  │──►│ Validate  │──►│ Emit    │
//! │ (phase 1)│   │ (phase 2)  │   │ paradigm │   │ (phase 3)   │   │ 5 passes  │   │ atomic  │
//! └────┬─────┘   └─────┬──────┘   └──────────┘   └─────────────┘   └───────────┘   └─────────┘
//!      │               │
//!      └──── OracleClient (retry, breaker, shared rate gate) ────► TextOracle
//! ```
//!
//! A [`Pipeline`] runs one paper; a [`BatchRunner`] runs many concurrently
//! with per-paper cancellation. All per-run state lives in a
//! [`PipelineContext`]; the oracle client is the only thing papers share.
//!
//! ```rust,ignore
//! let pipeline = Pipeline::new(PipelineConfig::default(), Arc::new(HeuristicOracle::new()?));
//! let result = pipeline.run(Paper::new("Sweller (1988)", text)).await;
//! match result.outcome.kind() {
//!     OutcomeKind::Success | OutcomeKind::Partial => { /* schema emitted */ }
//!     OutcomeKind::HardFail => eprintln!("{}", result.outcome.report()),
//! }
//! ```

pub mod batch;
pub mod classifier;
pub mod config;
pub mod context;
pub mod emitter;
pub mod error;
pub mod extractor;
pub mod pipeline;
pub mod selector;
pub mod signals;
pub mod subtype;
pub mod synthesizer;
pub mod validator;

pub use batch::{Batch, BatchReport, BatchRunner, BatchSummary, PaperHandle};
pub use config::{
    BatchConfig, ClassifierConfig, ExtractorConfig, OutputConfig, PipelineConfig, SelectorConfig,
};
pub use context::{Paper, PipelineContext};
pub use emitter::{EmitError, EmitReceipt, Emitter};
pub use error::{ExtractionFailureKind, PipelineError};
pub use pipeline::{Inspection, OutcomeKind, PaperResult, Pipeline, RunOutcome};
pub use signals::{StructuralSignals, TermMarkers};
pub use subtype::{SubtypeError, SubtypeGraph};
pub use validator::{validate, validate_standalone};
