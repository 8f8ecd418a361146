//! Corpus runs: many independent paper pipelines at once.
//!
//! Each paper is its own task on a `JoinSet`, admitted through a semaphore
//! sized by `batch.paper_concurrency`. The only state the tasks share is the
//! oracle client's rate gate and breaker. Cancelling a paper aborts its task
//! at whatever oracle call it is waiting on; the others keep running.
//!
//! Output file stems are assigned up front so that papers whose citations
//! slug alike never overwrite each other.

use crate::context::Paper;
use crate::emitter::{slug, unique_stems};
use crate::error::PipelineError;
use crate::pipeline::{OutcomeKind, PaperResult, Pipeline, RunOutcome};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{AbortHandle, JoinSet};
use tracing::{info, warn};
use uuid::Uuid;

/// Cancels one paper of a running batch.
#[derive(Debug)]
pub struct PaperHandle {
    index: usize,
    citation: String,
    abort: AbortHandle,
}

impl PaperHandle {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn citation(&self) -> &str {
        &self.citation
    }

    pub fn cancel(&self) {
        info!(index = self.index, citation = %self.citation, "cancelling paper");
        self.abort.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.abort.is_finished()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total: usize,
    pub succeeded: usize,
    pub partial: usize,
    pub hard_failed: usize,
    /// Papers whose task was aborted before producing a result. Also counted
    /// in `hard_failed`.
    pub cancelled: usize,
}

#[derive(Debug)]
pub struct BatchReport {
    /// In completion order; cancelled papers come last, by index.
    pub results: Vec<PaperResult>,
    pub summary: BatchSummary,
}

impl BatchReport {
    pub fn result(&self, index: usize) -> Option<&PaperResult> {
        self.results.iter().find(|r| r.index == index)
    }
}

#[derive(Debug, Clone)]
pub struct BatchRunner {
    pipeline: Pipeline,
    concurrency: usize,
}

impl BatchRunner {
    pub fn new(pipeline: Pipeline) -> Self {
        let concurrency = pipeline.config().batch.paper_concurrency.max(1);
        Self {
            pipeline,
            concurrency,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Start every paper. Must be called inside a tokio runtime.
    pub fn spawn(&self, papers: Vec<Paper>) -> Batch {
        let started_at = Utc::now();
        let gate = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        let mut handles = Vec::with_capacity(papers.len());

        info!(papers = papers.len(), concurrency = self.concurrency, "batch started");
        let stems = unique_stems(papers.iter().map(|p| p.citation.as_str()));
        for (index, (paper, stem)) in papers.into_iter().zip(stems).enumerate() {
            let citation = paper.citation.clone();
            if stem != slug(&citation) {
                warn!(index, citation = %citation, stem = %stem, "output name collides; emitting under a suffixed name");
            }
            let pipeline = self.pipeline.clone();
            let gate = gate.clone();
            let abort = tasks.spawn(async move {
                match gate.acquire_owned().await {
                    Ok(_permit) => pipeline.run_indexed(index, paper, stem).await,
                    Err(_) => PaperResult {
                        index,
                        run_id: Uuid::nil(),
                        citation: paper.citation,
                        outcome: RunOutcome::hard_fail(PipelineError::Cancelled),
                    },
                }
            });
            handles.push(PaperHandle {
                index,
                citation,
                abort,
            });
        }

        Batch {
            tasks,
            handles,
            started_at,
        }
    }

    /// Run every paper to completion.
    pub async fn run(&self, papers: Vec<Paper>) -> BatchReport {
        self.spawn(papers).join().await
    }
}

/// A running batch.
#[derive(Debug)]
pub struct Batch {
    tasks: JoinSet<PaperResult>,
    handles: Vec<PaperHandle>,
    started_at: DateTime<Utc>,
}

impl Batch {
    pub fn handles(&self) -> &[PaperHandle] {
        &self.handles
    }

    pub fn handle(&self, index: usize) -> Option<&PaperHandle> {
        self.handles.get(index)
    }

    /// Cancel one paper; false if no such paper.
    pub fn cancel(&self, index: usize) -> bool {
        match self.handles.get(index) {
            Some(handle) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }

    /// Wait for every paper and summarize.
    pub async fn join(mut self) -> BatchReport {
        let mut results = Vec::with_capacity(self.handles.len());
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(err) if err.is_cancelled() => {}
                Err(err) => warn!(error = %err, "paper task did not complete"),
            }
        }

        let finished: BTreeSet<usize> = results.iter().map(|r| r.index).collect();
        let mut cancelled = 0;
        for handle in self.handles.iter().filter(|h| !finished.contains(&h.index)) {
            cancelled += 1;
            results.push(PaperResult {
                index: handle.index,
                run_id: Uuid::nil(),
                citation: handle.citation.clone(),
                outcome: RunOutcome::hard_fail(PipelineError::Cancelled),
            });
        }

        let count = |kind: OutcomeKind| results.iter().filter(|r| r.outcome.kind() == kind).count();
        let summary = BatchSummary {
            started_at: self.started_at,
            finished_at: Utc::now(),
            total: self.handles.len(),
            succeeded: count(OutcomeKind::Success),
            partial: count(OutcomeKind::Partial),
            hard_failed: count(OutcomeKind::HardFail),
            cancelled,
        };
        info!(
            total = summary.total,
            succeeded = summary.succeeded,
            partial = summary.partial,
            hard_failed = summary.hard_failed,
            cancelled = summary.cancelled,
            "batch finished"
        );

        BatchReport { results, summary }
    }
}
