//! Scripted oracle for tests and offline fixtures.
//!
//! Replies are queued per role (and per term for classification). A queue
//! pops until one step remains; the last step then repeats, so a single
//! scripted reply answers every call deterministically.

use crate::protocol::{render_extraction, ClassificationWire, ClassifyPayload, ExtractedTermWire};
use crate::{OracleError, OracleRequest, OracleResponse, PromptRole, TextOracle};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

#[derive(Debug, Clone)]
enum Step {
    Reply(String),
    Fail(OracleError),
}

#[derive(Debug, Default)]
struct Queues {
    extract: VecDeque<Step>,
    classify: HashMap<String, VecDeque<Step>>,
    classify_default: VecDeque<Step>,
}

#[derive(Debug)]
pub struct ScriptedOracle {
    name: String,
    queues: Mutex<Queues>,
    latency: Duration,
    log: Mutex<Vec<OracleRequest>>,
}

impl Default for ScriptedOracle {
    fn default() -> Self {
        Self::new()
    }
}

fn term_key(name: &str) -> String {
    name.trim().to_lowercase()
}

fn next_step(queue: &mut VecDeque<Step>) -> Option<Step> {
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self {
            name: "scripted".to_string(),
            queues: Mutex::new(Queues::default()),
            latency: Duration::ZERO,
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sleep this long inside every call (drives timeout tests).
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn extract_reply(mut self, content: impl Into<String>) -> Self {
        self.queues.get_mut().extract.push_back(Step::Reply(content.into()));
        self
    }

    pub fn extract_terms(self, terms: &[ExtractedTermWire]) -> Self {
        self.extract_reply(render_extraction(terms))
    }

    pub fn extract_error(mut self, error: OracleError) -> Self {
        self.queues.get_mut().extract.push_back(Step::Fail(error));
        self
    }

    pub fn classify_reply(mut self, term: &str, content: impl Into<String>) -> Self {
        self.queues
            .get_mut()
            .classify
            .entry(term_key(term))
            .or_default()
            .push_back(Step::Reply(content.into()));
        self
    }

    pub fn classify_as(self, term: &str, answer: ClassificationWire) -> Self {
        self.classify_reply(term, answer.to_json())
    }

    pub fn classify_error(mut self, term: &str, error: OracleError) -> Self {
        self.queues
            .get_mut()
            .classify
            .entry(term_key(term))
            .or_default()
            .push_back(Step::Fail(error));
        self
    }

    /// Answer for terms without a term-specific script.
    pub fn classify_default(mut self, content: impl Into<String>) -> Self {
        self.queues
            .get_mut()
            .classify_default
            .push_back(Step::Reply(content.into()));
        self
    }

    pub fn classify_default_error(mut self, error: OracleError) -> Self {
        self.queues.get_mut().classify_default.push_back(Step::Fail(error));
        self
    }

    pub fn requests(&self) -> Vec<OracleRequest> {
        self.log.lock().clone()
    }

    pub fn calls(&self, role: PromptRole) -> usize {
        self.log.lock().iter().filter(|r| r.role == role).count()
    }

    fn step_for(&self, request: &OracleRequest) -> Result<Option<Step>, OracleError> {
        let mut queues = self.queues.lock();
        Ok(match request.role {
            PromptRole::Extract => next_step(&mut queues.extract),
            PromptRole::Classify => {
                let payload = ClassifyPayload::from_json(&request.payload)?;
                match queues.classify.get_mut(&term_key(&payload.term)) {
                    Some(queue) if !queue.is_empty() => next_step(queue),
                    _ => next_step(&mut queues.classify_default),
                }
            }
        })
    }
}

#[async_trait]
impl TextOracle for ScriptedOracle {
    async fn call(&self, request: &OracleRequest) -> Result<OracleResponse, OracleError> {
        self.log.lock().push(request.clone());
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        match self.step_for(request)? {
            Some(Step::Reply(content)) => Ok(OracleResponse::new(content)),
            Some(Step::Fail(error)) => Err(error),
            None => Err(OracleError::Malformed(format!(
                "no scripted reply for {} request",
                request.role
            ))),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify_request(term: &str) -> OracleRequest {
        OracleRequest::classify(&ClassifyPayload::new(term, "", vec![], vec![]))
    }

    #[tokio::test]
    async fn last_step_repeats() {
        let oracle = ScriptedOracle::new()
            .extract_error(OracleError::Network("x".into()))
            .extract_reply("ok");

        let req = OracleRequest::extract("t");
        assert!(oracle.call(&req).await.is_err());
        assert_eq!(oracle.call(&req).await.unwrap().content, "ok");
        assert_eq!(oracle.call(&req).await.unwrap().content, "ok");
        assert_eq!(oracle.calls(PromptRole::Extract), 3);
    }

    #[tokio::test]
    async fn classify_routes_by_term_then_default() {
        let oracle = ScriptedOracle::new()
            .classify_as("Learner", ClassificationWire::new("entity"))
            .classify_default(ClassificationWire::new("property").to_json());

        let learner = oracle.call(&classify_request("learner")).await.unwrap();
        assert!(learner.content.contains("entity"));
        let other = oracle.call(&classify_request("Motivation")).await.unwrap();
        assert!(other.content.contains("property"));
    }

    #[tokio::test]
    async fn unscripted_role_is_malformed() {
        let oracle = ScriptedOracle::new();
        let err = oracle.call(&OracleRequest::extract("t")).await.unwrap_err();
        assert!(matches!(err, OracleError::Malformed(_)));
    }
}
