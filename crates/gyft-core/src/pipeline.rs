//! Request-to-result orchestration.
//!
//! One run is: validate, build the prompt, call the gateway once, extract the
//! payload, normalize it. Any failure ends the run; there is no retry and no
//! state is kept between runs.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{GenerationError, Result, SchemaError};
use crate::extract::extract;
use crate::gateway::ModelGateway;
use crate::model::{
    CourseOutline, Generated, GenerationKind, GenerationRequest, QaAnswer, QuizQuestion,
};
use crate::normalize::normalize;
use crate::prompt::build_request_prompt;

/// Runs generation requests against a [`ModelGateway`].
///
/// Cheap to clone; clones share the gateway.
#[derive(Clone)]
pub struct Pipeline {
    gateway: Arc<dyn ModelGateway>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("gateway", &self.gateway.name())
            .finish()
    }
}

impl Pipeline {
    /// Creates a pipeline over `gateway`.
    #[must_use]
    pub fn new(gateway: Arc<dyn ModelGateway>) -> Self {
        Self { gateway }
    }

    /// The gateway this pipeline calls.
    #[must_use]
    pub fn gateway(&self) -> &Arc<dyn ModelGateway> {
        &self.gateway
    }

    /// Runs one request end to end.
    ///
    /// # Errors
    ///
    /// - `Upstream` when the gateway call fails
    /// - `Extraction` when the reply holds no JSON-shaped payload
    /// - `Schema` when the payload is invalid or has the wrong shape
    pub async fn run(&self, request: &GenerationRequest) -> Result<Generated> {
        let kind = request.kind();
        let prompt = build_request_prompt(request);
        debug!(%kind, prompt_len = prompt.len(), gateway = self.gateway.name(), "Calling model");

        let raw = self.gateway.generate(&prompt).await.map_err(|e| {
            warn!(%kind, error_kind = %e.kind, "Model gateway call failed");
            GenerationError::from(e)
        })?;

        let payload = extract(&raw.text).map_err(|e| {
            warn!(%kind, raw_len = raw.text.len(), "Model reply had no JSON payload");
            GenerationError::from(e)
        })?;

        let generated = normalize(kind, &payload.text).map_err(|e| {
            warn!(
                %kind,
                strategy = %payload.strategy,
                error = %e.message,
                "Model payload rejected"
            );
            GenerationError::schema(raw.text.clone(), e)
        })?;

        info!(%kind, strategy = %payload.strategy, "Generation complete");
        Ok(generated)
    }

    /// Validates `text` and runs it as a request of `kind`.
    ///
    /// # Errors
    ///
    /// `Input` for blank text, otherwise as [`Pipeline::run`].
    pub async fn generate(&self, kind: GenerationKind, text: &str) -> Result<Generated> {
        let request = GenerationRequest::new(kind, text)?;
        self.run(&request).await
    }

    /// Generates a course outline for `topic`.
    ///
    /// # Errors
    ///
    /// As [`Pipeline::generate`].
    pub async fn generate_course(&self, topic: &str) -> Result<CourseOutline> {
        match self.generate(GenerationKind::Course, topic).await? {
            Generated::Course(course) => Ok(course),
            other => Err(mismatch(GenerationKind::Course, &other)),
        }
    }

    /// Generates quiz questions from section text.
    ///
    /// # Errors
    ///
    /// As [`Pipeline::generate`].
    pub async fn generate_questions(&self, content: &str) -> Result<Vec<QuizQuestion>> {
        match self.generate(GenerationKind::Questions, content).await? {
            Generated::Questions(questions) => Ok(questions),
            other => Err(mismatch(GenerationKind::Questions, &other)),
        }
    }

    /// Answers a free-form coding question.
    ///
    /// # Errors
    ///
    /// As [`Pipeline::generate`].
    pub async fn answer_question(&self, question: &str) -> Result<QaAnswer> {
        match self.generate(GenerationKind::Qa, question).await? {
            Generated::Answer(answer) => Ok(answer),
            other => Err(mismatch(GenerationKind::Qa, &other)),
        }
    }
}

// Unreachable while normalize() dispatches on the request kind.
fn mismatch(expected: GenerationKind, got: &Generated) -> GenerationError {
    let message = format!(
        "expected a {expected} result, pipeline produced {}",
        got.kind()
    );
    GenerationError::schema(String::new(), SchemaError::new(message, String::new()))
}
