//! Gyft generation core
//!
//! Builds prompts for course, quiz and Q&A generation, and turns free-form
//! model replies into validated domain types.

pub mod error;
pub mod extract;
pub mod gateway;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod prompt;

pub use error::{
    ExtractionError, GenerationError, Result, SchemaError, UpstreamError, UpstreamKind,
};
pub use extract::{extract, ExtractedPayload, ExtractionStrategy};
pub use gateway::ModelGateway;
pub use model::{
    Chapter, ContentBlock, CourseOutline, Generated, GenerationKind, GenerationRequest, QaAnswer,
    QuizQuestion, RawModelResponse, Section, OPTION_COUNT,
};
pub use normalize::{normalize, normalize_answer, normalize_course, normalize_questions, Field};
pub use pipeline::Pipeline;
pub use prompt::{build_prompt, build_request_prompt, QUESTIONS_PER_QUIZ};
