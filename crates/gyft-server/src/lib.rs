//! Gyft server
//!
//! Configuration, the in-memory course catalog, and the HTTP API that
//! exposes course, quiz and Q&A generation.

use std::sync::Arc;

use gyft_core::Pipeline;
use gyft_gemini::GeminiGateway;
use tracing::info;

pub mod api;
pub mod catalog;
pub mod config;
pub mod error;

pub use api::{
    create_router, AnswerResponse, AppState, CourseResponse, ErrorResponse, GenerateCourseRequest,
    PromptRequest, PublicParams, QuestionsResponse, QuizRequest, USER_HEADER,
};
pub use catalog::{
    CourseCatalog, CoursePage, LikeStatus, NewCourse, PublicQuery, SortOrder, StoredCourse,
};
pub use config::{CatalogConfig, Config, GatewayConfig, ServerConfig};
pub use error::{Result, ServerError};

/// Builds the production pipeline over Gemini.
///
/// Reads the API key first, so a missing credential stops startup before
/// anything else happens.
///
/// # Errors
///
/// `MissingCredential` when the key variable is unset or blank, and
/// `GatewayInit` when the HTTP client cannot be built.
pub fn gemini_pipeline(config: &Config) -> Result<Pipeline> {
    let api_key = config.api_key()?;
    let gateway = GeminiGateway::new(config.gemini_settings(api_key)).map_err(|e| {
        ServerError::GatewayInit {
            message: e.to_string(),
        }
    })?;

    info!(
        model = %config.gateway.model,
        endpoint = %config.gateway.endpoint,
        timeout_secs = config.gateway.timeout_secs,
        "Model gateway ready"
    );
    Ok(Pipeline::new(Arc::new(gateway)))
}
