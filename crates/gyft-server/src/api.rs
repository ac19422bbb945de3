//! HTTP API for course generation and the course catalog.
//!
//! # Endpoints
//!
//! - `GET /api/health` - Liveness probe
//! - `POST /api/ai/generate-course` - Generate a course outline
//! - `POST /api/ai/generate-questions` - Generate quiz questions
//! - `POST /api/ai/qa` - Answer a coding question
//! - `POST /api/courses/generate` - Generate and store a course
//! - `GET /api/courses` - List the caller's courses
//! - `GET /api/courses/public` - Search public courses
//! - `GET /api/courses/categories` - List public course languages
//! - `GET|PATCH|DELETE /api/courses/:id` - Read, change visibility, delete
//! - `POST /api/courses/:id/like` - Toggle a like
//! - `POST /api/courses/:id/install` - Copy a public course
//! - `POST /api/courses/:id/quiz` - Generate questions for one section
//!
//! Callers identify themselves with the `x-user-id` header.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use gyft_core::Pipeline;
//! use gyft_gemini::GeminiGateway;
//! use gyft_server::{create_router, AppState, Config};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let gateway = GeminiGateway::new(config.gemini_settings(config.api_key()?))?;
//! let state = AppState::new(config, Pipeline::new(Arc::new(gateway)));
//!
//! let router = create_router(state);
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//! axum::serve(listener, router).await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use gyft_core::{CourseOutline, GenerationError, Pipeline, QaAnswer, QuizQuestion, UpstreamKind};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::catalog::{
    CourseCatalog, CoursePage, LikeStatus, NewCourse, PublicQuery, SortOrder, StoredCourse,
};
use crate::error::ServerError;
use crate::Config;

/// Header naming the calling user.
pub const USER_HEADER: &str = "x-user-id";

/// Author name stored when a request gives none.
const DEFAULT_AUTHOR: &str = "Anonymous";

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for the `/api/ai/*` endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PromptRequest {
    /// Topic, section text or question.
    #[serde(default)]
    pub prompt: String,
}

/// Response body for `POST /api/ai/generate-course`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseResponse {
    /// The normalized outline.
    pub course: CourseOutline,
}

/// Response body for question generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionsResponse {
    /// At most three questions.
    pub questions: Vec<QuizQuestion>,
}

/// Response body for `POST /api/ai/qa`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerResponse {
    /// The normalized answer.
    pub answer: QaAnswer,
}

/// Request body for `POST /api/courses/generate`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateCourseRequest {
    /// What the course should teach.
    #[serde(default)]
    pub topic: String,
    /// List the course publicly.
    #[serde(default)]
    pub is_public: bool,
    /// Display name of the author.
    #[serde(default)]
    pub author_name: Option<String>,
}

/// Request body for `PATCH /api/courses/:id`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityRequest {
    /// New visibility.
    pub is_public: bool,
}

/// Request body for `POST /api/courses/:id/quiz`.
#[derive(Debug, Clone, Deserialize)]
pub struct QuizRequest {
    /// Chapter index.
    pub chapter: usize,
    /// Section index within the chapter.
    pub section: usize,
}

/// Query string for `GET /api/courses/public`.
///
/// Values are parsed leniently; anything unparseable falls back to the
/// default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicParams {
    /// Free-text search.
    pub search: Option<String>,
    /// Exact language.
    pub category: Option<String>,
    /// `newest`, `oldest`, `likes` or `popular`.
    pub sort_by: Option<String>,
    /// 1-based page number.
    pub page: Option<String>,
    /// Page size.
    pub limit: Option<String>,
}

impl PublicParams {
    fn into_query(self) -> PublicQuery {
        PublicQuery {
            search: self.search,
            category: self.category,
            sort: self
                .sort_by
                .as_deref()
                .map(SortOrder::from_str_lenient)
                .unwrap_or_default(),
            page: self.page.and_then(|p| p.trim().parse().ok()),
            limit: self.limit.and_then(|l| l.trim().parse().ok()),
        }
    }
}

/// Response body for `GET /api/health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `ok`.
    pub status: String,
}

/// Response body for `DELETE /api/courses/:id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    /// Always `true`.
    pub deleted: bool,
}

/// Error response body returned on failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Description of the error.
    pub error: String,
    /// Error tag for generation failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// The model reply, when it could not be used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
    /// The extracted payload, when it failed validation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted: Option<String>,
}

// ============================================================================
// Application State
// ============================================================================

/// Shared application state for the HTTP server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Config,
    /// Generation pipeline.
    pub pipeline: Pipeline,
    /// Stored courses.
    pub catalog: Arc<CourseCatalog>,
}

impl AppState {
    /// Creates state with an empty catalog sized from `config`.
    #[must_use]
    pub fn new(config: Config, pipeline: Pipeline) -> Self {
        let catalog = CourseCatalog::new(
            config.catalog.default_page_size,
            config.catalog.max_page_size,
        );
        Self::with_catalog(config, pipeline, Arc::new(catalog))
    }

    /// Creates state around an existing catalog.
    #[must_use]
    pub fn with_catalog(config: Config, pipeline: Pipeline, catalog: Arc<CourseCatalog>) -> Self {
        Self {
            config,
            pipeline,
            catalog,
        }
    }
}

// ============================================================================
// API Error Type
// ============================================================================

/// Internal error type for API handlers.
#[derive(Debug)]
enum ApiError {
    /// The pipeline failed.
    Generation(GenerationError),
    /// A catalog operation failed.
    Catalog(ServerError),
    /// No `x-user-id` header.
    Unauthorized,
    /// A section index was out of range.
    SectionNotFound { chapter: usize, section: usize },
}

impl From<GenerationError> for ApiError {
    fn from(e: GenerationError) -> Self {
        Self::Generation(e)
    }
}

impl From<ServerError> for ApiError {
    fn from(e: ServerError) -> Self {
        Self::Catalog(e)
    }
}

fn generation_status(error: &GenerationError) -> StatusCode {
    match error {
        GenerationError::Input { .. } => StatusCode::BAD_REQUEST,
        GenerationError::Upstream(e) if e.kind == UpstreamKind::Timeout => {
            StatusCode::GATEWAY_TIMEOUT
        }
        GenerationError::Upstream(_) => StatusCode::BAD_GATEWAY,
        GenerationError::Extraction(_) | GenerationError::Schema { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::Generation(e) => (
                generation_status(&e),
                ErrorResponse {
                    error: e.to_string(),
                    kind: Some(e.tag().to_string()),
                    raw: e.raw_text().map(str::to_string),
                    extracted: e.extracted_text().map(str::to_string),
                },
            ),
            Self::Catalog(e) => {
                let status = match e {
                    ServerError::CourseNotFound { .. } => StatusCode::NOT_FOUND,
                    ServerError::CourseForbidden { .. } => StatusCode::FORBIDDEN,
                    ServerError::AlreadyInstalled { .. } => StatusCode::CONFLICT,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (
                    status,
                    ErrorResponse {
                        error: e.to_string(),
                        ..Default::default()
                    },
                )
            }
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse {
                    error: format!("Missing {USER_HEADER} header"),
                    ..Default::default()
                },
            ),
            Self::SectionNotFound { chapter, section } => (
                StatusCode::NOT_FOUND,
                ErrorResponse {
                    error: format!("Section {section} of chapter {chapter} not found"),
                    ..Default::default()
                },
            ),
        };

        (status, Json(body)).into_response()
    }
}

/// The calling user, from [`USER_HEADER`].
fn caller(headers: &HeaderMap) -> Option<String> {
    headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn require_caller(headers: &HeaderMap) -> Result<String, ApiError> {
    caller(headers).ok_or(ApiError::Unauthorized)
}

// ============================================================================
// Router Setup
// ============================================================================

/// Creates the HTTP router with all API endpoints.
///
/// All routes sit under `/api`, behind permissive CORS and request tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let ai_routes = Router::new()
        .route("/generate-course", post(handle_generate_course))
        .route("/generate-questions", post(handle_generate_questions))
        .route("/qa", post(handle_qa));

    let course_routes = Router::new()
        .route("/", get(handle_list_owned))
        .route("/generate", post(handle_create_course))
        .route("/public", get(handle_list_public))
        .route("/categories", get(handle_categories))
        .route(
            "/:id",
            get(handle_get_course)
                .patch(handle_set_visibility)
                .delete(handle_delete_course),
        )
        .route("/:id/like", post(handle_like))
        .route("/:id/install", post(handle_install))
        .route("/:id/quiz", post(handle_section_quiz));

    let api_routes = Router::new()
        .route("/health", get(handle_health))
        .nest("/ai", ai_routes)
        .nest("/courses", course_routes);

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::new(state))
}

// ============================================================================
// Generation Handlers
// ============================================================================

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Handler for `POST /api/ai/generate-course`.
async fn handle_generate_course(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PromptRequest>,
) -> Result<Json<CourseResponse>, ApiError> {
    info!(prompt_len = request.prompt.len(), "Course generation requested");
    let course = state.pipeline.generate_course(&request.prompt).await?;
    Ok(Json(CourseResponse { course }))
}

/// Handler for `POST /api/ai/generate-questions`.
async fn handle_generate_questions(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PromptRequest>,
) -> Result<Json<QuestionsResponse>, ApiError> {
    info!(prompt_len = request.prompt.len(), "Question generation requested");
    let questions = state.pipeline.generate_questions(&request.prompt).await?;
    Ok(Json(QuestionsResponse { questions }))
}

/// Handler for `POST /api/ai/qa`.
async fn handle_qa(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PromptRequest>,
) -> Result<Json<AnswerResponse>, ApiError> {
    info!(prompt_len = request.prompt.len(), "Question answering requested");
    let answer = state.pipeline.answer_question(&request.prompt).await?;
    Ok(Json(AnswerResponse { answer }))
}

// ============================================================================
// Catalog Handlers
// ============================================================================

/// Handler for `POST /api/courses/generate`.
///
/// Generates first and stores after; a failed generation stores nothing.
async fn handle_create_course(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<GenerateCourseRequest>,
) -> Result<Json<StoredCourse>, ApiError> {
    let user = require_caller(&headers)?;
    let topic = request.topic.trim().to_string();

    let outline = state.pipeline.generate_course(&topic).await.map_err(|e| {
        warn!(user = %user, kind = e.tag(), "Course generation failed");
        e
    })?;

    let author_name = request
        .author_name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| DEFAULT_AUTHOR.to_string());

    let course = state
        .catalog
        .insert(NewCourse {
            owner_id: user,
            author_name,
            topic,
            is_public: request.is_public,
            outline,
        })
        .await;
    Ok(Json(course))
}

/// Handler for `GET /api/courses`.
async fn handle_list_owned(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<StoredCourse>>, ApiError> {
    let user = require_caller(&headers)?;
    Ok(Json(state.catalog.list_owned(&user).await))
}

/// Handler for `GET /api/courses/public`.
async fn handle_list_public(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PublicParams>,
) -> Json<CoursePage> {
    Json(state.catalog.list_public(&params.into_query()).await)
}

/// Handler for `GET /api/courses/categories`.
async fn handle_categories(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(state.catalog.categories().await)
}

/// Handler for `GET /api/courses/:id`.
async fn handle_get_course(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<StoredCourse>, ApiError> {
    let viewer = caller(&headers);
    Ok(Json(state.catalog.get(&id, viewer.as_deref()).await?))
}

/// Handler for `PATCH /api/courses/:id`.
async fn handle_set_visibility(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<VisibilityRequest>,
) -> Result<Json<StoredCourse>, ApiError> {
    let user = require_caller(&headers)?;
    let course = state
        .catalog
        .set_visibility(&id, &user, request.is_public)
        .await?;
    Ok(Json(course))
}

/// Handler for `DELETE /api/courses/:id`.
async fn handle_delete_course(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<DeleteResponse>, ApiError> {
    let user = require_caller(&headers)?;
    state.catalog.remove(&id, &user).await?;
    Ok(Json(DeleteResponse { deleted: true }))
}

/// Handler for `POST /api/courses/:id/like`.
async fn handle_like(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<LikeStatus>, ApiError> {
    let user = require_caller(&headers)?;
    Ok(Json(state.catalog.toggle_like(&id, &user).await?))
}

/// Handler for `POST /api/courses/:id/install`.
async fn handle_install(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<StoredCourse>, ApiError> {
    let user = require_caller(&headers)?;
    Ok(Json(state.catalog.install(&id, &user).await?))
}

/// Handler for `POST /api/courses/:id/quiz`.
///
/// Renders the chosen section and generates questions from it.
async fn handle_section_quiz(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<QuizRequest>,
) -> Result<Json<QuestionsResponse>, ApiError> {
    let viewer = caller(&headers);
    let course = state.catalog.get(&id, viewer.as_deref()).await?;

    let source = course
        .outline
        .section(request.chapter, request.section)
        .map(gyft_core::Section::quiz_source)
        .ok_or(ApiError::SectionNotFound {
            chapter: request.chapter,
            section: request.section,
        })?;

    info!(
        course_id = %id,
        chapter = request.chapter,
        section = request.section,
        "Section quiz requested"
    );
    let questions = state.pipeline.generate_questions(&source).await?;
    Ok(Json(QuestionsResponse { questions }))
}
