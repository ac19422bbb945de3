//! Gemini model gateway
//!
//! Implements [`ModelGateway`] over the `generateContent` REST endpoint.

use std::time::Duration;

use async_trait::async_trait;
use gyft_core::{ModelGateway, RawModelResponse, UpstreamError, UpstreamKind};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Header carrying the API key. Keeps the key out of URLs and access logs.
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Longest provider error body quoted in an [`UpstreamError`].
const MAX_ERROR_BODY: usize = 500;

/// Connection settings for [`GeminiGateway`].
#[derive(Clone)]
pub struct GeminiSettings {
    /// Base URL, e.g. `https://generativelanguage.googleapis.com/v1beta`.
    pub endpoint: String,
    /// Model name, e.g. `gemini-2.0-flash`.
    pub model: String,
    /// API key sent with every request.
    pub api_key: String,
    /// Whole-request timeout.
    pub timeout: Duration,
}

impl std::fmt::Debug for GeminiSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiSettings")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: [RequestContent<'a>; 1],
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: [RequestPart<'a>; 1],
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

fn request_body(prompt: &str) -> GenerateRequest<'_> {
    GenerateRequest {
        contents: [RequestContent {
            parts: [RequestPart { text: prompt }],
        }],
    }
}

/// Pulls the reply text out of a `generateContent` response body.
///
/// Text parts of the first candidate are concatenated. A body with no
/// candidate, no content or no text part is a malformed payload.
fn parse_reply(body: &str) -> Result<String, UpstreamError> {
    let response: GenerateResponse = serde_json::from_str(body).map_err(|e| {
        UpstreamError::new(
            UpstreamKind::MalformedPayload,
            format!("Response is not valid JSON: {e}"),
        )
    })?;

    let parts = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts)
        .unwrap_or_default();

    let texts: Vec<String> = parts.into_iter().filter_map(|p| p.text).collect();
    if texts.is_empty() {
        return Err(UpstreamError::new(
            UpstreamKind::MalformedPayload,
            "Response has no candidates[0].content.parts[].text",
        ));
    }
    Ok(texts.concat())
}

/// Maps a non-success HTTP status to an upstream error kind.
fn classify_status(status: StatusCode) -> UpstreamKind {
    match status.as_u16() {
        401 | 403 => UpstreamKind::Authentication,
        429 => UpstreamKind::RateLimit,
        500..=599 => UpstreamKind::Server,
        _ => UpstreamKind::Other,
    }
}

fn classify_transport(error: &reqwest::Error) -> UpstreamKind {
    if error.is_timeout() {
        UpstreamKind::Timeout
    } else if error.is_connect() || error.is_request() {
        UpstreamKind::Network
    } else {
        UpstreamKind::Other
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

// ============================================================================
// Gateway
// ============================================================================

/// Calls Gemini's `generateContent` once per prompt.
#[derive(Clone)]
pub struct GeminiGateway {
    client: Client,
    url: String,
    model: String,
    api_key: String,
}

impl std::fmt::Debug for GeminiGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiGateway")
            .field("url", &self.url)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl GeminiGateway {
    /// Builds the HTTP client for `settings`.
    ///
    /// # Errors
    ///
    /// Returns an `Other` upstream error if the TLS backend cannot be
    /// initialized.
    pub fn new(settings: GeminiSettings) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| {
                UpstreamError::new(
                    UpstreamKind::Other,
                    format!("Failed to build HTTP client: {e}"),
                )
            })?;

        let url = format!(
            "{}/models/{}:generateContent",
            settings.endpoint.trim_end_matches('/'),
            settings.model
        );

        Ok(Self {
            client,
            url,
            model: settings.model,
            api_key: settings.api_key,
        })
    }

    /// Full request URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ModelGateway for GeminiGateway {
    async fn generate(&self, prompt: &str) -> Result<RawModelResponse, UpstreamError> {
        debug!(model = %self.model, prompt_len = prompt.len(), "Sending generateContent request");

        let response = self
            .client
            .post(&self.url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request_body(prompt))
            .send()
            .await
            .map_err(|e| {
                let kind = classify_transport(&e);
                warn!(model = %self.model, %kind, "Gemini request failed");
                UpstreamError::new(kind, e.to_string())
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            UpstreamError::new(
                classify_transport(&e),
                format!("Failed to read response body: {e}"),
            )
        })?;

        if !status.is_success() {
            let kind = classify_status(status);
            warn!(
                model = %self.model,
                status = status.as_u16(),
                %kind,
                "Gemini returned an error status"
            );
            return Err(UpstreamError::new(
                kind,
                format!("HTTP {status}: {}", truncate(&body, MAX_ERROR_BODY)),
            ));
        }

        let text = parse_reply(&body)?;
        debug!(model = %self.model, reply_len = text.len(), "Received model reply");
        Ok(RawModelResponse::new(text))
    }

    fn name(&self) -> &str {
        &self.model
    }
}
