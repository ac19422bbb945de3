//! Error types for the generation pipeline.
//!
//! The taxonomy keeps "the model could not be reached" apart from "the model
//! replied with something we could not use", so callers can map each case to
//! its own transport-level response without losing the distinction.

/// A specialized `Result` type for pipeline operations.
pub type Result<T> = std::result::Result<T, GenerationError>;

/// Errors that can occur while turning a request into a normalized result.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    // ========================================================================
    // Input Errors
    // ========================================================================
    /// The user text was empty after trimming.
    ///
    /// Raised before the gateway is called.
    #[error("Invalid input: {message}")]
    Input {
        /// What was wrong with the input.
        message: String,
    },

    // ========================================================================
    // Upstream Errors
    // ========================================================================
    /// The model gateway failed. Never retried by the pipeline.
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    // ========================================================================
    // Response Errors
    // ========================================================================
    /// No JSON-shaped payload could be located in the model reply.
    #[error("{0}")]
    Extraction(#[from] ExtractionError),

    /// A payload was extracted but is not valid JSON of the expected shape.
    #[error("{error}")]
    Schema {
        /// The complete model reply.
        raw: String,
        /// Details, including the extracted text.
        #[source]
        error: SchemaError,
    },
}

impl GenerationError {
    /// Creates a new `Input` error.
    #[must_use]
    pub fn input(message: impl Into<String>) -> Self {
        Self::Input {
            message: message.into(),
        }
    }

    /// Creates a new `Schema` error with the raw reply attached.
    #[must_use]
    pub fn schema(raw: impl Into<String>, error: SchemaError) -> Self {
        Self::Schema {
            raw: raw.into(),
            error,
        }
    }

    /// Stable machine-readable tag for this error.
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::Input { .. } => "input_error",
            Self::Upstream(_) => "upstream_error",
            Self::Extraction(_) => "extraction_error",
            Self::Schema { .. } => "schema_error",
        }
    }

    /// The raw model reply, when the failure happened after the gateway call.
    #[must_use]
    pub fn raw_text(&self) -> Option<&str> {
        match self {
            Self::Extraction(e) => Some(&e.raw),
            Self::Schema { raw, .. } => Some(raw),
            Self::Input { .. } | Self::Upstream(_) => None,
        }
    }

    /// The extracted payload, for schema failures.
    #[must_use]
    pub fn extracted_text(&self) -> Option<&str> {
        match self {
            Self::Schema { error, .. } => Some(&error.extracted),
            _ => None,
        }
    }
}

// ============================================================================
// Upstream
// ============================================================================

/// Categories of model gateway failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamKind {
    /// Invalid or missing credentials.
    Authentication,
    /// Rate limit exceeded.
    RateLimit,
    /// Server error (5xx responses).
    Server,
    /// Network connectivity issues.
    Network,
    /// The request did not complete in time.
    Timeout,
    /// The reply lacked the expected text field.
    MalformedPayload,
    /// Other unclassified errors.
    Other,
}

impl std::fmt::Display for UpstreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication"),
            Self::RateLimit => write!(f, "rate_limit"),
            Self::Server => write!(f, "server"),
            Self::Network => write!(f, "network"),
            Self::Timeout => write!(f, "timeout"),
            Self::MalformedPayload => write!(f, "malformed_payload"),
            Self::Other => write!(f, "other"),
        }
    }
}

impl UpstreamKind {
    /// Returns a suggestion message for this error kind.
    #[must_use]
    pub const fn suggestion(&self) -> &'static str {
        match self {
            Self::Authentication => "Check the API key environment variable",
            Self::RateLimit => "Wait and retry, or reduce request frequency",
            Self::Server | Self::MalformedPayload => {
                "Retry later; the model service may be experiencing issues"
            }
            Self::Network => "Check your network connection and the gateway endpoint",
            Self::Timeout => "Retry, or raise gateway.timeoutSecs in gyft.json",
            Self::Other => "Check the model provider's status page",
        }
    }
}

/// A failed model gateway call.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Model gateway error ({kind}): {message}\n\nSuggestion: {}", .kind.suggestion())]
pub struct UpstreamError {
    /// What went wrong.
    pub kind: UpstreamKind,
    /// Details from the transport or the provider.
    pub message: String,
}

impl UpstreamError {
    /// Creates a new upstream error.
    #[must_use]
    pub fn new(kind: UpstreamKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

// ============================================================================
// Extraction and schema
// ============================================================================

/// No payload substring could be found in a model reply.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("No JSON payload found in model response ({} chars)", .raw.chars().count())]
pub struct ExtractionError {
    /// The complete model reply, kept for diagnosis.
    pub raw: String,
}

/// An extracted payload that could not be normalized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Model payload did not match the expected shape: {message}")]
pub struct SchemaError {
    /// Why the payload was rejected.
    pub message: String,
    /// The extracted text that was rejected.
    pub extracted: String,
}

impl SchemaError {
    /// Creates a new schema error.
    #[must_use]
    pub fn new(message: impl Into<String>, extracted: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            extracted: extracted.into(),
        }
    }
}
