//! Error types for the Gyft server.
//!
//! Covers startup (configuration, credentials, binding) and catalog
//! operations. Generation failures stay in [`gyft_core::GenerationError`].

use std::path::PathBuf;

/// A specialized `Result` type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Errors that can occur while starting or running the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid JSON syntax in configuration file.
    #[error("Invalid JSON in config file '{path}': {message}\n\nSuggestion: Validate your gyft.json with a JSON linter")]
    ConfigParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Invalid configuration: {message}\n\nSuggestion: {suggestion}")]
    ConfigValidationError {
        /// Description of the validation failure.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    /// The model API key is not set.
    #[error("Missing model API key: environment variable '{var}' is not set or empty\n\nSuggestion: Export {var}=<your key> or point gateway.apiKeyEnv in gyft.json at another variable")]
    MissingCredential {
        /// Name of the environment variable that was read.
        var: String,
    },

    /// The model gateway could not be constructed.
    #[error("Failed to initialize model gateway: {message}")]
    GatewayInit {
        /// Details from the gateway.
        message: String,
    },

    // ========================================================================
    // Startup Errors
    // ========================================================================
    /// The listener could not bind to the configured address.
    #[error("Failed to bind {addr}: {message}\n\nSuggestion: Choose another port with --port or stop the process using it")]
    BindFailed {
        /// Address that was requested.
        addr: String,
        /// Description of the failure.
        message: String,
    },

    // ========================================================================
    // Catalog Errors
    // ========================================================================
    /// No course exists with the given id.
    #[error("Course not found: '{id}'")]
    CourseNotFound {
        /// Requested course id.
        id: String,
    },

    /// The course exists but the caller may not act on it.
    #[error("Course '{id}' is not available to this user")]
    CourseForbidden {
        /// Requested course id.
        id: String,
    },

    /// The user already installed this course.
    #[error("Course '{id}' is already installed")]
    AlreadyInstalled {
        /// Source course id.
        id: String,
    },

    // ========================================================================
    // General I/O Errors
    // ========================================================================
    /// General I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ServerError {
    /// Creates a new `ConfigParseError` with the given path and message.
    #[must_use]
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ConfigValidationError` with the given message and suggestion.
    #[must_use]
    pub fn config_validation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConfigValidationError {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Creates a new `MissingCredential` error.
    #[must_use]
    pub fn missing_credential(var: impl Into<String>) -> Self {
        Self::MissingCredential { var: var.into() }
    }

    /// Creates a new `BindFailed` error.
    #[must_use]
    pub fn bind_failed(addr: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BindFailed {
            addr: addr.into(),
            message: message.into(),
        }
    }

    /// Creates a new `CourseNotFound` error.
    #[must_use]
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::CourseNotFound { id: id.into() }
    }

    /// Creates a new `CourseForbidden` error.
    #[must_use]
    pub fn forbidden(id: impl Into<String>) -> Self {
        Self::CourseForbidden { id: id.into() }
    }

    /// Creates a new `AlreadyInstalled` error.
    #[must_use]
    pub fn already_installed(id: impl Into<String>) -> Self {
        Self::AlreadyInstalled { id: id.into() }
    }

    /// Returns `true` if this error must stop the process at startup.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConfigParseError { .. }
                | Self::ConfigValidationError { .. }
                | Self::MissingCredential { .. }
                | Self::GatewayInit { .. }
                | Self::BindFailed { .. }
        )
    }
}
