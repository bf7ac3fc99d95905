//! Error types for the Égua tutor.
//!
//! This module defines the error hierarchy for all tutor operations,
//! including configuration loading, lesson catalog parsing, progress
//! persistence and feedback generation.

use std::path::PathBuf;

/// A specialized `Result` type for tutor operations.
pub type Result<T> = std::result::Result<T, TutorError>;

/// Errors that can occur while serving lessons and grading submissions.
///
/// Variants are grouped by the part of the tutor that raises them. Most
/// display messages end with a hint on how to fix the problem.
#[derive(Debug, thiserror::Error)]
pub enum TutorError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// `egua.json` is not valid JSON.
    #[error("Invalid JSON in config file '{path}': {message}\n\nSuggestion: Validate your egua.json with a JSON linter")]
    ConfigParseError {
        /// Config file that failed to parse.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// A config value is out of range or empty.
    #[error("Invalid configuration: {message}\n\nSuggestion: {suggestion}")]
    ConfigValidationError {
        /// Which value is wrong.
        message: String,
        /// How to fix it.
        suggestion: String,
    },

    // ========================================================================
    // Lesson Catalog Errors
    // ========================================================================
    /// Lesson catalog file was not found at the specified path.
    #[error("Lesson catalog not found: '{path}'\n\nSuggestion: Check the 'lessons' field in egua.json or remove it to use the built-in lessons")]
    CatalogNotFound {
        /// Path where the catalog was expected.
        path: PathBuf,
    },

    /// Lesson catalog exceeds the size limit.
    #[error("Lesson catalog exceeds size limit (1024KB): '{path}' is {size_kb}KB\n\nSuggestion: Split the catalog or remove embedded content")]
    CatalogTooLarge {
        /// Path to the oversized catalog.
        path: PathBuf,
        /// File size in KiB.
        size_kb: u64,
    },

    /// Lesson catalog contains non-UTF-8 content.
    #[error("Lesson catalog has invalid encoding: '{path}'\n\nSuggestion: Convert the file to UTF-8 encoding")]
    CatalogEncodingError {
        /// Path to the catalog with encoding issues.
        path: PathBuf,
    },

    /// Lesson catalog is not valid JSON or violates catalog rules.
    #[error("Invalid lesson catalog '{source_name}': {message}")]
    CatalogInvalid {
        /// File path, or `<built-in>` for the embedded catalog.
        source_name: String,
        /// Description of the problem.
        message: String,
    },

    /// No lesson with the given id.
    #[error("Lesson not found: '{id}'")]
    LessonNotFound {
        /// Requested lesson id.
        id: String,
    },

    /// No exercise with the given id.
    #[error("Exercise not found: '{id}'")]
    ExerciseNotFound {
        /// Requested exercise id.
        id: String,
    },

    // ========================================================================
    // Persistence Errors
    // ========================================================================
    /// Writing a progress record failed.
    #[error("Failed to save progress to '{path}': {message}\n\nSuggestion: Check write permissions and available disk space")]
    ProgressWriteError {
        /// Path of the progress store.
        path: PathBuf,
        /// Underlying I/O or serialization error.
        message: String,
    },

    /// Progress store file contains malformed JSON.
    #[error("Corrupted progress store '{path}': {message}\n\nSuggestion: Remove the store file to start fresh, or restore from backup")]
    StoreCorrupted {
        /// Path to the corrupted store.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    // ========================================================================
    // Feedback Errors
    // ========================================================================
    /// Feedback generation is switched off in the configuration.
    #[error("Feedback generation is disabled\n\nSuggestion: Set feedback.provider to 'gemini' in egua.json")]
    FeedbackDisabled,

    /// The feedback model could not be reached or refused the request.
    #[error("Feedback model error ({kind}): {message}\n\nSuggestion: {suggestion}")]
    LlmApiError {
        /// Failure category.
        kind: LlmErrorKind,
        /// Message from the client or the API.
        message: String,
        /// Hint derived from `kind`.
        suggestion: String,
    },

    // ========================================================================
    // Wrapped Errors
    // ========================================================================
    /// Filesystem failure outside the cases above.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON failure outside the cases above.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Why a feedback request failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    /// Key missing, invalid or lacking permission.
    Authentication,
    /// HTTP 429.
    RateLimit,
    /// HTTP 5xx.
    Server,
    /// The request never got a response.
    Network,
    /// Anything else, including unreadable responses.
    Other,
}

impl std::fmt::Display for LlmErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication"),
            Self::RateLimit => write!(f, "rate_limit"),
            Self::Server => write!(f, "server"),
            Self::Network => write!(f, "network"),
            Self::Other => write!(f, "other"),
        }
    }
}

impl LlmErrorKind {
    /// Hint shown to the operator.
    #[must_use]
    pub const fn suggestion(&self) -> &'static str {
        match self {
            Self::Authentication => "Check the API key in the configured environment variable",
            Self::RateLimit => "Wait before submitting again",
            Self::Server => "Try again later; the LLM service may be experiencing issues",
            Self::Network => "Check your network connection",
            Self::Other => "Check the LLM provider's status page",
        }
    }

    /// Classifies an HTTP status code returned by the LLM API.
    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::Authentication,
            429 => Self::RateLimit,
            500..=599 => Self::Server,
            _ => Self::Other,
        }
    }
}

impl TutorError {
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

    /// Creates a new `CatalogNotFound` error.
    #[must_use]
    pub fn catalog_not_found(path: impl Into<PathBuf>) -> Self {
        Self::CatalogNotFound { path: path.into() }
    }

    /// Creates a new `CatalogTooLarge` error.
    #[must_use]
    pub fn catalog_too_large(path: impl Into<PathBuf>, size_kb: u64) -> Self {
        Self::CatalogTooLarge {
            path: path.into(),
            size_kb,
        }
    }

    /// Creates a new `CatalogEncodingError`.
    #[must_use]
    pub fn catalog_encoding(path: impl Into<PathBuf>) -> Self {
        Self::CatalogEncodingError { path: path.into() }
    }

    /// Creates a new `CatalogInvalid` error.
    #[must_use]
    pub fn catalog_invalid(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CatalogInvalid {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Creates a new `LessonNotFound` error.
    #[must_use]
    pub fn lesson_not_found(id: impl Into<String>) -> Self {
        Self::LessonNotFound { id: id.into() }
    }

    /// Creates a new `ExerciseNotFound` error.
    #[must_use]
    pub fn exercise_not_found(id: impl Into<String>) -> Self {
        Self::ExerciseNotFound { id: id.into() }
    }

    /// Creates a new `ProgressWriteError`.
    #[must_use]
    pub fn progress_write(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ProgressWriteError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `StoreCorrupted` error.
    #[must_use]
    pub fn store_corrupted(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::StoreCorrupted {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `LlmApiError` with automatic suggestion based on error kind.
    #[must_use]
    pub fn llm_api_error(kind: LlmErrorKind, message: impl Into<String>) -> Self {
        let suggestion = kind.suggestion().to_string();
        Self::LlmApiError {
            kind,
            message: message.into(),
            suggestion,
        }
    }

    /// Returns `true` if this error is transient and may succeed on a later run.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::LlmApiError {
                kind: LlmErrorKind::RateLimit | LlmErrorKind::Server | LlmErrorKind::Network,
                ..
            }
        )
    }

    /// Returns `true` if this error prevents the service from starting.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConfigParseError { .. }
                | Self::ConfigValidationError { .. }
                | Self::CatalogNotFound { .. }
                | Self::CatalogTooLarge { .. }
                | Self::CatalogEncodingError { .. }
                | Self::CatalogInvalid { .. }
                | Self::StoreCorrupted { .. }
        )
    }

    /// Returns `true` for lookups of unknown lessons or exercises.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::LessonNotFound { .. } | Self::ExerciseNotFound { .. }
        )
    }
}
