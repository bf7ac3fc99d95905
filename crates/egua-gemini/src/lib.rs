//! Égua Gemini Client
//!
//! Minimal client for the Gemini `generateContent` endpoint.
//!
//! This crate sends a single text prompt and returns the text of the first
//! candidate. It knows nothing about lessons or grading.

use thiserror::Error;

mod client;

pub use client::{GeminiClient, GeminiOptions, DEFAULT_BASE_URL, DEFAULT_MODEL};

/// Errors that can occur while calling the Gemini API.
#[derive(Debug, Error)]
pub enum GeminiError {
    /// No API key was supplied.
    #[error("missing Gemini API key")]
    MissingApiKey,

    /// The request never produced a response. The request URL is stripped.
    #[error("network error: {0}")]
    Network(reqwest::Error),

    /// The API answered with a non-success status.
    #[error("Gemini API returned status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, as returned by the API.
        body: String,
    },

    /// The response body was not the expected JSON.
    #[error("error decoding response body: {message}. Full response: {body}")]
    Decode {
        /// Decoder message.
        message: String,
        /// Raw response body.
        body: String,
    },

    /// The response carried no candidate text.
    #[error("Gemini API returned no candidate text")]
    EmptyResponse,
}

impl From<reqwest::Error> for GeminiError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.without_url())
    }
}

impl GeminiError {
    /// HTTP status of a `Status` error.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns `true` when the request failed before any response arrived.
    #[must_use]
    pub const fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}
