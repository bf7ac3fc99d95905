//! HTTP client for the Gemini `generateContent` endpoint.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::GeminiError;

/// Default API root.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Default model.
pub const DEFAULT_MODEL: &str = "gemini-pro";

/// Header carrying the API key.
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Request body for `generateContent`.
#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

impl<'a> GenerateRequest<'a> {
    fn single_prompt(text: &'a str) -> Self {
        Self {
            contents: vec![Content {
                parts: vec![Part { text }],
            }],
        }
    }
}

/// Response body of `generateContent`. Only the fields we read are modelled.
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
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateResponse {
    /// Text of the first part of the first candidate.
    fn into_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()?
            .text
    }
}

/// Options for constructing a [`GeminiClient`].
///
/// # Example
///
/// ```
/// use egua_gemini::GeminiOptions;
///
/// let options = GeminiOptions::new("my-key")
///     .with_model("gemini-1.5-flash")
///     .with_base_url("http://127.0.0.1:9000");
/// assert_eq!(options.model, "gemini-1.5-flash");
/// ```
#[derive(Clone)]
pub struct GeminiOptions {
    /// API key sent in the `x-goog-api-key` header.
    pub api_key: String,
    /// Model name.
    pub model: String,
    /// API root, without a trailing slash.
    pub base_url: String,
}

impl GeminiOptions {
    /// Creates options with the default model and API root.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Sets the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the API root. A trailing slash is dropped.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

impl std::fmt::Debug for GeminiOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiOptions")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Client that sends one prompt per call to `generateContent`.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    options: GeminiOptions,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    /// Creates a client.
    ///
    /// # Errors
    ///
    /// Returns `GeminiError::MissingApiKey` if the key is blank.
    pub fn new(options: GeminiOptions) -> Result<Self, GeminiError> {
        if options.api_key.trim().is_empty() {
            return Err(GeminiError::MissingApiKey);
        }
        Ok(Self {
            http: reqwest::Client::new(),
            options,
        })
    }

    /// The model this client calls.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.options.model
    }

    /// Endpoint URL without the key.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.options.base_url, self.options.model
        )
    }

    /// Sends `prompt` and returns the first candidate's text.
    ///
    /// # Errors
    ///
    /// - `GeminiError::Network` if the request fails to complete
    /// - `GeminiError::Status` for non-success responses
    /// - `GeminiError::Decode` if the body is not the expected JSON
    /// - `GeminiError::EmptyResponse` if there is no candidate text
    #[instrument(
        skip(self, prompt),
        fields(model = %self.options.model, prompt_len = prompt.len())
    )]
    pub async fn generate(&self, prompt: &str) -> Result<String, GeminiError> {
        let response = self
            .http
            .post(self.endpoint())
            .header(API_KEY_HEADER, &self.options.api_key)
            .json(&GenerateRequest::single_prompt(prompt))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "Gemini request failed");
            return Err(GeminiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = parse_response(&body)?;
        debug!(response_len = text.len(), "Gemini response received");
        Ok(text)
    }
}

fn parse_response(body: &str) -> Result<String, GeminiError> {
    let response: GenerateResponse =
        serde_json::from_str(body).map_err(|e| GeminiError::Decode {
            message: e.to_string(),
            body: body.to_string(),
        })?;
    response.into_text().ok_or(GeminiError::EmptyResponse)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn options_defaults() {
        let options = GeminiOptions::new("k");
        assert_eq!(options.model, "gemini-pro");
        assert_eq!(options.base_url, "https://generativelanguage.googleapis.com");
    }

    #[test]
    fn endpoint_includes_model() {
        let client = GeminiClient::new(
            GeminiOptions::new("k")
                .with_model("gemini-1.5-flash")
                .with_base_url("http://localhost:9000/"),
        )
        .unwrap();
        assert_eq!(
            client.endpoint(),
            "http://localhost:9000/v1beta/models/gemini-1.5-flash:generateContent"
        );
        assert_eq!(client.model(), "gemini-1.5-flash");
    }

    #[test]
    fn blank_key_is_rejected() {
        let err = GeminiClient::new(GeminiOptions::new("  ")).unwrap_err();
        assert!(matches!(err, GeminiError::MissingApiKey));
    }

    #[test]
    fn request_body_shape() {
        let json = serde_json::to_value(GenerateRequest::single_prompt("Olá")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"contents": [{"parts": [{"text": "Olá"}]}]})
        );
    }

    #[test]
    fn parse_first_candidate_text() {
        let body = r#"{
            "candidates": [
                {"content": {"parts": [{"text": "Tente usar aspas."}, {"text": "ignored"}]}},
                {"content": {"parts": [{"text": "second"}]}}
            ]
        }"#;
        assert_eq!(parse_response(body).unwrap(), "Tente usar aspas.");
    }

    #[test]
    fn parse_without_candidates() {
        assert!(matches!(
            parse_response(r#"{"candidates": []}"#),
            Err(GeminiError::EmptyResponse)
        ));
        assert!(matches!(
            parse_response(r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#),
            Err(GeminiError::EmptyResponse)
        ));
        assert!(matches!(
            parse_response(r#"{"candidates": [{"finishReason": "SAFETY"}]}"#),
            Err(GeminiError::EmptyResponse)
        ));
    }

    #[test]
    fn parse_invalid_json() {
        let err = parse_response("not json").unwrap_err();
        assert!(matches!(err, GeminiError::Decode { ref body, .. } if body == "not json"));
    }

    #[tokio::test]
    async fn unreachable_server_is_network_error() {
        // Port 9 (discard) on localhost is expected to refuse connections.
        let client =
            GeminiClient::new(GeminiOptions::new("k").with_base_url("http://127.0.0.1:9")).unwrap();
        let err = tokio_test::assert_err!(client.generate("hi").await);
        assert!(err.is_network());
    }

    #[tokio::test]
    async fn api_key_stays_out_of_errors_and_debug() {
        let client = GeminiClient::new(
            GeminiOptions::new("SECRET-KEY-123").with_base_url("http://127.0.0.1:9"),
        )
        .unwrap();

        let debug = format!("{client:?}");
        assert!(!debug.contains("SECRET-KEY-123"));
        assert!(debug.contains("<redacted>"));

        let err = tokio_test::assert_err!(client.generate("hi").await);
        let message = err.to_string();
        assert!(!message.contains("SECRET-KEY-123"), "key leaked: {message}");
        assert!(!format!("{err:?}").contains("SECRET-KEY-123"));
    }
}
