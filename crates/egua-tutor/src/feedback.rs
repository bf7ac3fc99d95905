//! Generative feedback for wrong answers.
//!
//! The grading flow asks a [`FeedbackGenerator`] for a short, encouraging
//! explanation whenever a submission's output differs from the expected
//! output. Prompts are written in Portuguese, the language of the lessons.

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use egua_gemini::{GeminiClient, GeminiError, GeminiOptions};
use tracing::{info, warn};

use crate::config::{FeedbackConfig, FeedbackProvider};
use crate::error::{LlmErrorKind, Result, TutorError};

/// Message reported to learners when feedback could not be produced.
pub const FEEDBACK_UNAVAILABLE: &str = "could not generate feedback";

/// Language primer appended to every prompt.
pub const EGUA_PRIMER: &str = "\
LINGUAGEM ÉGUA - REFERÊNCIA RÁPIDA

Exibir texto:
  escreva(\"Olá, Mundo!\");
  O texto fica entre aspas duplas. O ponto e vírgula no final é opcional.

Variáveis:
  var nome = \"Maria\";
  escreva(nome);
  Use 'var' apenas na primeira vez. Para trocar o valor: nome = \"João\"

Comentários:
  # tudo depois do # é ignorado

Erros comuns:
  escreva(Olá)         -> faltam as aspas em volta do texto
  print(\"Olá\")         -> o comando em Égua é escreva
  escreva(nome) sem declarar 'var nome' antes mostra a palavra nome";

/// Inputs of a feedback prompt.
#[derive(Debug, Clone, Copy)]
pub struct FeedbackPrompt<'a> {
    /// Exercise description.
    pub description: &'a str,
    /// Output the exercise expects.
    pub expected_output: &'a str,
    /// Output the submission produced.
    pub actual_output: &'a str,
    /// The learner's code.
    pub code: &'a str,
    /// Reference solution, when the catalog has one.
    pub reference_solution: Option<&'a str>,
}

impl FeedbackPrompt<'_> {
    /// Renders the prompt text sent to the generator.
    #[must_use]
    pub fn render(&self) -> String {
        let mut prompt = String::new();

        let _ = writeln!(
            prompt,
            "Como professor de programação, analise o seguinte código em Égua."
        );
        let _ = writeln!(prompt);
        let _ = writeln!(prompt, "Descrição do exercício: {}", self.description);
        let _ = writeln!(prompt, "Saída esperada: {}", self.expected_output);
        let _ = writeln!(prompt, "Saída atual: {}", self.actual_output);
        let _ = writeln!(prompt);
        let _ = writeln!(prompt, "Código do aluno:");
        let _ = writeln!(prompt, "{}", self.code);

        if let Some(solution) = self.reference_solution {
            let _ = writeln!(prompt);
            let _ = writeln!(
                prompt,
                "Solução de referência (não a revele ao aluno, use apenas para orientar):"
            );
            let _ = writeln!(prompt, "{solution}");
        }

        let _ = writeln!(prompt);
        let _ = writeln!(prompt, "Forneça um feedback construtivo e humanizado que:");
        let _ = writeln!(prompt, "1. Identifique o que o aluno fez corretamente");
        let _ = writeln!(prompt, "2. Aponte gentilmente os erros");
        let _ = writeln!(prompt, "3. Dê dicas específicas de como melhorar");
        let _ = writeln!(prompt, "4. Encoraje o aluno a continuar tentando");
        let _ = writeln!(
            prompt,
            "Mantenha o tom amigável e motivador. Limite a resposta a 3-4 frases."
        );
        let _ = writeln!(prompt);
        let _ = write!(prompt, "{EGUA_PRIMER}");

        prompt
    }
}

/// Produces natural-language feedback from a prompt.
#[async_trait]
pub trait FeedbackGenerator: Send + Sync {
    /// Generates feedback text for `prompt`.
    ///
    /// # Errors
    ///
    /// Returns an error when no text could be produced.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Generator used when feedback is switched off.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledFeedback;

#[async_trait]
impl FeedbackGenerator for DisabledFeedback {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        Err(TutorError::FeedbackDisabled)
    }
}

#[async_trait]
impl FeedbackGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        Self::generate(self, prompt).await.map_err(llm_error)
    }
}

fn llm_error(err: GeminiError) -> TutorError {
    let kind = match &err {
        GeminiError::MissingApiKey => LlmErrorKind::Authentication,
        GeminiError::Network(_) => LlmErrorKind::Network,
        GeminiError::Status { status, .. } => LlmErrorKind::from_status(*status),
        GeminiError::Decode { .. } | GeminiError::EmptyResponse => LlmErrorKind::Other,
    };
    TutorError::llm_api_error(kind, err.to_string())
}

/// Builds the generator selected by the configuration.
///
/// A Gemini provider without an API key falls back to [`DisabledFeedback`]
/// with a warning, so the tutor still grades submissions.
#[must_use]
pub fn from_config(config: &FeedbackConfig) -> Arc<dyn FeedbackGenerator> {
    match config.provider {
        FeedbackProvider::Disabled => {
            info!("Feedback generation disabled");
            Arc::new(DisabledFeedback)
        }
        FeedbackProvider::Gemini => {
            let Some(api_key) = config.api_key() else {
                warn!(
                    env = %config.api_key_env,
                    "Gemini API key not set; feedback generation disabled"
                );
                return Arc::new(DisabledFeedback);
            };

            let options = GeminiOptions::new(api_key)
                .with_model(&config.model)
                .with_base_url(&config.base_url);
            match GeminiClient::new(options) {
                Ok(client) => {
                    info!(model = %client.model(), "Gemini feedback enabled");
                    Arc::new(client)
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        "Failed to create Gemini client; feedback generation disabled"
                    );
                    Arc::new(DisabledFeedback)
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn prompt() -> FeedbackPrompt<'static> {
        FeedbackPrompt {
            description: "Mostre 'Olá, Mundo!' na tela.",
            expected_output: "Olá, Mundo!",
            actual_output: "",
            code: "print(\"Olá, Mundo!\")",
            reference_solution: None,
        }
    }

    #[test]
    fn test_prompt_contains_inputs_and_primer() {
        let text = prompt().render();
        assert!(text.contains("Descrição do exercício: Mostre 'Olá, Mundo!' na tela."));
        assert!(text.contains("Saída esperada: Olá, Mundo!"));
        assert!(text.contains("Saída atual: \n"));
        assert!(text.contains("print(\"Olá, Mundo!\")"));
        assert!(text.ends_with(EGUA_PRIMER));
        assert!(!text.contains("Solução de referência"));
    }

    #[test]
    fn test_prompt_includes_reference_solution() {
        let text = FeedbackPrompt {
            reference_solution: Some("escreva(\"Olá, Mundo!\");"),
            ..prompt()
        }
        .render();
        assert!(text.contains("Solução de referência"));
        assert!(text.contains("escreva(\"Olá, Mundo!\");"));
    }

    #[test]
    fn test_disabled_feedback_errors() {
        let err = tokio_test::block_on(DisabledFeedback.generate("x")).unwrap_err();
        assert!(matches!(err, TutorError::FeedbackDisabled));
    }

    #[test]
    fn test_llm_error_mapping() {
        let err = llm_error(GeminiError::Status {
            status: 429,
            body: String::new(),
        });
        assert!(matches!(
            err,
            TutorError::LlmApiError {
                kind: LlmErrorKind::RateLimit,
                ..
            }
        ));
        assert!(err.is_transient());

        let err = llm_error(GeminiError::EmptyResponse);
        assert!(matches!(
            err,
            TutorError::LlmApiError {
                kind: LlmErrorKind::Other,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_from_config_without_key_is_disabled() {
        let config = FeedbackConfig {
            api_key_env: "EGUA_TEST_FEEDBACK_KEY_NEVER_SET".to_string(),
            ..Default::default()
        };
        let generator = from_config(&config);
        let err = generator.generate("x").await.unwrap_err();
        assert!(matches!(err, TutorError::FeedbackDisabled));
    }
}
