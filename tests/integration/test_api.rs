//! Integration tests for the HTTP API over a real socket.
//!
//! The tutor is served on an ephemeral port and driven with reqwest. A
//! stand-in Gemini server answers `generateContent` so that feedback flows
//! through the real client.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use egua_gemini::{GeminiClient, GeminiOptions};
use egua_tutor::feedback::DisabledFeedback;
use egua_tutor::progress::shared;
use egua_tutor::{
    create_router, AppState, Config, FeedbackGenerator, LessonCatalog, MemoryStore,
    ProgressRecord, FEEDBACK_UNAVAILABLE, LEARNER_HEADER,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;

const CANNED_FEEDBACK: &str = "Quase lá! Confira a pontuação da frase.";
const TEST_KEY: &str = "test-key";

/// Serves `router` on an ephemeral port and returns its base URL.
async fn spawn(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("Failed to get local addr");

    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Server failed");
    });

    // Give the server a moment to start
    tokio::time::sleep(Duration::from_millis(50)).await;

    format!("http://{addr}")
}

/// Stand-in for `POST /v1beta/models/{model}:generateContent`.
async fn fake_generate(
    Path(action): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    assert!(!query.contains_key("key"), "API key must not travel in the URL");
    let key = headers.get("x-goog-api-key").and_then(|v| v.to_str().ok());
    if key != Some(TEST_KEY) {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({"error": {"message": "API key not valid"}})),
        );
    }
    if !action.ends_with(":generateContent") {
        return (StatusCode::NOT_FOUND, Json(json!({})));
    }

    let prompt = body["contents"][0]["parts"][0]["text"]
        .as_str()
        .unwrap_or_default();
    assert!(prompt.contains("escreva"), "prompt should describe Égua");

    (
        StatusCode::OK,
        Json(json!({
            "candidates": [{"content": {"parts": [{"text": CANNED_FEEDBACK}]}}]
        })),
    )
}

/// Starts the fake Gemini server and a tutor wired to it.
async fn spawn_tutor(api_key: &str) -> String {
    let gemini = spawn(Router::new().route("/v1beta/models/:action", post(fake_generate))).await;

    let client = GeminiClient::new(GeminiOptions::new(api_key).with_base_url(gemini))
        .expect("Failed to build client");
    let feedback: Arc<dyn FeedbackGenerator> = Arc::new(client);

    spawn_tutor_with(feedback).await
}

async fn spawn_tutor_with(feedback: Arc<dyn FeedbackGenerator>) -> String {
    let state = AppState::new(
        Config::default(),
        LessonCatalog::builtin().expect("built-in catalog loads"),
        shared(MemoryStore::new()),
        feedback,
    );
    spawn(create_router(state)).await
}

async fn run(
    http: &reqwest::Client,
    base: &str,
    learner: &str,
    exercise: &str,
    code: &str,
) -> Value {
    let response = http
        .post(format!("{base}/api/run"))
        .header(LEARNER_HEADER, learner)
        .json(&json!({"exerciseId": exercise, "code": code}))
        .send()
        .await
        .expect("request succeeds");
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    response.json().await.expect("json body")
}

// ============================================================================
// Tests
// ============================================================================

/// A learner works through a lesson: wrong answer with feedback, then the
/// right answer, then the lesson list reflects the completion.
#[tokio::test]
async fn test_learner_journey() {
    let base = spawn_tutor(TEST_KEY).await;
    let http = reqwest::Client::new();

    let wrong = run(&http, &base, "ana", "primeiro-programa", "escreva(\"Olá Mundo\")").await;
    assert_eq!(wrong["completed"], false);
    assert_eq!(wrong["status"], "in_progress");
    assert_eq!(wrong["output"], "Olá Mundo");
    assert_eq!(wrong["feedback"], CANNED_FEEDBACK);

    let right = run(&http, &base, "ana", "primeiro-programa", "escreva(\"Olá, Mundo!\")").await;
    assert_eq!(right["completed"], true);
    assert!(right.get("feedback").is_none());

    let lessons: Value = http
        .get(format!("{base}/api/lessons"))
        .header(LEARNER_HEADER, "ana")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(lessons[0]["id"], "ola-mundo");
    assert_eq!(lessons[0]["status"], "completed");
    assert_eq!(lessons[1]["status"], "not_started");

    let progress: Vec<ProgressRecord> = http
        .get(format!("{base}/api/progress"))
        .header(LEARNER_HEADER, "ana")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(progress.len(), 1);
    assert!(progress[0].completed);
    assert_eq!(progress[0].attempts, 2);
}

/// Progress of one learner is invisible to another.
#[tokio::test]
async fn test_learners_are_isolated() {
    let base = spawn_tutor_with(Arc::new(DisabledFeedback)).await;
    let http = reqwest::Client::new();

    run(&http, &base, "ana", "nome-em-variavel", "var nome = \"Maria\"\nescreva(nome)").await;

    let progress: Vec<ProgressRecord> = http
        .get(format!("{base}/api/progress"))
        .header(LEARNER_HEADER, "bruno")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(progress.is_empty());
}

/// Requests without an identity are rejected before any work is done.
#[tokio::test]
async fn test_missing_identity_is_rejected() {
    let base = spawn_tutor_with(Arc::new(DisabledFeedback)).await;
    let http = reqwest::Client::new();

    let response = http
        .post(format!("{base}/api/run"))
        .json(&json!({"exerciseId": "primeiro-programa", "code": "escreva(\"x\")"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "unauthorized");
}

/// A rejected API key surfaces as an unavailable-feedback error on the
/// standalone feedback endpoint and as `feedbackError` on a run.
#[tokio::test]
async fn test_gemini_rejection_is_reported() {
    let base = spawn_tutor("wrong-key").await;
    let http = reqwest::Client::new();

    let response = http
        .post(format!("{base}/api/feedback"))
        .header(LEARNER_HEADER, "ana")
        .json(&json!({
            "code": "escreva(\"oi\")",
            "exerciseDescription": "Escreva Olá, Mundo!",
            "expectedOutput": "Olá, Mundo!",
            "actualOutput": "oi"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_GATEWAY);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], FEEDBACK_UNAVAILABLE);

    let wrong = run(&http, &base, "ana", "primeiro-programa", "escreva(\"oi\")").await;
    assert_eq!(wrong["completed"], false);
    assert_eq!(wrong["feedbackError"], FEEDBACK_UNAVAILABLE);
}

/// The standalone feedback endpoint returns the generated text.
#[tokio::test]
async fn test_feedback_endpoint_uses_gemini() {
    let base = spawn_tutor(TEST_KEY).await;
    let http = reqwest::Client::new();

    let response = http
        .post(format!("{base}/api/feedback"))
        .header(LEARNER_HEADER, "ana")
        .json(&json!({
            "code": "escreva(\"oi\")",
            "exerciseDescription": "Escreva Olá, Mundo!",
            "expectedOutput": "Olá, Mundo!",
            "actualOutput": "oi"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["feedback"], CANNED_FEEDBACK);
}
