//! HTTP API for the Égua tutor.
//!
//! Every endpoint except `/api/health` requires the caller's identity in the
//! `x-learner-id` header.
//!
//! # Endpoints
//!
//! - `GET /api/health` - Liveness check
//! - `GET /api/lessons` - Lessons with the learner's completion
//! - `GET /api/lessons/:id` - Lesson detail with exercise status
//! - `POST /api/run` - Scan and grade a submission
//! - `GET /api/progress` - The learner's progress records
//! - `POST /api/feedback` - Generate feedback for arbitrary output
//!
//! # Example
//!
//! ```no_run
//! use egua_tutor::{create_router, AppState, Config, LessonCatalog, MemoryStore};
//! use egua_tutor::feedback::DisabledFeedback;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let state = AppState::new(
//!     Config::default(),
//!     LessonCatalog::builtin()?,
//!     egua_tutor::progress::shared(MemoryStore::new()),
//!     Arc::new(DisabledFeedback),
//! );
//!
//! let router = create_router(state);
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//! axum::serve(listener, router).await?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequestParts, Path, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};

use crate::feedback::{FeedbackGenerator, FeedbackPrompt, FEEDBACK_UNAVAILABLE};
use crate::grading::{GradingGate, RunReport, Submission};
use crate::lesson::{Exercise, Lesson, LessonCatalog};
use crate::progress::{ExerciseStatus, ProgressRecord, SharedStore};
use crate::{Config, TutorError};

/// Header carrying the caller's identity.
pub const LEARNER_HEADER: &str = "x-learner-id";

// ============================================================================
// Request/Response Types
// ============================================================================

/// Response body for the health endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"ok"`.
    pub status: String,
}

/// A lesson in the listing, with the learner's completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonSummary {
    /// Lesson id.
    pub id: String,
    /// Lesson title.
    pub title: String,
    /// One-line summary.
    pub description: String,
    /// Position in the course.
    pub order: u32,
    /// Number of exercises.
    pub exercise_count: usize,
    /// Number of exercises the learner has completed.
    pub completed_exercises: usize,
    /// Aggregate lesson status.
    pub status: ExerciseStatus,
}

/// An exercise as shown to learners. The reference solution is withheld.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseView {
    /// Exercise id.
    pub id: String,
    /// Exercise title.
    pub title: String,
    /// What to do.
    pub description: String,
    /// Output a correct answer produces.
    pub expected_output: String,
    /// Learner's status.
    pub status: ExerciseStatus,
    /// Recorded submissions.
    pub attempts: u32,
}

/// Full lesson with exercise status.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonDetail {
    /// Lesson id.
    pub id: String,
    /// Lesson title.
    pub title: String,
    /// One-line summary.
    pub description: String,
    /// Lesson body.
    pub content: String,
    /// Position in the course.
    pub order: u32,
    /// Aggregate lesson status.
    pub status: ExerciseStatus,
    /// Exercises in order.
    pub exercises: Vec<ExerciseView>,
}

/// Request body for the run endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    /// Exercise being answered.
    pub exercise_id: String,
    /// Submitted source.
    pub code: String,
}

/// Request body for the feedback endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
    /// Learner's code.
    pub code: String,
    /// Exercise description.
    pub exercise_description: String,
    /// Expected output.
    pub expected_output: String,
    /// Output the code produced.
    pub actual_output: String,
}

/// Response body for the feedback endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackResponse {
    /// Generated text.
    pub feedback: String,
}

/// Error response body returned on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Description of the error.
    pub error: String,
}

// ============================================================================
// Application State
// ============================================================================

/// Shared application state for the HTTP server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Tutor configuration.
    pub config: Config,
    /// Lessons served by the API.
    pub catalog: Arc<LessonCatalog>,
    /// Grading gate, owning the progress store and feedback generator.
    pub gate: GradingGate,
}

impl AppState {
    /// Creates a new `AppState`.
    #[must_use]
    pub fn new(
        config: Config,
        catalog: LessonCatalog,
        store: SharedStore,
        feedback: Arc<dyn FeedbackGenerator>,
    ) -> Self {
        Self {
            config,
            catalog: Arc::new(catalog),
            gate: GradingGate::new(store, feedback),
        }
    }

    async fn statuses_for(&self, learner_id: &str) -> HashMap<(String, String), ProgressRecord> {
        self.gate
            .store()
            .lock()
            .await
            .records_for(learner_id)
            .into_iter()
            .map(|record| {
                (
                    (record.lesson_id.clone(), record.exercise_id.clone()),
                    record,
                )
            })
            .collect()
    }
}

// ============================================================================
// API Error Type
// ============================================================================

/// Internal error type for API handlers.
#[derive(Debug)]
enum ApiError {
    /// Missing or blank identity header.
    Unauthorized,
    /// Unknown lesson or exercise.
    NotFound(String),
    /// Progress could not be persisted.
    SaveFailed,
    /// The feedback generator failed.
    FeedbackUnavailable,
    /// Anything else.
    Internal,
}

impl From<TutorError> for ApiError {
    fn from(err: TutorError) -> Self {
        if err.is_not_found() {
            return Self::NotFound(err.to_string());
        }
        match err {
            TutorError::ProgressWriteError { .. } => {
                error!(error = %err, "Failed to save progress");
                Self::SaveFailed
            }
            other => {
                error!(error = %other, "Request failed");
                Self::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized".to_string()),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::SaveFailed => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to save progress".to_string(),
            ),
            Self::FeedbackUnavailable => {
                (StatusCode::BAD_GATEWAY, FEEDBACK_UNAVAILABLE.to_string())
            }
            Self::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error".to_string(),
            ),
        };

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}

/// Identity of the caller, read from [`LEARNER_HEADER`].
#[derive(Debug)]
struct Learner(String);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Learner {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(LEARNER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| Self(id.to_string()))
            .ok_or(ApiError::Unauthorized)
    }
}

// ============================================================================
// Router Setup
// ============================================================================

/// Creates the HTTP router with all API endpoints.
///
/// The router has:
/// - All API routes under `/api`
/// - Permissive CORS
/// - Tracing middleware for request logging
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/health", get(handle_health))
        .route("/lessons", get(handle_lessons))
        .route("/lessons/:id", get(handle_lesson))
        .route("/run", post(handle_run))
        .route("/progress", get(handle_progress))
        .route("/feedback", post(handle_feedback));

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::new(state))
}

// ============================================================================
// Handlers
// ============================================================================

/// Handler for `GET /api/health`.
async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

fn exercise_statuses<'a>(
    lesson: &'a Lesson,
    records: &'a HashMap<(String, String), ProgressRecord>,
) -> impl Iterator<Item = (&'a Exercise, Option<&'a ProgressRecord>)> + 'a {
    lesson.exercises.iter().map(move |exercise| {
        let record = records.get(&(lesson.id.clone(), exercise.id.clone()));
        (exercise, record)
    })
}

/// Handler for `GET /api/lessons`.
async fn handle_lessons(
    State(state): State<Arc<AppState>>,
    Learner(learner_id): Learner,
) -> Json<Vec<LessonSummary>> {
    let records = state.statuses_for(&learner_id).await;

    let lessons = state
        .catalog
        .lessons()
        .iter()
        .map(|lesson| {
            let statuses: Vec<ExerciseStatus> = exercise_statuses(lesson, &records)
                .map(|(_, record)| ExerciseStatus::from_record(record))
                .collect();
            LessonSummary {
                id: lesson.id.clone(),
                title: lesson.title.clone(),
                description: lesson.description.clone(),
                order: lesson.order,
                exercise_count: lesson.exercises.len(),
                completed_exercises: statuses.iter().filter(|s| s.is_completed()).count(),
                status: ExerciseStatus::aggregate(statuses),
            }
        })
        .collect();

    Json(lessons)
}

/// Handler for `GET /api/lessons/:id`.
async fn handle_lesson(
    State(state): State<Arc<AppState>>,
    Learner(learner_id): Learner,
    Path(id): Path<String>,
) -> Result<Json<LessonDetail>, ApiError> {
    let lesson = state.catalog.lesson(&id)?;
    let records = state.statuses_for(&learner_id).await;

    let exercises: Vec<ExerciseView> = exercise_statuses(lesson, &records)
        .map(|(exercise, record)| ExerciseView {
            id: exercise.id.clone(),
            title: exercise.title.clone(),
            description: exercise.description.clone(),
            expected_output: exercise.expected_output.clone(),
            status: ExerciseStatus::from_record(record),
            attempts: record.map_or(0, |r| r.attempts),
        })
        .collect();

    Ok(Json(LessonDetail {
        id: lesson.id.clone(),
        title: lesson.title.clone(),
        description: lesson.description.clone(),
        content: lesson.content.clone(),
        order: lesson.order,
        status: ExerciseStatus::aggregate(exercises.iter().map(|e| e.status)),
        exercises,
    }))
}

/// Handler for `POST /api/run`.
///
/// Scans the code, grades it and returns the run report.
async fn handle_run(
    State(state): State<Arc<AppState>>,
    Learner(learner_id): Learner,
    Json(request): Json<RunRequest>,
) -> Result<Json<RunReport>, ApiError> {
    let (lesson, exercise) = state.catalog.find_exercise(&request.exercise_id)?;

    info!(
        learner = %learner_id,
        exercise = %exercise.id,
        code_len = request.code.len(),
        "Received submission"
    );

    let report = state
        .gate
        .run(Submission {
            learner_id: &learner_id,
            lesson_id: &lesson.id,
            exercise,
            code: &request.code,
        })
        .await?;

    Ok(Json(report))
}

/// Handler for `GET /api/progress`.
async fn handle_progress(
    State(state): State<Arc<AppState>>,
    Learner(learner_id): Learner,
) -> Json<Vec<ProgressRecord>> {
    let records = state.gate.store().lock().await.records_for(&learner_id);
    Json(records)
}

/// Handler for `POST /api/feedback`.
async fn handle_feedback(
    State(state): State<Arc<AppState>>,
    Learner(learner_id): Learner,
    Json(request): Json<FeedbackRequest>,
) -> Result<Json<FeedbackResponse>, ApiError> {
    let prompt = FeedbackPrompt {
        description: &request.exercise_description,
        expected_output: &request.expected_output,
        actual_output: &request.actual_output,
        code: &request.code,
        reference_solution: None,
    };

    match state.gate.feedback().generate(&prompt.render()).await {
        Ok(feedback) => Ok(Json(FeedbackResponse { feedback })),
        Err(e) => {
            warn!(learner = %learner_id, error = %e, "Feedback generation failed");
            Err(ApiError::FeedbackUnavailable)
        }
    }
}
