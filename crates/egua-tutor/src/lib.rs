//! Égua Tutor
//!
//! Line scanner, grading gate, lesson catalog, progress store and HTTP API
//! for the Égua learning platform.

pub mod api;
pub mod config;
pub mod error;
pub mod feedback;
pub mod grading;
pub mod lesson;
pub mod progress;
pub mod scanner;

pub use api::{
    create_router, AppState, ErrorResponse, ExerciseView, FeedbackRequest, FeedbackResponse,
    HealthResponse, LessonDetail, LessonSummary, RunRequest, LEARNER_HEADER,
};
pub use config::{Config, FeedbackConfig, FeedbackProvider};
pub use error::{LlmErrorKind, Result, TutorError};
pub use feedback::{FeedbackGenerator, FeedbackPrompt, FEEDBACK_UNAVAILABLE};
pub use grading::{GradeOutcome, GradingGate, RunReport, Submission};
pub use lesson::{Exercise, Lesson, LessonCatalog, MAX_CATALOG_SIZE};
pub use progress::{
    ExerciseStatus, JsonFileStore, MemoryStore, ProgressKey, ProgressRecord, ProgressStore,
    SharedStore,
};
pub use scanner::{
    scan, scan_with_trace, ClassifiedLine, IgnoreReason, PrintArg, ScanResult, Statement,
};
