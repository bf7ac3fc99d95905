//! Égua Progress Reports
//!
//! This crate turns a learner's progress records and the lesson catalog into
//! a dashboard report. Reports can be serialized to JSON for programmatic
//! access or rendered to Markdown for human consumption.
//!
//! # Types
//!
//! - [`ReportInput`] - Catalog outline plus the learner's records
//! - [`ReportGenerator`] - Builds a [`ProgressReport`] from the input
//! - [`ProgressReport`] - Per-lesson and per-exercise status with a summary
//!
//! # Generators
//!
//! - [`json::JsonGenerator`] - Generate JSON reports with compact or pretty formatting
//! - [`MarkdownGenerator`] - Generate human-readable Markdown reports
//!
//! # Example
//!
//! ```rust
//! use egua_report::{ExerciseInput, LessonInput, RecordInput, ReportGenerator, ReportInput};
//! use egua_report::json::JsonGenerator;
//!
//! let input = ReportInput {
//!     learner_id: "ana".to_string(),
//!     lessons: vec![LessonInput {
//!         id: "ola-mundo".to_string(),
//!         title: "Hello World em Égua".to_string(),
//!         order: 1,
//!         exercises: vec![ExerciseInput {
//!             id: "primeiro-programa".to_string(),
//!             title: "Seu primeiro programa".to_string(),
//!         }],
//!     }],
//!     records: vec![RecordInput {
//!         lesson_id: "ola-mundo".to_string(),
//!         exercise_id: "primeiro-programa".to_string(),
//!         completed: true,
//!         attempts: 2,
//!         updated_at: chrono::Utc::now(),
//!     }],
//! };
//!
//! let report = ReportGenerator::new(input).generate();
//! assert_eq!(report.summary.completion_percent, 100);
//!
//! let json = JsonGenerator::new(&report).generate_pretty().unwrap();
//! assert!(json.contains("primeiro-programa"));
//! ```

mod generator;
pub mod json;
mod markdown;

pub use generator::ReportGenerator;
pub use markdown::MarkdownGenerator;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during report generation.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Failed to serialize the report to JSON.
    #[error("failed to serialize report: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Failed to read or write report files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for report operations.
pub type Result<T> = std::result::Result<T, ReportError>;

// ============================================================================
// Progress Status (local copy to avoid cross-crate dependency)
// ============================================================================

/// Status of a lesson or exercise for one learner.
///
/// This is a local copy of `ExerciseStatus` from the tutor crate so that
/// reports can be produced without depending on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    /// Never attempted.
    #[default]
    NotStarted,
    /// Attempted without passing.
    InProgress,
    /// Passed.
    Completed,
}

impl ProgressStatus {
    /// Returns `true` for `Completed`.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Returns a human-readable description of the status.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::NotStarted => "Not started",
            Self::InProgress => "In progress",
            Self::Completed => "Completed",
        }
    }
}

impl std::fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

// ============================================================================
// Input Types
// ============================================================================

/// Everything the generator needs to build a report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportInput {
    /// Learner the report is for.
    pub learner_id: String,
    /// Lesson outline, in any order.
    pub lessons: Vec<LessonInput>,
    /// The learner's progress records.
    pub records: Vec<RecordInput>,
}

/// A lesson in the catalog outline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LessonInput {
    /// Lesson id.
    pub id: String,
    /// Lesson title.
    pub title: String,
    /// Position in the course.
    pub order: u32,
    /// Exercises in order.
    pub exercises: Vec<ExerciseInput>,
}

/// An exercise in the catalog outline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExerciseInput {
    /// Exercise id.
    pub id: String,
    /// Exercise title.
    pub title: String,
}

/// One progress record of the learner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordInput {
    /// Lesson id.
    pub lesson_id: String,
    /// Exercise id.
    pub exercise_id: String,
    /// Whether the exercise was passed.
    pub completed: bool,
    /// Recorded submissions.
    pub attempts: u32,
    /// Time of the last submission.
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Report
// ============================================================================

/// Learner dashboard report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgressReport {
    /// Learner the report is for.
    pub learner_id: String,

    /// When the report was generated.
    pub generated_at: DateTime<Utc>,

    /// Course-wide totals.
    pub summary: ReportSummary,

    /// Lessons ordered by position in the course.
    pub lessons: Vec<LessonReport>,
}

impl ProgressReport {
    /// Serializes the report to JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// First exercise, in course order, that is not completed.
    #[must_use]
    pub fn next_exercise(&self) -> Option<(&LessonReport, &ExerciseReport)> {
        self.lessons.iter().find_map(|lesson| {
            lesson
                .exercises
                .iter()
                .find(|exercise| !exercise.status.is_completed())
                .map(|exercise| (lesson, exercise))
        })
    }
}

/// Course-wide totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    /// Number of lessons.
    pub lessons_total: usize,
    /// Lessons with every exercise completed.
    pub lessons_completed: usize,
    /// Number of exercises.
    pub exercises_total: usize,
    /// Completed exercises.
    pub exercises_completed: usize,
    /// Completed exercises as a percentage, rounded down.
    pub completion_percent: u8,
    /// Submissions recorded across all exercises.
    pub total_attempts: u32,
}

/// Status of one lesson.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LessonReport {
    /// Lesson id.
    pub id: String,
    /// Lesson title.
    pub title: String,
    /// Position in the course.
    pub order: u32,
    /// Aggregate status.
    pub status: ProgressStatus,
    /// Exercise statuses.
    pub exercises: Vec<ExerciseReport>,
}

/// Status of one exercise.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExerciseReport {
    /// Exercise id.
    pub id: String,
    /// Exercise title.
    pub title: String,
    /// Status.
    pub status: ProgressStatus,
    /// Recorded submissions.
    pub attempts: u32,
    /// Time of the last submission.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_attempt_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_status_display() {
        assert_eq!(ProgressStatus::NotStarted.to_string(), "Not started");
        assert_eq!(ProgressStatus::Completed.to_string(), "Completed");
    }

    #[test]
    fn test_progress_status_serialization() {
        assert_eq!(
            serde_json::to_string(&ProgressStatus::InProgress).ok().as_deref(),
            Some("\"in_progress\"")
        );
    }

    #[test]
    fn test_next_exercise() {
        let exercise = |id: &str, status| ExerciseReport {
            id: id.to_string(),
            status,
            ..Default::default()
        };
        let report = ProgressReport {
            lessons: vec![
                LessonReport {
                    id: "a".to_string(),
                    exercises: vec![exercise("a1", ProgressStatus::Completed)],
                    ..Default::default()
                },
                LessonReport {
                    id: "b".to_string(),
                    exercises: vec![
                        exercise("b1", ProgressStatus::Completed),
                        exercise("b2", ProgressStatus::InProgress),
                    ],
                    ..Default::default()
                },
            ],
            ..Default::default()
        };

        let (lesson, next) = report.next_exercise().unwrap();
        assert_eq!(lesson.id, "b");
        assert_eq!(next.id, "b2");

        assert!(ProgressReport::default().next_exercise().is_none());
    }
}
