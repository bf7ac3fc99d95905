//! The grading gate.
//!
//! Compares the simulated output of a submission with the exercise's expected
//! output and records the result:
//!
//! - match: the exercise is marked completed (once; repeated correct
//!   submissions are no-ops) and no feedback is requested
//! - mismatch: the attempt is recorded without ever clearing a completion,
//!   and feedback is requested exactly once

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, TutorError};
use crate::feedback::{FeedbackGenerator, FeedbackPrompt, FEEDBACK_UNAVAILABLE};
use crate::lesson::Exercise;
use crate::progress::{ExerciseStatus, ProgressKey, ProgressStore, SharedStore};
use crate::scanner::scan;

/// A learner's code submitted for one exercise.
#[derive(Debug, Clone, Copy)]
pub struct Submission<'a> {
    /// Who submitted.
    pub learner_id: &'a str,
    /// Lesson the exercise belongs to.
    pub lesson_id: &'a str,
    /// The exercise being answered.
    pub exercise: &'a Exercise,
    /// Source text.
    pub code: &'a str,
}

impl Submission<'_> {
    fn key(&self) -> ProgressKey {
        ProgressKey::new(self.learner_id, self.lesson_id, &self.exercise.id)
    }
}

/// Result of grading one submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeOutcome {
    /// Whether the exercise is completed after this submission.
    pub completed: bool,
    /// Exercise status after this submission.
    pub status: ExerciseStatus,
    /// Generated feedback, on a mismatch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    /// Set when feedback was wanted but could not be produced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback_error: Option<String>,
}

/// Simulated output together with the grading result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    /// Output produced by the line scanner.
    pub output: String,
    /// Output the exercise expects.
    pub expected_output: String,
    /// Grading result.
    #[serde(flatten)]
    pub outcome: GradeOutcome,
}

/// Grades submissions against their exercises.
#[derive(Clone)]
pub struct GradingGate {
    store: SharedStore,
    feedback: Arc<dyn FeedbackGenerator>,
}

impl std::fmt::Debug for GradingGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GradingGate").finish_non_exhaustive()
    }
}

impl GradingGate {
    /// Creates a gate writing to `store` and asking `feedback` on mismatches.
    #[must_use]
    pub fn new(store: SharedStore, feedback: Arc<dyn FeedbackGenerator>) -> Self {
        Self { store, feedback }
    }

    /// The store this gate writes to.
    #[must_use]
    pub const fn store(&self) -> &SharedStore {
        &self.store
    }

    /// The feedback generator used on mismatches.
    #[must_use]
    pub fn feedback(&self) -> &Arc<dyn FeedbackGenerator> {
        &self.feedback
    }

    /// Scans the submission and grades its output.
    ///
    /// # Errors
    ///
    /// Returns `TutorError::ProgressWriteError` if a completion cannot be saved.
    pub async fn run(&self, submission: Submission<'_>) -> Result<RunReport> {
        let output = scan(submission.code);
        let outcome = self.grade(submission, &output).await?;
        Ok(RunReport {
            output,
            expected_output: submission.exercise.expected_output.clone(),
            outcome,
        })
    }

    /// Grades an already simulated output.
    ///
    /// # Errors
    ///
    /// Returns `TutorError::ProgressWriteError` if a completion cannot be saved.
    /// Failures to record a wrong attempt are logged only.
    #[instrument(
        skip_all,
        fields(learner = submission.learner_id, exercise = %submission.exercise.id)
    )]
    pub async fn grade(
        &self,
        submission: Submission<'_>,
        simulated_output: &str,
    ) -> Result<GradeOutcome> {
        let key = submission.key();
        let expected = submission.exercise.expected_output.as_str();

        if simulated_output == expected {
            let code = submission.code.to_string();
            let written = self
                .with_store(move |store| {
                    if store.find(&key).is_some_and(|record| record.completed) {
                        return Ok(None);
                    }
                    store.upsert(&key, true, &code).map(Some)
                })
                .await?;

            match written {
                Some(record) => info!(attempts = record.attempts, "Exercise completed"),
                None => debug!("Exercise already completed"),
            }
            return Ok(completed_outcome());
        }

        let status = self.record_attempt(key, submission.code).await;
        info!(?status, "Output did not match");

        let prompt = FeedbackPrompt {
            description: &submission.exercise.description,
            expected_output: expected,
            actual_output: simulated_output,
            code: submission.code,
            reference_solution: submission.exercise.expected_code.as_deref(),
        };

        let (feedback, feedback_error) = match self.feedback.generate(&prompt.render()).await {
            Ok(text) => (Some(text), None),
            Err(e) => {
                warn!(error = %e, "Feedback generation failed");
                (None, Some(FEEDBACK_UNAVAILABLE.to_string()))
            }
        };

        Ok(GradeOutcome {
            completed: status.is_completed(),
            status,
            feedback,
            feedback_error,
        })
    }

    /// Records a wrong attempt unless the exercise is already completed.
    async fn record_attempt(&self, key: ProgressKey, code: &str) -> ExerciseStatus {
        let code = code.to_string();
        let attempt = self
            .with_store(move |store| {
                let existing = store.find(&key);
                if existing.as_ref().is_some_and(|record| record.completed) {
                    return Ok((ExerciseStatus::Completed, None));
                }
                Ok(match store.upsert(&key, false, &code) {
                    Ok(record) => (ExerciseStatus::from_record(Some(&record)), None),
                    Err(e) => (ExerciseStatus::from_record(existing.as_ref()), Some(e)),
                })
            })
            .await;

        match attempt {
            Ok((status, None)) => status,
            Ok((status, Some(e))) => {
                warn!(error = %e, "Failed to record attempt");
                status
            }
            Err(e) => {
                warn!(error = %e, "Failed to record attempt");
                ExerciseStatus::NotStarted
            }
        }
    }

    /// Runs `f` against the locked store on the blocking pool. File stores
    /// write to disk while the lock is held.
    async fn with_store<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn ProgressStore) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || {
            let mut guard = store.blocking_lock();
            f(&mut **guard)
        })
        .await
        .map_err(|e| TutorError::Io(std::io::Error::other(e)))?
    }
}

const fn completed_outcome() -> GradeOutcome {
    GradeOutcome {
        completed: true,
        status: ExerciseStatus::Completed,
        feedback: None,
        feedback_error: None,
    }
}
