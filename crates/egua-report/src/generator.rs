//! Builds a [`ProgressReport`] from a [`ReportInput`].

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::{
    ExerciseReport, LessonInput, LessonReport, ProgressReport, ProgressStatus, RecordInput,
    ReportInput, ReportSummary,
};

/// Generates progress reports.
///
/// Records that do not match any exercise in the outline are ignored.
#[derive(Debug, Clone)]
pub struct ReportGenerator {
    input: ReportInput,
}

impl ReportGenerator {
    /// Creates a generator for the given input.
    #[must_use]
    pub const fn new(input: ReportInput) -> Self {
        Self { input }
    }

    /// Generates the report, stamped with the current time.
    #[must_use]
    pub fn generate(&self) -> ProgressReport {
        self.generate_at(Utc::now())
    }

    /// Generates the report with an explicit generation time.
    #[must_use]
    pub fn generate_at(&self, generated_at: DateTime<Utc>) -> ProgressReport {
        let records: HashMap<(&str, &str), &RecordInput> = self
            .input
            .records
            .iter()
            .map(|record| {
                (
                    (record.lesson_id.as_str(), record.exercise_id.as_str()),
                    record,
                )
            })
            .collect();

        let mut lessons: Vec<LessonReport> = self
            .input
            .lessons
            .iter()
            .map(|lesson| lesson_report(lesson, &records))
            .collect();
        lessons.sort_by_key(|lesson| lesson.order);

        ProgressReport {
            learner_id: self.input.learner_id.clone(),
            generated_at,
            summary: summarize(&lessons),
            lessons,
        }
    }
}

fn lesson_report(
    lesson: &LessonInput,
    records: &HashMap<(&str, &str), &RecordInput>,
) -> LessonReport {
    let exercises: Vec<ExerciseReport> = lesson
        .exercises
        .iter()
        .map(|exercise| {
            let record = records.get(&(lesson.id.as_str(), exercise.id.as_str()));
            ExerciseReport {
                id: exercise.id.clone(),
                title: exercise.title.clone(),
                status: match record {
                    None => ProgressStatus::NotStarted,
                    Some(record) if record.completed => ProgressStatus::Completed,
                    Some(_) => ProgressStatus::InProgress,
                },
                attempts: record.map_or(0, |r| r.attempts),
                last_attempt_at: record.map(|r| r.updated_at),
            }
        })
        .collect();

    LessonReport {
        id: lesson.id.clone(),
        title: lesson.title.clone(),
        order: lesson.order,
        status: lesson_status(&exercises),
        exercises,
    }
}

fn lesson_status(exercises: &[ExerciseReport]) -> ProgressStatus {
    if !exercises.is_empty() && exercises.iter().all(|e| e.status.is_completed()) {
        ProgressStatus::Completed
    } else if exercises
        .iter()
        .any(|e| e.status != ProgressStatus::NotStarted)
    {
        ProgressStatus::InProgress
    } else {
        ProgressStatus::NotStarted
    }
}

fn summarize(lessons: &[LessonReport]) -> ReportSummary {
    let exercises = || lessons.iter().flat_map(|lesson| lesson.exercises.iter());

    let exercises_total = exercises().count();
    let exercises_completed = exercises().filter(|e| e.status.is_completed()).count();
    let completion_percent = if exercises_total == 0 {
        0
    } else {
        u8::try_from(exercises_completed * 100 / exercises_total).unwrap_or(100)
    };

    ReportSummary {
        lessons_total: lessons.len(),
        lessons_completed: lessons.iter().filter(|l| l.status.is_completed()).count(),
        exercises_total,
        exercises_completed,
        completion_percent,
        total_attempts: exercises().map(|e| e.attempts).sum(),
    }
}
