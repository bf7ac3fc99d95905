//! Markdown report generation for learner progress.
//!
//! This module provides the [`MarkdownGenerator`] struct for converting a
//! [`ProgressReport`] into a human-readable Markdown document. The generated
//! report includes:
//!
//! - A summary table with completion totals
//! - The next exercise to work on
//! - One table per lesson with exercise status and attempts
//!
//! # Example
//!
//! ```rust
//! use egua_report::{MarkdownGenerator, ProgressReport};
//!
//! let report = ProgressReport {
//!     learner_id: "ana".to_string(),
//!     ..Default::default()
//! };
//!
//! let generator = MarkdownGenerator::new(&report);
//! let markdown = generator.generate();
//! assert!(markdown.contains("# Égua Progress Report: ana"));
//! ```

use chrono::{DateTime, Utc};
use std::fmt::Write;

use crate::{LessonReport, ProgressReport};

/// Generates Markdown reports from learner progress.
pub struct MarkdownGenerator<'a> {
    report: &'a ProgressReport,
}

impl<'a> MarkdownGenerator<'a> {
    /// Creates a new Markdown generator for the given report.
    #[must_use]
    pub const fn new(report: &'a ProgressReport) -> Self {
        Self { report }
    }

    /// Generates the complete Markdown report.
    #[must_use]
    pub fn generate(&self) -> String {
        let mut output = String::new();

        self.write_title(&mut output);
        self.write_summary(&mut output);
        self.write_next_up(&mut output);
        self.write_lessons(&mut output);
        self.write_footer(&mut output);

        output
    }

    fn write_title(&self, output: &mut String) {
        let _ = writeln!(
            output,
            "# Égua Progress Report: {}\n",
            escape_markdown(&self.report.learner_id)
        );
    }

    fn write_summary(&self, output: &mut String) {
        let summary = &self.report.summary;

        let _ = writeln!(output, "## Summary\n");
        let _ = writeln!(output, "| Metric | Value |");
        let _ = writeln!(output, "|--------|-------|");
        let _ = writeln!(
            output,
            "| Lessons Completed | {} / {} |",
            summary.lessons_completed, summary.lessons_total
        );
        let _ = writeln!(
            output,
            "| Exercises Completed | {} / {} ({}%) |",
            summary.exercises_completed, summary.exercises_total, summary.completion_percent
        );
        let _ = writeln!(output, "| Total Attempts | {} |", summary.total_attempts);
        let _ = writeln!(output);
    }

    fn write_next_up(&self, output: &mut String) {
        let _ = writeln!(output, "## Next Up\n");

        match self.report.next_exercise() {
            Some((lesson, exercise)) => {
                let _ = writeln!(
                    output,
                    "Continue with **{}** in *{}*.\n",
                    escape_markdown(&exercise.title),
                    escape_markdown(&lesson.title)
                );
            }
            None if self.report.lessons.is_empty() => {
                let _ = writeln!(output, "No lessons available.\n");
            }
            None => {
                let _ = writeln!(output, "All exercises completed. Parabéns!\n");
            }
        }
    }

    fn write_lessons(&self, output: &mut String) {
        let _ = writeln!(output, "## Lessons\n");

        if self.report.lessons.is_empty() {
            let _ = writeln!(output, "*No lessons in the catalog.*\n");
            return;
        }

        for lesson in &self.report.lessons {
            write_lesson(output, lesson);
        }
    }

    fn write_footer(&self, output: &mut String) {
        let _ = writeln!(output, "---");
        let _ = writeln!(
            output,
            "*Generated by Égua Tutor at {}*",
            format_timestamp(&self.report.generated_at)
        );
    }
}

fn write_lesson(output: &mut String, lesson: &LessonReport) {
    let _ = writeln!(
        output,
        "### {}. {}\n",
        lesson.order,
        escape_markdown(&lesson.title)
    );
    let _ = writeln!(output, "Status: {}\n", lesson.status);

    if lesson.exercises.is_empty() {
        let _ = writeln!(output, "*No exercises.*\n");
        return;
    }

    let _ = writeln!(output, "| Exercise | Status | Attempts | Last Attempt |");
    let _ = writeln!(output, "|----------|--------|----------|--------------|");
    for exercise in &lesson.exercises {
        let last = exercise
            .last_attempt_at
            .as_ref()
            .map_or_else(|| "-".to_string(), format_timestamp);
        let _ = writeln!(
            output,
            "| {} | {} | {} | {} |",
            escape_markdown(&exercise.title),
            exercise.status,
            exercise.attempts,
            last
        );
    }
    let _ = writeln!(output);
}

// ============================================================================
// Helper Functions
// ============================================================================

fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Escapes Markdown control characters so titles render literally.
fn escape_markdown(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for ch in text.chars() {
        match ch {
            '*' | '_' | '`' | '#' | '[' | ']' | '(' | ')' | '!' | '\\' | '<' | '>' | '|' => {
                result.push('\\');
                result.push(ch);
            }
            '\n' => result.push_str("<br>"),
            _ => result.push(ch),
        }
    }

    result
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{ExerciseReport, ProgressStatus, ReportSummary};

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn sample_report() -> ProgressReport {
        ProgressReport {
            learner_id: "ana".to_string(),
            generated_at: at("2026-03-03T08:00:00Z"),
            summary: ReportSummary {
                lessons_total: 2,
                lessons_completed: 1,
                exercises_total: 2,
                exercises_completed: 1,
                completion_percent: 50,
                total_attempts: 3,
            },
            lessons: vec![
                LessonReport {
                    id: "ola-mundo".to_string(),
                    title: "Hello World em Égua".to_string(),
                    order: 1,
                    status: ProgressStatus::Completed,
                    exercises: vec![ExerciseReport {
                        id: "primeiro-programa".to_string(),
                        title: "Seu primeiro programa".to_string(),
                        status: ProgressStatus::Completed,
                        attempts: 2,
                        last_attempt_at: Some(at("2026-03-01T12:00:00Z")),
                    }],
                },
                LessonReport {
                    id: "variaveis".to_string(),
                    title: "Usando Variáveis".to_string(),
                    order: 3,
                    status: ProgressStatus::InProgress,
                    exercises: vec![ExerciseReport {
                        id: "nome-em-variavel".to_string(),
                        title: "Seu nome em uma variável".to_string(),
                        status: ProgressStatus::InProgress,
                        attempts: 1,
                        last_attempt_at: Some(at("2026-03-02T09:30:00Z")),
                    }],
                },
            ],
        }
    }

    fn generate_without_footer(report: &ProgressReport) -> String {
        let generator = MarkdownGenerator::new(report);
        let mut output = String::new();

        generator.write_title(&mut output);
        generator.write_summary(&mut output);
        generator.write_next_up(&mut output);
        generator.write_lessons(&mut output);

        output
    }

    #[test]
    fn test_full_report_snapshot() {
        insta::assert_snapshot!(generate_without_footer(&sample_report()), @r###"
        # Égua Progress Report: ana

        ## Summary

        | Metric | Value |
        |--------|-------|
        | Lessons Completed | 1 / 2 |
        | Exercises Completed | 1 / 2 (50%) |
        | Total Attempts | 3 |

        ## Next Up

        Continue with **Seu nome em uma variável** in *Usando Variáveis*.

        ## Lessons

        ### 1. Hello World em Égua

        Status: Completed

        | Exercise | Status | Attempts | Last Attempt |
        |----------|--------|----------|--------------|
        | Seu primeiro programa | Completed | 2 | 2026-03-01 12:00:00 UTC |

        ### 3. Usando Variáveis

        Status: In progress

        | Exercise | Status | Attempts | Last Attempt |
        |----------|--------|----------|--------------|
        | Seu nome em uma variável | In progress | 1 | 2026-03-02 09:30:00 UTC |
        "###);
    }

    #[test]
    fn test_footer_uses_generation_time() {
        let markdown = MarkdownGenerator::new(&sample_report()).generate();
        assert!(markdown.ends_with("*Generated by Égua Tutor at 2026-03-03 08:00:00 UTC*\n"));
    }

    #[test]
    fn test_all_completed() {
        let mut report = sample_report();
        report.lessons.truncate(1);
        let markdown = generate_without_footer(&report);
        assert!(markdown.contains("All exercises completed."));
    }

    #[test]
    fn test_empty_report() {
        let markdown = generate_without_footer(&ProgressReport::default());
        assert!(markdown.contains("No lessons available."));
        assert!(markdown.contains("*No lessons in the catalog.*"));
    }

    #[test]
    fn test_never_attempted_shows_dash() {
        let mut report = sample_report();
        report.lessons[1].exercises[0].last_attempt_at = None;
        report.lessons[1].exercises[0].attempts = 0;
        report.lessons[1].exercises[0].status = ProgressStatus::NotStarted;
        let markdown = generate_without_footer(&report);
        assert!(markdown.contains("| Seu nome em uma variável | Not started | 0 | - |"));
    }

    #[test]
    fn test_escape_markdown() {
        assert_eq!(escape_markdown("a|b"), "a\\|b");
        assert_eq!(escape_markdown("*x*"), "\\*x\\*");
        assert_eq!(escape_markdown("l1\nl2"), "l1<br>l2");
        assert_eq!(escape_markdown("Olá, Mundo"), "Olá, Mundo");
    }
}
