//! End-to-end grading tests.
//!
//! These tests drive the grading gate with the built-in catalog and the
//! real progress stores, from submission through to the progress report.

use std::path::PathBuf;
use std::sync::Arc;

use egua_report::{
    ExerciseInput, LessonInput, ProgressStatus, RecordInput, ReportGenerator, ReportInput,
};
use egua_tutor::feedback::DisabledFeedback;
use egua_tutor::progress::shared;
use egua_tutor::{
    ExerciseStatus, GradingGate, JsonFileStore, LessonCatalog, MemoryStore, ProgressKey,
    ProgressStore, SharedStore, Submission, FEEDBACK_UNAVAILABLE,
};
use futures::future::join_all;

fn catalog() -> LessonCatalog {
    LessonCatalog::builtin().expect("built-in catalog loads")
}

fn gate(store: SharedStore) -> GradingGate {
    GradingGate::new(store, Arc::new(DisabledFeedback))
}

/// Returns a fresh path under the system temp directory.
fn temp_store_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("egua-it-{name}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir.join("progress.json")
}

// ============================================================================
// Grading
// ============================================================================

/// Every reference solution in the built-in catalog passes its own exercise.
#[tokio::test]
async fn test_reference_solutions_complete_every_exercise() {
    let catalog = catalog();
    let store = shared(MemoryStore::new());
    let gate = gate(store.clone());

    for lesson in catalog.lessons() {
        for exercise in &lesson.exercises {
            let code = exercise
                .expected_code
                .as_deref()
                .expect("built-in exercises carry a reference solution");
            let report = gate
                .run(Submission {
                    learner_id: "ana",
                    lesson_id: &lesson.id,
                    exercise,
                    code,
                })
                .await
                .expect("grading succeeds");

            assert!(report.outcome.completed, "{} should pass", exercise.id);
            assert_eq!(report.output, exercise.expected_output);
            assert!(report.outcome.feedback.is_none());
        }
    }

    let records = store.lock().await.records_for("ana");
    assert_eq!(records.len(), catalog.exercise_count());
    assert!(records.iter().all(|r| r.completed && r.attempts == 1));
}

/// A wrong answer records an attempt and reports unavailable feedback when
/// no generator is configured.
#[tokio::test]
async fn test_wrong_answer_without_feedback_provider() {
    let catalog = catalog();
    let (lesson, exercise) = catalog.find_exercise("primeiro-programa").unwrap();
    let store = shared(MemoryStore::new());

    let report = gate(store.clone())
        .run(Submission {
            learner_id: "ana",
            lesson_id: &lesson.id,
            exercise,
            code: "escreva(\"Ola Mundo\")",
        })
        .await
        .unwrap();

    assert!(!report.outcome.completed);
    assert_eq!(report.outcome.status, ExerciseStatus::InProgress);
    assert_eq!(report.output, "Ola Mundo");
    assert_eq!(
        report.outcome.feedback_error.as_deref(),
        Some(FEEDBACK_UNAVAILABLE)
    );

    let key = ProgressKey::new("ana", &lesson.id, &exercise.id);
    let record = store.lock().await.find(&key).unwrap();
    assert!(!record.completed);
    assert_eq!(record.attempts, 1);
}

/// Two identical correct submissions racing each other leave one record.
#[tokio::test]
async fn test_concurrent_double_submit_creates_one_record() {
    let catalog = catalog();
    let (lesson, exercise) = catalog.find_exercise("nome-em-variavel").unwrap();
    let store = shared(MemoryStore::new());
    let gate = gate(store.clone());
    let code = "var nome = \"Maria\"\nescreva(nome)";

    let results = join_all((0..2).map(|_| {
        gate.run(Submission {
            learner_id: "ana",
            lesson_id: &lesson.id,
            exercise,
            code,
        })
    }))
    .await;

    for result in results {
        assert!(result.unwrap().outcome.completed);
    }

    let records = store.lock().await.records_for("ana");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].attempts, 1);
}

/// A later wrong answer never clears a completion.
#[tokio::test]
async fn test_completion_survives_wrong_answer() {
    let catalog = catalog();
    let (lesson, exercise) = catalog.find_exercise("adicionando-comentarios").unwrap();
    let store = shared(MemoryStore::new());
    let gate = gate(store.clone());

    let submit = |code: &'static str| {
        gate.run(Submission {
            learner_id: "ana",
            lesson_id: &lesson.id,
            exercise,
            code,
        })
    };

    assert!(submit("# saudação\nescreva(\"Bom dia!\")").await.unwrap().outcome.completed);
    let second = submit("escreva(\"Boa noite!\")").await.unwrap();
    assert!(second.outcome.completed);
    assert_eq!(second.outcome.status, ExerciseStatus::Completed);

    let key = ProgressKey::new("ana", &lesson.id, &exercise.id);
    assert!(store.lock().await.find(&key).unwrap().completed);
}

// ============================================================================
// Persistence and Reports
// ============================================================================

/// Progress written through the gate survives reopening the store and feeds
/// the progress report.
#[tokio::test]
async fn test_file_store_progress_feeds_report() {
    let path = temp_store_path("report");
    let catalog = catalog();
    let (lesson, exercise) = catalog.find_exercise("primeiro-programa").unwrap();

    {
        let store = shared(JsonFileStore::open(&path).unwrap());
        let gate = gate(store);
        for code in ["escreva(\"Olá\")", "escreva(\"Olá, Mundo!\")"] {
            gate.run(Submission {
                learner_id: "ana",
                lesson_id: &lesson.id,
                exercise,
                code,
            })
            .await
            .unwrap();
        }
    }

    let reopened = JsonFileStore::open(&path).unwrap();
    let records = reopened.records_for("ana");
    assert_eq!(records.len(), 1);
    assert!(records[0].completed);
    assert_eq!(records[0].attempts, 2);

    let input = ReportInput {
        learner_id: "ana".to_string(),
        lessons: catalog
            .lessons()
            .iter()
            .map(|l| LessonInput {
                id: l.id.clone(),
                title: l.title.clone(),
                order: l.order,
                exercises: l
                    .exercises
                    .iter()
                    .map(|e| ExerciseInput {
                        id: e.id.clone(),
                        title: e.title.clone(),
                    })
                    .collect(),
            })
            .collect(),
        records: records
            .iter()
            .map(|r| RecordInput {
                lesson_id: r.lesson_id.clone(),
                exercise_id: r.exercise_id.clone(),
                completed: r.completed,
                attempts: r.attempts,
                updated_at: r.updated_at,
            })
            .collect(),
    };

    let report = ReportGenerator::new(input).generate();
    assert_eq!(report.lessons[0].status, ProgressStatus::Completed);
    assert_eq!(report.summary.exercises_completed, 1);
    assert_eq!(report.summary.total_attempts, 2);

    if let Some(dir) = path.parent() {
        let _ = std::fs::remove_dir_all(dir);
    }
}
