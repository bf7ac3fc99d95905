//! Learner progress persistence.
//!
//! A progress record exists per (learner, lesson, exercise). Records are
//! created on the first write for a key and updated in place afterwards, so
//! concurrent or repeated submissions never produce duplicates.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{Result, TutorError};

// ============================================================================
// ProgressKey / ProgressRecord
// ============================================================================

/// Composite key identifying one learner's progress on one exercise.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProgressKey {
    /// Learner identifier.
    pub learner_id: String,
    /// Lesson the exercise belongs to.
    pub lesson_id: String,
    /// Exercise identifier.
    pub exercise_id: String,
}

impl ProgressKey {
    /// Creates a key from its parts.
    #[must_use]
    pub fn new(
        learner_id: impl Into<String>,
        lesson_id: impl Into<String>,
        exercise_id: impl Into<String>,
    ) -> Self {
        Self {
            learner_id: learner_id.into(),
            lesson_id: lesson_id.into(),
            exercise_id: exercise_id.into(),
        }
    }
}

/// Persisted progress of a learner on a single exercise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    /// Learner identifier.
    pub learner_id: String,
    /// Lesson identifier.
    pub lesson_id: String,
    /// Exercise identifier.
    pub exercise_id: String,
    /// Whether the exercise has been passed. Never reset once `true`.
    pub completed: bool,
    /// Last code recorded for this exercise.
    pub code: String,
    /// Number of recorded submissions.
    pub attempts: u32,
    /// When the record was first written.
    pub created_at: DateTime<Utc>,
    /// When the record was last written.
    pub updated_at: DateTime<Utc>,
}

impl ProgressRecord {
    fn new(key: &ProgressKey, completed: bool, code: &str) -> Self {
        let now = Utc::now();
        Self {
            learner_id: key.learner_id.clone(),
            lesson_id: key.lesson_id.clone(),
            exercise_id: key.exercise_id.clone(),
            completed,
            code: code.to_string(),
            attempts: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// The composite key of this record.
    #[must_use]
    pub fn key(&self) -> ProgressKey {
        ProgressKey::new(&self.learner_id, &self.lesson_id, &self.exercise_id)
    }

    fn apply(&mut self, completed: bool, code: &str) {
        self.completed |= completed;
        code.clone_into(&mut self.code);
        self.attempts = self.attempts.saturating_add(1);
        self.updated_at = Utc::now();
    }
}

// ============================================================================
// ExerciseStatus
// ============================================================================

/// Learner-facing status of an exercise.
///
/// Transitions only move forward:
/// - `NotStarted` -> `InProgress` (a wrong answer was recorded)
/// - `NotStarted` | `InProgress` -> `Completed`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseStatus {
    /// No record exists.
    #[default]
    NotStarted,
    /// Attempted without passing.
    InProgress,
    /// Passed.
    Completed,
}

impl ExerciseStatus {
    /// Derives the status from an optional record.
    #[must_use]
    pub fn from_record(record: Option<&ProgressRecord>) -> Self {
        match record {
            None => Self::NotStarted,
            Some(record) if record.completed => Self::Completed,
            Some(_) => Self::InProgress,
        }
    }

    /// Returns `true` for `Completed`.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Combines exercise statuses into a lesson status.
    ///
    /// A lesson is completed when it has exercises and all are completed,
    /// not started when none has been touched, and in progress otherwise.
    #[must_use]
    pub fn aggregate(statuses: impl IntoIterator<Item = Self>) -> Self {
        let mut any_touched = false;
        let mut all_completed = true;
        let mut empty = true;

        for status in statuses {
            empty = false;
            any_touched |= status != Self::NotStarted;
            all_completed &= status.is_completed();
        }

        if !empty && all_completed {
            Self::Completed
        } else if any_touched {
            Self::InProgress
        } else {
            Self::NotStarted
        }
    }
}

// ============================================================================
// ProgressStore
// ============================================================================

/// Storage for progress records, keyed by [`ProgressKey`].
pub trait ProgressStore: Send {
    /// Returns the record for `key`, if any.
    fn find(&self, key: &ProgressKey) -> Option<ProgressRecord>;

    /// Creates or updates the record for `key` and returns the stored record.
    ///
    /// A new record starts with one attempt. Updates bump the attempt count,
    /// replace the code and keep `completed` set once it has been set.
    ///
    /// # Errors
    ///
    /// Returns `TutorError::ProgressWriteError` when the record cannot be
    /// persisted. The store is left unchanged in that case.
    fn upsert(&mut self, key: &ProgressKey, completed: bool, code: &str)
        -> Result<ProgressRecord>;

    /// All records belonging to a learner.
    fn records_for(&self, learner_id: &str) -> Vec<ProgressRecord>;
}

/// Progress store shared between request handlers.
pub type SharedStore = Arc<Mutex<Box<dyn ProgressStore>>>;

/// Wraps a store for sharing across tasks.
#[must_use]
pub fn shared(store: impl ProgressStore + 'static) -> SharedStore {
    Arc::new(Mutex::new(Box::new(store)))
}

fn upsert_into(
    records: &mut BTreeMap<ProgressKey, ProgressRecord>,
    key: &ProgressKey,
    completed: bool,
    code: &str,
) -> ProgressRecord {
    records
        .entry(key.clone())
        .and_modify(|record| record.apply(completed, code))
        .or_insert_with(|| ProgressRecord::new(key, completed, code))
        .clone()
}

fn collect_for(
    records: &BTreeMap<ProgressKey, ProgressRecord>,
    learner_id: &str,
) -> Vec<ProgressRecord> {
    records
        .values()
        .filter(|record| record.learner_id == learner_id)
        .cloned()
        .collect()
}

/// Volatile in-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: BTreeMap<ProgressKey, ProgressRecord>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressStore for MemoryStore {
    fn find(&self, key: &ProgressKey) -> Option<ProgressRecord> {
        self.records.get(key).cloned()
    }

    fn upsert(
        &mut self,
        key: &ProgressKey,
        completed: bool,
        code: &str,
    ) -> Result<ProgressRecord> {
        Ok(upsert_into(&mut self.records, key, completed, code))
    }

    fn records_for(&self, learner_id: &str) -> Vec<ProgressRecord> {
        collect_for(&self.records, learner_id)
    }
}

/// On-disk layout of the JSON store.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    records: Vec<ProgressRecord>,
}

/// Store persisted as a single JSON file, rewritten on every upsert.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    records: BTreeMap<ProgressKey, ProgressRecord>,
}

impl JsonFileStore {
    /// Opens the store at `path`. A missing file yields an empty store.
    ///
    /// # Errors
    ///
    /// Returns `TutorError::StoreCorrupted` if the file holds invalid JSON,
    /// or `TutorError::Io` if it cannot be read.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let records = match std::fs::read_to_string(&path) {
            Ok(contents) => {
                let file: StoreFile = serde_json::from_str(&contents)
                    .map_err(|e| TutorError::store_corrupted(&path, e.to_string()))?;
                file.records
                    .into_iter()
                    .map(|record| (record.key(), record))
                    .collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(TutorError::Io(e)),
        };

        tracing::debug!(path = %path.display(), records = records.len(), "Opened progress store");
        Ok(Self { path, records })
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, records: &BTreeMap<ProgressKey, ProgressRecord>) -> Result<()> {
        let file = StoreFile {
            records: records.values().cloned().collect(),
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| TutorError::progress_write(&self.path, e.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| TutorError::progress_write(&self.path, e.to_string()))?;
        }

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .and_then(|()| std::fs::rename(&tmp, &self.path))
            .map_err(|e| TutorError::progress_write(&self.path, e.to_string()))
    }
}

impl ProgressStore for JsonFileStore {
    fn find(&self, key: &ProgressKey) -> Option<ProgressRecord> {
        self.records.get(key).cloned()
    }

    fn upsert(
        &mut self,
        key: &ProgressKey,
        completed: bool,
        code: &str,
    ) -> Result<ProgressRecord> {
        let mut next = self.records.clone();
        let record = upsert_into(&mut next, key, completed, code);
        self.persist(&next)?;
        self.records = next;
        Ok(record)
    }

    fn records_for(&self, learner_id: &str) -> Vec<ProgressRecord> {
        collect_for(&self.records, learner_id)
    }
}
