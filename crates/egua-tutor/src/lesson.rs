//! Lesson catalog for the Égua tutor.
//!
//! This module provides types and functions for loading lessons and their
//! exercises, either from the catalog embedded in the crate or from a user
//! supplied JSON file, and validating the catalog's constraints.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TutorError};

/// Maximum allowed catalog file size in bytes (1MB).
pub const MAX_CATALOG_SIZE: u64 = 1024 * 1024;

/// Name reported in errors about the embedded catalog.
const BUILTIN_SOURCE: &str = "<built-in>";

/// The catalog shipped with the crate.
const BUILTIN_CATALOG: &str = include_str!("../data/lessons.json");

/// A gradeable coding prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
    /// Stable identifier.
    pub id: String,

    /// Short title shown to learners.
    pub title: String,

    /// What the learner is asked to do.
    pub description: String,

    /// Output a correct submission must produce, compared byte for byte.
    pub expected_output: String,

    /// Reference solution, used only to enrich feedback prompts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_code: Option<String>,
}

/// A lesson: explanatory content plus its exercises.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    /// Stable identifier.
    pub id: String,

    /// Lesson title.
    pub title: String,

    /// One-line summary.
    pub description: String,

    /// Lesson body, plain text.
    pub content: String,

    /// Position of the lesson in the course.
    pub order: u32,

    /// Exercises in presentation order.
    #[serde(default)]
    pub exercises: Vec<Exercise>,
}

impl Lesson {
    /// Looks up one of this lesson's exercises.
    #[must_use]
    pub fn exercise(&self, id: &str) -> Option<&Exercise> {
        self.exercises.iter().find(|exercise| exercise.id == id)
    }
}

/// On-disk shape of a catalog file.
#[derive(Debug, Deserialize)]
struct CatalogFile {
    lessons: Vec<Lesson>,
}

/// Immutable collection of lessons, sorted by `order`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LessonCatalog {
    lessons: Vec<Lesson>,
}

impl LessonCatalog {
    /// Builds a catalog from lessons, validating ids and sorting by `order`.
    ///
    /// # Errors
    ///
    /// Returns `TutorError::CatalogInvalid` on duplicate lesson or exercise ids,
    /// or on blank ids.
    pub fn new(lessons: Vec<Lesson>) -> Result<Self> {
        Self::from_lessons(BUILTIN_SOURCE, lessons)
    }

    /// Returns the catalog embedded in the crate.
    ///
    /// # Errors
    ///
    /// Returns `TutorError::CatalogInvalid` if the embedded data is malformed.
    pub fn builtin() -> Result<Self> {
        Self::parse(BUILTIN_SOURCE, BUILTIN_CATALOG)
    }

    /// Loads a catalog from the given file path.
    ///
    /// Validates that:
    /// - The file exists
    /// - The file size is within the 1MB limit
    /// - The content is valid UTF-8 and valid catalog JSON
    ///
    /// # Errors
    ///
    /// Returns `TutorError::CatalogNotFound` if the file doesn't exist.
    /// Returns `TutorError::CatalogTooLarge` if the file exceeds 1MB.
    /// Returns `TutorError::CatalogEncodingError` if the file is not valid UTF-8.
    /// Returns `TutorError::CatalogInvalid` if the JSON or ids are invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let metadata = std::fs::metadata(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TutorError::catalog_not_found(path)
            } else {
                TutorError::Io(e)
            }
        })?;

        let file_size = metadata.len();
        if file_size > MAX_CATALOG_SIZE {
            return Err(TutorError::catalog_too_large(path, file_size / 1024));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::InvalidData {
                TutorError::catalog_encoding(path)
            } else {
                TutorError::Io(e)
            }
        })?;

        Self::parse(&path.display().to_string(), &content)
    }

    /// Loads the catalog at `path`, or the built-in one when `path` is `None`.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`LessonCatalog::load`] and [`LessonCatalog::builtin`].
    pub fn load_or_builtin(path: Option<&str>) -> Result<Self> {
        path.map_or_else(Self::builtin, Self::load)
    }

    fn parse(source_name: &str, content: &str) -> Result<Self> {
        let file: CatalogFile = serde_json::from_str(content)
            .map_err(|e| TutorError::catalog_invalid(source_name, e.to_string()))?;
        Self::from_lessons(source_name, file.lessons)
    }

    fn from_lessons(source_name: &str, mut lessons: Vec<Lesson>) -> Result<Self> {
        let mut lesson_ids = HashSet::new();
        let mut exercise_ids = HashSet::new();

        for lesson in &lessons {
            if lesson.id.trim().is_empty() {
                return Err(TutorError::catalog_invalid(
                    source_name,
                    format!("lesson '{}' has an empty id", lesson.title),
                ));
            }
            if !lesson_ids.insert(lesson.id.as_str()) {
                return Err(TutorError::catalog_invalid(
                    source_name,
                    format!("duplicate lesson id '{}'", lesson.id),
                ));
            }

            for exercise in &lesson.exercises {
                if exercise.id.trim().is_empty() {
                    return Err(TutorError::catalog_invalid(
                        source_name,
                        format!("exercise '{}' has an empty id", exercise.title),
                    ));
                }
                if !exercise_ids.insert(exercise.id.as_str()) {
                    return Err(TutorError::catalog_invalid(
                        source_name,
                        format!("duplicate exercise id '{}'", exercise.id),
                    ));
                }
            }
        }

        lessons.sort_by_key(|lesson| lesson.order);
        Ok(Self { lessons })
    }

    /// All lessons, ordered.
    #[must_use]
    pub fn lessons(&self) -> &[Lesson] {
        &self.lessons
    }

    /// Looks up a lesson by id.
    ///
    /// # Errors
    ///
    /// Returns `TutorError::LessonNotFound` for unknown ids.
    pub fn lesson(&self, id: &str) -> Result<&Lesson> {
        self.lessons
            .iter()
            .find(|lesson| lesson.id == id)
            .ok_or_else(|| TutorError::lesson_not_found(id))
    }

    /// Looks up an exercise by id, returning it with its owning lesson.
    ///
    /// # Errors
    ///
    /// Returns `TutorError::ExerciseNotFound` for unknown ids.
    pub fn find_exercise(&self, id: &str) -> Result<(&Lesson, &Exercise)> {
        self.lessons
            .iter()
            .find_map(|lesson| lesson.exercise(id).map(|exercise| (lesson, exercise)))
            .ok_or_else(|| TutorError::exercise_not_found(id))
    }

    /// Total number of exercises across all lessons.
    #[must_use]
    pub fn exercise_count(&self) -> usize {
        self.lessons.iter().map(|lesson| lesson.exercises.len()).sum()
    }
}
