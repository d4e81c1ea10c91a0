//! The course corpus store.
//!
//! Courses live in a `Vec` in insertion order with a `HashMap` from id to
//! position for O(1) lookups. Every successful ingest bumps the corpus
//! version so that models fitted against an older corpus can be detected
//! as stale.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use tracing::{debug, info};

use crate::error::{CorpusError, Result};
use crate::parser;
use crate::types::{Course, CourseId, CorpusVersion};

/// How an ingest combines new courses with the current corpus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IngestMode {
    /// Drop every existing course and keep only the new batch
    #[default]
    Replace,
    /// Append the new batch after the existing courses
    Extend,
}

#[derive(Debug, Clone, Default)]
pub struct CourseStore {
    courses: Vec<Course>,
    index: HashMap<CourseId, usize>,
    version: CorpusVersion,
}

impl CourseStore {
    /// Create an empty store at version 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a batch of courses (version 1)
    pub fn from_courses(courses: impl IntoIterator<Item = Course>) -> Result<Self> {
        let mut store = Self::new();
        store.ingest(courses, IngestMode::Replace)?;
        Ok(store)
    }

    /// Load a JSON or JSON Lines course file into a fresh store
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let courses = parser::parse_courses(path)?;
        info!("Loaded {} courses from {}", courses.len(), path.display());
        Self::from_courses(courses)
    }

    /// Ingest a batch of courses.
    ///
    /// ## Algorithm
    /// 1. Validate the whole batch first: ids must be non-empty and unique
    ///    within the batch, and for `Extend` must not collide with the corpus
    /// 2. Only then apply the batch and bump the version
    ///
    /// A failed ingest leaves the store untouched.
    pub fn ingest(
        &mut self,
        courses: impl IntoIterator<Item = Course>,
        mode: IngestMode,
    ) -> Result<CorpusVersion> {
        let batch: Vec<Course> = courses.into_iter().collect();

        let mut seen: HashSet<&str> = HashSet::with_capacity(batch.len());
        for course in &batch {
            if course.id.trim().is_empty() {
                return Err(CorpusError::ValidationError(format!(
                    "course with title '{}' has an empty id",
                    course.title
                )));
            }
            let collides = mode == IngestMode::Extend && self.index.contains_key(&course.id);
            if !seen.insert(course.id.as_str()) || collides {
                return Err(CorpusError::DuplicateCourse(course.id.clone()));
            }
        }

        if mode == IngestMode::Replace {
            self.courses.clear();
            self.index.clear();
        }

        let added = batch.len();
        for course in batch {
            self.index.insert(course.id.clone(), self.courses.len());
            self.courses.push(course);
        }
        self.version += 1;

        debug!(
            "Ingested {} courses ({:?}), corpus now {} courses at version {}",
            added,
            mode,
            self.courses.len(),
            self.version
        );
        Ok(self.version)
    }

    /// Look up a course by id
    pub fn get(&self, course_id: &str) -> Result<&Course> {
        self.index
            .get(course_id)
            .map(|&pos| &self.courses[pos])
            .ok_or_else(|| CorpusError::NotFound(course_id.to_string()))
    }

    pub fn contains(&self, course_id: &str) -> bool {
        self.index.contains_key(course_id)
    }

    /// Iterate over all courses in insertion order.
    ///
    /// The iterator is lazy and borrowing; calling `all()` again restarts
    /// from the first course.
    pub fn all(&self) -> std::slice::Iter<'_, Course> {
        self.courses.iter()
    }

    /// Course ids in insertion order
    pub fn ids(&self) -> impl Iterator<Item = &CourseId> + '_ {
        self.courses.iter().map(|c| &c.id)
    }

    pub fn len(&self) -> usize {
        self.courses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.courses.is_empty()
    }

    pub fn version(&self) -> CorpusVersion {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn course(id: &str, title: &str) -> Course {
        Course::new(id, title)
    }

    fn create_test_store() -> CourseStore {
        CourseStore::from_courses(vec![
            course("C1", "python programming basics"),
            course("C2", "advanced python programming"),
            course("C3", "cooking fundamentals"),
        ])
        .unwrap()
    }

    #[test]
    fn test_empty_store() {
        let store = CourseStore::new();
        assert!(store.is_empty());
        assert_eq!(store.version(), 0);
        assert!(matches!(store.get("C1"), Err(CorpusError::NotFound(id)) if id == "C1"));
    }

    #[test]
    fn test_all_preserves_insertion_order_and_restarts() {
        let store = create_test_store();

        let first: Vec<&str> = store.all().map(|c| c.id.as_str()).collect();
        let second: Vec<&str> = store.all().map(|c| c.id.as_str()).collect();

        assert_eq!(first, vec!["C1", "C2", "C3"]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_replace_bumps_version() {
        let mut store = create_test_store();
        assert_eq!(store.version(), 1);

        let version = store
            .ingest(vec![course("C9", "statistics")], IngestMode::Replace)
            .unwrap();

        assert_eq!(version, 2);
        assert_eq!(store.len(), 1);
        assert!(store.get("C1").is_err());
        assert_eq!(store.get("C9").unwrap().title, "statistics");
    }

    #[test]
    fn test_extend_appends() {
        let mut store = create_test_store();
        store
            .ingest(vec![course("C4", "baking")], IngestMode::Extend)
            .unwrap();

        let ids: Vec<&CourseId> = store.ids().collect();
        assert_eq!(ids, vec!["C1", "C2", "C3", "C4"]);
        assert_eq!(store.get("C4").unwrap().title, "baking");
        assert_eq!(store.version(), 2);
    }

    #[test]
    fn test_failed_ingest_leaves_store_unchanged() {
        let mut store = create_test_store();

        let result = store.ingest(
            vec![course("C4", "baking"), course("C1", "duplicate")],
            IngestMode::Extend,
        );
        assert!(matches!(result, Err(CorpusError::DuplicateCourse(id)) if id == "C1"));
        assert_eq!(store.len(), 3);
        assert_eq!(store.version(), 1);
        assert!(!store.contains("C4"));

        let result = store.ingest(
            vec![course("X", "a"), course("X", "b")],
            IngestMode::Replace,
        );
        assert!(matches!(result, Err(CorpusError::DuplicateCourse(_))));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_empty_id_rejected() {
        let mut store = CourseStore::new();
        let result = store.ingest(vec![course("  ", "nameless")], IngestMode::Replace);
        assert!(matches!(result, Err(CorpusError::ValidationError(_))));
        assert_eq!(store.version(), 0);
    }
}
