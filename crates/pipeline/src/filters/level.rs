//! Filter courses by difficulty level.

use crate::traits::{Filter, FilterContext};
use anyhow::{Context, Result};
use corpus::{CourseId, Level};

/// Keeps courses at or below a maximum level.
///
/// Courses without a declared level always pass; the catalogue treats a
/// missing level as "open to everyone".
pub struct LevelFilter {
    max_level: Level,
}

impl LevelFilter {
    pub fn at_most(max_level: Level) -> Self {
        Self { max_level }
    }
}

impl Filter for LevelFilter {
    fn name(&self) -> &str {
        "LevelFilter"
    }

    fn apply(&self, candidates: Vec<CourseId>, context: &FilterContext<'_>) -> Result<Vec<CourseId>> {
        let mut kept = Vec::with_capacity(candidates.len());
        for course_id in candidates {
            let course = context
                .corpus
                .get(&course_id)
                .with_context(|| format!("LevelFilter could not resolve course {course_id}"))?;
            if course.level.is_none_or(|level| level <= self.max_level) {
                kept.push(course_id);
            }
        }
        Ok(kept)
    }
}
