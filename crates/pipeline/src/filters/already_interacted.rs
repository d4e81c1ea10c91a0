//! Filter to remove courses the learner has already interacted with.
//!
//! This is typically the first filter in the pipeline, as there's no
//! point in recommending a course the learner is already taking.

use crate::traits::{Filter, FilterContext};
use anyhow::Result;
use corpus::CourseId;

/// Removes candidates present in `FilterContext::interacted`.
///
/// ## Algorithm
/// Uses the HashSet in the context for O(1) lookups.
pub struct AlreadyInteractedFilter;

impl Filter for AlreadyInteractedFilter {
    fn name(&self) -> &str {
        "AlreadyInteractedFilter"
    }

    fn apply(&self, candidates: Vec<CourseId>, context: &FilterContext<'_>) -> Result<Vec<CourseId>> {
        let filtered: Vec<CourseId> = candidates
            .into_iter()
            .filter(|course_id| !context.interacted.contains(course_id))
            .collect();
        Ok(filtered)
    }
}
