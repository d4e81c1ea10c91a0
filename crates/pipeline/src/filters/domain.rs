//! Filter courses by vocational domain.

use crate::traits::{Filter, FilterContext};
use anyhow::{Context, Result};
use corpus::CourseId;

/// Keeps courses whose domain matches, ignoring ASCII case.
/// Courses without a domain are dropped.
pub struct DomainFilter {
    domain: String,
}

impl DomainFilter {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
        }
    }
}

impl Filter for DomainFilter {
    fn name(&self) -> &str {
        "DomainFilter"
    }

    fn apply(&self, candidates: Vec<CourseId>, context: &FilterContext<'_>) -> Result<Vec<CourseId>> {
        let mut kept = Vec::with_capacity(candidates.len());
        for course_id in candidates {
            let course = context
                .corpus
                .get(&course_id)
                .with_context(|| format!("DomainFilter could not resolve course {course_id}"))?;
            let matches = course
                .domain
                .as_deref()
                .is_some_and(|domain| domain.eq_ignore_ascii_case(&self.domain));
            if matches {
                kept.push(course_id);
            }
        }
        Ok(kept)
    }
}
