//! Core traits for the filtering pipeline.
//!
//! This module defines the Filter trait that allows composable,
//! extensible filters to be applied to candidate course pools.

use std::collections::HashSet;

use anyhow::Result;
use corpus::{CourseId, CourseStore};

/// What filters may look at besides the candidates themselves
pub struct FilterContext<'a> {
    /// Corpus snapshot the request is served from
    pub corpus: &'a CourseStore,
    /// Courses the requesting learner already interacted with
    pub interacted: HashSet<CourseId>,
}

impl<'a> FilterContext<'a> {
    pub fn new(corpus: &'a CourseStore) -> Self {
        Self {
            corpus,
            interacted: HashSet::new(),
        }
    }

    pub fn with_interacted(mut self, interacted: HashSet<CourseId>) -> Self {
        self.interacted = interacted;
        self
    }
}

/// Core trait for filtering candidates.
///
/// All filters must implement this trait to be used in the FilterPipeline.
///
/// ## Design Note
/// - `Send + Sync` allows filters to be used in concurrent contexts
/// - Filters take ownership of the candidate list and return the survivors
///   in their input order
pub trait Filter: Send + Sync {
    /// Returns the name of this filter (for logging/debugging)
    fn name(&self) -> &str;

    /// Apply this filter to a set of candidates.
    ///
    /// # Returns
    /// * `Ok(Vec<CourseId>)` - The candidates that pass
    /// * `Err` - If a candidate cannot be resolved against the corpus
    fn apply(&self, candidates: Vec<CourseId>, context: &FilterContext<'_>) -> Result<Vec<CourseId>>;
}
