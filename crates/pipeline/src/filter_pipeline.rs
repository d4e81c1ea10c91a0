//! The FilterPipeline chains multiple filters using the builder pattern.

use anyhow::Result;
use corpus::CourseId;

use crate::traits::{Filter, FilterContext};

/// Chains multiple filters together into a processing pipeline.
///
/// ## Usage
/// ```ignore
/// let pipeline = FilterPipeline::new()
///     .add_filter(AlreadyInteractedFilter)
///     .add_filter(LevelFilter::at_most(Level::Intermediate));
///
/// let filtered = pipeline.apply(candidates, &context)?;
/// ```
pub struct FilterPipeline {
    filters: Vec<Box<dyn Filter>>,
}

impl FilterPipeline {
    /// Create a new empty FilterPipeline.
    pub fn new() -> Self {
        Self {
            filters: Vec::new(),
        }
    }

    /// Add a filter to the pipeline (builder pattern).
    pub fn add_filter(mut self, filter: impl Filter + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    /// Add a filter only when `condition` holds
    pub fn add_filter_if(self, condition: bool, filter: impl Filter + 'static) -> Self {
        if condition { self.add_filter(filter) } else { self }
    }

    /// Names of the configured filters, in application order
    pub fn filter_names(&self) -> Vec<&str> {
        self.filters.iter().map(|f| f.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Apply all filters in sequence to the candidates.
    ///
    /// ## Algorithm
    /// 1. Start with the input candidates
    /// 2. For each filter in order: log the input count, apply, log the output count
    /// 3. Return the final filtered set
    pub fn apply(
        &self,
        candidates: Vec<CourseId>,
        context: &FilterContext<'_>,
    ) -> Result<Vec<CourseId>> {
        let mut current = candidates;
        for filter in &self.filters {
            tracing::debug!(
                "Applying filter: {} (input count: {})",
                filter.name(),
                current.len()
            );
            current = filter.apply(current, context)?;
            tracing::debug!(
                "Filter applied: {} (output count: {})",
                filter.name(),
                current.len()
            );
        }
        Ok(current)
    }
}

impl Default for FilterPipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::{AlreadyInteractedFilter, LevelFilter};
    use corpus::{Course, CourseStore, Level};

    fn create_test_store() -> CourseStore {
        CourseStore::from_courses(vec![
            Course::new("C1", "intro").with_level(Level::Beginner),
            Course::new("C2", "deep dive").with_level(Level::Advanced),
            Course::new("C3", "workshop").with_level(Level::Intermediate),
        ])
        .unwrap()
    }

    fn all_ids(store: &CourseStore) -> Vec<CourseId> {
        store.ids().cloned().collect()
    }

    #[test]
    fn test_empty_pipeline() {
        let store = create_test_store();
        let pipeline = FilterPipeline::new();
        let context = FilterContext::new(&store);

        let filtered = pipeline.apply(all_ids(&store), &context).unwrap();
        assert_eq!(filtered.len(), 3);
        assert!(pipeline.is_empty());
    }

    #[test]
    fn test_filters_compose_in_order() {
        let store = create_test_store();
        let context = FilterContext::new(&store).with_interacted(["C1".to_string()].into());

        let pipeline = FilterPipeline::new()
            .add_filter(AlreadyInteractedFilter)
            .add_filter(LevelFilter::at_most(Level::Intermediate));

        let filtered = pipeline.apply(all_ids(&store), &context).unwrap();
        assert_eq!(filtered, vec!["C3".to_string()]);
        assert_eq!(
            pipeline.filter_names(),
            vec!["AlreadyInteractedFilter", "LevelFilter"]
        );
    }

    #[test]
    fn test_conditional_filter() {
        let pipeline = FilterPipeline::new()
            .add_filter_if(false, AlreadyInteractedFilter)
            .add_filter_if(true, LevelFilter::at_most(Level::Beginner));
        assert_eq!(pipeline.len(), 1);
    }
}
