//! Exact-match filtering on free-form course attributes.
//!
//! A list-valued attribute matches when any of its values equals the pin.

use crate::traits::{Filter, FilterContext};
use anyhow::{Context, Result};
use corpus::{Course, CourseId};

use crate::refine::WILDCARD;

/// Values an attribute takes on a course. A course that does not declare
/// the attribute reads as the single value [`WILDCARD`].
pub fn attribute_values<'c>(course: &'c Course, name: &str) -> Vec<&'c str> {
    match course.attributes.get(name) {
        Some(value) => value.values().iter().map(String::as_str).collect(),
        None => vec![WILDCARD],
    }
}

/// Keeps courses whose attribute `name` equals `value`.
///
/// Build these from `FacetCatalog::resolve_filters` so that names and values
/// the corpus has never seen are dropped before they reach the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeFilter {
    name: String,
    value: String,
}

impl AttributeFilter {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn attribute(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl Filter for AttributeFilter {
    fn name(&self) -> &str {
        "AttributeFilter"
    }

    fn apply(&self, candidates: Vec<CourseId>, context: &FilterContext<'_>) -> Result<Vec<CourseId>> {
        let mut kept = Vec::with_capacity(candidates.len());
        for course_id in candidates {
            let course = context
                .corpus
                .get(&course_id)
                .with_context(|| format!("AttributeFilter could not resolve course {course_id}"))?;
            if attribute_values(course, &self.name).contains(&self.value.as_str()) {
                kept.push(course_id);
            }
        }
        tracing::debug!(attribute = %self.name, value = %self.value, kept = kept.len(), "attribute filter");
        Ok(kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corpus::CourseStore;

    #[test]
    fn test_attribute_filter_exact_match() {
        let store = CourseStore::from_courses(vec![
            Course::new("1", "a").with_attribute("duration", "short"),
            Course::new("2", "b").with_attribute("duration", "long"),
            Course::new("3", "c"),
            Course::new("4", "d").with_attribute("duration", "short"),
        ])
        .unwrap();
        let context = FilterContext::new(&store);
        let candidates: Vec<CourseId> = store.ids().cloned().collect();

        let filtered = AttributeFilter::new("duration", "short")
            .apply(candidates, &context)
            .unwrap();
        assert_eq!(filtered, vec!["1".to_string(), "4".to_string()]);
    }

    #[test]
    fn test_list_valued_attribute_matches_any_value() {
        let store = CourseStore::from_courses(vec![
            Course::new("1", "a").with_attribute("language", vec!["en".to_string(), "de".to_string()]),
            Course::new("2", "b").with_attribute("language", "en"),
            Course::new("3", "c").with_attribute("language", "fr"),
        ])
        .unwrap();
        let context = FilterContext::new(&store);
        let candidates: Vec<CourseId> = store.ids().cloned().collect();

        let filtered = AttributeFilter::new("language", "de")
            .apply(candidates.clone(), &context)
            .unwrap();
        assert_eq!(filtered, vec!["1".to_string()]);

        let filtered = AttributeFilter::new("language", "en")
            .apply(candidates, &context)
            .unwrap();
        assert_eq!(filtered, vec!["1".to_string(), "2".to_string()]);
    }

    #[test]
    fn test_missing_attribute_reads_as_wildcard() {
        let course = Course::new("1", "a");
        assert_eq!(attribute_values(&course, "price"), vec![WILDCARD]);
    }
}
