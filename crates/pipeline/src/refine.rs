//! Facet catalogue and split suggestion for interactive refinement.
//!
//! A learner narrows a ranked list by pinning course attributes
//! (`duration = short`, `certificate = yes`, ...). The catalogue knows which
//! attributes and values exist, turns requested pins into filters, and
//! proposes which of the still-open attributes to ask about next.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use corpus::{CourseId, CourseStore};
use serde::Serialize;
use tracing::debug;

use crate::filters::{attribute_values, AttributeFilter};

/// Value standing for "any value" of an attribute. Courses that do not
/// declare an attribute read as this value.
pub const WILDCARD: &str = "All";

/// Score mass below which a ranked list carries no usable ordering.
const MIN_SCORE_MASS: f64 = 1e-3;

/// Attribute names with the values observed in a corpus.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FacetCatalog {
    facets: BTreeMap<String, Vec<String>>,
}

impl FacetCatalog {
    /// Collect every attribute name and value. Each value list starts with
    /// [`WILDCARD`] followed by the observed values in sorted order; list-valued
    /// attributes contribute each of their values.
    pub fn from_corpus(corpus: &CourseStore) -> Self {
        let mut observed: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for course in corpus.all() {
            for (name, value) in &course.attributes {
                observed
                    .entry(name.clone())
                    .or_default()
                    .extend(value.values().iter().cloned());
            }
        }

        let facets = observed
            .into_iter()
            .map(|(name, values)| {
                let mut list = Vec::with_capacity(values.len() + 1);
                list.push(WILDCARD.to_string());
                list.extend(values.into_iter().filter(|v| v != WILDCARD));
                (name, list)
            })
            .collect();
        Self { facets }
    }

    pub fn names(&self) -> impl Iterator<Item = &String> + '_ {
        self.facets.keys()
    }

    pub fn values(&self, name: &str) -> Option<&[String]> {
        self.facets.get(name).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.facets.is_empty()
    }

    /// Split requested pins into the filters to apply and the facets that
    /// remain open.
    ///
    /// Pins naming an unknown attribute or an unseen value are ignored, as is
    /// a pin to [`WILDCARD`]; the facet then stays open.
    pub fn resolve_filters(
        &self,
        requested: &BTreeMap<String, String>,
    ) -> (Vec<AttributeFilter>, Vec<String>) {
        let mut applied = Vec::new();
        let mut remaining = Vec::new();

        for (name, values) in &self.facets {
            match requested.get(name) {
                Some(value) if value != WILDCARD && values.contains(value) => {
                    applied.push(AttributeFilter::new(name.clone(), value.clone()));
                }
                _ => remaining.push(name.clone()),
            }
        }

        for (name, value) in requested {
            if !self.facets.contains_key(name) {
                debug!(attribute = %name, value = %value, "ignoring pin on unknown attribute");
            }
        }
        (applied, remaining)
    }
}

/// Pick the open facet whose value partition best agrees with the ranking.
///
/// ## Algorithm
/// For each facet that actually partitions the list (at least two distinct
/// values among the ranked courses), compute
///
/// ```text
/// loss = Σ_i score_i · |{ j : value_j = value_i and score_j > score_i }| / Σ_i score_i
/// ```
///
/// i.e. how much score sits below better-scored courses sharing its value.
/// A list-valued attribute partitions by its whole value list.
/// The facet with the smallest loss wins; ties go to the earliest facet in
/// `remaining`. Returns `None` when the scores sum below 1e-3 or no facet
/// partitions the list.
pub fn suggest_split(
    ranked: &[(CourseId, f64)],
    corpus: &CourseStore,
    remaining: &[String],
) -> Option<String> {
    let mass: f64 = ranked.iter().map(|(_, score)| score).sum();
    if mass.is_nan() || mass < MIN_SCORE_MASS {
        return None;
    }

    let mut best: Option<(&String, f64)> = None;
    for facet in remaining {
        let values: Vec<Vec<&str>> = ranked
            .iter()
            .map(|(course_id, _)| {
                corpus
                    .get(course_id)
                    .map(|course| attribute_values(course, facet))
                    .unwrap_or_else(|_| vec![WILDCARD])
            })
            .collect();

        let distinct: HashSet<&[&str]> = values.iter().map(Vec::as_slice).collect();
        if distinct.len() < 2 {
            continue;
        }

        let mut loss = 0.0;
        for (i, (_, score_i)) in ranked.iter().enumerate() {
            let better = (0..ranked.len())
                .filter(|&j| values[j] == values[i] && ranked[j].1 > *score_i)
                .count();
            loss += *score_i * better as f64;
        }
        loss /= mass;
        debug!(facet = %facet, loss, "split candidate");

        if best.is_none_or(|(_, best_loss)| loss < best_loss) {
            best = Some((facet, loss));
        }
    }

    best.map(|(facet, _)| facet.clone())
}
