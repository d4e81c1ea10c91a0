//! Preference-based Recommender - learner affinity from interaction history
//!
//! Courses are described by binary facets (categories, tags, domain and
//! level), L2-normalised. A learner's preference vector is the
//! signal-weighted sum of the facet vectors of the courses they interacted
//! with.
//!
//! ## Algorithm
//! 1. Build the facet space from the corpus (sorted, so indices are stable)
//! 2. For every learner (in id order), add `weight(signal) · facets(course)`
//!    for each interaction; interactions on unknown courses are skipped
//! 3. Count distinct learners per course (popularity)
//! 4. Score a candidate as
//!    `(λ · cos(pref, course) + ln(1 + count)) / (λ + ln(1 + max_count))`
//!    which lies in [0, 1]; λ defaults to 10 · ln 10 so affinity dominates
//!    and popularity only separates near-ties
//!
//! ## Cold start
//! A learner registered without usable interactions is not scored as zeros:
//! `score` returns [`ScoreOutcome::Unavailable`] so the caller can fall back
//! to another strategy. A learner the model never saw is `UnknownLearner`.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use corpus::{
    CorpusVersion, Course, CourseId, CourseStore, Interaction, InteractionLog, LearnerId, Signal,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::error::{RecommenderError, Result};
use crate::snapshot::{CancelFlag, SnapshotCell};
use crate::text::{l2_normalize, sparse_cosine};
use crate::traits::Recommender;
use crate::types::{
    FitInput, ModelStamp, RecommenderKind, ScoreOutcome, ScoreQuery, UnavailableReason,
};

/// Tunables for the preference model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferenceConfig {
    pub viewed_weight: f64,
    pub enrolled_weight: f64,
    pub completed_weight: f64,
    /// Weight of a top rating; lower ratings scale linearly
    pub rated_weight: f64,
    /// Value of a top rating
    pub rating_scale: f64,
    /// λ: weight of facet affinity relative to popularity
    pub affinity_weight: f64,
    pub use_tags: bool,
    pub use_domain: bool,
    pub use_level: bool,
}

impl Default for PreferenceConfig {
    fn default() -> Self {
        Self {
            viewed_weight: 1.0,
            enrolled_weight: 1.5,
            completed_weight: 2.0,
            rated_weight: 2.0,
            rating_scale: 5.0,
            affinity_weight: 10.0 * std::f64::consts::LN_10,
            use_tags: true,
            use_domain: true,
            use_level: true,
        }
    }
}

impl PreferenceConfig {
    /// Contribution of one interaction to the learner's preference vector
    pub fn signal_weight(&self, interaction: &Interaction) -> f64 {
        match interaction.signal {
            Signal::Viewed => self.viewed_weight,
            Signal::Enrolled => self.enrolled_weight,
            Signal::Completed => self.completed_weight,
            Signal::Rated => {
                let scale = if self.rating_scale > 0.0 {
                    self.rating_scale
                } else {
                    1.0
                };
                let share = interaction
                    .strength
                    .map(|s| f64::from(s) / scale)
                    .unwrap_or(1.0)
                    .clamp(0.0, 1.0);
                self.rated_weight * share
            }
        }
    }

    fn course_facets(&self, course: &Course) -> BTreeSet<String> {
        let mut facets = BTreeSet::new();
        for category in &course.categories {
            facets.insert(format!("category:{}", category.to_lowercase()));
        }
        if self.use_tags {
            for tag in &course.tags {
                facets.insert(format!("tag:{}", tag.to_lowercase()));
            }
        }
        if self.use_domain {
            if let Some(domain) = &course.domain {
                facets.insert(format!("domain:{}", domain.to_lowercase()));
            }
        }
        if self.use_level {
            if let Some(level) = course.level {
                facets.insert(format!("level:{level}"));
            }
        }
        facets
    }
}

/// A fitted, immutable preference model
#[derive(Debug, Clone, Serialize)]
pub struct PreferenceModel {
    pub stamp: ModelStamp,
    affinity_weight: f64,
    facets: Vec<String>,
    course_facets: BTreeMap<CourseId, Vec<(usize, f64)>>,
    learners: BTreeMap<LearnerId, Vec<(usize, f64)>>,
    cold_learners: BTreeSet<LearnerId>,
    popularity: BTreeMap<CourseId, usize>,
    max_popularity: usize,
}

impl PreferenceModel {
    pub fn facets(&self) -> &[String] {
        &self.facets
    }

    /// True for learners known at fit time without usable interactions
    pub fn is_cold(&self, learner_id: &str) -> bool {
        self.cold_learners.contains(learner_id)
    }

    pub fn knows(&self, learner_id: &str) -> bool {
        self.learners.contains_key(learner_id) || self.is_cold(learner_id)
    }

    /// Number of distinct learners who interacted with the course
    pub fn popularity(&self, course_id: &str) -> usize {
        self.popularity.get(course_id).copied().unwrap_or(0)
    }

    /// Strongest facets of a learner, highest weight first
    pub fn top_facets(&self, learner_id: &str, n: usize) -> Option<Vec<(String, f64)>> {
        let vector = self.learners.get(learner_id)?;
        let mut facets: Vec<(String, f64)> = vector
            .iter()
            .map(|&(idx, weight)| (self.facets[idx].clone(), weight))
            .collect();
        facets.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        facets.truncate(n);
        Some(facets)
    }

    fn affinity(&self, learner: &[(usize, f64)], course_id: &str, course: &[(usize, f64)]) -> f64 {
        let popularity_term = |count: usize| (1.0 + count as f64).ln();
        let numerator = self.affinity_weight * sparse_cosine(learner, course)
            + popularity_term(self.popularity(course_id));
        let denominator = self.affinity_weight + popularity_term(self.max_popularity);
        if denominator > 0.0 {
            numerator / denominator
        } else {
            0.0
        }
    }
}

/// What one learner contributes to the model
struct LearnerSummary {
    learner_id: LearnerId,
    vector: Vec<(usize, f64)>,
    courses: BTreeSet<CourseId>,
    usable: usize,
    skipped: usize,
}

/// Preference recommender with an atomically swapped model snapshot
pub struct PreferenceRecommender {
    name: String,
    config: PreferenceConfig,
    model: SnapshotCell<PreferenceModel>,
    versions: AtomicU64,
}

impl PreferenceRecommender {
    /// Create an unfitted recommender named `preference` with default settings
    pub fn new() -> Self {
        Self::with_config(PreferenceConfig::default())
    }

    pub fn with_config(config: PreferenceConfig) -> Self {
        Self {
            name: "preference".to_string(),
            config,
            model: SnapshotCell::empty(),
            versions: AtomicU64::new(0),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Configure λ, the affinity weight (default: 10 · ln 10)
    pub fn with_affinity_weight(mut self, weight: f64) -> Self {
        self.config.affinity_weight = weight;
        self
    }

    pub fn config(&self) -> &PreferenceConfig {
        &self.config
    }

    pub fn model(&self) -> Option<Arc<PreferenceModel>> {
        self.model.load()
    }

    fn loaded_model(&self, expected: Option<CorpusVersion>) -> Result<Arc<PreferenceModel>> {
        let model = self
            .model
            .load()
            .ok_or_else(|| RecommenderError::stale(&self.name, "no model has been fitted yet"))?;

        if let Some(expected) = expected {
            if model.stamp.corpus_version != expected {
                return Err(RecommenderError::stale(
                    &self.name,
                    format!(
                        "fitted on corpus version {}, current corpus is version {}",
                        model.stamp.corpus_version, expected
                    ),
                ));
            }
        }
        Ok(model)
    }

    fn train(
        &self,
        corpus: &CourseStore,
        log: &InteractionLog,
        cancel: &CancelFlag,
    ) -> Result<PreferenceModel> {
        if corpus.is_empty() {
            return Err(RecommenderError::insufficient(&self.name, "the corpus is empty"));
        }

        // Step 1: facet space
        let per_course: Vec<(&CourseId, BTreeSet<String>)> = corpus
            .all()
            .map(|course| (&course.id, self.config.course_facets(course)))
            .collect();
        let facets: Vec<String> = per_course
            .iter()
            .flat_map(|(_, keys)| keys.iter().cloned())
            .collect::<BTreeSet<String>>()
            .into_iter()
            .collect();
        let facet_index: HashMap<&str, usize> = facets
            .iter()
            .enumerate()
            .map(|(idx, facet)| (facet.as_str(), idx))
            .collect();

        let course_facets: BTreeMap<CourseId, Vec<(usize, f64)>> = per_course
            .iter()
            .map(|(id, keys)| {
                let mut vector: Vec<(usize, f64)> = keys
                    .iter()
                    .map(|key| (facet_index[key.as_str()], 1.0))
                    .collect();
                vector.sort_by_key(|(idx, _)| *idx);
                l2_normalize(&mut vector);
                ((*id).clone(), vector)
            })
            .collect();

        cancel.check(&self.name)?;

        // Step 2: learner vectors
        let summaries: Vec<LearnerSummary> = log
            .profiles()
            .par_iter()
            .map(|profile| {
                let mut accumulated: BTreeMap<usize, f64> = BTreeMap::new();
                let mut courses = BTreeSet::new();
                let (mut usable, mut skipped) = (0, 0);

                for interaction in profile.interactions() {
                    let Some(vector) = course_facets.get(&interaction.course_id) else {
                        warn!(
                            "Skipping interaction of learner {} with unknown course {}",
                            profile.id, interaction.course_id
                        );
                        skipped += 1;
                        continue;
                    };
                    let weight = self.config.signal_weight(interaction);
                    for &(facet, value) in vector {
                        *accumulated.entry(facet).or_insert(0.0) += weight * value;
                    }
                    courses.insert(interaction.course_id.clone());
                    usable += 1;
                }

                LearnerSummary {
                    learner_id: profile.id.clone(),
                    vector: accumulated.into_iter().collect(),
                    courses,
                    usable,
                    skipped,
                }
            })
            .collect();

        cancel.check(&self.name)?;

        // Step 3: popularity and cold learners
        let mut learners = BTreeMap::new();
        let mut cold_learners = BTreeSet::new();
        let mut popularity: BTreeMap<CourseId, usize> = BTreeMap::new();
        let (mut total_usable, mut total_skipped) = (0, 0);

        for summary in summaries {
            total_usable += summary.usable;
            total_skipped += summary.skipped;
            if summary.usable == 0 {
                cold_learners.insert(summary.learner_id);
                continue;
            }
            for course in summary.courses {
                *popularity.entry(course).or_insert(0) += 1;
            }
            learners.insert(summary.learner_id, summary.vector);
        }

        if total_usable == 0 {
            return Err(RecommenderError::insufficient(
                &self.name,
                format!(
                    "no usable interactions ({} learners, {} interactions on unknown courses)",
                    log.learner_count(),
                    total_skipped
                ),
            ));
        }

        let max_popularity = popularity.values().copied().max().unwrap_or(0);
        debug!(
            "Preference model: {} facets, {} learners, {} cold, {} skipped interactions",
            facets.len(),
            learners.len(),
            cold_learners.len(),
            total_skipped
        );

        Ok(PreferenceModel {
            stamp: ModelStamp {
                model_version: 0,
                corpus_version: corpus.version(),
            },
            affinity_weight: self.config.affinity_weight,
            facets,
            course_facets,
            learners,
            cold_learners,
            popularity,
            max_popularity,
        })
    }
}

impl Default for PreferenceRecommender {
    fn default() -> Self {
        Self::new()
    }
}

impl Recommender for PreferenceRecommender {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> RecommenderKind {
        RecommenderKind::Preference
    }

    fn stamp(&self) -> Option<ModelStamp> {
        self.model.load().map(|model| model.stamp)
    }

    #[instrument(skip(self, input, cancel), fields(recommender = %self.name, interactions = input.interactions.len()))]
    fn fit(&self, input: &FitInput<'_>, cancel: &CancelFlag) -> Result<ModelStamp> {
        let mut model = self.train(input.corpus, input.interactions, cancel)?;
        cancel.check(&self.name)?;

        model.stamp.model_version = self.versions.fetch_add(1, Ordering::SeqCst) + 1;
        let stamp = model.stamp;
        info!(
            "Fitted preferences for {} learners over {} facets (model v{}, corpus v{})",
            model.learners.len(),
            model.facets.len(),
            stamp.model_version,
            stamp.corpus_version
        );
        self.model.publish(model);
        Ok(stamp)
    }

    #[instrument(skip(self, query, candidates), fields(learner_id = ?query.learner_id, candidates = candidates.len()))]
    fn score(&self, query: &ScoreQuery, candidates: &[CourseId]) -> Result<ScoreOutcome> {
        let model = self.loaded_model(query.expected_corpus)?;
        let learner_id = query.learner_id.as_deref().ok_or_else(|| {
            RecommenderError::InvalidRequest("preference scoring needs a learner id".to_string())
        })?;

        if model.is_cold(learner_id) {
            debug!("Learner {} is cold, preference scores unavailable", learner_id);
            return Ok(ScoreOutcome::Unavailable(UnavailableReason::ColdStart {
                learner_id: learner_id.to_string(),
            }));
        }
        let preference = model
            .learners
            .get(learner_id)
            .ok_or_else(|| RecommenderError::UnknownLearner(learner_id.to_string()))?;

        let rows: Vec<(&CourseId, &Vec<(usize, f64)>)> = candidates
            .iter()
            .map(|id| {
                model
                    .course_facets
                    .get(id)
                    .map(|row| (id, row))
                    .ok_or_else(|| RecommenderError::course_not_found(id))
            })
            .collect::<Result<_>>()?;

        let scores: HashMap<CourseId, f64> = rows
            .par_iter()
            .map(|(id, row)| ((*id).clone(), model.affinity(preference, id, row)))
            .collect();
        Ok(ScoreOutcome::Scored(scores))
    }

    fn export_model(&self) -> Result<Option<serde_json::Value>> {
        self.model
            .load()
            .map(|model| serde_json::to_value(&*model).map_err(RecommenderError::from))
            .transpose()
    }
}
