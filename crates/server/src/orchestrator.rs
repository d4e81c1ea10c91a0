//! # Recommendation Orchestrator
//!
//! This module coordinates one recommendation request end to end:
//! 1. Validate the request
//! 2. Resolve the candidate pool against one corpus snapshot
//! 3. Apply filters (already taken, level, domain, pinned attributes)
//! 4. Score with the topic and/or preference recommender (in parallel for hybrid)
//! 5. Blend, rank and truncate to `top_k`
//!
//! The orchestrator holds only shared handles, so cloning it is cheap and
//! every request reads whatever snapshots are published at that moment.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use corpus::{CourseId, CourseStore, InteractionLog, LearnerId, Level};
use pipeline::filters::{AlreadyInteractedFilter, AttributeFilter, DomainFilter, LevelFilter};
use pipeline::{suggest_split, FacetCatalog, FilterContext, FilterPipeline};
use recommenders::{
    Recommender, RecommenderDescriptor, RecommenderError, Registry, ScoreOutcome, ScoreQuery,
    SnapshotCell, UnavailableReason,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::config::{EngineConfig, HybridWeights};
use crate::error::{RecommendError, Result};

/// Source tag for items scored by both recommenders
pub const HYBRID_SOURCE: &str = "hybrid";

/// Which recommender(s) rank the candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Topic,
    Preference,
    #[default]
    Hybrid,
}

/// Candidate restrictions applied before scoring
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestFilters {
    /// Overrides the engine's `exclude_interacted` default
    pub exclude_interacted: Option<bool>,
    pub max_level: Option<Level>,
    pub domain: Option<String>,
    /// Attribute pins, e.g. `duration = short`
    pub attributes: BTreeMap<String, String>,
}

/// One recommendation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationRequest {
    pub learner_id: Option<LearnerId>,
    pub query_text: Option<String>,
    pub anchor_course: Option<CourseId>,
    /// Weighted interest labels for topic scoring
    pub interests: Option<BTreeMap<String, f64>>,
    /// Explicit candidates; the whole corpus when absent
    pub candidate_pool: Option<Vec<CourseId>>,
    /// Falls back to the engine's `default_top_k` when absent
    pub top_k: Option<usize>,
    pub strategy: Strategy,
    pub weights: Option<HybridWeights>,
    pub filters: RequestFilters,
}

impl Default for RecommendationRequest {
    fn default() -> Self {
        Self {
            learner_id: None,
            query_text: None,
            anchor_course: None,
            interests: None,
            candidate_pool: None,
            top_k: None,
            strategy: Strategy::default(),
            weights: None,
            filters: RequestFilters::default(),
        }
    }
}

impl RecommendationRequest {
    pub fn new(strategy: Strategy, top_k: usize) -> Self {
        Self {
            strategy,
            top_k: Some(top_k),
            ..Self::default()
        }
    }

    /// Topic ranking for free text
    pub fn topic(text: impl Into<String>, top_k: usize) -> Self {
        Self::new(Strategy::Topic, top_k).with_query_text(text)
    }

    /// Topic ranking of courses similar to `course_id`
    pub fn similar_to(course_id: impl Into<CourseId>, top_k: usize) -> Self {
        Self::new(Strategy::Topic, top_k).with_anchor(course_id)
    }

    pub fn preference(learner_id: impl Into<LearnerId>, top_k: usize) -> Self {
        Self::new(Strategy::Preference, top_k).with_learner(learner_id)
    }

    pub fn hybrid(learner_id: impl Into<LearnerId>, text: impl Into<String>, top_k: usize) -> Self {
        Self::new(Strategy::Hybrid, top_k)
            .with_learner(learner_id)
            .with_query_text(text)
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn with_learner(mut self, learner_id: impl Into<LearnerId>) -> Self {
        self.learner_id = Some(learner_id.into());
        self
    }

    pub fn with_query_text(mut self, text: impl Into<String>) -> Self {
        self.query_text = Some(text.into());
        self
    }

    pub fn with_anchor(mut self, course_id: impl Into<CourseId>) -> Self {
        self.anchor_course = Some(course_id.into());
        self
    }

    pub fn with_interests(mut self, interests: BTreeMap<String, f64>) -> Self {
        self.interests = Some(interests);
        self
    }

    pub fn with_candidate_pool<I, S>(mut self, pool: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<CourseId>,
    {
        self.candidate_pool = Some(pool.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_weights(mut self, topic: f64, preference: f64) -> Self {
        self.weights = Some(HybridWeights::new(topic, preference));
        self
    }

    pub fn with_exclude_interacted(mut self, exclude: bool) -> Self {
        self.filters.exclude_interacted = Some(exclude);
        self
    }

    pub fn with_max_level(mut self, level: Level) -> Self {
        self.filters.max_level = Some(level);
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.filters.domain = Some(domain.into());
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.attributes.insert(name.into(), value.into());
        self
    }

    fn has_topic_input(&self) -> bool {
        self.query_text.is_some() || self.anchor_course.is_some() || self.interests.is_some()
    }

    fn score_query(&self, corpus: &CourseStore) -> ScoreQuery {
        ScoreQuery {
            learner_id: self.learner_id.clone(),
            text: self.query_text.clone(),
            anchor_course: self.anchor_course.clone(),
            interests: self.interests.clone(),
            expected_corpus: Some(corpus.version()),
        }
    }
}

/// Final recommendation returned to the caller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub course_id: CourseId,
    pub title: String,
    pub score: f64,
    /// Name of the recommender that produced the score, or `hybrid`
    pub source: String,
}

/// Ranked recommendations plus what the learner could narrow by next
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Refinement {
    pub recommendations: Vec<Recommendation>,
    /// Attribute pins that were actually applied
    pub applied_filters: BTreeMap<String, String>,
    /// Attributes the learner has not pinned yet
    pub remaining_facets: Vec<String>,
    /// The remaining attribute that best separates the ranked courses
    pub suggested_split: Option<String>,
}

/// Everything a request produced before truncation
struct RankedRun {
    corpus: Arc<CourseStore>,
    top_k: usize,
    ranked: Vec<(CourseId, f64)>,
    source: String,
    applied: BTreeMap<String, String>,
    remaining: Vec<String>,
}

/// What the scoring stage settled on
enum Sources {
    Topic,
    Preference,
    Hybrid(HybridWeights),
}

/// Stateless request handler over shared engine snapshots
#[derive(Clone)]
pub struct RecommendationOrchestrator {
    corpus: Arc<SnapshotCell<CourseStore>>,
    interactions: Arc<RwLock<InteractionLog>>,
    registry: Arc<Registry>,
    topic_name: String,
    preference_name: String,
    default_weights: HybridWeights,
    default_top_k: usize,
    exclude_interacted: bool,
}

impl RecommendationOrchestrator {
    /// Create an orchestrator over shared snapshots.
    ///
    /// # Arguments
    /// * `corpus` - Published corpus snapshot
    /// * `interactions` - Live interaction log (read for already-taken courses)
    /// * `registry` - Must contain recommenders named `topic` and `preference`
    /// * `config` - Source of default weights, `top_k` and filter defaults
    pub fn new(
        corpus: Arc<SnapshotCell<CourseStore>>,
        interactions: Arc<RwLock<InteractionLog>>,
        registry: Arc<Registry>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            corpus,
            interactions,
            registry,
            topic_name: crate::engine::TOPIC.to_string(),
            preference_name: crate::engine::PREFERENCE.to_string(),
            default_weights: config.weights,
            default_top_k: config.default_top_k,
            exclude_interacted: config.exclude_interacted,
        }
    }

    /// Use different registry names for the two recommenders
    pub fn with_recommender_names(
        mut self,
        topic: impl Into<String>,
        preference: impl Into<String>,
    ) -> Self {
        self.topic_name = topic.into();
        self.preference_name = preference.into();
        self
    }

    pub fn descriptors(&self) -> Vec<RecommenderDescriptor> {
        self.registry.descriptors()
    }

    /// Main entry point: rank courses for a request
    ///
    /// # Returns
    /// At most `top_k` recommendations sorted by score (highest first), ties
    /// by ascending course id
    #[instrument(skip(self, request), fields(strategy = ?request.strategy, top_k = ?request.top_k))]
    pub fn recommend(&self, request: &RecommendationRequest) -> Result<Vec<Recommendation>> {
        let start_time = Instant::now();
        let run = self.run(request)?;
        let recommendations = self.select_top(&run);
        info!(
            "Returned {} recommendations from {} ranked courses in {:.2?}",
            recommendations.len(),
            run.ranked.len(),
            start_time.elapsed()
        );
        Ok(recommendations)
    }

    /// Same as [`recommend`](Self::recommend) but runs the CPU-bound work
    /// on the blocking pool
    pub async fn recommend_async(
        &self,
        request: RecommendationRequest,
    ) -> Result<Vec<Recommendation>> {
        let orchestrator = self.clone();
        tokio::task::spawn_blocking(move || orchestrator.recommend(&request))
            .await
            .map_err(|e| RecommendError::Task(format!("recommendation task failed: {e}")))?
    }

    /// Rank, then report which attribute to narrow by next
    #[instrument(skip(self, request), fields(strategy = ?request.strategy, top_k = ?request.top_k))]
    pub fn refine(&self, request: &RecommendationRequest) -> Result<Refinement> {
        let run = self.run(request)?;
        let suggested_split = suggest_split(&run.ranked, &run.corpus, &run.remaining);
        debug!(split = ?suggested_split, remaining = run.remaining.len(), "refinement");

        Ok(Refinement {
            recommendations: self.select_top(&run),
            applied_filters: run.applied,
            remaining_facets: run.remaining,
            suggested_split,
        })
    }

    fn run(&self, request: &RecommendationRequest) -> Result<RankedRun> {
        let top_k = request.top_k.unwrap_or(self.default_top_k);
        let sources = self.validate(request, top_k)?;

        let corpus = self.corpus.load().unwrap_or_default();
        let pool = self.resolve_pool(request, &corpus)?;
        info!("Resolved candidate pool of {} courses", pool.len());

        let catalog = FacetCatalog::from_corpus(&corpus);
        let (pins, remaining) = catalog.resolve_filters(&request.filters.attributes);
        let applied: BTreeMap<String, String> = pins
            .iter()
            .map(|pin| (pin.attribute().to_string(), pin.value().to_string()))
            .collect();

        let filtered = self.apply_filters(request, pins, pool, &corpus)?;
        info!("Applied filters, candidates remaining: {}", filtered.len());

        let query = request.score_query(&corpus);
        let (scores, source) = self.score(sources, &query, &filtered)?;
        let ranked = rank(scores);

        Ok(RankedRun {
            corpus,
            top_k,
            ranked,
            source,
            applied,
            remaining,
        })
    }

    /// Check the request shape and decide which recommenders to consult
    fn validate(&self, request: &RecommendationRequest, top_k: usize) -> Result<Sources> {
        if top_k == 0 {
            return Err(RecommendError::invalid("top_k must be positive"));
        }

        match request.strategy {
            Strategy::Topic => {
                if !request.has_topic_input() {
                    return Err(RecommendError::invalid(
                        "topic strategy needs query text, an anchor course or interests",
                    ));
                }
                Ok(Sources::Topic)
            }
            Strategy::Preference => {
                if request.learner_id.is_none() {
                    return Err(RecommendError::invalid("preference strategy needs a learner"));
                }
                Ok(Sources::Preference)
            }
            Strategy::Hybrid => {
                if !request.has_topic_input() && request.learner_id.is_none() {
                    return Err(RecommendError::invalid(
                        "hybrid strategy needs a learner or a topic query",
                    ));
                }
                let weights = request.weights.unwrap_or(self.default_weights);
                weights.validate()?;
                Ok(Sources::Hybrid(weights))
            }
        }
    }

    /// Explicit pool (deduplicated, validated) or the whole corpus, minus the anchor
    fn resolve_pool(
        &self,
        request: &RecommendationRequest,
        corpus: &CourseStore,
    ) -> Result<Vec<CourseId>> {
        let mut pool: Vec<CourseId> = match &request.candidate_pool {
            Some(explicit) => {
                let mut seen = HashSet::with_capacity(explicit.len());
                let mut pool = Vec::with_capacity(explicit.len());
                for course_id in explicit {
                    if !corpus.contains(course_id) {
                        return Err(RecommenderError::NotFound {
                            entity: "course",
                            id: course_id.clone(),
                        }
                        .into());
                    }
                    if seen.insert(course_id) {
                        pool.push(course_id.clone());
                    }
                }
                pool
            }
            None => corpus.ids().cloned().collect(),
        };

        if let Some(anchor) = &request.anchor_course {
            pool.retain(|course_id| course_id != anchor);
        }
        Ok(pool)
    }

    fn apply_filters(
        &self,
        request: &RecommendationRequest,
        pins: Vec<AttributeFilter>,
        pool: Vec<CourseId>,
        corpus: &CourseStore,
    ) -> Result<Vec<CourseId>> {
        let exclude = request
            .filters
            .exclude_interacted
            .unwrap_or(self.exclude_interacted);

        let interacted = match (&request.learner_id, exclude) {
            (Some(learner_id), true) => self
                .interactions
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .interacted_courses(learner_id),
            _ => HashSet::new(),
        };
        let context = FilterContext::new(corpus).with_interacted(interacted);

        let mut filters = FilterPipeline::new()
            .add_filter_if(exclude && request.learner_id.is_some(), AlreadyInteractedFilter);
        if let Some(level) = request.filters.max_level {
            filters = filters.add_filter(LevelFilter::at_most(level));
        }
        if let Some(domain) = &request.filters.domain {
            filters = filters.add_filter(DomainFilter::new(domain.clone()));
        }
        for pin in pins {
            filters = filters.add_filter(pin);
        }

        filters
            .apply(pool, &context)
            .map_err(RecommendError::Pipeline)
    }

    /// Score the filtered candidates; returns the scores and the source tag
    fn score(
        &self,
        sources: Sources,
        query: &ScoreQuery,
        candidates: &[CourseId],
    ) -> Result<(HashMap<CourseId, f64>, String)> {
        match sources {
            Sources::Topic => {
                let topic = self.registry.resolve(&self.topic_name)?;
                let scores = require_scores(topic.as_ref(), topic.score(query, candidates)?)?;
                Ok((scores, self.topic_name.clone()))
            }
            Sources::Preference => {
                if let Some(learner_id) = query.learner_id.as_deref() {
                    if self.learner_history(learner_id) == Some(false) {
                        let reason = UnavailableReason::ColdStart {
                            learner_id: learner_id.to_string(),
                        };
                        return Err(RecommendError::insufficient(
                            &self.preference_name,
                            reason.to_string(),
                        ));
                    }
                }
                let preference = self.registry.resolve(&self.preference_name)?;
                let scores =
                    require_scores(preference.as_ref(), preference.score(query, candidates)?)?;
                Ok((scores, self.preference_name.clone()))
            }
            Sources::Hybrid(weights) => self.score_hybrid(weights, query, candidates),
        }
    }

    /// `Some(true)` when the learner has recorded interactions, `Some(false)`
    /// for a registered learner without any, `None` for a learner never seen
    fn learner_history(&self, learner_id: &str) -> Option<bool> {
        self.interactions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .profile(learner_id)
            .map(|profile| !profile.is_cold())
    }

    /// Run both recommenders in parallel and blend by weight.
    ///
    /// ## Algorithm
    /// 1. A recommender with weight 0 or without its input is not consulted
    /// 2. A learner without history skips the preference side; so does a
    ///    cold-start or unknown answer from the preference model
    /// 3. Without the preference side, topic scores are used whenever there is
    ///    topic input, even at topic weight 0
    /// 4. Both sides present: `w_t * topic + w_p * preference`
    /// 5. One side present: its scores unchanged
    fn score_hybrid(
        &self,
        weights: HybridWeights,
        query: &ScoreQuery,
        candidates: &[CourseId],
    ) -> Result<(HashMap<CourseId, f64>, String)> {
        let has_topic_input =
            query.text.is_some() || query.anchor_course.is_some() || query.interests.is_some();
        let use_preference = weights.preference > 0.0
            && match query.learner_id.as_deref() {
                Some(learner_id) if self.learner_history(learner_id) == Some(true) => true,
                Some(learner_id) => {
                    warn!("Learner {learner_id} has no interaction history, falling back to topic");
                    false
                }
                None => false,
            };
        let use_topic = has_topic_input && (weights.topic > 0.0 || !use_preference);

        let topic = if use_topic {
            Some(self.registry.resolve(&self.topic_name)?)
        } else {
            None
        };
        let preference = if use_preference {
            Some(self.registry.resolve(&self.preference_name)?)
        } else {
            None
        };

        let (topic_result, preference_result) = rayon::join(
            || topic.as_ref().map(|r| r.score(query, candidates)),
            || preference.as_ref().map(|r| r.score(query, candidates)),
        );

        let mut topic_scores = match topic_result {
            Some(outcome) => outcome?.into_scores(),
            None => None,
        };
        let preference_scores = match preference_result {
            Some(Ok(ScoreOutcome::Scored(scores))) => Some(scores),
            Some(Ok(ScoreOutcome::Unavailable(reason))) => {
                warn!("Preference scores unavailable ({reason}), falling back to topic");
                None
            }
            Some(Err(RecommenderError::UnknownLearner(learner_id))) => {
                warn!("Learner {learner_id} unknown to the preference model, falling back to topic");
                None
            }
            Some(Err(err)) => return Err(err.into()),
            None => None,
        };

        // the preference side dropped out after topic was skipped for its zero weight
        if preference_scores.is_none() && topic.is_none() && has_topic_input {
            let topic = self.registry.resolve(&self.topic_name)?;
            topic_scores = topic.score(query, candidates)?.into_scores();
        }

        match (topic_scores, preference_scores) {
            (Some(topic_scores), Some(preference_scores)) => {
                let blended = topic_scores
                    .into_iter()
                    .map(|(course_id, topic_score)| {
                        let preference_score =
                            preference_scores.get(&course_id).copied().unwrap_or(0.0);
                        let score =
                            weights.topic * topic_score + weights.preference * preference_score;
                        (course_id, score)
                    })
                    .collect();
                Ok((blended, HYBRID_SOURCE.to_string()))
            }
            (Some(topic_scores), None) => Ok((topic_scores, self.topic_name.clone())),
            (None, Some(preference_scores)) => {
                Ok((preference_scores, self.preference_name.clone()))
            }
            (None, None) => Err(RecommendError::insufficient(
                HYBRID_SOURCE,
                "no recommender could score this request",
            )),
        }
    }

    fn select_top(&self, run: &RankedRun) -> Vec<Recommendation> {
        run.ranked
            .iter()
            .take(run.top_k)
            .map(|(course_id, score)| Recommendation {
                course_id: course_id.clone(),
                title: run
                    .corpus
                    .get(course_id)
                    .map(|course| course.title.clone())
                    .unwrap_or_default(),
                score: *score,
                source: run.source.clone(),
            })
            .collect()
    }
}

/// Turn an outcome into scores, treating `Unavailable` as missing data
fn require_scores(
    recommender: &dyn Recommender,
    outcome: ScoreOutcome,
) -> Result<HashMap<CourseId, f64>> {
    match outcome {
        ScoreOutcome::Scored(scores) => Ok(scores),
        ScoreOutcome::Unavailable(reason) => {
            Err(RecommendError::insufficient(recommender.name(), reason.to_string()))
        }
    }
}

/// Score descending, then course id ascending; NaN sorts last
fn rank(scores: HashMap<CourseId, f64>) -> Vec<(CourseId, f64)> {
    let mut ranked: Vec<(CourseId, f64)> = scores.into_iter().collect();
    ranked.sort_by(rank_order);
    ranked
}

fn rank_order(a: &(CourseId, f64), b: &(CourseId, f64)) -> Ordering {
    match (a.1.is_nan(), b.1.is_nan()) {
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (true, true) => a.0.cmp(&b.0),
        (false, false) => b
            .1
            .partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0)),
    }
}
