//! Topic Recommender - content similarity in a latent topic space
//!
//! Every course is a document made of its title, description, tags and
//! categories. Fitting learns K topics (word distributions) and a topic
//! mixture per course; scoring compares a query mixture with course mixtures.
//!
//! ## Algorithm
//! 1. Tokenise all documents and build a sorted vocabulary
//! 2. Seed K = min(n_topics, n_courses) topics by farthest-point selection:
//!    start at course `seed % n`, then repeatedly take the course least
//!    similar to every chosen seed (ties go to the lower insertion index)
//! 3. Run EM for a smoothed topic mixture model:
//!    - E-step: responsibility of topic k for word w in course d is
//!      proportional to θ[d][k] · φ[k][w]
//!    - M-step: θ and φ are the expected counts plus `alpha` / `beta`,
//!      normalised to sum 1
//!    - stop after `max_iter` rounds or once θ moves less than `tolerance`
//! 4. Queries are folded in with φ held fixed; unknown words are ignored
//!
//! Per-course E-steps run in parallel with Rayon, but expected counts are
//! summed in course order so the result is bit-for-bit reproducible.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use corpus::{Course, CourseId, CourseStore, CorpusVersion};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::{RecommenderError, Result};
use crate::snapshot::{CancelFlag, SnapshotCell};
use crate::text::{normalize, pseudo_random, sparse_cosine, tokenize, SimilarityMetric};
use crate::traits::Recommender;
use crate::types::{FitInput, ModelStamp, RecommenderKind, ScoreOutcome, ScoreQuery};

/// Tunables for the topic model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicConfig {
    /// Upper bound on the number of topics (capped at the corpus size)
    pub n_topics: usize,
    /// Pseudo-count added to every course-topic weight
    pub alpha: f64,
    /// Pseudo-count added to every topic-word weight
    pub beta: f64,
    pub max_iter: usize,
    /// Early stop once no θ entry moves more than this between rounds
    pub tolerance: f64,
    /// EM rounds used to fold a query into the fitted space
    pub fold_in_iter: usize,
    pub seed: u64,
    /// Smallest corpus a fit accepts
    pub min_courses: usize,
    pub metric: SimilarityMetric,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            n_topics: 8,
            alpha: 0.1,
            beta: 0.01,
            max_iter: 100,
            tolerance: 1e-6,
            fold_in_iter: 50,
            seed: 42,
            min_courses: 2,
            metric: SimilarityMetric::Cosine,
        }
    }
}

/// A fitted, immutable topic model
#[derive(Debug, Clone, Serialize)]
pub struct TopicModel {
    pub stamp: ModelStamp,
    pub metric: SimilarityMetric,
    alpha: f64,
    fold_in_iter: usize,
    iterations: usize,
    vocabulary: Vec<String>,
    #[serde(skip)]
    term_index: HashMap<String, usize>,
    course_ids: Vec<CourseId>,
    #[serde(skip)]
    course_index: HashMap<CourseId, usize>,
    /// θ: one row per course, K columns
    doc_topic: Vec<Vec<f64>>,
    /// φ: one row per topic, one column per vocabulary term
    topic_word: Vec<Vec<f64>>,
}

impl TopicModel {
    pub fn n_topics(&self) -> usize {
        self.topic_word.len()
    }

    pub fn vocabulary(&self) -> &[String] {
        &self.vocabulary
    }

    /// EM rounds actually run before convergence or `max_iter`
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Topic mixture of a course, `None` if it was not part of the fit
    pub fn course_topics(&self, course_id: &str) -> Option<&[f64]> {
        self.course_index
            .get(course_id)
            .map(|&row| self.doc_topic[row].as_slice())
    }

    /// Project free text into the topic space with φ held fixed.
    ///
    /// Tokens outside the vocabulary are ignored; text without a single known
    /// token maps to the uniform mixture.
    pub fn fold_in(&self, text: &str) -> Vec<f64> {
        let k = self.n_topics();
        let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
        for token in tokenize(text) {
            if let Some(&term) = self.term_index.get(&token) {
                *counts.entry(term).or_insert(0.0) += 1.0;
            }
        }

        let mut theta = vec![1.0 / k as f64; k];
        if counts.is_empty() {
            return theta;
        }

        for _ in 0..self.fold_in_iter.max(1) {
            let mut next = vec![self.alpha; k];
            for (&term, &count) in &counts {
                let weights: Vec<f64> = (0..k)
                    .map(|topic| theta[topic] * self.topic_word[topic][term])
                    .collect();
                let total: f64 = weights.iter().sum();
                if total > 1e-300 {
                    for topic in 0..k {
                        next[topic] += count * weights[topic] / total;
                    }
                }
            }
            normalize(&mut next);
            theta = next;
        }
        theta
    }

    /// Top `n` words per topic, highest weight first
    pub fn top_words(&self, n: usize) -> Vec<Vec<(String, f64)>> {
        self.topic_word
            .iter()
            .map(|row| {
                let mut words: Vec<(String, f64)> = self
                    .vocabulary
                    .iter()
                    .zip(row)
                    .map(|(word, &weight)| (word.clone(), weight))
                    .collect();
                words.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
                words.truncate(n);
                words
            })
            .collect()
    }
}

/// What the candidates are compared against
enum QueryProfile {
    Single(Vec<f64>),
    /// Weighted interest labels; weights sum to 1
    Mixture(Vec<(f64, Vec<f64>)>),
}

impl QueryProfile {
    fn similarity(&self, metric: SimilarityMetric, course: &[f64]) -> f64 {
        match self {
            QueryProfile::Single(theta) => metric.similarity(theta, course),
            QueryProfile::Mixture(parts) => parts
                .iter()
                .map(|(weight, theta)| weight * metric.similarity(theta, course))
                .sum(),
        }
    }
}

/// Topic recommender with an atomically swapped model snapshot
pub struct TopicRecommender {
    name: String,
    config: TopicConfig,
    model: SnapshotCell<TopicModel>,
    versions: AtomicU64,
}

impl TopicRecommender {
    /// Create an unfitted recommender named `topic` with default settings
    pub fn new() -> Self {
        Self::with_config(TopicConfig::default())
    }

    pub fn with_config(config: TopicConfig) -> Self {
        Self {
            name: "topic".to_string(),
            config,
            model: SnapshotCell::empty(),
            versions: AtomicU64::new(0),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Configure the maximum number of topics (default: 8)
    pub fn with_n_topics(mut self, n_topics: usize) -> Self {
        self.config.n_topics = n_topics;
        self
    }

    /// Configure the random seed (default: 42)
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Configure the similarity metric (default: cosine)
    pub fn with_metric(mut self, metric: SimilarityMetric) -> Self {
        self.config.metric = metric;
        self
    }

    /// Configure the EM round limit (default: 100)
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.config.max_iter = max_iter;
        self
    }

    /// Configure the early-stop threshold on θ movement (default: 1e-6)
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.config.tolerance = tolerance;
        self
    }

    pub fn config(&self) -> &TopicConfig {
        &self.config
    }

    /// The published model, if any
    pub fn model(&self) -> Option<Arc<TopicModel>> {
        self.model.load()
    }

    /// Top `n` words for every topic of the published model
    pub fn top_words(&self, n: usize) -> Result<Vec<Vec<(String, f64)>>> {
        Ok(self.loaded_model(None)?.top_words(n))
    }

    fn loaded_model(&self, expected: Option<CorpusVersion>) -> Result<Arc<TopicModel>> {
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

    /// Build a model from the corpus without publishing it
    fn train(&self, corpus: &CourseStore, cancel: &CancelFlag) -> Result<TopicModel> {
        let config = &self.config;
        if config.n_topics == 0 {
            return Err(RecommenderError::InvalidRequest(
                "n_topics must be at least 1".to_string(),
            ));
        }

        let n_docs = corpus.len();
        let min_courses = config.min_courses.max(1);
        if n_docs < min_courses {
            return Err(RecommenderError::insufficient(
                &self.name,
                format!("need at least {min_courses} courses, got {n_docs}"),
            ));
        }

        // Step 1: tokenise and build the vocabulary
        let courses: Vec<&Course> = corpus.all().collect();
        let tokenized: Vec<Vec<String>> = courses
            .par_iter()
            .map(|course| tokenize(&course.document()))
            .collect();

        let vocabulary: Vec<String> = tokenized
            .iter()
            .flatten()
            .map(String::as_str)
            .collect::<BTreeSet<&str>>()
            .into_iter()
            .map(str::to_string)
            .collect();
        if vocabulary.is_empty() {
            return Err(RecommenderError::insufficient(
                &self.name,
                "course texts contain no usable words",
            ));
        }
        let term_index: HashMap<String, usize> = vocabulary
            .iter()
            .enumerate()
            .map(|(idx, word)| (word.clone(), idx))
            .collect();

        let doc_terms: Vec<Vec<(usize, f64)>> = tokenized
            .iter()
            .map(|tokens| {
                let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
                for token in tokens {
                    *counts.entry(term_index[token]).or_insert(0.0) += 1.0;
                }
                counts.into_iter().collect()
            })
            .collect();

        // Step 2: deterministic seeding
        let k = config.n_topics.min(n_docs);
        let n_terms = vocabulary.len();
        let seeds = farthest_point_seeds(&doc_terms, k, config.seed);
        debug!("Seeded {} topics from courses {:?}", k, seeds);

        let mut topic_word: Vec<Vec<f64>> = seeds
            .iter()
            .enumerate()
            .map(|(topic, &doc)| {
                let mut row: Vec<f64> = (0..n_terms)
                    .map(|term| config.beta + 0.01 * pseudo_random(config.seed, topic * n_terms + term))
                    .collect();
                for &(term, count) in &doc_terms[doc] {
                    row[term] += count;
                }
                normalize(&mut row);
                row
            })
            .collect();
        let mut doc_topic: Vec<Vec<f64>> = vec![vec![1.0 / k as f64; k]; n_docs];

        // Step 3: EM
        let mut iterations = 0;
        for round in 0..config.max_iter {
            cancel.check(&self.name)?;

            let expected: Vec<(Vec<f64>, Vec<(usize, Vec<f64>)>)> = doc_terms
                .par_iter()
                .zip(doc_topic.par_iter())
                .map(|(terms, theta)| e_step(terms, theta, &topic_word))
                .collect();

            let mut next_topic_word = vec![vec![config.beta; n_terms]; k];
            let mut next_doc_topic = Vec::with_capacity(n_docs);
            for (topic_counts, term_counts) in expected {
                for (term, per_topic) in term_counts {
                    for (topic, value) in per_topic.into_iter().enumerate() {
                        next_topic_word[topic][term] += value;
                    }
                }
                let mut row: Vec<f64> = topic_counts.iter().map(|c| c + config.alpha).collect();
                normalize(&mut row);
                next_doc_topic.push(row);
            }
            for row in next_topic_word.iter_mut() {
                normalize(row);
            }

            let delta = doc_topic
                .iter()
                .flatten()
                .zip(next_doc_topic.iter().flatten())
                .map(|(old, new)| (old - new).abs())
                .fold(0.0, f64::max);

            doc_topic = next_doc_topic;
            topic_word = next_topic_word;
            iterations = round + 1;

            if delta < config.tolerance {
                debug!("Topic EM converged after {} rounds (delta {:.2e})", iterations, delta);
                break;
            }
        }

        let course_ids: Vec<CourseId> = courses.iter().map(|c| c.id.clone()).collect();
        let course_index = course_ids
            .iter()
            .enumerate()
            .map(|(idx, id)| (id.clone(), idx))
            .collect();

        Ok(TopicModel {
            stamp: ModelStamp {
                model_version: 0,
                corpus_version: corpus.version(),
            },
            metric: config.metric,
            alpha: config.alpha,
            fold_in_iter: config.fold_in_iter,
            iterations,
            vocabulary,
            term_index,
            course_ids,
            course_index,
            doc_topic,
            topic_word,
        })
    }

    fn query_profile(&self, model: &TopicModel, query: &ScoreQuery) -> Result<QueryProfile> {
        if let Some(anchor) = &query.anchor_course {
            let theta = model
                .course_topics(anchor)
                .ok_or_else(|| RecommenderError::course_not_found(anchor))?;
            return Ok(QueryProfile::Single(theta.to_vec()));
        }

        if let Some(interests) = &query.interests {
            return interest_profile(model, interests);
        }

        if let Some(text) = &query.text {
            return Ok(QueryProfile::Single(model.fold_in(text)));
        }

        Err(RecommenderError::InvalidRequest(
            "topic scoring needs query text, an anchor course or interests".to_string(),
        ))
    }
}

impl Default for TopicRecommender {
    fn default() -> Self {
        Self::new()
    }
}

impl Recommender for TopicRecommender {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> RecommenderKind {
        RecommenderKind::Topic
    }

    fn stamp(&self) -> Option<ModelStamp> {
        self.model.load().map(|model| model.stamp)
    }

    #[instrument(skip(self, input, cancel), fields(recommender = %self.name, courses = input.corpus.len()))]
    fn fit(&self, input: &FitInput<'_>, cancel: &CancelFlag) -> Result<ModelStamp> {
        let mut model = self.train(input.corpus, cancel)?;
        cancel.check(&self.name)?;

        model.stamp.model_version = self.versions.fetch_add(1, Ordering::SeqCst) + 1;
        let stamp = model.stamp;
        info!(
            "Fitted {} topics over {} words in {} rounds (model v{}, corpus v{})",
            model.n_topics(),
            model.vocabulary.len(),
            model.iterations,
            stamp.model_version,
            stamp.corpus_version
        );
        self.model.publish(model);
        Ok(stamp)
    }

    fn score(&self, query: &ScoreQuery, candidates: &[CourseId]) -> Result<ScoreOutcome> {
        let model = self.loaded_model(query.expected_corpus)?;
        let profile = self.query_profile(&model, query)?;

        let rows: Vec<(&CourseId, &[f64])> = candidates
            .iter()
            .map(|id| {
                model
                    .course_topics(id)
                    .map(|row| (id, row))
                    .ok_or_else(|| RecommenderError::course_not_found(id))
            })
            .collect::<Result<_>>()?;

        let scores: HashMap<CourseId, f64> = rows
            .par_iter()
            .map(|(id, row)| ((*id).clone(), profile.similarity(model.metric, row)))
            .collect();

        debug!("Topic scored {} candidates", scores.len());
        Ok(ScoreOutcome::Scored(scores))
    }

    fn export_model(&self) -> Result<Option<serde_json::Value>> {
        self.model
            .load()
            .map(|model| serde_json::to_value(&*model).map_err(RecommenderError::from))
            .transpose()
    }
}

/// Expected topic counts for one course and per-term topic responsibilities
fn e_step(
    terms: &[(usize, f64)],
    theta: &[f64],
    topic_word: &[Vec<f64>],
) -> (Vec<f64>, Vec<(usize, Vec<f64>)>) {
    let k = theta.len();
    let mut topic_counts = vec![0.0; k];
    let mut term_counts = Vec::with_capacity(terms.len());

    for &(term, count) in terms {
        let mut weights: Vec<f64> = (0..k).map(|topic| theta[topic] * topic_word[topic][term]).collect();
        let total: f64 = weights.iter().sum();
        if total <= 1e-300 {
            continue;
        }
        for (topic, weight) in weights.iter_mut().enumerate() {
            *weight = count * *weight / total;
            topic_counts[topic] += *weight;
        }
        term_counts.push((term, weights));
    }
    (topic_counts, term_counts)
}

/// Pick `k` mutually dissimilar courses to seed the topics
fn farthest_point_seeds(doc_terms: &[Vec<(usize, f64)>], k: usize, seed: u64) -> Vec<usize> {
    let n = doc_terms.len();
    let first = (seed % n as u64) as usize;
    let mut chosen = vec![first];
    let mut closest: Vec<f64> = doc_terms
        .iter()
        .map(|doc| sparse_cosine(doc, &doc_terms[first]))
        .collect();

    while chosen.len() < k {
        let mut best: Option<(usize, f64)> = None;
        for (doc, &similarity) in closest.iter().enumerate() {
            if chosen.contains(&doc) {
                continue;
            }
            if best.is_none_or(|(_, current)| similarity < current) {
                best = Some((doc, similarity));
            }
        }
        let Some((next, _)) = best else { break };

        chosen.push(next);
        for (doc, similarity) in closest.iter_mut().enumerate() {
            *similarity = similarity.max(sparse_cosine(&doc_terms[doc], &doc_terms[next]));
        }
    }
    chosen
}

/// Fold each interest label into the topic space and normalise the weights.
///
/// Weights summing to less than 1e-3 are treated as "no preference" and
/// every label gets the same share.
fn interest_profile(model: &TopicModel, interests: &BTreeMap<String, f64>) -> Result<QueryProfile> {
    if interests.is_empty() {
        return Err(RecommenderError::InvalidRequest(
            "interest weights must name at least one label".to_string(),
        ));
    }
    if interests.values().any(|w| !w.is_finite() || *w < 0.0) {
        return Err(RecommenderError::InvalidRequest(
            "interest weights must be finite and non-negative".to_string(),
        ));
    }

    let total: f64 = interests.values().sum();
    let uniform = 1.0 / interests.len() as f64;
    let parts = interests
        .iter()
        .map(|(label, &weight)| {
            let share = if total < 1e-3 { uniform } else { weight / total };
            (share, model.fold_in(label))
        })
        .collect();
    Ok(QueryProfile::Mixture(parts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use corpus::{IngestMode, InteractionLog};

    fn create_test_store() -> CourseStore {
        CourseStore::from_courses(vec![
            Course::new("C1", "python programming basics"),
            Course::new("C2", "advanced python programming"),
            Course::new("C3", "cooking fundamentals"),
        ])
        .unwrap()
    }

    fn fitted(store: &CourseStore) -> TopicRecommender {
        let recommender = TopicRecommender::new();
        let log = InteractionLog::new();
        recommender
            .fit(
                &FitInput {
                    corpus: store,
                    interactions: &log,
                },
                &CancelFlag::new(),
            )
            .unwrap();
        recommender
    }

    fn ids(ids: &[&str]) -> Vec<CourseId> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    fn ranked(scores: &HashMap<CourseId, f64>) -> Vec<String> {
        let mut pairs: Vec<(&CourseId, &f64)> = scores.iter().collect();
        pairs.sort_by(|a, b| b.1.partial_cmp(a.1).unwrap().then_with(|| a.0.cmp(b.0)));
        pairs.into_iter().map(|(id, _)| id.clone()).collect()
    }

    #[test]
    fn test_python_query_ranks_python_courses_first() {
        let store = create_test_store();
        let topic = fitted(&store);

        let outcome = topic
            .score(&ScoreQuery::text("python programming"), &ids(&["C1", "C2", "C3"]))
            .unwrap();
        let scores = outcome.scores().unwrap();
        let order = ranked(scores);

        let top_two: BTreeSet<&str> = order[..2].iter().map(String::as_str).collect();
        assert_eq!(top_two, BTreeSet::from(["C1", "C2"]));
        assert!(scores["C1"] > scores["C3"]);
        assert!(scores["C2"] > scores["C3"]);
        for score in scores.values() {
            assert!((0.0..=1.0 + 1e-9).contains(score));
        }
    }

    #[test]
    fn test_fit_and_score_are_deterministic() {
        let store = create_test_store();
        let first = fitted(&store);
        let second = fitted(&store);

        let a = first.model().unwrap();
        let b = second.model().unwrap();
        assert_eq!(a.doc_topic, b.doc_topic);
        assert_eq!(a.topic_word, b.topic_word);

        let query = ScoreQuery::text("python cooking");
        let candidates = ids(&["C1", "C2", "C3"]);
        let s1 = first.score(&query, &candidates).unwrap();
        let s2 = first.score(&query, &candidates).unwrap();
        let s3 = second.score(&query, &candidates).unwrap();
        assert_eq!(s1, s2);
        assert_eq!(s1, s3);
    }

    #[test]
    fn test_topic_rows_are_distributions() {
        let store = create_test_store();
        let model = fitted(&store).model().unwrap();

        assert_eq!(model.n_topics(), 3);
        for row in model.doc_topic.iter().chain(model.topic_word.iter()) {
            let sum: f64 = row.iter().sum();
            assert!((sum - 1.0).abs() < 1e-9);
            assert!(row.iter().all(|v| *v >= 0.0));
        }
    }

    #[test]
    fn test_insufficient_corpus() {
        let store = CourseStore::from_courses(vec![Course::new("C1", "lonely course")]).unwrap();
        let topic = TopicRecommender::new();
        let log = InteractionLog::new();

        let result = topic.fit(
            &FitInput {
                corpus: &store,
                interactions: &log,
            },
            &CancelFlag::new(),
        );
        assert!(matches!(result, Err(RecommenderError::InsufficientData { .. })));
        assert!(topic.stamp().is_none());
    }

    #[test]
    fn test_stopword_only_corpus_is_insufficient() {
        let store = CourseStore::from_courses(vec![
            Course::new("C1", "the and of"),
            Course::new("C2", "a to in"),
        ])
        .unwrap();
        let topic = TopicRecommender::new();
        let log = InteractionLog::new();

        let result = topic.fit(
            &FitInput {
                corpus: &store,
                interactions: &log,
            },
            &CancelFlag::new(),
        );
        assert!(matches!(result, Err(RecommenderError::InsufficientData { .. })));
    }

    #[test]
    fn test_score_before_fit_is_stale() {
        let topic = TopicRecommender::new();
        let result = topic.score(&ScoreQuery::text("python"), &ids(&["C1"]));
        assert!(matches!(result, Err(RecommenderError::StaleModel { .. })));
        assert!(matches!(topic.top_words(3), Err(RecommenderError::StaleModel { .. })));
    }

    #[test]
    fn test_corpus_version_mismatch_is_stale() {
        let mut store = create_test_store();
        let topic = fitted(&store);
        store
            .ingest(vec![Course::new("C4", "baking bread")], IngestMode::Extend)
            .unwrap();

        let query = ScoreQuery::text("python").with_expected_corpus(store.version());
        let result = topic.score(&query, &ids(&["C1"]));
        assert!(matches!(result, Err(RecommenderError::StaleModel { .. })));
    }

    #[test]
    fn test_empty_candidates_and_unknown_candidate() {
        let store = create_test_store();
        let topic = fitted(&store);

        let outcome = topic.score(&ScoreQuery::text("python"), &[]).unwrap();
        assert_eq!(outcome, ScoreOutcome::Scored(HashMap::new()));

        let result = topic.score(&ScoreQuery::text("python"), &ids(&["C1", "C404"]));
        assert!(matches!(result, Err(RecommenderError::NotFound { id, .. }) if id == "C404"));
    }

    #[test]
    fn test_unknown_words_fold_to_uniform() {
        let store = create_test_store();
        let model = fitted(&store).model().unwrap();

        let theta = model.fold_in("quantum chromodynamics");
        assert_eq!(theta, vec![1.0 / 3.0; 3]);

        let mixed = model.fold_in("quantum python");
        assert_eq!(mixed, model.fold_in("python"));
    }

    #[test]
    fn test_anchor_course_similarity() {
        let store = create_test_store();
        let topic = fitted(&store);

        let outcome = topic
            .score(&ScoreQuery::anchor("C1"), &ids(&["C2", "C3"]))
            .unwrap();
        let scores = outcome.scores().unwrap();
        assert!(scores["C2"] > scores["C3"]);

        let missing = topic.score(&ScoreQuery::anchor("C9"), &ids(&["C2"]));
        assert!(matches!(missing, Err(RecommenderError::NotFound { .. })));
    }

    #[test]
    fn test_interest_weights() {
        let store = create_test_store();
        let topic = fitted(&store);
        let candidates = ids(&["C1", "C2", "C3"]);

        let cooking = BTreeMap::from([("cooking".to_string(), 0.9), ("python".to_string(), 0.1)]);
        let outcome = topic
            .score(&ScoreQuery::new().with_interests(cooking), &candidates)
            .unwrap();
        let scores = outcome.scores().unwrap();
        assert!(scores["C3"] > scores["C1"]);

        let negative = BTreeMap::from([("python".to_string(), -1.0)]);
        let result = topic.score(&ScoreQuery::new().with_interests(negative), &candidates);
        assert!(matches!(result, Err(RecommenderError::InvalidRequest(_))));

        // All-zero weights mean "no preference": each label counts equally
        let zeros = BTreeMap::from([("cooking".to_string(), 0.0), ("python".to_string(), 0.0)]);
        let even = BTreeMap::from([("cooking".to_string(), 0.5), ("python".to_string(), 0.5)]);
        let a = topic.score(&ScoreQuery::new().with_interests(zeros), &candidates).unwrap();
        let b = topic.score(&ScoreQuery::new().with_interests(even), &candidates).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_query_without_subject_is_invalid() {
        let store = create_test_store();
        let topic = fitted(&store);
        let result = topic.score(&ScoreQuery::learner("L1"), &ids(&["C1"]));
        assert!(matches!(result, Err(RecommenderError::InvalidRequest(_))));
    }

    #[test]
    fn test_metrics_stay_in_unit_range() {
        let store = create_test_store();
        for metric in [SimilarityMetric::Dot, SimilarityMetric::Bhattacharyya] {
            let topic = TopicRecommender::new().with_metric(metric);
            let log = InteractionLog::new();
            topic
                .fit(
                    &FitInput {
                        corpus: &store,
                        interactions: &log,
                    },
                    &CancelFlag::new(),
                )
                .unwrap();

            let outcome = topic
                .score(&ScoreQuery::text("python programming"), &ids(&["C1", "C2", "C3"]))
                .unwrap();
            let scores = outcome.scores().unwrap();
            for score in scores.values() {
                assert!((0.0..=1.0 + 1e-9).contains(score), "{metric:?}: {score}");
            }
            assert!(scores["C1"] > scores["C3"]);
        }
    }

    #[test]
    fn test_cancelled_fit_keeps_previous_model() {
        let store = create_test_store();
        let topic = fitted(&store);
        let before = topic.stamp().unwrap();

        let cancel = CancelFlag::new();
        cancel.cancel();
        let log = InteractionLog::new();
        let result = topic.fit(
            &FitInput {
                corpus: &store,
                interactions: &log,
            },
            &cancel,
        );

        assert!(matches!(result, Err(RecommenderError::Cancelled(_))));
        assert_eq!(topic.stamp(), Some(before));
    }

    #[test]
    fn test_cancel_during_em_keeps_previous_model() {
        let store = create_test_store();
        // zero tolerance never converges, so only the flag can end this fit
        let topic = fitted(&store).with_max_iter(usize::MAX).with_tolerance(0.0);
        let before = topic.stamp().unwrap();

        let cancel = CancelFlag::new();
        let log = InteractionLog::new();
        let result = std::thread::scope(|scope| {
            let handle = scope.spawn(|| {
                topic.fit(
                    &FitInput {
                        corpus: &store,
                        interactions: &log,
                    },
                    &cancel,
                )
            });
            std::thread::sleep(std::time::Duration::from_millis(50));
            cancel.cancel();
            handle.join().unwrap()
        });

        assert!(matches!(result, Err(RecommenderError::Cancelled(_))));
        assert_eq!(topic.stamp(), Some(before));
        assert!(topic.top_words(3).is_ok());
    }

    #[test]
    fn test_refit_bumps_model_version() {
        let store = create_test_store();
        let topic = fitted(&store);
        assert_eq!(topic.stamp().unwrap().model_version, 1);

        let log = InteractionLog::new();
        let stamp = topic
            .fit(
                &FitInput {
                    corpus: &store,
                    interactions: &log,
                },
                &CancelFlag::new(),
            )
            .unwrap();
        assert_eq!(stamp.model_version, 2);
        assert_eq!(stamp.corpus_version, store.version());
    }

    #[test]
    fn test_top_words_and_export() {
        let store = create_test_store();
        let topic = fitted(&store);

        let words = topic.top_words(2).unwrap();
        assert_eq!(words.len(), 3);
        assert!(words.iter().all(|topic_words| topic_words.len() == 2));
        assert!(words.iter().flatten().any(|(word, _)| word == "cooking" || word == "fundamentals"));

        let exported = topic.export_model().unwrap().unwrap();
        assert_eq!(exported["vocabulary"].as_array().unwrap().len(), 6);
        assert_eq!(exported["course_ids"][2], "C3");
    }

    #[test]
    fn test_farthest_point_seeding() {
        let docs = vec![
            vec![(0, 1.0), (1, 1.0)],
            vec![(0, 1.0), (1, 1.0), (2, 1.0)],
            vec![(3, 1.0)],
        ];
        assert_eq!(farthest_point_seeds(&docs, 3, 42), vec![0, 2, 1]);
        assert_eq!(farthest_point_seeds(&docs, 2, 1), vec![1, 2]);
    }
}
