//! # Recommenders Crate
//!
//! Scoring strategies for course recommendations, all behind one
//! [`Recommender`] contract.
//!
//! ## Components
//!
//! ### Topic Recommender
//! Content similarity in a latent topic space:
//! - Fits a seeded EM topic mixture over course texts
//! - Scores free text, an anchor course or weighted interests against courses
//!
//! ### Preference-based Recommender
//! Learner affinity from interaction history:
//! - Learner vectors over course facets (categories, tags, domain, level)
//! - Popularity separates near-ties
//! - Cold-start learners are reported as unavailable, never scored as zero
//!
//! ### Registry
//! Name → adapter lookup so callers never depend on concrete types.
//!
//! ## Example Usage
//!
//! ```ignore
//! use recommenders::{CancelFlag, FitInput, Recommender, ScoreQuery, TopicRecommender};
//!
//! let topic = TopicRecommender::new().with_n_topics(4);
//! topic.fit(&FitInput { corpus: &store, interactions: &log }, &CancelFlag::new())?;
//!
//! let candidates: Vec<_> = store.ids().cloned().collect();
//! let outcome = topic.score(&ScoreQuery::text("python programming"), &candidates)?;
//! ```
//!
//! ## Concurrency
//!
//! Fitted models are published through a [`SnapshotCell`]: a fit builds the
//! whole model first and swaps it in with a single write, so concurrent
//! scoring always sees one complete model version.

pub mod error;
pub mod preference;
pub mod registry;
pub mod snapshot;
pub mod text;
pub mod topic;
pub mod traits;
pub mod types;

pub use error::{RecommenderError, Result};
pub use preference::{PreferenceConfig, PreferenceModel, PreferenceRecommender};
pub use registry::Registry;
pub use snapshot::{CancelFlag, SnapshotCell};
pub use text::SimilarityMetric;
pub use topic::{TopicConfig, TopicModel, TopicRecommender};
pub use traits::Recommender;
pub use types::{
    FitInput, ModelStamp, ModelVersion, RecommenderDescriptor, RecommenderKind, ScoreOutcome,
    ScoreQuery, UnavailableReason,
};

#[cfg(test)]
mod tests {
    use super::*;
    use corpus::{Course, CourseStore, Interaction, InteractionLog, Signal};
    use std::sync::Arc;

    fn create_test_data() -> (CourseStore, InteractionLog) {
        let store = CourseStore::from_courses(vec![
            Course::new("C1", "python programming basics").with_categories(["it"]),
            Course::new("C2", "advanced python programming").with_categories(["it"]),
            Course::new("C3", "cooking fundamentals").with_categories(["kitchen"]),
        ])
        .unwrap();
        let mut log = InteractionLog::new();
        log.record(Interaction::new("L1", "C1", Signal::Completed));
        (store, log)
    }

    #[test]
    fn test_adapters_share_one_contract() {
        let (store, log) = create_test_data();
        let adapters: Vec<Arc<dyn Recommender>> = vec![
            Arc::new(TopicRecommender::new()),
            Arc::new(PreferenceRecommender::new()),
        ];
        let input = FitInput {
            corpus: &store,
            interactions: &log,
        };

        for adapter in &adapters {
            assert!(adapter.descriptor().model.is_none());
            let stamp = adapter.fit(&input, &CancelFlag::new()).unwrap();
            assert_eq!(stamp.corpus_version, store.version());
            assert_eq!(adapter.descriptor().model, Some(stamp));
        }

        let query = ScoreQuery::text("python").with_learner("L1");
        let candidates = vec!["C2".to_string(), "C3".to_string()];
        for adapter in &adapters {
            let outcome = adapter.score(&query, &candidates).unwrap();
            let scores = outcome.scores().unwrap();
            assert!(scores["C2"] > scores["C3"], "{} ranked cooking first", adapter.name());
        }
    }

    #[test]
    fn test_descriptor_kinds() {
        assert_eq!(TopicRecommender::new().descriptor().kind, RecommenderKind::Topic);
        assert_eq!(
            PreferenceRecommender::new().descriptor().kind,
            RecommenderKind::Preference
        );
    }
}
