//! End-to-end scenarios for the engine and orchestrator.

use corpus::{Course, CourseStore, IngestMode, Interaction, InteractionLog, Level, Signal};
use recommenders::{CancelFlag, RecommenderError};
use server::{
    EngineConfig, RecommendError, Recommendation, RecommendationEngine, RecommendationRequest,
    Strategy, HYBRID_SOURCE, PREFERENCE, TOPIC,
};

fn scenario_courses() -> Vec<Course> {
    vec![
        Course::new("C1", "python programming basics")
            .with_categories(["it"])
            .with_level(Level::Beginner)
            .with_attribute("duration", "short"),
        Course::new("C2", "advanced python programming")
            .with_categories(["it"])
            .with_level(Level::Advanced)
            .with_attribute("duration", "long"),
        Course::new("C3", "cooking fundamentals")
            .with_categories(["kitchen"])
            .with_level(Level::Beginner)
            .with_attribute("duration", "short"),
        Course::new("C4", "python for data analysis")
            .with_categories(["it", "data"])
            .with_level(Level::Intermediate)
            .with_attribute("duration", "long"),
        Course::new("C5", "baking bread at home")
            .with_categories(["kitchen"])
            .with_attribute("duration", "short"),
    ]
}

fn scenario_log() -> InteractionLog {
    let mut log = InteractionLog::new();
    log.register_learner("L1");
    log.record(Interaction::new("L2", "C1", Signal::Completed));
    log.record(Interaction::new("L2", "C4", Signal::Enrolled));
    log.record(Interaction::new("L3", "C3", Signal::Completed));
    log.record(Interaction::new("L3", "C5", Signal::Viewed));
    log
}

async fn fitted_engine() -> RecommendationEngine {
    let store = CourseStore::from_courses(scenario_courses()).unwrap();
    let engine =
        RecommendationEngine::with_data(EngineConfig::default(), store, scenario_log()).unwrap();
    let report = engine.fit(CancelFlag::new()).await.unwrap();
    assert!(report.is_fitted(TOPIC));
    assert!(report.is_fitted(PREFERENCE));
    engine
}

fn ids(recommendations: &[Recommendation]) -> Vec<&str> {
    recommendations.iter().map(|r| r.course_id.as_str()).collect()
}

#[tokio::test]
async fn test_topic_query_ranks_python_courses_first() {
    let engine = fitted_engine().await;
    let request = RecommendationRequest::topic("python programming", 2)
        .with_candidate_pool(["C1", "C2", "C3"]);

    let recommendations = engine.orchestrator().recommend(&request).unwrap();

    let mut top: Vec<&str> = ids(&recommendations);
    top.sort();
    assert_eq!(top, vec!["C1", "C2"]);
    assert!(recommendations.iter().all(|r| r.source == TOPIC));
}

#[tokio::test]
async fn test_topic_scoring_is_deterministic() {
    let engine = fitted_engine().await;
    let orchestrator = engine.orchestrator();
    let request = RecommendationRequest::topic("python data", 5);

    let first = orchestrator.recommend(&request).unwrap();
    let second = orchestrator.recommend(&request).unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_response_length_is_min_of_k_and_pool() {
    let engine = fitted_engine().await;
    let orchestrator = engine.orchestrator();

    let all = orchestrator
        .recommend(&RecommendationRequest::topic("python", 100))
        .unwrap();
    assert_eq!(all.len(), 5);

    let few = orchestrator
        .recommend(&RecommendationRequest::topic("python", 3))
        .unwrap();
    assert_eq!(few.len(), 3);

    let pooled = orchestrator
        .recommend(&RecommendationRequest::topic("python", 3).with_candidate_pool(["C3", "C3"]))
        .unwrap();
    assert_eq!(ids(&pooled), vec!["C3"]);
}

#[tokio::test]
async fn test_default_config_keeps_taken_courses_in_pool() {
    let engine = fitted_engine().await;
    engine.record_interactions(vec![Interaction::new("L2", "C3", Signal::Viewed)]);

    let request = RecommendationRequest::hybrid("L2", "python", 3)
        .with_candidate_pool(["C1", "C2", "C3"]);
    let recommendations = engine.orchestrator().recommend(&request).unwrap();
    assert_eq!(recommendations.len(), 3);
}

#[tokio::test]
async fn test_unset_top_k_uses_engine_default() {
    let store = CourseStore::from_courses(scenario_courses()).unwrap();
    let config = EngineConfig::default().with_default_top_k(2);
    let engine = RecommendationEngine::with_data(config, store, scenario_log()).unwrap();
    engine.fit(CancelFlag::new()).await.unwrap();

    let mut request = RecommendationRequest::topic("python", 5);
    request.top_k = None;
    let recommendations = engine.orchestrator().recommend(&request).unwrap();
    assert_eq!(recommendations.len(), 2);
}

#[tokio::test]
async fn test_zero_top_k_is_invalid() {
    let engine = fitted_engine().await;
    let request = RecommendationRequest::topic("python programming", 0);

    let err = engine.orchestrator().recommend(&request).unwrap_err();
    assert!(err.is_invalid_request());
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_cold_start_learner_falls_back_to_topic() {
    let engine = fitted_engine().await;
    let orchestrator = engine.orchestrator();

    let hybrid = orchestrator
        .recommend(&RecommendationRequest::hybrid("L1", "python programming", 5))
        .unwrap();
    let topic_only = orchestrator
        .recommend(&RecommendationRequest::topic("python programming", 5))
        .unwrap();

    assert_eq!(hybrid, topic_only);
    assert!(hybrid.iter().all(|r| r.source == TOPIC));
}

#[tokio::test]
async fn test_only_cold_learner_registered_falls_back_to_topic() {
    let store = CourseStore::from_courses(scenario_courses().into_iter().take(3)).unwrap();
    let mut log = InteractionLog::new();
    log.register_learner("L1");
    let engine = RecommendationEngine::with_data(EngineConfig::default(), store, log).unwrap();

    let report = engine.fit(CancelFlag::new()).await.unwrap();
    assert!(report.is_fitted(TOPIC));
    assert!(!report.is_fitted(PREFERENCE));

    let orchestrator = engine.orchestrator();
    let hybrid = orchestrator
        .recommend(&RecommendationRequest::hybrid("L1", "python programming", 2))
        .unwrap();
    let topic_only = orchestrator
        .recommend(&RecommendationRequest::topic("python programming", 2))
        .unwrap();
    assert_eq!(hybrid, topic_only);

    let mut top = ids(&hybrid);
    top.sort();
    assert_eq!(top, vec!["C1", "C2"]);

    let err = orchestrator
        .recommend(&RecommendationRequest::preference("L1", 2))
        .unwrap_err();
    assert!(matches!(
        err.recommender_error(),
        Some(RecommenderError::InsufficientData { .. })
    ));
}

#[tokio::test]
async fn test_cold_learner_uses_topic_even_at_zero_topic_weight() {
    let engine = fitted_engine().await;
    let orchestrator = engine.orchestrator();

    let hybrid = orchestrator
        .recommend(
            &RecommendationRequest::hybrid("L1", "python programming", 2).with_weights(0.0, 1.0),
        )
        .unwrap();
    let topic_only = orchestrator
        .recommend(&RecommendationRequest::topic("python programming", 2))
        .unwrap();
    assert_eq!(hybrid, topic_only);
    assert!(hybrid.iter().all(|r| r.source == TOPIC));
}

#[tokio::test]
async fn test_unknown_learner_falls_back_to_topic_under_hybrid() {
    let engine = fitted_engine().await;
    let orchestrator = engine.orchestrator();

    let hybrid = orchestrator
        .recommend(&RecommendationRequest::hybrid("nobody", "cooking", 3))
        .unwrap();
    let topic_only = orchestrator
        .recommend(&RecommendationRequest::topic("cooking", 3))
        .unwrap();
    assert_eq!(hybrid, topic_only);

    let err = orchestrator
        .recommend(&RecommendationRequest::preference("nobody", 3))
        .unwrap_err();
    assert!(matches!(
        err.recommender_error(),
        Some(RecommenderError::UnknownLearner(_))
    ));
}

#[tokio::test]
async fn test_cold_start_under_pure_preference_is_insufficient_data() {
    let engine = fitted_engine().await;
    let err = engine
        .orchestrator()
        .recommend(&RecommendationRequest::preference("L1", 3))
        .unwrap_err();
    assert!(matches!(
        err.recommender_error(),
        Some(RecommenderError::InsufficientData { .. })
    ));
}

#[tokio::test]
async fn test_extreme_weights_match_single_strategies() {
    let engine = fitted_engine().await;
    let orchestrator = engine.orchestrator();

    let topic_weighted = orchestrator
        .recommend(&RecommendationRequest::hybrid("L2", "python", 5).with_weights(1.0, 0.0))
        .unwrap();
    let topic_only = orchestrator
        .recommend(&RecommendationRequest::topic("python", 5).with_learner("L2"))
        .unwrap();
    assert_eq!(topic_weighted, topic_only);

    let preference_weighted = orchestrator
        .recommend(&RecommendationRequest::hybrid("L2", "python", 5).with_weights(0.0, 1.0))
        .unwrap();
    let preference_only = orchestrator
        .recommend(&RecommendationRequest::preference("L2", 5))
        .unwrap();
    assert_eq!(preference_weighted, preference_only);
    assert!(preference_only.iter().all(|r| r.source == PREFERENCE));
}

#[tokio::test]
async fn test_blended_scores_are_tagged_hybrid() {
    let engine = fitted_engine().await;
    let recommendations = engine
        .orchestrator()
        .recommend(&RecommendationRequest::hybrid("L2", "python", 5))
        .unwrap();
    assert_eq!(recommendations.len(), 5);
    assert!(recommendations.iter().all(|r| r.source == HYBRID_SOURCE));
    assert!(recommendations.windows(2).all(|w| w[0].score >= w[1].score));
}

#[tokio::test]
async fn test_invalid_weights_rejected() {
    let engine = fitted_engine().await;
    let orchestrator = engine.orchestrator();

    for (topic, preference) in [(0.6, 0.6), (-0.1, 1.1), (f64::INFINITY, 0.0)] {
        let request = RecommendationRequest::hybrid("L2", "python", 3).with_weights(topic, preference);
        let err = orchestrator.recommend(&request).unwrap_err();
        assert!(err.is_invalid_request(), "weights ({topic}, {preference})");
    }
}

#[tokio::test]
async fn test_missing_inputs_rejected_per_strategy() {
    let engine = fitted_engine().await;
    let orchestrator = engine.orchestrator();

    let topic_without_query = RecommendationRequest::new(Strategy::Topic, 3).with_learner("L2");
    assert!(orchestrator.recommend(&topic_without_query).unwrap_err().is_invalid_request());

    let preference_without_learner = RecommendationRequest::new(Strategy::Preference, 3);
    assert!(orchestrator
        .recommend(&preference_without_learner)
        .unwrap_err()
        .is_invalid_request());

    let empty_hybrid = RecommendationRequest::new(Strategy::Hybrid, 3);
    assert!(orchestrator.recommend(&empty_hybrid).unwrap_err().is_invalid_request());
}

#[tokio::test]
async fn test_unknown_pool_course_is_not_found() {
    let engine = fitted_engine().await;
    let request =
        RecommendationRequest::topic("python", 3).with_candidate_pool(["C1", "C404"]);
    let err = engine.orchestrator().recommend(&request).unwrap_err();
    assert!(matches!(
        err.recommender_error(),
        Some(RecommenderError::NotFound { .. })
    ));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_anchor_is_removed_from_its_own_pool() {
    let engine = fitted_engine().await;
    let recommendations = engine
        .orchestrator()
        .recommend(&RecommendationRequest::similar_to("C1", 10))
        .unwrap();

    assert_eq!(recommendations.len(), 4);
    assert!(!ids(&recommendations).contains(&"C1"));
}

#[tokio::test]
async fn test_ties_ordered_by_course_id() {
    // T2 and T1 share every facet and nobody took either, so their
    // preference scores are identical
    let store = CourseStore::from_courses(vec![
        Course::new("T0", "welding basics").with_categories(["metal"]),
        Course::new("T2", "welding safety").with_categories(["metal"]),
        Course::new("T1", "welding practice").with_categories(["metal"]),
        Course::new("T3", "bread baking").with_categories(["kitchen"]),
    ])
    .unwrap();
    let mut log = InteractionLog::new();
    log.record(Interaction::new("W", "T0", Signal::Completed));
    let engine = RecommendationEngine::with_data(EngineConfig::default(), store, log).unwrap();
    engine.fit(CancelFlag::new()).await.unwrap();

    let request = RecommendationRequest::preference("W", 10);
    let first = engine.orchestrator().recommend(&request).unwrap();
    let second = engine.orchestrator().recommend(&request).unwrap();

    assert_eq!(ids(&first), vec!["T1", "T2", "T3"]);
    assert_eq!(first[0].score, first[1].score);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_stale_model_after_ingest() {
    let engine = fitted_engine().await;
    engine
        .ingest_courses(
            vec![Course::new("C6", "welding safety").with_categories(["metal"])],
            IngestMode::Extend,
        )
        .unwrap();

    let err = engine
        .orchestrator()
        .recommend(&RecommendationRequest::topic("python", 3))
        .unwrap_err();
    assert!(matches!(
        err.recommender_error(),
        Some(RecommenderError::StaleModel { .. })
    ));

    engine.fit(CancelFlag::new()).await.unwrap();
    let recommendations = engine
        .orchestrator()
        .recommend(&RecommendationRequest::topic("welding", 1))
        .unwrap();
    assert_eq!(ids(&recommendations), vec!["C6"]);
}

#[tokio::test]
async fn test_unfitted_engine_reports_stale_model() {
    let store = CourseStore::from_courses(scenario_courses()).unwrap();
    let engine =
        RecommendationEngine::with_data(EngineConfig::default(), store, scenario_log()).unwrap();

    let err = engine
        .orchestrator()
        .recommend(&RecommendationRequest::topic("python", 3))
        .unwrap_err();
    assert!(matches!(err, RecommendError::Recommender(RecommenderError::StaleModel { .. })));
}

#[tokio::test]
async fn test_filters_restrict_candidates() {
    let engine = fitted_engine().await;
    let request = RecommendationRequest::topic("python", 10)
        .with_max_level(Level::Intermediate)
        .with_attribute("duration", "long");

    let recommendations = engine.orchestrator().recommend(&request).unwrap();
    assert_eq!(ids(&recommendations), vec!["C4"]);
}

#[tokio::test]
async fn test_interacted_courses_excluded_when_requested() {
    let engine = fitted_engine().await;
    let request = RecommendationRequest::hybrid("L2", "python", 10).with_exclude_interacted(true);

    let recommendations = engine.orchestrator().recommend(&request).unwrap();
    let returned = ids(&recommendations);
    assert!(!returned.contains(&"C1"));
    assert!(!returned.contains(&"C4"));
    assert_eq!(returned.len(), 3);
}

#[tokio::test]
async fn test_refine_suggests_open_facet() {
    let engine = fitted_engine().await;
    let request = RecommendationRequest::topic("python", 10).with_attribute("certificate", "yes");

    let refinement = engine.orchestrator().refine(&request).unwrap();
    assert!(refinement.applied_filters.is_empty());
    assert_eq!(refinement.remaining_facets, vec!["duration".to_string()]);
    assert_eq!(refinement.suggested_split, Some("duration".to_string()));
    assert_eq!(refinement.recommendations.len(), 5);
}

#[tokio::test]
async fn test_recommend_async_matches_sync() {
    let engine = fitted_engine().await;
    let orchestrator = engine.orchestrator();
    let request = RecommendationRequest::hybrid("L3", "bread", 3);

    let sync = orchestrator.recommend(&request).unwrap();
    let from_task = orchestrator.recommend_async(request).await.unwrap();
    assert_eq!(sync, from_task);
}
