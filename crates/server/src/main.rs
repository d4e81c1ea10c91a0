//! Simple test harness for the recommendation engine.
//!
//! Loads the demo catalogue, fits both recommenders and prints a hybrid
//! recommendation list for one learner.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use corpus::{CourseStore, InteractionLog};
use recommenders::CancelFlag;
use server::{EngineConfig, RecommendationEngine, RecommendationRequest};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("info,server=debug,recommenders=debug,pipeline=debug")
        .init();

    info!("Starting course recommendation test harness");

    info!("Loading demo data...");
    let store = CourseStore::load_from_file(Path::new("data/demo/courses.json"))
        .context("Failed to load courses")?;
    let log = InteractionLog::load_from_file(Path::new("data/demo/interactions.json"))
        .context("Failed to load interactions")?;
    info!("Loaded {} courses and {} interactions", store.len(), log.len());

    let engine = RecommendationEngine::with_data(EngineConfig::default(), store, log)?;
    let report = engine.fit(CancelFlag::new()).await?;
    for model in &report.fitted {
        info!("Fitted '{}' in {}ms", model.name, model.elapsed_ms);
    }
    for (name, reason) in &report.failed {
        info!("Could not fit '{}': {}", name, reason);
    }

    let learner_id = "1";
    let request = RecommendationRequest::hybrid(learner_id, "python programming", 5);

    info!("Getting recommendations for learner {}", learner_id);
    let recommendations = engine.orchestrator().recommend_async(request).await?;

    info!("Received {} recommendations:", recommendations.len());
    for (i, rec) in recommendations.iter().enumerate() {
        info!(
            "{}. [{}] {} - Score: {:.3} [{}]",
            i + 1,
            rec.course_id,
            rec.title,
            rec.score,
            rec.source
        );
    }

    Ok(())
}
