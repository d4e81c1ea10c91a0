//! Server crate for the course recommendation engine.
//!
//! This crate contains the engine that owns data and fitted models, and the
//! orchestrator that turns a request into a ranked course list.
//!
//! ## Example Usage
//! ```ignore
//! use server::{EngineConfig, RecommendationEngine, RecommendationRequest};
//! use recommenders::CancelFlag;
//!
//! let engine = RecommendationEngine::with_data(EngineConfig::default(), store, log)?;
//! engine.fit(CancelFlag::new()).await?;
//!
//! let request = RecommendationRequest::hybrid("1", "python programming", 5);
//! let recommendations = engine.orchestrator().recommend(&request)?;
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod orchestrator;

pub use config::{EngineConfig, HybridWeights, DEFAULT_TOP_K};
pub use engine::{FitReport, FittedModel, RecommendationEngine, PREFERENCE, TOPIC};
pub use error::{RecommendError, Result};
pub use orchestrator::{
    Recommendation, RecommendationOrchestrator, RecommendationRequest, Refinement,
    RequestFilters, Strategy, HYBRID_SOURCE,
};
