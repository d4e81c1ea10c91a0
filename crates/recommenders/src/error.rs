//! Error taxonomy shared by every recommender.

use corpus::{CorpusError, LearnerId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecommenderError {
    /// Fit-time: not enough courses or interactions to build a model
    #[error("Insufficient data for '{recommender}': {reason}")]
    InsufficientData { recommender: String, reason: String },

    /// Serve-time: the model was never fitted or was fitted on another corpus
    #[error("Model '{recommender}' is stale: {reason}")]
    StaleModel { recommender: String, reason: String },

    /// The learner was never seen by the preference model
    #[error("Unknown learner: {0}")]
    UnknownLearner(LearnerId),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Recommender name already registered: {0}")]
    DuplicateName(String),

    /// A fit was cancelled; the previously published model stays active
    #[error("Fit of '{0}' was cancelled")]
    Cancelled(String),

    #[error(transparent)]
    Corpus(#[from] CorpusError),

    #[error("Model serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RecommenderError {
    pub(crate) fn insufficient(recommender: &str, reason: impl Into<String>) -> Self {
        Self::InsufficientData {
            recommender: recommender.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn stale(recommender: &str, reason: impl Into<String>) -> Self {
        Self::StaleModel {
            recommender: recommender.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn course_not_found(id: &str) -> Self {
        Self::NotFound {
            entity: "course",
            id: id.to_string(),
        }
    }

    /// Whether the caller can succeed later without changing the request.
    ///
    /// Missing data and stale models resolve after ingest or re-fit; unknown
    /// ids resolve once the entity exists. Malformed requests and duplicate
    /// registrations are caller bugs.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::InsufficientData { .. }
            | Self::StaleModel { .. }
            | Self::UnknownLearner(_)
            | Self::NotFound { .. }
            | Self::Cancelled(_) => true,
            Self::Corpus(CorpusError::NotFound(_)) => true,
            Self::InvalidRequest(_)
            | Self::DuplicateName(_)
            | Self::Corpus(_)
            | Self::Serialization(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, RecommenderError>;
