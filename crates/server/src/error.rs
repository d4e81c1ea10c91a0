//! Errors surfaced by the engine and the orchestrator.

use corpus::CorpusError;
use recommenders::RecommenderError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecommendError {
    #[error(transparent)]
    Recommender(#[from] RecommenderError),

    #[error(transparent)]
    Corpus(#[from] CorpusError),

    /// A filter could not resolve a candidate
    #[error("Filter pipeline failed: {0:#}")]
    Pipeline(anyhow::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl RecommendError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::Recommender(RecommenderError::InvalidRequest(reason.into()))
    }

    pub(crate) fn insufficient(recommender: &str, reason: impl Into<String>) -> Self {
        Self::Recommender(RecommenderError::InsufficientData {
            recommender: recommender.to_string(),
            reason: reason.into(),
        })
    }

    /// The underlying recommender error, if any
    pub fn recommender_error(&self) -> Option<&RecommenderError> {
        match self {
            Self::Recommender(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_invalid_request(&self) -> bool {
        matches!(self, Self::Recommender(RecommenderError::InvalidRequest(_)))
    }

    /// Whether retrying the same request later may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Recommender(err) => err.is_retryable(),
            Self::Corpus(CorpusError::NotFound(_)) => true,
            Self::Corpus(_) | Self::Pipeline(_) | Self::Config(_) => false,
            Self::Io(_) | Self::Task(_) => true,
        }
    }
}

pub type Result<T> = std::result::Result<T, RecommendError>;
