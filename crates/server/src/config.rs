//! Engine configuration.
//!
//! Every field has a default, so a config file only needs the keys it
//! changes:
//!
//! ```json
//! { "topic": { "n_topics": 4 }, "weights": { "topic": 0.7, "preference": 0.3 } }
//! ```

use std::fs;
use std::path::Path;

use recommenders::{PreferenceConfig, TopicConfig};
use serde::{Deserialize, Serialize};

use crate::error::{RecommendError, Result};

/// Number of recommendations returned when a request does not say
pub const DEFAULT_TOP_K: usize = 10;

/// Tolerance on the hybrid weight sum
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Blend of topic and preference scores in hybrid mode
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HybridWeights {
    pub topic: f64,
    pub preference: f64,
}

impl HybridWeights {
    pub fn new(topic: f64, preference: f64) -> Self {
        Self { topic, preference }
    }

    /// Both weights finite and non-negative, summing to 1
    pub fn validate(&self) -> Result<()> {
        for (name, weight) in [("topic", self.topic), ("preference", self.preference)] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(RecommendError::invalid(format!(
                    "{name} weight must be finite and non-negative, got {weight}"
                )));
            }
        }
        let sum = self.topic + self.preference;
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(RecommendError::invalid(format!(
                "hybrid weights must sum to 1, got {sum}"
            )));
        }
        Ok(())
    }
}

impl Default for HybridWeights {
    fn default() -> Self {
        Self::new(0.5, 0.5)
    }
}

/// Configuration for [`RecommendationEngine`](crate::RecommendationEngine)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub topic: TopicConfig,
    pub preference: PreferenceConfig,
    /// Hybrid weights used when a request carries none
    pub weights: HybridWeights,
    /// Number of recommendations for requests that leave `top_k` unset
    pub default_top_k: usize,
    /// Drop courses the learner already interacted with unless a request
    /// says otherwise. Off by default, so a response fills `top_k` whenever
    /// the pool is large enough
    pub exclude_interacted: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            topic: TopicConfig::default(),
            preference: PreferenceConfig::default(),
            weights: HybridWeights::default(),
            default_top_k: DEFAULT_TOP_K,
            exclude_interacted: false,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a JSON config file and validate it
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| RecommendError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_topic(mut self, topic: TopicConfig) -> Self {
        self.topic = topic;
        self
    }

    pub fn with_preference(mut self, preference: PreferenceConfig) -> Self {
        self.preference = preference;
        self
    }

    pub fn with_weights(mut self, topic: f64, preference: f64) -> Self {
        self.weights = HybridWeights::new(topic, preference);
        self
    }

    pub fn with_default_top_k(mut self, top_k: usize) -> Self {
        self.default_top_k = top_k;
        self
    }

    pub fn with_exclude_interacted(mut self, exclude: bool) -> Self {
        self.exclude_interacted = exclude;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.weights
            .validate()
            .map_err(|e| RecommendError::Config(e.to_string()))?;
        if self.default_top_k == 0 {
            return Err(RecommendError::Config(
                "default_top_k must be positive".to_string(),
            ));
        }
        if self.topic.n_topics == 0 {
            return Err(RecommendError::Config("topic.n_topics must be positive".to_string()));
        }
        Ok(())
    }
}
