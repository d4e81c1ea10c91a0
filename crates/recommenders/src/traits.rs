//! The contract every recommender implements.

use corpus::CourseId;

use crate::error::Result;
use crate::snapshot::CancelFlag;
use crate::types::{FitInput, ModelStamp, RecommenderDescriptor, RecommenderKind, ScoreOutcome, ScoreQuery};

/// Core trait for recommendation strategies.
///
/// ## Design Note
/// - `Send + Sync` so one instance can serve concurrent requests
/// - `fit` takes `&self`: implementations build a new model privately and
///   publish it atomically, so scoring keeps running during a fit
/// - `score` never turns a missing profile into zeros; it returns
///   [`ScoreOutcome::Unavailable`] instead
pub trait Recommender: Send + Sync {
    /// Name used as the source tag on recommendations
    fn name(&self) -> &str;

    fn kind(&self) -> RecommenderKind;

    /// Stamp of the currently published model, `None` before the first fit
    fn stamp(&self) -> Option<ModelStamp>;

    fn descriptor(&self) -> RecommenderDescriptor {
        RecommenderDescriptor {
            name: self.name().to_string(),
            kind: self.kind(),
            model: self.stamp(),
        }
    }

    /// Fit a new model and publish it.
    ///
    /// # Returns
    /// * `Ok(ModelStamp)` - The stamp of the newly published model
    /// * `Err` - `InsufficientData` or `Cancelled`; the previous model stays active
    fn fit(&self, input: &FitInput<'_>, cancel: &CancelFlag) -> Result<ModelStamp>;

    /// Score candidate courses for a query.
    ///
    /// An empty candidate slice yields an empty mapping.
    fn score(&self, query: &ScoreQuery, candidates: &[CourseId]) -> Result<ScoreOutcome>;

    /// JSON dump of the published model, `None` before the first fit
    fn export_model(&self) -> Result<Option<serde_json::Value>>;
}
