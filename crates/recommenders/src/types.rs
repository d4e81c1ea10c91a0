//! Types shared by all recommenders: model stamps, descriptors, queries and
//! scoring outcomes.

use corpus::{CorpusVersion, CourseId, CourseStore, InteractionLog, LearnerId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Per-recommender counter, bumped on every successful fit
pub type ModelVersion = u64;

/// Identifies one fitted model and the corpus it was fitted against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelStamp {
    pub model_version: ModelVersion,
    pub corpus_version: CorpusVersion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommenderKind {
    Topic,
    Preference,
}

impl fmt::Display for RecommenderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecommenderKind::Topic => f.write_str("topic"),
            RecommenderKind::Preference => f.write_str("preference"),
        }
    }
}

/// Capability record describing a registered recommender
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommenderDescriptor {
    pub name: String,
    pub kind: RecommenderKind,
    /// `None` until the first successful fit
    pub model: Option<ModelStamp>,
}

/// Everything a fit may read. Both references point at one consistent
/// snapshot for the whole fit.
#[derive(Debug, Clone, Copy)]
pub struct FitInput<'a> {
    pub corpus: &'a CourseStore,
    pub interactions: &'a InteractionLog,
}

/// What a scoring call is about.
///
/// Topic scoring uses `anchor_course`, else `interests`, else `text`.
/// Preference scoring uses `learner_id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreQuery {
    pub learner_id: Option<LearnerId>,
    pub text: Option<String>,
    pub anchor_course: Option<CourseId>,
    /// Weighted interest labels, e.g. `{"IT": 0.2, "Business": 0.6}`
    pub interests: Option<BTreeMap<String, f64>>,
    /// When set, a model fitted against any other corpus version is stale
    pub expected_corpus: Option<CorpusVersion>,
}

impl ScoreQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new().with_text(text)
    }

    pub fn learner(learner_id: impl Into<LearnerId>) -> Self {
        Self::new().with_learner(learner_id)
    }

    pub fn anchor(course_id: impl Into<CourseId>) -> Self {
        Self::new().with_anchor(course_id)
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_learner(mut self, learner_id: impl Into<LearnerId>) -> Self {
        self.learner_id = Some(learner_id.into());
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

    pub fn with_expected_corpus(mut self, version: CorpusVersion) -> Self {
        self.expected_corpus = Some(version);
        self
    }
}

/// Why a recommender declined to score
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnavailableReason {
    /// Known learner without any usable interaction history
    ColdStart { learner_id: LearnerId },
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnavailableReason::ColdStart { learner_id } => {
                write!(f, "learner {learner_id} has no interaction history")
            }
        }
    }
}

/// Result of a scoring call.
///
/// `Unavailable` is never collapsed into zero scores so that callers can
/// apply their own fallback.
#[derive(Debug, Clone, PartialEq)]
pub enum ScoreOutcome {
    Scored(HashMap<CourseId, f64>),
    Unavailable(UnavailableReason),
}

impl ScoreOutcome {
    pub fn scores(&self) -> Option<&HashMap<CourseId, f64>> {
        match self {
            ScoreOutcome::Scored(scores) => Some(scores),
            ScoreOutcome::Unavailable(_) => None,
        }
    }

    pub fn into_scores(self) -> Option<HashMap<CourseId, f64>> {
        match self {
            ScoreOutcome::Scored(scores) => Some(scores),
            ScoreOutcome::Unavailable(_) => None,
        }
    }
}
