//! Core domain types: courses, learners and their interactions.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use crate::error::CorpusError;

/// Unique course identifier (numeric ids from input files are kept as text)
pub type CourseId = String;

/// Unique learner identifier
pub type LearnerId = String;

/// Monotonic counter bumped on every successful corpus ingest
pub type CorpusVersion = u64;

/// Course difficulty level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    #[serde(alias = "Beginner")]
    Beginner,
    #[serde(alias = "Intermediate")]
    Intermediate,
    #[serde(alias = "Advanced")]
    Advanced,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Beginner => "beginner",
            Level::Intermediate => "intermediate",
            Level::Advanced => "advanced",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = CorpusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beginner" => Ok(Level::Beginner),
            "intermediate" => Ok(Level::Intermediate),
            "advanced" => Ok(Level::Advanced),
            _ => Err(CorpusError::InvalidValue {
                field: "level".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Value of a free-form course attribute: a single value or a list of them
/// (e.g. `"language": ["en", "de"]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    One(String),
    Many(Vec<String>),
}

impl AttributeValue {
    pub fn values(&self) -> &[String] {
        match self {
            AttributeValue::One(value) => std::slice::from_ref(value),
            AttributeValue::Many(values) => values,
        }
    }

    pub fn contains(&self, value: &str) -> bool {
        self.values().iter().any(|v| v == value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::One(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::One(value)
    }
}

impl From<Vec<String>> for AttributeValue {
    fn from(values: Vec<String>) -> Self {
        AttributeValue::Many(values)
    }
}

/// A course in the catalogue.
///
/// Courses are immutable once ingested. A corpus refresh replaces them
/// wholesale rather than editing in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    #[serde(alias = "course_id", deserialize_with = "deserialize_id")]
    pub id: CourseId,
    #[serde(alias = "name")]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub level: Option<Level>,
    #[serde(default)]
    pub domain: Option<String>,
    /// Free-form facets such as `duration`, `price` or `certificate`
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl Course {
    pub fn new(id: impl Into<CourseId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            tags: Vec::new(),
            categories: Vec::new(),
            level: None,
            domain: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = Some(level);
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_attribute(
        mut self,
        name: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Text used for topic modelling: title, description, tags and categories
    pub fn document(&self) -> String {
        let mut parts: Vec<&str> = Vec::with_capacity(2 + self.tags.len() + self.categories.len());
        parts.push(&self.title);
        if !self.description.is_empty() {
            parts.push(&self.description);
        }
        parts.extend(self.tags.iter().map(String::as_str));
        parts.extend(self.categories.iter().map(String::as_str));
        parts.join(" ")
    }
}

/// Kind of learner interaction with a course
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Viewed,
    #[default]
    Enrolled,
    Completed,
    Rated,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Viewed => "viewed",
            Signal::Enrolled => "enrolled",
            Signal::Completed => "completed",
            Signal::Rated => "rated",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One learner-course interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub learner_id: LearnerId,
    pub course_id: CourseId,
    pub signal: Signal,
    /// Unix timestamp (seconds)
    pub timestamp: i64,
    /// Optional scalar strength, e.g. the rating value for [`Signal::Rated`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strength: Option<f32>,
}

impl Interaction {
    pub fn new(
        learner_id: impl Into<LearnerId>,
        course_id: impl Into<CourseId>,
        signal: Signal,
    ) -> Self {
        Self {
            learner_id: learner_id.into(),
            course_id: course_id.into(),
            signal,
            timestamp: 0,
            strength: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_strength(mut self, strength: f32) -> Self {
        self.strength = Some(strength);
        self
    }
}

/// A learner and the interactions recorded for them, oldest first.
///
/// Profiles only ever grow: there is no way to remove or replace an
/// interaction once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnerProfile {
    pub id: LearnerId,
    interactions: Vec<Interaction>,
}

impl LearnerProfile {
    pub fn new(id: impl Into<LearnerId>) -> Self {
        Self {
            id: id.into(),
            interactions: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, interaction: Interaction) {
        self.interactions.push(interaction);
    }

    pub fn interactions(&self) -> &[Interaction] {
        &self.interactions
    }

    /// True when the learner has no recorded history at all
    pub fn is_cold(&self) -> bool {
        self.interactions.is_empty()
    }

    pub fn interacted_courses(&self) -> HashSet<CourseId> {
        self.interactions
            .iter()
            .map(|i| i.course_id.clone())
            .collect()
    }
}

/// Accepts `"C1"` as well as `1` for identifiers
pub(crate) fn deserialize_id<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(text) => text,
        RawId::Number(number) => number.to_string(),
    })
}
