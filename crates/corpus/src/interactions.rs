//! Append-only log of learner interactions.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use tracing::info;

use crate::error::Result;
use crate::parser;
use crate::types::{CourseId, Interaction, LearnerId, LearnerProfile};

/// All learner profiles known to the engine.
///
/// Learners can be registered without any history (cold start). Recording an
/// interaction for an unknown learner registers them implicitly.
#[derive(Debug, Clone, Default)]
pub struct InteractionLog {
    profiles: HashMap<LearnerId, LearnerProfile>,
    total: usize,
}

impl InteractionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON or JSON Lines interaction file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let interactions = parser::parse_interactions(path)?;
        info!(
            "Loaded {} interactions from {}",
            interactions.len(),
            path.display()
        );
        let mut log = Self::new();
        log.extend(interactions);
        Ok(log)
    }

    /// Register a learner with an empty profile.
    ///
    /// Returns `false` if the learner was already known; their history is kept.
    pub fn register_learner(&mut self, learner_id: impl Into<LearnerId>) -> bool {
        let learner_id = learner_id.into();
        if self.profiles.contains_key(&learner_id) {
            return false;
        }
        self.profiles
            .insert(learner_id.clone(), LearnerProfile::new(learner_id));
        true
    }

    /// Append one interaction to the learner's profile
    pub fn record(&mut self, interaction: Interaction) {
        self.profiles
            .entry(interaction.learner_id.clone())
            .or_insert_with(|| LearnerProfile::new(interaction.learner_id.clone()))
            .push(interaction);
        self.total += 1;
    }

    pub fn extend(&mut self, interactions: impl IntoIterator<Item = Interaction>) {
        for interaction in interactions {
            self.record(interaction);
        }
    }

    pub fn profile(&self, learner_id: &str) -> Option<&LearnerProfile> {
        self.profiles.get(learner_id)
    }

    pub fn contains(&self, learner_id: &str) -> bool {
        self.profiles.contains_key(learner_id)
    }

    /// Learner ids in ascending order
    pub fn learners(&self) -> Vec<&LearnerId> {
        let mut ids: Vec<&LearnerId> = self.profiles.keys().collect();
        ids.sort();
        ids
    }

    /// Profiles in ascending learner order, for deterministic iteration
    pub fn profiles(&self) -> Vec<&LearnerProfile> {
        let mut profiles: Vec<&LearnerProfile> = self.profiles.values().collect();
        profiles.sort_by(|a, b| a.id.cmp(&b.id));
        profiles
    }

    /// Courses the learner has interacted with (empty for unknown learners)
    pub fn interacted_courses(&self, learner_id: &str) -> HashSet<CourseId> {
        self.profiles
            .get(learner_id)
            .map(LearnerProfile::interacted_courses)
            .unwrap_or_default()
    }

    /// Total number of recorded interactions
    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn learner_count(&self) -> usize {
        self.profiles.len()
    }
}
