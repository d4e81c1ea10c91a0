//! Name → recommender lookup.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::info;

use crate::error::{RecommenderError, Result};
use crate::traits::Recommender;
use crate::types::RecommenderDescriptor;

/// Maps recommender names to shared adapter instances so callers only depend
/// on the [`Recommender`] contract.
#[derive(Default)]
pub struct Registry {
    entries: RwLock<BTreeMap<String, Arc<dyn Recommender>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under `name`; fails with `DuplicateName` on collision
    pub fn register(&self, name: impl Into<String>, adapter: Arc<dyn Recommender>) -> Result<()> {
        let name = name.into();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.contains_key(&name) {
            return Err(RecommenderError::DuplicateName(name));
        }
        info!("Registered recommender '{}' ({})", name, adapter.kind());
        entries.insert(name, adapter);
        Ok(())
    }

    /// Look up an adapter; fails with `NotFound` if unregistered
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Recommender>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| RecommenderError::NotFound {
                entity: "recommender",
                id: name.to_string(),
            })
    }

    /// Registered names in ascending order
    pub fn names(&self) -> Vec<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// `(name, adapter)` pairs in ascending name order
    pub fn entries(&self) -> Vec<(String, Arc<dyn Recommender>)> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, adapter)| (name.clone(), Arc::clone(adapter)))
            .collect()
    }

    pub fn descriptors(&self) -> Vec<RecommenderDescriptor> {
        self.entries()
            .into_iter()
            .map(|(_, adapter)| adapter.descriptor())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PreferenceRecommender, TopicRecommender};

    #[test]
    fn test_register_and_resolve() {
        let registry = Registry::new();
        registry
            .register("topic", Arc::new(TopicRecommender::new()))
            .unwrap();
        registry
            .register("preference", Arc::new(PreferenceRecommender::new()))
            .unwrap();

        let topic = registry.resolve("topic").unwrap();
        assert_eq!(topic.name(), "topic");
        assert_eq!(registry.names(), vec!["preference", "topic"]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_duplicate_name() {
        let registry = Registry::new();
        registry
            .register("topic", Arc::new(TopicRecommender::new()))
            .unwrap();

        let result = registry.register("topic", Arc::new(TopicRecommender::new()));
        assert!(matches!(result, Err(RecommenderError::DuplicateName(name)) if name == "topic"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_resolve_unknown() {
        let registry = Registry::new();
        assert!(registry.is_empty());
        assert!(matches!(
            registry.resolve("semantic"),
            Err(RecommenderError::NotFound { entity: "recommender", .. })
        ));
    }

    #[test]
    fn test_descriptors_report_unfitted_models() {
        let registry = Registry::new();
        registry
            .register("topic", Arc::new(TopicRecommender::new()))
            .unwrap();

        let descriptors = registry.descriptors();
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].name, "topic");
        assert!(descriptors[0].model.is_none());
    }
}
