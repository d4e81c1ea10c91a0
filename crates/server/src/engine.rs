//! # Recommendation Engine
//!
//! Owns the published corpus snapshot, the interaction log and the registry
//! of recommenders, and coordinates fitting.
//!
//! ## Lifecycle
//! 1. `ingest_courses` / `record_interactions` feed data in
//! 2. `fit` trains every registered recommender against one consistent copy
//!    of that data on the blocking pool and publishes each model on success
//! 3. `orchestrator()` hands out request handlers that read the snapshots
//!
//! A fit that fails or is cancelled leaves the previously published models
//! serving.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Instant;

use corpus::{
    Course, CorpusVersion, CourseStore, IngestMode, Interaction, InteractionLog, LearnerId,
    LearnerProfile,
};
use recommenders::{
    CancelFlag, FitInput, ModelStamp, PreferenceRecommender, Recommender,
    RecommenderDescriptor, RecommenderError, Registry, SnapshotCell, TopicRecommender,
};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::config::EngineConfig;
use crate::error::{RecommendError, Result};
use crate::orchestrator::RecommendationOrchestrator;

/// Registry name of the topic recommender
pub const TOPIC: &str = "topic";
/// Registry name of the preference recommender
pub const PREFERENCE: &str = "preference";

/// One recommender's successful fit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FittedModel {
    pub name: String,
    pub stamp: ModelStamp,
    pub elapsed_ms: u128,
}

/// Outcome of [`RecommendationEngine::fit`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitReport {
    pub corpus_version: CorpusVersion,
    pub fitted: Vec<FittedModel>,
    /// Recommenders whose fit failed, with the reason; their previous
    /// model (if any) is still serving
    pub failed: Vec<(String, String)>,
}

impl FitReport {
    pub fn is_fitted(&self, name: &str) -> bool {
        self.fitted.iter().any(|model| model.name == name)
    }
}

pub struct RecommendationEngine {
    config: EngineConfig,
    corpus: Arc<SnapshotCell<CourseStore>>,
    interactions: Arc<RwLock<InteractionLog>>,
    registry: Arc<Registry>,
    topic: Arc<TopicRecommender>,
    preference: Arc<PreferenceRecommender>,
    ingest_lock: Mutex<()>,
    fit_lock: tokio::sync::Mutex<()>,
}

impl RecommendationEngine {
    /// Empty engine with the `topic` and `preference` recommenders registered
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let topic = Arc::new(TopicRecommender::with_config(config.topic.clone()));
        let preference = Arc::new(PreferenceRecommender::with_config(config.preference.clone()));

        let registry = Arc::new(Registry::new());
        registry.register(TOPIC, topic.clone())?;
        registry.register(PREFERENCE, preference.clone())?;

        Ok(Self {
            config,
            corpus: Arc::new(SnapshotCell::new(CourseStore::new())),
            interactions: Arc::new(RwLock::new(InteractionLog::new())),
            registry,
            topic,
            preference,
            ingest_lock: Mutex::new(()),
            fit_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Engine seeded with an existing corpus and interaction log
    pub fn with_data(config: EngineConfig, store: CourseStore, log: InteractionLog) -> Result<Self> {
        let engine = Self::new(config)?;
        engine.corpus.publish(store);
        *engine.write_log() = log;
        Ok(engine)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The currently published corpus
    pub fn corpus(&self) -> Arc<CourseStore> {
        self.corpus.load().unwrap_or_default()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn topic(&self) -> &TopicRecommender {
        &self.topic
    }

    pub fn preference(&self) -> &PreferenceRecommender {
        &self.preference
    }

    pub fn descriptors(&self) -> Vec<RecommenderDescriptor> {
        self.registry.descriptors()
    }

    /// Add another recommender under `name`; it takes part in every fit
    pub fn register(&self, name: impl Into<String>, recommender: Arc<dyn Recommender>) -> Result<()> {
        self.registry.register(name, recommender)?;
        Ok(())
    }

    /// Publish a new corpus snapshot built from the current one.
    ///
    /// All-or-nothing: on error the published corpus is unchanged. Fitted
    /// models turn stale until the next fit.
    #[instrument(skip(self, courses))]
    pub fn ingest_courses(
        &self,
        courses: impl IntoIterator<Item = Course>,
        mode: IngestMode,
    ) -> Result<CorpusVersion> {
        let _guard = self.ingest_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut next = CourseStore::clone(&self.corpus());
        let version = next.ingest(courses, mode)?;
        let total = next.len();
        self.corpus.publish(next);

        info!("Ingested courses ({:?}), corpus v{} now holds {}", mode, version, total);
        Ok(version)
    }

    /// Append interactions; returns how many were recorded
    pub fn record_interactions(&self, interactions: impl IntoIterator<Item = Interaction>) -> usize {
        let mut log = self.write_log();
        let before = log.len();
        log.extend(interactions);
        log.len() - before
    }

    /// Register a learner without history; `false` if already known
    pub fn register_learner(&self, learner_id: impl Into<LearnerId>) -> bool {
        self.write_log().register_learner(learner_id)
    }

    pub fn learner_profile(&self, learner_id: &str) -> Option<LearnerProfile> {
        self.read_log().profile(learner_id).cloned()
    }

    /// Known learners, sorted
    pub fn learner_ids(&self) -> Vec<LearnerId> {
        self.read_log().learners().into_iter().cloned().collect()
    }

    pub fn learner_count(&self) -> usize {
        self.read_log().learner_count()
    }

    /// Fit every registered recommender against one corpus snapshot and one
    /// copy of the interaction log.
    ///
    /// Fits run one at a time on the blocking pool. A recommender that fails
    /// is reported in [`FitReport::failed`] and keeps its previous model.
    ///
    /// # Errors
    /// * `Cancelled` - `cancel` was raised; models fitted before that point
    ///   stay published
    /// * The first failure, when no recommender could be fitted
    #[instrument(skip(self, cancel))]
    pub async fn fit(&self, cancel: CancelFlag) -> Result<FitReport> {
        let _guard = self.fit_lock.lock().await;

        let corpus = self.corpus();
        let log = self.read_log().clone();
        let entries = self.registry.entries();
        info!(
            "Fitting {} recommenders on corpus v{} ({} courses, {} interactions)",
            entries.len(),
            corpus.version(),
            corpus.len(),
            log.len()
        );

        tokio::task::spawn_blocking(move || fit_all(&corpus, &log, entries, &cancel))
            .await
            .map_err(|e| RecommendError::Task(format!("fit task failed: {e}")))?
    }

    /// Request handler sharing this engine's snapshots
    pub fn orchestrator(&self) -> RecommendationOrchestrator {
        RecommendationOrchestrator::new(
            self.corpus.clone(),
            self.interactions.clone(),
            self.registry.clone(),
            &self.config,
        )
    }

    /// Write every fitted model to `path` as one JSON object keyed by
    /// recommender name.
    ///
    /// The file is written to a temporary file next to `path` and renamed
    /// into place, so readers never see a partial export.
    ///
    /// # Returns
    /// The number of models written; fails with `StaleModel` when nothing
    /// has been fitted yet
    #[instrument(skip(self))]
    pub fn export_models(&self, path: &Path) -> Result<usize> {
        let mut models = serde_json::Map::new();
        for (name, recommender) in self.registry.entries() {
            if let Some(model) = recommender.export_model()? {
                models.insert(name, model);
            }
        }
        if models.is_empty() {
            return Err(RecommenderError::StaleModel {
                recommender: "engine".to_string(),
                reason: "no fitted model to export".to_string(),
            }
            .into());
        }

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut file = tempfile::NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(file.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, &models)
                .map_err(RecommenderError::from)?;
            writer.flush()?;
        }
        file.as_file().sync_all()?;
        file.persist(path).map_err(|e| e.error)?;

        info!("Exported {} models to {}", models.len(), path.display());
        Ok(models.len())
    }

    fn read_log(&self) -> std::sync::RwLockReadGuard<'_, InteractionLog> {
        self.interactions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_log(&self) -> std::sync::RwLockWriteGuard<'_, InteractionLog> {
        self.interactions.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn fit_all(
    corpus: &CourseStore,
    log: &InteractionLog,
    entries: Vec<(String, Arc<dyn Recommender>)>,
    cancel: &CancelFlag,
) -> Result<FitReport> {
    let input = FitInput {
        corpus,
        interactions: log,
    };
    let mut report = FitReport {
        corpus_version: corpus.version(),
        fitted: Vec::new(),
        failed: Vec::new(),
    };
    let mut first_error = None;

    for (name, recommender) in entries {
        cancel.check(&name)?;

        let start = Instant::now();
        match recommender.fit(&input, cancel) {
            Ok(stamp) => {
                let elapsed_ms = start.elapsed().as_millis();
                info!("Fitted '{}' in {}ms (model v{})", name, elapsed_ms, stamp.model_version);
                report.fitted.push(FittedModel {
                    name,
                    stamp,
                    elapsed_ms,
                });
            }
            Err(RecommenderError::Cancelled(who)) => {
                warn!("Fit of '{}' cancelled", who);
                return Err(RecommenderError::Cancelled(who).into());
            }
            Err(err) => {
                warn!("Fit of '{}' failed: {}", name, err);
                report.failed.push((name, err.to_string()));
                first_error.get_or_insert(err);
            }
        }
    }

    match first_error {
        Some(err) if report.fitted.is_empty() => Err(err.into()),
        _ => Ok(report),
    }
}
