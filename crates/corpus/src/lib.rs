//! # Corpus Crate
//!
//! Holds the course catalogue and the learner interaction history that feed
//! the recommenders.
//!
//! ## Main Components
//!
//! - **types**: Core domain types (Course, Interaction, LearnerProfile)
//! - **store**: Versioned course store with insertion-ordered iteration
//! - **interactions**: Append-only interaction log keyed by learner
//! - **parser**: JSON / JSON Lines loaders for courses and interactions
//! - **error**: Error types for corpus handling
//!
//! ## Example Usage
//!
//! ```ignore
//! use corpus::{CourseStore, InteractionLog};
//! use std::path::Path;
//!
//! let store = CourseStore::load_from_file(Path::new("data/demo/courses.json"))?;
//! let log = InteractionLog::load_from_file(Path::new("data/demo/interactions.json"))?;
//!
//! let course = store.get("1")?;
//! println!("{} ({} learners known)", course.title, log.learner_count());
//! ```

pub mod error;
pub mod interactions;
pub mod parser;
pub mod store;
pub mod types;

pub use error::{CorpusError, Result};
pub use interactions::InteractionLog;
pub use store::{CourseStore, IngestMode};
pub use types::{
    // Type aliases
    CorpusVersion,
    CourseId,
    LearnerId,
    // Core types
    AttributeValue,
    Course,
    Interaction,
    LearnerProfile,
    // Enums
    Level,
    Signal,
};
