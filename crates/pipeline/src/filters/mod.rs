//! Filter implementations for the candidate pipeline.
//!
//! This module contains all the concrete filter implementations
//! that can be composed into a FilterPipeline.

pub mod already_interacted;
pub mod attribute;
pub mod domain;
pub mod level;

// Re-export for convenience
pub use already_interacted::AlreadyInteractedFilter;
pub use attribute::{attribute_values, AttributeFilter};
pub use domain::DomainFilter;
pub use level::LevelFilter;
