//! Candidate filtering and facet refinement for course recommendations.
//!
//! This crate provides:
//! - Filter trait and implementations for candidate filtering
//! - FilterPipeline for composing filters
//! - FacetCatalog and suggest_split for narrowing a ranked list by course attributes
//!
//! ## Architecture
//! The pipeline processes candidates in stages:
//! 1. Filters remove unwanted candidates (already taken, wrong level or domain, pinned attributes)
//! 2. The recommenders score what is left
//! 3. suggest_split proposes the next attribute to ask the learner about
//!
//! ## Example Usage
//! ```ignore
//! use pipeline::{FacetCatalog, FilterContext, FilterPipeline};
//! use pipeline::filters::*;
//!
//! let catalog = FacetCatalog::from_corpus(&store);
//! let (pins, remaining) = catalog.resolve_filters(&requested);
//!
//! let mut pipeline = FilterPipeline::new().add_filter(AlreadyInteractedFilter);
//! for pin in pins {
//!     pipeline = pipeline.add_filter(pin);
//! }
//! let filtered = pipeline.apply(candidates, &context)?;
//! ```

pub mod filter_pipeline;
pub mod filters;
pub mod refine;
pub mod traits;

// Re-export main types
pub use filter_pipeline::FilterPipeline;
pub use refine::{suggest_split, FacetCatalog, WILDCARD};
pub use traits::{Filter, FilterContext};
