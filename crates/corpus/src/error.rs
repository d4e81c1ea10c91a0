//! Error types for the corpus crate.
//!
//! Every failure while ingesting, looking up or parsing courses and
//! interactions ends up as a [`CorpusError`].

use thiserror::Error;

use crate::types::CourseId;

/// Errors that can occur while loading or querying the course corpus
#[derive(Error, Debug)]
pub enum CorpusError {
    /// File could not be found or opened
    #[error("Failed to open file: {path}")]
    FileNotFound { path: String },

    /// I/O error occurred while reading a file
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// A record in a data file couldn't be parsed
    ///
    /// `line` is 1-based; 0 means the record came from a JSON array document.
    #[error("Parse error at line {line} in {file}: {reason}")]
    ParseError {
        file: String,
        line: usize,
        reason: String,
    },

    /// A data field had an invalid value
    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    /// The course id is not part of the current corpus
    #[error("Course not found: {0}")]
    NotFound(CourseId),

    /// Two courses in one ingest share an id, or an extend collides
    #[error("Duplicate course id: {0}")]
    DuplicateCourse(CourseId),

    /// Data validation failed
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, CorpusError>;
