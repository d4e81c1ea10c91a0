//! Parsers for course and interaction files.
//!
//! Both files may be either a single JSON array or JSON Lines (one record per
//! line). JSON Lines input is parsed in parallel with Rayon; record order is
//! preserved.
//!
//! Interaction files accept two record shapes:
//! - flat: `{"learner_id": "L1", "course_id": "C1", "signal": "viewed", "timestamp": 1633046400}`
//! - grouped enrolments: `{"user_id": 1, "enrolments": [{"course_id": 1, "date": "2021-10-01"}]}`
//!
//! Learner ids are also accepted as `user_id` or `student_id`. A `date`
//! (`YYYY-MM-DD`) may stand in for `timestamp`; a missing signal means
//! `enrolled`.

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::error::{CorpusError, Result};
use crate::types::{Course, Interaction, Signal, deserialize_id};

/// Parse a course file (JSON array or JSON Lines)
pub fn parse_courses(path: &Path) -> Result<Vec<Course>> {
    let content = read_file(path)?;
    parse_courses_str(&content, &file_label(path))
}

/// Parse course records from an in-memory string
pub fn parse_courses_str(content: &str, file: &str) -> Result<Vec<Course>> {
    let records: Vec<(usize, Course)> = parse_records(content, file)?;
    Ok(records.into_iter().map(|(_, course)| course).collect())
}

/// Parse an interaction file (JSON array or JSON Lines, flat or grouped)
pub fn parse_interactions(path: &Path) -> Result<Vec<Interaction>> {
    let content = read_file(path)?;
    parse_interactions_str(&content, &file_label(path))
}

/// Parse interaction records from an in-memory string
pub fn parse_interactions_str(content: &str, file: &str) -> Result<Vec<Interaction>> {
    let records: Vec<(usize, RawInteractionRecord)> = parse_records(content, file)?;

    let nested: Vec<Vec<Interaction>> = records
        .into_par_iter()
        .map(|(line, record)| {
            record.into_interactions().map_err(|reason| CorpusError::ParseError {
                file: file.to_string(),
                line,
                reason,
            })
        })
        .collect::<Result<_>>()?;

    Ok(nested.into_iter().flatten().collect())
}

/// Convert a `YYYY-MM-DD` date to a unix timestamp at midnight UTC
pub fn parse_date(date: &str) -> Result<i64> {
    NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .ok()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc().timestamp())
        .ok_or_else(|| CorpusError::InvalidValue {
            field: "date".to_string(),
            value: date.to_string(),
        })
}

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|err| match err.kind() {
        ErrorKind::NotFound => CorpusError::FileNotFound {
            path: path.display().to_string(),
        },
        _ => CorpusError::IoError(err),
    })
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Parse either a JSON array or JSON Lines into records tagged with their line
fn parse_records<T>(content: &str, file: &str) -> Result<Vec<(usize, T)>>
where
    T: DeserializeOwned + Send,
{
    if content.trim_start().starts_with('[') {
        let records: Vec<T> =
            serde_json::from_str(content).map_err(|err| CorpusError::ParseError {
                file: file.to_string(),
                line: err.line(),
                reason: err.to_string(),
            })?;
        return Ok(records.into_iter().map(|record| (0, record)).collect());
    }

    let lines: Vec<(usize, &str)> = content
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty())
        .collect();

    lines
        .par_iter()
        .map(|&(line_no, line)| {
            serde_json::from_str::<T>(line)
                .map(|record| (line_no, record))
                .map_err(|err| CorpusError::ParseError {
                    file: file.to_string(),
                    line: line_no,
                    reason: err.to_string(),
                })
        })
        .collect()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawInteractionRecord {
    Grouped(RawEnrolments),
    Flat(RawInteraction),
}

#[derive(Deserialize)]
struct RawEnrolments {
    #[serde(
        alias = "user_id",
        alias = "student_id",
        deserialize_with = "deserialize_id"
    )]
    learner_id: String,
    #[serde(alias = "enrollments")]
    enrolments: Vec<RawEvent>,
}

#[derive(Deserialize)]
struct RawInteraction {
    #[serde(
        alias = "user_id",
        alias = "student_id",
        deserialize_with = "deserialize_id"
    )]
    learner_id: String,
    #[serde(deserialize_with = "deserialize_id")]
    course_id: String,
    #[serde(default)]
    signal: Option<Signal>,
    #[serde(default)]
    timestamp: Option<i64>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    strength: Option<f32>,
}

#[derive(Deserialize)]
struct RawEvent {
    #[serde(deserialize_with = "deserialize_id")]
    course_id: String,
    #[serde(default)]
    signal: Option<Signal>,
    #[serde(default)]
    timestamp: Option<i64>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    strength: Option<f32>,
}

impl RawInteractionRecord {
    fn into_interactions(self) -> std::result::Result<Vec<Interaction>, String> {
        match self {
            RawInteractionRecord::Grouped(grouped) => grouped
                .enrolments
                .into_iter()
                .map(|event| {
                    build_interaction(
                        &grouped.learner_id,
                        event.course_id,
                        event.signal,
                        event.timestamp,
                        event.date,
                        event.strength,
                    )
                })
                .collect(),
            RawInteractionRecord::Flat(flat) => Ok(vec![build_interaction(
                &flat.learner_id,
                flat.course_id,
                flat.signal,
                flat.timestamp,
                flat.date,
                flat.strength,
            )?]),
        }
    }
}

fn build_interaction(
    learner_id: &str,
    course_id: String,
    signal: Option<Signal>,
    timestamp: Option<i64>,
    date: Option<String>,
    strength: Option<f32>,
) -> std::result::Result<Interaction, String> {
    let timestamp = match (timestamp, date) {
        (Some(ts), _) => ts,
        (None, Some(date)) => parse_date(&date).map_err(|err| err.to_string())?,
        (None, None) => 0,
    };

    let mut interaction = Interaction::new(learner_id, course_id, signal.unwrap_or_default())
        .with_timestamp(timestamp);
    interaction.strength = strength;
    Ok(interaction)
}
