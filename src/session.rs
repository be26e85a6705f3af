//! Session retrieval collaborator.
//!
//! Raw timing/results data comes from an external provider behind the
//! `SessionSource` trait: per (year, round, session kind) a lap collection,
//! a classification collection, and a meeting metadata record. The concrete
//! `JsonSessionSource` reads per-round JSON files from a directory.
//!
//! `fetch_season` walks a season schedule and records a typed outcome per
//! round. A failed round is skipped, logged with its year and round, and
//! aggregated into the report; it is never silently dropped.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, warn};

/// Session kind within a race weekend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    Race,
    Qualifying,
    Sprint,
}

impl SessionKind {
    pub fn code(&self) -> &'static str {
        match self {
            SessionKind::Race => "R",
            SessionKind::Qualifying => "Q",
            SessionKind::Sprint => "S",
        }
    }
}

/// One round of a season schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledRound {
    pub round: i64,
    pub name: String,
    pub date: NaiveDate,
}

/// Meeting metadata attached to a loaded session.
///
/// Fields are optional because the provider's feed is; required ones are
/// validated when dimension candidates are extracted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionMeta {
    pub event_name: Option<String>,
    pub location: Option<String>,
    pub country_name: Option<String>,
    pub country_code: Option<String>,
    pub circuit_short_name: Option<String>,
    pub event_date: Option<NaiveDate>,
}

/// One timed lap as delivered by the provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawLap {
    pub driver_ref: Option<String>,
    pub lap_number: Option<i64>,
    pub position: Option<i64>,
    pub lap_time_ms: Option<i64>,
}

/// One classification/results record as delivered by the provider.
///
/// `time_ms` is the recorded race time: absolute for the classified leader,
/// a gap to the leader for everyone else.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawClassification {
    pub driver_ref: Option<String>,
    pub driver_number: Option<i64>,
    pub abbreviation: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub team_ref: Option<String>,
    pub team_name: Option<String>,
    pub grid_position: Option<f64>,
    pub classified_position: Option<String>,
    pub position: Option<f64>,
    pub points: Option<f64>,
    pub time_ms: Option<i64>,
    pub time_text: Option<String>,
    pub q1_ms: Option<i64>,
    pub q2_ms: Option<i64>,
    pub q3_ms: Option<i64>,
}

/// Everything the provider returns for one session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionData {
    pub meta: SessionMeta,
    pub laps: Vec<RawLap>,
    pub classification: Vec<RawClassification>,
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("no session data for year {year} round {round}")]
    NotFound { year: i64, round: i64 },
    #[error("reading session data: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed session data: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// External timing/results provider.
pub trait SessionSource {
    fn schedule(&self, year: i64) -> Result<Vec<ScheduledRound>, SourceError>;
    fn load(
        &self,
        year: i64,
        round: i64,
        kind: SessionKind,
    ) -> Result<SessionData, SourceError>;
}

/// A round that loaded successfully.
#[derive(Debug, Clone)]
pub struct LoadedRound {
    pub round: i64,
    pub data: SessionData,
}

/// A round that could not be retrieved, with the reason kept.
#[derive(Debug, Clone)]
pub struct RoundFailure {
    pub round: i64,
    pub reason: String,
}

/// Outcome of walking one season for one session kind.
#[derive(Debug, Default)]
pub struct RetrievalReport {
    pub year: i64,
    pub loaded: Vec<LoadedRound>,
    /// Rounds dated after `today`, not yet run.
    pub skipped_future: Vec<i64>,
    pub failures: Vec<RoundFailure>,
}

/// Walk a season schedule, loading every round already run.
///
/// Loaded rounds come back sorted by round number so downstream
/// concatenation (and the first-seen tie-breaks that depend on it) is
/// deterministic.
pub fn fetch_season(
    source: &dyn SessionSource,
    year: i64,
    kind: SessionKind,
    today: NaiveDate,
) -> Result<RetrievalReport, SourceError> {
    let mut schedule = source.schedule(year)?;
    schedule.sort_by_key(|r| r.round);

    let mut report = RetrievalReport {
        year,
        ..Default::default()
    };

    for entry in schedule {
        if entry.date > today {
            debug!(year, round = entry.round, "round not yet run, skipping");
            report.skipped_future.push(entry.round);
            continue;
        }
        match source.load(year, entry.round, kind) {
            Ok(data) => report.loaded.push(LoadedRound {
                round: entry.round,
                data,
            }),
            Err(e) => {
                warn!(
                    year,
                    round = entry.round,
                    error = %e,
                    "failed to retrieve session, round skipped"
                );
                report.failures.push(RoundFailure {
                    round: entry.round,
                    reason: e.to_string(),
                });
            }
        }
    }
    Ok(report)
}

/// File layout of one stored session.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionFile {
    #[serde(default)]
    meta: SessionMeta,
    #[serde(default)]
    laps: Vec<RawLap>,
    #[serde(default)]
    classification: Vec<RawClassification>,
}

/// Session source backed by per-round JSON files:
/// `<root>/<year>/schedule.json` and `<root>/<year>/round_<NN>_<kind>.json`.
pub struct JsonSessionSource {
    root: PathBuf,
}

impl JsonSessionSource {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    fn session_path(&self, year: i64, round: i64, kind: SessionKind) -> PathBuf {
        self.root
            .join(year.to_string())
            .join(format!("round_{:02}_{}.json", round, kind.code()))
    }
}

impl SessionSource for JsonSessionSource {
    fn schedule(&self, year: i64) -> Result<Vec<ScheduledRound>, SourceError> {
        let path = self.root.join(year.to_string()).join("schedule.json");
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    fn load(
        &self,
        year: i64,
        round: i64,
        kind: SessionKind,
    ) -> Result<SessionData, SourceError> {
        let path = self.session_path(year, round, kind);
        if !path.exists() {
            return Err(SourceError::NotFound { year, round });
        }
        let raw = std::fs::read_to_string(path)?;
        let file: SessionFile = serde_json::from_str(&raw)?;
        Ok(SessionData {
            meta: file.meta,
            laps: file.laps,
            classification: file.classification,
        })
    }
}
