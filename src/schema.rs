//! Row types for every warehouse table.
//!
//! Each struct is the explicit schema of one CSV table in the staging
//! directory: named, typed columns checked at the store boundary. Surrogate
//! ids are dense `i64` values allocated by the upsert engine; natural keys
//! (`driver_ref`, `constructor_ref`, `(year, round)`) come from the session
//! provider.

use chrono::NaiveDate;

/// Row of `drivers.csv`. Natural key: `driver_ref`.
#[derive(Debug, Clone, PartialEq)]
pub struct Driver {
    pub driver_id: i64,
    pub driver_ref: String,
    pub number: Option<i64>,
    pub code: Option<String>,
    pub forename: Option<String>,
    pub surname: Option<String>,
}

/// Candidate driver row before surrogate-key allocation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDriver {
    pub driver_ref: String,
    pub number: Option<i64>,
    pub code: Option<String>,
    pub forename: Option<String>,
    pub surname: Option<String>,
}

/// Row of `constructors.csv`. Natural key: `constructor_ref`.
#[derive(Debug, Clone, PartialEq)]
pub struct Constructor {
    pub constructor_id: i64,
    pub constructor_ref: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewConstructor {
    pub constructor_ref: String,
    pub name: String,
}

/// Row of `races.csv`. Natural key: `(year, round)`. The date drives all
/// chronological ordering downstream.
#[derive(Debug, Clone, PartialEq)]
pub struct Race {
    pub race_id: i64,
    pub year: i64,
    pub round: i64,
    pub circuit_id: String,
    pub name: String,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewRace {
    pub year: i64,
    pub round: i64,
    pub circuit_id: String,
    pub name: String,
    pub date: NaiveDate,
}

/// Row of `lap_times.csv`: one row per completed lap.
#[derive(Debug, Clone, PartialEq)]
pub struct LapTime {
    pub race_id: i64,
    pub driver_id: i64,
    pub lap: i64,
    pub position: Option<i64>,
    /// Display form `m:ss.mmm`, derived from the same duration as
    /// `milliseconds`.
    pub time: Option<String>,
    pub milliseconds: i64,
}

/// Row of `results.csv` and `sprint_results.csv` (shared schema).
///
/// `milliseconds` is the reconstructed absolute race time: the classified
/// leader's recorded time plus the per-driver gap for everyone else.
#[derive(Debug, Clone, PartialEq)]
pub struct RaceResult {
    pub result_id: i64,
    pub race_id: i64,
    pub driver_id: i64,
    pub constructor_id: Option<i64>,
    pub number: Option<i64>,
    pub grid: Option<i64>,
    pub position_text: Option<String>,
    pub position_order: Option<f64>,
    pub points: f64,
    pub laps: Option<i64>,
    pub time: Option<String>,
    pub milliseconds: Option<i64>,
    pub fastest_lap: Option<i64>,
    /// Competitive ("min") rank of this driver's fastest lap within the race.
    pub rank: Option<i64>,
    pub fastest_lap_time: Option<String>,
}

/// Row of `qualifying.csv`.
#[derive(Debug, Clone, PartialEq)]
pub struct QualifyingResult {
    pub race_id: i64,
    pub driver_id: i64,
    pub constructor_id: Option<i64>,
    pub number: Option<i64>,
    pub position: Option<i64>,
    pub q1: Option<String>,
    pub q2: Option<String>,
    pub q3: Option<String>,
}

/// Row of `driver_standings.csv`. Fully recomputed each run, never merged.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverStanding {
    pub race_id: i64,
    pub driver_id: i64,
    pub points: f64,
    pub wins: i64,
    pub position: i64,
    pub position_text: String,
}

/// Row of `constructor_standings.csv`. Fully recomputed each run.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstructorStanding {
    pub race_id: i64,
    pub constructor_id: i64,
    pub points: f64,
    pub wins: i64,
    pub position: i64,
    pub position_text: String,
}
