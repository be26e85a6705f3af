//! Session normalizer.
//!
//! Maps one session's raw records into warehouse fact rows: foreign keys are
//! resolved against the already-upserted dimension tables, lap durations
//! become integer milliseconds with a derived `m:ss.mmm` display form, and
//! recorded race times are reconstructed from the leader's absolute time
//! plus per-driver gaps before any milliseconds conversion.
//!
//! A failed foreign-key lookup is a join miss: the dependent column goes
//! absent (or the row is dropped where the key is part of the fact's
//! identity), logged as a warning, and the run continues.

use std::collections::HashMap;
use tracing::warn;

use crate::error::SchemaError;
use crate::schema::{
    Constructor, Driver, LapTime, NewConstructor, NewDriver, NewRace, QualifyingResult, Race,
    RaceResult,
};
use crate::session::{RawClassification, RawLap, SessionMeta};

/// Natural-key lookup maps over the dimension tables.
pub struct DimensionIndex {
    drivers: HashMap<String, i64>,
    constructors: HashMap<String, i64>,
    races: HashMap<(i64, i64), i64>,
}

impl DimensionIndex {
    pub fn new(drivers: &[Driver], constructors: &[Constructor], races: &[Race]) -> Self {
        Self {
            drivers: drivers
                .iter()
                .map(|d| (d.driver_ref.clone(), d.driver_id))
                .collect(),
            constructors: constructors
                .iter()
                .map(|c| (c.constructor_ref.clone(), c.constructor_id))
                .collect(),
            races: races
                .iter()
                .map(|r| ((r.year, r.round), r.race_id))
                .collect(),
        }
    }

    pub fn driver_id(&self, driver_ref: &str) -> Option<i64> {
        self.drivers.get(driver_ref).copied()
    }

    pub fn constructor_id(&self, constructor_ref: &str) -> Option<i64> {
        self.constructors.get(constructor_ref).copied()
    }

    pub fn race_id(&self, year: i64, round: i64) -> Option<i64> {
        self.races.get(&(year, round)).copied()
    }
}

/// Render a lap duration as `m:ss.mmm`.
pub fn format_lap_time(milliseconds: i64) -> String {
    let minutes = milliseconds / 60_000;
    let seconds = (milliseconds % 60_000) as f64 / 1000.0;
    format!("{}:{:06.3}", minutes, seconds)
}

// ==================== Dimension candidates ====================

/// Extract driver candidates from classification records.
///
/// The natural key (`driver_ref`) is required on every record; missing
/// optional attributes are warned about and kept as nulls.
pub fn driver_candidates(
    classification: &[RawClassification],
) -> Result<Vec<NewDriver>, SchemaError> {
    let mut candidates = Vec::with_capacity(classification.len());
    let mut incomplete = 0usize;
    for record in classification {
        let driver_ref = record.driver_ref.clone().ok_or(SchemaError::MissingField {
            entity: "drivers",
            field: "driver_ref",
        })?;
        if record.driver_number.is_none()
            || record.abbreviation.is_none()
            || record.first_name.is_none()
            || record.last_name.is_none()
        {
            incomplete += 1;
        }
        candidates.push(NewDriver {
            driver_ref,
            number: record.driver_number,
            code: record.abbreviation.clone(),
            forename: record.first_name.clone(),
            surname: record.last_name.clone(),
        });
    }
    if incomplete > 0 {
        warn!(
            entity = "drivers",
            incomplete, "candidates with missing attributes, proceeding with available data"
        );
    }
    Ok(candidates)
}

/// Extract constructor candidates from classification records. Both the
/// reference and the display name are required.
pub fn constructor_candidates(
    classification: &[RawClassification],
) -> Result<Vec<NewConstructor>, SchemaError> {
    let mut candidates = Vec::with_capacity(classification.len());
    for record in classification {
        let constructor_ref = record.team_ref.clone().ok_or(SchemaError::MissingField {
            entity: "constructors",
            field: "constructor_ref",
        })?;
        let name = record.team_name.clone().ok_or(SchemaError::MissingField {
            entity: "constructors",
            field: "name",
        })?;
        candidates.push(NewConstructor {
            constructor_ref,
            name,
        });
    }
    Ok(candidates)
}

/// Build the race candidate for one loaded round from its session metadata.
pub fn race_candidate(round: i64, meta: &SessionMeta) -> Result<NewRace, SchemaError> {
    let name = meta.event_name.clone().ok_or(SchemaError::MissingField {
        entity: "races",
        field: "name",
    })?;
    let date = meta.event_date.ok_or(SchemaError::MissingField {
        entity: "races",
        field: "date",
    })?;
    let circuit_id = meta
        .circuit_short_name
        .clone()
        .ok_or(SchemaError::MissingField {
            entity: "races",
            field: "circuit_id",
        })?;
    Ok(NewRace {
        year: i64::from(chrono::Datelike::year(&date)),
        round,
        circuit_id,
        name,
        date,
    })
}

// ==================== Lap facts ====================

/// Normalize raw laps for one race. Laps without a timed duration are
/// dropped (out-laps, red-flag laps); a driver that cannot be resolved is a
/// join miss on a key column, so the row is dropped with a warning.
pub fn normalize_laps(race_id: i64, laps: &[RawLap], index: &DimensionIndex) -> Vec<LapTime> {
    let mut rows = Vec::with_capacity(laps.len());
    for raw in laps {
        let milliseconds = match raw.lap_time_ms {
            Some(ms) => ms,
            None => continue,
        };
        let lap = match raw.lap_number {
            Some(lap) => lap,
            None => continue,
        };
        let driver_id = match raw.driver_ref.as_deref().and_then(|r| index.driver_id(r)) {
            Some(id) => id,
            None => {
                warn!(
                    race_id,
                    driver_ref = raw.driver_ref.as_deref().unwrap_or("<none>"),
                    "unresolved driver on lap record, row dropped"
                );
                continue;
            }
        };
        rows.push(LapTime {
            race_id,
            driver_id,
            lap,
            position: raw.position,
            time: Some(format_lap_time(milliseconds)),
            milliseconds,
        });
    }
    rows
}

/// A driver's fastest lap in a race, with its competitive rank.
#[derive(Debug, Clone, PartialEq)]
pub struct FastestLap {
    pub race_id: i64,
    pub driver_id: i64,
    pub lap: i64,
    pub milliseconds: i64,
    pub time: String,
    /// Competitive ("min") rank within the race: tied times share a rank and
    /// the next rank skips by the tie-group size.
    pub rank: i64,
}

/// Fastest lap per `(race, driver)` with min-method ranks within each race.
pub fn fastest_laps(laps: &[LapTime]) -> HashMap<(i64, i64), FastestLap> {
    let mut best: HashMap<(i64, i64), &LapTime> = HashMap::new();
    for lap in laps {
        let entry = best.entry((lap.race_id, lap.driver_id)).or_insert(lap);
        if lap.milliseconds < entry.milliseconds {
            *entry = lap;
        }
    }

    let mut per_race: HashMap<i64, Vec<i64>> = HashMap::new();
    for lap in best.values() {
        per_race.entry(lap.race_id).or_default().push(lap.milliseconds);
    }

    best.into_iter()
        .map(|((race_id, driver_id), lap)| {
            // Min rank: 1 + number of strictly faster fastest laps in the race.
            let faster = per_race[&race_id]
                .iter()
                .filter(|&&ms| ms < lap.milliseconds)
                .count() as i64;
            (
                (race_id, driver_id),
                FastestLap {
                    race_id,
                    driver_id,
                    lap: lap.lap,
                    milliseconds: lap.milliseconds,
                    time: lap
                        .time
                        .clone()
                        .unwrap_or_else(|| format_lap_time(lap.milliseconds)),
                    rank: faster + 1,
                },
            )
        })
        .collect()
}

/// Laps completed per `(race, driver)`: the highest lap number reached.
pub fn laps_completed(laps: &[LapTime]) -> HashMap<(i64, i64), i64> {
    let mut max_lap: HashMap<(i64, i64), i64> = HashMap::new();
    for lap in laps {
        let entry = max_lap.entry((lap.race_id, lap.driver_id)).or_insert(lap.lap);
        if lap.lap > *entry {
            *entry = lap.lap;
        }
    }
    max_lap
}

// ==================== Result facts ====================

/// Normalize one race's classification into result rows.
///
/// The classified leader's recorded time is absolute; everyone else's is a
/// gap to the leader and is reconstructed as `leader + gap` before it is
/// stored as an absolute elapsed time.
pub fn normalize_results(
    race_id: i64,
    classification: &[RawClassification],
    index: &DimensionIndex,
    fastest: &HashMap<(i64, i64), FastestLap>,
    laps_done: &HashMap<(i64, i64), i64>,
) -> Vec<RaceResult> {
    let leader_ms = classification
        .iter()
        .find(|c| c.position == Some(1.0))
        .and_then(|c| c.time_ms);

    let mut rows = Vec::with_capacity(classification.len());
    for record in classification {
        let driver_id = match record
            .driver_ref
            .as_deref()
            .and_then(|r| index.driver_id(r))
        {
            Some(id) => id,
            None => {
                warn!(
                    race_id,
                    driver_ref = record.driver_ref.as_deref().unwrap_or("<none>"),
                    "unresolved driver on classification record, row dropped"
                );
                continue;
            }
        };
        let constructor_id = record
            .team_ref
            .as_deref()
            .and_then(|r| index.constructor_id(r));
        if constructor_id.is_none() {
            warn!(race_id, driver_id, "unresolved constructor, column left absent");
        }

        let milliseconds = match (record.position, record.time_ms, leader_ms) {
            (Some(p), Some(own), _) if p == 1.0 => Some(own),
            (_, Some(gap), Some(leader)) => Some(leader + gap),
            _ => None,
        };

        let flap = fastest.get(&(race_id, driver_id));
        rows.push(RaceResult {
            result_id: 0,
            race_id,
            driver_id,
            constructor_id,
            number: record.driver_number,
            grid: record.grid_position.map(|g| g as i64),
            position_text: record.classified_position.clone(),
            position_order: record.position,
            points: record.points.unwrap_or(0.0),
            laps: laps_done.get(&(race_id, driver_id)).copied(),
            time: record.time_text.clone(),
            milliseconds,
            fastest_lap: flap.map(|f| f.lap),
            rank: flap.map(|f| f.rank),
            fastest_lap_time: flap.map(|f| f.time.clone()),
        });
    }
    rows
}

/// Normalize one round's qualifying classification.
pub fn normalize_qualifying(
    race_id: i64,
    classification: &[RawClassification],
    index: &DimensionIndex,
) -> Vec<QualifyingResult> {
    let mut rows = Vec::with_capacity(classification.len());
    for record in classification {
        let driver_id = match record
            .driver_ref
            .as_deref()
            .and_then(|r| index.driver_id(r))
        {
            Some(id) => id,
            None => {
                warn!(
                    race_id,
                    driver_ref = record.driver_ref.as_deref().unwrap_or("<none>"),
                    "unresolved driver on qualifying record, row dropped"
                );
                continue;
            }
        };
        rows.push(QualifyingResult {
            race_id,
            driver_id,
            constructor_id: record
                .team_ref
                .as_deref()
                .and_then(|r| index.constructor_id(r)),
            number: record.driver_number,
            position: record.position.map(|p| p as i64),
            q1: record.q1_ms.map(format_lap_time),
            q2: record.q2_ms.map(format_lap_time),
            q3: record.q3_ms.map(format_lap_time),
        });
    }
    rows
}
