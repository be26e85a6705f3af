//! CSV-backed warehouse store.
//!
//! Every table is a flat, header-having CSV file in the staging directory,
//! loaded and saved whole. Saves write to a temp file in the destination
//! directory and atomically replace the target, so a failed save never
//! leaves a partially written table behind.
//!
//! Column extraction is explicit per table; a missing column surfaces as a
//! `SchemaError` before any rows are produced.

use anyhow::{anyhow, Context};
use chrono::NaiveDate;
use polars::prelude::*;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::SchemaError;
use crate::schema::{
    Constructor, ConstructorStanding, Driver, DriverStanding, LapTime, QualifyingResult, Race,
    RaceResult,
};

pub const DRIVERS_FILE: &str = "drivers.csv";
pub const CONSTRUCTORS_FILE: &str = "constructors.csv";
pub const RACES_FILE: &str = "races.csv";
pub const LAP_TIMES_FILE: &str = "lap_times.csv";
pub const RESULTS_FILE: &str = "results.csv";
pub const SPRINT_RESULTS_FILE: &str = "sprint_results.csv";
pub const QUALIFYING_FILE: &str = "qualifying.csv";
pub const DRIVER_STANDINGS_FILE: &str = "driver_standings.csv";
pub const CONSTRUCTOR_STANDINGS_FILE: &str = "constructor_standings.csv";

/// Handle on the staging directory.
pub struct Warehouse {
    root: PathBuf,
}

impl Warehouse {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    fn path(&self, file: &str) -> PathBuf {
        self.root.join(file)
    }

    /// Read a table into a DataFrame. A missing file is an empty table, so
    /// cold starts work without seed files.
    fn read_table(&self, file: &str) -> anyhow::Result<Option<DataFrame>> {
        let path = self.path(file);
        if !path.exists() {
            info!(table = file, "table file absent, treating as empty");
            return Ok(None);
        }
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.clone()))
            .with_context(|| format!("opening {}", path.display()))?
            .finish()
            .with_context(|| format!("reading {}", path.display()))?;
        Ok(Some(df))
    }

    fn save_table(&self, file: &str, df: &mut DataFrame) -> anyhow::Result<()> {
        write_df_atomic(&self.path(file), df)
    }

    // ==================== Dimension tables ====================

    pub fn load_drivers(&self) -> anyhow::Result<Vec<Driver>> {
        let df = match self.read_table(DRIVERS_FILE)? {
            Some(df) => df,
            None => return Ok(Vec::new()),
        };
        let t = "drivers";
        let ids = key_i64(&df, t, "driverId")?;
        let refs = key_str(&df, t, "driverRef")?;
        let numbers = opt_i64(&df, t, "number")?;
        let codes = opt_str(&df, t, "code")?;
        let forenames = opt_str(&df, t, "forename")?;
        let surnames = opt_str(&df, t, "surname")?;

        let mut rows = Vec::with_capacity(ids.len());
        for i in 0..ids.len() {
            rows.push(Driver {
                driver_id: ids[i],
                driver_ref: refs[i].clone(),
                number: numbers[i],
                code: codes[i].clone(),
                forename: forenames[i].clone(),
                surname: surnames[i].clone(),
            });
        }
        Ok(rows)
    }

    pub fn save_drivers(&self, rows: &[Driver]) -> anyhow::Result<()> {
        let mut df = DataFrame::new(vec![
            Series::new("driverId", rows.iter().map(|r| r.driver_id).collect::<Vec<_>>()),
            Series::new("driverRef", rows.iter().map(|r| r.driver_ref.clone()).collect::<Vec<_>>()),
            Series::new("number", rows.iter().map(|r| r.number).collect::<Vec<_>>()),
            Series::new("code", rows.iter().map(|r| r.code.clone()).collect::<Vec<_>>()),
            Series::new("forename", rows.iter().map(|r| r.forename.clone()).collect::<Vec<_>>()),
            Series::new("surname", rows.iter().map(|r| r.surname.clone()).collect::<Vec<_>>()),
        ])?;
        self.save_table(DRIVERS_FILE, &mut df)
    }

    pub fn load_constructors(&self) -> anyhow::Result<Vec<Constructor>> {
        let df = match self.read_table(CONSTRUCTORS_FILE)? {
            Some(df) => df,
            None => return Ok(Vec::new()),
        };
        let t = "constructors";
        let ids = key_i64(&df, t, "constructorId")?;
        let refs = key_str(&df, t, "constructorRef")?;
        let names = key_str(&df, t, "name")?;

        let mut rows = Vec::with_capacity(ids.len());
        for i in 0..ids.len() {
            rows.push(Constructor {
                constructor_id: ids[i],
                constructor_ref: refs[i].clone(),
                name: names[i].clone(),
            });
        }
        Ok(rows)
    }

    pub fn save_constructors(&self, rows: &[Constructor]) -> anyhow::Result<()> {
        let mut df = DataFrame::new(vec![
            Series::new("constructorId", rows.iter().map(|r| r.constructor_id).collect::<Vec<_>>()),
            Series::new("constructorRef", rows.iter().map(|r| r.constructor_ref.clone()).collect::<Vec<_>>()),
            Series::new("name", rows.iter().map(|r| r.name.clone()).collect::<Vec<_>>()),
        ])?;
        self.save_table(CONSTRUCTORS_FILE, &mut df)
    }

    pub fn load_races(&self) -> anyhow::Result<Vec<Race>> {
        let df = match self.read_table(RACES_FILE)? {
            Some(df) => df,
            None => return Ok(Vec::new()),
        };
        let t = "races";
        let ids = key_i64(&df, t, "raceId")?;
        let years = key_i64(&df, t, "year")?;
        let rounds = key_i64(&df, t, "round")?;
        let circuits = key_str(&df, t, "circuitId")?;
        let names = key_str(&df, t, "name")?;
        let dates = key_str(&df, t, "date")?;

        let mut rows = Vec::with_capacity(ids.len());
        for i in 0..ids.len() {
            let date = NaiveDate::parse_from_str(&dates[i], "%Y-%m-%d")
                .with_context(|| format!("races: bad date `{}` for raceId {}", dates[i], ids[i]))?;
            rows.push(Race {
                race_id: ids[i],
                year: years[i],
                round: rounds[i],
                circuit_id: circuits[i].clone(),
                name: names[i].clone(),
                date,
            });
        }
        Ok(rows)
    }

    pub fn save_races(&self, rows: &[Race]) -> anyhow::Result<()> {
        let mut df = DataFrame::new(vec![
            Series::new("raceId", rows.iter().map(|r| r.race_id).collect::<Vec<_>>()),
            Series::new("year", rows.iter().map(|r| r.year).collect::<Vec<_>>()),
            Series::new("round", rows.iter().map(|r| r.round).collect::<Vec<_>>()),
            Series::new("circuitId", rows.iter().map(|r| r.circuit_id.clone()).collect::<Vec<_>>()),
            Series::new("name", rows.iter().map(|r| r.name.clone()).collect::<Vec<_>>()),
            Series::new("date", rows.iter().map(|r| r.date.to_string()).collect::<Vec<_>>()),
        ])?;
        self.save_table(RACES_FILE, &mut df)
    }

    // ==================== Fact tables ====================

    pub fn load_lap_times(&self) -> anyhow::Result<Vec<LapTime>> {
        let df = match self.read_table(LAP_TIMES_FILE)? {
            Some(df) => df,
            None => return Ok(Vec::new()),
        };
        let t = "lap_times";
        let race_ids = key_i64(&df, t, "raceId")?;
        let driver_ids = key_i64(&df, t, "driverId")?;
        let laps = key_i64(&df, t, "lap")?;
        let positions = opt_i64(&df, t, "position")?;
        let times = opt_str(&df, t, "time")?;
        let millis = key_i64(&df, t, "milliseconds")?;

        let mut rows = Vec::with_capacity(race_ids.len());
        for i in 0..race_ids.len() {
            rows.push(LapTime {
                race_id: race_ids[i],
                driver_id: driver_ids[i],
                lap: laps[i],
                position: positions[i],
                time: times[i].clone(),
                milliseconds: millis[i],
            });
        }
        Ok(rows)
    }

    pub fn save_lap_times(&self, rows: &[LapTime]) -> anyhow::Result<()> {
        let mut df = DataFrame::new(vec![
            Series::new("raceId", rows.iter().map(|r| r.race_id).collect::<Vec<_>>()),
            Series::new("driverId", rows.iter().map(|r| r.driver_id).collect::<Vec<_>>()),
            Series::new("lap", rows.iter().map(|r| r.lap).collect::<Vec<_>>()),
            Series::new("position", rows.iter().map(|r| r.position).collect::<Vec<_>>()),
            Series::new("time", rows.iter().map(|r| r.time.clone()).collect::<Vec<_>>()),
            Series::new("milliseconds", rows.iter().map(|r| r.milliseconds).collect::<Vec<_>>()),
        ])?;
        self.save_table(LAP_TIMES_FILE, &mut df)
    }

    pub fn load_results(&self) -> anyhow::Result<Vec<RaceResult>> {
        self.load_result_file(RESULTS_FILE, "results")
    }

    pub fn save_results(&self, rows: &[RaceResult]) -> anyhow::Result<()> {
        self.save_result_file(RESULTS_FILE, rows)
    }

    pub fn load_sprint_results(&self) -> anyhow::Result<Vec<RaceResult>> {
        self.load_result_file(SPRINT_RESULTS_FILE, "sprint_results")
    }

    pub fn save_sprint_results(&self, rows: &[RaceResult]) -> anyhow::Result<()> {
        self.save_result_file(SPRINT_RESULTS_FILE, rows)
    }

    fn load_result_file(&self, file: &str, t: &str) -> anyhow::Result<Vec<RaceResult>> {
        let df = match self.read_table(file)? {
            Some(df) => df,
            None => return Ok(Vec::new()),
        };
        let result_ids = key_i64(&df, t, "resultId")?;
        let race_ids = key_i64(&df, t, "raceId")?;
        let driver_ids = key_i64(&df, t, "driverId")?;
        let constructor_ids = opt_i64(&df, t, "constructorId")?;
        let numbers = opt_i64(&df, t, "number")?;
        let grids = opt_i64(&df, t, "grid")?;
        let position_texts = opt_str(&df, t, "positionText")?;
        let position_orders = opt_f64(&df, t, "positionOrder")?;
        let points = opt_f64(&df, t, "points")?;
        let laps = opt_i64(&df, t, "laps")?;
        let times = opt_str(&df, t, "time")?;
        let millis = opt_i64(&df, t, "milliseconds")?;
        let fastest_laps = opt_i64(&df, t, "fastestLap")?;
        let ranks = opt_i64(&df, t, "rank")?;
        let fastest_lap_times = opt_str(&df, t, "fastestLapTime")?;

        let mut rows = Vec::with_capacity(race_ids.len());
        for i in 0..race_ids.len() {
            rows.push(RaceResult {
                result_id: result_ids[i],
                race_id: race_ids[i],
                driver_id: driver_ids[i],
                constructor_id: constructor_ids[i],
                number: numbers[i],
                grid: grids[i],
                position_text: position_texts[i].clone(),
                position_order: position_orders[i],
                points: points[i].unwrap_or(0.0),
                laps: laps[i],
                time: times[i].clone(),
                milliseconds: millis[i],
                fastest_lap: fastest_laps[i],
                rank: ranks[i],
                fastest_lap_time: fastest_lap_times[i].clone(),
            });
        }
        Ok(rows)
    }

    fn save_result_file(&self, file: &str, rows: &[RaceResult]) -> anyhow::Result<()> {
        let mut df = DataFrame::new(vec![
            Series::new("resultId", rows.iter().map(|r| r.result_id).collect::<Vec<_>>()),
            Series::new("raceId", rows.iter().map(|r| r.race_id).collect::<Vec<_>>()),
            Series::new("driverId", rows.iter().map(|r| r.driver_id).collect::<Vec<_>>()),
            Series::new("constructorId", rows.iter().map(|r| r.constructor_id).collect::<Vec<_>>()),
            Series::new("number", rows.iter().map(|r| r.number).collect::<Vec<_>>()),
            Series::new("grid", rows.iter().map(|r| r.grid).collect::<Vec<_>>()),
            Series::new("positionText", rows.iter().map(|r| r.position_text.clone()).collect::<Vec<_>>()),
            Series::new("positionOrder", rows.iter().map(|r| r.position_order).collect::<Vec<_>>()),
            Series::new("points", rows.iter().map(|r| r.points).collect::<Vec<_>>()),
            Series::new("laps", rows.iter().map(|r| r.laps).collect::<Vec<_>>()),
            Series::new("time", rows.iter().map(|r| r.time.clone()).collect::<Vec<_>>()),
            Series::new("milliseconds", rows.iter().map(|r| r.milliseconds).collect::<Vec<_>>()),
            Series::new("fastestLap", rows.iter().map(|r| r.fastest_lap).collect::<Vec<_>>()),
            Series::new("rank", rows.iter().map(|r| r.rank).collect::<Vec<_>>()),
            Series::new("fastestLapTime", rows.iter().map(|r| r.fastest_lap_time.clone()).collect::<Vec<_>>()),
        ])?;
        self.save_table(file, &mut df)
    }

    pub fn load_qualifying(&self) -> anyhow::Result<Vec<QualifyingResult>> {
        let df = match self.read_table(QUALIFYING_FILE)? {
            Some(df) => df,
            None => return Ok(Vec::new()),
        };
        let t = "qualifying";
        let race_ids = key_i64(&df, t, "raceId")?;
        let driver_ids = key_i64(&df, t, "driverId")?;
        let constructor_ids = opt_i64(&df, t, "constructorId")?;
        let numbers = opt_i64(&df, t, "number")?;
        let positions = opt_i64(&df, t, "position")?;
        let q1 = opt_str(&df, t, "q1")?;
        let q2 = opt_str(&df, t, "q2")?;
        let q3 = opt_str(&df, t, "q3")?;

        let mut rows = Vec::with_capacity(race_ids.len());
        for i in 0..race_ids.len() {
            rows.push(QualifyingResult {
                race_id: race_ids[i],
                driver_id: driver_ids[i],
                constructor_id: constructor_ids[i],
                number: numbers[i],
                position: positions[i],
                q1: q1[i].clone(),
                q2: q2[i].clone(),
                q3: q3[i].clone(),
            });
        }
        Ok(rows)
    }

    pub fn save_qualifying(&self, rows: &[QualifyingResult]) -> anyhow::Result<()> {
        let mut df = DataFrame::new(vec![
            Series::new("raceId", rows.iter().map(|r| r.race_id).collect::<Vec<_>>()),
            Series::new("driverId", rows.iter().map(|r| r.driver_id).collect::<Vec<_>>()),
            Series::new("constructorId", rows.iter().map(|r| r.constructor_id).collect::<Vec<_>>()),
            Series::new("number", rows.iter().map(|r| r.number).collect::<Vec<_>>()),
            Series::new("position", rows.iter().map(|r| r.position).collect::<Vec<_>>()),
            Series::new("q1", rows.iter().map(|r| r.q1.clone()).collect::<Vec<_>>()),
            Series::new("q2", rows.iter().map(|r| r.q2.clone()).collect::<Vec<_>>()),
            Series::new("q3", rows.iter().map(|r| r.q3.clone()).collect::<Vec<_>>()),
        ])?;
        self.save_table(QUALIFYING_FILE, &mut df)
    }

    // ==================== Standings (fully recomputed) ====================

    pub fn load_driver_standings(&self) -> anyhow::Result<Vec<DriverStanding>> {
        let df = match self.read_table(DRIVER_STANDINGS_FILE)? {
            Some(df) => df,
            None => return Ok(Vec::new()),
        };
        let t = "driver_standings";
        let race_ids = key_i64(&df, t, "raceId")?;
        let driver_ids = key_i64(&df, t, "driverId")?;
        let points = opt_f64(&df, t, "points")?;
        let wins = key_i64(&df, t, "wins")?;
        let positions = key_i64(&df, t, "position")?;
        let position_texts = key_str(&df, t, "positionText")?;

        let mut rows = Vec::with_capacity(race_ids.len());
        for i in 0..race_ids.len() {
            rows.push(DriverStanding {
                race_id: race_ids[i],
                driver_id: driver_ids[i],
                points: points[i].unwrap_or(0.0),
                wins: wins[i],
                position: positions[i],
                position_text: position_texts[i].clone(),
            });
        }
        Ok(rows)
    }

    pub fn save_driver_standings(&self, rows: &[DriverStanding]) -> anyhow::Result<()> {
        let mut df = DataFrame::new(vec![
            Series::new("raceId", rows.iter().map(|r| r.race_id).collect::<Vec<_>>()),
            Series::new("driverId", rows.iter().map(|r| r.driver_id).collect::<Vec<_>>()),
            Series::new("points", rows.iter().map(|r| r.points).collect::<Vec<_>>()),
            Series::new("wins", rows.iter().map(|r| r.wins).collect::<Vec<_>>()),
            Series::new("position", rows.iter().map(|r| r.position).collect::<Vec<_>>()),
            Series::new("positionText", rows.iter().map(|r| r.position_text.clone()).collect::<Vec<_>>()),
        ])?;
        self.save_table(DRIVER_STANDINGS_FILE, &mut df)
    }

    pub fn load_constructor_standings(&self) -> anyhow::Result<Vec<ConstructorStanding>> {
        let df = match self.read_table(CONSTRUCTOR_STANDINGS_FILE)? {
            Some(df) => df,
            None => return Ok(Vec::new()),
        };
        let t = "constructor_standings";
        let race_ids = key_i64(&df, t, "raceId")?;
        let constructor_ids = key_i64(&df, t, "constructorId")?;
        let points = opt_f64(&df, t, "points")?;
        let wins = key_i64(&df, t, "wins")?;
        let positions = key_i64(&df, t, "position")?;
        let position_texts = key_str(&df, t, "positionText")?;

        let mut rows = Vec::with_capacity(race_ids.len());
        for i in 0..race_ids.len() {
            rows.push(ConstructorStanding {
                race_id: race_ids[i],
                constructor_id: constructor_ids[i],
                points: points[i].unwrap_or(0.0),
                wins: wins[i],
                position: positions[i],
                position_text: position_texts[i].clone(),
            });
        }
        Ok(rows)
    }

    pub fn save_constructor_standings(&self, rows: &[ConstructorStanding]) -> anyhow::Result<()> {
        let mut df = DataFrame::new(vec![
            Series::new("raceId", rows.iter().map(|r| r.race_id).collect::<Vec<_>>()),
            Series::new("constructorId", rows.iter().map(|r| r.constructor_id).collect::<Vec<_>>()),
            Series::new("points", rows.iter().map(|r| r.points).collect::<Vec<_>>()),
            Series::new("wins", rows.iter().map(|r| r.wins).collect::<Vec<_>>()),
            Series::new("position", rows.iter().map(|r| r.position).collect::<Vec<_>>()),
            Series::new("positionText", rows.iter().map(|r| r.position_text.clone()).collect::<Vec<_>>()),
        ])?;
        self.save_table(CONSTRUCTOR_STANDINGS_FILE, &mut df)
    }
}

/// Write a DataFrame as CSV via a temp file in the destination directory,
/// then atomically replace the target.
pub fn write_df_atomic(path: &Path, df: &mut DataFrame) -> anyhow::Result<()> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("creating temp file in {}", dir.display()))?;
    CsvWriter::new(&mut tmp)
        .include_header(true)
        .finish(df)
        .with_context(|| format!("writing {}", path.display()))?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .map_err(|e| anyhow!("replacing {}: {}", path.display(), e))?;
    Ok(())
}

// ==================== Column extraction ====================

fn raw_column<'a>(df: &'a DataFrame, table: &str, column: &str) -> Result<&'a Series, SchemaError> {
    df.column(column)
        .map_err(|_| SchemaError::missing_column(table, column))
}

fn opt_i64(df: &DataFrame, table: &str, column: &str) -> Result<Vec<Option<i64>>, SchemaError> {
    let s = raw_column(df, table, column)?
        .cast(&DataType::Int64)
        .map_err(|_| SchemaError::column_type(table, column))?;
    let ca = s.i64().map_err(|_| SchemaError::column_type(table, column))?;
    Ok(ca.into_iter().collect())
}

fn key_i64(df: &DataFrame, table: &str, column: &str) -> Result<Vec<i64>, SchemaError> {
    opt_i64(df, table, column)?
        .into_iter()
        .map(|v| v.ok_or_else(|| SchemaError::null_key(table, column)))
        .collect()
}

fn opt_f64(df: &DataFrame, table: &str, column: &str) -> Result<Vec<Option<f64>>, SchemaError> {
    let s = raw_column(df, table, column)?
        .cast(&DataType::Float64)
        .map_err(|_| SchemaError::column_type(table, column))?;
    let ca = s.f64().map_err(|_| SchemaError::column_type(table, column))?;
    Ok(ca.into_iter().collect())
}

fn opt_str(df: &DataFrame, table: &str, column: &str) -> Result<Vec<Option<String>>, SchemaError> {
    let s = raw_column(df, table, column)?
        .cast(&DataType::String)
        .map_err(|_| SchemaError::column_type(table, column))?;
    let ca = s.str().map_err(|_| SchemaError::column_type(table, column))?;
    Ok(ca.into_iter().map(|v| v.map(|s| s.to_string())).collect())
}

fn key_str(df: &DataFrame, table: &str, column: &str) -> Result<Vec<String>, SchemaError> {
    opt_str(df, table, column)?
        .into_iter()
        .map(|v| v.ok_or_else(|| SchemaError::null_key(table, column)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchemaError;

    fn sample_drivers() -> Vec<Driver> {
        vec![
            Driver {
                driver_id: 1,
                driver_ref: "max_verstappen".to_string(),
                number: Some(1),
                code: Some("VER".to_string()),
                forename: Some("Max".to_string()),
                surname: Some("Verstappen".to_string()),
            },
            Driver {
                driver_id: 2,
                driver_ref: "alonso".to_string(),
                number: Some(14),
                code: None,
                forename: Some("Fernando".to_string()),
                surname: Some("Alonso".to_string()),
            },
        ]
    }

    #[test]
    fn test_drivers_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let wh = Warehouse::new(dir.path());
        let rows = sample_drivers();
        wh.save_drivers(&rows).unwrap();

        let loaded = wh.load_drivers().unwrap();
        assert_eq!(loaded, rows);
    }

    #[test]
    fn test_missing_file_is_empty_table() {
        let dir = tempfile::tempdir().unwrap();
        let wh = Warehouse::new(dir.path());
        assert!(wh.load_results().unwrap().is_empty());
        assert!(wh.load_races().unwrap().is_empty());
    }

    #[test]
    fn test_missing_column_is_schema_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(DRIVERS_FILE),
            "driverId,driverRef\n1,alonso\n",
        )
        .unwrap();
        let wh = Warehouse::new(dir.path());
        let err = wh.load_drivers().unwrap_err();
        let schema = err.downcast_ref::<SchemaError>().unwrap();
        assert_eq!(schema, &SchemaError::missing_column("drivers", "number"));
    }

    #[test]
    fn test_save_overwrites_whole_table() {
        let dir = tempfile::tempdir().unwrap();
        let wh = Warehouse::new(dir.path());
        let rows = sample_drivers();
        wh.save_drivers(&rows).unwrap();
        wh.save_drivers(&rows[..1]).unwrap();

        let loaded = wh.load_drivers().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].driver_ref, "max_verstappen");
    }

    #[test]
    fn test_results_round_trip_with_nulls() {
        let dir = tempfile::tempdir().unwrap();
        let wh = Warehouse::new(dir.path());
        let rows = vec![RaceResult {
            result_id: 0,
            race_id: 10,
            driver_id: 1,
            constructor_id: None,
            number: Some(1),
            grid: Some(3),
            position_text: Some("R".to_string()),
            position_order: None,
            points: 0.0,
            laps: Some(12),
            time: None,
            milliseconds: None,
            fastest_lap: None,
            rank: None,
            fastest_lap_time: None,
        }];
        wh.save_results(&rows).unwrap();
        let loaded = wh.load_results().unwrap();
        assert_eq!(loaded, rows);
    }
}
