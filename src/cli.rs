//! CLI commands for pitwall.
//!
//! Ingestion commands (race, sprint, qualifying) walk one season, upsert the
//! dimension tables and append the session's facts. `standings` recomputes
//! both standings tables from scratch, `prepare` builds the model-ready
//! feature table from everything ingested so far.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};

use crate::append::{
    append_lap_times, append_qualifying, append_results, append_sprint_results,
};
use crate::config::AppConfig;
use crate::features::{build_feature_table, save_feature_table};
use crate::normalize::{
    constructor_candidates, driver_candidates, fastest_laps, laps_completed, normalize_laps,
    normalize_qualifying, normalize_results, race_candidate, DimensionIndex,
};
use crate::session::{fetch_season, JsonSessionSource, SessionKind};
use crate::standings::compute_standings;
use crate::store::Warehouse;
use crate::upsert::{upsert_constructors, upsert_drivers, upsert_races};

#[derive(Parser)]
#[command(name = "pitwall")]
#[command(version, about = "Pitwall: F1 session data warehouse and feature pipeline", long_about = None)]
pub struct Cli {
    /// Staging directory override
    #[arg(long, global = true)]
    pub staging: Option<PathBuf>,

    /// Session source directory override
    #[arg(long, global = true)]
    pub sessions: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ingest a season of race sessions (laps and results)
    Race {
        /// Season to ingest
        #[arg(value_name = "YEAR")]
        year: i64,
    },

    /// Ingest a season of sprint sessions
    Sprint {
        /// Season to ingest
        #[arg(value_name = "YEAR")]
        year: i64,
    },

    /// Ingest a season of qualifying sessions
    Qualifying {
        /// Season to ingest
        #[arg(value_name = "YEAR")]
        year: i64,
    },

    /// Recompute driver and constructor standings from the stored results
    Standings,

    /// Build the prepared feature table
    Prepare {
        /// Output directory override
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn load_config(staging: Option<PathBuf>, sessions: Option<PathBuf>) -> anyhow::Result<AppConfig> {
    let mut config = AppConfig::load()?;
    if let Some(dir) = staging {
        config.warehouse.staging_dir = dir.to_string_lossy().to_string();
    }
    if let Some(dir) = sessions {
        config.sessions.dir = dir.to_string_lossy().to_string();
    }
    Ok(config)
}

/// Ingest one season of one session kind.
pub fn run_ingest(
    staging: Option<PathBuf>,
    sessions: Option<PathBuf>,
    year: i64,
    kind: SessionKind,
) -> anyhow::Result<()> {
    let config = load_config(staging, sessions)?;
    let warehouse = Warehouse::new(config.warehouse.staging_dir.as_str());
    let source = JsonSessionSource::new(config.sessions.dir.as_str());

    let today = chrono::Local::now().date_naive();
    let report = fetch_season(&source, year, kind, today)?;
    info!(
        year,
        loaded = report.loaded.len(),
        skipped_future = report.skipped_future.len(),
        failed = report.failures.len(),
        "season retrieval finished"
    );
    if report.loaded.is_empty() {
        warn!(year, "no sessions retrieved, nothing to ingest");
        return Ok(());
    }

    // Dimensions first: every loaded round contributes candidates, in round
    // order, so first-seen surrogate ids are deterministic.
    let mut new_drivers = Vec::new();
    let mut new_constructors = Vec::new();
    let mut new_races = Vec::new();
    for loaded in &report.loaded {
        new_drivers.extend(driver_candidates(&loaded.data.classification)?);
        new_constructors.extend(constructor_candidates(&loaded.data.classification)?);
        new_races.push(race_candidate(loaded.round, &loaded.data.meta)?);
    }
    let drivers = upsert_drivers(&warehouse, new_drivers)?;
    let constructors = upsert_constructors(&warehouse, new_constructors)?;
    let races = upsert_races(&warehouse, new_races)?;
    let index = DimensionIndex::new(&drivers, &constructors, &races);

    // Facts: one batch per season run, appended at race granularity.
    let mut laps = Vec::new();
    let mut results = Vec::new();
    let mut qualifying = Vec::new();
    for loaded in &report.loaded {
        let race_id = match index.race_id(year, loaded.round) {
            Some(id) => id,
            None => {
                warn!(year, round = loaded.round, "round missing from races table, skipped");
                continue;
            }
        };
        match kind {
            SessionKind::Race | SessionKind::Sprint => {
                let round_laps = normalize_laps(race_id, &loaded.data.laps, &index);
                let fastest = fastest_laps(&round_laps);
                let laps_done = laps_completed(&round_laps);
                results.extend(normalize_results(
                    race_id,
                    &loaded.data.classification,
                    &index,
                    &fastest,
                    &laps_done,
                ));
                if kind == SessionKind::Race {
                    laps.extend(round_laps);
                }
            }
            SessionKind::Qualifying => {
                qualifying.extend(normalize_qualifying(
                    race_id,
                    &loaded.data.classification,
                    &index,
                ));
            }
        }
    }

    match kind {
        SessionKind::Race => {
            append_lap_times(&warehouse, laps)?;
            append_results(&warehouse, results)?;
        }
        SessionKind::Sprint => {
            append_sprint_results(&warehouse, results)?;
        }
        SessionKind::Qualifying => {
            append_qualifying(&warehouse, qualifying)?;
        }
    }

    if !report.failures.is_empty() {
        warn!(
            year,
            failed = report.failures.len(),
            "some rounds failed to retrieve, re-run to pick them up"
        );
    }
    Ok(())
}

/// Recompute both standings tables from the stored results.
pub fn run_standings(staging: Option<PathBuf>, sessions: Option<PathBuf>) -> anyhow::Result<()> {
    let config = load_config(staging, sessions)?;
    let warehouse = Warehouse::new(config.warehouse.staging_dir.as_str());

    let results = warehouse.load_results()?;
    let sprint_results = warehouse.load_sprint_results()?;
    let races = warehouse.load_races()?;

    let (driver_rows, constructor_rows) = compute_standings(&results, &sprint_results, &races);
    info!(
        drivers = driver_rows.len(),
        constructors = constructor_rows.len(),
        "standings recomputed"
    );
    warehouse.save_driver_standings(&driver_rows)?;
    warehouse.save_constructor_standings(&constructor_rows)?;
    Ok(())
}

/// Build and persist the prepared feature table.
pub fn run_prepare(
    staging: Option<PathBuf>,
    sessions: Option<PathBuf>,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let config = load_config(staging, sessions)?;
    let warehouse = Warehouse::new(config.warehouse.staging_dir.as_str());

    let results = warehouse.load_results()?;
    let driver_standings = warehouse.load_driver_standings()?;
    let constructor_standings = warehouse.load_constructor_standings()?;
    let races = warehouse.load_races()?;
    let drivers = warehouse.load_drivers()?;
    let constructors = warehouse.load_constructors()?;
    let lap_times = warehouse.load_lap_times()?;

    let rows = build_feature_table(
        &results,
        &driver_standings,
        &constructor_standings,
        &races,
        &drivers,
        &constructors,
        &lap_times,
    )?;
    info!(rows = rows.len(), "feature table built");

    let out_dir = output.unwrap_or_else(|| PathBuf::from(config.warehouse.prepared_dir.as_str()));
    let path = out_dir.join("prepared.csv");
    save_feature_table(&path, &rows)?;
    info!(path = %path.display(), "feature table written");
    Ok(())
}
