//! Feature engineering pipeline.
//!
//! One batch pass over the fully joined historical warehouse producing a
//! model-ready row per (race, driver). Temporal features are leakage-safe:
//! `_t1` columns are shifted from the driver's *next* race and are targets,
//! never inputs; the per-circuit overtaking rate for season Y uses seasons
//! strictly before Y only.
//!
//! Join misses yield absent values and the run continues; the one fatal
//! check is the final finish-position integer cast, which must be fully
//! populated.

use std::collections::HashMap;
use std::path::Path;
use tracing::warn;

use polars::prelude::*;

use crate::error::SchemaError;
use crate::schema::{
    Constructor, ConstructorStanding, Driver, DriverStanding, LapTime, Race, RaceResult,
};
use crate::store::write_df_atomic;

/// One row of the prepared feature table.
///
/// `Option` fields are absent values carried through from join misses or
/// from the visible edge of the timeline. The `*_t1` fields are supervised
/// targets drawn from the driver's next race; `None` there means "no
/// following race in the dataset", which is deliberately distinct from a
/// missed threshold (`Some(0)`).
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub race_id: i64,
    pub driver_id: i64,
    pub constructor_id: Option<i64>,
    pub year: i64,
    pub round: i64,
    pub circuit_id: String,
    pub race_name: String,
    pub driver_code: Option<String>,
    pub constructor_name: Option<String>,

    /// Equal-frequency quarter of the season by round, 1-4.
    pub quarter: i64,
    /// Days since the previous race in the full chronological sequence;
    /// crosses season boundaries (see DESIGN notes), absent for the very
    /// first race.
    pub date_gap_days: Option<i64>,
    pub is_round_1: i64,

    pub grid: Option<i64>,
    pub position: i64,
    pub points: f64,

    pub standings_points: Option<f64>,
    pub standings_position: Option<i64>,
    pub standings_wins: Option<i64>,
    pub constructor_points: Option<f64>,
    pub constructor_position: Option<i64>,
    pub constructor_wins: Option<i64>,

    /// Mean lap time in milliseconds over the driver's race laps.
    pub laptime_avg: Option<f64>,

    /// `|finish - grid|`.
    pub grid_end_diff: Option<i64>,
    /// Mean `grid_end_diff` at this circuit over strictly earlier seasons.
    pub overtakes_per_track: Option<f64>,

    pub grid_t1: Option<i64>,
    pub position_t1: Option<i64>,
    pub overtakes_per_track_t1: Option<f64>,
    /// Next race's grid position relative to the current standings position.
    pub diff_grid_standing: Option<i64>,
    pub position_t1_top1: Option<i64>,
    pub position_t1_top2: Option<i64>,
    pub position_t1_top3: Option<i64>,

    /// Places gained when finishing better than grid, else 0.
    pub overtake_gain: Option<i64>,
    /// Places lost when finishing worse than grid (non-positive), else 0.
    pub defense_loss: Option<i64>,

    /// Team-summed standings points minus the driver's own. With N != 2
    /// cars this is the sum over all other cars, not a single teammate.
    pub teammate_standing_points: Option<f64>,

    /// Expanding mean of `overtake_gain`, inclusive of the current race.
    pub overtake_rate: f64,
    pub teammate_overtake_rate: Option<f64>,
    /// Expanding mean of `defense_loss`, inclusive of the current race.
    pub defense_rate: f64,
    pub teammate_defense_rate: Option<f64>,
}

/// Build the feature table from the full historical warehouse.
pub fn build_feature_table(
    results: &[RaceResult],
    driver_standings: &[DriverStanding],
    constructor_standings: &[ConstructorStanding],
    races: &[Race],
    drivers: &[Driver],
    constructors: &[Constructor],
    lap_times: &[LapTime],
) -> Result<Vec<FeatureRow>, SchemaError> {
    let race_by_id: HashMap<i64, &Race> = races.iter().map(|r| (r.race_id, r)).collect();
    let driver_by_id: HashMap<i64, &Driver> = drivers.iter().map(|d| (d.driver_id, d)).collect();
    let constructor_by_id: HashMap<i64, &Constructor> =
        constructors.iter().map(|c| (c.constructor_id, c)).collect();
    let ds_by_key: HashMap<(i64, i64), &DriverStanding> = driver_standings
        .iter()
        .map(|s| ((s.race_id, s.driver_id), s))
        .collect();
    let cs_by_key: HashMap<(i64, i64), &ConstructorStanding> = constructor_standings
        .iter()
        .map(|s| ((s.race_id, s.constructor_id), s))
        .collect();

    let laptime_avg = average_lap_times(lap_times);
    let quarters = season_quarters(races);
    let date_gaps = race_date_gaps(races);

    // Base assembly: one row per result, joined against everything else.
    let mut rows: Vec<FeatureRow> = Vec::with_capacity(results.len());
    for result in results {
        let race = match race_by_id.get(&result.race_id) {
            Some(race) => race,
            None => {
                warn!(
                    race_id = result.race_id,
                    "result references unknown race, row dropped"
                );
                continue;
            }
        };

        // The one fatal cast: finish position must be a populated integer.
        let position = match result.position_order {
            Some(p) if p.fract() == 0.0 => p as i64,
            _ => {
                return Err(SchemaError::FinishPositionCast {
                    race_id: result.race_id,
                    driver_id: result.driver_id,
                })
            }
        };

        let ds = ds_by_key.get(&(result.race_id, result.driver_id));
        let cs = result
            .constructor_id
            .and_then(|cid| cs_by_key.get(&(result.race_id, cid)));

        let grid = result.grid;
        let grid_end_diff = grid.map(|g| (position - g).abs());
        // Signed movement: positive when finishing better than grid.
        let signed = grid.map(|g| g - position);

        rows.push(FeatureRow {
            race_id: result.race_id,
            driver_id: result.driver_id,
            constructor_id: result.constructor_id,
            year: race.year,
            round: race.round,
            circuit_id: race.circuit_id.clone(),
            race_name: race.name.clone(),
            driver_code: driver_by_id
                .get(&result.driver_id)
                .and_then(|d| d.code.clone()),
            constructor_name: result
                .constructor_id
                .and_then(|cid| constructor_by_id.get(&cid))
                .map(|c| c.name.clone()),
            quarter: quarters.get(&result.race_id).copied().unwrap_or(0),
            date_gap_days: date_gaps.get(&result.race_id).copied().flatten(),
            is_round_1: i64::from(race.round == 1),
            grid,
            position,
            points: result.points,
            standings_points: ds.map(|s| s.points),
            standings_position: ds.map(|s| s.position),
            standings_wins: ds.map(|s| s.wins),
            constructor_points: cs.map(|s| s.points),
            constructor_position: cs.map(|s| s.position),
            constructor_wins: cs.map(|s| s.wins),
            laptime_avg: laptime_avg
                .get(&(result.race_id, result.driver_id))
                .copied(),
            grid_end_diff,
            overtakes_per_track: None,
            grid_t1: None,
            position_t1: None,
            overtakes_per_track_t1: None,
            diff_grid_standing: None,
            position_t1_top1: None,
            position_t1_top2: None,
            position_t1_top3: None,
            overtake_gain: signed.map(|s| s.max(0)),
            defense_loss: signed.map(|s| s.min(0)),
            teammate_standing_points: None,
            overtake_rate: 0.0,
            teammate_overtake_rate: None,
            defense_rate: 0.0,
            teammate_defense_rate: None,
        });
    }

    attach_circuit_history(&mut rows);
    shift_next_race(&mut rows);
    attach_teammate_standings(&mut rows);
    expanding_skill_estimates(&mut rows);

    rows.sort_by(|a, b| {
        (a.driver_id, a.year, a.round).cmp(&(b.driver_id, b.year, b.round))
    });
    Ok(rows)
}

/// Mean lap milliseconds per `(race, driver)`.
fn average_lap_times(lap_times: &[LapTime]) -> HashMap<(i64, i64), f64> {
    let mut sums: HashMap<(i64, i64), (f64, u64)> = HashMap::new();
    for lap in lap_times {
        let entry = sums.entry((lap.race_id, lap.driver_id)).or_insert((0.0, 0));
        entry.0 += lap.milliseconds as f64;
        entry.1 += 1;
    }
    sums.into_iter()
        .map(|(key, (sum, count))| (key, sum / count as f64))
        .collect()
}

/// Equal-frequency quartile of each race's round within its season.
fn season_quarters(races: &[Race]) -> HashMap<i64, i64> {
    let mut by_year: HashMap<i64, Vec<(i64, i64)>> = HashMap::new();
    for race in races {
        by_year.entry(race.year).or_default().push((race.round, race.race_id));
    }

    let mut quarters = HashMap::new();
    for rounds in by_year.values_mut() {
        rounds.sort();
        let n = rounds.len() as i64;
        for (i, &(_, race_id)) in rounds.iter().enumerate() {
            let quarter = ((i as i64 + 1) * 4 + n - 1) / n;
            quarters.insert(race_id, quarter.clamp(1, 4));
        }
    }
    quarters
}

/// Days since the previous race across the full chronological sequence.
/// The first race of a season diffs against the prior season's finale; the
/// very first race has no gap.
fn race_date_gaps(races: &[Race]) -> HashMap<i64, Option<i64>> {
    let mut ordered: Vec<&Race> = races.iter().collect();
    ordered.sort_by_key(|r| (r.year, r.round));

    let mut gaps = HashMap::new();
    let mut previous: Option<&Race> = None;
    for race in ordered {
        let gap = previous.map(|prev| (race.date - prev.date).num_days());
        gaps.insert(race.race_id, gap);
        previous = Some(race);
    }
    gaps
}

/// Per-circuit overtaking rate from strictly earlier seasons.
///
/// For season Y the rate at a circuit is the mean `grid_end_diff` over all
/// rows at that circuit in seasons `< Y`; circuits with no prior history
/// stay absent. Adding or removing races in season Y or later cannot change
/// season Y's rates.
fn attach_circuit_history(rows: &mut [FeatureRow]) {
    let mut years: Vec<i64> = rows.iter().map(|r| r.year).collect();
    years.sort_unstable();
    years.dedup();

    let mut by_year: HashMap<i64, Vec<(String, Option<i64>)>> = HashMap::new();
    for row in rows.iter() {
        by_year
            .entry(row.year)
            .or_default()
            .push((row.circuit_id.clone(), row.grid_end_diff));
    }

    // Snapshot the accumulated prior-season means before folding each
    // season in, so a season never sees itself.
    let mut rate_for: HashMap<(String, i64), f64> = HashMap::new();
    let mut acc: HashMap<String, (f64, u64)> = HashMap::new();
    for &year in &years {
        for (circuit, (sum, count)) in &acc {
            rate_for.insert((circuit.clone(), year), sum / *count as f64);
        }
        for (circuit, movement) in &by_year[&year] {
            if let Some(m) = movement {
                let entry = acc.entry(circuit.clone()).or_insert((0.0, 0));
                entry.0 += *m as f64;
                entry.1 += 1;
            }
        }
    }

    for row in rows.iter_mut() {
        row.overtakes_per_track = rate_for.get(&(row.circuit_id.clone(), row.year)).copied();
    }
}

/// Row indices per driver, each list in chronological order.
fn driver_order(rows: &[FeatureRow]) -> HashMap<i64, Vec<usize>> {
    let mut order: HashMap<i64, Vec<usize>> = HashMap::new();
    for (i, row) in rows.iter().enumerate() {
        order.entry(row.driver_id).or_default().push(i);
    }
    for indices in order.values_mut() {
        indices.sort_by_key(|&i| (rows[i].year, rows[i].round));
    }
    order
}

/// Shift `(grid, finish, circuit rate)` one race into the future per driver,
/// producing the `_t1` targets and the threshold labels.
fn shift_next_race(rows: &mut Vec<FeatureRow>) {
    let order = driver_order(rows);

    let mut assignments: Vec<(usize, Option<i64>, Option<i64>, Option<f64>)> = Vec::new();
    for indices in order.values() {
        for window in indices.windows(2) {
            let (current, next) = (window[0], window[1]);
            assignments.push((
                current,
                rows[next].grid,
                Some(rows[next].position),
                rows[next].overtakes_per_track,
            ));
        }
    }

    for (i, grid_t1, position_t1, rate_t1) in assignments {
        let row = &mut rows[i];
        row.grid_t1 = grid_t1;
        row.position_t1 = position_t1;
        row.overtakes_per_track_t1 = rate_t1;
    }

    for row in rows.iter_mut() {
        row.diff_grid_standing = match (row.grid_t1, row.standings_position) {
            (Some(grid), Some(standing)) => Some(grid - standing),
            _ => None,
        };
        // Tri-state labels: None = no following race, Some(0) = raced and
        // missed the threshold.
        row.position_t1_top1 = row.position_t1.map(|p| i64::from(p <= 1));
        row.position_t1_top2 = row.position_t1.map(|p| i64::from(p <= 2));
        row.position_t1_top3 = row.position_t1.map(|p| i64::from(p <= 3));
    }
}

/// Teammate-relative standings points: team sum minus own.
fn attach_teammate_standings(rows: &mut [FeatureRow]) {
    let mut team_sum: HashMap<(i64, i64), f64> = HashMap::new();
    for row in rows.iter() {
        if let (Some(cid), Some(points)) = (row.constructor_id, row.standings_points) {
            *team_sum.entry((cid, row.race_id)).or_insert(0.0) += points;
        }
    }
    for row in rows.iter_mut() {
        row.teammate_standing_points = match (row.constructor_id, row.standings_points) {
            (Some(cid), Some(points)) => {
                team_sum.get(&(cid, row.race_id)).map(|sum| sum - points)
            }
            _ => None,
        };
    }
}

/// Expanding per-driver means of overtake gain and defense loss (inclusive
/// of the current race, 0 until a value exists), plus their team-relative
/// counterparts.
fn expanding_skill_estimates(rows: &mut Vec<FeatureRow>) {
    let order = driver_order(rows);

    for indices in order.values() {
        let mut gain_sum = 0.0;
        let mut gain_count = 0u64;
        let mut loss_sum = 0.0;
        let mut loss_count = 0u64;
        for &i in indices {
            if let Some(gain) = rows[i].overtake_gain {
                gain_sum += gain as f64;
                gain_count += 1;
            }
            if let Some(loss) = rows[i].defense_loss {
                loss_sum += loss as f64;
                loss_count += 1;
            }
            rows[i].overtake_rate = if gain_count > 0 {
                gain_sum / gain_count as f64
            } else {
                0.0
            };
            rows[i].defense_rate = if loss_count > 0 {
                loss_sum / loss_count as f64
            } else {
                0.0
            };
        }
    }

    let mut gain_team: HashMap<(i64, i64), f64> = HashMap::new();
    let mut loss_team: HashMap<(i64, i64), f64> = HashMap::new();
    for row in rows.iter() {
        if let Some(cid) = row.constructor_id {
            *gain_team.entry((cid, row.race_id)).or_insert(0.0) += row.overtake_rate;
            *loss_team.entry((cid, row.race_id)).or_insert(0.0) += row.defense_rate;
        }
    }
    for row in rows.iter_mut() {
        if let Some(cid) = row.constructor_id {
            row.teammate_overtake_rate = gain_team
                .get(&(cid, row.race_id))
                .map(|sum| sum - row.overtake_rate);
            row.teammate_defense_rate = loss_team
                .get(&(cid, row.race_id))
                .map(|sum| sum - row.defense_rate);
        }
    }
}

/// Persist the prepared feature table as CSV (atomic overwrite).
pub fn save_feature_table(path: &Path, rows: &[FeatureRow]) -> anyhow::Result<()> {
    let mut df = DataFrame::new(vec![
        Series::new("raceId", rows.iter().map(|r| r.race_id).collect::<Vec<_>>()),
        Series::new("driverId", rows.iter().map(|r| r.driver_id).collect::<Vec<_>>()),
        Series::new("constructorId", rows.iter().map(|r| r.constructor_id).collect::<Vec<_>>()),
        Series::new("year", rows.iter().map(|r| r.year).collect::<Vec<_>>()),
        Series::new("round", rows.iter().map(|r| r.round).collect::<Vec<_>>()),
        Series::new("circuitId", rows.iter().map(|r| r.circuit_id.clone()).collect::<Vec<_>>()),
        Series::new("racename", rows.iter().map(|r| r.race_name.clone()).collect::<Vec<_>>()),
        Series::new("code", rows.iter().map(|r| r.driver_code.clone()).collect::<Vec<_>>()),
        Series::new("constructorname", rows.iter().map(|r| r.constructor_name.clone()).collect::<Vec<_>>()),
        Series::new("quarter", rows.iter().map(|r| r.quarter).collect::<Vec<_>>()),
        Series::new("date_diff", rows.iter().map(|r| r.date_gap_days).collect::<Vec<_>>()),
        Series::new("is_round_1", rows.iter().map(|r| r.is_round_1).collect::<Vec<_>>()),
        Series::new("grid", rows.iter().map(|r| r.grid).collect::<Vec<_>>()),
        Series::new("results_position", rows.iter().map(|r| r.position).collect::<Vec<_>>()),
        Series::new("results_points", rows.iter().map(|r| r.points).collect::<Vec<_>>()),
        Series::new("driverstandings_points", rows.iter().map(|r| r.standings_points).collect::<Vec<_>>()),
        Series::new("driverstandings_position", rows.iter().map(|r| r.standings_position).collect::<Vec<_>>()),
        Series::new("driverstandings_wins", rows.iter().map(|r| r.standings_wins).collect::<Vec<_>>()),
        Series::new("constructorstandings_points", rows.iter().map(|r| r.constructor_points).collect::<Vec<_>>()),
        Series::new("constructorstandings_position", rows.iter().map(|r| r.constructor_position).collect::<Vec<_>>()),
        Series::new("constructorstandings_wins", rows.iter().map(|r| r.constructor_wins).collect::<Vec<_>>()),
        Series::new("laptime_avg", rows.iter().map(|r| r.laptime_avg).collect::<Vec<_>>()),
        Series::new("grid_end_diff", rows.iter().map(|r| r.grid_end_diff).collect::<Vec<_>>()),
        Series::new("overtakes_per_track", rows.iter().map(|r| r.overtakes_per_track).collect::<Vec<_>>()),
        Series::new("grid_t1", rows.iter().map(|r| r.grid_t1).collect::<Vec<_>>()),
        Series::new("results_position_t1_num", rows.iter().map(|r| r.position_t1).collect::<Vec<_>>()),
        Series::new("overtakes_per_track_t1", rows.iter().map(|r| r.overtakes_per_track_t1).collect::<Vec<_>>()),
        Series::new("diff_grid_standing", rows.iter().map(|r| r.diff_grid_standing).collect::<Vec<_>>()),
        Series::new("results_position_t1_top1", rows.iter().map(|r| r.position_t1_top1).collect::<Vec<_>>()),
        Series::new("results_position_t1_top2", rows.iter().map(|r| r.position_t1_top2).collect::<Vec<_>>()),
        Series::new("results_position_t1_top3", rows.iter().map(|r| r.position_t1_top3).collect::<Vec<_>>()),
        Series::new("grid_end_diff_overtakes", rows.iter().map(|r| r.overtake_gain).collect::<Vec<_>>()),
        Series::new("grid_end_diff_defense", rows.iter().map(|r| r.defense_loss).collect::<Vec<_>>()),
        Series::new("teammates_driverstanding", rows.iter().map(|r| r.teammate_standing_points).collect::<Vec<_>>()),
        Series::new("drivers_takeover_chance", rows.iter().map(|r| r.overtake_rate).collect::<Vec<_>>()),
        Series::new("teammates_takeover_chance", rows.iter().map(|r| r.teammate_overtake_rate).collect::<Vec<_>>()),
        Series::new("drivers_defense", rows.iter().map(|r| r.defense_rate).collect::<Vec<_>>()),
        Series::new("teammates_defense", rows.iter().map(|r| r.teammate_defense_rate).collect::<Vec<_>>()),
    ])?;
    write_df_atomic(path, &mut df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    struct Fixture {
        results: Vec<RaceResult>,
        driver_standings: Vec<DriverStanding>,
        constructor_standings: Vec<ConstructorStanding>,
        races: Vec<Race>,
        drivers: Vec<Driver>,
        constructors: Vec<Constructor>,
        lap_times: Vec<LapTime>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                results: Vec::new(),
                driver_standings: Vec::new(),
                constructor_standings: Vec::new(),
                races: Vec::new(),
                drivers: vec![
                    Driver {
                        driver_id: 1,
                        driver_ref: "max_verstappen".to_string(),
                        number: Some(1),
                        code: Some("VER".to_string()),
                        forename: None,
                        surname: None,
                    },
                    Driver {
                        driver_id: 2,
                        driver_ref: "alonso".to_string(),
                        number: Some(14),
                        code: Some("ALO".to_string()),
                        forename: None,
                        surname: None,
                    },
                ],
                constructors: vec![Constructor {
                    constructor_id: 9,
                    constructor_ref: "red_bull".to_string(),
                    name: "Red Bull Racing".to_string(),
                }],
                lap_times: Vec::new(),
            }
        }

        fn race(&mut self, race_id: i64, year: i64, round: i64, circuit: &str) {
            self.races.push(Race {
                race_id,
                year,
                round,
                circuit_id: circuit.to_string(),
                name: format!("{} Grand Prix", circuit),
                date: NaiveDate::from_ymd_opt(year as i32, 3, 1)
                    .unwrap()
                    .checked_add_days(chrono::Days::new(14 * (round as u64 - 1)))
                    .unwrap(),
            });
        }

        fn result(&mut self, race_id: i64, driver_id: i64, grid: i64, position: i64) {
            self.results.push(RaceResult {
                result_id: self.results.len() as i64,
                race_id,
                driver_id,
                constructor_id: Some(9),
                number: None,
                grid: Some(grid),
                position_text: Some(position.to_string()),
                position_order: Some(position as f64),
                points: if position == 1 { 25.0 } else { 18.0 },
                laps: Some(57),
                time: None,
                milliseconds: None,
                fastest_lap: None,
                rank: None,
                fastest_lap_time: None,
            });
        }

        fn standing(&mut self, race_id: i64, driver_id: i64, points: f64, position: i64) {
            self.driver_standings.push(DriverStanding {
                race_id,
                driver_id,
                points,
                wins: 0,
                position,
                position_text: position.to_string(),
            });
        }

        fn build(&self) -> Vec<FeatureRow> {
            build_feature_table(
                &self.results,
                &self.driver_standings,
                &self.constructor_standings,
                &self.races,
                &self.drivers,
                &self.constructors,
                &self.lap_times,
            )
            .unwrap()
        }
    }

    /// Two seasons, three races each, two drivers, shared circuits.
    fn two_season_fixture() -> Fixture {
        let mut f = Fixture::new();
        for (race_id, year, round, circuit) in [
            (1, 2023, 1, "Sakhir"),
            (2, 2023, 2, "Jeddah"),
            (3, 2023, 3, "Melbourne"),
            (4, 2024, 1, "Sakhir"),
            (5, 2024, 2, "Jeddah"),
            (6, 2024, 3, "Melbourne"),
        ] {
            f.race(race_id, year, round, circuit);
        }
        // Driver 1: qualifies 3, finishes 1 everywhere (movement 2).
        // Driver 2: qualifies 1, finishes 2 everywhere (movement 1).
        for race_id in 1..=6 {
            f.result(race_id, 1, 3, 1);
            f.result(race_id, 2, 1, 2);
        }
        f
    }

    fn row<'a>(rows: &'a [FeatureRow], race_id: i64, driver_id: i64) -> &'a FeatureRow {
        rows.iter()
            .find(|r| r.race_id == race_id && r.driver_id == driver_id)
            .unwrap()
    }

    #[test]
    fn test_shift_targets_come_from_next_race() {
        let mut f = two_season_fixture();
        // Vary driver 1's grid so the shift is observable.
        f.results.clear();
        f.result(1, 1, 5, 1);
        f.result(2, 1, 7, 2);
        f.result(3, 1, 2, 4);
        let rows = f.build();

        assert_eq!(row(&rows, 1, 1).grid_t1, Some(7));
        assert_eq!(row(&rows, 1, 1).position_t1, Some(2));
        assert_eq!(row(&rows, 2, 1).grid_t1, Some(2));
        assert_eq!(row(&rows, 2, 1).position_t1, Some(4));
        // Last visible race: no following race, everything absent.
        let last = row(&rows, 3, 1);
        assert_eq!(last.grid_t1, None);
        assert_eq!(last.position_t1, None);
        assert_eq!(last.position_t1_top3, None);
    }

    #[test]
    fn test_threshold_labels_tri_state() {
        let mut f = Fixture::new();
        f.race(1, 2024, 1, "Sakhir");
        f.race(2, 2024, 2, "Jeddah");
        f.result(1, 1, 1, 1);
        f.result(2, 1, 1, 2);
        let rows = f.build();

        let first = row(&rows, 1, 1);
        // Next race finishes 2nd: misses top1, hits top2/top3.
        assert_eq!(first.position_t1_top1, Some(0));
        assert_eq!(first.position_t1_top2, Some(1));
        assert_eq!(first.position_t1_top3, Some(1));
        // End of visible timeline is None, not 0.
        let last = row(&rows, 2, 1);
        assert_eq!(last.position_t1_top1, None);
    }

    #[test]
    fn test_overtakes_per_track_uses_prior_seasons_only() {
        let rows = two_season_fixture().build();

        // Season 2023 has no prior history anywhere.
        for race_id in 1..=3 {
            assert_eq!(row(&rows, race_id, 1).overtakes_per_track, None);
            assert_eq!(row(&rows, race_id, 2).overtakes_per_track, None);
        }
        // Season 2024 at Sakhir: mean of 2023 Sakhir movements (2 and 1).
        assert_eq!(row(&rows, 4, 1).overtakes_per_track, Some(1.5));
        assert_eq!(row(&rows, 4, 2).overtakes_per_track, Some(1.5));
    }

    #[test]
    fn test_no_look_ahead_invariance() {
        let mut f = two_season_fixture();
        let baseline = f.build();

        // Add another 2024 Sakhir race with wild movements: 2024's rates
        // must not move, they depend on seasons before 2024 only.
        f.race(7, 2024, 4, "Sakhir");
        f.result(7, 1, 20, 1);
        f.result(7, 2, 19, 2);
        let extended = f.build();

        for race_id in 1..=6 {
            for driver_id in [1, 2] {
                assert_eq!(
                    row(&baseline, race_id, driver_id).overtakes_per_track,
                    row(&extended, race_id, driver_id).overtakes_per_track,
                );
            }
        }
        assert_eq!(row(&extended, 7, 1).overtakes_per_track, Some(1.5));
    }

    #[test]
    fn test_season_quarters_equal_frequency() {
        let mut f = Fixture::new();
        for round in 1..=8 {
            f.race(round, 2024, round, "Sakhir");
            f.result(round, 1, 1, 1);
        }
        let rows = f.build();
        let quarters: Vec<i64> = (1..=8).map(|race_id| row(&rows, race_id, 1).quarter).collect();
        assert_eq!(quarters, vec![1, 1, 2, 2, 3, 3, 4, 4]);
    }

    #[test]
    fn test_date_gap_crosses_season_boundary() {
        let rows = two_season_fixture().build();
        // Very first race: no previous race at all.
        assert_eq!(row(&rows, 1, 1).date_gap_days, None);
        // Within a season: fixture spaces races 14 days apart.
        assert_eq!(row(&rows, 2, 1).date_gap_days, Some(14));
        // First race of 2024 diffs against the 2023 finale, not None.
        let gap = row(&rows, 4, 1).date_gap_days.unwrap();
        assert!(gap > 300);
        assert_eq!(row(&rows, 4, 1).is_round_1, 1);
    }

    #[test]
    fn test_signed_movement_split() {
        let mut f = Fixture::new();
        f.race(1, 2024, 1, "Sakhir");
        f.race(2, 2024, 2, "Jeddah");
        // Gains 3 places, then loses 4.
        f.result(1, 1, 5, 2);
        f.result(2, 1, 2, 6);
        let rows = f.build();

        let gained = row(&rows, 1, 1);
        assert_eq!(gained.overtake_gain, Some(3));
        assert_eq!(gained.defense_loss, Some(0));
        let lost = row(&rows, 2, 1);
        assert_eq!(lost.overtake_gain, Some(0));
        assert_eq!(lost.defense_loss, Some(-4));
    }

    #[test]
    fn test_expanding_means_inclusive_of_current() {
        let mut f = Fixture::new();
        f.race(1, 2024, 1, "Sakhir");
        f.race(2, 2024, 2, "Jeddah");
        f.race(3, 2024, 3, "Melbourne");
        // Gains: 3, 1, 2 -> expanding means 3, 2, 2.
        f.result(1, 1, 5, 2);
        f.result(2, 1, 3, 2);
        f.result(3, 1, 4, 2);
        let rows = f.build();

        assert_eq!(row(&rows, 1, 1).overtake_rate, 3.0);
        assert_eq!(row(&rows, 2, 1).overtake_rate, 2.0);
        assert_eq!(row(&rows, 3, 1).overtake_rate, 2.0);
    }

    #[test]
    fn test_teammate_values_are_other_cars_sum() {
        let mut f = Fixture::new();
        f.race(1, 2024, 1, "Sakhir");
        f.result(1, 1, 3, 1);
        f.result(1, 2, 1, 2);
        f.standing(1, 1, 25.0, 1);
        f.standing(1, 2, 18.0, 2);
        let rows = f.build();

        assert_eq!(row(&rows, 1, 1).teammate_standing_points, Some(18.0));
        assert_eq!(row(&rows, 1, 2).teammate_standing_points, Some(25.0));
        // Rates are team-relative the same way: driver 1 gained 2, driver 2
        // lost 1, so each sees the other's expanding mean.
        assert_eq!(row(&rows, 1, 1).teammate_overtake_rate, Some(0.0));
        assert_eq!(row(&rows, 1, 2).teammate_overtake_rate, Some(2.0));
    }

    #[test]
    fn test_missing_finish_position_is_fatal() {
        let mut f = Fixture::new();
        f.race(1, 2024, 1, "Sakhir");
        f.result(1, 1, 3, 1);
        f.results[0].position_order = None;

        let err = build_feature_table(
            &f.results,
            &f.driver_standings,
            &f.constructor_standings,
            &f.races,
            &f.drivers,
            &f.constructors,
            &f.lap_times,
        )
        .unwrap_err();
        assert_eq!(
            err,
            SchemaError::FinishPositionCast {
                race_id: 1,
                driver_id: 1
            }
        );
    }

    #[test]
    fn test_end_to_end_two_seasons() {
        let fixture = two_season_fixture();
        let rows = fixture.build();
        assert_eq!(rows.len(), 12);

        // Season-1 rows carry no circuit history.
        assert_eq!(row(&rows, 2, 1).overtakes_per_track, None);
        // Season-2 rows equal the season-1 mean |finish - grid| per circuit:
        // every circuit saw movements 2 (driver 1) and 1 (driver 2).
        for race_id in 4..=6 {
            assert_eq!(row(&rows, race_id, 1).overtakes_per_track, Some(1.5));
        }
        // Shift chains across the season boundary for each driver.
        assert_eq!(row(&rows, 3, 1).grid_t1, Some(3));
        assert_eq!(row(&rows, 6, 1).grid_t1, None);
        // laptime_avg joins are absent: no laps in the fixture.
        assert_eq!(row(&rows, 1, 1).laptime_avg, None);
    }

    #[test]
    fn test_save_feature_table_writes_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prepared.csv");
        let rows = two_season_fixture().build();
        save_feature_table(&path, &rows).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        let mut lines = written.lines();
        let header = lines.next().unwrap();
        assert!(header.contains("overtakes_per_track"));
        assert!(header.contains("results_position_t1_top3"));
        assert_eq!(lines.count(), rows.len());
    }
}
