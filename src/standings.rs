//! Standings aggregator.
//!
//! Recomputes driver and constructor standings from scratch on every run:
//! Race and Sprint results are pooled for cumulative points per driver and
//! season, wins accumulate per event type independently, and only the Race
//! stream is emitted. Positions are dense ranks of cumulative points within
//! each race, descending.

use std::collections::HashMap;
use tracing::warn;

use crate::schema::{ConstructorStanding, DriverStanding, Race, RaceResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum EventType {
    Race,
    Sprint,
}

struct StreamRow {
    race_id: i64,
    driver_id: i64,
    constructor_id: Option<i64>,
    year: i64,
    round: i64,
    points: f64,
    win: i64,
    event: EventType,
}

/// Compute driver and constructor standings from the accumulated results.
pub fn compute_standings(
    results: &[RaceResult],
    sprint_results: &[RaceResult],
    races: &[Race],
) -> (Vec<DriverStanding>, Vec<ConstructorStanding>) {
    let race_meta: HashMap<i64, &Race> = races.iter().map(|r| (r.race_id, r)).collect();

    let mut stream = Vec::with_capacity(results.len() + sprint_results.len());
    for (rows, event) in [(results, EventType::Race), (sprint_results, EventType::Sprint)] {
        for row in rows {
            let meta = match race_meta.get(&row.race_id) {
                Some(meta) => meta,
                None => {
                    warn!(race_id = row.race_id, "result references unknown race, skipped");
                    continue;
                }
            };
            stream.push(StreamRow {
                race_id: row.race_id,
                driver_id: row.driver_id,
                constructor_id: row.constructor_id,
                year: meta.year,
                round: meta.round,
                points: row.points,
                win: i64::from(row.position_order == Some(1.0)),
                event,
            });
        }
    }

    // Chronological within season; stable, so Race rows keep preceding the
    // same round's Sprint rows and the leader's cumulative points at a Race
    // row exclude that weekend's Sprint.
    stream.sort_by_key(|r| (r.year, r.round));

    // Points pool across both event types; wins accumulate per type.
    let mut points_acc: HashMap<(i64, i64), f64> = HashMap::new();
    let mut wins_acc: HashMap<(i64, i64, EventType), i64> = HashMap::new();

    let mut driver_rows: Vec<DriverStanding> = Vec::new();
    let mut constructor_of: HashMap<(i64, i64), Option<i64>> = HashMap::new();

    for row in &stream {
        let points = points_acc
            .entry((row.driver_id, row.year))
            .and_modify(|p| *p += row.points)
            .or_insert(row.points);
        let points = *points;
        let wins = wins_acc
            .entry((row.driver_id, row.year, row.event))
            .and_modify(|w| *w += row.win)
            .or_insert(row.win);
        let wins = *wins;

        // Only the Race stream is surfaced; Sprint win counters are kept
        // separate and never emitted.
        if row.event == EventType::Race {
            constructor_of.insert((row.race_id, row.driver_id), row.constructor_id);
            driver_rows.push(DriverStanding {
                race_id: row.race_id,
                driver_id: row.driver_id,
                points,
                wins,
                position: 0,
                position_text: String::new(),
            });
        }
    }

    rank_driver_standings(&mut driver_rows);
    let constructor_rows = constructor_standings(&driver_rows, &constructor_of);
    (driver_rows, constructor_rows)
}

/// Dense rank of cumulative points within each race, descending.
fn rank_driver_standings(rows: &mut [DriverStanding]) {
    let mut per_race: HashMap<i64, Vec<f64>> = HashMap::new();
    for row in rows.iter() {
        per_race.entry(row.race_id).or_default().push(row.points);
    }
    for points in per_race.values_mut() {
        points.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
        points.dedup();
    }
    for row in rows.iter_mut() {
        let distinct = &per_race[&row.race_id];
        let position = distinct
            .iter()
            .position(|&p| p == row.points)
            .map(|i| i as i64 + 1)
            .unwrap_or(0);
        row.position = position;
        row.position_text = position.to_string();
    }
}

/// Constructor standings: driver points and wins summed per
/// `(race, constructor)`, dense-ranked independently.
fn constructor_standings(
    driver_rows: &[DriverStanding],
    constructor_of: &HashMap<(i64, i64), Option<i64>>,
) -> Vec<ConstructorStanding> {
    let mut sums: HashMap<(i64, i64), (f64, i64)> = HashMap::new();
    for row in driver_rows {
        let constructor_id = match constructor_of
            .get(&(row.race_id, row.driver_id))
            .copied()
            .flatten()
        {
            Some(id) => id,
            // A result with no resolved constructor cannot roll up.
            None => continue,
        };
        let entry = sums.entry((row.race_id, constructor_id)).or_insert((0.0, 0));
        entry.0 += row.points;
        entry.1 += row.wins;
    }

    let mut rows: Vec<ConstructorStanding> = sums
        .into_iter()
        .map(|((race_id, constructor_id), (points, wins))| ConstructorStanding {
            race_id,
            constructor_id,
            points,
            wins,
            position: 0,
            position_text: String::new(),
        })
        .collect();
    rows.sort_by_key(|r| (r.race_id, r.constructor_id));

    let mut per_race: HashMap<i64, Vec<f64>> = HashMap::new();
    for row in rows.iter() {
        per_race.entry(row.race_id).or_default().push(row.points);
    }
    for points in per_race.values_mut() {
        points.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
        points.dedup();
    }
    for row in rows.iter_mut() {
        let distinct = &per_race[&row.race_id];
        let position = distinct
            .iter()
            .position(|&p| p == row.points)
            .map(|i| i as i64 + 1)
            .unwrap_or(0);
        row.position = position;
        row.position_text = position.to_string();
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn race(race_id: i64, year: i64, round: i64) -> Race {
        Race {
            race_id,
            year,
            round,
            circuit_id: format!("circuit_{}", round),
            name: format!("Round {}", round),
            date: NaiveDate::from_ymd_opt(year as i32, 3, round as u32).unwrap(),
        }
    }

    fn result(race_id: i64, driver_id: i64, constructor_id: i64, position: f64, points: f64) -> RaceResult {
        RaceResult {
            result_id: 0,
            race_id,
            driver_id,
            constructor_id: Some(constructor_id),
            number: None,
            grid: None,
            position_text: Some(format!("{}", position as i64)),
            position_order: Some(position),
            points,
            laps: None,
            time: None,
            milliseconds: None,
            fastest_lap: None,
            rank: None,
            fastest_lap_time: None,
        }
    }

    #[test]
    fn test_dense_rank_no_gaps_after_tie() {
        let races = vec![race(1, 2024, 1)];
        let results = vec![
            result(1, 1, 1, 1.0, 30.0),
            result(1, 2, 1, 2.0, 30.0),
            result(1, 3, 2, 3.0, 20.0),
            result(1, 4, 2, 4.0, 10.0),
        ];
        let (standings, _) = compute_standings(&results, &[], &races);
        let mut positions: Vec<(i64, i64)> = standings
            .iter()
            .map(|s| (s.driver_id, s.position))
            .collect();
        positions.sort();
        assert_eq!(positions, vec![(1, 1), (2, 1), (3, 3), (4, 4)]);
    }

    #[test]
    fn test_points_accumulate_across_rounds() {
        let races = vec![race(1, 2024, 1), race(2, 2024, 2)];
        let results = vec![
            result(1, 1, 1, 1.0, 25.0),
            result(1, 2, 2, 2.0, 18.0),
            result(2, 1, 1, 2.0, 18.0),
            result(2, 2, 2, 1.0, 25.0),
        ];
        let (standings, _) = compute_standings(&results, &[], &races);
        let at = |race_id: i64, driver_id: i64| {
            standings
                .iter()
                .find(|s| s.race_id == race_id && s.driver_id == driver_id)
                .unwrap()
        };
        assert_eq!(at(1, 1).points, 25.0);
        assert_eq!(at(2, 1).points, 43.0);
        assert_eq!(at(2, 2).points, 43.0);
        // Tied on points after round 2: both rank 1.
        assert_eq!(at(2, 1).position, 1);
        assert_eq!(at(2, 2).position, 1);
    }

    #[test]
    fn test_sprint_points_pooled_wins_race_only() {
        let races = vec![race(1, 2024, 1), race(2, 2024, 2)];
        let results = vec![result(1, 1, 1, 2.0, 18.0), result(2, 1, 1, 1.0, 25.0)];
        // Driver 1 wins the round-1 sprint: points pool, the win does not.
        let sprints = vec![result(1, 1, 1, 1.0, 8.0)];

        let (standings, _) = compute_standings(&results, &sprints, &races);
        let at = |race_id: i64| standings.iter().find(|s| s.race_id == race_id).unwrap();

        // Race row of round 1 precedes the sprint row in the pooled stream.
        assert_eq!(at(1).points, 18.0);
        assert_eq!(at(1).wins, 0);
        // By round 2 the sprint points are pooled in; wins count Race wins only.
        assert_eq!(at(2).points, 51.0);
        assert_eq!(at(2).wins, 1);

        // Only Race-stream rows are emitted.
        assert_eq!(standings.len(), 2);
    }

    #[test]
    fn test_season_resets_cumulative_points() {
        let races = vec![race(1, 2023, 1), race(2, 2024, 1)];
        let results = vec![result(1, 1, 1, 1.0, 25.0), result(2, 1, 1, 1.0, 25.0)];
        let (standings, _) = compute_standings(&results, &[], &races);
        let at = |race_id: i64| standings.iter().find(|s| s.race_id == race_id).unwrap();
        assert_eq!(at(1).points, 25.0);
        assert_eq!(at(2).points, 25.0);
        assert_eq!(at(2).wins, 1);
    }

    #[test]
    fn test_constructor_rollup_and_rank() {
        let races = vec![race(1, 2024, 1)];
        let results = vec![
            result(1, 1, 1, 1.0, 25.0),
            result(1, 2, 1, 2.0, 18.0),
            result(1, 3, 2, 3.0, 15.0),
            result(1, 4, 2, 4.0, 12.0),
        ];
        let (_, constructors) = compute_standings(&results, &[], &races);
        assert_eq!(constructors.len(), 2);
        let at = |constructor_id: i64| {
            constructors
                .iter()
                .find(|c| c.constructor_id == constructor_id)
                .unwrap()
        };
        assert_eq!(at(1).points, 43.0);
        assert_eq!(at(1).wins, 1);
        assert_eq!(at(1).position, 1);
        assert_eq!(at(2).points, 27.0);
        assert_eq!(at(2).position, 2);
    }
}
