//! Pure standings computation, kept free of `RaceEngine` state mutation —
//! the same split the reference engine draws between its stateful engine
//! module and its position-calculation helpers.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use kt_contracts::{Entrant, LimitView, RaceLimit, StandingRow};

fn cmp_opt_f64(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Standings order: laps descending; within equal laps, finish_order
/// ascending when both are set (soft-end tiebreak), else best_lap_s
/// ascending, then last_lap_s ascending, then entrant_id ascending.
pub fn compare_entrants(a: &Entrant, b: &Entrant) -> Ordering {
    b.laps
        .cmp(&a.laps)
        .then_with(|| match (a.finish_order, b.finish_order) {
            (Some(fa), Some(fb)) => fa.cmp(&fb),
            _ => Ordering::Equal,
        })
        .then_with(|| cmp_opt_f64(a.best_lap_s, b.best_lap_s))
        .then_with(|| cmp_opt_f64(a.last_lap_s, b.last_lap_s))
        .then_with(|| a.entrant_id.cmp(&b.entrant_id))
}

fn status_str(status: kt_contracts::EntrantStatus) -> String {
    use kt_contracts::EntrantStatus::*;
    match status {
        Active => "ACTIVE",
        Disabled => "DISABLED",
        Dnf => "DNF",
        Dq => "DQ",
    }
    .to_string()
}

fn to_ms(seconds: Option<f64>) -> Option<i64> {
    seconds.map(|s| (s * 1000.0).round() as i64)
}

/// Build the rendered standings: disabled entrants are excluded but stay
/// in the roster map.
pub fn build_standings(entrants: &BTreeMap<i64, Entrant>) -> Vec<StandingRow> {
    let mut rows: Vec<&Entrant> = entrants.values().filter(|e| e.enabled).collect();
    rows.sort_by(|a, b| compare_entrants(a, b));

    let leader_laps = rows.first().map(|e| e.laps).unwrap_or(0);
    let leader_best = rows.first().and_then(|e| e.best_lap_s);

    rows.into_iter()
        .enumerate()
        .map(|(i, e)| {
            let same_cohort = e.laps == leader_laps;
            let gap_ms = if same_cohort {
                match (e.best_lap_s, leader_best) {
                    (Some(best), Some(lbest)) => ((best - lbest).max(0.0) * 1000.0).round() as i64,
                    _ => 0,
                }
            } else {
                0
            };
            StandingRow {
                position: (i + 1) as u32,
                entrant_id: e.entrant_id,
                number: e.number.clone(),
                name: e.name.clone(),
                tag: e.tag.clone(),
                laps: e.laps,
                last_ms: to_ms(e.last_lap_s),
                best_ms: to_ms(e.best_lap_s),
                gap_ms,
                lap_deficit: leader_laps.saturating_sub(e.laps),
                pit_count: e.pit_count,
                status: status_str(e.status),
                grid_index: None,
                brake_valid: None,
            }
        })
        .collect()
}

pub fn limit_view(limit: RaceLimit, clock_ms: i64) -> LimitView {
    match limit {
        RaceLimit::Time { value_s, .. } => LimitView {
            kind: "time",
            value: value_s,
            remaining_ms: Some(((value_s * 1000.0) as i64 - clock_ms).max(0)),
        },
        RaceLimit::Laps { value_laps, .. } => LimitView {
            kind: "laps",
            value: value_laps as f64,
            remaining_ms: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kt_contracts::Entrant;

    fn entrant_with(id: i64, laps: u32, best: Option<f64>, last: Option<f64>) -> Entrant {
        let mut e = Entrant::new(id, None, format!("E{id}"), None);
        e.laps = laps;
        e.best_lap_s = best;
        e.last_lap_s = last;
        e
    }

    #[test]
    fn sorts_by_laps_then_best_then_last_then_id() {
        let mut map = BTreeMap::new();
        map.insert(1, entrant_with(1, 5, Some(20.0), Some(21.0)));
        map.insert(2, entrant_with(2, 5, Some(19.0), Some(19.0)));
        map.insert(3, entrant_with(3, 4, Some(10.0), Some(10.0)));
        let rows = build_standings(&map);
        assert_eq!(rows.iter().map(|r| r.entrant_id).collect::<Vec<_>>(), vec![2, 1, 3]);
        assert_eq!(rows[2].lap_deficit, 1);
    }

    #[test]
    fn finish_order_beats_lap_time_when_both_set() {
        let mut map = BTreeMap::new();
        let mut a = entrant_with(1, 10, Some(20.0), Some(20.0));
        a.finish_order = Some(2);
        let mut b = entrant_with(2, 10, Some(10.0), Some(10.0));
        b.finish_order = Some(1);
        map.insert(1, a);
        map.insert(2, b);
        let rows = build_standings(&map);
        assert_eq!(rows[0].entrant_id, 2);
    }

    #[test]
    fn disabled_entrants_are_excluded() {
        let mut map = BTreeMap::new();
        let mut e = entrant_with(1, 3, Some(10.0), Some(10.0));
        e.enabled = false;
        map.insert(1, e);
        assert!(build_standings(&map).is_empty());
    }
}
