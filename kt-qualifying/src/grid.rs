//! C6 Qualifying Grid Builder, grounded in `backend/qualifying.py`'s
//! `freeze_grid` ranking logic: fastest-lap selection per verdict, then a
//! composite `(exclude, demote, best_ms)` sort, then order assignment.

use std::collections::HashMap;

use kt_contracts::{GridPolicy, GridRow, QualifyingGrid};

struct Candidate {
    entrant_id: i64,
    best_ms: Option<i64>,
    exclude: bool,
    demote: bool,
    brake_ok: bool,
}

/// `laps_ms` holds each entrant's frozen qualifying lap times in
/// milliseconds, any order; `verdicts` holds the brake-test verdict per
/// entrant (absent entries are treated as unset).
pub fn build_grid(
    source_heat_id: i64,
    policy: GridPolicy,
    laps_ms: &HashMap<i64, Vec<i64>>,
    verdicts: &HashMap<i64, Option<bool>>,
) -> QualifyingGrid {
    let mut candidates: Vec<Candidate> = laps_ms
        .iter()
        .filter(|(_, laps)| !laps.is_empty())
        .map(|(&entrant_id, laps)| {
            let mut sorted = laps.clone();
            sorted.sort_unstable();
            let verdict = verdicts.get(&entrant_id).copied().flatten();

            let best_ms = match verdict {
                Some(false) if policy == GridPolicy::UseNextValid && sorted.len() >= 2 => sorted[1],
                _ => sorted[0],
            };

            let failed = verdict == Some(false);
            Candidate {
                entrant_id,
                best_ms: Some(best_ms),
                exclude: policy == GridPolicy::Exclude && failed,
                demote: policy == GridPolicy::Demote && failed,
                brake_ok: verdict == Some(true),
            }
        })
        .collect();

    candidates.sort_by(|a, b| {
        a.exclude
            .cmp(&b.exclude)
            .then_with(|| a.demote.cmp(&b.demote))
            .then_with(|| a.best_ms.unwrap_or(i64::MAX).cmp(&b.best_ms.unwrap_or(i64::MAX)))
    });

    let grid = candidates
        .into_iter()
        .filter(|c| !c.exclude)
        .enumerate()
        .map(|(i, c)| GridRow { entrant_id: c.entrant_id, best_ms: c.best_ms, brake_ok: c.brake_ok, order: (i + 1) as u32 })
        .collect();

    QualifyingGrid { source_heat_id, policy, grid }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demote_keeps_failed_entrant_but_ranks_below_passes() {
        let mut laps = HashMap::new();
        laps.insert(1, vec![20_600, 20_900]);
        laps.insert(2, vec![20_500, 20_700]);
        let mut verdicts = HashMap::new();
        verdicts.insert(1, Some(true));
        verdicts.insert(2, Some(false));

        let grid = build_grid(1, GridPolicy::Demote, &laps, &verdicts);
        assert_eq!(grid.grid.len(), 2);
        assert_eq!(grid.grid[0].entrant_id, 1);
        assert_eq!(grid.grid[0].best_ms, Some(20_600));
        assert_eq!(grid.grid[1].entrant_id, 2);
        assert_eq!(grid.grid[1].best_ms, Some(20_500));
    }

    #[test]
    fn use_next_valid_picks_second_fastest_for_failed_entrant() {
        let mut laps = HashMap::new();
        laps.insert(1, vec![20_600, 20_900]);
        laps.insert(2, vec![20_500, 20_700]);
        let mut verdicts = HashMap::new();
        verdicts.insert(1, Some(true));
        verdicts.insert(2, Some(false));

        let grid = build_grid(1, GridPolicy::UseNextValid, &laps, &verdicts);
        assert_eq!(grid.grid[0].entrant_id, 1);
        assert_eq!(grid.grid[1].entrant_id, 2);
        assert_eq!(grid.grid[1].best_ms, Some(20_700));
    }

    #[test]
    fn exclude_drops_failed_entrant_entirely() {
        let mut laps = HashMap::new();
        laps.insert(1, vec![20_600, 20_900]);
        laps.insert(2, vec![20_500, 20_700]);
        let mut verdicts = HashMap::new();
        verdicts.insert(1, Some(true));
        verdicts.insert(2, Some(false));

        let grid = build_grid(1, GridPolicy::Exclude, &laps, &verdicts);
        assert_eq!(grid.grid.len(), 1);
        assert_eq!(grid.grid[0].entrant_id, 1);
    }
}
