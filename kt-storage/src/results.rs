//! C5 Results Freezer: derives immutable `result_*` rows from a finished
//! race's snapshot, grounded in `backend/results.py`'s `persist_results`
//! idempotency check and seconds→ms rounding convention.

use sqlx::sqlite::SqlitePool;

use kt_contracts::{FrozenResult, StandingRow};

use crate::error::StorageResult;

fn to_ms_rounded(seconds: f64) -> i64 {
    (seconds * 1000.0).round() as i64
}

/// Writes `result_meta` / `result_standings` / `result_laps` for a race
/// that just reached its final frozen state. Idempotent: if `result_meta`
/// already exists for `race_id`, this is a silent no-op (§4.5, §7).
pub async fn freeze(pool: &SqlitePool, result: &FrozenResult) -> StorageResult<bool> {
    let exists: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM result_meta WHERE race_id = ?")
        .bind(result.race_id)
        .fetch_optional(pool)
        .await?;
    if exists.is_some() {
        return Ok(false);
    }

    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO result_meta (race_id, race_type, frozen_utc, duration_ms, clock_ms_frozen) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(result.race_id)
    .bind(&result.race_type)
    .bind(&result.frozen_utc)
    .bind(result.duration_ms)
    .bind(result.clock_ms_frozen)
    .execute(&mut *tx)
    .await?;

    for row in &result.standings {
        insert_standing(&mut tx, result.race_id, row).await?;
    }

    for (entrant_id, laps_ms) in &result.laps {
        for (i, lap_ms) in laps_ms.iter().enumerate() {
            sqlx::query(
                "INSERT INTO result_laps (race_id, entrant_id, lap_no, lap_ms) VALUES (?, ?, ?, ?)",
            )
            .bind(result.race_id)
            .bind(entrant_id)
            .bind((i + 1) as i64)
            .bind(lap_ms)
            .execute(&mut *tx)
            .await?;
        }
    }

    tx.commit().await?;
    Ok(true)
}

async fn insert_standing(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    race_id: i64,
    row: &StandingRow,
) -> StorageResult<()> {
    sqlx::query(
        "INSERT INTO result_standings \
         (race_id, position, entrant_id, number, name, tag, laps, last_ms, best_ms, gap_ms, lap_deficit, pit_count, status, grid_index, brake_valid) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(race_id)
    .bind(row.position as i64)
    .bind(row.entrant_id)
    .bind(&row.number)
    .bind(&row.name)
    .bind(&row.tag)
    .bind(row.laps as i64)
    .bind(row.last_ms)
    .bind(row.best_ms)
    .bind(row.gap_ms)
    .bind(row.lap_deficit as i64)
    .bind(row.pit_count as i64)
    .bind(&row.status)
    .bind(row.grid_index.map(|g| g as i64))
    .bind(row.brake_valid)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Reconstructs per-entrant lap durations (ms) from a sequence of credit
/// timestamps on the race clock, matching the engine's `delta_s` definition.
pub fn lap_durations_ms(credit_clock_ms: &[i64]) -> Vec<i64> {
    credit_clock_ms
        .windows(2)
        .map(|w| w[1] - w[0])
        .collect()
}

pub fn seconds_to_ms(seconds: f64) -> i64 {
    to_ms_rounded(seconds)
}
