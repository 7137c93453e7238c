//! Durable brake-test verdict store backing the Qualifying Grid Builder
//! (§4.6), grounded in `backend/qualifying.py`'s `set_brake_flag` /
//! `get_brake_flags` sub-API.

use sqlx::sqlite::SqlitePool;

use crate::error::StorageResult;

pub async fn set_verdict(pool: &SqlitePool, race_id: i64, entrant_id: i64, verdict: Option<bool>, now_ms: i64) -> StorageResult<()> {
    sqlx::query(
        "INSERT INTO brake_flags (race_id, entrant_id, verdict, updated_at) VALUES (?, ?, ?, ?) \
         ON CONFLICT(race_id, entrant_id) DO UPDATE SET verdict = excluded.verdict, updated_at = excluded.updated_at",
    )
    .bind(race_id)
    .bind(entrant_id)
    .bind(verdict)
    .bind(now_ms)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn clear_verdict(pool: &SqlitePool, race_id: i64, entrant_id: i64) -> StorageResult<()> {
    sqlx::query("DELETE FROM brake_flags WHERE race_id = ? AND entrant_id = ?")
        .bind(race_id)
        .bind(entrant_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn get_verdicts(pool: &SqlitePool, race_id: i64) -> StorageResult<std::collections::HashMap<i64, Option<bool>>> {
    use crate::models::BrakeFlagRow;
    let rows: Vec<BrakeFlagRow> = sqlx::query_as(
        "SELECT race_id, entrant_id, verdict, updated_at FROM brake_flags WHERE race_id = ?",
    )
    .bind(race_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|r| (r.entrant_id, r.verdict)).collect())
}
