use std::collections::HashMap;

use kt_contracts::{GridPolicy, QualifyingGrid};
use kt_storage::StorageResult;

use crate::grid::build_grid;

/// Freezes a qualifying session into a starting grid and persists it under
/// `qual_config`, grounded in `backend/qualifying.py`'s event-config
/// `qualifying` key.
pub async fn freeze_grid(
    pool: &sqlx::SqlitePool,
    race_id: i64,
    source_heat_id: i64,
    policy: GridPolicy,
    laps_ms: &HashMap<i64, Vec<i64>>,
    now_ms: i64,
) -> StorageResult<QualifyingGrid> {
    let verdicts = kt_storage::brake::get_verdicts(pool, race_id).await?;
    let grid = build_grid(source_heat_id, policy, laps_ms, &verdicts);

    let grid_json = serde_json::to_string(&grid)?;
    let frozen_utc = chrono::DateTime::from_timestamp_millis(now_ms)
        .unwrap_or_default()
        .to_rfc3339();
    let policy_str = serde_json::to_value(policy)?.as_str().unwrap_or_default().to_string();

    sqlx::query(
        "INSERT INTO qual_config (race_id, source_heat_id, policy, grid_json, frozen_utc) VALUES (?, ?, ?, ?, ?) \
         ON CONFLICT(race_id) DO UPDATE SET source_heat_id = excluded.source_heat_id, policy = excluded.policy, grid_json = excluded.grid_json, frozen_utc = excluded.frozen_utc",
    )
    .bind(race_id)
    .bind(source_heat_id)
    .bind(policy_str)
    .bind(grid_json)
    .bind(frozen_utc)
    .execute(pool)
    .await?;

    Ok(grid)
}
