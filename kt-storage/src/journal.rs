//! C4 Journal + Checkpoint: append-only event log with batched writes and
//! periodic full-state checkpoints, grounded in the reference workspace's
//! inline-flush-on-threshold persistence style (`db::run_migrations`,
//! `db::queries::*`) but adapted to consume records the engine actor
//! forwards over an unbounded channel rather than being called directly.

use sqlx::sqlite::SqlitePool;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{error, warn};

use kt_contracts::{Checkpoint, JournalRecord};

use crate::error::StorageResult;

pub const DEFAULT_BATCH_MAX: usize = 50;
pub const DEFAULT_BATCH_MS: u64 = 200;

pub struct Journal {
    pool: SqlitePool,
    batch_max: usize,
    buffer: Vec<JournalRecord>,
}

impl Journal {
    pub fn new(pool: SqlitePool, batch_max: usize) -> Self {
        Journal { pool, batch_max, buffer: Vec::new() }
    }

    /// Non-blocking append to the in-memory buffer. Returns `true` if the
    /// batch threshold was crossed and a flush is now due.
    pub fn put(&mut self, record: JournalRecord) -> bool {
        self.buffer.push(record);
        self.buffer.len() >= self.batch_max
    }

    pub async fn force_flush(&mut self) -> StorageResult<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let records = std::mem::take(&mut self.buffer);
        let mut tx = self.pool.begin().await?;
        for record in &records {
            let payload = serde_json::to_string(&record.payload)?;
            let kind = serde_json::to_value(record.kind)?;
            let kind = kind.as_str().unwrap_or_default();
            sqlx::query(
                "INSERT INTO race_events (race_id, wall_ms, clock_ms, type, payload_json) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(record.race_id)
            .bind(record.wall_ms)
            .bind(record.clock_ms)
            .bind(kind)
            .bind(payload)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn checkpoint(&self, checkpoint: &Checkpoint) -> StorageResult<()> {
        let snapshot = serde_json::to_string(&checkpoint.snapshot)?;
        sqlx::query(
            "INSERT INTO race_checkpoints (race_id, wall_ms, clock_ms, snapshot_json) VALUES (?, ?, ?, ?)",
        )
        .bind(checkpoint.race_id)
        .bind(checkpoint.wall_ms)
        .bind(checkpoint.clock_ms)
        .bind(snapshot)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn latest_checkpoint(&self, race_id: i64) -> StorageResult<Option<(i64, i64, serde_json::Value)>> {
        let row: Option<(i64, i64, String)> = sqlx::query_as(
            "SELECT wall_ms, clock_ms, snapshot_json FROM race_checkpoints WHERE race_id = ? ORDER BY wall_ms DESC LIMIT 1",
        )
        .bind(race_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(match row {
            Some((wall_ms, clock_ms, snapshot_json)) => {
                Some((wall_ms, clock_ms, serde_json::from_str(&snapshot_json)?))
            }
            None => None,
        })
    }

    pub async fn events_since(&self, race_id: i64, wall_ms: i64) -> StorageResult<Vec<JournalRecord>> {
        use crate::models::RaceEventRow;
        let rows: Vec<RaceEventRow> = sqlx::query_as(
            "SELECT id, race_id, wall_ms, clock_ms, type, payload_json FROM race_events WHERE race_id = ? AND wall_ms >= ? ORDER BY id ASC",
        )
        .bind(race_id)
        .bind(wall_ms)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let kind = serde_json::from_value(serde_json::Value::String(row.kind))?;
                let payload = serde_json::from_str(&row.payload_json)?;
                Ok(JournalRecord { id: Some(row.id), race_id: row.race_id, wall_ms: row.wall_ms, clock_ms: row.clock_ms, kind, payload })
            })
            .collect()
    }
}

/// Drives the Journal off the channels the engine actor forwards into:
/// flush on a `batch_ms` timer or on crossing `batch_max`, whichever comes
/// first, and persist checkpoints as they arrive.
pub async fn run_writer(
    mut journal: Journal,
    mut records_rx: UnboundedReceiver<JournalRecord>,
    mut checkpoints_rx: UnboundedReceiver<Checkpoint>,
    batch_ms: u64,
) {
    let mut ticker = interval(Duration::from_millis(batch_ms.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            maybe_record = records_rx.recv() => {
                match maybe_record {
                    Some(record) => {
                        if journal.put(record) {
                            if let Err(err) = journal.force_flush().await {
                                error!(%err, "journal flush on batch threshold failed");
                            }
                        }
                    }
                    None => {
                        if let Err(err) = journal.force_flush().await {
                            error!(%err, "final journal flush failed");
                        }
                        break;
                    }
                }
            }
            maybe_checkpoint = checkpoints_rx.recv() => {
                match maybe_checkpoint {
                    Some(checkpoint) => {
                        if let Err(err) = journal.checkpoint(&checkpoint).await {
                            warn!(%err, "checkpoint write failed");
                        }
                    }
                    None => {}
                }
            }
            _ = ticker.tick() => {
                if let Err(err) = journal.force_flush().await {
                    error!(%err, "periodic journal flush failed");
                }
            }
        }
    }
}
