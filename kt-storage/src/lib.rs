//! C4 Journal + Checkpoint and C5 Results Freezer: the durable half of
//! the race-timing core.

pub mod brake;
pub mod db;
pub mod error;
pub mod journal;
pub mod models;
pub mod results;

pub use error::{StorageError, StorageResult};
pub use journal::{run_writer, Journal, DEFAULT_BATCH_MAX, DEFAULT_BATCH_MS};

#[cfg(test)]
mod tests {
    use super::*;
    use kt_contracts::{Checkpoint, JournalRecord, JournalRecordType};

    async fn test_pool() -> sqlx::SqlitePool {
        let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
        db::run_migrations(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn journal_flushes_on_threshold_and_latest_checkpoint_round_trips() {
        let pool = test_pool().await;
        let mut journal = Journal::new(pool.clone(), 2);

        let rec = |wall_ms: i64| JournalRecord {
            id: None,
            race_id: 1,
            wall_ms,
            clock_ms: wall_ms,
            kind: JournalRecordType::FlagChange,
            payload: serde_json::json!({"flag": "green"}),
        };

        assert!(!journal.put(rec(0)));
        assert!(journal.put(rec(1)));
        journal.force_flush().await.unwrap();

        let events = journal.events_since(1, 0).await.unwrap();
        assert_eq!(events.len(), 2);

        let checkpoint = Checkpoint { race_id: 1, wall_ms: 5, clock_ms: 5_000, snapshot: serde_json::json!({"ok": true}) };
        journal.checkpoint(&checkpoint).await.unwrap();
        let (wall_ms, clock_ms, snapshot) = journal.latest_checkpoint(1).await.unwrap().unwrap();
        assert_eq!(wall_ms, 5);
        assert_eq!(clock_ms, 5_000);
        assert_eq!(snapshot, serde_json::json!({"ok": true}));
    }

    #[tokio::test]
    async fn freeze_is_idempotent() {
        let pool = test_pool().await;
        let result = kt_contracts::FrozenResult {
            race_id: 42,
            race_type: "sprint".into(),
            frozen_utc: "2026-01-01T00:00:00Z".into(),
            duration_ms: 180_000,
            clock_ms_frozen: 180_000,
            standings: vec![],
            laps: Default::default(),
        };
        assert!(results::freeze(&pool, &result).await.unwrap());
        assert!(!results::freeze(&pool, &result).await.unwrap());

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM result_meta WHERE race_id = ?")
            .bind(42)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count.0, 1);
    }
}
