use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalRecordType {
    FlagChange,
    Pass,
    EntrantEnable,
    EntrantStatus,
    AssignTag,
}

/// A single append-only journal entry. `id` is assigned by the store on
/// write, so it is `None` for records not yet persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalRecord {
    pub id: Option<i64>,
    pub race_id: i64,
    pub wall_ms: i64,
    pub clock_ms: i64,
    #[serde(rename = "type")]
    pub kind: JournalRecordType,
    pub payload: serde_json::Value,
}

/// A full-state dump sufficient to reconstruct live standings after an
/// unclean shutdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub race_id: i64,
    pub wall_ms: i64,
    pub clock_ms: i64,
    pub snapshot: serde_json::Value,
}
