use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single row of a live or frozen standings table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandingRow {
    pub position: u32,
    pub entrant_id: i64,
    pub number: Option<String>,
    pub name: String,
    pub tag: Option<String>,
    pub laps: u32,
    pub last_ms: Option<i64>,
    pub best_ms: Option<i64>,
    pub gap_ms: i64,
    pub lap_deficit: u32,
    pub pit_count: u32,
    pub status: String,
    pub grid_index: Option<u32>,
    pub brake_valid: Option<bool>,
}

/// What `snapshot()` returns: a read-only view of the live race.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceSnapshot {
    pub race_id: i64,
    pub race_type: String,
    pub flag: crate::race::Flag,
    pub clock_ms: i64,
    pub running: bool,
    pub standings: Vec<StandingRow>,
    pub sim_active: bool,
    pub sim_label: Option<String>,
    pub limit: Option<LimitView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitView {
    pub kind: &'static str,
    pub value: f64,
    pub remaining_ms: Option<i64>,
}

/// The immutable per-race output written once at freeze time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrozenResult {
    pub race_id: i64,
    pub race_type: String,
    pub frozen_utc: String,
    pub duration_ms: i64,
    pub clock_ms_frozen: i64,
    pub standings: Vec<StandingRow>,
    pub laps: BTreeMap<i64, Vec<i64>>,
}
