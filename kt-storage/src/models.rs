use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct EntrantRow {
    pub entrant_id: i64,
    pub number: Option<String>,
    pub name: String,
    pub tag: Option<String>,
    pub enabled: bool,
    pub status: String,
    pub organization: Option<String>,
    pub spoken_name: Option<String>,
    pub color: Option<String>,
    pub logo: Option<String>,
    pub updated_at: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RaceEventRow {
    pub id: i64,
    pub race_id: i64,
    pub wall_ms: i64,
    pub clock_ms: i64,
    #[sqlx(rename = "type")]
    pub kind: String,
    pub payload_json: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RaceCheckpointRow {
    pub id: i64,
    pub race_id: i64,
    pub wall_ms: i64,
    pub clock_ms: i64,
    pub snapshot_json: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ResultMetaRow {
    pub race_id: i64,
    pub race_type: String,
    pub frozen_utc: String,
    pub duration_ms: i64,
    pub clock_ms_frozen: Option<i64>,
    pub event_label: Option<String>,
    pub session_label: Option<String>,
    pub race_mode: Option<String>,
    pub frozen_iso_utc: Option<String>,
    pub frozen_iso_local: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ResultStandingRow {
    pub race_id: i64,
    pub position: i64,
    pub entrant_id: i64,
    pub number: Option<String>,
    pub name: String,
    pub tag: Option<String>,
    pub laps: i64,
    pub last_ms: Option<i64>,
    pub best_ms: Option<i64>,
    pub gap_ms: i64,
    pub lap_deficit: i64,
    pub pit_count: i64,
    pub status: String,
    pub grid_index: Option<i64>,
    pub brake_valid: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ResultLapRow {
    pub race_id: i64,
    pub entrant_id: i64,
    pub lap_no: i64,
    pub lap_ms: i64,
    pub pass_ts_ns: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BrakeFlagRow {
    pub race_id: i64,
    pub entrant_id: i64,
    pub verdict: Option<bool>,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct QualConfigRow {
    pub race_id: i64,
    pub source_heat_id: i64,
    pub policy: String,
    pub grid_json: String,
    pub frozen_utc: String,
}
