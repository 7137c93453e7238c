use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Flag {
    #[serde(rename = "pre")]
    Pre,
    #[serde(rename = "green")]
    Green,
    #[serde(rename = "yellow")]
    Yellow,
    #[serde(rename = "red")]
    Red,
    #[serde(rename = "blue")]
    Blue,
    #[serde(rename = "white")]
    White,
    #[serde(rename = "checkered")]
    Checkered,
}

impl Flag {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pre" => Some(Self::Pre),
            "green" => Some(Self::Green),
            "yellow" => Some(Self::Yellow),
            "red" => Some(Self::Red),
            "blue" => Some(Self::Blue),
            "white" => Some(Self::White),
            "checkered" => Some(Self::Checkered),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RaceLimit {
    Time { value_s: f64, soft_end: bool, soft_end_timeout_s: f64 },
    Laps { value_laps: u32, soft_end: bool, soft_end_timeout_s: f64 },
}

/// Per-mode defaults, applied before any session-level override (session wins).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeConfig {
    pub limit: Option<RaceLimit>,
    pub min_lap_s: f64,
}

impl Default for ModeConfig {
    fn default() -> Self {
        ModeConfig { limit: None, min_lap_s: 5.0 }
    }
}

/// Everything the Race Engine owns about the current race, minus the
/// entrant roster (kept separately as a map in the engine actor's state).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceState {
    pub race_id: i64,
    pub race_type: String,
    pub flag: Flag,
    pub clock_ms: i64,
    pub running: bool,
    /// Wall reference the clock was last rebased against; only meaningful
    /// while `running`. Expressed in the same monotonic millisecond domain
    /// the engine actor samples its clock from.
    pub clock_start_monotonic_ms: i64,
    pub limit: Option<RaceLimit>,
    pub min_lap_s: f64,
    pub min_lap_dup_s: f64,
    pub white_window_begun: bool,
    pub white_set: bool,
    pub limit_reached: bool,
    pub checkered_flag_start_ms: Option<i64>,
    pub clock_ms_frozen: Option<i64>,
    pub sim_active: bool,
    pub sim_label: Option<String>,
}

impl RaceState {
    pub fn new(race_id: i64, race_type: String) -> Self {
        RaceState {
            race_id,
            race_type,
            flag: Flag::Pre,
            clock_ms: 0,
            running: false,
            clock_start_monotonic_ms: 0,
            limit: None,
            min_lap_s: 5.0,
            min_lap_dup_s: 1.0,
            white_window_begun: false,
            white_set: false,
            limit_reached: false,
            checkered_flag_start_ms: None,
            clock_ms_frozen: None,
            sim_active: false,
            sim_label: None,
        }
    }

    /// True while the race is inside the post-checkered grace window: the
    /// clock still advances and one more lap per entrant is still credited.
    pub fn in_soft_end_window(&self) -> bool {
        match (self.flag, self.checkered_flag_start_ms, self.limit) {
            (Flag::Checkered, Some(start), Some(limit)) => {
                let (soft_end, timeout_s) = match limit {
                    RaceLimit::Time { soft_end, soft_end_timeout_s, .. } => (soft_end, soft_end_timeout_s),
                    RaceLimit::Laps { soft_end, soft_end_timeout_s, .. } => (soft_end, soft_end_timeout_s),
                };
                soft_end && (self.clock_ms - start) < (timeout_s * 1000.0) as i64
            }
            _ => false,
        }
    }
}
