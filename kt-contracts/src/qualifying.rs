use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridPolicy {
    Demote,
    UseNextValid,
    Exclude,
}

impl GridPolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "demote" => Some(Self::Demote),
            "use_next_valid" => Some(Self::UseNextValid),
            "exclude" => Some(Self::Exclude),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridRow {
    pub entrant_id: i64,
    pub best_ms: Option<i64>,
    pub brake_ok: bool,
    pub order: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualifyingGrid {
    pub source_heat_id: i64,
    pub policy: GridPolicy,
    pub grid: Vec<GridRow>,
}
