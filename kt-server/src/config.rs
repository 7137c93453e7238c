//! Configuration keys the engine reads (§6), loaded from a single merged
//! JSON document via `serde_json` — the teacher workspace carries no
//! dedicated config crate, so neither does this one; `clap` supplies the
//! document's path.

use std::collections::HashMap;

use kt_contracts::{EngineError, EngineResult, ModeConfig, RaceLimit};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    pub sqlite_path: String,
    #[serde(default)]
    pub recreate_on_boot: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_batch_ms")]
    pub batch_ms: u64,
    #[serde(default = "default_batch_max")]
    pub batch_max: usize,
    #[serde(default)]
    pub fsync: bool,
    #[serde(default = "default_checkpoint_s")]
    pub checkpoint_s: u64,
}

fn default_true() -> bool {
    true
}
fn default_batch_ms() -> u64 {
    200
}
fn default_batch_max() -> usize {
    50
}
fn default_checkpoint_s() -> u64 {
    15
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_min_lap_s")]
    pub min_lap_s: f64,
    #[serde(default = "default_min_lap_dup_s", rename = "min_lap_s_dup")]
    pub min_lap_dup_s: f64,
}

fn default_min_lap_s() -> f64 {
    5.0
}
fn default_min_lap_dup_s() -> f64 {
    1.0
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct FeaturesConfig {
    #[serde(default)]
    pub pit_timing: bool,
    #[serde(default)]
    pub auto_provisional: bool,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ReceiversConfig {
    #[serde(default)]
    pub pit_in: Vec<String>,
    #[serde(default)]
    pub pit_out: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct PitsConfig {
    #[serde(default)]
    pub receivers: ReceiversConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub timing: Option<TimingConfig>,
    #[serde(default)]
    pub features: FeaturesConfig,
    #[serde(default)]
    pub pits: PitsConfig,
    #[serde(default)]
    pub modes: HashMap<String, ModeDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModeDefinition {
    pub limit: Option<RaceLimit>,
    #[serde(default = "default_min_lap_s")]
    pub min_lap_s: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct AppDocument {
    app: EngineConfig,
}

impl EngineConfig {
    pub fn load(path: &str) -> EngineResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| EngineError::ConfigMissing(format!("reading {path}: {e}")))?;
        let doc: AppDocument = serde_json::from_str(&raw)
            .map_err(|e| EngineError::ConfigMissing(format!("parsing {path}: {e}")))?;
        Ok(doc.app)
    }

    pub fn mode_config(&self, name: &str) -> ModeConfig {
        match self.modes.get(name) {
            Some(def) => ModeConfig { limit: def.limit, min_lap_s: def.min_lap_s },
            None => ModeConfig::default(),
        }
    }
}
