use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Source {
    #[serde(rename = "track")]
    Track,
    #[serde(rename = "pit_in")]
    PitIn,
    #[serde(rename = "pit_out")]
    PitOut,
}

/// The abstract tuple decoders are assumed to produce (§1): no wire
/// encoding is implied, just a tag-like string plus optional device info.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDetection {
    pub ts_recv_ms: i64,
    pub tag_raw: String,
    pub device_id: Option<String>,
    pub device_secs: Option<f64>,
}

/// A normalized pass, ready for the engine's ingest pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pass {
    pub tag: String,
    pub ts_recv_ms: i64,
    pub source: Source,
    pub device_id: Option<String>,
    pub device_secs: Option<f64>,
}

/// Why the normalizer dropped a raw detection instead of emitting a `Pass`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    TooFewDigits,
    DedupSuppressed,
    RateLimited,
}

/// Why `ingest_pass` did not credit a lap, when it didn't.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoCreditReason {
    UnknownTag,
    ProvisionalCap,
    Disabled,
    PitEvent,
    CheckeredFreeze,
    SoftEndCompleted,
    Baseline,
    Dup,
    MinLap,
}

/// The success envelope `ingest_pass` always returns; soft-failures are
/// structured data here, never `Err`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestOutcome {
    pub entrant_id: Option<i64>,
    pub lap_added: bool,
    pub reason: Option<NoCreditReason>,
}
