use thiserror::Error;

/// Errors the Race Engine's command surface can return.
///
/// Ingestion soft-failures (dup, min-lap, unknown tag, ...) are never
/// represented here — those are structured reasons carried in the success
/// envelope of `ingest_pass`, per the error handling design.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("invalid flag: {0}")]
    InvalidFlag(String),

    #[error("invalid entrant: {0}")]
    InvalidEntrant(String),

    #[error("invalid mode: {0}")]
    InvalidMode(String),

    #[error("entrant not found: {0}")]
    EntrantNotFound(i64),

    #[error("tag {tag:?} already held by enabled entrant {holder}")]
    TagConflict { tag: String, holder: i64 },

    #[error("state violation: {0}")]
    StateViolation(String),

    #[error("journal unavailable: {0}")]
    JournalUnavailable(String),

    #[error("required configuration missing: {0}")]
    ConfigMissing(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
