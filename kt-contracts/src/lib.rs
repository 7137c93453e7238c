//! Shared domain types for the karting race-timing core.
//!
//! This crate carries no behavior beyond small constructors and invariant
//! helpers — the Race Engine, Journal, and Qualifying Grid Builder each own
//! the logic that operates on these types.

pub mod entrant;
pub mod error;
pub mod journal;
pub mod pass;
pub mod qualifying;
pub mod race;
pub mod result;

pub use entrant::{Entrant, EntrantInput, EntrantStatus, PACE_BUFFER_LEN};
pub use error::{EngineError, EngineResult};
pub use journal::{Checkpoint, JournalRecord, JournalRecordType};
pub use pass::{IngestOutcome, NoCreditReason, Pass, RawDetection, RejectReason, Source};
pub use qualifying::{GridPolicy, GridRow, QualifyingGrid};
pub use race::{Flag, ModeConfig, RaceLimit, RaceState};
pub use result::{FrozenResult, LimitView, RaceSnapshot, StandingRow};
