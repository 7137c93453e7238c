//! C1 Pass Normalizer and C2 Source Router: the two pure/stateful stages
//! that turn raw decoder output into typed `Pass` events before they
//! reach the Race Engine.

pub mod normalizer;
pub mod router;

pub use normalizer::{Normalizer, NormalizerCounters, DEFAULT_DEDUP_WINDOW_MS, DEFAULT_MIN_TAG_LEN};
pub use router::SourceRouter;
