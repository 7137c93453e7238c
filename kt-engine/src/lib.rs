//! C3 Race Engine: the single authority over live race state, reached
//! exclusively through the actor in [`actor`].

pub mod actor;
pub mod engine;
pub mod processor;

pub use actor::{spawn, EngineHandle, CHECKPOINT_INTERVAL_MS};
pub use engine::{RaceEngine, PROVISIONAL_CAP};
