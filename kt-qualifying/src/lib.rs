//! C6 Qualifying Grid Builder: turns a frozen qualifying session plus
//! brake-test verdicts into an ordered starting grid.

pub mod grid;
pub mod store;

pub use grid::build_grid;
pub use store::freeze_grid;
