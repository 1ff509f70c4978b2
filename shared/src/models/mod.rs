//! Domain models for the Stock Back Office

mod catalog;
mod movement;

pub use catalog::*;
pub use movement::*;
