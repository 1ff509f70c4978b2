//! Shared types and models for the Stock Back Office
//!
//! This crate contains the domain models, pagination types and the pure
//! stock-ledger rules used by the backend. It performs no I/O.

pub mod ledger;
pub mod models;
pub mod types;
pub mod validation;

pub use ledger::*;
pub use models::*;
pub use types::*;
pub use validation::*;
