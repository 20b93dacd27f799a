//! Shared types and rules for the Raw Milk Tracking Platform
//!
//! This crate holds the pure domain model: lot grading and pricing, container
//! admission, composite-sample verdicts, the transfer state machine and silo
//! reconciliation. It is used by the backend and by the WASM calculator.

pub mod error;
pub mod models;
pub mod types;
pub mod validation;

pub use error::*;
pub use models::*;
pub use types::*;
pub use validation::*;
