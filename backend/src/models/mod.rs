//! Database models for the Raw Milk Tracking Platform
//!
//! Re-exports models from the shared crate and adds the row types the
//! services read from PostgreSQL

mod rows;

pub use rows::*;
pub use shared::models::*;
pub use shared::types::{ContainerKind, StorageRef};
