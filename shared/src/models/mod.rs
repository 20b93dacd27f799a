//! Domain models and rules for raw milk tracking

mod billing;
mod container;
mod lot;
mod pricing;
mod sample;
mod silo;
mod transfer;

pub use billing::*;
pub use container::*;
pub use lot::*;
pub use pricing::*;
pub use sample::*;
pub use silo::*;
pub use transfer::*;
