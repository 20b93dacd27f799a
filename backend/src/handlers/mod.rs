//! HTTP handlers for the Raw Milk Tracking Platform

mod billing;
mod container;
mod health;
mod lot;
mod pricing;
mod reference;
mod sample;
mod silo;
mod transfer;

pub use billing::*;
pub use container::*;
pub use health::*;
pub use lot::*;
pub use pricing::*;
pub use reference::*;
pub use sample::*;
pub use silo::*;
pub use transfer::*;
