//! Business logic services for the Raw Milk Tracking Platform

pub mod billing;
pub mod container;
pub mod events;
pub mod grading;
pub mod lot;
pub mod pricing;
pub mod reference;
pub mod sample;
pub mod silo;
pub mod transfer;

pub use billing::BillingService;
pub use container::ContainerService;
pub use events::EventPublisher;
pub use grading::GradingService;
pub use lot::LotService;
pub use pricing::PricingService;
pub use reference::ReferenceService;
pub use sample::SampleService;
pub use silo::SiloService;
pub use transfer::TransferService;
