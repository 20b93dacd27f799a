//! Milk transfers from a storage container to a plant silo

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{CompositeSample, SampleType, Silo, Verdict};
use crate::error::{DomainError, DomainResult};
use crate::types::{ContainerKind, StorageRef};

/// Movement of one container's full contents via a vehicle into a silo
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MilkTransfer {
    pub id: Uuid,
    pub source: StorageRef,
    pub vehicle_id: Option<Uuid>,
    /// Receiving plant; fixed once a silo is attached
    pub destination_plant_id: Option<Uuid>,
    pub silo_id: Option<Uuid>,
    pub status: TransferStatus,
    /// Volume of the source at creation, never updated
    pub total_volume_liters: Decimal,
    pub departed_at: Option<DateTime<Utc>>,
    pub arrival_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub weights: WeightCapture,
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Tanker weighbridge readings
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct WeightCapture {
    pub departure_weight_kg: Option<Decimal>,
    pub arrival_weight_kg: Option<Decimal>,
}

impl WeightCapture {
    /// Weight lost in transit, when both readings exist
    pub fn shrinkage_kg(&self) -> Option<Decimal> {
        match (self.departure_weight_kg, self.arrival_weight_kg) {
            (Some(departed), Some(arrived)) => Some(departed - arrived),
            _ => None,
        }
    }

    /// Overlay newly captured readings, keeping earlier ones not re-sent
    pub fn merge(self, newer: WeightCapture) -> WeightCapture {
        WeightCapture {
            departure_weight_kg: newer.departure_weight_kg.or(self.departure_weight_kg),
            arrival_weight_kg: newer.arrival_weight_kg.or(self.arrival_weight_kg),
        }
    }
}

/// Transfer lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Scheduled,
    InTransit,
    Completed,
    Cancelled,
}

impl TransferStatus {
    /// Statuses that hold the source container
    pub const OPEN: [TransferStatus; 2] = [TransferStatus::Scheduled, TransferStatus::InTransit];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Scheduled => "scheduled",
            TransferStatus::InTransit => "in_transit",
            TransferStatus::Completed => "completed",
            TransferStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_open(&self) -> bool {
        Self::OPEN.contains(self)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_open()
    }

    /// Allowed moves: scheduled → in_transit → completed, scheduled → completed,
    /// and any open status → cancelled
    pub fn can_transition_to(&self, next: TransferStatus) -> bool {
        use TransferStatus::*;
        matches!(
            (self, next),
            (Scheduled, InTransit)
                | (Scheduled, Completed)
                | (InTransit, Completed)
                | (Scheduled, Cancelled)
                | (InTransit, Cancelled)
        )
    }

    pub fn transition_to(&self, next: TransferStatus) -> DomainResult<TransferStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(DomainError::InvalidStatusTransition {
                entity: "milk transfer".to_string(),
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

impl std::str::FromStr for TransferStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(TransferStatus::Scheduled),
            "in_transit" => Ok(TransferStatus::InTransit),
            "completed" => Ok(TransferStatus::Completed),
            "cancelled" => Ok(TransferStatus::Cancelled),
            other => Err(DomainError::validation(
                "status",
                format!("unknown transfer status '{}'", other),
            )),
        }
    }
}

impl std::fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the coordinator knows about a source container when creating a transfer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceSnapshot {
    pub storage: StorageRef,
    pub current_volume_liters: Decimal,
    /// Open transfer already holding this container, if any
    pub open_transfer_id: Option<Uuid>,
}

/// A destination silo and the liters its open transfers already claim
#[derive(Debug, Clone, Copy)]
pub struct SiloBooking<'a> {
    pub silo: &'a Silo,
    pub booked_liters: Decimal,
}

impl<'a> SiloBooking<'a> {
    pub fn new(silo: &'a Silo, booked_liters: Decimal) -> Self {
        Self {
            silo,
            booked_liters,
        }
    }

    pub fn ensure_room_for(&self, volume: Decimal) -> DomainResult<()> {
        self.silo.ensure_room_after_bookings(self.booked_liters, volume)
    }
}

/// Validate a new transfer and return the volume snapshot it will carry.
///
/// Checks run in order: declared kind matches the container, no open
/// transfer on the container, positive volume, then silo headroom net of
/// open transfers already bound for that silo.
pub fn validate_new_transfer(
    declared: ContainerKind,
    source: &SourceSnapshot,
    destination: Option<SiloBooking<'_>>,
) -> DomainResult<Decimal> {
    if declared != source.storage.kind {
        return Err(DomainError::ExclusivitySourceConflict {
            expected: Some(declared.as_str().to_string()),
            provided: vec![source.storage.kind.as_str().to_string()],
        });
    }

    if let Some(existing) = source.open_transfer_id {
        return Err(DomainError::DuplicateOpenTransfer {
            container_id: source.storage.id,
            existing_transfer_id: Some(existing),
        });
    }

    let volume = source.current_volume_liters;
    if volume <= Decimal::ZERO {
        return Err(DomainError::NonPositiveVolume {
            container_id: source.storage.id,
            volume,
        });
    }

    if let Some(booking) = destination {
        booking.ensure_room_for(volume)?;
    }

    Ok(volume)
}

/// Plant a transfer ends up bound for once `silo` is attached.
///
/// A transfer with no destination takes the silo's plant; otherwise the silo
/// must belong to the destination plant.
pub fn resolve_destination(destination_plant_id: Option<Uuid>, silo: &Silo) -> DomainResult<Uuid> {
    match destination_plant_id {
        Some(plant_id) if plant_id != silo.plant_id => Err(DomainError::SiloOutsideDestination {
            silo_id: silo.id,
            silo_plant_id: silo.plant_id,
            destination_plant_id: plant_id,
        }),
        _ => Ok(silo.plant_id),
    }
}

/// Instant-gate release window after a transfer's arrival
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateWindow {
    pub after_arrival: Duration,
}

impl Default for GateWindow {
    fn default() -> Self {
        Self {
            after_arrival: Duration::hours(2),
        }
    }
}

impl GateWindow {
    pub fn hours(hours: i64) -> Self {
        Self {
            after_arrival: Duration::hours(hours),
        }
    }

    pub fn contains(&self, arrival_at: DateTime<Utc>, collected_at: DateTime<Utc>) -> bool {
        collected_at >= arrival_at && collected_at <= arrival_at + self.after_arrival
    }
}

/// Whether a sample on its own clears a transfer for silo release
pub fn sample_releases(
    transfer: &MilkTransfer,
    sample: &CompositeSample,
    window: &GateWindow,
) -> bool {
    let (Some(vehicle_id), Some(arrival_at)) = (transfer.vehicle_id, transfer.arrival_at) else {
        return false;
    };

    sample.sample_type == SampleType::InstantGate
        && sample.verdict == Verdict::Approved
        && sample.source.vehicle_id() == Some(vehicle_id)
        && window.contains(arrival_at, sample.collected_at)
}

/// A transfer may be released into a silo once an approved gate test on its
/// vehicle was collected within the window after arrival
pub fn is_gate_released(
    transfer: &MilkTransfer,
    samples: &[CompositeSample],
    window: &GateWindow,
) -> bool {
    samples.iter().any(|s| sample_releases(transfer, s, window))
}

impl MilkTransfer {
    pub fn source_type(&self) -> ContainerKind {
        self.source.kind
    }

    pub fn shrinkage_kg(&self) -> Option<Decimal> {
        self.weights.shrinkage_kg()
    }
}
