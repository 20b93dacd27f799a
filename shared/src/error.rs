//! Domain rule violations raised by the milk tracking rules engine

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::types::ContainerKind;

/// A rejected domain operation.
///
/// Every variant carries the ids and values a caller needs to render a precise
/// message; the enum serializes as `{ "error": ..., ...fields }`.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum DomainError {
    #[error("no active pricing policy for route {route_id:?} (supplier {supplier_id})")]
    ConfigMissing {
        route_id: Option<Uuid>,
        supplier_id: Uuid,
    },

    #[error(
        "container {container_id} would overflow: capacity {capacity} L, current {current} L, attempted +{attempted} L"
    )]
    CapacityExceeded {
        container_id: Uuid,
        capacity: Decimal,
        current: Decimal,
        attempted: Decimal,
    },

    #[error(
        "silo {silo_id} would overflow: capacity {capacity} L, current {current} L, attempted +{attempted} L"
    )]
    SiloCapacityExceeded {
        silo_id: Uuid,
        capacity: Decimal,
        current: Decimal,
        attempted: Decimal,
    },

    #[error("milk lot {lot_id} is already assigned to container {container_id}")]
    AlreadyAssigned { lot_id: Uuid, container_id: Uuid },

    #[error("exactly one source must be given (expected {expected:?}, got {provided:?})")]
    ExclusivitySourceConflict {
        expected: Option<String>,
        provided: Vec<String>,
    },

    #[error("silo {silo_id} belongs to plant {silo_plant_id}, transfer is bound for plant {destination_plant_id}")]
    SiloOutsideDestination {
        silo_id: Uuid,
        silo_plant_id: Uuid,
        destination_plant_id: Uuid,
    },

    #[error("container {container_id} already has open transfer {existing_transfer_id:?}")]
    DuplicateOpenTransfer {
        container_id: Uuid,
        existing_transfer_id: Option<Uuid>,
    },

    #[error("container {container_id} holds {volume} L, nothing to transfer")]
    NonPositiveVolume { container_id: Uuid, volume: Decimal },

    #[error("{entity} {id} not found")]
    NotFound { entity: String, id: Uuid },

    #[error("container {container_id} was emptied at {emptied_at} and no longer accepts milk")]
    ContainerRetired {
        container_id: Uuid,
        emptied_at: DateTime<Utc>,
    },

    #[error("{entity} cannot move from {from} to {to}")]
    InvalidStatusTransition {
        entity: String,
        from: String,
        to: String,
    },

    #[error("composite sample {sample_id} is already {current}, cannot record {requested}")]
    VerdictAlreadyFinal {
        sample_id: Uuid,
        current: String,
        requested: String,
    },

    #[error("milk lot {lot_id} was rejected and cannot be re-graded")]
    LotAlreadyRejected { lot_id: Uuid },

    #[error("{kind} {container_id} failed hygiene check: {detail}")]
    HygieneCheckFailed {
        kind: ContainerKind,
        container_id: Uuid,
        detail: String,
        overridable: bool,
    },

    #[error("{kind} '{name}' already has an instance opened on {date}")]
    DuplicateCycle {
        kind: ContainerKind,
        name: String,
        date: NaiveDate,
    },

    #[error("no approved milk lots for supplier {supplier_id} on {date}")]
    NothingToBill { supplier_id: Uuid, date: NaiveDate },

    #[error("invalid {field}: {message}")]
    Validation { field: String, message: String },
}

impl DomainError {
    pub fn not_found(entity: &str, id: Uuid) -> Self {
        DomainError::NotFound {
            entity: entity.to_string(),
            id,
        }
    }

    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        DomainError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// Stable machine-readable code for the error kind
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::ConfigMissing { .. } => "CONFIG_MISSING",
            DomainError::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            DomainError::SiloCapacityExceeded { .. } => "SILO_CAPACITY_EXCEEDED",
            DomainError::AlreadyAssigned { .. } => "ALREADY_ASSIGNED",
            DomainError::ExclusivitySourceConflict { .. } => "EXCLUSIVITY_SOURCE_CONFLICT",
            DomainError::SiloOutsideDestination { .. } => "SILO_OUTSIDE_DESTINATION",
            DomainError::DuplicateOpenTransfer { .. } => "DUPLICATE_OPEN_TRANSFER",
            DomainError::NonPositiveVolume { .. } => "NON_POSITIVE_VOLUME",
            DomainError::NotFound { .. } => "NOT_FOUND",
            DomainError::ContainerRetired { .. } => "CONTAINER_RETIRED",
            DomainError::InvalidStatusTransition { .. } => "INVALID_STATUS_TRANSITION",
            DomainError::VerdictAlreadyFinal { .. } => "VERDICT_ALREADY_FINAL",
            DomainError::LotAlreadyRejected { .. } => "LOT_ALREADY_REJECTED",
            DomainError::HygieneCheckFailed { .. } => "HYGIENE_CHECK_FAILED",
            DomainError::DuplicateCycle { .. } => "DUPLICATE_CYCLE",
            DomainError::NothingToBill { .. } => "NOTHING_TO_BILL",
            DomainError::Validation { .. } => "VALIDATION_ERROR",
        }
    }
}

pub type DomainResult<T> = Result<T, DomainError>;
