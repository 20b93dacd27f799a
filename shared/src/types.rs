//! Common types used across the platform

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Kinds of intermediate cold storage a milk lot can sit in
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ContainerKind {
    /// Cooler installed at a collection centre on a route
    BulkCooler,
    /// Tank on a supplier's farm
    OnFarmTank,
    /// Cans gathered along a route and loaded directly onto a vehicle
    CanCollection,
}

impl ContainerKind {
    pub const ALL: [ContainerKind; 3] = [
        ContainerKind::BulkCooler,
        ContainerKind::OnFarmTank,
        ContainerKind::CanCollection,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerKind::BulkCooler => "bulk_cooler",
            ContainerKind::OnFarmTank => "on_farm_tank",
            ContainerKind::CanCollection => "can_collection",
        }
    }

    /// On-farm tanks belong to a supplier, everything else to a route
    pub fn is_supplier_owned(&self) -> bool {
        matches!(self, ContainerKind::OnFarmTank)
    }
}

impl std::str::FromStr for ContainerKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bulk_cooler" => Ok(ContainerKind::BulkCooler),
            "on_farm_tank" => Ok(ContainerKind::OnFarmTank),
            "can_collection" => Ok(ContainerKind::CanCollection),
            other => Err(DomainError::validation(
                "source_type",
                format!(
                    "'{}' is not one of bulk_cooler, on_farm_tank, can_collection",
                    other
                ),
            )),
        }
    }
}

impl std::fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContainerKind::BulkCooler => write!(f, "Bulk Cooler"),
            ContainerKind::OnFarmTank => write!(f, "On-Farm Tank"),
            ContainerKind::CanCollection => write!(f, "Can Collection"),
        }
    }
}

/// Reference to the one container a lot (or transfer source) points at.
///
/// Holding the kind next to a single id makes "at most one of bulk cooler,
/// on-farm tank or can collection" a property of the type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct StorageRef {
    pub kind: ContainerKind,
    pub id: Uuid,
}

impl StorageRef {
    pub fn new(kind: ContainerKind, id: Uuid) -> Self {
        Self { kind, id }
    }

    /// Build a reference from the three legacy nullable foreign keys.
    ///
    /// Zero or several ids set is an exclusivity conflict.
    pub fn from_parts(
        bulk_cooler_id: Option<Uuid>,
        on_farm_tank_id: Option<Uuid>,
        can_collection_id: Option<Uuid>,
    ) -> Result<Self, DomainError> {
        let provided: Vec<StorageRef> = [
            bulk_cooler_id.map(|id| StorageRef::new(ContainerKind::BulkCooler, id)),
            on_farm_tank_id.map(|id| StorageRef::new(ContainerKind::OnFarmTank, id)),
            can_collection_id.map(|id| StorageRef::new(ContainerKind::CanCollection, id)),
        ]
        .into_iter()
        .flatten()
        .collect();

        match provided.as_slice() {
            [single] => Ok(*single),
            _ => Err(DomainError::ExclusivitySourceConflict {
                expected: None,
                provided: provided.iter().map(|r| r.kind.as_str().to_string()).collect(),
            }),
        }
    }
}

/// Date range for queries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateRange {
    pub start: chrono::NaiveDate,
    pub end: chrono::NaiveDate,
}

/// Round a monetary amount to 2 decimals, halves away from zero
pub fn round_currency(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
