//! Milk lot models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;
use crate::types::StorageRef;

/// One supplier pickup of raw milk (typically a 50 L can)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MilkLot {
    pub id: Uuid,
    pub supplier_id: Uuid,
    pub tester_name: Option<String>,
    pub volume_liters: Decimal,
    pub measurements: LabMeasurements,
    pub status: LotStatus,
    pub price_per_liter: Option<Decimal>,
    pub total_price: Option<Decimal>,
    /// Pricing policy version the current price was computed with
    pub pricing_policy_id: Option<Uuid>,
    /// Container the lot has been poured into, if any
    pub storage: Option<StorageRef>,
    pub bill_id: Option<Uuid>,
    pub collected_on: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Lab results taken at collection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LabMeasurements {
    pub fat_percent: Decimal,
    pub protein_percent: Decimal,
    pub lactose_percent: Decimal,
    pub total_solids_percent: Decimal,
    /// Solids-not-fat
    pub snf_percent: Decimal,
    /// Milk urea nitrogen, mg/dL
    pub urea_nitrogen: Decimal,
    /// Bacteria per mL
    pub bacterial_count: i64,
    #[serde(default)]
    pub added_water_percent: Decimal,
}

/// Quality status of a milk lot
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum LotStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl LotStatus {
    pub const ALL: [LotStatus; 3] = [LotStatus::Pending, LotStatus::Approved, LotStatus::Rejected];

    pub fn as_str(&self) -> &'static str {
        match self {
            LotStatus::Pending => "pending",
            LotStatus::Approved => "approved",
            LotStatus::Rejected => "rejected",
        }
    }
}

impl std::str::FromStr for LotStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(LotStatus::Pending),
            "approved" => Ok(LotStatus::Approved),
            "rejected" => Ok(LotStatus::Rejected),
            other => Err(DomainError::validation(
                "status",
                format!("unknown lot status '{}'", other),
            )),
        }
    }
}

impl std::fmt::Display for LotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl MilkLot {
    pub fn is_graded(&self) -> bool {
        self.price_per_liter.is_some()
    }
}
