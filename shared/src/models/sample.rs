//! Composite samples and verdict propagation rules

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{LotStatus, MilkLot};
use crate::error::{DomainError, DomainResult};
use crate::types::{ContainerKind, StorageRef};

/// Lab sample drawn from a container or from a vehicle at the plant gate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeSample {
    pub id: Uuid,
    pub source: SampleSource,
    pub sample_type: SampleType,
    pub sample_volume_ml: i32,
    pub temperature_celsius: Decimal,
    /// Stir state of the source container when drawn
    pub is_stirred: Option<bool>,
    pub collected_at: DateTime<Utc>,
    pub received_at_lab: Option<DateTime<Utc>>,
    pub results: SampleResults,
    pub verdict: Verdict,
    pub remark: Option<String>,
}

/// Where a sample was drawn
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SampleSource {
    Container { storage: StorageRef },
    Vehicle { vehicle_id: Uuid },
}

impl SampleSource {
    /// Resolve the four optional ids of a create request to one source
    pub fn from_parts(
        bulk_cooler_id: Option<Uuid>,
        on_farm_tank_id: Option<Uuid>,
        can_collection_id: Option<Uuid>,
        vehicle_id: Option<Uuid>,
    ) -> DomainResult<Self> {
        let container_ids = [bulk_cooler_id, on_farm_tank_id, can_collection_id];
        let container_count = container_ids.iter().flatten().count();

        match (container_count, vehicle_id) {
            (0, Some(vehicle_id)) => Ok(SampleSource::Vehicle { vehicle_id }),
            (1, None) => {
                let storage =
                    StorageRef::from_parts(bulk_cooler_id, on_farm_tank_id, can_collection_id)?;
                Ok(SampleSource::Container { storage })
            }
            _ => {
                let mut provided: Vec<String> = ContainerKind::ALL
                    .iter()
                    .zip(container_ids.iter())
                    .filter(|(_, id)| id.is_some())
                    .map(|(kind, _)| kind.as_str().to_string())
                    .collect();
                if vehicle_id.is_some() {
                    provided.push("vehicle".to_string());
                }
                Err(DomainError::ExclusivitySourceConflict {
                    expected: None,
                    provided,
                })
            }
        }
    }

    /// Gate tests come from vehicles, society tests from containers
    pub fn sample_type(&self) -> SampleType {
        match self {
            SampleSource::Container { .. } => SampleType::SocietyTest,
            SampleSource::Vehicle { .. } => SampleType::InstantGate,
        }
    }

    pub fn storage(&self) -> Option<StorageRef> {
        match self {
            SampleSource::Container { storage } => Some(*storage),
            SampleSource::Vehicle { .. } => None,
        }
    }

    pub fn vehicle_id(&self) -> Option<Uuid> {
        match self {
            SampleSource::Vehicle { vehicle_id } => Some(*vehicle_id),
            SampleSource::Container { .. } => None,
        }
    }
}

/// Kind of composite test
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SampleType {
    /// Quick test on a vehicle at plant arrival
    InstantGate,
    /// Collection-point test of a container
    SocietyTest,
}

impl SampleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SampleType::InstantGate => "instant_gate",
            SampleType::SocietyTest => "society_test",
        }
    }
}

impl std::str::FromStr for SampleType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "instant_gate" => Ok(SampleType::InstantGate),
            "society_test" => Ok(SampleType::SocietyTest),
            other => Err(DomainError::validation(
                "sample_type",
                format!("unknown sample type '{}'", other),
            )),
        }
    }
}

/// Lab verdict on a sample
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Pending => "pending",
            Verdict::Approved => "approved",
            Verdict::Rejected => "rejected",
        }
    }

    pub fn is_final(&self) -> bool {
        !matches!(self, Verdict::Pending)
    }
}

impl std::str::FromStr for Verdict {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Verdict::Pending),
            "approved" => Ok(Verdict::Approved),
            "rejected" => Ok(Verdict::Rejected),
            other => Err(DomainError::validation(
                "verdict",
                format!("unknown verdict '{}'", other),
            )),
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Measured lab fields, all optional until the lab reports
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SampleResults {
    pub fat_percent: Option<Decimal>,
    pub snf_percent: Option<Decimal>,
    pub protein_percent: Option<Decimal>,
    pub bacterial_count: Option<i64>,
    pub antibiotic_residue: bool,
    pub added_water_percent: Decimal,
    /// Clot-on-boiling
    pub cob_test: Option<bool>,
    pub alcohol_test: Option<bool>,
    pub ph_value: Option<Decimal>,
    /// Methylene blue reduction time, minutes
    pub mbrt_minutes: Option<i32>,
}

/// What recording a verdict does to a sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerdictChange {
    /// First verdict, propagate to lots
    Apply(Verdict),
    /// Same verdict again, nothing to do
    Unchanged,
}

/// Validate a verdict transition. Verdicts are terminal once recorded.
pub fn resolve_verdict(
    sample_id: Uuid,
    current: Verdict,
    requested: Verdict,
) -> DomainResult<VerdictChange> {
    if requested == Verdict::Pending {
        return Err(DomainError::InvalidStatusTransition {
            entity: "composite sample".to_string(),
            from: current.to_string(),
            to: requested.to_string(),
        });
    }

    match current {
        Verdict::Pending => Ok(VerdictChange::Apply(requested)),
        same if same == requested => Ok(VerdictChange::Unchanged),
        other => Err(DomainError::VerdictAlreadyFinal {
            sample_id,
            current: other.to_string(),
            requested: requested.to_string(),
        }),
    }
}

/// Per-lot effect of a final verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LotVerdictEffect {
    pub status: LotStatus,
    /// Zero both price columns
    pub zero_price: bool,
    /// Lots already rejected are left alone on approval
    pub skip_rejected: bool,
}

pub fn lot_effect(verdict: Verdict) -> Option<LotVerdictEffect> {
    match verdict {
        Verdict::Pending => None,
        Verdict::Approved => Some(LotVerdictEffect {
            status: LotStatus::Approved,
            zero_price: false,
            skip_rejected: true,
        }),
        Verdict::Rejected => Some(LotVerdictEffect {
            status: LotStatus::Rejected,
            zero_price: true,
            skip_rejected: false,
        }),
    }
}

impl LotVerdictEffect {
    /// Whether a lot currently in `status` is updated by the verdict
    pub fn applies_to(&self, status: LotStatus) -> bool {
        !(self.skip_rejected && status == LotStatus::Rejected)
    }

    /// Lot statuses the verdict updates, for filtering stored lots
    pub fn affected_statuses(&self) -> Vec<LotStatus> {
        LotStatus::ALL
            .into_iter()
            .filter(|s| self.applies_to(*s))
            .collect()
    }

    /// Apply to one lot. Returns false when the lot is left untouched.
    pub fn apply(&self, lot: &mut MilkLot) -> bool {
        if !self.applies_to(lot.status) {
            return false;
        }
        lot.status = self.status;
        if self.zero_price {
            lot.price_per_liter = Some(Decimal::ZERO);
            lot.total_price = Some(Decimal::ZERO);
        }
        true
    }
}

/// Apply a final verdict to the lots of the sampled container and return
/// how many were updated. `Pending` changes nothing.
pub fn propagate_verdict(verdict: Verdict, lots: &mut [MilkLot]) -> usize {
    match lot_effect(verdict) {
        Some(effect) => lots
            .iter_mut()
            .map(|lot| effect.apply(lot))
            .filter(|applied| *applied)
            .count(),
        None => 0,
    }
}
