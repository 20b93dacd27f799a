//! Row types read with `sqlx::query_as` and their conversion into domain models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use shared::{
    CompositeSample, Container, ContainerKind, ContainerOwner, DomainError, HygieneRecord,
    LabMeasurements, MilkLot, MilkTransfer, PaymentBill, PricingPolicy, QualityBonus,
    SampleResults, SampleSource, Silo, StorageRef, WeightCapture,
};
use sqlx::FromRow;
use uuid::Uuid;

/// Rebuild a storage reference from an id column and its kind column
fn storage_ref(id: Option<Uuid>, kind: Option<String>) -> Result<Option<StorageRef>, DomainError> {
    match (id, kind) {
        (Some(id), Some(kind)) => Ok(Some(StorageRef::new(kind.parse()?, id))),
        (None, None) => Ok(None),
        _ => Err(DomainError::validation(
            "container_kind",
            "container id and kind must be set together",
        )),
    }
}

// ============================================================================
// Pricing
// ============================================================================

pub const POLICY_COLUMNS: &str = "id, route_id, version, base_price, fat_min, fat_bonus, \
     snf_min, snf_bonus, protein_min, protein_bonus, urea_max, urea_bonus, bacteria_max, \
     bacteria_bonus, added_water_max, water_penalty_rate, updated_at";

#[derive(Debug, FromRow)]
pub struct PricingPolicyRow {
    pub id: Uuid,
    pub route_id: Uuid,
    pub version: i32,
    pub base_price: Decimal,
    pub fat_min: Decimal,
    pub fat_bonus: Decimal,
    pub snf_min: Decimal,
    pub snf_bonus: Decimal,
    pub protein_min: Decimal,
    pub protein_bonus: Decimal,
    pub urea_max: Decimal,
    pub urea_bonus: Decimal,
    pub bacteria_max: Decimal,
    pub bacteria_bonus: Decimal,
    pub added_water_max: Decimal,
    pub water_penalty_rate: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl From<PricingPolicyRow> for PricingPolicy {
    fn from(r: PricingPolicyRow) -> Self {
        PricingPolicy {
            id: r.id,
            route_id: r.route_id,
            version: r.version,
            base_price: r.base_price,
            fat: QualityBonus::new(r.fat_min, r.fat_bonus),
            snf: QualityBonus::new(r.snf_min, r.snf_bonus),
            protein: QualityBonus::new(r.protein_min, r.protein_bonus),
            urea: QualityBonus::new(r.urea_max, r.urea_bonus),
            bacteria: QualityBonus::new(r.bacteria_max, r.bacteria_bonus),
            added_water_max: r.added_water_max,
            water_penalty_rate: r.water_penalty_rate,
            updated_at: r.updated_at,
        }
    }
}

// ============================================================================
// Milk lots
// ============================================================================

pub const LOT_COLUMNS: &str = "id, supplier_id, tester_name, volume_liters, fat_percent, \
     protein_percent, lactose_percent, total_solids_percent, snf_percent, urea_nitrogen, \
     bacterial_count, added_water_percent, status, price_per_liter, total_price, \
     pricing_policy_id, container_id, container_kind, bill_id, collected_on, created_at, updated_at";

#[derive(Debug, FromRow)]
pub struct LotRow {
    pub id: Uuid,
    pub supplier_id: Uuid,
    pub tester_name: Option<String>,
    pub volume_liters: Decimal,
    pub fat_percent: Decimal,
    pub protein_percent: Decimal,
    pub lactose_percent: Decimal,
    pub total_solids_percent: Decimal,
    pub snf_percent: Decimal,
    pub urea_nitrogen: Decimal,
    pub bacterial_count: i64,
    pub added_water_percent: Decimal,
    pub status: String,
    pub price_per_liter: Option<Decimal>,
    pub total_price: Option<Decimal>,
    pub pricing_policy_id: Option<Uuid>,
    pub container_id: Option<Uuid>,
    pub container_kind: Option<String>,
    pub bill_id: Option<Uuid>,
    pub collected_on: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<LotRow> for MilkLot {
    type Error = DomainError;

    fn try_from(r: LotRow) -> Result<Self, Self::Error> {
        Ok(MilkLot {
            id: r.id,
            supplier_id: r.supplier_id,
            tester_name: r.tester_name,
            volume_liters: r.volume_liters,
            measurements: LabMeasurements {
                fat_percent: r.fat_percent,
                protein_percent: r.protein_percent,
                lactose_percent: r.lactose_percent,
                total_solids_percent: r.total_solids_percent,
                snf_percent: r.snf_percent,
                urea_nitrogen: r.urea_nitrogen,
                bacterial_count: r.bacterial_count,
                added_water_percent: r.added_water_percent,
            },
            status: r.status.parse()?,
            price_per_liter: r.price_per_liter,
            total_price: r.total_price,
            pricing_policy_id: r.pricing_policy_id,
            storage: storage_ref(r.container_id, r.container_kind)?,
            bill_id: r.bill_id,
            collected_on: r.collected_on,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

// ============================================================================
// Containers
// ============================================================================

pub const CONTAINER_COLUMNS: &str = "id, kind, name, route_id, supplier_id, capacity_liters, \
     current_volume_liters, temperature_celsius, last_cleaned_at, last_sanitized_at, \
     last_serviced_at, service_interval_days, last_calibration_at, is_stirred, filled_at, \
     emptied_at, predecessor_id, created_at";

#[derive(Debug, FromRow)]
pub struct ContainerRow {
    pub id: Uuid,
    pub kind: String,
    pub name: String,
    pub route_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    pub capacity_liters: Decimal,
    pub current_volume_liters: Decimal,
    pub temperature_celsius: Option<Decimal>,
    pub last_cleaned_at: Option<DateTime<Utc>>,
    pub last_sanitized_at: Option<DateTime<Utc>>,
    pub last_serviced_at: Option<DateTime<Utc>>,
    pub service_interval_days: i32,
    pub last_calibration_at: Option<DateTime<Utc>>,
    pub is_stirred: bool,
    pub filled_at: Option<DateTime<Utc>>,
    pub emptied_at: Option<DateTime<Utc>>,
    pub predecessor_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<ContainerRow> for Container {
    type Error = DomainError;

    fn try_from(r: ContainerRow) -> Result<Self, Self::Error> {
        let owner = match (r.route_id, r.supplier_id) {
            (Some(route_id), None) => ContainerOwner::Route(route_id),
            (None, Some(supplier_id)) => ContainerOwner::Supplier(supplier_id),
            _ => {
                return Err(DomainError::validation(
                    "owner",
                    "container must belong to exactly one route or supplier",
                ))
            }
        };

        Ok(Container {
            id: r.id,
            kind: r.kind.parse()?,
            name: r.name,
            owner,
            capacity_liters: r.capacity_liters,
            current_volume_liters: r.current_volume_liters,
            temperature_celsius: r.temperature_celsius,
            hygiene: HygieneRecord {
                last_cleaned_at: r.last_cleaned_at,
                last_sanitized_at: r.last_sanitized_at,
                last_serviced_at: r.last_serviced_at,
                service_interval_days: r.service_interval_days,
                last_calibration_at: r.last_calibration_at,
            },
            is_stirred: r.is_stirred,
            filled_at: r.filled_at,
            emptied_at: r.emptied_at,
            predecessor_id: r.predecessor_id,
            created_at: r.created_at,
        })
    }
}

// ============================================================================
// Composite samples
// ============================================================================

pub const SAMPLE_COLUMNS: &str = "id, container_id, container_kind, vehicle_id, sample_type, \
     sample_volume_ml, temperature_celsius, is_stirred, collected_at, received_at_lab, \
     fat_percent, snf_percent, protein_percent, bacterial_count, antibiotic_residue, \
     added_water_percent, cob_test, alcohol_test, ph_value, mbrt_minutes, verdict, remark";

#[derive(Debug, FromRow)]
pub struct SampleRow {
    pub id: Uuid,
    pub container_id: Option<Uuid>,
    pub container_kind: Option<String>,
    pub vehicle_id: Option<Uuid>,
    pub sample_type: String,
    pub sample_volume_ml: i32,
    pub temperature_celsius: Decimal,
    pub is_stirred: Option<bool>,
    pub collected_at: DateTime<Utc>,
    pub received_at_lab: Option<DateTime<Utc>>,
    pub fat_percent: Option<Decimal>,
    pub snf_percent: Option<Decimal>,
    pub protein_percent: Option<Decimal>,
    pub bacterial_count: Option<i64>,
    pub antibiotic_residue: bool,
    pub added_water_percent: Decimal,
    pub cob_test: Option<bool>,
    pub alcohol_test: Option<bool>,
    pub ph_value: Option<Decimal>,
    pub mbrt_minutes: Option<i32>,
    pub verdict: String,
    pub remark: Option<String>,
}

impl TryFrom<SampleRow> for CompositeSample {
    type Error = DomainError;

    fn try_from(r: SampleRow) -> Result<Self, Self::Error> {
        let source = match (storage_ref(r.container_id, r.container_kind)?, r.vehicle_id) {
            (Some(storage), None) => SampleSource::Container { storage },
            (None, Some(vehicle_id)) => SampleSource::Vehicle { vehicle_id },
            _ => {
                return Err(DomainError::ExclusivitySourceConflict {
                    expected: None,
                    provided: Vec::new(),
                })
            }
        };

        Ok(CompositeSample {
            id: r.id,
            source,
            sample_type: r.sample_type.parse()?,
            sample_volume_ml: r.sample_volume_ml,
            temperature_celsius: r.temperature_celsius,
            is_stirred: r.is_stirred,
            collected_at: r.collected_at,
            received_at_lab: r.received_at_lab,
            results: SampleResults {
                fat_percent: r.fat_percent,
                snf_percent: r.snf_percent,
                protein_percent: r.protein_percent,
                bacterial_count: r.bacterial_count,
                antibiotic_residue: r.antibiotic_residue,
                added_water_percent: r.added_water_percent,
                cob_test: r.cob_test,
                alcohol_test: r.alcohol_test,
                ph_value: r.ph_value,
                mbrt_minutes: r.mbrt_minutes,
            },
            verdict: r.verdict.parse()?,
            remark: r.remark,
        })
    }
}

// ============================================================================
// Transfers and silos
// ============================================================================

pub const TRANSFER_COLUMNS: &str = "id, source_container_id, source_type, vehicle_id, \
     destination_plant_id, silo_id, status, total_volume_liters, departed_at, arrival_at, \
     completed_at, cancelled_at, departure_weight_kg, arrival_weight_kg, remarks, created_at";

#[derive(Debug, FromRow)]
pub struct TransferRow {
    pub id: Uuid,
    pub source_container_id: Uuid,
    pub source_type: String,
    pub vehicle_id: Option<Uuid>,
    pub destination_plant_id: Option<Uuid>,
    pub silo_id: Option<Uuid>,
    pub status: String,
    pub total_volume_liters: Decimal,
    pub departed_at: Option<DateTime<Utc>>,
    pub arrival_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub departure_weight_kg: Option<Decimal>,
    pub arrival_weight_kg: Option<Decimal>,
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<TransferRow> for MilkTransfer {
    type Error = DomainError;

    fn try_from(r: TransferRow) -> Result<Self, Self::Error> {
        let kind: ContainerKind = r.source_type.parse()?;
        Ok(MilkTransfer {
            id: r.id,
            source: StorageRef::new(kind, r.source_container_id),
            vehicle_id: r.vehicle_id,
            destination_plant_id: r.destination_plant_id,
            silo_id: r.silo_id,
            status: r.status.parse()?,
            total_volume_liters: r.total_volume_liters,
            departed_at: r.departed_at,
            arrival_at: r.arrival_at,
            completed_at: r.completed_at,
            cancelled_at: r.cancelled_at,
            weights: WeightCapture {
                departure_weight_kg: r.departure_weight_kg,
                arrival_weight_kg: r.arrival_weight_kg,
            },
            remarks: r.remarks,
            created_at: r.created_at,
        })
    }
}

pub const SILO_COLUMNS: &str =
    "id, plant_id, name, code, capacity_liters, current_volume_liters, reconciled_at";

#[derive(Debug, FromRow)]
pub struct SiloRow {
    pub id: Uuid,
    pub plant_id: Uuid,
    pub name: String,
    pub code: String,
    pub capacity_liters: Decimal,
    pub current_volume_liters: Decimal,
    pub reconciled_at: Option<DateTime<Utc>>,
}

impl From<SiloRow> for Silo {
    fn from(r: SiloRow) -> Self {
        Silo {
            id: r.id,
            plant_id: r.plant_id,
            name: r.name,
            code: r.code,
            capacity_liters: r.capacity_liters,
            current_volume_liters: r.current_volume_liters,
            reconciled_at: r.reconciled_at,
        }
    }
}

// ============================================================================
// Billing
// ============================================================================

pub const BILL_COLUMNS: &str = "id, supplier_id, bill_date, total_volume_liters, total_value, \
     lot_count, updated_at";

#[derive(Debug, FromRow)]
pub struct BillRow {
    pub id: Uuid,
    pub supplier_id: Uuid,
    pub bill_date: NaiveDate,
    pub total_volume_liters: Decimal,
    pub total_value: Decimal,
    pub lot_count: i32,
    pub updated_at: DateTime<Utc>,
}

impl From<BillRow> for PaymentBill {
    fn from(r: BillRow) -> Self {
        PaymentBill {
            id: r.id,
            supplier_id: r.supplier_id,
            bill_date: r.bill_date,
            total_volume_liters: r.total_volume_liters,
            total_value: r.total_value,
            lot_count: r.lot_count,
            updated_at: r.updated_at,
        }
    }
}

// ============================================================================
// Reference data
// ============================================================================

/// Collection route
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Route {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Milk supplier (farmer)
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Supplier {
    pub id: Uuid,
    pub name: String,
    pub route_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Tanker or collection truck
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Vehicle {
    pub id: Uuid,
    pub registration: String,
    pub capacity_liters: Option<Decimal>,
    pub route_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Processing plant
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Plant {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}
