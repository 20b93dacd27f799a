//! Cold-storage containers (bulk coolers, on-farm tanks, can collections)
//! and the lot admission algorithm shared by all three

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::LotStatus;
use crate::error::{DomainError, DomainResult};
use crate::types::{ContainerKind, StorageRef};

/// One working instance of a physical container.
///
/// A new instance is opened every collection cycle; an instance whose
/// `emptied_at` is set has been drained by a transfer and is read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Container {
    pub id: Uuid,
    pub kind: ContainerKind,
    pub name: String,
    pub owner: ContainerOwner,
    pub capacity_liters: Decimal,
    pub current_volume_liters: Decimal,
    pub temperature_celsius: Option<Decimal>,
    pub hygiene: HygieneRecord,
    pub is_stirred: bool,
    pub filled_at: Option<DateTime<Utc>>,
    pub emptied_at: Option<DateTime<Utc>>,
    /// Previous instance of the same physical unit
    pub predecessor_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Who a container belongs to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum ContainerOwner {
    Route(Uuid),
    Supplier(Uuid),
}

impl ContainerOwner {
    pub fn route_id(&self) -> Option<Uuid> {
        match self {
            ContainerOwner::Route(id) => Some(*id),
            ContainerOwner::Supplier(_) => None,
        }
    }

    pub fn supplier_id(&self) -> Option<Uuid> {
        match self {
            ContainerOwner::Supplier(id) => Some(*id),
            ContainerOwner::Route(_) => None,
        }
    }
}

/// Cleaning and service metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HygieneRecord {
    pub last_cleaned_at: Option<DateTime<Utc>>,
    pub last_sanitized_at: Option<DateTime<Utc>>,
    pub last_serviced_at: Option<DateTime<Utc>>,
    pub service_interval_days: i32,
    pub last_calibration_at: Option<DateTime<Utc>>,
}

/// What to do when an admission batch does not fit
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Refuse the call with `CapacityExceeded`
    #[default]
    Reject,
    /// Admit nothing and report zero lots
    Soft,
}

/// Deployment-level admission rules
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdmissionPolicy {
    /// Only lots in this status may be poured in
    pub eligible_status: LotStatus,
    pub overflow: OverflowPolicy,
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        Self {
            eligible_status: LotStatus::Pending,
            overflow: OverflowPolicy::Reject,
        }
    }
}

/// The parts of a lot the allocator looks at
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdmissionCandidate {
    pub lot_id: Uuid,
    pub status: LotStatus,
    pub volume_liters: Decimal,
    pub storage: Option<StorageRef>,
}

/// Outcome of planning an admission
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AdmissionPlan {
    pub admitted: Vec<Uuid>,
    /// Wrong status or already sitting in another container
    pub skipped: Vec<Uuid>,
    pub added_volume: Decimal,
    pub resulting_volume: Decimal,
    /// Batch did not fit and the soft policy admitted nothing
    pub overflowed: bool,
}

impl AdmissionPlan {
    pub fn admitted_count(&self) -> usize {
        self.admitted.len()
    }
}

impl Container {
    /// A fresh, empty first instance of a physical container
    pub fn new(
        kind: ContainerKind,
        name: impl Into<String>,
        owner: ContainerOwner,
        capacity_liters: Decimal,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            name: name.into(),
            owner,
            capacity_liters,
            current_volume_liters: Decimal::ZERO,
            temperature_celsius: None,
            hygiene: HygieneRecord::default(),
            is_stirred: false,
            filled_at: None,
            emptied_at: None,
            predecessor_id: None,
            created_at: now,
        }
    }

    pub fn storage_ref(&self) -> StorageRef {
        StorageRef::new(self.kind, self.id)
    }

    pub fn is_retired(&self) -> bool {
        self.emptied_at.is_some()
    }

    pub fn free_space(&self) -> Decimal {
        self.capacity_liters - self.current_volume_liters
    }

    /// Apply a successful plan to this instance
    pub fn apply_admission(&mut self, plan: &AdmissionPlan, now: DateTime<Utc>) {
        if plan.admitted.is_empty() {
            return;
        }
        self.current_volume_liters = plan.resulting_volume;
        if self.filled_at.is_none() {
            self.filled_at = Some(now);
        }
    }

    /// The zero-volume instance that takes over for the next collection cycle
    pub fn next_cycle(&self, now: DateTime<Utc>) -> Container {
        Container {
            id: Uuid::new_v4(),
            kind: self.kind,
            name: self.name.clone(),
            owner: self.owner,
            capacity_liters: self.capacity_liters,
            current_volume_liters: Decimal::ZERO,
            temperature_celsius: self.temperature_celsius,
            hygiene: self.hygiene.clone(),
            is_stirred: false,
            filled_at: None,
            emptied_at: None,
            predecessor_id: Some(self.id),
            created_at: now,
        }
    }
}

/// Decide which candidate lots go into `container`.
///
/// Lots already in this container are a caller bug and fail the whole call.
/// Lots in the wrong status or in another container are skipped. The
/// remaining batch is admitted only if it fits entirely.
pub fn plan_admission(
    container: &Container,
    candidates: &[AdmissionCandidate],
    policy: &AdmissionPolicy,
) -> DomainResult<AdmissionPlan> {
    if let Some(emptied_at) = container.emptied_at {
        return Err(DomainError::ContainerRetired {
            container_id: container.id,
            emptied_at,
        });
    }

    let here = container.storage_ref();
    if let Some(dup) = candidates.iter().find(|c| c.storage == Some(here)) {
        return Err(DomainError::AlreadyAssigned {
            lot_id: dup.lot_id,
            container_id: container.id,
        });
    }

    let mut plan = AdmissionPlan::default();
    let mut seen = std::collections::HashSet::new();
    for candidate in candidates {
        if !seen.insert(candidate.lot_id) {
            continue;
        }
        if candidate.status == policy.eligible_status && candidate.storage.is_none() {
            plan.admitted.push(candidate.lot_id);
            plan.added_volume += candidate.volume_liters;
        } else {
            plan.skipped.push(candidate.lot_id);
        }
    }

    let proposed = container.current_volume_liters + plan.added_volume;
    if proposed > container.capacity_liters {
        return match policy.overflow {
            OverflowPolicy::Reject => Err(DomainError::CapacityExceeded {
                container_id: container.id,
                capacity: container.capacity_liters,
                current: container.current_volume_liters,
                attempted: plan.added_volume,
            }),
            OverflowPolicy::Soft => Ok(AdmissionPlan {
                admitted: Vec::new(),
                skipped: plan.admitted.into_iter().chain(plan.skipped).collect(),
                added_volume: Decimal::ZERO,
                resulting_volume: container.current_volume_liters,
                overflowed: true,
            }),
        };
    }

    plan.resulting_volume = proposed;
    Ok(plan)
}

/// Check that `previous` may be succeeded by a new instance today.
///
/// Missing sanitization is never overridable; stale sanitization can be
/// confirmed by the operator.
pub fn check_next_cycle(
    previous: &Container,
    already_opened_on: Option<NaiveDate>,
    now: DateTime<Utc>,
    sanitation_max_age_hours: i64,
    confirm_override: bool,
) -> DomainResult<()> {
    let today = now.date_naive();
    if already_opened_on == Some(today) {
        return Err(DomainError::DuplicateCycle {
            kind: previous.kind,
            name: previous.name.clone(),
            date: today,
        });
    }

    let sanitized_at = previous
        .hygiene
        .last_sanitized_at
        .ok_or_else(|| DomainError::HygieneCheckFailed {
            kind: previous.kind,
            container_id: previous.id,
            detail: "no sanitization record".to_string(),
            overridable: false,
        })?;

    let age = now - sanitized_at;
    if age > Duration::hours(sanitation_max_age_hours) && !confirm_override {
        return Err(DomainError::HygieneCheckFailed {
            kind: previous.kind,
            container_id: previous.id,
            detail: format!(
                "last sanitized {} day(s) ago, must be within {} hours",
                age.num_days(),
                sanitation_max_age_hours
            ),
            overridable: true,
        });
    }

    Ok(())
}
