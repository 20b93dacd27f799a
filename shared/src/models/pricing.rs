//! Route pricing policy and the lot grading engine

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{LabMeasurements, LotStatus};
use crate::types::round_currency;

/// Per-route milk pricing configuration.
///
/// One active version per route. Bonuses are per liter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PricingPolicy {
    pub id: Uuid,
    pub route_id: Uuid,
    pub version: i32,
    pub base_price: Decimal,
    pub fat: QualityBonus,
    pub snf: QualityBonus,
    pub protein: QualityBonus,
    pub urea: QualityBonus,
    pub bacteria: QualityBonus,
    /// Added water above this percentage rejects the lot outright
    pub added_water_max: Decimal,
    /// Bonus deducted per percent of added water
    pub water_penalty_rate: Decimal,
    pub updated_at: DateTime<Utc>,
}

/// Threshold and the bonus paid when a measurement meets it
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct QualityBonus {
    pub threshold: Decimal,
    pub bonus: Decimal,
}

impl QualityBonus {
    pub fn new(threshold: Decimal, bonus: Decimal) -> Self {
        Self { threshold, bonus }
    }

    /// Bonus earned when `value >= threshold`
    fn at_least(&self, value: Decimal) -> Decimal {
        if value >= self.threshold {
            self.bonus
        } else {
            Decimal::ZERO
        }
    }

    /// Bonus earned when `value <= threshold`
    fn at_most(&self, value: Decimal) -> Decimal {
        if value <= self.threshold {
            self.bonus
        } else {
            Decimal::ZERO
        }
    }
}

/// Result of grading one lot
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct GradeOutcome {
    pub price_per_liter: Decimal,
    pub total_price: Decimal,
    pub status: LotStatus,
}

impl GradeOutcome {
    pub fn rejected() -> Self {
        Self {
            price_per_liter: Decimal::ZERO,
            total_price: Decimal::ZERO,
            status: LotStatus::Rejected,
        }
    }

    pub fn is_rejected(&self) -> bool {
        self.status == LotStatus::Rejected
    }
}

/// Sum of the quality bonuses a set of measurements earns, before water penalty
pub fn quality_bonus(measurements: &LabMeasurements, policy: &PricingPolicy) -> Decimal {
    policy.fat.at_least(measurements.fat_percent)
        + policy.snf.at_least(measurements.snf_percent)
        + policy.protein.at_least(measurements.protein_percent)
        + policy.urea.at_most(measurements.urea_nitrogen)
        + policy.bacteria.at_most(Decimal::from(measurements.bacterial_count))
}

/// Price one lot of `volume_liters` against a route policy.
///
/// Added water above the policy maximum rejects with a zero price. Below it,
/// the penalty scales linearly and may drive the bonus negative; the price per
/// liter is floored at zero. Never returns `Approved`: confirmation comes from
/// a composite sample.
pub fn grade_lot(
    measurements: &LabMeasurements,
    volume_liters: Decimal,
    policy: &PricingPolicy,
) -> GradeOutcome {
    let water = measurements.added_water_percent;
    if water > policy.added_water_max {
        return GradeOutcome::rejected();
    }

    let mut bonus = quality_bonus(measurements, policy);
    if water > Decimal::ZERO {
        bonus -= policy.water_penalty_rate * water;
    }

    let price_per_liter = round_currency((policy.base_price + bonus).max(Decimal::ZERO));
    let total_price = round_currency(volume_liters * price_per_liter);

    GradeOutcome {
        price_per_liter,
        total_price,
        status: LotStatus::Pending,
    }
}

/// Status a lot ends up in after being (re-)graded.
///
/// A water rejection always wins; otherwise an earlier composite-sample
/// approval is kept.
pub fn status_after_grading(current: LotStatus, outcome: &GradeOutcome) -> LotStatus {
    match (current, outcome.status) {
        (_, LotStatus::Rejected) => LotStatus::Rejected,
        (LotStatus::Approved, _) => LotStatus::Approved,
        _ => LotStatus::Pending,
    }
}
