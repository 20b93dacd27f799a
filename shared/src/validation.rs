//! Validation utilities for milk tracking inputs
//!
//! Range checks on lab measurements, pricing policies and container data.
//! Everything returns `DomainError::Validation` naming the offending field.

use rust_decimal::Decimal;

use crate::error::{DomainError, DomainResult};
use crate::models::{LabMeasurements, PricingPolicy, QualityBonus, SampleResults};

// ============================================================================
// Lab Measurement Validations
// ============================================================================

fn percent(field: &str, value: Decimal) -> DomainResult<()> {
    if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
        return Err(DomainError::validation(
            field,
            "must be between 0 and 100",
        ));
    }
    Ok(())
}

/// Validate lab measurements of a milk lot
pub fn validate_measurements(m: &LabMeasurements) -> DomainResult<()> {
    percent("fat_percent", m.fat_percent)?;
    percent("protein_percent", m.protein_percent)?;
    percent("lactose_percent", m.lactose_percent)?;
    percent("total_solids_percent", m.total_solids_percent)?;
    percent("snf_percent", m.snf_percent)?;
    percent("added_water_percent", m.added_water_percent)?;

    if m.urea_nitrogen < Decimal::ZERO {
        return Err(DomainError::validation("urea_nitrogen", "cannot be negative"));
    }
    if m.bacterial_count < 0 {
        return Err(DomainError::validation("bacterial_count", "cannot be negative"));
    }
    Ok(())
}

/// Validate the measured fields of a composite sample
pub fn validate_sample_results(r: &SampleResults) -> DomainResult<()> {
    for (field, value) in [
        ("fat_percent", r.fat_percent),
        ("snf_percent", r.snf_percent),
        ("protein_percent", r.protein_percent),
    ] {
        if let Some(v) = value {
            percent(field, v)?;
        }
    }
    percent("added_water_percent", r.added_water_percent)?;

    if matches!(r.bacterial_count, Some(c) if c < 0) {
        return Err(DomainError::validation("bacterial_count", "cannot be negative"));
    }
    if let Some(ph) = r.ph_value {
        if ph < Decimal::ZERO || ph > Decimal::from(14) {
            return Err(DomainError::validation("ph_value", "must be between 0 and 14"));
        }
    }
    if matches!(r.mbrt_minutes, Some(m) if m < 0) {
        return Err(DomainError::validation("mbrt_minutes", "cannot be negative"));
    }
    Ok(())
}

/// Largest volume a lot or container can record (NUMERIC(10, 2))
pub fn max_volume_liters() -> Decimal {
    Decimal::new(9_999_999_999, 2)
}

/// Largest per-liter amount a policy can carry (NUMERIC(10, 2))
pub fn max_price_per_liter() -> Decimal {
    Decimal::new(9_999_999_999, 2)
}

/// Volume must be strictly positive and fit the volume columns
pub fn validate_volume(field: &str, volume: Decimal) -> DomainResult<()> {
    if volume <= Decimal::ZERO {
        return Err(DomainError::validation(field, "must be greater than 0"));
    }
    if volume > max_volume_liters() {
        return Err(DomainError::validation(
            field,
            format!("must be at most {}", max_volume_liters()),
        ));
    }
    Ok(())
}

// ============================================================================
// Pricing Policy Validations
// ============================================================================

fn amount(field: &str, value: Decimal) -> DomainResult<()> {
    if value > max_price_per_liter() {
        return Err(DomainError::validation(
            field,
            format!("must be at most {}", max_price_per_liter()),
        ));
    }
    Ok(())
}

fn bonus_pair(field: &str, pair: &QualityBonus) -> DomainResult<()> {
    if pair.threshold < Decimal::ZERO || pair.bonus < Decimal::ZERO {
        return Err(DomainError::validation(
            field,
            "threshold and bonus cannot be negative",
        ));
    }
    amount(field, pair.bonus)
}

/// Monetary values and thresholds of a policy are all non-negative
pub fn validate_pricing_policy(policy: &PricingPolicy) -> DomainResult<()> {
    if policy.base_price < Decimal::ZERO {
        return Err(DomainError::validation("base_price", "cannot be negative"));
    }
    amount("base_price", policy.base_price)?;
    bonus_pair("fat", &policy.fat)?;
    bonus_pair("snf", &policy.snf)?;
    bonus_pair("protein", &policy.protein)?;
    bonus_pair("urea", &policy.urea)?;
    bonus_pair("bacteria", &policy.bacteria)?;
    percent("added_water_max", policy.added_water_max)?;
    if policy.water_penalty_rate < Decimal::ZERO {
        return Err(DomainError::validation(
            "water_penalty_rate",
            "cannot be negative",
        ));
    }
    amount("water_penalty_rate", policy.water_penalty_rate)
}

// ============================================================================
// Container Validations
// ============================================================================

/// Validate container name (1-100 non-blank characters)
pub fn validate_container_name(name: &str) -> DomainResult<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation("name", "cannot be empty"));
    }
    if trimmed.chars().count() > 100 {
        return Err(DomainError::validation("name", "must be at most 100 characters"));
    }
    Ok(())
}

/// Validate capacity against what the container already holds
pub fn validate_capacity(capacity: Decimal, current: Decimal) -> DomainResult<()> {
    validate_volume("capacity_liters", capacity)?;
    if current < Decimal::ZERO || current > capacity {
        return Err(DomainError::validation(
            "current_volume_liters",
            "must be between 0 and capacity",
        ));
    }
    Ok(())
}

/// Storage temperature in Celsius, plausible range for chilled raw milk
pub fn validate_temperature(celsius: Decimal) -> DomainResult<()> {
    if celsius < Decimal::from(-5) || celsius > Decimal::from(45) {
        return Err(DomainError::validation(
            "temperature_celsius",
            "must be between -5 and 45",
        ));
    }
    Ok(())
}
