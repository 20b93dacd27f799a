//! WebAssembly module for the Raw Milk Tracking Platform
//!
//! Lets collection-centre testers work offline with the same rules as the server:
//! - Lot pricing against a route pricing policy
//! - Container headroom checks before pouring
//! - Instant-gate release window checks

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;
pub use shared::validation::*;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

fn parse_decimal(name: &str, value: &str) -> Result<Decimal, JsValue> {
    value
        .trim()
        .parse::<Decimal>()
        .map_err(|e| JsValue::from_str(&format!("Invalid {}: {}", name, e)))
}

fn parse_time(name: &str, value: &str) -> Result<DateTime<Utc>, JsValue> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| JsValue::from_str(&format!("Invalid {}: {}", name, e)))
}

/// Price a lot. Returns the grade outcome as JSON:
/// `{"price_per_liter": "30.00", "total_price": "1500.00", "status": "pending"}`
#[wasm_bindgen]
pub fn price_milk_lot(
    policy_json: &str,
    measurements_json: &str,
    volume_liters: &str,
) -> Result<String, JsValue> {
    let policy: PricingPolicy = serde_json::from_str(policy_json)
        .map_err(|e| JsValue::from_str(&format!("Invalid policy JSON: {}", e)))?;
    let measurements: LabMeasurements = serde_json::from_str(measurements_json)
        .map_err(|e| JsValue::from_str(&format!("Invalid measurements JSON: {}", e)))?;
    let volume = parse_decimal("volume", volume_liters)?;

    validate_pricing_policy(&policy).map_err(|e| JsValue::from_str(&e.to_string()))?;
    validate_measurements(&measurements).map_err(|e| JsValue::from_str(&e.to_string()))?;
    validate_volume("volume_liters", volume).map_err(|e| JsValue::from_str(&e.to_string()))?;

    let outcome = grade_lot(&measurements, volume, &policy);
    serde_json::to_string(&outcome).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// True when added water alone rejects the lot
#[wasm_bindgen]
pub fn is_water_rejected(added_water_percent: &str, added_water_max: &str) -> Result<bool, JsValue> {
    let water = parse_decimal("added water", added_water_percent)?;
    let max = parse_decimal("added water max", added_water_max)?;
    Ok(water > max)
}

/// Liters still free in a container, as a decimal string
#[wasm_bindgen]
pub fn container_headroom(capacity_liters: &str, current_volume_liters: &str) -> Result<String, JsValue> {
    let capacity = parse_decimal("capacity", capacity_liters)?;
    let current = parse_decimal("current volume", current_volume_liters)?;
    validate_capacity(capacity, current).map_err(|e| JsValue::from_str(&e.to_string()))?;
    Ok((capacity - current).to_string())
}

/// Whether a batch of lots totalling `batch_liters` would fit
#[wasm_bindgen]
pub fn batch_fits(
    capacity_liters: &str,
    current_volume_liters: &str,
    batch_liters: &str,
) -> Result<bool, JsValue> {
    let capacity = parse_decimal("capacity", capacity_liters)?;
    let current = parse_decimal("current volume", current_volume_liters)?;
    let batch = parse_decimal("batch volume", batch_liters)?;
    Ok(current
        .checked_add(batch)
        .map_or(false, |total| total <= capacity))
}

/// Whether a gate sample collected at `collected_at` falls inside the release
/// window of a transfer that arrived at `arrival_at` (RFC 3339 timestamps)
#[wasm_bindgen]
pub fn within_gate_window(
    arrival_at: &str,
    collected_at: &str,
    window_hours: i32,
) -> Result<bool, JsValue> {
    let arrival = parse_time("arrival time", arrival_at)?;
    let collected = parse_time("collection time", collected_at)?;
    Ok(GateWindow::hours(i64::from(window_hours)).contains(arrival, collected))
}
