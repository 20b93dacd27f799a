//! Pricing policy HTTP handlers

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::PricingPolicy;
use crate::services::pricing::{PricingPolicyInput, PricingService};
use crate::AppState;

/// Get the active pricing policy of a route
pub async fn get_pricing_policy(
    State(state): State<AppState>,
    Path(route_id): Path<Uuid>,
) -> AppResult<Json<PricingPolicy>> {
    let service = PricingService::new(state.db);
    let policy = service.get_active_policy(route_id).await?;
    Ok(Json(policy))
}

/// Publish a new policy version for a route
pub async fn upsert_pricing_policy(
    State(state): State<AppState>,
    Path(route_id): Path<Uuid>,
    Json(input): Json<PricingPolicyInput>,
) -> AppResult<Json<PricingPolicy>> {
    let service = PricingService::new(state.db);
    let policy = service.upsert_policy(route_id, input).await?;
    Ok(Json(policy))
}
