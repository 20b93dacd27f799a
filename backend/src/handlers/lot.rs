//! Milk lot HTTP handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::models::LabMeasurements;
use crate::services::grading::GradingService;
use crate::services::lot::{CreateLotInput, LotFilter, LotService};
use crate::AppState;

/// List lots
pub async fn list_lots(
    State(state): State<AppState>,
    Query(filter): Query<LotFilter>,
) -> impl IntoResponse {
    let service = LotService::new(state.db.clone(), state.events.clone());

    match service.list_lots(filter).await {
        Ok(lots) => (StatusCode::OK, Json(serde_json::json!({ "lots": lots }))).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Get a specific lot
pub async fn get_lot(State(state): State<AppState>, Path(lot_id): Path<Uuid>) -> impl IntoResponse {
    let service = LotService::new(state.db.clone(), state.events.clone());

    match service.get_lot(lot_id).await {
        Ok(lot) => (StatusCode::OK, Json(lot)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Record a new lot
pub async fn create_lot(
    State(state): State<AppState>,
    Json(input): Json<CreateLotInput>,
) -> impl IntoResponse {
    let service = LotService::new(state.db.clone(), state.events.clone());

    match service.create_lot(input).await {
        Ok(lot) => (StatusCode::CREATED, Json(lot)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Replace a lot's lab measurements
pub async fn update_lot_lab_results(
    State(state): State<AppState>,
    Path(lot_id): Path<Uuid>,
    Json(measurements): Json<LabMeasurements>,
) -> impl IntoResponse {
    let service = LotService::new(state.db.clone(), state.events.clone());

    match service.update_lab_results(lot_id, measurements).await {
        Ok(lot) => (StatusCode::OK, Json(lot)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Grade and price a lot
pub async fn grade_lot(State(state): State<AppState>, Path(lot_id): Path<Uuid>) -> impl IntoResponse {
    let service = GradingService::new(state.db.clone(), state.events.clone());

    match service.grade(lot_id).await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(e) => e.into_response(),
    }
}
