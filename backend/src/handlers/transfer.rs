//! Milk transfer HTTP handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::services::transfer::{
    AssignSiloInput, CancelInput, CompleteInput, CreateTransferInput, DispatchInput,
    TransferFilter, TransferService,
};
use crate::AppState;

fn transfer_service(state: &AppState) -> TransferService {
    TransferService::new(state.db.clone(), state.events.clone())
        .with_gate_window(state.config.gate_window())
}

#[derive(Debug, Deserialize)]
pub struct ReleasableQuery {
    pub plant_id: Option<Uuid>,
    pub vehicle_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct RouteQuery {
    pub route_id: Option<Uuid>,
}

/// Create a transfer from one container
pub async fn create_transfer(
    State(state): State<AppState>,
    Json(input): Json<CreateTransferInput>,
) -> impl IntoResponse {
    match transfer_service(&state).create_transfer(input).await {
        Ok(transfer) => (StatusCode::CREATED, Json(transfer)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// List transfers
pub async fn list_transfers(
    State(state): State<AppState>,
    Query(filter): Query<TransferFilter>,
) -> impl IntoResponse {
    match transfer_service(&state).list_transfers(filter).await {
        Ok(transfers) => (
            StatusCode::OK,
            Json(serde_json::json!({ "transfers": transfers })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// Get a transfer by ID
pub async fn get_transfer(
    State(state): State<AppState>,
    Path(transfer_id): Path<Uuid>,
) -> impl IntoResponse {
    match transfer_service(&state).get_transfer(transfer_id).await {
        Ok(transfer) => (StatusCode::OK, Json(transfer)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Mark a transfer as departed
pub async fn dispatch_transfer(
    State(state): State<AppState>,
    Path(transfer_id): Path<Uuid>,
    input: Option<Json<DispatchInput>>,
) -> impl IntoResponse {
    let input = input.map(|Json(i)| i).unwrap_or_default();

    match transfer_service(&state).dispatch(transfer_id, input).await {
        Ok(transfer) => (StatusCode::OK, Json(transfer)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Record arrival at the plant
pub async fn complete_transfer(
    State(state): State<AppState>,
    Path(transfer_id): Path<Uuid>,
    input: Option<Json<CompleteInput>>,
) -> impl IntoResponse {
    let input = input.map(|Json(i)| i).unwrap_or_default();

    match transfer_service(&state).complete(transfer_id, input).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Cancel an open transfer
pub async fn cancel_transfer(
    State(state): State<AppState>,
    Path(transfer_id): Path<Uuid>,
    input: Option<Json<CancelInput>>,
) -> impl IntoResponse {
    let input = input.map(|Json(i)| i).unwrap_or_default();

    match transfer_service(&state).cancel(transfer_id, input).await {
        Ok(transfer) => (StatusCode::OK, Json(transfer)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Attach a destination silo
pub async fn assign_transfer_silo(
    State(state): State<AppState>,
    Path(transfer_id): Path<Uuid>,
    Json(input): Json<AssignSiloInput>,
) -> impl IntoResponse {
    match transfer_service(&state)
        .assign_silo(transfer_id, input.silo_id)
        .await
    {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Transfers cleared by an instant-gate test and waiting for a silo
pub async fn list_releasable_transfers(
    State(state): State<AppState>,
    Query(query): Query<ReleasableQuery>,
) -> impl IntoResponse {
    match transfer_service(&state)
        .releasable_transfers(query.plant_id, query.vehicle_id)
        .await
    {
        Ok(transfers) => (
            StatusCode::OK,
            Json(serde_json::json!({ "transfers": transfers })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// Vehicles not tied up by an open transfer
pub async fn list_available_vehicles(
    State(state): State<AppState>,
    Query(query): Query<RouteQuery>,
) -> impl IntoResponse {
    match transfer_service(&state)
        .available_vehicles(query.route_id)
        .await
    {
        Ok(vehicles) => (
            StatusCode::OK,
            Json(serde_json::json!({ "vehicles": vehicles })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}
