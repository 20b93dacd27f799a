//! Reference data HTTP handlers

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{Plant, Route, Supplier, Vehicle};
use crate::services::reference::{
    CreatePlantInput, CreateRouteInput, CreateSupplierInput, CreateVehicleInput, ReferenceService,
};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ByRouteQuery {
    pub route_id: Option<Uuid>,
}

pub async fn create_route(
    State(state): State<AppState>,
    Json(input): Json<CreateRouteInput>,
) -> AppResult<(StatusCode, Json<Route>)> {
    let route = ReferenceService::new(state.db).create_route(input).await?;
    Ok((StatusCode::CREATED, Json(route)))
}

pub async fn list_routes(State(state): State<AppState>) -> AppResult<Json<Vec<Route>>> {
    let routes = ReferenceService::new(state.db).list_routes().await?;
    Ok(Json(routes))
}

pub async fn create_supplier(
    State(state): State<AppState>,
    Json(input): Json<CreateSupplierInput>,
) -> AppResult<(StatusCode, Json<Supplier>)> {
    let supplier = ReferenceService::new(state.db).create_supplier(input).await?;
    Ok((StatusCode::CREATED, Json(supplier)))
}

pub async fn list_suppliers(
    State(state): State<AppState>,
    Query(query): Query<ByRouteQuery>,
) -> AppResult<Json<Vec<Supplier>>> {
    let suppliers = ReferenceService::new(state.db)
        .list_suppliers(query.route_id)
        .await?;
    Ok(Json(suppliers))
}

pub async fn create_vehicle(
    State(state): State<AppState>,
    Json(input): Json<CreateVehicleInput>,
) -> AppResult<(StatusCode, Json<Vehicle>)> {
    let vehicle = ReferenceService::new(state.db).create_vehicle(input).await?;
    Ok((StatusCode::CREATED, Json(vehicle)))
}

pub async fn list_vehicles(
    State(state): State<AppState>,
    Query(query): Query<ByRouteQuery>,
) -> AppResult<Json<Vec<Vehicle>>> {
    let vehicles = ReferenceService::new(state.db)
        .list_vehicles(query.route_id)
        .await?;
    Ok(Json(vehicles))
}

pub async fn create_plant(
    State(state): State<AppState>,
    Json(input): Json<CreatePlantInput>,
) -> AppResult<(StatusCode, Json<Plant>)> {
    let plant = ReferenceService::new(state.db).create_plant(input).await?;
    Ok((StatusCode::CREATED, Json(plant)))
}

pub async fn list_plants(State(state): State<AppState>) -> AppResult<Json<Vec<Plant>>> {
    let plants = ReferenceService::new(state.db).list_plants().await?;
    Ok(Json(plants))
}
