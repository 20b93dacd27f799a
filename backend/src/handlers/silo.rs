//! Silo HTTP handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::Silo;
use crate::services::silo::{CreateSiloInput, ReconcileResult, SiloService};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListSilosQuery {
    pub plant_id: Option<Uuid>,
}

/// Register a silo
pub async fn create_silo(
    State(state): State<AppState>,
    Json(input): Json<CreateSiloInput>,
) -> AppResult<Json<Silo>> {
    let service = SiloService::new(state.db, state.events);
    let silo = service.create_silo(input).await?;
    Ok(Json(silo))
}

/// Get a silo by ID
pub async fn get_silo(
    State(state): State<AppState>,
    Path(silo_id): Path<Uuid>,
) -> AppResult<Json<Silo>> {
    let service = SiloService::new(state.db, state.events);
    let silo = service.get_silo(silo_id).await?;
    Ok(Json(silo))
}

/// List silos
pub async fn list_silos(
    State(state): State<AppState>,
    Query(query): Query<ListSilosQuery>,
) -> AppResult<Json<Vec<Silo>>> {
    let service = SiloService::new(state.db, state.events);
    let silos = service.list_silos(query.plant_id).await?;
    Ok(Json(silos))
}

/// Recompute a silo's volume from its completed transfers
pub async fn reconcile_silo(
    State(state): State<AppState>,
    Path(silo_id): Path<Uuid>,
) -> AppResult<Json<ReconcileResult>> {
    let service = SiloService::new(state.db, state.events);
    let result = service.reconcile(silo_id).await?;
    Ok(Json(result))
}
