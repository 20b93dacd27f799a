//! Container HTTP handlers (bulk coolers, on-farm tanks, can collections)

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::services::container::{
    ContainerFilter, ContainerService, CreateContainerInput, UpdateHygieneInput,
};
use crate::AppState;

fn container_service(state: &AppState) -> ContainerService {
    ContainerService::new(state.db.clone(), state.events.clone())
        .with_admission_policy(state.config.admission_policy())
        .with_sanitation_max_age_hours(state.config.containers.sanitation_max_age_hours)
}

#[derive(Debug, Deserialize)]
pub struct AdmitLotsRequest {
    pub lot_ids: Vec<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NextCycleRequest {
    #[serde(default)]
    pub confirm_override: bool,
}

/// Register a container
pub async fn create_container(
    State(state): State<AppState>,
    Json(input): Json<CreateContainerInput>,
) -> impl IntoResponse {
    match container_service(&state).create_container(input).await {
        Ok(container) => (StatusCode::CREATED, Json(container)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// List containers
pub async fn list_containers(
    State(state): State<AppState>,
    Query(filter): Query<ContainerFilter>,
) -> impl IntoResponse {
    match container_service(&state).list_containers(filter).await {
        Ok(containers) => (
            StatusCode::OK,
            Json(serde_json::json!({ "containers": containers })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// Get a specific container
pub async fn get_container(
    State(state): State<AppState>,
    Path(container_id): Path<Uuid>,
) -> impl IntoResponse {
    match container_service(&state).get_container(container_id).await {
        Ok(container) => (StatusCode::OK, Json(container)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// List the lots held by a container
pub async fn list_container_lots(
    State(state): State<AppState>,
    Path(container_id): Path<Uuid>,
) -> impl IntoResponse {
    match container_service(&state).list_container_lots(container_id).await {
        Ok(lots) => (StatusCode::OK, Json(serde_json::json!({ "lots": lots }))).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Admit a batch of lots into a container
pub async fn admit_lots(
    State(state): State<AppState>,
    Path(container_id): Path<Uuid>,
    Json(request): Json<AdmitLotsRequest>,
) -> impl IntoResponse {
    match container_service(&state)
        .admit_lots(container_id, request.lot_ids)
        .await
    {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Open the next collection cycle of a container
pub async fn open_next_cycle(
    State(state): State<AppState>,
    Path(container_id): Path<Uuid>,
    request: Option<Json<NextCycleRequest>>,
) -> impl IntoResponse {
    let confirm_override = request.map(|Json(r)| r.confirm_override).unwrap_or(false);

    match container_service(&state)
        .open_next_cycle(container_id, confirm_override)
        .await
    {
        Ok(container) => (StatusCode::CREATED, Json(container)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Update hygiene metadata
pub async fn update_hygiene(
    State(state): State<AppState>,
    Path(container_id): Path<Uuid>,
    Json(input): Json<UpdateHygieneInput>,
) -> impl IntoResponse {
    match container_service(&state)
        .update_hygiene(container_id, input)
        .await
    {
        Ok(container) => (StatusCode::OK, Json(container)).into_response(),
        Err(e) => e.into_response(),
    }
}
