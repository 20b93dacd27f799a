//! Composite sample HTTP handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{CompositeSample, Verdict};
use crate::services::sample::{
    CreateSampleInput, LabResultsInput, SampleFilter, SampleService, VerdictResult,
};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct VerdictRequest {
    pub verdict: Verdict,
}

/// Record a composite sample
pub async fn create_sample(
    State(state): State<AppState>,
    Json(input): Json<CreateSampleInput>,
) -> impl IntoResponse {
    let service = SampleService::new(state.db.clone(), state.events.clone());

    match service.create_sample(input).await {
        Ok(sample) => (StatusCode::CREATED, Json(sample)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Get a sample by ID
pub async fn get_sample(
    State(state): State<AppState>,
    Path(sample_id): Path<Uuid>,
) -> AppResult<Json<CompositeSample>> {
    let service = SampleService::new(state.db, state.events);
    let sample = service.get_sample(sample_id).await?;
    Ok(Json(sample))
}

/// List samples
pub async fn list_samples(
    State(state): State<AppState>,
    Query(filter): Query<SampleFilter>,
) -> AppResult<Json<Vec<CompositeSample>>> {
    let service = SampleService::new(state.db, state.events);
    let samples = service.list_samples(filter).await?;
    Ok(Json(samples))
}

/// Record lab results on a pending sample
pub async fn record_sample_lab_results(
    State(state): State<AppState>,
    Path(sample_id): Path<Uuid>,
    Json(input): Json<LabResultsInput>,
) -> AppResult<Json<CompositeSample>> {
    let service = SampleService::new(state.db, state.events);
    let sample = service.record_lab_results(sample_id, input).await?;
    Ok(Json(sample))
}

/// Record the verdict and propagate it to the sampled container's lots
pub async fn record_sample_verdict(
    State(state): State<AppState>,
    Path(sample_id): Path<Uuid>,
    Json(request): Json<VerdictRequest>,
) -> AppResult<Json<VerdictResult>> {
    let service = SampleService::new(state.db, state.events);
    let result = service.record_verdict(sample_id, request.verdict).await?;
    Ok(Json(result))
}
