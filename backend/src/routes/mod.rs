//! Route definitions for the Raw Milk Tracking Platform

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_check))
        // Reference data
        .nest("/routes", route_routes())
        .route(
            "/suppliers",
            get(handlers::list_suppliers).post(handlers::create_supplier),
        )
        .nest("/vehicles", vehicle_routes())
        .route(
            "/plants",
            get(handlers::list_plants).post(handlers::create_plant),
        )
        // Collection and grading
        .nest("/lots", lot_routes())
        .nest("/containers", container_routes())
        .nest("/samples", sample_routes())
        // Plant side
        .nest("/transfers", transfer_routes())
        .nest("/silos", silo_routes())
        .nest("/bills", bill_routes())
}

/// Route and pricing policy routes
fn route_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_routes).post(handlers::create_route))
        .route(
            "/:route_id/pricing-policy",
            get(handlers::get_pricing_policy).put(handlers::upsert_pricing_policy),
        )
}

fn vehicle_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_vehicles).post(handlers::create_vehicle))
        .route("/available", get(handlers::list_available_vehicles))
}

/// Milk lot routes
fn lot_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_lots).post(handlers::create_lot))
        .route("/:lot_id", get(handlers::get_lot))
        .route("/:lot_id/lab-results", put(handlers::update_lot_lab_results))
        .route("/:lot_id/grade", post(handlers::grade_lot))
}

/// Container routes
fn container_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_containers).post(handlers::create_container),
        )
        .route("/:container_id", get(handlers::get_container))
        .route(
            "/:container_id/lots",
            get(handlers::list_container_lots).post(handlers::admit_lots),
        )
        .route("/:container_id/next-cycle", post(handlers::open_next_cycle))
        .route("/:container_id/hygiene", put(handlers::update_hygiene))
}

/// Composite sample routes
fn sample_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_samples).post(handlers::create_sample))
        .route("/:sample_id", get(handlers::get_sample))
        .route(
            "/:sample_id/lab-results",
            put(handlers::record_sample_lab_results),
        )
        .route("/:sample_id/verdict", post(handlers::record_sample_verdict))
}

/// Transfer routes
fn transfer_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_transfers).post(handlers::create_transfer),
        )
        .route("/releasable", get(handlers::list_releasable_transfers))
        .route("/:transfer_id", get(handlers::get_transfer))
        .route("/:transfer_id/dispatch", post(handlers::dispatch_transfer))
        .route("/:transfer_id/complete", post(handlers::complete_transfer))
        .route("/:transfer_id/cancel", post(handlers::cancel_transfer))
        .route("/:transfer_id/silo", put(handlers::assign_transfer_silo))
}

/// Silo routes
fn silo_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_silos).post(handlers::create_silo))
        .route("/:silo_id", get(handlers::get_silo))
        .route("/:silo_id/reconcile", post(handlers::reconcile_silo))
}

/// Payment bill routes
fn bill_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_bills).post(handlers::aggregate_bill))
        .route("/:bill_id", get(handlers::get_bill))
}
