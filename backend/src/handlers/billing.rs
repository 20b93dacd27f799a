//! Payment bill HTTP handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::PaymentBill;
use crate::services::billing::{AggregateBillInput, BillFilter, BillingService};
use crate::AppState;

/// Aggregate a supplier's approved lots for one day into a bill
pub async fn aggregate_bill(
    State(state): State<AppState>,
    Json(input): Json<AggregateBillInput>,
) -> AppResult<Json<PaymentBill>> {
    let service = BillingService::new(state.db, state.events);
    let bill = service.aggregate_bill(input).await?;
    Ok(Json(bill))
}

pub async fn get_bill(
    State(state): State<AppState>,
    Path(bill_id): Path<Uuid>,
) -> AppResult<Json<PaymentBill>> {
    let service = BillingService::new(state.db, state.events);
    let bill = service.get_bill(bill_id).await?;
    Ok(Json(bill))
}

pub async fn list_bills(
    State(state): State<AppState>,
    Query(filter): Query<BillFilter>,
) -> AppResult<Json<Vec<PaymentBill>>> {
    let service = BillingService::new(state.db, state.events);
    let bills = service.list_bills(filter).await?;
    Ok(Json(bills))
}
