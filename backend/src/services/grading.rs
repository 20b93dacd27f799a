//! Lot grading and pricing service

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{LotRow, LotStatus, MilkLot, LOT_COLUMNS};
use crate::services::events::{EventKind, EventPublisher};
use crate::services::pricing::policy_for_supplier;
use shared::{grade_lot, status_after_grading, DomainError};

/// Grading service
#[derive(Clone)]
pub struct GradingService {
    db: PgPool,
    events: EventPublisher,
}

/// Price and status a lot ended up with
#[derive(Debug, Clone, Serialize)]
pub struct GradeResult {
    pub lot_id: Uuid,
    pub price_per_liter: Decimal,
    pub total_price: Decimal,
    pub status: LotStatus,
    pub pricing_policy_id: Uuid,
    pub policy_version: i32,
}

/// Load a lot and lock its row
pub async fn lock_lot(conn: &mut PgConnection, lot_id: Uuid) -> AppResult<MilkLot> {
    let row = sqlx::query_as::<_, LotRow>(&format!(
        "SELECT {} FROM milk_lots WHERE id = $1 FOR UPDATE",
        LOT_COLUMNS
    ))
    .bind(lot_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DomainError::not_found("milk lot", lot_id))?;

    Ok(MilkLot::try_from(row)?)
}

/// Grade a lot whose row is already locked and store the result
pub async fn grade_locked_lot(conn: &mut PgConnection, lot: &MilkLot) -> AppResult<GradeResult> {
    if lot.status == LotStatus::Rejected {
        return Err(DomainError::LotAlreadyRejected { lot_id: lot.id }.into());
    }

    let policy = policy_for_supplier(conn, lot.supplier_id).await?;
    let outcome = grade_lot(&lot.measurements, lot.volume_liters, &policy);
    let status = status_after_grading(lot.status, &outcome);

    sqlx::query(
        r#"
        UPDATE milk_lots
        SET price_per_liter = $2, total_price = $3, status = $4,
            pricing_policy_id = $5, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(lot.id)
    .bind(outcome.price_per_liter)
    .bind(outcome.total_price)
    .bind(status.as_str())
    .bind(policy.id)
    .execute(&mut *conn)
    .await?;

    if outcome.is_rejected() {
        tracing::warn!(
            lot_id = %lot.id,
            added_water = %lot.measurements.added_water_percent,
            limit = %policy.added_water_max,
            "Milk lot rejected for added water"
        );
    }

    Ok(GradeResult {
        lot_id: lot.id,
        price_per_liter: outcome.price_per_liter,
        total_price: outcome.total_price,
        status,
        pricing_policy_id: policy.id,
        policy_version: policy.version,
    })
}

impl GradingService {
    /// Create a new GradingService instance
    pub fn new(db: PgPool, events: EventPublisher) -> Self {
        Self { db, events }
    }

    /// Grade and price a lot against its route's active policy
    pub async fn grade(&self, lot_id: Uuid) -> AppResult<GradeResult> {
        let mut tx = self.db.begin().await?;

        let lot = lock_lot(&mut tx, lot_id).await?;
        let result = grade_locked_lot(&mut tx, &lot).await?;

        tx.commit().await?;

        tracing::info!(
            lot_id = %lot_id,
            price_per_liter = %result.price_per_liter,
            total_price = %result.total_price,
            status = %result.status,
            "Milk lot graded"
        );
        self.events.publish(EventKind::LotGraded, &result);

        Ok(result)
    }
}
