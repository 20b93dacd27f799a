//! Silo service and volume reconciliation

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::AppResult;
use crate::models::{Silo, SiloRow, SILO_COLUMNS};
use crate::services::events::{EventKind, EventPublisher};
use shared::{check_reconciled, reconcile_volume, validate_capacity, DomainError};

/// Silo service
#[derive(Clone)]
pub struct SiloService {
    db: PgPool,
    events: EventPublisher,
}

/// Input for registering a silo
#[derive(Debug, Deserialize, Validate)]
pub struct CreateSiloInput {
    pub plant_id: Uuid,
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 1, max = 50))]
    pub code: String,
    pub capacity_liters: Decimal,
}

/// Result of a reconciliation
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileResult {
    pub silo_id: Uuid,
    pub current_volume_liters: Decimal,
    pub capacity_liters: Decimal,
    pub completed_transfers: usize,
}

/// Load a silo and lock its row
pub async fn lock_silo(conn: &mut PgConnection, silo_id: Uuid) -> AppResult<Silo> {
    let row = sqlx::query_as::<_, SiloRow>(&format!(
        "SELECT {} FROM silos WHERE id = $1 FOR UPDATE",
        SILO_COLUMNS
    ))
    .bind(silo_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DomainError::not_found("silo", silo_id))?;

    Ok(row.into())
}

/// Recompute a silo's volume from its completed transfers.
/// Must run inside the caller's transaction.
pub async fn reconcile_in_tx(conn: &mut PgConnection, silo_id: Uuid) -> AppResult<ReconcileResult> {
    let silo = lock_silo(conn, silo_id).await?;

    let volumes: Vec<Decimal> = sqlx::query_scalar(
        "SELECT total_volume_liters FROM milk_transfers WHERE silo_id = $1 AND status = 'completed'",
    )
    .bind(silo_id)
    .fetch_all(&mut *conn)
    .await?;

    let completed_transfers = volumes.len();
    let reconciled = reconcile_volume(volumes);
    if let Err(e) = check_reconciled(&silo, reconciled) {
        tracing::warn!(silo_id = %silo_id, reconciled = %reconciled, "Silo reconciliation overflows: {}", e);
        return Err(e.into());
    }

    sqlx::query(
        "UPDATE silos SET current_volume_liters = $2, reconciled_at = NOW() WHERE id = $1",
    )
    .bind(silo_id)
    .bind(reconciled)
    .execute(&mut *conn)
    .await?;

    Ok(ReconcileResult {
        silo_id,
        current_volume_liters: reconciled,
        capacity_liters: silo.capacity_liters,
        completed_transfers,
    })
}

impl SiloService {
    /// Create a new SiloService instance
    pub fn new(db: PgPool, events: EventPublisher) -> Self {
        Self { db, events }
    }

    pub async fn create_silo(&self, input: CreateSiloInput) -> AppResult<Silo> {
        input.validate()?;
        validate_capacity(input.capacity_liters, Decimal::ZERO)?;

        let plant_exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM plants WHERE id = $1)")
                .bind(input.plant_id)
                .fetch_one(&self.db)
                .await?;
        if !plant_exists {
            return Err(DomainError::not_found("plant", input.plant_id).into());
        }

        let row = sqlx::query_as::<_, SiloRow>(&format!(
            r#"
            INSERT INTO silos (id, plant_id, name, code, capacity_liters)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            SILO_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(input.plant_id)
        .bind(input.name.trim())
        .bind(input.code.trim())
        .bind(input.capacity_liters)
        .fetch_one(&self.db)
        .await?;

        Ok(row.into())
    }

    /// Get a silo by ID
    pub async fn get_silo(&self, silo_id: Uuid) -> AppResult<Silo> {
        let row = sqlx::query_as::<_, SiloRow>(&format!(
            "SELECT {} FROM silos WHERE id = $1",
            SILO_COLUMNS
        ))
        .bind(silo_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| DomainError::not_found("silo", silo_id))?;

        Ok(row.into())
    }

    /// List silos of a plant, or all silos
    pub async fn list_silos(&self, plant_id: Option<Uuid>) -> AppResult<Vec<Silo>> {
        let rows = sqlx::query_as::<_, SiloRow>(&format!(
            "SELECT {} FROM silos WHERE ($1::uuid IS NULL OR plant_id = $1) ORDER BY code",
            SILO_COLUMNS
        ))
        .bind(plant_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Silo::from).collect())
    }

    /// Recompute a silo's current volume. Idempotent.
    pub async fn reconcile(&self, silo_id: Uuid) -> AppResult<ReconcileResult> {
        let mut tx = self.db.begin().await?;
        let result = reconcile_in_tx(&mut tx, silo_id).await?;
        tx.commit().await?;

        tracing::info!(
            silo_id = %silo_id,
            current_volume = %result.current_volume_liters,
            transfers = result.completed_transfers,
            "Silo reconciled"
        );
        self.events.publish(EventKind::SiloReconciled, &result);

        Ok(result)
    }
}
