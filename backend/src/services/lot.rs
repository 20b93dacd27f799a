//! Milk lot management service

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::error::AppResult;
use crate::models::{LabMeasurements, LotRow, LotStatus, MilkLot, LOT_COLUMNS};
use crate::services::events::{EventKind, EventPublisher};
use crate::services::grading::{grade_locked_lot, lock_lot};
use shared::{validate_measurements, validate_volume, DomainError};

/// Lot service for recording supplier pickups
#[derive(Clone)]
pub struct LotService {
    db: PgPool,
    events: EventPublisher,
}

/// Input for recording a lot
#[derive(Debug, Deserialize, Validate)]
pub struct CreateLotInput {
    pub supplier_id: Uuid,
    #[validate(length(max = 100))]
    pub tester_name: Option<String>,
    pub volume_liters: Decimal,
    pub measurements: LabMeasurements,
    pub collected_on: Option<NaiveDate>,
}

/// Filters for listing lots
#[derive(Debug, Default, Deserialize)]
pub struct LotFilter {
    pub supplier_id: Option<Uuid>,
    pub status: Option<LotStatus>,
    pub container_id: Option<Uuid>,
    pub collected_on: Option<NaiveDate>,
}

impl LotService {
    /// Create a new LotService instance
    pub fn new(db: PgPool, events: EventPublisher) -> Self {
        Self { db, events }
    }

    /// Record a new, ungraded lot
    pub async fn create_lot(&self, input: CreateLotInput) -> AppResult<MilkLot> {
        input.validate()?;
        validate_volume("volume_liters", input.volume_liters)?;
        validate_measurements(&input.measurements)?;

        let supplier_exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM suppliers WHERE id = $1)")
                .bind(input.supplier_id)
                .fetch_one(&self.db)
                .await?;
        if !supplier_exists {
            return Err(DomainError::not_found("supplier", input.supplier_id).into());
        }

        let m = &input.measurements;
        let row = sqlx::query_as::<_, LotRow>(&format!(
            r#"
            INSERT INTO milk_lots (
                id, supplier_id, tester_name, volume_liters, fat_percent, protein_percent,
                lactose_percent, total_solids_percent, snf_percent, urea_nitrogen,
                bacterial_count, added_water_percent, collected_on
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {}
            "#,
            LOT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(input.supplier_id)
        .bind(&input.tester_name)
        .bind(input.volume_liters)
        .bind(m.fat_percent)
        .bind(m.protein_percent)
        .bind(m.lactose_percent)
        .bind(m.total_solids_percent)
        .bind(m.snf_percent)
        .bind(m.urea_nitrogen)
        .bind(m.bacterial_count)
        .bind(m.added_water_percent)
        .bind(input.collected_on.unwrap_or_else(|| Utc::now().date_naive()))
        .fetch_one(&self.db)
        .await?;

        let lot = MilkLot::try_from(row)?;
        tracing::info!(lot_id = %lot.id, supplier_id = %lot.supplier_id, volume = %lot.volume_liters, "Milk lot recorded");
        Ok(lot)
    }

    /// Get a lot by ID
    pub async fn get_lot(&self, lot_id: Uuid) -> AppResult<MilkLot> {
        let row = sqlx::query_as::<_, LotRow>(&format!(
            "SELECT {} FROM milk_lots WHERE id = $1",
            LOT_COLUMNS
        ))
        .bind(lot_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| DomainError::not_found("milk lot", lot_id))?;

        Ok(MilkLot::try_from(row)?)
    }

    /// List lots, newest first
    pub async fn list_lots(&self, filter: LotFilter) -> AppResult<Vec<MilkLot>> {
        let rows = sqlx::query_as::<_, LotRow>(&format!(
            r#"
            SELECT {}
            FROM milk_lots
            WHERE ($1::uuid IS NULL OR supplier_id = $1)
              AND ($2::varchar IS NULL OR status = $2)
              AND ($3::uuid IS NULL OR container_id = $3)
              AND ($4::date IS NULL OR collected_on = $4)
            ORDER BY created_at DESC
            "#,
            LOT_COLUMNS
        ))
        .bind(filter.supplier_id)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.container_id)
        .bind(filter.collected_on)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter()
            .map(|r| MilkLot::try_from(r).map_err(Into::into))
            .collect()
    }

    /// Replace a lot's lab measurements. A lot that was already priced is
    /// re-graded against the current policy in the same transaction.
    pub async fn update_lab_results(
        &self,
        lot_id: Uuid,
        measurements: LabMeasurements,
    ) -> AppResult<MilkLot> {
        validate_measurements(&measurements)?;

        let mut tx = self.db.begin().await?;
        let lot = lock_lot(&mut tx, lot_id).await?;
        if lot.status == LotStatus::Rejected {
            return Err(DomainError::LotAlreadyRejected { lot_id }.into());
        }

        sqlx::query(
            r#"
            UPDATE milk_lots
            SET fat_percent = $2, protein_percent = $3, lactose_percent = $4,
                total_solids_percent = $5, snf_percent = $6, urea_nitrogen = $7,
                bacterial_count = $8, added_water_percent = $9, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(lot_id)
        .bind(measurements.fat_percent)
        .bind(measurements.protein_percent)
        .bind(measurements.lactose_percent)
        .bind(measurements.total_solids_percent)
        .bind(measurements.snf_percent)
        .bind(measurements.urea_nitrogen)
        .bind(measurements.bacterial_count)
        .bind(measurements.added_water_percent)
        .execute(&mut *tx)
        .await?;

        let regraded = if lot.is_graded() {
            let updated = MilkLot {
                measurements,
                ..lot
            };
            Some(grade_locked_lot(&mut tx, &updated).await?)
        } else {
            None
        };

        tx.commit().await?;

        if let Some(result) = &regraded {
            tracing::info!(lot_id = %lot_id, price_per_liter = %result.price_per_liter, "Milk lot re-graded after lab update");
            self.events.publish(EventKind::LotGraded, result);
        }

        self.get_lot(lot_id).await
    }
}
