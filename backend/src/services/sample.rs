//! Composite sample service and verdict propagation

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::AppResult;
use crate::models::{
    CompositeSample, SampleResults, SampleRow, SampleSource, Verdict, SAMPLE_COLUMNS,
};
use crate::services::events::{EventKind, EventPublisher};
use shared::{lot_effect, resolve_verdict, validate_sample_results, DomainError, VerdictChange};

/// Composite sample service
#[derive(Clone)]
pub struct SampleService {
    db: PgPool,
    events: EventPublisher,
}

/// Input for drawing a sample; exactly one source id must be set
#[derive(Debug, Deserialize, Validate)]
pub struct CreateSampleInput {
    pub bulk_cooler_id: Option<Uuid>,
    pub on_farm_tank_id: Option<Uuid>,
    pub can_collection_id: Option<Uuid>,
    pub vehicle_id: Option<Uuid>,
    #[validate(range(min = 1, max = 5000))]
    pub sample_volume_ml: Option<i32>,
    pub temperature_celsius: Option<Decimal>,
    pub collected_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub results: SampleResults,
    #[validate(length(max = 1000))]
    pub remark: Option<String>,
}

/// Lab results for a pending sample
#[derive(Debug, Deserialize)]
pub struct LabResultsInput {
    #[serde(flatten)]
    pub results: SampleResults,
    pub received_at_lab: Option<DateTime<Utc>>,
    pub remark: Option<String>,
}

/// Filters for listing samples
#[derive(Debug, Default, Deserialize)]
pub struct SampleFilter {
    pub container_id: Option<Uuid>,
    pub vehicle_id: Option<Uuid>,
    pub verdict: Option<Verdict>,
}

/// Outcome of recording a verdict
#[derive(Debug, Clone, Serialize)]
pub struct VerdictResult {
    pub sample_id: Uuid,
    pub verdict: Verdict,
    pub affected_lots: u64,
    pub changed: bool,
}

async fn lock_sample(conn: &mut PgConnection, sample_id: Uuid) -> AppResult<CompositeSample> {
    let row = sqlx::query_as::<_, SampleRow>(&format!(
        "SELECT {} FROM composite_samples WHERE id = $1 FOR UPDATE",
        SAMPLE_COLUMNS
    ))
    .bind(sample_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DomainError::not_found("composite sample", sample_id))?;

    Ok(CompositeSample::try_from(row)?)
}

impl SampleService {
    /// Create a new SampleService instance
    pub fn new(db: PgPool, events: EventPublisher) -> Self {
        Self { db, events }
    }

    /// Record a sample drawn from one container or one vehicle
    pub async fn create_sample(&self, input: CreateSampleInput) -> AppResult<CompositeSample> {
        input.validate()?;
        validate_sample_results(&input.results)?;

        let source = SampleSource::from_parts(
            input.bulk_cooler_id,
            input.on_farm_tank_id,
            input.can_collection_id,
            input.vehicle_id,
        )?;

        let is_stirred = match source {
            SampleSource::Container { storage } => {
                let (kind, is_stirred): (String, bool) =
                    sqlx::query_as("SELECT kind, is_stirred FROM containers WHERE id = $1")
                        .bind(storage.id)
                        .fetch_optional(&self.db)
                        .await?
                        .ok_or_else(|| DomainError::not_found("container", storage.id))?;
                if kind != storage.kind.as_str() {
                    return Err(DomainError::ExclusivitySourceConflict {
                        expected: Some(storage.kind.as_str().to_string()),
                        provided: vec![kind],
                    }
                    .into());
                }
                Some(is_stirred)
            }
            SampleSource::Vehicle { vehicle_id } => {
                let exists: bool =
                    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM vehicles WHERE id = $1)")
                        .bind(vehicle_id)
                        .fetch_one(&self.db)
                        .await?;
                if !exists {
                    return Err(DomainError::not_found("vehicle", vehicle_id).into());
                }
                None
            }
        };

        let r = &input.results;
        let storage = source.storage();
        let row = sqlx::query_as::<_, SampleRow>(&format!(
            r#"
            INSERT INTO composite_samples (
                id, container_id, container_kind, vehicle_id, sample_type, sample_volume_ml,
                temperature_celsius, is_stirred, collected_at, fat_percent, snf_percent,
                protein_percent, bacterial_count, antibiotic_residue, added_water_percent,
                cob_test, alcohol_test, ph_value, mbrt_minutes, remark
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)
            RETURNING {}
            "#,
            SAMPLE_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(storage.map(|s| s.id))
        .bind(storage.map(|s| s.kind.as_str()))
        .bind(source.vehicle_id())
        .bind(source.sample_type().as_str())
        .bind(input.sample_volume_ml.unwrap_or(50))
        .bind(input.temperature_celsius.unwrap_or_else(|| Decimal::new(40, 1)))
        .bind(is_stirred)
        .bind(input.collected_at.unwrap_or_else(Utc::now))
        .bind(r.fat_percent)
        .bind(r.snf_percent)
        .bind(r.protein_percent)
        .bind(r.bacterial_count)
        .bind(r.antibiotic_residue)
        .bind(r.added_water_percent)
        .bind(r.cob_test)
        .bind(r.alcohol_test)
        .bind(r.ph_value)
        .bind(r.mbrt_minutes)
        .bind(&input.remark)
        .fetch_one(&self.db)
        .await?;

        let sample = CompositeSample::try_from(row)?;
        tracing::info!(
            sample_id = %sample.id,
            sample_type = sample.sample_type.as_str(),
            "Composite sample recorded"
        );
        Ok(sample)
    }

    /// Get a sample by ID
    pub async fn get_sample(&self, sample_id: Uuid) -> AppResult<CompositeSample> {
        let row = sqlx::query_as::<_, SampleRow>(&format!(
            "SELECT {} FROM composite_samples WHERE id = $1",
            SAMPLE_COLUMNS
        ))
        .bind(sample_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| DomainError::not_found("composite sample", sample_id))?;

        Ok(CompositeSample::try_from(row)?)
    }

    /// List samples, newest first
    pub async fn list_samples(&self, filter: SampleFilter) -> AppResult<Vec<CompositeSample>> {
        let rows = sqlx::query_as::<_, SampleRow>(&format!(
            r#"
            SELECT {}
            FROM composite_samples
            WHERE ($1::uuid IS NULL OR container_id = $1)
              AND ($2::uuid IS NULL OR vehicle_id = $2)
              AND ($3::varchar IS NULL OR verdict = $3)
            ORDER BY collected_at DESC
            "#,
            SAMPLE_COLUMNS
        ))
        .bind(filter.container_id)
        .bind(filter.vehicle_id)
        .bind(filter.verdict.map(|v| v.as_str()))
        .fetch_all(&self.db)
        .await?;

        rows.into_iter()
            .map(|r| CompositeSample::try_from(r).map_err(Into::into))
            .collect()
    }

    /// Record lab results; only allowed while the verdict is pending
    pub async fn record_lab_results(
        &self,
        sample_id: Uuid,
        input: LabResultsInput,
    ) -> AppResult<CompositeSample> {
        validate_sample_results(&input.results)?;

        let mut tx = self.db.begin().await?;
        let sample = lock_sample(&mut tx, sample_id).await?;
        if sample.verdict.is_final() {
            return Err(DomainError::InvalidStatusTransition {
                entity: "composite sample".to_string(),
                from: sample.verdict.to_string(),
                to: "lab results updated".to_string(),
            }
            .into());
        }

        let r = &input.results;
        let row = sqlx::query_as::<_, SampleRow>(&format!(
            r#"
            UPDATE composite_samples
            SET fat_percent = $2, snf_percent = $3, protein_percent = $4, bacterial_count = $5,
                antibiotic_residue = $6, added_water_percent = $7, cob_test = $8,
                alcohol_test = $9, ph_value = $10, mbrt_minutes = $11,
                received_at_lab = COALESCE($12, received_at_lab, NOW()),
                remark = COALESCE($13, remark), updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            SAMPLE_COLUMNS
        ))
        .bind(sample_id)
        .bind(r.fat_percent)
        .bind(r.snf_percent)
        .bind(r.protein_percent)
        .bind(r.bacterial_count)
        .bind(r.antibiotic_residue)
        .bind(r.added_water_percent)
        .bind(r.cob_test)
        .bind(r.alcohol_test)
        .bind(r.ph_value)
        .bind(r.mbrt_minutes)
        .bind(input.received_at_lab)
        .bind(&input.remark)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(CompositeSample::try_from(row)?)
    }

    /// Record the final verdict and apply it to every lot in the sampled
    /// container. Recording the same verdict again changes nothing.
    pub async fn record_verdict(&self, sample_id: Uuid, verdict: Verdict) -> AppResult<VerdictResult> {
        let mut tx = self.db.begin().await?;

        let sample = lock_sample(&mut tx, sample_id).await?;
        let applied = match resolve_verdict(sample_id, sample.verdict, verdict) {
            Ok(VerdictChange::Apply(v)) => v,
            Ok(VerdictChange::Unchanged) => {
                tx.commit().await?;
                tracing::debug!(sample_id = %sample_id, verdict = %verdict, "Verdict already recorded");
                return Ok(VerdictResult {
                    sample_id,
                    verdict,
                    affected_lots: 0,
                    changed: false,
                });
            }
            Err(e) => {
                tracing::warn!(sample_id = %sample_id, "Verdict refused: {}", e);
                return Err(e.into());
            }
        };

        let mut affected_lots = 0;
        if let (Some(storage), Some(effect)) = (sample.source.storage(), lot_effect(applied)) {
            // Container lock serializes with concurrent admissions
            sqlx::query("SELECT id FROM containers WHERE id = $1 FOR UPDATE")
                .bind(storage.id)
                .execute(&mut *tx)
                .await?;

            let statuses: Vec<&str> = effect
                .affected_statuses()
                .iter()
                .map(|s| s.as_str())
                .collect();

            // Same rule as LotVerdictEffect::apply, set-wise
            affected_lots = sqlx::query(
                r#"
                UPDATE milk_lots
                SET status = $2,
                    price_per_liter = CASE WHEN $3 THEN 0 ELSE price_per_liter END,
                    total_price = CASE WHEN $3 THEN 0 ELSE total_price END,
                    updated_at = NOW()
                WHERE container_id = $1
                  AND status = ANY($4)
                "#,
            )
            .bind(storage.id)
            .bind(effect.status.as_str())
            .bind(effect.zero_price)
            .bind(&statuses)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }

        sqlx::query(
            "UPDATE composite_samples SET verdict = $2, verdict_at = NOW(), updated_at = NOW() WHERE id = $1",
        )
        .bind(sample_id)
        .bind(applied.as_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let result = VerdictResult {
            sample_id,
            verdict: applied,
            affected_lots,
            changed: true,
        };

        tracing::info!(
            sample_id = %sample_id,
            verdict = %applied,
            affected_lots,
            "Sample verdict applied"
        );
        self.events.publish(EventKind::VerdictApplied, &result);

        Ok(result)
    }
}
