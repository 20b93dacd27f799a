//! Route pricing policies
//!
//! Policies are versioned: an update inserts a new active version and
//! deactivates the previous one in the same transaction.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{PricingPolicy, PricingPolicyRow, QualityBonus, POLICY_COLUMNS};
use shared::{validate_pricing_policy, DomainError};

/// Pricing policy service
#[derive(Clone)]
pub struct PricingService {
    db: PgPool,
}

/// Input for replacing a route's active policy
#[derive(Debug, Deserialize)]
pub struct PricingPolicyInput {
    pub base_price: Decimal,
    pub fat: QualityBonus,
    pub snf: QualityBonus,
    pub protein: QualityBonus,
    pub urea: QualityBonus,
    pub bacteria: QualityBonus,
    pub added_water_max: Decimal,
    pub water_penalty_rate: Decimal,
}

/// Active policy for a route, if any
pub async fn active_policy_for_route(
    conn: &mut PgConnection,
    route_id: Uuid,
) -> AppResult<Option<PricingPolicy>> {
    let row = sqlx::query_as::<_, PricingPolicyRow>(&format!(
        "SELECT {} FROM pricing_policies WHERE route_id = $1 AND is_active",
        POLICY_COLUMNS
    ))
    .bind(route_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(PricingPolicy::from))
}

/// Policy that prices a supplier's milk. Missing route or policy is a
/// configuration error, never a silent default.
pub async fn policy_for_supplier(
    conn: &mut PgConnection,
    supplier_id: Uuid,
) -> AppResult<PricingPolicy> {
    let route_id: Option<Uuid> =
        sqlx::query_scalar::<_, Option<Uuid>>("SELECT route_id FROM suppliers WHERE id = $1")
            .bind(supplier_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| DomainError::not_found("supplier", supplier_id))?;

    let Some(route_id) = route_id else {
        return Err(DomainError::ConfigMissing {
            route_id: None,
            supplier_id,
        }
        .into());
    };

    active_policy_for_route(conn, route_id)
        .await?
        .ok_or_else(|| {
            DomainError::ConfigMissing {
                route_id: Some(route_id),
                supplier_id,
            }
            .into()
        })
}

impl PricingService {
    /// Create a new PricingService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Get the active policy of a route
    pub async fn get_active_policy(&self, route_id: Uuid) -> AppResult<PricingPolicy> {
        let mut conn = self.db.acquire().await?;
        active_policy_for_route(&mut conn, route_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Pricing policy for route {}", route_id)))
    }

    /// Replace the active policy of a route with a new version
    pub async fn upsert_policy(
        &self,
        route_id: Uuid,
        input: PricingPolicyInput,
    ) -> AppResult<PricingPolicy> {
        let candidate = PricingPolicy {
            id: Uuid::new_v4(),
            route_id,
            version: 1,
            base_price: input.base_price,
            fat: input.fat,
            snf: input.snf,
            protein: input.protein,
            urea: input.urea,
            bacteria: input.bacteria,
            added_water_max: input.added_water_max,
            water_penalty_rate: input.water_penalty_rate,
            updated_at: Utc::now(),
        };
        validate_pricing_policy(&candidate)?;

        let mut tx = self.db.begin().await?;

        // Route row lock serializes concurrent version bumps
        sqlx::query_scalar::<_, Uuid>("SELECT id FROM routes WHERE id = $1 FOR UPDATE")
            .bind(route_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DomainError::not_found("route", route_id))?;

        let next_version: i32 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(version), 0) + 1 FROM pricing_policies WHERE route_id = $1",
        )
        .bind(route_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE pricing_policies SET is_active = FALSE, updated_at = NOW() WHERE route_id = $1 AND is_active",
        )
        .bind(route_id)
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query_as::<_, PricingPolicyRow>(&format!(
            r#"
            INSERT INTO pricing_policies (
                id, route_id, version, is_active, base_price,
                fat_min, fat_bonus, snf_min, snf_bonus, protein_min, protein_bonus,
                urea_max, urea_bonus, bacteria_max, bacteria_bonus,
                added_water_max, water_penalty_rate, updated_at
            )
            VALUES ($1, $2, $3, TRUE, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            RETURNING {}
            "#,
            POLICY_COLUMNS
        ))
        .bind(candidate.id)
        .bind(route_id)
        .bind(next_version)
        .bind(candidate.base_price)
        .bind(candidate.fat.threshold)
        .bind(candidate.fat.bonus)
        .bind(candidate.snf.threshold)
        .bind(candidate.snf.bonus)
        .bind(candidate.protein.threshold)
        .bind(candidate.protein.bonus)
        .bind(candidate.urea.threshold)
        .bind(candidate.urea.bonus)
        .bind(candidate.bacteria.threshold)
        .bind(candidate.bacteria.bonus)
        .bind(candidate.added_water_max)
        .bind(candidate.water_penalty_rate)
        .bind(candidate.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            route_id = %route_id,
            version = next_version,
            "Pricing policy updated"
        );

        Ok(row.into())
    }
}
