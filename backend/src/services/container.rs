//! Container service: bulk coolers, on-farm tanks and can collections
//!
//! All three kinds share one table and one admission path.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::AppResult;
use crate::models::{
    AdmissionCandidate, AdmissionPolicy, Container, ContainerKind, ContainerOwner, ContainerRow,
    LotRow, MilkLot, CONTAINER_COLUMNS, LOT_COLUMNS,
};
use crate::services::events::{EventKind, EventPublisher};
use shared::{
    check_next_cycle, plan_admission, validate_capacity, validate_container_name,
    validate_temperature, DomainError,
};

const DEFAULT_SANITATION_MAX_AGE_HOURS: i64 = 96;

/// Container service
#[derive(Clone)]
pub struct ContainerService {
    db: PgPool,
    events: EventPublisher,
    admission: AdmissionPolicy,
    sanitation_max_age_hours: i64,
}

/// Input for registering the first instance of a physical container
#[derive(Debug, Deserialize, Validate)]
pub struct CreateContainerInput {
    pub kind: ContainerKind,
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub route_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    pub capacity_liters: Decimal,
    pub temperature_celsius: Option<Decimal>,
    #[validate(range(min = 1, max = 3650))]
    pub service_interval_days: Option<i32>,
}

/// Hygiene and service metadata update; at least one field is required
#[derive(Debug, Default, Deserialize)]
pub struct UpdateHygieneInput {
    pub last_cleaned_at: Option<DateTime<Utc>>,
    pub last_sanitized_at: Option<DateTime<Utc>>,
    pub last_serviced_at: Option<DateTime<Utc>>,
    pub service_interval_days: Option<i32>,
    pub last_calibration_at: Option<DateTime<Utc>>,
    pub is_stirred: Option<bool>,
    pub temperature_celsius: Option<Decimal>,
}

impl UpdateHygieneInput {
    fn is_empty(&self) -> bool {
        self.last_cleaned_at.is_none()
            && self.last_sanitized_at.is_none()
            && self.last_serviced_at.is_none()
            && self.service_interval_days.is_none()
            && self.last_calibration_at.is_none()
            && self.is_stirred.is_none()
            && self.temperature_celsius.is_none()
    }
}

/// Filters for listing containers
#[derive(Debug, Default, Deserialize)]
pub struct ContainerFilter {
    pub kind: Option<ContainerKind>,
    pub route_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    #[serde(default)]
    pub include_retired: bool,
}

/// Result of an admission call
#[derive(Debug, Clone, Serialize)]
pub struct AdmissionResult {
    pub container_id: Uuid,
    pub admitted_count: usize,
    pub admitted_lot_ids: Vec<Uuid>,
    pub skipped_lot_ids: Vec<Uuid>,
    pub current_volume_liters: Decimal,
    pub capacity_liters: Decimal,
}

/// Load a container and lock its row
pub async fn lock_container(conn: &mut PgConnection, container_id: Uuid) -> AppResult<Container> {
    let row = sqlx::query_as::<_, ContainerRow>(&format!(
        "SELECT {} FROM containers WHERE id = $1 FOR UPDATE",
        CONTAINER_COLUMNS
    ))
    .bind(container_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DomainError::not_found("container", container_id))?;

    Ok(Container::try_from(row)?)
}

async fn insert_container(conn: &mut PgConnection, c: &Container) -> AppResult<Container> {
    let row = sqlx::query_as::<_, ContainerRow>(&format!(
        r#"
        INSERT INTO containers (
            id, kind, name, route_id, supplier_id, capacity_liters, current_volume_liters,
            temperature_celsius, last_cleaned_at, last_sanitized_at, last_serviced_at,
            service_interval_days, last_calibration_at, is_stirred, predecessor_id, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
        RETURNING {}
        "#,
        CONTAINER_COLUMNS
    ))
    .bind(c.id)
    .bind(c.kind.as_str())
    .bind(&c.name)
    .bind(c.owner.route_id())
    .bind(c.owner.supplier_id())
    .bind(c.capacity_liters)
    .bind(c.current_volume_liters)
    .bind(c.temperature_celsius)
    .bind(c.hygiene.last_cleaned_at)
    .bind(c.hygiene.last_sanitized_at)
    .bind(c.hygiene.last_serviced_at)
    .bind(c.hygiene.service_interval_days)
    .bind(c.hygiene.last_calibration_at)
    .bind(c.is_stirred)
    .bind(c.predecessor_id)
    .bind(c.created_at)
    .fetch_one(&mut *conn)
    .await?;

    Ok(Container::try_from(row)?)
}

impl ContainerService {
    /// Create a new ContainerService instance with strict admission defaults
    pub fn new(db: PgPool, events: EventPublisher) -> Self {
        Self {
            db,
            events,
            admission: AdmissionPolicy::default(),
            sanitation_max_age_hours: DEFAULT_SANITATION_MAX_AGE_HOURS,
        }
    }

    pub fn with_admission_policy(mut self, admission: AdmissionPolicy) -> Self {
        self.admission = admission;
        self
    }

    pub fn with_sanitation_max_age_hours(mut self, hours: i64) -> Self {
        self.sanitation_max_age_hours = hours;
        self
    }

    /// Register the first instance of a container
    pub async fn create_container(&self, input: CreateContainerInput) -> AppResult<Container> {
        input.validate()?;
        validate_container_name(&input.name)?;
        validate_capacity(input.capacity_liters, Decimal::ZERO)?;
        if let Some(t) = input.temperature_celsius {
            validate_temperature(t)?;
        }

        let owner = match (input.kind.is_supplier_owned(), input.route_id, input.supplier_id) {
            (true, None, Some(supplier_id)) => ContainerOwner::Supplier(supplier_id),
            (false, Some(route_id), None) => ContainerOwner::Route(route_id),
            (true, _, _) => {
                return Err(DomainError::validation(
                    "supplier_id",
                    format!("{} must belong to a supplier only", input.kind),
                )
                .into())
            }
            (false, _, _) => {
                return Err(DomainError::validation(
                    "route_id",
                    format!("{} must belong to a route only", input.kind),
                )
                .into())
            }
        };

        let owner_exists: bool = match owner {
            ContainerOwner::Route(id) => {
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM routes WHERE id = $1)")
                    .bind(id)
                    .fetch_one(&self.db)
                    .await?
            }
            ContainerOwner::Supplier(id) => {
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM suppliers WHERE id = $1)")
                    .bind(id)
                    .fetch_one(&self.db)
                    .await?
            }
        };
        if !owner_exists {
            let (entity, id) = match owner {
                ContainerOwner::Route(id) => ("route", id),
                ContainerOwner::Supplier(id) => ("supplier", id),
            };
            return Err(DomainError::not_found(entity, id).into());
        }

        let mut container = Container::new(
            input.kind,
            input.name.trim(),
            owner,
            input.capacity_liters,
            Utc::now(),
        );
        container.temperature_celsius = input.temperature_celsius;
        container.hygiene.service_interval_days = input.service_interval_days.unwrap_or(30);

        let mut conn = self.db.acquire().await?;
        let created = insert_container(&mut conn, &container).await?;

        tracing::info!(container_id = %created.id, kind = created.kind.as_str(), name = %created.name, "Container registered");
        Ok(created)
    }

    /// Get a container by ID
    pub async fn get_container(&self, container_id: Uuid) -> AppResult<Container> {
        let row = sqlx::query_as::<_, ContainerRow>(&format!(
            "SELECT {} FROM containers WHERE id = $1",
            CONTAINER_COLUMNS
        ))
        .bind(container_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| DomainError::not_found("container", container_id))?;

        Ok(Container::try_from(row)?)
    }

    /// List containers; retired instances are hidden unless asked for
    pub async fn list_containers(&self, filter: ContainerFilter) -> AppResult<Vec<Container>> {
        let rows = sqlx::query_as::<_, ContainerRow>(&format!(
            r#"
            SELECT {}
            FROM containers
            WHERE ($1::varchar IS NULL OR kind = $1)
              AND ($2::uuid IS NULL OR route_id = $2)
              AND ($3::uuid IS NULL OR supplier_id = $3)
              AND ($4 OR emptied_at IS NULL)
            ORDER BY created_at DESC
            "#,
            CONTAINER_COLUMNS
        ))
        .bind(filter.kind.map(|k| k.as_str()))
        .bind(filter.route_id)
        .bind(filter.supplier_id)
        .bind(filter.include_retired)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter()
            .map(|r| Container::try_from(r).map_err(Into::into))
            .collect()
    }

    /// Lots poured into a container
    pub async fn list_container_lots(&self, container_id: Uuid) -> AppResult<Vec<MilkLot>> {
        // Distinguish an empty container from a missing one
        self.get_container(container_id).await?;

        let rows = sqlx::query_as::<_, LotRow>(&format!(
            "SELECT {} FROM milk_lots WHERE container_id = $1 ORDER BY created_at",
            LOT_COLUMNS
        ))
        .bind(container_id)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter()
            .map(|r| MilkLot::try_from(r).map_err(Into::into))
            .collect()
    }

    /// Admit a batch of lots into a container, all or nothing
    pub async fn admit_lots(
        &self,
        container_id: Uuid,
        lot_ids: Vec<Uuid>,
    ) -> AppResult<AdmissionResult> {
        let mut tx = self.db.begin().await?;

        let mut container = lock_container(&mut tx, container_id).await?;

        let rows = sqlx::query_as::<_, LotRow>(&format!(
            "SELECT {} FROM milk_lots WHERE id = ANY($1) ORDER BY id FOR UPDATE",
            LOT_COLUMNS
        ))
        .bind(&lot_ids)
        .fetch_all(&mut *tx)
        .await?;
        let lots = rows
            .into_iter()
            .map(MilkLot::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(missing) = lot_ids
            .iter()
            .find(|id| !lots.iter().any(|lot| lot.id == **id))
        {
            return Err(DomainError::not_found("milk lot", *missing).into());
        }

        // Keep request order for the plan
        let candidates: Vec<AdmissionCandidate> = lot_ids
            .iter()
            .filter_map(|id| lots.iter().find(|lot| lot.id == *id))
            .map(|lot| AdmissionCandidate {
                lot_id: lot.id,
                status: lot.status,
                volume_liters: lot.volume_liters,
                storage: lot.storage,
            })
            .collect();

        let plan = match plan_admission(&container, &candidates, &self.admission) {
            Ok(plan) => plan,
            Err(e) => {
                tracing::warn!(container_id = %container_id, "Admission refused: {}", e);
                return Err(e.into());
            }
        };

        if !plan.admitted.is_empty() {
            sqlx::query(
                r#"
                UPDATE milk_lots
                SET container_id = $1, container_kind = $2, updated_at = NOW()
                WHERE id = ANY($3)
                "#,
            )
            .bind(container.id)
            .bind(container.kind.as_str())
            .bind(&plan.admitted)
            .execute(&mut *tx)
            .await?;

            let now = Utc::now();
            container.apply_admission(&plan, now);
            sqlx::query(
                "UPDATE containers SET current_volume_liters = $2, filled_at = $3 WHERE id = $1",
            )
            .bind(container.id)
            .bind(container.current_volume_liters)
            .bind(container.filled_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        if plan.overflowed {
            tracing::warn!(
                container_id = %container_id,
                capacity = %container.capacity_liters,
                current = %container.current_volume_liters,
                "Batch does not fit, nothing admitted"
            );
        }

        let result = AdmissionResult {
            container_id,
            admitted_count: plan.admitted_count(),
            admitted_lot_ids: plan.admitted,
            skipped_lot_ids: plan.skipped,
            current_volume_liters: container.current_volume_liters,
            capacity_liters: container.capacity_liters,
        };

        if result.admitted_count > 0 {
            tracing::info!(
                container_id = %container_id,
                admitted = result.admitted_count,
                current_volume = %result.current_volume_liters,
                "Lots admitted"
            );
            self.events.publish(EventKind::LotsAdmitted, &result);
        }

        Ok(result)
    }

    /// Open the next collection cycle of a physical container
    pub async fn open_next_cycle(
        &self,
        container_id: Uuid,
        confirm_override: bool,
    ) -> AppResult<Container> {
        let mut tx = self.db.begin().await?;

        let previous = lock_container(&mut tx, container_id).await?;

        let last_opened_on: Option<NaiveDate> = sqlx::query_scalar(
            r#"
            SELECT MAX((created_at AT TIME ZONE 'UTC')::date)
            FROM containers
            WHERE kind = $1 AND name = $2
              AND route_id IS NOT DISTINCT FROM $3
              AND supplier_id IS NOT DISTINCT FROM $4
            "#,
        )
        .bind(previous.kind.as_str())
        .bind(&previous.name)
        .bind(previous.owner.route_id())
        .bind(previous.owner.supplier_id())
        .fetch_one(&mut *tx)
        .await?;

        let now = Utc::now();
        if let Err(e) = check_next_cycle(
            &previous,
            last_opened_on,
            now,
            self.sanitation_max_age_hours,
            confirm_override,
        ) {
            tracing::warn!(container_id = %container_id, "Next cycle refused: {}", e);
            return Err(e.into());
        }

        let next = insert_container(&mut tx, &previous.next_cycle(now)).await?;

        tx.commit().await?;

        tracing::info!(
            container_id = %next.id,
            predecessor_id = %container_id,
            overridden = confirm_override,
            "Container cycle opened"
        );
        self.events.publish(
            EventKind::ContainerOpened,
            serde_json::json!({
                "container_id": next.id,
                "predecessor_id": container_id,
                "kind": next.kind,
                "name": next.name,
            }),
        );

        Ok(next)
    }

    /// Update cleaning, sanitizing, service and calibration metadata
    pub async fn update_hygiene(
        &self,
        container_id: Uuid,
        input: UpdateHygieneInput,
    ) -> AppResult<Container> {
        if input.is_empty() {
            return Err(DomainError::validation("hygiene", "No fields provided").into());
        }
        if matches!(input.service_interval_days, Some(d) if d <= 0) {
            return Err(
                DomainError::validation("service_interval_days", "must be greater than 0").into(),
            );
        }
        if let Some(t) = input.temperature_celsius {
            validate_temperature(t)?;
        }

        let row = sqlx::query_as::<_, ContainerRow>(&format!(
            r#"
            UPDATE containers
            SET last_cleaned_at = COALESCE($2, last_cleaned_at),
                last_sanitized_at = COALESCE($3, last_sanitized_at),
                last_serviced_at = COALESCE($4, last_serviced_at),
                service_interval_days = COALESCE($5, service_interval_days),
                last_calibration_at = COALESCE($6, last_calibration_at),
                is_stirred = COALESCE($7, is_stirred),
                temperature_celsius = COALESCE($8, temperature_celsius)
            WHERE id = $1
            RETURNING {}
            "#,
            CONTAINER_COLUMNS
        ))
        .bind(container_id)
        .bind(input.last_cleaned_at)
        .bind(input.last_sanitized_at)
        .bind(input.last_serviced_at)
        .bind(input.service_interval_days)
        .bind(input.last_calibration_at)
        .bind(input.is_stirred)
        .bind(input.temperature_celsius)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| DomainError::not_found("container", container_id))?;

        tracing::info!(container_id = %container_id, "Container hygiene updated");
        Ok(Container::try_from(row)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_hygiene_update_is_detected() {
        assert!(UpdateHygieneInput::default().is_empty());
        let input = UpdateHygieneInput {
            is_stirred: Some(true),
            ..Default::default()
        };
        assert!(!input.is_empty());
    }
}
