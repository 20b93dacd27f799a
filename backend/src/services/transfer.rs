//! Milk transfer coordination: creation, the status lifecycle, silo
//! assignment and gate release

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{
    ContainerKind, GateWindow, MilkTransfer, SampleRow, SourceSnapshot, TransferRow,
    TransferStatus, Vehicle, WeightCapture, SAMPLE_COLUMNS, TRANSFER_COLUMNS,
};
use crate::services::container::lock_container;
use crate::services::events::{EventKind, EventPublisher};
use crate::services::silo::{lock_silo, reconcile_in_tx, ReconcileResult};
use shared::{
    is_gate_released, resolve_destination, validate_new_transfer, validate_volume, CompositeSample,
    DomainError, SiloBooking,
};

/// Partial unique index holding at most one open transfer per container
pub const OPEN_TRANSFER_INDEX: &str = "milk_transfers_one_open_per_source";

/// Transfer service
#[derive(Clone)]
pub struct TransferService {
    db: PgPool,
    events: EventPublisher,
    gate_window: GateWindow,
}

/// Input for creating a transfer
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTransferInput {
    pub source_type: String,
    pub source_id: Uuid,
    pub vehicle_id: Option<Uuid>,
    pub destination_plant_id: Option<Uuid>,
    pub silo_id: Option<Uuid>,
    #[validate(length(max = 1000))]
    pub remarks: Option<String>,
}

/// Departure details
#[derive(Debug, Default, Deserialize)]
pub struct DispatchInput {
    pub departed_at: Option<DateTime<Utc>>,
    pub departure_weight_kg: Option<Decimal>,
}

/// Arrival details
#[derive(Debug, Default, Deserialize)]
pub struct CompleteInput {
    pub arrival_at: Option<DateTime<Utc>>,
    pub departure_weight_kg: Option<Decimal>,
    pub arrival_weight_kg: Option<Decimal>,
    pub remarks: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelInput {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AssignSiloInput {
    pub silo_id: Uuid,
}

/// Filters for listing transfers
#[derive(Debug, Default, Deserialize)]
pub struct TransferFilter {
    pub status: Option<TransferStatus>,
    pub vehicle_id: Option<Uuid>,
    pub destination_plant_id: Option<Uuid>,
    pub silo_id: Option<Uuid>,
    pub source_id: Option<Uuid>,
}

/// Transfer as returned to callers, with shrinkage when both weights exist
#[derive(Debug, Clone, Serialize)]
pub struct TransferDetails {
    #[serde(flatten)]
    pub transfer: MilkTransfer,
    pub shrinkage_kg: Option<Decimal>,
}

impl From<MilkTransfer> for TransferDetails {
    fn from(transfer: MilkTransfer) -> Self {
        let shrinkage_kg = transfer.shrinkage_kg();
        Self {
            transfer,
            shrinkage_kg,
        }
    }
}

/// Transfer after a step that may have reconciled its silo
#[derive(Debug, Clone, Serialize)]
pub struct TransferOutcome {
    pub transfer: TransferDetails,
    pub silo: Option<ReconcileResult>,
}

async fn lock_transfer(conn: &mut PgConnection, transfer_id: Uuid) -> AppResult<MilkTransfer> {
    let row = sqlx::query_as::<_, TransferRow>(&format!(
        "SELECT {} FROM milk_transfers WHERE id = $1 FOR UPDATE",
        TRANSFER_COLUMNS
    ))
    .bind(transfer_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DomainError::not_found("milk transfer", transfer_id))?;

    Ok(MilkTransfer::try_from(row)?)
}

async fn fetch_transfer(conn: &mut PgConnection, transfer_id: Uuid) -> AppResult<MilkTransfer> {
    let row = sqlx::query_as::<_, TransferRow>(&format!(
        "SELECT {} FROM milk_transfers WHERE id = $1",
        TRANSFER_COLUMNS
    ))
    .bind(transfer_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(MilkTransfer::try_from(row)?)
}

/// Liters that open transfers are already bringing to a silo.
/// Callers hold the silo lock so the sum cannot move underneath them.
async fn booked_liters(conn: &mut PgConnection, silo_id: Uuid) -> AppResult<Decimal> {
    let booked: Decimal = sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(total_volume_liters), 0)
        FROM milk_transfers
        WHERE silo_id = $1 AND status IN ('scheduled', 'in_transit')
        "#,
    )
    .bind(silo_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(booked)
}

async fn ensure_plant_exists(conn: &mut PgConnection, plant_id: Uuid) -> AppResult<()> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM plants WHERE id = $1)")
        .bind(plant_id)
        .fetch_one(&mut *conn)
        .await?;
    if !exists {
        return Err(DomainError::not_found("plant", plant_id).into());
    }
    Ok(())
}

/// Map a race on the open-transfer index to the domain conflict
fn map_open_transfer_conflict(err: sqlx::Error, container_id: Uuid) -> AppError {
    let is_conflict = matches!(
        &err,
        sqlx::Error::Database(db_err) if db_err.constraint() == Some(OPEN_TRANSFER_INDEX)
    );

    if is_conflict {
        DomainError::DuplicateOpenTransfer {
            container_id,
            existing_transfer_id: None,
        }
        .into()
    } else {
        err.into()
    }
}

fn validate_weights(weights: &WeightCapture) -> AppResult<()> {
    if let Some(w) = weights.departure_weight_kg {
        validate_volume("departure_weight_kg", w)?;
    }
    if let Some(w) = weights.arrival_weight_kg {
        validate_volume("arrival_weight_kg", w)?;
    }
    Ok(())
}

impl TransferService {
    /// Create a new TransferService instance
    pub fn new(db: PgPool, events: EventPublisher) -> Self {
        Self {
            db,
            events,
            gate_window: GateWindow::default(),
        }
    }

    pub fn with_gate_window(mut self, gate_window: GateWindow) -> Self {
        self.gate_window = gate_window;
        self
    }

    /// Move the whole contents of one container towards a silo.
    ///
    /// The container is retired on success; cancelling the transfer
    /// re-opens it.
    pub async fn create_transfer(&self, input: CreateTransferInput) -> AppResult<TransferDetails> {
        input.validate()?;
        let declared: ContainerKind = input.source_type.parse()?;

        let mut tx = self.db.begin().await?;

        let container = lock_container(&mut tx, input.source_id).await?;

        let open_transfer_id: Option<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id FROM milk_transfers
            WHERE source_container_id = $1 AND status IN ('scheduled', 'in_transit')
            "#,
        )
        .bind(container.id)
        .fetch_optional(&mut *tx)
        .await?;

        let silo = match input.silo_id {
            Some(silo_id) => Some(lock_silo(&mut tx, silo_id).await?),
            None => None,
        };
        let booked = match &silo {
            Some(s) => booked_liters(&mut tx, s.id).await?,
            None => Decimal::ZERO,
        };

        if let Some(vehicle_id) = input.vehicle_id {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM vehicles WHERE id = $1)")
                    .bind(vehicle_id)
                    .fetch_one(&mut *tx)
                    .await?;
            if !exists {
                return Err(DomainError::not_found("vehicle", vehicle_id).into());
            }
        }

        let snapshot = SourceSnapshot {
            storage: container.storage_ref(),
            current_volume_liters: container.current_volume_liters,
            open_transfer_id,
        };
        let booking = silo.as_ref().map(|s| SiloBooking::new(s, booked));
        let total_volume = match validate_new_transfer(declared, &snapshot, booking) {
            Ok(volume) => volume,
            Err(e) => {
                tracing::warn!(container_id = %container.id, "Transfer refused: {}", e);
                return Err(e.into());
            }
        };

        let destination_plant_id = match &silo {
            Some(s) => Some(resolve_destination(input.destination_plant_id, s)?),
            None => {
                if let Some(plant_id) = input.destination_plant_id {
                    ensure_plant_exists(&mut tx, plant_id).await?;
                }
                input.destination_plant_id
            }
        };

        // A retired instance already shipped its milk
        if let Some(emptied_at) = container.emptied_at {
            return Err(DomainError::ContainerRetired {
                container_id: container.id,
                emptied_at,
            }
            .into());
        }

        let row = sqlx::query_as::<_, TransferRow>(&format!(
            r#"
            INSERT INTO milk_transfers (
                id, source_container_id, source_type, vehicle_id, destination_plant_id,
                silo_id, status, total_volume_liters, remarks
            )
            VALUES ($1, $2, $3, $4, $5, $6, 'scheduled', $7, $8)
            RETURNING {}
            "#,
            TRANSFER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(container.id)
        .bind(container.kind.as_str())
        .bind(input.vehicle_id)
        .bind(destination_plant_id)
        .bind(input.silo_id)
        .bind(total_volume)
        .bind(&input.remarks)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_open_transfer_conflict(e, container.id))?;

        sqlx::query("UPDATE containers SET emptied_at = NOW() WHERE id = $1")
            .bind(container.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let transfer = TransferDetails::from(MilkTransfer::try_from(row)?);
        tracing::info!(
            transfer_id = %transfer.transfer.id,
            container_id = %container.id,
            source_type = container.kind.as_str(),
            volume = %total_volume,
            "Milk transfer created"
        );
        self.events.publish(EventKind::TransferCreated, &transfer);

        Ok(transfer)
    }

    /// scheduled -> in_transit
    pub async fn dispatch(&self, transfer_id: Uuid, input: DispatchInput) -> AppResult<TransferDetails> {
        let mut tx = self.db.begin().await?;
        let transfer = lock_transfer(&mut tx, transfer_id).await?;
        let next = transfer.status.transition_to(TransferStatus::InTransit)?;

        let weights = transfer.weights.merge(WeightCapture {
            departure_weight_kg: input.departure_weight_kg,
            arrival_weight_kg: None,
        });
        validate_weights(&weights)?;

        let row = sqlx::query_as::<_, TransferRow>(&format!(
            r#"
            UPDATE milk_transfers
            SET status = $2, departed_at = $3, departure_weight_kg = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            TRANSFER_COLUMNS
        ))
        .bind(transfer_id)
        .bind(next.as_str())
        .bind(input.departed_at.unwrap_or_else(Utc::now))
        .bind(weights.departure_weight_kg)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        let transfer = TransferDetails::from(MilkTransfer::try_from(row)?);
        tracing::info!(transfer_id = %transfer_id, "Milk transfer dispatched");
        self.events.publish(EventKind::TransferDispatched, &transfer);

        Ok(transfer)
    }

    /// Record arrival. An attached silo is reconciled in the same transaction.
    pub async fn complete(&self, transfer_id: Uuid, input: CompleteInput) -> AppResult<TransferOutcome> {
        let mut tx = self.db.begin().await?;
        let transfer = lock_transfer(&mut tx, transfer_id).await?;
        let next = transfer.status.transition_to(TransferStatus::Completed)?;

        let weights = transfer.weights.merge(WeightCapture {
            departure_weight_kg: input.departure_weight_kg,
            arrival_weight_kg: input.arrival_weight_kg,
        });
        validate_weights(&weights)?;

        let arrival_at = input.arrival_at.unwrap_or_else(Utc::now);
        sqlx::query(
            r#"
            UPDATE milk_transfers
            SET status = $2, arrival_at = $3, completed_at = NOW(),
                departure_weight_kg = $4, arrival_weight_kg = $5,
                remarks = COALESCE($6, remarks), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(transfer_id)
        .bind(next.as_str())
        .bind(arrival_at)
        .bind(weights.departure_weight_kg)
        .bind(weights.arrival_weight_kg)
        .bind(&input.remarks)
        .execute(&mut *tx)
        .await?;

        let silo = match transfer.silo_id {
            Some(silo_id) => Some(reconcile_in_tx(&mut tx, silo_id).await?),
            None => None,
        };

        let updated = fetch_transfer(&mut tx, transfer_id).await?;
        tx.commit().await?;

        let outcome = TransferOutcome {
            transfer: updated.into(),
            silo,
        };

        tracing::info!(
            transfer_id = %transfer_id,
            silo_id = ?transfer.silo_id,
            shrinkage_kg = ?outcome.transfer.shrinkage_kg,
            "Milk transfer completed"
        );
        self.events.publish(EventKind::TransferCompleted, &outcome);
        if let Some(result) = &outcome.silo {
            self.events.publish(EventKind::SiloReconciled, result);
        }

        Ok(outcome)
    }

    /// Cancel an open transfer and re-open its source container
    pub async fn cancel(&self, transfer_id: Uuid, input: CancelInput) -> AppResult<TransferDetails> {
        let mut tx = self.db.begin().await?;
        let transfer = lock_transfer(&mut tx, transfer_id).await?;
        let next = transfer.status.transition_to(TransferStatus::Cancelled)?;

        let row = sqlx::query_as::<_, TransferRow>(&format!(
            r#"
            UPDATE milk_transfers
            SET status = $2, cancelled_at = NOW(), remarks = COALESCE($3, remarks), updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            TRANSFER_COLUMNS
        ))
        .bind(transfer_id)
        .bind(next.as_str())
        .bind(&input.reason)
        .fetch_one(&mut *tx)
        .await?;

        let container = lock_container(&mut tx, transfer.source.id).await?;
        sqlx::query("UPDATE containers SET emptied_at = NULL WHERE id = $1")
            .bind(container.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let transfer = TransferDetails::from(MilkTransfer::try_from(row)?);
        tracing::info!(
            transfer_id = %transfer_id,
            container_id = %container.id,
            reason = ?input.reason,
            "Milk transfer cancelled"
        );
        self.events.publish(EventKind::TransferCancelled, &transfer);

        Ok(transfer)
    }

    /// Plant-side silo assignment for a transfer created without one.
    ///
    /// The silo must belong to the transfer's destination plant, if it has
    /// one, and have room once its other open transfers arrive.
    pub async fn assign_silo(&self, transfer_id: Uuid, silo_id: Uuid) -> AppResult<TransferOutcome> {
        let mut tx = self.db.begin().await?;
        let transfer = lock_transfer(&mut tx, transfer_id).await?;

        if transfer.status == TransferStatus::Cancelled || transfer.silo_id.is_some() {
            return Err(DomainError::InvalidStatusTransition {
                entity: "milk transfer".to_string(),
                from: match transfer.silo_id {
                    Some(existing) => format!("{} (silo {})", transfer.status, existing),
                    None => transfer.status.to_string(),
                },
                to: "silo assigned".to_string(),
            }
            .into());
        }

        let silo = lock_silo(&mut tx, silo_id).await?;
        let booked = booked_liters(&mut tx, silo_id).await?;
        let checked = resolve_destination(transfer.destination_plant_id, &silo).and_then(|plant_id| {
            SiloBooking::new(&silo, booked)
                .ensure_room_for(transfer.total_volume_liters)
                .map(|_| plant_id)
        });
        let destination_plant_id = match checked {
            Ok(plant_id) => plant_id,
            Err(e) => {
                tracing::warn!(transfer_id = %transfer_id, silo_id = %silo_id, "Silo assignment refused: {}", e);
                return Err(e.into());
            }
        };

        sqlx::query(
            r#"
            UPDATE milk_transfers
            SET silo_id = $2, destination_plant_id = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(transfer_id)
        .bind(silo_id)
        .bind(destination_plant_id)
        .execute(&mut *tx)
        .await?;

        let reconciled = if transfer.status == TransferStatus::Completed {
            Some(reconcile_in_tx(&mut tx, silo_id).await?)
        } else {
            None
        };

        let updated = fetch_transfer(&mut tx, transfer_id).await?;
        tx.commit().await?;

        let outcome = TransferOutcome {
            transfer: updated.into(),
            silo: reconciled,
        };

        tracing::info!(transfer_id = %transfer_id, silo_id = %silo_id, "Silo assigned to transfer");
        self.events.publish(EventKind::SiloAssigned, &outcome);
        if let Some(result) = &outcome.silo {
            self.events.publish(EventKind::SiloReconciled, result);
        }

        Ok(outcome)
    }

    /// Get a transfer by ID
    pub async fn get_transfer(&self, transfer_id: Uuid) -> AppResult<TransferDetails> {
        let row = sqlx::query_as::<_, TransferRow>(&format!(
            "SELECT {} FROM milk_transfers WHERE id = $1",
            TRANSFER_COLUMNS
        ))
        .bind(transfer_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| DomainError::not_found("milk transfer", transfer_id))?;

        Ok(MilkTransfer::try_from(row)?.into())
    }

    /// List transfers, newest first
    pub async fn list_transfers(&self, filter: TransferFilter) -> AppResult<Vec<TransferDetails>> {
        let rows = sqlx::query_as::<_, TransferRow>(&format!(
            r#"
            SELECT {}
            FROM milk_transfers
            WHERE ($1::varchar IS NULL OR status = $1)
              AND ($2::uuid IS NULL OR vehicle_id = $2)
              AND ($3::uuid IS NULL OR silo_id = $3)
              AND ($4::uuid IS NULL OR source_container_id = $4)
              AND ($5::uuid IS NULL OR destination_plant_id = $5)
            ORDER BY created_at DESC
            "#,
            TRANSFER_COLUMNS
        ))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.vehicle_id)
        .bind(filter.silo_id)
        .bind(filter.source_id)
        .bind(filter.destination_plant_id)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter()
            .map(|r| {
                MilkTransfer::try_from(r)
                    .map(TransferDetails::from)
                    .map_err(Into::into)
            })
            .collect()
    }

    /// Completed transfers with no silo yet whose vehicle passed an
    /// instant-gate test inside the release window, optionally narrowed to
    /// one destination plant or vehicle
    pub async fn releasable_transfers(
        &self,
        plant_id: Option<Uuid>,
        vehicle_id: Option<Uuid>,
    ) -> AppResult<Vec<TransferDetails>> {
        let rows = sqlx::query_as::<_, TransferRow>(&format!(
            r#"
            SELECT {}
            FROM milk_transfers
            WHERE status = 'completed'
              AND silo_id IS NULL
              AND vehicle_id IS NOT NULL
              AND arrival_at IS NOT NULL
              AND ($1::uuid IS NULL OR destination_plant_id = $1)
              AND ($2::uuid IS NULL OR vehicle_id = $2)
            ORDER BY arrival_at
            "#,
            TRANSFER_COLUMNS
        ))
        .bind(plant_id)
        .bind(vehicle_id)
        .fetch_all(&self.db)
        .await?;

        let transfers = rows
            .into_iter()
            .map(MilkTransfer::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        if transfers.is_empty() {
            return Ok(Vec::new());
        }

        let vehicle_ids: Vec<Uuid> = transfers.iter().filter_map(|t| t.vehicle_id).collect();
        let sample_rows = sqlx::query_as::<_, SampleRow>(&format!(
            r#"
            SELECT {}
            FROM composite_samples
            WHERE sample_type = 'instant_gate'
              AND verdict = 'approved'
              AND vehicle_id = ANY($1)
            "#,
            SAMPLE_COLUMNS
        ))
        .bind(&vehicle_ids)
        .fetch_all(&self.db)
        .await?;

        let samples = sample_rows
            .into_iter()
            .map(CompositeSample::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(transfers
            .into_iter()
            .filter(|t| is_gate_released(t, &samples, &self.gate_window))
            .map(TransferDetails::from)
            .collect())
    }

    /// Vehicles with no scheduled or in-transit transfer
    pub async fn available_vehicles(&self, route_id: Option<Uuid>) -> AppResult<Vec<Vehicle>> {
        let vehicles = sqlx::query_as::<_, Vehicle>(
            r#"
            SELECT v.id, v.registration, v.capacity_liters, v.route_id, v.created_at
            FROM vehicles v
            WHERE ($1::uuid IS NULL OR v.route_id = $1)
              AND NOT EXISTS (
                  SELECT 1 FROM milk_transfers t
                  WHERE t.vehicle_id = v.id AND t.status IN ('scheduled', 'in_transit')
              )
            ORDER BY v.registration
            "#,
        )
        .bind(route_id)
        .fetch_all(&self.db)
        .await?;

        Ok(vehicles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_index_errors_pass_through() {
        let err = map_open_transfer_conflict(sqlx::Error::RowNotFound, Uuid::new_v4());
        assert!(matches!(err, AppError::DatabaseError(sqlx::Error::RowNotFound)));
    }

    #[test]
    fn weights_must_be_positive() {
        let ok = WeightCapture {
            departure_weight_kg: Some(Decimal::new(10300, 0)),
            arrival_weight_kg: Some(Decimal::new(10250, 0)),
        };
        assert!(validate_weights(&ok).is_ok());

        let bad = WeightCapture {
            departure_weight_kg: None,
            arrival_weight_kg: Some(Decimal::ZERO),
        };
        assert!(validate_weights(&bad).is_err());
    }

    #[test]
    fn details_expose_shrinkage() {
        let transfer = MilkTransfer {
            id: Uuid::new_v4(),
            source: crate::models::StorageRef::new(ContainerKind::BulkCooler, Uuid::new_v4()),
            vehicle_id: None,
            destination_plant_id: None,
            silo_id: None,
            status: TransferStatus::Completed,
            total_volume_liters: Decimal::new(1000, 0),
            departed_at: None,
            arrival_at: None,
            completed_at: None,
            cancelled_at: None,
            weights: WeightCapture {
                departure_weight_kg: Some(Decimal::new(1032, 0)),
                arrival_weight_kg: Some(Decimal::new(1030, 0)),
            },
            remarks: None,
            created_at: Utc::now(),
        };

        let details = TransferDetails::from(transfer);
        assert_eq!(details.shrinkage_kg, Some(Decimal::new(2, 0)));
    }

    // Database-backed; run with `cargo test -- --ignored` and DATABASE_URL set
    mod with_database {
        use super::*;

        async fn seed_cooler(pool: &PgPool, route: &str, volume: i64) -> Uuid {
            let route_id: Uuid =
                sqlx::query_scalar("INSERT INTO routes (name) VALUES ($1) RETURNING id")
                    .bind(route)
                    .fetch_one(pool)
                    .await
                    .unwrap();
            sqlx::query_scalar(
                r#"
                INSERT INTO containers (kind, name, route_id, capacity_liters, current_volume_liters)
                VALUES ('bulk_cooler', 'BMC-01', $1, 1000, $2)
                RETURNING id
                "#,
            )
            .bind(route_id)
            .bind(Decimal::new(volume, 0))
            .fetch_one(pool)
            .await
            .unwrap()
        }

        async fn seed_silo(pool: &PgPool, capacity: i64) -> Uuid {
            let plant_id: Uuid =
                sqlx::query_scalar("INSERT INTO plants (name) VALUES ('Central') RETURNING id")
                    .fetch_one(pool)
                    .await
                    .unwrap();
            sqlx::query_scalar(
                r#"
                INSERT INTO silos (plant_id, name, code, capacity_liters)
                VALUES ($1, 'Silo A', 'S-A', $2)
                RETURNING id
                "#,
            )
            .bind(plant_id)
            .bind(Decimal::new(capacity, 0))
            .fetch_one(pool)
            .await
            .unwrap()
        }

        fn input(container_id: Uuid, silo_id: Option<Uuid>) -> CreateTransferInput {
            CreateTransferInput {
                source_type: "bulk_cooler".to_string(),
                source_id: container_id,
                vehicle_id: None,
                destination_plant_id: None,
                silo_id,
                remarks: None,
            }
        }

        #[sqlx::test]
        #[ignore = "needs DATABASE_URL"]
        async fn concurrent_creations_yield_one_open_transfer(pool: PgPool) {
            let container_id = seed_cooler(&pool, "North", 500).await;
            let service = TransferService::new(pool.clone(), EventPublisher::log_only());

            let (first, second) = tokio::join!(
                service.create_transfer(input(container_id, None)),
                service.create_transfer(input(container_id, None)),
            );
            let results = [first, second];

            assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
            assert_eq!(
                results
                    .iter()
                    .filter(|r| matches!(
                        r,
                        Err(AppError::Domain(DomainError::DuplicateOpenTransfer { container_id: id, .. }))
                            if *id == container_id
                    ))
                    .count(),
                1
            );

            let open: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM milk_transfers WHERE source_container_id = $1",
            )
            .bind(container_id)
            .fetch_one(&pool)
            .await
            .unwrap();
            assert_eq!(open, 1);
        }

        #[sqlx::test]
        #[ignore = "needs DATABASE_URL"]
        async fn open_transfer_index_maps_to_duplicate(pool: PgPool) {
            let container_id = seed_cooler(&pool, "North", 500).await;
            let service = TransferService::new(pool.clone(), EventPublisher::log_only());
            service
                .create_transfer(input(container_id, None))
                .await
                .unwrap();

            // Bypasses the service check so only the index stands in the way
            let err = sqlx::query(
                r#"
                INSERT INTO milk_transfers (source_container_id, source_type, total_volume_liters)
                VALUES ($1, 'bulk_cooler', 500)
                "#,
            )
            .bind(container_id)
            .execute(&pool)
            .await
            .unwrap_err();

            assert!(matches!(
                map_open_transfer_conflict(err, container_id),
                AppError::Domain(DomainError::DuplicateOpenTransfer {
                    existing_transfer_id: None,
                    ..
                })
            ));
        }

        #[sqlx::test]
        #[ignore = "needs DATABASE_URL"]
        async fn open_bookings_fill_the_silo(pool: PgPool) {
            let silo_id = seed_silo(&pool, 1000).await;
            let north = seed_cooler(&pool, "North", 800).await;
            let south = seed_cooler(&pool, "South", 800).await;
            let service = TransferService::new(pool.clone(), EventPublisher::log_only());

            let created = service
                .create_transfer(input(north, Some(silo_id)))
                .await
                .unwrap();
            assert!(created.transfer.destination_plant_id.is_some());

            let refused = service.create_transfer(input(south, Some(silo_id))).await;
            assert!(matches!(
                refused,
                Err(AppError::Domain(DomainError::SiloCapacityExceeded { .. }))
            ));
        }
    }
}
