//! Reference data: routes, suppliers, vehicles and plants

use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{Plant, Route, Supplier, Vehicle};
use shared::{validate_volume, DomainError};

/// Reference data service
#[derive(Clone)]
pub struct ReferenceService {
    db: PgPool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRouteInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSupplierInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub route_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateVehicleInput {
    #[validate(length(min = 1, max = 50))]
    pub registration: String,
    pub capacity_liters: Option<Decimal>,
    pub route_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePlantInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
}

impl ReferenceService {
    /// Create a new ReferenceService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn ensure_route(&self, route_id: Option<Uuid>) -> AppResult<()> {
        let Some(route_id) = route_id else {
            return Ok(());
        };

        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM routes WHERE id = $1)")
            .bind(route_id)
            .fetch_one(&self.db)
            .await?;
        if !exists {
            return Err(DomainError::not_found("route", route_id).into());
        }
        Ok(())
    }

    pub async fn create_route(&self, input: CreateRouteInput) -> AppResult<Route> {
        input.validate()?;

        let name_taken: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM routes WHERE name = $1)")
                .bind(input.name.trim())
                .fetch_one(&self.db)
                .await?;
        if name_taken {
            return Err(AppError::Validation {
                field: "name".to_string(),
                message: "Route name already exists".to_string(),
            });
        }

        let route = sqlx::query_as::<_, Route>(
            "INSERT INTO routes (id, name) VALUES ($1, $2) RETURNING id, name, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(input.name.trim())
        .fetch_one(&self.db)
        .await?;

        tracing::info!(route_id = %route.id, name = %route.name, "Route created");
        Ok(route)
    }

    pub async fn list_routes(&self) -> AppResult<Vec<Route>> {
        let routes =
            sqlx::query_as::<_, Route>("SELECT id, name, created_at FROM routes ORDER BY name")
                .fetch_all(&self.db)
                .await?;
        Ok(routes)
    }

    pub async fn create_supplier(&self, input: CreateSupplierInput) -> AppResult<Supplier> {
        input.validate()?;
        self.ensure_route(input.route_id).await?;

        let supplier = sqlx::query_as::<_, Supplier>(
            r#"
            INSERT INTO suppliers (id, name, route_id)
            VALUES ($1, $2, $3)
            RETURNING id, name, route_id, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.name.trim())
        .bind(input.route_id)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(supplier_id = %supplier.id, route_id = ?supplier.route_id, "Supplier created");
        Ok(supplier)
    }

    pub async fn list_suppliers(&self, route_id: Option<Uuid>) -> AppResult<Vec<Supplier>> {
        let suppliers = sqlx::query_as::<_, Supplier>(
            r#"
            SELECT id, name, route_id, created_at
            FROM suppliers
            WHERE ($1::uuid IS NULL OR route_id = $1)
            ORDER BY name
            "#,
        )
        .bind(route_id)
        .fetch_all(&self.db)
        .await?;
        Ok(suppliers)
    }

    pub async fn create_vehicle(&self, input: CreateVehicleInput) -> AppResult<Vehicle> {
        input.validate()?;
        if let Some(capacity) = input.capacity_liters {
            validate_volume("capacity_liters", capacity)?;
        }
        self.ensure_route(input.route_id).await?;

        let registration = input.registration.trim().to_uppercase();
        let taken: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM vehicles WHERE registration = $1)")
                .bind(&registration)
                .fetch_one(&self.db)
                .await?;
        if taken {
            return Err(AppError::Validation {
                field: "registration".to_string(),
                message: "Vehicle registration already exists".to_string(),
            });
        }

        let vehicle = sqlx::query_as::<_, Vehicle>(
            r#"
            INSERT INTO vehicles (id, registration, capacity_liters, route_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id, registration, capacity_liters, route_id, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&registration)
        .bind(input.capacity_liters)
        .bind(input.route_id)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(vehicle_id = %vehicle.id, registration = %vehicle.registration, "Vehicle registered");
        Ok(vehicle)
    }

    pub async fn list_vehicles(&self, route_id: Option<Uuid>) -> AppResult<Vec<Vehicle>> {
        let vehicles = sqlx::query_as::<_, Vehicle>(
            r#"
            SELECT id, registration, capacity_liters, route_id, created_at
            FROM vehicles
            WHERE ($1::uuid IS NULL OR route_id = $1)
            ORDER BY registration
            "#,
        )
        .bind(route_id)
        .fetch_all(&self.db)
        .await?;
        Ok(vehicles)
    }

    pub async fn create_plant(&self, input: CreatePlantInput) -> AppResult<Plant> {
        input.validate()?;

        let plant = sqlx::query_as::<_, Plant>(
            "INSERT INTO plants (id, name) VALUES ($1, $2) RETURNING id, name, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(input.name.trim())
        .fetch_one(&self.db)
        .await?;

        tracing::info!(plant_id = %plant.id, "Plant created");
        Ok(plant)
    }

    pub async fn list_plants(&self) -> AppResult<Vec<Plant>> {
        let plants =
            sqlx::query_as::<_, Plant>("SELECT id, name, created_at FROM plants ORDER BY name")
                .fetch_all(&self.db)
                .await?;
        Ok(plants)
    }
}
