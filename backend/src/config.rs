//! Configuration management for the Raw Milk Tracking Platform
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with MTR_ prefix

use config::{ConfigError, Environment, File};
use serde::Deserialize;
use shared::{AdmissionPolicy, GateWindow, LotStatus, OverflowPolicy};

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Lot admission rules
    pub admission: AdmissionConfig,

    /// Transfer rules
    pub transfers: TransferConfig,

    /// Container cycle rules
    pub containers: ContainerConfig,

    /// Event sink
    pub events: EventsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AdmissionConfig {
    /// Lot status a container accepts (pending or approved)
    pub eligible_status: LotStatus,

    /// reject or soft
    pub overflow: OverflowPolicy,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TransferConfig {
    /// Hours after arrival an instant-gate sample still releases a transfer
    pub gate_window_hours: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ContainerConfig {
    /// Maximum age of the last sanitization when opening a new cycle
    pub sanitation_max_age_hours: i64,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventSinkKind {
    Log,
    Webhook,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EventsConfig {
    pub sink: EventSinkKind,

    /// Target for the webhook sink
    pub webhook_url: Option<String>,

    /// HMAC key for the X-Milk-Signature header
    pub webhook_secret: Option<String>,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("MTR_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = Self::defaults(config::Config::builder(), &environment)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (MTR_ prefix)
            .add_source(
                Environment::with_prefix("MTR")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.check()?;
        Ok(config)
    }

    fn defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
        environment: &str,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        builder
            .set_default("environment", environment)?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("admission.eligible_status", "pending")?
            .set_default("admission.overflow", "reject")?
            .set_default("transfers.gate_window_hours", 2)?
            .set_default("containers.sanitation_max_age_hours", 96)?
            .set_default("events.sink", "log")
    }

    fn check(&self) -> Result<(), ConfigError> {
        if self.admission.eligible_status == LotStatus::Rejected {
            return Err(ConfigError::Message(
                "admission.eligible_status must be pending or approved".into(),
            ));
        }
        if self.transfers.gate_window_hours < 0 {
            return Err(ConfigError::Message(
                "transfers.gate_window_hours cannot be negative".into(),
            ));
        }
        if self.events.sink == EventSinkKind::Webhook && self.events.webhook_url.is_none() {
            return Err(ConfigError::Message(
                "events.webhook_url is required for the webhook sink".into(),
            ));
        }
        Ok(())
    }

    pub fn admission_policy(&self) -> AdmissionPolicy {
        AdmissionPolicy {
            eligible_status: self.admission.eligible_status,
            overflow: self.admission.overflow,
        }
    }

    pub fn gate_window(&self) -> GateWindow {
        GateWindow::hours(self.transfers.gate_window_hours)
    }
}
