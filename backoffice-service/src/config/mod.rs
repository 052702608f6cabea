//! Configuration module for backoffice-service.

use backoffice_core::config::{self as core_config, get_env, parse_env};
use backoffice_core::error::AppError;
use std::env;

#[derive(Debug, Clone)]
pub struct BackofficeConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub store: StoreBackend,
    pub database: DatabaseConfig,
    pub default_currency: String,
    pub quotes: QuoteConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct QuoteConfig {
    /// Reject status changes that skip or reverse the quote workflow.
    pub enforce_transitions: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            _ => Err(format!("Invalid store backend: {}", s)),
        }
    }
}

impl BackofficeConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;

        let store: StoreBackend = get_env("STORE_BACKEND", Some("postgres"))?
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        // Only the postgres backend needs a connection string.
        let database_url = match store {
            StoreBackend::Postgres => get_env("DATABASE_URL", None)?,
            StoreBackend::Memory => env::var("DATABASE_URL").unwrap_or_default(),
        };

        let default_currency = get_env("DEFAULT_CURRENCY", Some("USD"))?
            .trim()
            .to_uppercase();
        if default_currency.len() != 3 || !default_currency.chars().all(|c| c.is_ascii_alphabetic())
        {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "DEFAULT_CURRENCY must be a three-letter code, got '{}'",
                default_currency
            )));
        }

        Ok(Self {
            common,
            service_name: env::var("SERVICE_NAME")
                .unwrap_or_else(|_| "backoffice-service".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.is_empty()),
            store,
            database: DatabaseConfig {
                url: database_url,
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", 10)?,
                min_connections: parse_env("DATABASE_MIN_CONNECTIONS", 1)?,
            },
            default_currency,
            quotes: QuoteConfig {
                enforce_transitions: parse_env("QUOTES_ENFORCE_TRANSITIONS", true)?,
            },
        })
    }
}
