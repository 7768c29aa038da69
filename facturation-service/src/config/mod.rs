//! Configuration module for facturation-service.

use rust_decimal::Decimal;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct FacturationConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub billing: BillingDefaults,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Defaults applied when a document is created without explicit values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BillingDefaults {
    /// VAT percentage.
    pub vat_rate: Decimal,
    /// Days between issue date and due date.
    pub payment_term_days: u32,
    /// Days between issue date and quote expiry.
    pub quote_validity_days: u32,
}

impl Default for BillingDefaults {
    fn default() -> Self {
        Self {
            vat_rate: Decimal::from(20),
            payment_term_days: 30,
            quote_validity_days: 30,
        }
    }
}

impl BillingDefaults {
    pub fn from_env() -> Result<Self, AppError> {
        let defaults = Self::default();
        let vat_rate = match env::var("DEFAULT_VAT_RATE") {
            Ok(raw) => Decimal::from_str(raw.trim()).map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!("DEFAULT_VAT_RATE is invalid: {}", e))
            })?,
            Err(_) => defaults.vat_rate,
        };
        if vat_rate < Decimal::ZERO || vat_rate > Decimal::ONE_HUNDRED {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "DEFAULT_VAT_RATE must be between 0 and 100"
            )));
        }

        Ok(Self {
            vat_rate,
            payment_term_days: env::var("PAYMENT_TERM_DAYS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.payment_term_days),
            quote_validity_days: env::var("QUOTE_VALIDITY_DAYS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.quote_validity_days),
        })
    }
}

impl FacturationConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;

        Ok(Self {
            common,
            service_name: env::var("SERVICE_NAME")
                .unwrap_or_else(|_| "facturation-service".to_string()),
            service_version: env::var("SERVICE_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.is_empty()),
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").map_err(|_| {
                    AppError::ConfigError(anyhow::anyhow!("DATABASE_URL is required"))
                })?,
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
                min_connections: env::var("DATABASE_MIN_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2),
            },
            billing: BillingDefaults::from_env()?,
        })
    }

    /// Configuration for tests: ephemeral port, explicit database URL.
    pub fn for_tests(database_url: impl Into<String>) -> Self {
        Self {
            common: core_config::Config::ephemeral(),
            service_name: "facturation-service".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            log_level: "warn".to_string(),
            otlp_endpoint: None,
            database: DatabaseConfig {
                url: database_url.into(),
                max_connections: 5,
                min_connections: 1,
            },
            billing: BillingDefaults::default(),
        }
    }
}
