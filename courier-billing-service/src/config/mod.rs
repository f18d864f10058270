//! Configuration module for courier-billing-service.

use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct BillingConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub billing: BillingSettings,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone)]
pub struct BillingSettings {
    /// Prefix of generated invoice numbers.
    pub invoice_number_prefix: String,
    /// How long metro/adjacency tables are cached; zero disables caching.
    pub reference_cache_ttl: Duration,
}

impl Default for BillingSettings {
    fn default() -> Self {
        Self {
            invoice_number_prefix: "INV".to_string(),
            reference_cache_ttl: Duration::from_secs(300),
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl BillingConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;

        let prefix = env::var("INVOICE_NUMBER_PREFIX")
            .ok()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| "INV".to_string());

        Ok(Self {
            common,
            service_name: env::var("SERVICE_NAME")
                .unwrap_or_else(|_| "courier-billing-service".to_string()),
            service_version: env::var("SERVICE_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.is_empty()),
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").map_err(|_| {
                    AppError::ConfigError(anyhow::anyhow!("DATABASE_URL is required"))
                })?,
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", 10),
                min_connections: parse_env("DATABASE_MIN_CONNECTIONS", 2),
            },
            billing: BillingSettings {
                invoice_number_prefix: prefix,
                reference_cache_ttl: Duration::from_secs(parse_env("REFERENCE_CACHE_TTL_SECS", 300)),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unparsable_values_fall_back_to_default() {
        assert_eq!(parse_env::<u32>("COURIER_BILLING_TEST_UNSET_VAR", 7), 7);
    }

    #[test]
    fn default_settings() {
        let settings = BillingSettings::default();
        assert_eq!(settings.invoice_number_prefix, "INV");
        assert_eq!(settings.reference_cache_ttl, Duration::from_secs(300));
    }
}
