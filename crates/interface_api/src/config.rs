//! API configuration

use std::time::Duration;

use serde::Deserialize;

use core_kernel::Timezone;

/// API configuration
///
/// Every field can be set through an `API_`-prefixed environment variable,
/// e.g. `API_PORT=9090` or `API_EVOLUTION_API_KEY=...`.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// JWT secret for authentication
    pub jwt_secret: String,
    /// JWT expiration in seconds
    pub jwt_expiration_secs: u64,
    /// Database URL
    pub database_url: String,
    /// Log level
    pub log_level: String,
    /// Emit logs as JSON lines instead of the human-readable format
    pub log_json: bool,
    /// Timezone used when a tenant has none of its own
    pub business_timezone: String,
    /// Seconds between two overdue sweeps of the background job; 0 disables it
    pub overdue_sweep_interval_secs: u64,
    /// Days after the due date before a boleto counts as overdue
    pub overdue_grace_days: u32,
    /// Let bank balances go negative
    pub allow_overdraft: bool,
    /// Fiscal series used for new invoices
    pub fiscal_series: u16,
    /// Evolution API base URL; WhatsApp is disabled while empty
    pub evolution_base_url: String,
    pub evolution_api_key: String,
    pub evolution_instance: String,
    /// Shared secret the gateway sends in the `apikey` header of webhooks
    pub webhook_key: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            jwt_secret: "change-me-in-production".to_string(),
            jwt_expiration_secs: 3600,
            database_url: "postgres://localhost/atacarejo".to_string(),
            log_level: "info".to_string(),
            log_json: false,
            business_timezone: "America/Sao_Paulo".to_string(),
            overdue_sweep_interval_secs: 3600,
            overdue_grace_days: 0,
            allow_overdraft: false,
            fiscal_series: 1,
            evolution_base_url: String::new(),
            evolution_api_key: String::new(),
            evolution_instance: "atacarejo".to_string(),
            webhook_key: String::new(),
        }
    }
}

impl ApiConfig {
    /// Loads configuration from the environment over the defaults
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let defaults = Self::default();
        config::Config::builder()
            .set_default("host", defaults.host)?
            .set_default("port", i64::from(defaults.port))?
            .set_default("jwt_secret", defaults.jwt_secret)?
            .set_default("jwt_expiration_secs", defaults.jwt_expiration_secs)?
            .set_default("database_url", defaults.database_url)?
            .set_default("log_level", defaults.log_level)?
            .set_default("log_json", defaults.log_json)?
            .set_default("business_timezone", defaults.business_timezone)?
            .set_default("overdue_sweep_interval_secs", defaults.overdue_sweep_interval_secs)?
            .set_default("overdue_grace_days", i64::from(defaults.overdue_grace_days))?
            .set_default("allow_overdraft", defaults.allow_overdraft)?
            .set_default("fiscal_series", i64::from(defaults.fiscal_series))?
            .set_default("evolution_base_url", defaults.evolution_base_url)?
            .set_default("evolution_api_key", defaults.evolution_api_key)?
            .set_default("evolution_instance", defaults.evolution_instance)?
            .set_default("webhook_key", defaults.webhook_key)?
            .add_source(config::Environment::with_prefix("API").try_parsing(true))
            .build()?
            .try_deserialize()
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The fallback business timezone
    pub fn timezone(&self) -> Timezone {
        Timezone::parse(&self.business_timezone).unwrap_or_default()
    }

    pub fn overdue_interval(&self) -> Option<Duration> {
        (self.overdue_sweep_interval_secs > 0).then(|| Duration::from_secs(self.overdue_sweep_interval_secs))
    }

    /// Whether enough is configured to talk to the WhatsApp gateway
    pub fn whatsapp_enabled(&self) -> bool {
        !self.evolution_base_url.is_empty() && !self.evolution_api_key.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_disable_whatsapp() {
        let config = ApiConfig::default();
        assert!(!config.whatsapp_enabled());
        assert_eq!(config.server_addr(), "0.0.0.0:8080");
        assert_eq!(config.overdue_interval(), Some(Duration::from_secs(3600)));
    }

    #[test]
    fn test_zero_interval_disables_sweep_job() {
        let config = ApiConfig {
            overdue_sweep_interval_secs: 0,
            ..ApiConfig::default()
        };
        assert!(config.overdue_interval().is_none());
    }
}
