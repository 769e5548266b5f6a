//! Application configuration management.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Compliance gate configuration.
    #[serde(default)]
    pub compliance: ComplianceConfig,
    /// Messaging provider configuration.
    #[serde(default)]
    pub provider: ProviderConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Compliance gate configuration.
///
/// `fail_open` selects the behavior when a consent/opt-out lookup itself
/// fails: `true` allows the send, `false` denies it.
#[derive(Debug, Clone, Deserialize)]
pub struct ComplianceConfig {
    /// Whether lookup failures allow the send (FAIL_OPEN) or deny it.
    #[serde(default = "default_fail_open")]
    pub fail_open: bool,
    /// Local hour at which quiet hours begin (inclusive).
    #[serde(default = "default_quiet_start_hour")]
    pub quiet_start_hour: u32,
    /// Local hour at which quiet hours end (exclusive).
    #[serde(default = "default_quiet_end_hour")]
    pub quiet_end_hour: u32,
}

fn default_fail_open() -> bool {
    true
}

fn default_quiet_start_hour() -> u32 {
    21
}

fn default_quiet_end_hour() -> u32 {
    8
}

impl Default for ComplianceConfig {
    fn default() -> Self {
        Self {
            fail_open: default_fail_open(),
            quiet_start_hour: default_quiet_start_hour(),
            quiet_end_hour: default_quiet_end_hour(),
        }
    }
}

/// Messaging provider configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// Timeout for a single provider send call, in seconds.
    #[serde(default = "default_send_timeout")]
    pub send_timeout_secs: u64,
}

fn default_send_timeout() -> u64 {
    10
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            send_timeout_secs: default_send_timeout(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("VELORA").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compliance_defaults() {
        let cfg = ComplianceConfig::default();
        assert!(cfg.fail_open);
        assert_eq!(cfg.quiet_start_hour, 21);
        assert_eq!(cfg.quiet_end_hour, 8);
    }

    #[test]
    fn test_provider_defaults() {
        let cfg = ProviderConfig::default();
        assert_eq!(cfg.send_timeout_secs, 10);
    }
}
