//! Configuration management for Turnstile.
//!
//! Configuration is layered: built-in defaults, then an optional YAML file,
//! then `TURNSTILE__`-prefixed environment variables. Command line overrides
//! are applied by the binary on top of the loaded value.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

use crate::error::{Result, TurnstileError};

/// Prefix for environment variable overrides.
const ENV_PREFIX: &str = "TURNSTILE";

/// Main configuration for the Turnstile service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnstileConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen address
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    /// Length of one counting window in seconds
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Requests admitted per client within one window
    #[serde(default = "default_max_requests")]
    pub max_requests: u64,

    /// Whole windows of inactivity after which a client's window is evicted.
    /// Zero disables eviction.
    #[serde(default = "default_idle_eviction_windows")]
    pub idle_eviction_windows: u64,

    /// Interval between idle-window sweeps in seconds
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Body of the rejection response
    #[serde(default = "default_rejection_message")]
    pub rejection_message: String,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            max_requests: default_max_requests(),
            idle_eviction_windows: default_idle_eviction_windows(),
            sweep_interval_secs: default_sweep_interval(),
            rejection_message: default_rejection_message(),
        }
    }
}

fn default_window_secs() -> u64 {
    10
}

fn default_max_requests() -> u64 {
    50
}

fn default_idle_eviction_windows() -> u64 {
    6
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_rejection_message() -> String {
    "Too many requests. Slow down.".to_string()
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable output
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TurnstileConfig {
    /// Load configuration from an optional YAML file layered under environment
    /// variables such as `TURNSTILE__RATE_LIMITING__MAX_REQUESTS`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(
                ::config::File::from(path)
                    .format(::config::FileFormat::Yaml)
                    .required(true),
            );
        }

        let config: TurnstileConfig = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file, without environment overrides.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: TurnstileConfig = serde_yaml::from_str(yaml)
            .map_err(|e| TurnstileError::Config(format!("Failed to parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings under which the limiter cannot operate.
    pub fn validate(&self) -> Result<()> {
        let rl = &self.rate_limiting;
        if rl.window_secs == 0 {
            return Err(TurnstileError::Config(
                "rate_limiting.window_secs must be greater than zero".to_string(),
            ));
        }
        if rl.max_requests == 0 {
            return Err(TurnstileError::Config(
                "rate_limiting.max_requests must be greater than zero".to_string(),
            ));
        }
        if rl.idle_eviction_windows > 0 && rl.sweep_interval_secs == 0 {
            return Err(TurnstileError::Config(
                "rate_limiting.sweep_interval_secs must be greater than zero when eviction is enabled"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TurnstileConfig::default();
        assert_eq!(config.rate_limiting.window_secs, 10);
        assert_eq!(config.rate_limiting.max_requests, 50);
        assert_eq!(config.rate_limiting.rejection_message, "Too many requests. Slow down.");
        assert_eq!(config.server.bind_addr, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_yaml() {
        let yaml = r#"
rate_limiting:
  max_requests: 3
logging:
  format: json
"#;
        let config = TurnstileConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.rate_limiting.max_requests, 3);
        assert_eq!(config.rate_limiting.window_secs, 10);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_full_yaml() {
        let yaml = r#"
server:
  bind_addr: "0.0.0.0:9000"
rate_limiting:
  window_secs: 30
  max_requests: 100
  idle_eviction_windows: 0
  sweep_interval_secs: 5
  rejection_message: "slow down"
logging:
  level: debug
  format: pretty
"#;
        let config = TurnstileConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.server.bind_addr.port(), 9000);
        assert_eq!(config.rate_limiting.window_secs, 30);
        assert_eq!(config.rate_limiting.idle_eviction_windows, 0);
        assert_eq!(config.rate_limiting.rejection_message, "slow down");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_zero_window_rejected() {
        let yaml = r#"
rate_limiting:
  window_secs: 0
"#;
        let err = TurnstileConfig::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, TurnstileError::Config(_)));
    }

    #[test]
    fn test_zero_max_requests_rejected() {
        let mut config = TurnstileConfig::default();
        config.rate_limiting.max_requests = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_yaml_rejected() {
        let err = TurnstileConfig::from_yaml("rate_limiting: [1, 2").unwrap_err();
        assert!(err.to_string().starts_with("Configuration error"));
    }

    fn write_temp_config(name: &str, yaml: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("turnstile-{}-{}.yaml", name, std::process::id()));
        std::fs::write(&path, yaml).unwrap();
        path
    }

    #[test]
    fn test_from_file() {
        let path = write_temp_config(
            "from-file",
            "rate_limiting:\n  window_secs: 45\n  rejection_message: \"file says no\"\n",
        );

        let config = TurnstileConfig::from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.rate_limiting.window_secs, 45);
        assert_eq!(config.rate_limiting.rejection_message, "file says no");
        assert_eq!(config.rate_limiting.max_requests, 50);
    }

    #[test]
    fn test_from_missing_file_is_io_error() {
        let path = std::env::temp_dir().join("turnstile-does-not-exist.yaml");
        let err = TurnstileConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, TurnstileError::Io(_)));
    }

    #[test]
    fn test_load_layers_environment_over_file() {
        let path = write_temp_config(
            "layered",
            r#"
server:
  bind_addr: "127.0.0.1:9100"
rate_limiting:
  window_secs: 25
  max_requests: 5
  rejection_message: "from file"
"#,
        );

        // Only this test sets TURNSTILE__ variables; other tests calling
        // `load` do not assert on max_requests.
        std::env::set_var("TURNSTILE__RATE_LIMITING__MAX_REQUESTS", "7");
        let result = TurnstileConfig::load(Some(path.as_path()));
        std::env::remove_var("TURNSTILE__RATE_LIMITING__MAX_REQUESTS");
        std::fs::remove_file(&path).unwrap();

        let config = result.unwrap();
        assert_eq!(config.rate_limiting.max_requests, 7);
        assert_eq!(config.rate_limiting.window_secs, 25);
        assert_eq!(config.rate_limiting.rejection_message, "from file");
        assert_eq!(config.server.bind_addr.port(), 9100);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let path = std::env::temp_dir().join("turnstile-missing-layered.yaml");
        let err = TurnstileConfig::load(Some(path.as_path())).unwrap_err();
        assert!(matches!(err, TurnstileError::Config(_)));
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = TurnstileConfig::load(None).unwrap();
        assert_eq!(config.rate_limiting.window_secs, 10);
        assert_eq!(config.rate_limiting.rejection_message, "Too many requests. Slow down.");
    }
}
