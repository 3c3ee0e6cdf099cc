//! Engine configuration.
//!
//! Loaded from a TOML file by services embedding the engine; every field has
//! a protocol-default so a minimal config is just the domain and path.

use serde::{Deserialize, Serialize};
use std::path::Path;

use cashid_core::{CashIdError, CashIdResult};

use crate::generator::DEFAULT_REQUEST_TTL_SECS;
use crate::handler::{DEFAULT_CLOCK_DRIFT_SECS, DEFAULT_USER_ACTION_PAST_WINDOW_SECS};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CashIdConfig {
    /// Domain of the relying service, as it appears in challenge URIs.
    pub domain: String,

    /// Path of the response endpoint, leading slash included.
    pub path: String,

    /// Lifetime of a pending challenge in seconds.
    #[serde(default = "default_request_ttl")]
    pub request_ttl_secs: u64,

    /// How far in the past a user-initiated timestamp nonce may lie.
    #[serde(default = "default_past_window")]
    pub user_action_past_window_secs: u64,

    /// Forward clock-drift allowance for user-initiated timestamp nonces.
    #[serde(default = "default_clock_drift")]
    pub clock_drift_secs: u64,
}

fn default_request_ttl() -> u64 {
    DEFAULT_REQUEST_TTL_SECS
}

fn default_past_window() -> u64 {
    DEFAULT_USER_ACTION_PAST_WINDOW_SECS
}

fn default_clock_drift() -> u64 {
    DEFAULT_CLOCK_DRIFT_SECS
}

impl CashIdConfig {
    pub fn new(domain: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            path: path.into(),
            request_ttl_secs: default_request_ttl(),
            user_action_past_window_secs: default_past_window(),
            clock_drift_secs: default_clock_drift(),
        }
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> CashIdResult<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| CashIdError::Internal(format!("config read error: {}", e)))?;
        let config: CashIdConfig = toml::from_str(&contents)
            .map_err(|e| CashIdError::Encoding(format!("config parse error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Write the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> CashIdResult<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| CashIdError::Encoding(format!("config serialize error: {}", e)))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CashIdError::Internal(format!("config write error: {}", e)))?;
        }
        std::fs::write(path, contents)
            .map_err(|e| CashIdError::Internal(format!("config write error: {}", e)))?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> CashIdResult<()> {
        if self.domain.is_empty() {
            return Err(CashIdError::Internal("domain must not be empty".into()));
        }
        if self.domain.contains('/') || self.domain.contains('?') {
            return Err(CashIdError::Internal(format!(
                "domain must not contain path or query characters, got '{}'",
                self.domain
            )));
        }
        if !self.path.starts_with('/') {
            return Err(CashIdError::Internal(format!(
                "path must start with '/', got '{}'",
                self.path
            )));
        }
        if self.request_ttl_secs == 0 {
            return Err(CashIdError::Internal("request_ttl_secs must be > 0".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CashIdConfig::new("demo.cashid.info", "/api/parse.php");
        assert_eq!(config.request_ttl_secs, 900);
        assert_eq!(config.user_action_past_window_secs, 54_000);
        assert_eq!(config.clock_drift_secs, 60);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_with_defaults() {
        let toml_str = r#"
domain = "demo.cashid.info"
path = "/api/parse.php"
"#;
        let config: CashIdConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.domain, "demo.cashid.info");
        assert_eq!(config.request_ttl_secs, 900);
    }

    #[test]
    fn test_from_toml_with_overrides() {
        let toml_str = r#"
domain = "demo.cashid.info"
path = "/api/parse.php"
request_ttl_secs = 300
clock_drift_secs = 10
"#;
        let config: CashIdConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.request_ttl_secs, 300);
        assert_eq!(config.clock_drift_secs, 10);
        assert_eq!(config.user_action_past_window_secs, 54_000);
    }

    #[test]
    fn test_validate_empty_domain() {
        let config = CashIdConfig::new("", "/x.php");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_domain_with_path() {
        let config = CashIdConfig::new("d.example/api", "/x.php");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_relative_path() {
        let config = CashIdConfig::new("d.example", "x.php");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_ttl() {
        let mut config = CashIdConfig::new("d.example", "/x.php");
        config.request_ttl_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = CashIdConfig::new("d.example", "/x.php");
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let restored: CashIdConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config, restored);
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join("cashid-test-config");
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("config.toml");

        let config = CashIdConfig::new("d.example", "/x.php");
        config.save(&path).unwrap();
        let loaded = CashIdConfig::load(&path).unwrap();
        assert_eq!(loaded, config);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_load_missing_file_errors() {
        let result = CashIdConfig::load(Path::new("/nonexistent/cashid.toml"));
        assert!(result.is_err());
    }
}
