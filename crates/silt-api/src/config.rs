use std::collections::HashMap;
use std::env;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Runtime configuration for the sync API.
///
/// Two knobs, per the deployment contract: where to listen and where the
/// database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: String,
    pub database_path: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = value_or_default(&lookup, "SILT_API_BIND_ADDR", "127.0.0.1:8080");
        if !bind_addr.contains(':') {
            return Err(ConfigError::Invalid(
                "SILT_API_BIND_ADDR must be a host:port pair".to_string(),
            ));
        }

        let database_path = value_or_default(&lookup, "SILT_DATABASE_PATH", "silt.db");

        Ok(Self {
            bind_addr,
            database_path,
        })
    }
}

fn value_or_default(lookup: impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    lookup(name)
        .and_then(|value| {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
        .unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn config_defaults_apply() {
        let map: HashMap<&str, &str> = HashMap::new();
        let config =
            AppConfig::from_lookup(|key| map.get(key).map(|value| (*value).to_string())).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.database_path, "silt.db");
    }

    #[test]
    fn config_reads_overrides() {
        let mut map = HashMap::new();
        map.insert("SILT_API_BIND_ADDR", "0.0.0.0:9090");
        map.insert("SILT_DATABASE_PATH", "/var/lib/silt/silt.db");

        let config =
            AppConfig::from_lookup(|key| map.get(key).map(|value| (*value).to_string())).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:9090");
        assert_eq!(config.database_path, "/var/lib/silt/silt.db");
    }

    #[test]
    fn config_rejects_bind_addr_without_port() {
        let mut map = HashMap::new();
        map.insert("SILT_API_BIND_ADDR", "localhost");

        let err = AppConfig::from_lookup(|key| map.get(key).map(|value| (*value).to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("SILT_API_BIND_ADDR"));
    }

    #[test]
    fn config_treats_blank_values_as_absent() {
        let mut map = HashMap::new();
        map.insert("SILT_DATABASE_PATH", "   ");

        let config =
            AppConfig::from_lookup(|key| map.get(key).map(|value| (*value).to_string())).unwrap();
        assert_eq!(config.database_path, "silt.db");
    }
}
