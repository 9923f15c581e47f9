//! Process configuration from environment variables.

use thiserror::Error;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_AUDIT_BUFFER: usize = 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be a positive integer, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockroomConfig {
    /// Postgres connection string. `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub max_connections: u32,
    /// Capacity of the channel between audit producers and the audit worker.
    pub audit_buffer: usize,
}

impl Default for StockroomConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            audit_buffer: DEFAULT_AUDIT_BUFFER,
        }
    }
}

impl StockroomConfig {
    /// Read `DATABASE_URL`, `STOCKROOM_DB_MAX_CONNECTIONS` and `STOCKROOM_AUDIT_BUFFER`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());
        let max_connections = positive(
            "STOCKROOM_DB_MAX_CONNECTIONS",
            lookup("STOCKROOM_DB_MAX_CONNECTIONS"),
            DEFAULT_MAX_CONNECTIONS,
        )?;
        let audit_buffer = positive(
            "STOCKROOM_AUDIT_BUFFER",
            lookup("STOCKROOM_AUDIT_BUFFER"),
            DEFAULT_AUDIT_BUFFER,
        )?;

        Ok(Self {
            database_url,
            max_connections,
            audit_buffer,
        })
    }
}

fn positive<T>(var: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.trim().parse::<T>() {
        Ok(value) if value > T::default() => Ok(value),
        _ => Err(ConfigError::InvalidNumber { var, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<StockroomConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        StockroomConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        assert_eq!(config(&[]).unwrap(), StockroomConfig::default());
    }

    #[test]
    fn values_are_read() {
        let cfg = config(&[
            ("DATABASE_URL", "postgres://localhost/stockroom"),
            ("STOCKROOM_DB_MAX_CONNECTIONS", "32"),
            ("STOCKROOM_AUDIT_BUFFER", "16"),
        ])
        .unwrap();

        assert_eq!(cfg.database_url.as_deref(), Some("postgres://localhost/stockroom"));
        assert_eq!(cfg.max_connections, 32);
        assert_eq!(cfg.audit_buffer, 16);
    }

    #[test]
    fn blank_database_url_means_in_memory() {
        let cfg = config(&[("DATABASE_URL", "  ")]).unwrap();
        assert!(cfg.database_url.is_none());
    }

    #[test]
    fn zero_or_garbage_is_rejected() {
        assert_eq!(
            config(&[("STOCKROOM_AUDIT_BUFFER", "0")]),
            Err(ConfigError::InvalidNumber {
                var: "STOCKROOM_AUDIT_BUFFER",
                value: "0".into()
            })
        );
        assert!(config(&[("STOCKROOM_DB_MAX_CONNECTIONS", "lots")]).is_err());
        assert!(config(&[("STOCKROOM_DB_MAX_CONNECTIONS", "-1")]).is_err());
    }
}
