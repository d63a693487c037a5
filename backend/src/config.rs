use shared::constants::{
    DEFAULT_DAILY_SPIN_QUOTA, DEFAULT_MAX_NAME_LENGTH, DEFAULT_MIN_NAME_LENGTH,
    MAX_LEADERBOARD_LIMIT,
};
use shared::validation::NamePolicy;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} must be set")]
    Missing { key: &'static str },
    #[error("{key} has invalid value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Postgres,
    Memory,
}

impl FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            "memory" | "mem" => Ok(Self::Memory),
            other => Err(format!("unknown store {:?}, expected postgres or memory", other)),
        }
    }
}

/// Business rules the ledger enforces.
#[derive(Debug, Clone)]
pub struct LedgerPolicy {
    pub daily_quota: i32,
    pub names: NamePolicy,
    pub max_prize: Option<i64>,
    pub max_leaderboard_limit: u32,
    pub read_retry_attempts: usize,
}

impl Default for LedgerPolicy {
    fn default() -> Self {
        Self {
            daily_quota: DEFAULT_DAILY_SPIN_QUOTA,
            names: NamePolicy::default(),
            max_prize: None,
            max_leaderboard_limit: MAX_LEADERBOARD_LIMIT,
            read_retry_attempts: 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub store: StoreKind,
    pub database_url: Option<String>,
    pub listen_addr: SocketAddr,
    pub store_timeout: Duration,
    pub db_max_connections: u32,
    pub policy: LedgerPolicy,
}

impl LedgerConfig {
    /// Reads configuration from the process environment (after `.env` has been loaded).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let store: StoreKind = parse_or(&lookup, "LEDGER_STORE", StoreKind::Postgres)?;
        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());
        if store == StoreKind::Postgres && database_url.is_none() {
            return Err(ConfigError::Missing { key: "DATABASE_URL" });
        }

        let host: IpAddr = parse_or(&lookup, "HOST", IpAddr::from([0, 0, 0, 0]))?;
        let port: u16 = parse_or(&lookup, "PORT", 3000)?;

        let daily_quota: i32 = parse_or(&lookup, "DAILY_SPIN_QUOTA", DEFAULT_DAILY_SPIN_QUOTA)?;
        if daily_quota < 1 {
            return Err(invalid("DAILY_SPIN_QUOTA", daily_quota, "must be at least 1"));
        }

        let min_length: usize = parse_or(&lookup, "MIN_NAME_LENGTH", DEFAULT_MIN_NAME_LENGTH)?;
        let max_length: usize = parse_or(&lookup, "MAX_NAME_LENGTH", DEFAULT_MAX_NAME_LENGTH)?;
        if max_length < min_length.max(1) {
            return Err(invalid(
                "MAX_NAME_LENGTH",
                max_length,
                "must not be below MIN_NAME_LENGTH",
            ));
        }

        let max_prize: Option<i64> = parse_opt(&lookup, "MAX_PRIZE")?;
        if let Some(max) = max_prize {
            if max < 0 {
                return Err(invalid("MAX_PRIZE", max, "must not be negative"));
            }
        }

        let max_leaderboard_limit: u32 =
            parse_or(&lookup, "LEADERBOARD_MAX_LIMIT", MAX_LEADERBOARD_LIMIT)?;
        let store_timeout_ms: u64 = parse_or(&lookup, "STORE_TIMEOUT_MS", 2_000)?;

        Ok(Self {
            store,
            database_url,
            listen_addr: SocketAddr::new(host, port),
            store_timeout: Duration::from_millis(store_timeout_ms.max(1)),
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 10)?,
            policy: LedgerPolicy {
                daily_quota,
                names: NamePolicy {
                    min_length,
                    max_length,
                    filter_profanity: parse_or(&lookup, "FILTER_PROFANITY", true)?,
                },
                max_prize,
                max_leaderboard_limit: max_leaderboard_limit.max(1),
                read_retry_attempts: parse_or(&lookup, "READ_RETRY_ATTEMPTS", 3)?,
            },
        })
    }
}

fn invalid(key: &'static str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_opt<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: ToString,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| invalid(key, &raw, &e.to_string())),
    }
}

fn parse_or<T, F>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: ToString,
    F: Fn(&str) -> Option<String>,
{
    Ok(parse_opt(lookup, key)?.unwrap_or(default))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<LedgerConfig, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        LedgerConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults_with_memory_store() {
        let config = config_from(&[("LEDGER_STORE", "memory")]).unwrap();
        assert_eq!(config.store, StoreKind::Memory);
        assert_eq!(config.listen_addr.port(), 3000);
        assert_eq!(config.policy.daily_quota, 2);
        assert_eq!(config.policy.names.min_length, 3);
        assert_eq!(config.policy.max_prize, None);
        assert_eq!(config.store_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_postgres_requires_database_url() {
        assert!(matches!(
            config_from(&[]),
            Err(ConfigError::Missing { key: "DATABASE_URL" })
        ));
        let config = config_from(&[("DATABASE_URL", "postgres://localhost/wheel")]).unwrap();
        assert_eq!(config.store, StoreKind::Postgres);
    }

    #[test]
    fn test_overrides_are_parsed() {
        let config = config_from(&[
            ("LEDGER_STORE", "memory"),
            ("PORT", "8080"),
            ("DAILY_SPIN_QUOTA", "5"),
            ("MIN_NAME_LENGTH", "1"),
            ("FILTER_PROFANITY", "false"),
            ("MAX_PRIZE", "800"),
        ])
        .unwrap();
        assert_eq!(config.listen_addr.port(), 8080);
        assert_eq!(config.policy.daily_quota, 5);
        assert_eq!(config.policy.names.min_length, 1);
        assert!(!config.policy.names.filter_profanity);
        assert_eq!(config.policy.max_prize, Some(800));
    }

    #[test]
    fn test_malformed_values_are_errors() {
        let err = config_from(&[("LEDGER_STORE", "memory"), ("PORT", "eighty")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PORT", .. }));
        let err = config_from(&[("LEDGER_STORE", "memory"), ("DAILY_SPIN_QUOTA", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "DAILY_SPIN_QUOTA", .. }));
        assert!(config_from(&[("LEDGER_STORE", "sqlite")]).is_err());
    }
}
