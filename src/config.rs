// src/config.rs
use crate::error::ConfigError;
use chrono::Duration as ChronoDuration;
use log::warn;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3030";
pub const DEFAULT_DATABASE_PATH: &str = "finance.db";
pub const DEFAULT_INITIAL_CASH: &str = "10000.00";
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 12;
pub const DEFAULT_QUOTE_TIMEOUT_SECS: u64 = 10;

pub struct Config {
    pub bind_addr: SocketAddr,
    pub database_path: PathBuf,
    pub alphavantage_api_key: String,
    pub session_secret: Vec<u8>,
    pub session_ttl: ChronoDuration,
    pub initial_cash: Decimal,
    pub quote_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |key: &str| vars.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

        let bind_addr = parse_or(
            "FINANCE_BIND_ADDR",
            get("FINANCE_BIND_ADDR"),
            DEFAULT_BIND_ADDR,
        )?;
        let database_path = PathBuf::from(
            get("FINANCE_DATABASE_PATH").unwrap_or(DEFAULT_DATABASE_PATH),
        );
        let alphavantage_api_key = get("ALPHAVANTAGE_API_KEY")
            .ok_or(ConfigError::Missing("ALPHAVANTAGE_API_KEY"))?
            .to_string();

        let session_secret = match get("FINANCE_SESSION_SECRET") {
            Some(secret) => secret.as_bytes().to_vec(),
            None => {
                warn!("FINANCE_SESSION_SECRET not set; sessions will not survive a restart");
                rand::random::<[u8; 32]>().to_vec()
            }
        };

        let ttl_hours: i64 = parse_or(
            "FINANCE_SESSION_TTL_HOURS",
            get("FINANCE_SESSION_TTL_HOURS"),
            &DEFAULT_SESSION_TTL_HOURS.to_string(),
        )?;
        if ttl_hours <= 0 {
            return Err(ConfigError::Invalid {
                key: "FINANCE_SESSION_TTL_HOURS",
                value: ttl_hours.to_string(),
            });
        }

        let initial_cash: Decimal = parse_or(
            "FINANCE_INITIAL_CASH",
            get("FINANCE_INITIAL_CASH"),
            DEFAULT_INITIAL_CASH,
        )?;
        if initial_cash.is_sign_negative() {
            return Err(ConfigError::Invalid {
                key: "FINANCE_INITIAL_CASH",
                value: initial_cash.to_string(),
            });
        }

        let timeout_secs: u64 = parse_or(
            "FINANCE_QUOTE_TIMEOUT_SECS",
            get("FINANCE_QUOTE_TIMEOUT_SECS"),
            &DEFAULT_QUOTE_TIMEOUT_SECS.to_string(),
        )?;

        Ok(Config {
            bind_addr,
            database_path,
            alphavantage_api_key,
            session_secret,
            session_ttl: ChronoDuration::hours(ttl_hours),
            initial_cash: initial_cash.round_dp(2),
            quote_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

fn parse_or<T: FromStr>(
    key: &'static str,
    value: Option<&str>,
    default: &str,
) -> Result<T, ConfigError> {
    let raw = value.unwrap_or(default);
    raw.parse().map_err(|_| ConfigError::Invalid {
        key,
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_vars(&vars(&[("ALPHAVANTAGE_API_KEY", "demo")])).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:3030".parse().unwrap());
        assert_eq!(config.database_path, PathBuf::from("finance.db"));
        assert_eq!(config.initial_cash, Decimal::from(10000));
        assert_eq!(config.session_ttl, ChronoDuration::hours(12));
        assert_eq!(config.session_secret.len(), 32);
        assert_eq!(config.quote_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_vars(&vars(&[
            ("ALPHAVANTAGE_API_KEY", "key"),
            ("FINANCE_BIND_ADDR", "0.0.0.0:8080"),
            ("FINANCE_DATABASE_PATH", "/tmp/sim.db"),
            ("FINANCE_SESSION_SECRET", "s3cret"),
            ("FINANCE_SESSION_TTL_HOURS", "1"),
            ("FINANCE_INITIAL_CASH", "2500.5"),
            ("FINANCE_QUOTE_TIMEOUT_SECS", "3"),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.database_path, PathBuf::from("/tmp/sim.db"));
        assert_eq!(config.session_secret, b"s3cret".to_vec());
        assert_eq!(config.session_ttl, ChronoDuration::hours(1));
        assert_eq!(config.initial_cash, Decimal::from_str("2500.50").unwrap());
        assert_eq!(config.quote_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_missing_api_key() {
        assert!(matches!(
            Config::from_vars(&vars(&[])),
            Err(ConfigError::Missing("ALPHAVANTAGE_API_KEY"))
        ));
    }

    #[test]
    fn test_invalid_values() {
        for (key, value) in [
            ("FINANCE_BIND_ADDR", "nowhere"),
            ("FINANCE_SESSION_TTL_HOURS", "0"),
            ("FINANCE_INITIAL_CASH", "-5"),
            ("FINANCE_QUOTE_TIMEOUT_SECS", "soon"),
        ] {
            let result = Config::from_vars(&vars(&[("ALPHAVANTAGE_API_KEY", "k"), (key, value)]));
            assert!(
                matches!(result, Err(ConfigError::Invalid { key: k, .. }) if k == key),
                "{} = {}",
                key,
                value
            );
        }
    }
}
