use std::env;

use anyhow::{Context, bail};

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_SESSION_TTL_HOURS: i64 = 24;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub session_ttl_hours: i64,
    pub db_max_connections: u32,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Unset optional keys fall back to defaults; set but malformed keys are
    /// startup errors rather than silently ignored.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = lookup("DATABASE_URL")
            .filter(|s| !s.trim().is_empty())
            .context("DATABASE_URL must be set")?;
        let bind_addr = lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());

        let session_ttl_hours = match lookup("SESSION_TTL_HOURS") {
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .with_context(|| format!("SESSION_TTL_HOURS is not a number: {raw:?}"))?,
            None => DEFAULT_SESSION_TTL_HOURS,
        };
        if session_ttl_hours <= 0 {
            bail!("SESSION_TTL_HOURS must be positive, got {session_ttl_hours}");
        }

        let db_max_connections = match lookup("DB_MAX_CONNECTIONS") {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .with_context(|| format!("DB_MAX_CONNECTIONS is not a number: {raw:?}"))?,
            None => DEFAULT_DB_MAX_CONNECTIONS,
        };
        if db_max_connections == 0 {
            bail!("DB_MAX_CONNECTIONS must be at least 1");
        }

        Ok(Self {
            database_url,
            bind_addr,
            session_ttl_hours,
            db_max_connections,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_database_url_is_set() {
        let cfg = load(&[("DATABASE_URL", "postgres://localhost/oh")]).unwrap();
        assert_eq!(cfg.database_url, "postgres://localhost/oh");
        assert_eq!(cfg.bind_addr, DEFAULT_BIND_ADDR);
        assert_eq!(cfg.session_ttl_hours, DEFAULT_SESSION_TTL_HOURS);
        assert_eq!(cfg.db_max_connections, DEFAULT_DB_MAX_CONNECTIONS);
    }

    #[test]
    fn explicit_values_win() {
        let cfg = load(&[
            ("DATABASE_URL", "postgres://db/oh"),
            ("BIND_ADDR", "0.0.0.0:9000"),
            ("SESSION_TTL_HOURS", "8"),
            ("DB_MAX_CONNECTIONS", " 4 "),
        ])
        .unwrap();
        assert_eq!(cfg.bind_addr, "0.0.0.0:9000");
        assert_eq!(cfg.session_ttl_hours, 8);
        assert_eq!(cfg.db_max_connections, 4);
    }

    #[test]
    fn missing_database_url_is_an_error() {
        let err = load(&[("BIND_ADDR", "0.0.0.0:9000")]).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
        assert!(load(&[("DATABASE_URL", "  ")]).is_err());
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let url = ("DATABASE_URL", "postgres://db/oh");
        assert!(load(&[url, ("SESSION_TTL_HOURS", "a day")]).is_err());
        assert!(load(&[url, ("SESSION_TTL_HOURS", "0")]).is_err());
        assert!(load(&[url, ("DB_MAX_CONNECTIONS", "-1")]).is_err());
        assert!(load(&[url, ("DB_MAX_CONNECTIONS", "0")]).is_err());
    }
}
