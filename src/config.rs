//! Process configuration, loaded once at startup and handed to the components
//! that need it.

use std::env::VarError;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Unset means orders live in memory for the life of the process.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub bind_addr: SocketAddr,
    pub nats_url: Option<String>,
    pub store_name_en: String,
    pub store_name_ar: String,
    pub admin_password: String,
    pub admin_session_ttl: Duration,
}

impl StoreConfig {
    /// Loads `.env` (if present) and then reads the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key))
    }

    /// Builds the config from an arbitrary env-var lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, VarError>,
    {
        let optional = |var: &str| lookup(var).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let or_default = |var: &str, default: &str| optional(var).unwrap_or_else(|| default.to_string());
        let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar { var: var.to_string(), reason };

        let admin_password = lookup("ADMIN_PASSWORD")
            .ok()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("ADMIN_PASSWORD".to_string()))?;

        let bind_addr = or_default("BIND_ADDR", "0.0.0.0:8083")
            .parse::<SocketAddr>()
            .map_err(|e| invalid("BIND_ADDR", e.to_string()))?;

        let db_max_connections = or_default("DB_MAX_CONNECTIONS", "10")
            .parse::<u32>()
            .map_err(|e| invalid("DB_MAX_CONNECTIONS", e.to_string()))?;

        let ttl_secs = or_default("ADMIN_SESSION_TTL_SECS", "28800")
            .parse::<u64>()
            .map_err(|e| invalid("ADMIN_SESSION_TTL_SECS", e.to_string()))?;
        if ttl_secs == 0 {
            return Err(invalid("ADMIN_SESSION_TTL_SECS", "must be greater than zero".to_string()));
        }

        Ok(Self {
            database_url: optional("DATABASE_URL"),
            db_max_connections,
            bind_addr,
            nats_url: optional("NATS_URL"),
            store_name_en: or_default("STORE_NAME_EN", "Car Accessories"),
            store_name_ar: or_default("STORE_NAME_AR", "إكسسوارات السيارات"),
            admin_password,
            admin_session_ttl: Duration::from_secs(ttl_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from_map<'a>(map: &'a HashMap<&'a str, &'a str>) -> impl Fn(&str) -> Result<String, VarError> + 'a {
        move |key| map.get(key).map(|v| (*v).to_string()).ok_or(VarError::NotPresent)
    }

    fn minimal_env<'a>() -> HashMap<&'a str, &'a str> {
        HashMap::from([("ADMIN_PASSWORD", "s3cret")])
    }

    #[test]
    fn defaults_apply_with_only_password() {
        let map = minimal_env();
        let cfg = StoreConfig::from_lookup(lookup_from_map(&map)).unwrap();
        assert_eq!(cfg.admin_password, "s3cret");
        assert_eq!(cfg.bind_addr, "0.0.0.0:8083".parse().unwrap());
        assert_eq!(cfg.database_url, None);
        assert_eq!(cfg.nats_url, None);
        assert_eq!(cfg.db_max_connections, 10);
        assert_eq!(cfg.admin_session_ttl, Duration::from_secs(28_800));
        assert_eq!(cfg.store_name_en, "Car Accessories");
    }

    #[test]
    fn fails_without_admin_password() {
        let map = HashMap::new();
        let result = StoreConfig::from_lookup(lookup_from_map(&map));
        assert!(
            matches!(result, Err(ConfigError::MissingEnvVar(ref v)) if v == "ADMIN_PASSWORD"),
            "expected MissingEnvVar(ADMIN_PASSWORD), got: {result:?}"
        );
    }

    #[test]
    fn fails_with_empty_admin_password() {
        let map = HashMap::from([("ADMIN_PASSWORD", "")]);
        assert!(matches!(StoreConfig::from_lookup(lookup_from_map(&map)), Err(ConfigError::MissingEnvVar(_))));
    }

    #[test]
    fn fails_with_invalid_bind_addr() {
        let mut map = minimal_env();
        map.insert("BIND_ADDR", "nowhere");
        let result = StoreConfig::from_lookup(lookup_from_map(&map));
        assert!(matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "BIND_ADDR"));
    }

    #[test]
    fn fails_with_zero_session_ttl() {
        let mut map = minimal_env();
        map.insert("ADMIN_SESSION_TTL_SECS", "0");
        let result = StoreConfig::from_lookup(lookup_from_map(&map));
        assert!(matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "ADMIN_SESSION_TTL_SECS"));
    }

    #[test]
    fn blank_optional_values_are_unset() {
        let mut map = minimal_env();
        map.insert("DATABASE_URL", "  ");
        map.insert("NATS_URL", "nats://localhost:4222");
        map.insert("STORE_NAME_AR", "متجر");
        let cfg = StoreConfig::from_lookup(lookup_from_map(&map)).unwrap();
        assert_eq!(cfg.database_url, None);
        assert_eq!(cfg.nats_url.as_deref(), Some("nats://localhost:4222"));
        assert_eq!(cfg.store_name_ar, "متجر");
    }
}
