use crate::error::AppError;
use crate::websocket::membership::JoinPolicy;
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Which persistence gateway backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            "memory" | "in-memory" => Ok(StoreBackend::Memory),
            other => Err(AppError::Config(format!(
                "STORE_BACKEND must be `postgres` or `memory`, got `{other}`"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// How often the server pings each connection
    pub heartbeat_interval: Duration,
    /// Silence after which a connection is considered dead
    pub client_timeout: Duration,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(5),
            client_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    pub db_max_connections: usize,
    pub access_token_secret: String,
    pub join_policy: JoinPolicy,
    pub websocket: WebSocketConfig,
    pub cors_allowed_origin: String,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = parse_or(&lookup, "PORT", 3000u16)?;
        let db_max_connections = parse_or(&lookup, "DB_MAX_CONNECTIONS", 10usize)?;

        let store_backend = match lookup("STORE_BACKEND") {
            Some(value) => value.parse()?,
            None => StoreBackend::Postgres,
        };

        let database_url = lookup("DATABASE_URL").filter(|s| !s.trim().is_empty());
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            return Err(AppError::Config("DATABASE_URL missing".into()));
        }

        let access_token_secret = lookup("ACCESS_TOKEN_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::Config("ACCESS_TOKEN_SECRET missing".into()))?;

        let join_policy = match lookup("JOIN_POLICY") {
            Some(value) => value.parse()?,
            None => JoinPolicy::default(),
        };

        let websocket = WebSocketConfig {
            heartbeat_interval: Duration::from_secs(parse_or(
                &lookup,
                "WS_HEARTBEAT_INTERVAL_SECS",
                5u64,
            )?),
            client_timeout: Duration::from_secs(parse_or(
                &lookup,
                "WS_CLIENT_TIMEOUT_SECS",
                30u64,
            )?),
        };

        if websocket.heartbeat_interval.is_zero()
            || websocket.heartbeat_interval >= websocket.client_timeout
        {
            return Err(AppError::Config(
                "WS_HEARTBEAT_INTERVAL_SECS must be non-zero and below WS_CLIENT_TIMEOUT_SECS"
                    .into(),
            ));
        }

        let cors_allowed_origin = lookup("CORS_ALLOWED_ORIGIN")
            .unwrap_or_else(|| "http://localhost:5173".to_string());

        Ok(Self {
            port,
            store_backend,
            database_url,
            db_max_connections,
            access_token_secret,
            join_policy,
            websocket,
            cors_allowed_origin,
        })
    }

    /// In-memory configuration used by tests and local runs.
    pub fn test_defaults() -> Self {
        Self {
            port: 0,
            store_backend: StoreBackend::Memory,
            database_url: None,
            db_max_connections: 1,
            access_token_secret: "test-access-token-secret".to_string(),
            join_policy: JoinPolicy::RequireMembership,
            websocket: WebSocketConfig::default(),
            cors_allowed_origin: "http://localhost:5173".to_string(),
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{key}: {e}"))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_applied() {
        let cfg = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/chat"),
            ("ACCESS_TOKEN_SECRET", "secret"),
        ]))
        .unwrap();

        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.store_backend, StoreBackend::Postgres);
        assert_eq!(cfg.join_policy, JoinPolicy::RequireMembership);
        assert_eq!(cfg.websocket.client_timeout, Duration::from_secs(30));
        assert_eq!(cfg.cors_allowed_origin, "http://localhost:5173");
    }

    #[test]
    fn test_missing_secret_is_rejected() {
        let err = Config::from_lookup(lookup_from(&[(
            "DATABASE_URL",
            "postgres://localhost/chat",
        )]))
        .unwrap_err();
        assert!(matches!(err, AppError::Config(msg) if msg.contains("ACCESS_TOKEN_SECRET")));
    }

    #[test]
    fn test_memory_backend_needs_no_database() {
        let cfg = Config::from_lookup(lookup_from(&[
            ("STORE_BACKEND", "memory"),
            ("ACCESS_TOKEN_SECRET", "secret"),
            ("JOIN_POLICY", "permissive"),
        ]))
        .unwrap();

        assert_eq!(cfg.store_backend, StoreBackend::Memory);
        assert!(cfg.database_url.is_none());
        assert_eq!(cfg.join_policy, JoinPolicy::Permissive);
    }

    #[test]
    #[serial_test::serial]
    fn test_from_env_reads_process_environment() {
        env::set_var("STORE_BACKEND", "memory");
        env::set_var("ACCESS_TOKEN_SECRET", "env-secret");
        env::set_var("PORT", "4100");

        let cfg = Config::from_env().unwrap();

        env::remove_var("STORE_BACKEND");
        env::remove_var("ACCESS_TOKEN_SECRET");
        env::remove_var("PORT");

        assert_eq!(cfg.port, 4100);
        assert_eq!(cfg.access_token_secret, "env-secret");
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(Config::from_lookup(lookup_from(&[
            ("STORE_BACKEND", "memory"),
            ("ACCESS_TOKEN_SECRET", "secret"),
            ("PORT", "not-a-port"),
        ]))
        .is_err());

        assert!(Config::from_lookup(lookup_from(&[
            ("STORE_BACKEND", "memory"),
            ("ACCESS_TOKEN_SECRET", "secret"),
            ("JOIN_POLICY", "whoever"),
        ]))
        .is_err());

        assert!(Config::from_lookup(lookup_from(&[
            ("STORE_BACKEND", "memory"),
            ("ACCESS_TOKEN_SECRET", "secret"),
            ("WS_HEARTBEAT_INTERVAL_SECS", "40"),
        ]))
        .is_err());
    }
}
