/// Configuration for the Kanban server.
/// Reads server.json from ~/.config/kanban/server.json (or platform
/// equivalent), then applies environment overrides.

use kanban_core::config::DatabaseConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// PostgreSQL settings. Without them the server keeps everything in memory.
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8038
}

fn default_operation_timeout_ms() -> u64 {
    kanban_core::config::DEFAULT_OPERATION_TIMEOUT.as_millis() as u64
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            database: None,
            operation_timeout_ms: default_operation_timeout_ms(),
        }
    }
}

impl ServerConfig {
    /// Config file (or defaults) with the process environment applied on top.
    pub fn load() -> Self {
        let mut config = load_config(&config_path());
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    /// Apply `HTTP_PORT`, `BIND_ADDRESS`, `DB_DSN`/`DATABASE_URL`,
    /// `DB_MAX_CONNECTIONS` and `OPERATION_TIMEOUT_MS`. Unparseable values are
    /// logged and ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(port) = get("HTTP_PORT") {
            // ":8038" is accepted as well as "8038".
            match port.trim_start_matches(':').parse() {
                Ok(port) => self.port = port,
                Err(_) => log::warn!(target: "kanban.config", "Ignoring invalid HTTP_PORT {:?}", port),
            }
        }
        if let Some(bind_address) = get("BIND_ADDRESS") {
            self.bind_address = bind_address;
        }
        if let Some(url) = get("DB_DSN").or_else(|| get("DATABASE_URL")) {
            match self.database.as_mut() {
                Some(database) => database.url = url,
                None => self.database = Some(DatabaseConfig::new(url)),
            }
        }
        if let Some(max) = get("DB_MAX_CONNECTIONS") {
            match (max.parse::<u32>(), self.database.as_mut()) {
                (Ok(max), Some(database)) if max > 0 => database.max_connections = max,
                (Ok(_), None) => log::warn!(
                    target: "kanban.config",
                    "DB_MAX_CONNECTIONS set without a database URL, ignoring"
                ),
                _ => log::warn!(
                    target: "kanban.config",
                    "Ignoring invalid DB_MAX_CONNECTIONS {:?}",
                    max
                ),
            }
        }
        if let Some(timeout) = get("OPERATION_TIMEOUT_MS") {
            match timeout.parse::<u64>() {
                Ok(ms) if ms > 0 => self.operation_timeout_ms = ms,
                _ => log::warn!(
                    target: "kanban.config",
                    "Ignoring invalid OPERATION_TIMEOUT_MS {:?}",
                    timeout
                ),
            }
        }
    }
}

/// `KANBAN_CONFIG` if set, otherwise ~/.config/kanban/server.json
pub fn config_path() -> PathBuf {
    match std::env::var_os("KANBAN_CONFIG") {
        Some(path) => PathBuf::from(path),
        None => default_config_path(),
    }
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("kanban")
        .join("server.json")
}

/// Load config from path. Returns default if file doesn't exist or is invalid.
pub fn load_config(path: &Path) -> ServerConfig {
    match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            log::warn!(target: "kanban.config", "Failed to parse config {}: {}", path.display(), e);
            ServerConfig::default()
        }),
        Err(_) => {
            log::info!(target: "kanban.config", "No config at {}, using defaults", path.display());
            ServerConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_address, "127.0.0.1");
        assert_eq!(config.port, 8038);
        assert!(config.database.is_none());
        assert_eq!(config.operation_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("server.json"));
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.json");
        fs::write(
            &path,
            r#"{"port": 9000, "database": {"url": "postgres://localhost/kanban"}}"#,
        )
        .unwrap();

        let config = load_config(&path);
        assert_eq!(config.port, 9000);
        assert_eq!(config.bind_address, "127.0.0.1");
        let database = config.database.unwrap();
        assert_eq!(database.url, "postgres://localhost/kanban");
        assert_eq!(database.max_connections, 10);
    }

    #[test]
    fn test_invalid_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(load_config(&path), ServerConfig::default());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ServerConfig::default();
        config.apply_env(env(&[
            ("HTTP_PORT", ":9090"),
            ("BIND_ADDRESS", "0.0.0.0"),
            ("DATABASE_URL", "postgres://db/kanban"),
            ("DB_MAX_CONNECTIONS", "4"),
            ("OPERATION_TIMEOUT_MS", "250"),
        ]));
        assert_eq!(config.port, 9090);
        assert_eq!(config.bind_address, "0.0.0.0");
        let database = config.database.as_ref().unwrap();
        assert_eq!(database.url, "postgres://db/kanban");
        assert_eq!(database.max_connections, 4);
        assert_eq!(config.operation_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_db_dsn_wins_over_database_url() {
        let mut config = ServerConfig::default();
        config.apply_env(env(&[
            ("DB_DSN", "postgres://primary/kanban"),
            ("DATABASE_URL", "postgres://fallback/kanban"),
        ]));
        assert_eq!(config.database.unwrap().url, "postgres://primary/kanban");
    }

    #[test]
    fn test_invalid_env_values_are_ignored() {
        let mut config = ServerConfig::default();
        config.apply_env(env(&[
            ("HTTP_PORT", "eighty"),
            ("OPERATION_TIMEOUT_MS", "0"),
            ("DB_MAX_CONNECTIONS", "8"),
        ]));
        assert_eq!(config, ServerConfig::default());
    }
}
