use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_LOG_FILTER: &str = "info,multidb_registry=debug";

#[derive(Debug, Clone)]
pub struct Config {
    /// Fixed base directory for every database. `None` means the process
    /// working directory at the time of each lookup.
    pub root_dir: Option<PathBuf>,
    pub schema_path: Option<PathBuf>,
    pub sqlite_busy_timeout: Duration,
    pub log_dir: Option<PathBuf>,
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root_dir: None,
            schema_path: None,
            sqlite_busy_timeout: Duration::from_millis(5000),
            log_dir: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let root_dir = non_empty_var("DB_ROOT_DIR").map(PathBuf::from);
        let schema_path = non_empty_var("DB_SCHEMA_PATH").map(PathBuf::from);

        let busy_timeout_ms: u64 = match non_empty_var("SQLITE_BUSY_TIMEOUT_MS") {
            Some(raw) => raw
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid SQLITE_BUSY_TIMEOUT_MS '{}': {}", raw, e))?,
            None => 5000,
        };

        let log_dir = non_empty_var("LOG_DIR").map(PathBuf::from);
        let log_filter = non_empty_var("RUST_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        Ok(Config {
            root_dir,
            schema_path,
            sqlite_busy_timeout: Duration::from_millis(busy_timeout_ms),
            log_dir,
            log_filter,
        })
    }

    /// Loads `.env` if present, then reads the environment.
    pub fn load() -> anyhow::Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            tracing::debug!("No .env file loaded: {}", e);
        }
        Self::from_env()
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.root_dir.is_none());
        assert!(config.schema_path.is_none());
        assert_eq!(config.sqlite_busy_timeout, Duration::from_millis(5000));
        assert_eq!(config.log_filter, DEFAULT_LOG_FILTER);
    }

    // All env manipulation lives in one test so parallel tests never race on it.
    #[test]
    fn test_from_env() {
        env::set_var("DB_ROOT_DIR", "/tmp/registry-root");
        env::set_var("DB_SCHEMA_PATH", "");
        env::set_var("SQLITE_BUSY_TIMEOUT_MS", "250");

        let config = Config::from_env().unwrap();
        assert_eq!(config.root_dir, Some(PathBuf::from("/tmp/registry-root")));
        assert!(config.schema_path.is_none());
        assert_eq!(config.sqlite_busy_timeout, Duration::from_millis(250));

        env::set_var("SQLITE_BUSY_TIMEOUT_MS", "soon");
        assert!(Config::from_env().is_err());

        env::remove_var("DB_ROOT_DIR");
        env::remove_var("DB_SCHEMA_PATH");
        env::remove_var("SQLITE_BUSY_TIMEOUT_MS");
    }
}
