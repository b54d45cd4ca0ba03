use std::path::PathBuf;
use std::time::Duration;

/// Sync server configuration
///
/// # Environment variables
///
/// A `.env` file in the working directory is loaded first.
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | WORK_DIR | ./work_dir | database, logs, vendors file |
/// | HTTP_PORT | 8080 | operator API port |
/// | LOG_LEVEL | info | overridden by RUST_LOG |
/// | LOG_JSON | false | JSON log lines |
/// | ENVIRONMENT | development | development / staging / production |
/// | MAX_CONCURRENT_REQUESTS | 4 | outbound vendor requests in flight (min 1) |
/// | FEED_TIMEOUT_MS | 30000 | per-request vendor deadline |
/// | VENDORS_FILE | WORK_DIR/vendors.json | vendor registry |
/// | SCHEDULER_TICK_SECS | 30 | how often due vendors are checked |
///
/// ```ignore
/// WORK_DIR=/data/sync HTTP_PORT=9000 cargo run -p sync-server
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub work_dir: String,
    pub http_port: u16,
    pub log_level: String,
    pub log_json: bool,
    /// development | staging | production
    pub environment: String,
    pub max_concurrent_requests: usize,
    pub feed_timeout_ms: u64,
    pub vendors_file: String,
    pub scheduler_tick_secs: u64,
}

impl Config {
    /// Load from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let work_dir = std::env::var("WORK_DIR").unwrap_or_else(|_| "./work_dir".into());
        let vendors_file = std::env::var("VENDORS_FILE").unwrap_or_else(|_| {
            PathBuf::from(&work_dir)
                .join("vendors.json")
                .to_string_lossy()
                .into_owned()
        });

        Self {
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_json: std::env::var("LOG_JSON")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
            max_concurrent_requests: std::env::var("MAX_CONCURRENT_REQUESTS")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(4)
                .max(1),
            feed_timeout_ms: std::env::var("FEED_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30_000),
            scheduler_tick_secs: std::env::var("SCHEDULER_TICK_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            vendors_file,
            work_dir,
        }
    }

    /// Defaults rooted at `work_dir`, ignoring the environment
    ///
    /// Used by tests.
    pub fn with_work_dir(work_dir: impl Into<String>) -> Self {
        let work_dir = work_dir.into();
        Self {
            vendors_file: PathBuf::from(&work_dir)
                .join("vendors.json")
                .to_string_lossy()
                .into_owned(),
            work_dir,
            http_port: 8080,
            log_level: "info".into(),
            log_json: false,
            environment: "development".into(),
            max_concurrent_requests: 4,
            feed_timeout_ms: 30_000,
            scheduler_tick_secs: 30,
        }
    }

    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.work_dir)
            .join("database")
            .join("sync.redb")
    }

    pub fn log_dir(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("logs")
    }

    pub fn feed_timeout(&self) -> Duration {
        Duration::from_millis(self.feed_timeout_ms)
    }

    pub fn scheduler_tick(&self) -> Duration {
        Duration::from_secs(self.scheduler_tick_secs.max(1))
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_follow_work_dir() {
        let config = Config::with_work_dir("/srv/sync");
        assert_eq!(
            config.database_path(),
            PathBuf::from("/srv/sync/database/sync.redb")
        );
        assert_eq!(config.log_dir(), PathBuf::from("/srv/sync/logs"));
        assert_eq!(config.vendors_file, "/srv/sync/vendors.json");
        assert_eq!(config.feed_timeout(), Duration::from_secs(30));
        assert!(config.is_development());
    }

    #[test]
    fn test_zero_tick_is_clamped() {
        let mut config = Config::with_work_dir("/tmp");
        config.scheduler_tick_secs = 0;
        assert_eq!(config.scheduler_tick(), Duration::from_secs(1));
    }
}
