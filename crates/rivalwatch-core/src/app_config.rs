use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub log_level: String,
    /// Directory that receives the per-day `daily_<date>.log` files.
    pub log_dir: PathBuf,
    pub competitors_path: PathBuf,
    pub db_max_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub scraper_request_timeout_secs: u64,
    /// Pause between consecutive requests made for the same competitor.
    pub scraper_request_delay_ms: u64,
    pub trustpilot_base_url: String,
    pub google_search_url: String,
    /// Six-field cron expression (seconds first) used by the `schedule` command.
    pub schedule_cron: String,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // sqlite URLs may carry a `?key=` pragma for encrypted builds
        let database_url = if self.database_url.contains('?') {
            "[redacted]"
        } else {
            self.database_url.as_str()
        };
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("database_url", &database_url)
            .field("log_level", &self.log_level)
            .field("log_dir", &self.log_dir)
            .field("competitors_path", &self.competitors_path)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field(
                "scraper_request_timeout_secs",
                &self.scraper_request_timeout_secs,
            )
            .field("scraper_request_delay_ms", &self.scraper_request_delay_ms)
            .field("trustpilot_base_url", &self.trustpilot_base_url)
            .field("google_search_url", &self.google_search_url)
            .field("schedule_cron", &self.schedule_cron)
            .finish()
    }
}
