use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Every setting has a default, so an empty environment yields a working
/// local configuration backed by `competitor_data.db`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let http_url = |var: &str, default: &str| -> Result<String, ConfigError> {
        let raw = or_default(var, default);
        if raw.starts_with("http://") || raw.starts_with("https://") {
            Ok(raw.trim_end_matches('/').to_string())
        } else {
            Err(ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: format!("expected an http(s) URL, got '{raw}'"),
            })
        }
    };

    let database_url = or_default("DATABASE_URL", "sqlite://competitor_data.db");
    let env = parse_environment(&or_default("RIVALWATCH_ENV", "development"))?;
    let log_level = or_default("RIVALWATCH_LOG_LEVEL", "info");
    let log_dir = PathBuf::from(or_default("RIVALWATCH_LOG_DIR", "logs"));
    let competitors_path = PathBuf::from(or_default(
        "RIVALWATCH_COMPETITORS_PATH",
        "./config/competitors.yaml",
    ));

    let db_max_connections = parse_u32("RIVALWATCH_DB_MAX_CONNECTIONS", "5")?;
    if db_max_connections == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "RIVALWATCH_DB_MAX_CONNECTIONS".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    let db_acquire_timeout_secs = parse_u64("RIVALWATCH_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let scraper_request_timeout_secs =
        parse_u64("RIVALWATCH_SCRAPER_REQUEST_TIMEOUT_SECS", "30")?;
    let scraper_request_delay_ms = parse_u64("RIVALWATCH_SCRAPER_REQUEST_DELAY_MS", "2000")?;

    let trustpilot_base_url = http_url(
        "RIVALWATCH_TRUSTPILOT_BASE_URL",
        "https://www.trustpilot.com/review",
    )?;
    let google_search_url = http_url(
        "RIVALWATCH_GOOGLE_SEARCH_URL",
        "https://www.google.com/search",
    )?;
    let schedule_cron = or_default("RIVALWATCH_SCHEDULE_CRON", "0 0 6 * * *");

    Ok(AppConfig {
        database_url,
        env,
        log_level,
        log_dir,
        competitors_path,
        db_max_connections,
        db_acquire_timeout_secs,
        scraper_request_timeout_secs,
        scraper_request_delay_ms,
        trustpilot_base_url,
        google_search_url,
        schedule_cron,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "RIVALWATCH_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
