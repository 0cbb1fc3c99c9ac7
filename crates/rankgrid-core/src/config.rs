use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
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
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so tests can drive it with a
/// `HashMap` lookup instead of `set_var`/`remove_var`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(var.to_string()))
    };

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

    let base_url = require("RANKGRID_BASE_URL")?;
    reqwest::Url::parse(&base_url).map_err(|e| ConfigError::InvalidEnvVar {
        var: "RANKGRID_BASE_URL".to_string(),
        reason: e.to_string(),
    })?;

    let env = parse_environment(&or_default("RANKGRID_ENV", "development"));
    let log_level = or_default("RANKGRID_LOG_LEVEL", "info");
    let request_timeout_secs = parse_u64("RANKGRID_REQUEST_TIMEOUT_SECS", "600")?;
    let user_agent = or_default("RANKGRID_USER_AGENT", "rankgrid/0.1 (local-ranking-grid)");
    let session_path = PathBuf::from(or_default(
        "RANKGRID_SESSION_PATH",
        "./.rankgrid/session.json",
    ));
    let logout_quiescence_ms = parse_u64("RANKGRID_LOGOUT_QUIESCENCE_MS", "2000")?;
    let max_retries = parse_u32("RANKGRID_MAX_RETRIES", "3")?;
    let retry_backoff_base_ms = parse_u64("RANKGRID_RETRY_BACKOFF_BASE_MS", "1000")?;
    let poll_interval_secs = parse_u64("RANKGRID_POLL_INTERVAL_SECS", "30")?;
    let poll_max_wait_secs = parse_u64("RANKGRID_POLL_MAX_WAIT_SECS", "1800")?;

    if poll_interval_secs == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "RANKGRID_POLL_INTERVAL_SECS".to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }

    Ok(AppConfig {
        base_url,
        env,
        log_level,
        request_timeout_secs,
        user_agent,
        session_path,
        logout_quiescence_ms,
        max_retries,
        retry_backoff_base_ms,
        poll_interval_secs,
        poll_max_wait_secs,
    })
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
