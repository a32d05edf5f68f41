//! Application configuration, loaded layered `Environment -> .env -> defaults`
//! the way `econ-graph-core::Config` does it, with `validator` enforcing
//! range/non-empty checks before anything downstream sees a `Settings`.

use std::collections::HashMap;

use serde::Deserialize;
use validator::Validate;

use crate::error::{AppError, AppResult};

fn default_max_concurrency() -> u32 {
    4
}

fn default_max_requests_per_second() -> f64 {
    5.0
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff_factor() -> f64 {
    2.0
}

fn default_log_level() -> String {
    "INFO".to_string()
}

fn default_user_agent() -> String {
    "pe-collector/0.1 (contact unset)".to_string()
}

fn default_scheduler_cron() -> String {
    "0 0 3 * * *".to_string()
}

/// Validated application settings (§6). Constructed once at process start
/// via [`Settings::from_env`] and shared behind an `Arc` by everything that
/// needs it — the HTTP substrate, the orchestrator, and the collectors that
/// read source-specific API keys out of `source_api_keys`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Settings {
    pub database_url: String,

    #[validate(range(min = 1, max = 64))]
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: u32,

    #[validate(range(min = 0.01))]
    #[serde(default = "default_max_requests_per_second")]
    pub max_requests_per_second: f64,

    #[validate(range(max = 10))]
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[validate(range(min = 1.0))]
    #[serde(default = "default_retry_backoff_factor")]
    pub retry_backoff_factor: f64,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_user_agent")]
    pub pe_user_agent: String,

    #[serde(default = "default_user_agent")]
    pub pe_sec_user_agent: String,

    #[serde(default = "default_scheduler_cron")]
    pub scheduler_cron: String,

    /// `{SOURCE}_API_KEY` values collected by prefix, keyed by the
    /// lowercased source name (e.g. `"newsapi"`, `"openai"`). A missing key
    /// means that source's collector degrades gracefully rather than
    /// failing the run (§7).
    #[serde(default)]
    pub source_api_keys: HashMap<String, String>,
}

const LOG_LEVELS: &[&str] = &["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"];

const API_KEY_SUFFIX: &str = "_API_KEY";

impl Settings {
    /// Loads configuration from the process environment, falling back to a
    /// `.env` file if present, then defaults. Fails fast with
    /// [`AppError::Configuration`] on a missing `DATABASE_URL` or an
    /// out-of-range numeric option.
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();

        let builder = config::Config::builder()
            .set_default("max_concurrency", default_max_concurrency())?
            .set_default("max_requests_per_second", default_max_requests_per_second())?
            .set_default("max_retries", default_max_retries())?
            .set_default("retry_backoff_factor", default_retry_backoff_factor())?
            .set_default("log_level", default_log_level())?
            .set_default("pe_user_agent", default_user_agent())?
            .set_default("pe_sec_user_agent", default_user_agent())?
            .set_default("scheduler_cron", default_scheduler_cron())?
            .add_source(
                config::Environment::default()
                    .try_parsing(true)
                    .separator("__"),
            );

        let raw = builder.build()?;
        let mut settings: Settings = raw.try_deserialize()?;
        settings.source_api_keys = collect_source_api_keys(std::env::vars());
        settings.validate()?;

        if !LOG_LEVELS.contains(&settings.log_level.to_uppercase().as_str()) {
            return Err(AppError::config(format!(
                "LOG_LEVEL must be one of {LOG_LEVELS:?}, got {:?}",
                settings.log_level
            )));
        }

        Ok(settings)
    }

    pub fn api_key_for(&self, source: &str) -> Option<&str> {
        self.source_api_keys
            .get(&source.to_lowercase())
            .map(String::as_str)
    }
}

fn collect_source_api_keys(
    vars: impl Iterator<Item = (String, String)>,
) -> HashMap<String, String> {
    vars.filter_map(|(key, value)| {
        key.strip_suffix(API_KEY_SUFFIX)
            .map(|source| (source.to_lowercase(), value))
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_source_api_keys_by_prefix() {
        let vars = vec![
            ("NEWSAPI_API_KEY".to_string(), "abc123".to_string()),
            ("OPENAI_API_KEY".to_string(), "sk-xyz".to_string()),
            ("DATABASE_URL".to_string(), "postgres://".to_string()),
        ];
        let keys = collect_source_api_keys(vars.into_iter());
        assert_eq!(keys.get("newsapi").map(String::as_str), Some("abc123"));
        assert_eq!(keys.get("openai").map(String::as_str), Some("sk-xyz"));
        assert!(!keys.contains_key("database_url"));
    }
}
