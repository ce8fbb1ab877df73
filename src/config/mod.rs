//! Configuration management for Stayra
//!
//! Loads in-code defaults, optional `config/default` and `config/local`
//! files, `STAYRA__SECTION__KEY` environment variables and `.env`.

use anyhow::{Context, Result};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub search: SearchConfig,
    pub detail: DetailConfig,
    pub redirect: RedirectConfig,
    pub analytics: AnalyticsConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// sqlx connection URL, e.g. `sqlite://stayra.db`
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Maximum hotels returned per search
    pub max_results: usize,
    /// Rates are taken for check-in dates in `[checkin, checkin + N days]`
    pub rate_window_days: i64,
    /// Checkout offset when the request omits it
    pub default_stay_nights: i64,
    pub default_guests: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DetailConfig {
    /// Cheapest rates considered per room type
    pub max_rates_per_room: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedirectConfig {
    /// Where clicks land when no partner link can be resolved
    pub fallback_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyticsConfig {
    pub enabled: bool,
    pub api_key: Option<String>,
    pub host: String,
    pub timeout_ms: u64,
    /// Tag attached to every event
    pub environment: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    /// HS256 secret; bearer tokens are ignored when unset
    pub jwt_secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    pub json: bool,
}

fn with_defaults() -> Result<ConfigBuilder<DefaultState>> {
    Ok(Config::builder()
        // Server defaults
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 3000)?
        // Database defaults
        .set_default("database.url", "sqlite://stayra.db")?
        .set_default("database.max_connections", 5)?
        // Search defaults
        .set_default("search.max_results", 20)?
        .set_default("search.rate_window_days", 7)?
        .set_default("search.default_stay_nights", 3)?
        .set_default("search.default_guests", 2)?
        // Detail defaults
        .set_default("detail.max_rates_per_room", 50)?
        // Redirect defaults
        .set_default("redirect.fallback_url", "https://stayra.com")?
        // Analytics defaults
        .set_default("analytics.enabled", true)?
        .set_default("analytics.host", "https://us.i.posthog.com")?
        .set_default("analytics.timeout_ms", 3000)?
        .set_default("analytics.environment", "development")?
        // Log defaults
        .set_default("log.json", false)?)
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        // Load .env file first
        dotenvy::dotenv().ok();

        let config = with_defaults()?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (STAYRA__*)
            .add_source(Environment::with_prefix("STAYRA").separator("__"))
            // Conventional variables win over everything else
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
            .set_override_option("auth.jwt_secret", std::env::var("JWT_SECRET").ok())?
            .set_override_option("analytics.api_key", std::env::var("POSTHOG_API_KEY").ok())?
            .set_override_option("analytics.host", std::env::var("POSTHOG_HOST").ok())?
            .set_override_option("redirect.fallback_url", std::env::var("APP_URL").ok())?
            .build()
            .context("Failed to build configuration")?;

        let app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        Ok(app_config)
    }

    /// Built-in defaults only, without files or environment
    pub fn defaults() -> Result<Self> {
        with_defaults()?
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    pub fn digest(&self) -> String {
        format!(
            "listen={}:{} db={} max_results={} window_days={} analytics={} auth={}",
            self.server.host,
            self.server.port,
            self.database.url,
            self.search.max_results,
            self.search.rate_window_days,
            self.analytics.enabled && self.analytics.api_key.is_some(),
            self.auth.jwt_secret.is_some()
        )
    }
}

impl std::fmt::Display for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.digest())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::defaults().unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.search.max_results, 20);
        assert_eq!(config.search.rate_window_days, 7);
        assert_eq!(config.search.default_stay_nights, 3);
        assert_eq!(config.search.default_guests, 2);
        assert_eq!(config.detail.max_rates_per_room, 50);
        assert!(config.analytics.api_key.is_none());
        assert!(config.auth.jwt_secret.is_none());
    }

    #[test]
    fn test_load_without_jwt_secret() {
        std::env::remove_var("JWT_SECRET");
        std::env::remove_var("STAYRA__AUTH__JWT_SECRET");

        let config = AppConfig::load();
        assert!(config.is_ok(), "{:?}", config.err());
    }

    #[test]
    fn test_digest_hides_secrets() {
        let mut config = AppConfig::defaults().unwrap();
        config.auth.jwt_secret = Some("hunter2".to_string());
        let digest = config.to_string();
        assert!(digest.contains("auth=true"));
        assert!(!digest.contains("hunter2"));
    }
}
