use std::path::PathBuf;

use config::{Config, ConfigError, Environment};
use serde::Deserialize;

pub const DEFAULT_BASE_URL: &str = "http://taxes.cityofjerseycity.com";
const DEFAULT_USER_AGENT: &str = concat!("taxscraper/", env!("CARGO_PKG_VERSION"));

/// Runtime settings, passed into the fetcher and pipeline at construction.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub base_url: String,
    /// Directory for timestamp-named database files.
    pub db_dir: PathBuf,
    pub user_agent: String,
    pub timeout_secs: u64,
    /// Visit the last listed page too instead of stopping one short of it.
    pub include_last_page: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            db_dir: PathBuf::from("."),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 30,
            include_last_page: false,
        }
    }
}

impl Settings {
    /// Defaults overlaid with `TAXSCRAPER_*` environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let defaults = Settings::default();
        Config::builder()
            .set_default("base_url", defaults.base_url)?
            .set_default("db_dir", defaults.db_dir.to_string_lossy().to_string())?
            .set_default("user_agent", defaults.user_agent)?
            .set_default("timeout_secs", defaults.timeout_secs as i64)?
            .set_default("include_last_page", defaults.include_last_page)?
            .add_source(Environment::with_prefix("TAXSCRAPER").try_parsing(true))
            .build()?
            .try_deserialize()
    }

    /// Base URL without a trailing slash, so paths can be appended directly.
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = Settings::default();
        assert_eq!(s.base_url, DEFAULT_BASE_URL);
        assert!(!s.include_last_page);
        assert!(s.user_agent.starts_with("taxscraper/"));
    }

    // The only test touching the process environment, so nothing races on it.
    #[test]
    fn environment_overrides_defaults() {
        std::env::set_var("TAXSCRAPER_BASE_URL", "http://portal.test");
        std::env::set_var("TAXSCRAPER_INCLUDE_LAST_PAGE", "true");
        std::env::set_var("TAXSCRAPER_TIMEOUT_SECS", "5");
        let loaded = Settings::load();
        std::env::remove_var("TAXSCRAPER_BASE_URL");
        std::env::remove_var("TAXSCRAPER_INCLUDE_LAST_PAGE");
        std::env::remove_var("TAXSCRAPER_TIMEOUT_SECS");

        let s = loaded.unwrap();
        assert_eq!(s.base_url, "http://portal.test");
        assert!(s.include_last_page);
        assert_eq!(s.timeout_secs, 5);
        assert!(s.user_agent.starts_with("taxscraper/"));
    }

    #[test]
    fn base_trims_trailing_slash() {
        let s = Settings {
            base_url: "http://example.test/".into(),
            ..Settings::default()
        };
        assert_eq!(s.base(), "http://example.test");
    }
}
