use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use tracing::debug;

use crate::error::{Result, ScrapeError};
use crate::settings::Settings;

/// Retrieves a page body by absolute URL.
pub trait Fetch {
    fn get(&self, url: &str) -> Result<String>;
}

/// Blocking HTTP fetcher. One request at a time, no retries.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .user_agent(settings.user_agent.as_str())
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| fetch_error(&settings.base_url, e))?;
        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    fn get(&self, url: &str) -> Result<String> {
        let start = Instant::now();
        let body = self
            .client
            .get(url)
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.text())
            .map_err(|e| fetch_error(url, e))?;
        debug!("GET {} ({} bytes, {} ms)", url, body.len(), start.elapsed().as_millis());
        Ok(body)
    }
}

fn fetch_error(url: &str, err: reqwest::Error) -> ScrapeError {
    ScrapeError::Fetch {
        url: url.to_string(),
        reason: err.to_string(),
    }
}
