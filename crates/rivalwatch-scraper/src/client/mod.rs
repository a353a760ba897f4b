//! Plain HTML page fetcher shared by every extractor.

mod urls;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use reqwest::Client;

use crate::error::ScraperError;

pub use urls::{google_search_url, page_url, trustpilot_url};

/// Browser user-agent strings rotated round-robin, one per request.
pub const USER_AGENTS: [&str; 3] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64; rv:120.0) Gecko/20100101 Firefox/120.0",
];

const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Fetches competitor pages with a fixed timeout and a politeness delay.
///
/// There is no retry at this layer: a page that cannot be fetched is simply
/// unavailable for this run.
pub struct PageFetcher {
    client: Client,
    delay: Duration,
    next_agent: AtomicUsize,
}

impl PageFetcher {
    /// Creates a fetcher with the given request timeout and the delay
    /// [`PageFetcher::pause`] sleeps for.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(timeout_secs: u64, delay_ms: u64) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS.min(timeout_secs)))
            .build()?;
        Ok(Self {
            client,
            delay: Duration::from_millis(delay_ms),
            next_agent: AtomicUsize::new(0),
        })
    }

    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the client cannot be constructed.
    pub fn from_app_config(config: &rivalwatch_core::AppConfig) -> Result<Self, ScraperError> {
        Self::new(
            config.scraper_request_timeout_secs,
            config.scraper_request_delay_ms,
        )
    }

    fn next_user_agent(&self) -> &'static str {
        let index = self.next_agent.fetch_add(1, Ordering::Relaxed);
        USER_AGENTS[index % USER_AGENTS.len()]
    }

    /// Fetches `url` and returns the response body.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::InvalidUrl`] if `url` does not parse.
    /// - [`ScraperError::Timeout`] if the request exceeds the configured timeout.
    /// - [`ScraperError::UnexpectedStatus`] for any non-2xx response.
    /// - [`ScraperError::Http`] for other network or TLS failures.
    pub async fn try_fetch(&self, url: &str) -> Result<String, ScraperError> {
        let parsed = reqwest::Url::parse(url).map_err(|e| ScraperError::InvalidUrl {
            url: url.to_owned(),
            reason: e.to_string(),
        })?;

        let response = self
            .client
            .get(parsed)
            .header(reqwest::header::USER_AGENT, self.next_user_agent())
            .header(
                reqwest::header::ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .send()
            .await
            .map_err(|e| classify(e, url))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScraperError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_owned(),
            });
        }

        response.text().await.map_err(|e| classify(e, url))
    }

    /// Fetches `url`, logging and swallowing any failure.
    pub async fn fetch(&self, url: &str) -> Option<String> {
        match self.try_fetch(url).await {
            Ok(body) => {
                tracing::debug!(url, bytes = body.len(), "fetched page");
                Some(body)
            }
            Err(ScraperError::Timeout { .. }) => {
                tracing::warn!(url, "page request timed out");
                None
            }
            Err(e) => {
                tracing::warn!(url, error = %e, "page unavailable");
                None
            }
        }
    }

    /// Sleeps for the politeness delay between consecutive requests.
    pub async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

fn classify(err: reqwest::Error, url: &str) -> ScraperError {
    if err.is_timeout() {
        ScraperError::Timeout {
            url: url.to_owned(),
        }
    } else {
        ScraperError::Http(err)
    }
}

#[cfg(test)]
#[path = "../client_test.rs"]
mod tests;
