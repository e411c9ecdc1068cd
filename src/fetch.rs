//! Retrieval of external resources
//!
//! Resources referenced by `!ext` tags are fetched through the [`Fetcher`]
//! trait so the transport can be swapped out. [`HttpFetcher`] performs a plain
//! blocking GET; [`MapFetcher`] serves canned bodies, which is what tests and
//! offline runs use.

use std::collections::HashMap;
use std::time::Duration;

use log::debug;
use reqwest::blocking::Client;

use crate::error::{Error, Result};

/// Default timeout for HTTP requests (30 seconds)
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Trait for resource retrieval - allows mocking in tests
pub trait Fetcher {
    /// Fetch the resource at `url` and return its body as text.
    fn fetch(&self, url: &str) -> Result<String>;
}

/// Fetches resources over HTTP(S) with a blocking client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(concat!("repo-control/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Fetch {
                url: String::new(),
                message: format!("Failed to create HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<String> {
        debug!("Fetching {}", url);
        let response = self.client.get(url).send().map_err(|e| Error::Fetch {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        if !response.status().is_success() {
            return Err(Error::Fetch {
                url: url.to_string(),
                message: format!("HTTP {}", response.status()),
            });
        }
        response.text().map_err(|e| Error::Fetch {
            url: url.to_string(),
            message: format!("Failed to read response body: {}", e),
        })
    }
}

/// Serves fixed bodies by URL; unknown URLs fail like an unreachable host.
#[derive(Debug, Clone, Default)]
pub struct MapFetcher {
    bodies: HashMap<String, String>,
}

impl MapFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &str, body: &str) -> Self {
        self.insert(url, body);
        self
    }

    pub fn insert(&mut self, url: &str, body: &str) {
        self.bodies.insert(url.to_string(), body.to_string());
    }
}

impl Fetcher for MapFetcher {
    fn fetch(&self, url: &str) -> Result<String> {
        self.bodies.get(url).cloned().ok_or_else(|| Error::Fetch {
            url: url.to_string(),
            message: "resource not found".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_fetcher_serves_known_urls() {
        let fetcher = MapFetcher::new().with("https://example.com/a.json", "{\"a\": 1}");
        assert_eq!(
            fetcher.fetch("https://example.com/a.json").unwrap(),
            "{\"a\": 1}"
        );
    }

    #[test]
    fn test_map_fetcher_unknown_url_fails() {
        let fetcher = MapFetcher::new();
        let err = fetcher.fetch("https://example.com/missing.yaml").unwrap_err();
        assert!(matches!(err, Error::Fetch { .. }));
    }

    #[test]
    fn test_http_fetcher_builds() {
        assert!(HttpFetcher::new().is_ok());
    }
}
