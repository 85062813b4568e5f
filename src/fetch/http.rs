//! Fetches the sitemap over HTTP.

use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use tracing::{debug, info};

use super::{parse_sitemap, FetchError, SitemapEntries, SitemapSource};

pub struct HttpSitemapSource {
    client: Client,
    url: String,
}

impl HttpSitemapSource {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("sitedrift/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Network(format!("could not build http client: {e}")))?;

        Ok(HttpSitemapSource {
            client,
            url: url.to_string(),
        })
    }
}

impl SitemapSource for HttpSitemapSource {
    fn describe(&self) -> String {
        self.url.clone()
    }

    fn fetch(&self) -> Result<SitemapEntries, FetchError> {
        let start = Instant::now();

        let response = self
            .client
            .get(&self.url)
            .send()
            .map_err(|e| FetchError::Network(format!("{}: {e}", self.url)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Network(format!("{} returned {status}", self.url)));
        }

        let body = response
            .text()
            .map_err(|e| FetchError::Network(format!("reading body of {}: {e}", self.url)))?;

        debug!(
            url = %self.url,
            bytes = body.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "downloaded sitemap"
        );

        let entries = parse_sitemap(&body)?;
        info!(url = %self.url, urls = entries.len(), "parsed sitemap");
        Ok(entries)
    }
}
