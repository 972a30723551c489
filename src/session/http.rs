//! HTTP image downloads

use super::ImageFetcher;
use crate::config::FetchConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, REFERER};

/// [`ImageFetcher`] backed by a shared `reqwest` client
///
/// Every request carries the configured timeout, user agent and referer.
#[derive(Clone, Debug)]
pub struct HttpImageFetcher {
    client: reqwest::Client,
}

impl HttpImageFetcher {
    /// Build a fetcher from the fetch settings
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the referer is not a valid header value, or if the HTTP
    /// client cannot be created.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(referer) = &config.referer {
            let value = HeaderValue::from_str(referer).map_err(|e| Error::Config {
                message: format!("invalid referer '{referer}': {e}"),
                key: Some("fetch.referer".to_string()),
            })?;
            headers.insert(REFERER, value);
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config {
                message: format!("failed to create HTTP client: {e}"),
                key: Some("fetch".to_string()),
            })?;

        Ok(Self { client })
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let fetch_error = |reason: String| Error::ImageFetch {
            url: url.to_string(),
            reason,
        };

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                fetch_error("request timed out".to_string())
            } else {
                fetch_error(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_error(format!("HTTP {status}")));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| fetch_error(format!("failed to read body: {e}")))?;

        tracing::debug!(url = %url, bytes = body.len(), "Fetched image");
        Ok(body.to_vec())
    }
}
