//! HTTP document source for curricula published as static files.

use std::time::Duration;

use anyhow::Result;
use futures::future::{BoxFuture, FutureExt};
use reqwest::{header, Client};
use serde_json::Value;
use tracing::debug;

use super::{build_url, DocumentSource, FetchError};

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Fetches curriculum documents from a base URL.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpSource {
    client: Client,
    base_url: String,
}

impl HttpSource {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, FetchError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(FetchError::from_status(status, &body))
        }
    }

    async fn get_json(&self, path: &str) -> Result<Value, FetchError> {
        let url = build_url(&self.base_url, path);
        debug!(url = %url, "Fetching document");

        let response = self
            .client
            .get(&url)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;
        let response = Self::check_response(response).await?;

        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| FetchError::InvalidResponse(format!("{}: {}", url, e)))
    }
}

impl DocumentSource for HttpSource {
    fn fetch_json<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<Value, FetchError>> {
        self.get_json(path).boxed()
    }
}
