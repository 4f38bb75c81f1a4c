//! HTTP table source wrapping reqwest.
//!
//! One GET per call with a fixed timeout. Retrying is the acquisition
//! loop's job, so this client never retries on its own.

use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::error::{HarvestError, HarvestResult};
use crate::source::TableSource;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// HTTP client for the opacity endpoint.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    /// Create a client with the given per-request timeout.
    pub fn new(timeout: Duration) -> HarvestResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()
            .map_err(|e| HarvestError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl TableSource for HttpClient {
    async fn fetch(&self, url: &Url) -> HarvestResult<String> {
        let resp = self.client.get(url.as_str()).send().await?;

        let status = resp.status();
        if !status.is_success() {
            tracing::debug!("GET {url} returned {status}");
            return Err(HarvestError::Status(status.as_u16()));
        }

        Ok(resp.text().await?)
    }
}
