//! Where opacity pages come from.

use async_trait::async_trait;
use url::Url;

use crate::error::HarvestResult;

/// Fetches the HTML body behind a query URL.
///
/// The acquisition loop only talks to this trait, so tests can swap the
/// network for scripted responses.
#[async_trait]
pub trait TableSource: Send + Sync {
    /// Perform one request and return the response body.
    async fn fetch(&self, url: &Url) -> HarvestResult<String>;
}
