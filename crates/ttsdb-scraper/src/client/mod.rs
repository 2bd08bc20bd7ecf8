//! HTTP client for the storefront's per-collection `page-data.json`.

use std::time::Duration;

use reqwest::Client;

use crate::error::ScraperError;
use crate::types::{CollectionPageData, ProductEdge};

/// HTTP client for one upstream storefront.
///
/// Every failure is returned to the caller as a typed error: network and TLS
/// problems as [`ScraperError::SourceUnavailable`], non-2xx answers as
/// [`ScraperError::UnexpectedStatus`], and bodies that do not carry the
/// expected product listing as [`ScraperError::MalformedPayload`]. Nothing is
/// retried here; the aggregator decides how a failed collection is handled.
pub struct CollectionClient {
    client: Client,
    base_url: String,
}

impl CollectionClient {
    /// Creates a `CollectionClient` for the storefront at `base_url` with the
    /// given request timeout and `User-Agent`.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::InvalidBaseUrl`] if `base_url` is not an
    /// absolute http(s) URL, or [`ScraperError::Client`] if the underlying
    /// `reqwest::Client` cannot be constructed.
    pub fn new(base_url: &str, timeout_secs: u64, user_agent: &str) -> Result<Self, ScraperError> {
        let parsed = reqwest::Url::parse(base_url).map_err(|e| ScraperError::InvalidBaseUrl {
            base_url: base_url.to_owned(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ScraperError::InvalidBaseUrl {
                base_url: base_url.to_owned(),
                reason: format!("unsupported scheme \"{}\"", parsed.scheme()),
            });
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()
            .map_err(ScraperError::Client)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    /// Storefront origin without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Builds the `page-data.json` URL for a collection handle.
    #[must_use]
    pub fn collection_url(&self, collection: &str) -> String {
        format!(
            "{}/page-data/collection/{collection}/page-data.json",
            self.base_url
        )
    }

    /// Fetches the raw product edges listed for one collection, in upstream
    /// order.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::SourceUnavailable`] on a transport failure.
    /// - [`ScraperError::UnexpectedStatus`] on any non-2xx status.
    /// - [`ScraperError::MalformedPayload`] when the body is not JSON, does not
    ///   match the expected shape, or has a `null` collection.
    pub async fn fetch_collection(
        &self,
        collection: &str,
    ) -> Result<Vec<ProductEdge>, ScraperError> {
        let url = self.collection_url(collection);

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .header(reqwest::header::CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(|e| ScraperError::SourceUnavailable {
                collection: collection.to_owned(),
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScraperError::UnexpectedStatus {
                collection: collection.to_owned(),
                status: status.as_u16(),
                url,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| ScraperError::SourceUnavailable {
                collection: collection.to_owned(),
                source: e,
            })?;

        parse_collection_body(collection, &body)
    }
}

/// Decodes a `page-data.json` body into its product edges.
///
/// # Errors
///
/// Returns [`ScraperError::MalformedPayload`] when the body does not contain
/// `result.serverData.data.collection.products.edges`.
pub(crate) fn parse_collection_body(
    collection: &str,
    body: &str,
) -> Result<Vec<ProductEdge>, ScraperError> {
    let page = serde_json::from_str::<CollectionPageData>(body).map_err(|e| {
        ScraperError::MalformedPayload {
            collection: collection.to_owned(),
            reason: e.to_string(),
        }
    })?;

    let data = page
        .result
        .server_data
        .data
        .collection
        .ok_or_else(|| ScraperError::MalformedPayload {
            collection: collection.to_owned(),
            reason: "collection is null".to_owned(),
        })?;

    Ok(data.products.edges)
}

#[cfg(test)]
#[path = "../client_test.rs"]
mod tests;
