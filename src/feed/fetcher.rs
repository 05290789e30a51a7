use crate::feed::parser::{parse_entries, Entry};
use chrono::Utc;
use futures::future::BoxFuture;
use std::time::Duration;
use thiserror::Error;

/// Errors from fetching a single feed URL.
///
/// All variants are per-URL and non-fatal: the owning worker logs the error
/// and moves on to the next URL; retry happens on the next polling tick.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, body read)
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    /// Response body could not be parsed as RSS or Atom
    #[error("parse error: {0}")]
    Parse(String),
}

/// Source of entries for one feed URL.
///
/// The production implementation is [`HttpFetcher`]; tests drive workers with
/// stub sources. Bound once at construction, never swapped at runtime.
pub trait EntrySource: Send + Sync {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<Entry>, FetchError>>;
}

/// Fetches and parses a feed URL with a bounded timeout.
///
/// No retry or backoff lives here: a hung or failing remote simply yields an
/// error for this cycle and the worker's fixed polling interval governs when
/// the URL is tried again.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    async fn fetch_inner(&self, url: &str) -> Result<Vec<Entry>, FetchError> {
        // One deadline covers the whole exchange, headers and body both, so a
        // trickling server cannot hold a worker past the configured timeout.
        let retrieve = async {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(FetchError::Network)?;

            if !response.status().is_success() {
                return Err(FetchError::HttpStatus(response.status().as_u16()));
            }

            response.bytes().await.map_err(FetchError::Network)
        };

        let bytes = tokio::time::timeout(self.timeout, retrieve)
            .await
            .map_err(|_| FetchError::Timeout(self.timeout))??;

        parse_entries(&bytes, Utc::now()).map_err(|e| FetchError::Parse(e.to_string()))
    }
}

impl EntrySource for HttpFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<Entry>, FetchError>> {
        Box::pin(self.fetch_inner(url))
    }
}
