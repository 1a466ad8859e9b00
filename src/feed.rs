//! Realtime feed sources.
//!
//! A [`FeedSource`] performs one best-effort fetch and decode per call. There
//! is no retry here; callers decide what a failure means for the request.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::FeedError;
use crate::fetch::{HttpClient, fetch_bytes};
use crate::gtfs_rt::FeedMessage;
use crate::parser::parse_feed;

#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetches and decodes the current feed snapshot.
    async fn fetch_feed(&self) -> Result<FeedMessage, FeedError>;
}

/// Feed served over HTTP.
///
/// The whole fetch, body read included, is bounded by `timeout`.
pub struct HttpFeed<C> {
    client: C,
    url: String,
    timeout: Duration,
}

impl<C: HttpClient> HttpFeed<C> {
    /// `url` must not carry the credential; wrap `client` in one of the
    /// [`crate::fetch::auth`] wrappers instead so it stays out of logs.
    pub fn new(client: C, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            url: url.into(),
            timeout,
        }
    }
}

#[async_trait]
impl<C: HttpClient> FeedSource for HttpFeed<C> {
    #[tracing::instrument(skip(self), fields(url = %self.url))]
    async fn fetch_feed(&self) -> Result<FeedMessage, FeedError> {
        let fetch_start = Instant::now();
        let bytes = tokio::time::timeout(self.timeout, fetch_bytes(&self.client, &self.url))
            .await
            .map_err(|_| FeedError::Timeout {
                after: self.timeout,
            })??;

        let elapsed = fetch_start.elapsed();
        if elapsed > self.timeout / 2 {
            warn!(elapsed_ms = elapsed.as_millis() as u64, "Feed fetch was slow");
        }

        let feed = parse_feed(&bytes)?;
        debug!(
            entity_count = feed.entity.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Feed parsed successfully"
        );
        Ok(feed)
    }
}

/// Feed snapshot stored on disk, re-read on every fetch.
pub struct FileFeed {
    path: PathBuf,
}

impl FileFeed {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl FeedSource for FileFeed {
    #[tracing::instrument(skip(self), fields(path = %self.path.display()))]
    async fn fetch_feed(&self) -> Result<FeedMessage, FeedError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|source| FeedError::Io {
                path: self.path.clone(),
                source,
            })?;
        let feed = parse_feed(&bytes)?;
        debug!(entity_count = feed.entity.len(), "Feed parsed successfully");
        Ok(feed)
    }
}
