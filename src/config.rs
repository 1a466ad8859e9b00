//! Command-line and environment configuration.
//!
//! Every flag falls back to an environment variable, and `main` loads `.env`
//! before parsing.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use crate::feed::{FeedSource, HttpFeed};
use crate::fetch::BasicClient;
use crate::fetch::auth::{ApiKey, UrlParam};
use crate::stops::{StopSelector, non_blank};

pub const DEFAULT_FEED_URL: &str = "https://opendata.samtrafiken.se/gtfs-rt/xt/TripUpdates.pb";

/// Where the feed credential goes on each request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedAuth {
    /// No credential.
    None,
    /// Appended as a URL query parameter with the given name.
    UrlParam { param_name: String, key: String },
    /// Sent as an HTTP header with the given name.
    Header { header_name: String, key: String },
}

impl FeedAuth {
    /// Returns `true` if any authentication credentials are sent.
    pub fn requires_auth(&self) -> bool {
        !matches!(self, FeedAuth::None)
    }
}

/// Realtime feed settings.
#[derive(Debug, Clone, Args)]
pub struct FeedConfig {
    /// Feed access credential
    #[arg(long, env = "API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Feed endpoint, without the credential
    #[arg(long, env = "FEED_URL", default_value = DEFAULT_FEED_URL)]
    pub feed_url: String,

    /// Query parameter that carries the credential
    #[arg(long, env = "FEED_KEY_PARAM", default_value = "key")]
    pub key_param: String,

    /// Send the credential in this header instead of the query string
    #[arg(long, env = "FEED_KEY_HEADER")]
    pub key_header: Option<String>,

    /// Upper bound for one fetch and decode, in seconds
    #[arg(long, env = "FEED_TIMEOUT_SECS", default_value_t = 5)]
    pub feed_timeout_secs: u64,
}

impl FeedConfig {
    pub fn auth(&self) -> FeedAuth {
        let Some(key) = non_blank(self.api_key.as_deref()) else {
            return FeedAuth::None;
        };
        match non_blank(self.key_header.as_deref()) {
            Some(header_name) => FeedAuth::Header {
                header_name: header_name.to_string(),
                key: key.to_string(),
            },
            None => FeedAuth::UrlParam {
                param_name: self.key_param.clone(),
                key: key.to_string(),
            },
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.feed_timeout_secs)
    }

    /// HTTP feed source for `url` with this config's credential and timeout.
    pub fn source_for(&self, url: &str) -> Result<Arc<dyn FeedSource>> {
        let timeout = self.timeout();
        let client = BasicClient::new(timeout).context("failed to build HTTP client")?;

        let source: Arc<dyn FeedSource> = match self.auth() {
            FeedAuth::None => Arc::new(HttpFeed::new(client, url, timeout)),
            FeedAuth::UrlParam { param_name, key } => Arc::new(HttpFeed::new(
                UrlParam {
                    inner: client,
                    param_name,
                    key,
                },
                url,
                timeout,
            )),
            FeedAuth::Header { header_name, key } => Arc::new(HttpFeed::new(
                ApiKey::new(client, &header_name, &key)
                    .with_context(|| format!("invalid credential header '{header_name}'"))?,
                url,
                timeout,
            )),
        };
        Ok(source)
    }

    /// HTTP feed source for the configured feed URL.
    pub fn source(&self) -> Result<Arc<dyn FeedSource>> {
        self.source_for(&self.feed_url)
    }
}

/// Which stops to report on.
#[derive(Debug, Clone, Args)]
pub struct StopConfig {
    /// Explicit stop id; wins over --stop-name
    #[arg(long, env = "STOP_ID")]
    pub stop_id: Option<String>,

    /// Watch every stop whose name contains this text (case-insensitive)
    #[arg(long, env = "STOP_NAME")]
    pub stop_name: Option<String>,
}

impl StopConfig {
    pub fn selector(&self) -> StopSelector {
        StopSelector::from_options(self.stop_id.as_deref(), self.stop_name.as_deref())
    }
}

/// Static GTFS location.
#[derive(Debug, Clone, Args)]
pub struct ReferenceConfig {
    /// Directory containing routes.txt, trips.txt and stops.txt
    #[arg(long, env = "GTFS_DIR", default_value = "gtfs")]
    pub gtfs_dir: PathBuf,
}

/// HTTP server settings.
#[derive(Debug, Clone, Args)]
pub struct ServerConfig {
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Directory served for every non-API path
    #[arg(long, env = "STATIC_DIR", default_value = "public")]
    pub static_dir: PathBuf,

    /// Freshness window of the departure cache, in seconds
    #[arg(long, env = "CACHE_TTL_SECS", default_value_t = 30)]
    pub cache_ttl_secs: u64,
}

impl ServerConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}
