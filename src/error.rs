//! Error types for loading reference data, fetching the feed and serving
//! departures.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Static GTFS tables could not be read. Fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ReferenceDataError {
    /// File missing or unreadable
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed CSV or a required column is missing
    #[error("malformed table {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Reaching or decoding the realtime feed failed.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// Transport-level failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Upstream answered with a non-success status
    #[error("feed returned status {status}")]
    Status { status: u16 },

    /// Fetch and decode did not finish in time
    #[error("feed fetch timed out after {after:?}")]
    Timeout { after: Duration },

    /// Body is not a valid `FeedMessage`
    #[error("protobuf decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    /// Local feed file could not be read
    #[error("failed to read feed file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configured feed URL does not parse
    #[error("invalid feed URL: {url}")]
    InvalidUrl { url: String },
}

/// Request-level failure of the departures operation.
#[derive(Debug, thiserror::Error)]
pub enum DepartureError {
    /// No stop could be resolved from configuration
    #[error("{label}")]
    NoStopConfigured { label: String },

    /// The feed could not be fetched or decoded. Shared by every request
    /// that waited on the same refresh.
    #[error("failed to fetch departures: {0}")]
    FeedUnavailable(#[from] Arc<FeedError>),
}

impl From<FeedError> for DepartureError {
    fn from(err: FeedError) -> Self {
        DepartureError::FeedUnavailable(Arc::new(err))
    }
}

impl DepartureError {
    /// Stable machine-readable kind, returned to HTTP callers.
    pub fn kind(&self) -> &'static str {
        match self {
            DepartureError::NoStopConfigured { .. } => "config_error",
            DepartureError::FeedUnavailable(_) => "feed_unavailable",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable() {
        let config = DepartureError::NoStopConfigured {
            label: "No stop configured".to_string(),
        };
        assert_eq!(config.kind(), "config_error");
        assert_eq!(config.to_string(), "No stop configured");

        let feed = DepartureError::from(FeedError::Status { status: 503 });
        assert_eq!(feed.kind(), "feed_unavailable");
        assert_eq!(
            feed.to_string(),
            "failed to fetch departures: feed returned status 503"
        );
    }
}
