mod basic;
mod client;
pub mod auth;

pub use basic::BasicClient;
pub use client::HttpClient;

use bytes::Bytes;
use tracing::debug;

use crate::error::FeedError;

/// GETs `url` and returns the full body of a successful response.
///
/// # Errors
///
/// [`FeedError::Status`] for a non-2xx answer, [`FeedError::Http`] for
/// transport failures.
pub async fn fetch_bytes<C: HttpClient + ?Sized>(client: &C, url: &str) -> Result<Bytes, FeedError> {
    let url: reqwest::Url = url.parse().map_err(|_| FeedError::InvalidUrl {
        url: url.to_string(),
    })?;
    let req = reqwest::Request::new(reqwest::Method::GET, url);

    let resp = client.execute(req).await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(FeedError::Status {
            status: status.as_u16(),
        });
    }

    let body = resp.bytes().await?;
    debug!(bytes = body.len(), "Feed body received");
    Ok(body)
}
