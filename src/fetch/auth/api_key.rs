use crate::fetch::client::HttpClient;
use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue, InvalidHeaderName, InvalidHeaderValue};

/// An [`HttpClient`] wrapper that sends an API key as an HTTP header.
pub struct ApiKey<C> {
    inner: C,
    header_name: HeaderName,
    key: HeaderValue,
}

/// Header name or value rejected by [`ApiKey::new`].
#[derive(Debug, thiserror::Error)]
pub enum InvalidApiKey {
    #[error("invalid header name: {0}")]
    Name(#[from] InvalidHeaderName),
    #[error("invalid header value: {0}")]
    Value(#[from] InvalidHeaderValue),
}

impl<C> ApiKey<C> {
    /// Wraps `inner`, sending `key` in the `header_name` header.
    pub fn new(inner: C, header_name: &str, key: &str) -> Result<Self, InvalidApiKey> {
        let mut key = HeaderValue::from_str(key)?;
        key.set_sensitive(true);
        Ok(Self {
            inner,
            header_name: HeaderName::from_bytes(header_name.as_bytes())?,
            key,
        })
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for ApiKey<C> {
    async fn execute(&self, mut req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        req.headers_mut()
            .insert(self.header_name.clone(), self.key.clone());
        self.inner.execute(req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<Option<String>>>,
    }

    #[async_trait]
    impl HttpClient for Recorder {
        async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
            let value = req
                .headers()
                .get("x-api-key")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            self.seen.lock().unwrap().push(value);
            let resp = axum::http::Response::builder()
                .status(200)
                .body(Vec::<u8>::new())
                .unwrap();
            Ok(reqwest::Response::from(resp))
        }
    }

    #[tokio::test]
    async fn test_sets_header() {
        let client = ApiKey::new(Recorder::default(), "X-Api-Key", "s3cret").unwrap();
        let req = reqwest::Request::new(
            reqwest::Method::GET,
            "https://example.com/feed".parse().unwrap(),
        );

        client.execute(req).await.unwrap();

        let seen = client.inner.seen.lock().unwrap();
        assert_eq!(seen.as_slice(), [Some("s3cret".to_string())]);
    }

    #[test]
    fn test_rejects_invalid_header_name() {
        assert!(ApiKey::new(Recorder::default(), "bad header", "k").is_err());
        assert!(ApiKey::new(Recorder::default(), "Authorization", "line\nbreak").is_err());
    }
}
