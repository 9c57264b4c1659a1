//! HTTP backend abstraction for the designer API.
//!
//! Trait-based so the query client can be tested against canned
//! responses instead of a live server.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use crate::compatible::ApiError;

/// Backend performing one POST exchange with a JSON body.
#[async_trait]
pub trait HttpBackend: Send + Sync {
    /// POST `body` to `url` and return the decoded JSON response body.
    async fn post_json(&self, url: &Url, body: &Value) -> Result<Value, ApiError>;
}

/// Production backend using reqwest. No retry, no caching.
pub struct ReqwestBackend {
    client: reqwest::Client,
}

impl ReqwestBackend {
    /// Create a backend with a 30 second request timeout.
    ///
    /// # Errors
    /// Returns an error if the underlying client cannot be constructed.
    pub fn new() -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpBackend for ReqwestBackend {
    async fn post_json(&self, url: &Url, body: &Value) -> Result<Value, ApiError> {
        let response = self.client.post(url.as_str()).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::RequestFailed {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response.json().await?)
    }
}
