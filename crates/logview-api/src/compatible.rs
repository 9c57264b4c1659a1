//! Compatible-message query: typed payload in, validated response out.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::http::{HttpBackend, ReqwestBackend};

/// Endpoint path, relative to the designer base URL.
const COMPATIBLE_PATH: &str = "api/designer/v1/messages/compatible";

/// Query client error.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Request failed with status {status}: {url}")]
    RequestFailed { status: u16, url: String },
    #[error("Response validation failed: {0}")]
    Validation(String),
    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Message kind under query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Cmd,
    Data,
    AudioFrame,
    VideoFrame,
}

/// Direction of the message relative to the extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageDirection {
    In,
    Out,
}

/// Request payload for one compatibility query.
#[derive(Debug, Clone, Serialize)]
pub struct CompatiblePayload {
    pub graph_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extension_group: Option<String>,
    pub extension: String,
    pub msg_type: MessageKind,
    pub msg_direction: MessageDirection,
    pub msg_name: String,
}

/// One compatible message descriptor, as validated from the response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompatibleMessage {
    #[serde(default)]
    pub app: Option<String>,
    #[serde(default)]
    pub extension_group: Option<String>,
    pub extension: String,
    pub msg_type: MessageKind,
    pub msg_direction: MessageDirection,
    pub msg_name: String,
}

/// Standard designer API response envelope.
#[derive(Debug, Deserialize)]
struct Envelope {
    status: String,
    #[serde(default)]
    data: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
}

/// Stateless client for the compatible-messages endpoint.
pub struct CompatibleClient<B: HttpBackend> {
    backend: B,
    endpoint: Url,
}

impl CompatibleClient<ReqwestBackend> {
    /// Create a client against `base_url` using the production backend.
    ///
    /// # Errors
    /// Returns an error if the endpoint URL cannot be formed or the HTTP
    /// client cannot be constructed.
    pub fn new(base_url: &Url) -> Result<Self, ApiError> {
        Ok(Self::with_backend(ReqwestBackend::new()?, base_url)?)
    }
}

impl<B: HttpBackend> CompatibleClient<B> {
    /// Create a client with an injected backend.
    ///
    /// # Errors
    /// Returns an error if the endpoint URL cannot be formed.
    pub fn with_backend(backend: B, base_url: &Url) -> Result<Self, url::ParseError> {
        Ok(Self {
            backend,
            endpoint: base_url.join(COMPATIBLE_PATH)?,
        })
    }

    /// Retrieve the messages compatible with `payload`.
    ///
    /// Exactly one request/response exchange. The decoded body is
    /// validated against the expected schema before being returned;
    /// a non-conforming body fails the whole call.
    ///
    /// # Errors
    /// Returns `ApiError::Validation` on a malformed or failed response,
    /// or a transport error if the exchange itself fails.
    pub async fn retrieve(
        &self,
        payload: &CompatiblePayload,
    ) -> Result<Vec<CompatibleMessage>, ApiError> {
        let body = serde_json::to_value(payload)
            .map_err(|e| ApiError::Validation(e.to_string()))?;

        let raw = self.backend.post_json(&self.endpoint, &body).await?;

        let envelope: Envelope =
            serde_json::from_value(raw).map_err(|e| ApiError::Validation(e.to_string()))?;

        if envelope.status != "ok" {
            return Err(ApiError::Validation(
                envelope
                    .message
                    .unwrap_or_else(|| format!("status {}", envelope.status)),
            ));
        }

        let data = envelope
            .data
            .ok_or_else(|| ApiError::Validation("missing data field".to_string()))?;

        serde_json::from_value(data).map_err(|e| ApiError::Validation(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::http::testing::FakeBackend;

    fn payload() -> CompatiblePayload {
        CompatiblePayload {
            graph_id: "graph-1".to_string(),
            app: None,
            extension_group: Some("group".to_string()),
            extension: "ext".to_string(),
            msg_type: MessageKind::Cmd,
            msg_direction: MessageDirection::Out,
            msg_name: "hello".to_string(),
        }
    }

    fn client(response: serde_json::Value) -> CompatibleClient<FakeBackend> {
        let base = Url::parse("http://localhost:49483/").unwrap();
        CompatibleClient::with_backend(FakeBackend::new(response), &base).unwrap()
    }

    #[tokio::test]
    async fn retrieve_returns_validated_messages() {
        let client = client(json!({
            "status": "ok",
            "data": [{
                "extension_group": "group",
                "extension": "other",
                "msg_type": "cmd",
                "msg_direction": "in",
                "msg_name": "hello"
            }]
        }));

        let messages = assert_ok!(client.retrieve(&payload()).await);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].extension, "other");
        assert_eq!(messages[0].msg_direction, MessageDirection::In);
    }

    #[tokio::test]
    async fn request_body_is_serialized_payload() {
        let client = client(json!({"status": "ok", "data": []}));
        assert_ok!(client.retrieve(&payload()).await);

        let requests = client.backend.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0]["graph_id"], "graph-1");
        assert_eq!(requests[0]["msg_type"], "cmd");
        // Absent options are omitted from the body.
        assert!(requests[0].get("app").is_none());
    }

    #[tokio::test]
    async fn schema_violation_fails_the_call() {
        // msg_type carries an unknown value.
        let client = client(json!({
            "status": "ok",
            "data": [{
                "extension": "other",
                "msg_type": "bogus",
                "msg_direction": "in",
                "msg_name": "hello"
            }]
        }));

        let err = assert_err!(client.retrieve(&payload()).await);
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn unknown_fields_fail_validation() {
        let client = client(json!({
            "status": "ok",
            "data": [{
                "extension": "other",
                "msg_type": "cmd",
                "msg_direction": "in",
                "msg_name": "hello",
                "surprise": true
            }]
        }));

        assert_err!(client.retrieve(&payload()).await);
    }

    #[tokio::test]
    async fn fail_status_surfaces_message() {
        let client = client(json!({"status": "fail", "message": "graph not found"}));

        let err = assert_err!(client.retrieve(&payload()).await);
        match err {
            ApiError::Validation(message) => assert_eq!(message, "graph not found"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn missing_data_is_a_validation_error() {
        let client = client(json!({"status": "ok"}));
        let err = assert_err!(client.retrieve(&payload()).await);
        assert!(matches!(err, ApiError::Validation(_)));
    }
}
