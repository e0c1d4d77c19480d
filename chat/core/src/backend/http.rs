//! HTTP Backend Implementation
//!
//! Research backend for the LawLab web service.
//!
//! # Endpoints
//!
//! - `POST /api/legal` - Stream an answer for `{"query": ...}`
//! - `POST /api/chats` - Create a conversation, answering `{"chat": {"id": ...}}`
//!
//! Both paths are configurable through [`ChatConfig`].

use async_trait::async_trait;
use futures::StreamExt;

use super::traits::{BackendError, ByteStream, ConversationRecord, ResearchBackend};
use crate::config::ChatConfig;
use crate::messages::ConversationId;

/// HTTP research backend client
#[derive(Clone, Debug)]
pub struct HttpBackend {
    /// Scheme, host and port
    base_url: String,
    /// Streaming answer endpoint path
    stream_path: String,
    /// Conversation creation endpoint path
    conversations_path: String,
    /// HTTP client
    http_client: reqwest::Client,
}

impl HttpBackend {
    /// Create a backend from configuration
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Http` if the HTTP client cannot be built.
    pub fn from_config(config: &ChatConfig) -> Result<Self, BackendError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            stream_path: config.stream_path.clone(),
            conversations_path: config.conversations_path.clone(),
            http_client,
        })
    }

    /// Get the base URL
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get streaming endpoint URL
    fn stream_url(&self) -> String {
        format!("{}{}", self.base_url, self.stream_path)
    }

    /// Get conversation endpoint URL
    fn conversations_url(&self) -> String {
        format!("{}{}", self.base_url, self.conversations_path)
    }

    /// Turn a non-success response into an error
    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(BackendError::Status { status, body })
    }
}

/// Read the conversation identifier from a creation response
fn conversation_id_from(data: &serde_json::Value) -> Option<ConversationId> {
    let id = data.get("chat")?.get("id")?;
    match id {
        serde_json::Value::String(s) if !s.is_empty() => Some(ConversationId(s.clone())),
        serde_json::Value::Number(n) => Some(ConversationId(n.to_string())),
        _ => None,
    }
}

#[async_trait]
impl ResearchBackend for HttpBackend {
    fn name(&self) -> &'static str {
        "HTTP"
    }

    async fn open_stream(&self, query: &str) -> Result<ByteStream, BackendError> {
        let url = self.stream_url();
        tracing::debug!(url = %url, "Opening answer stream");

        let response = self
            .http_client
            .post(&url)
            .json(&serde_json::json!({ "query": query }))
            .send()
            .await?;

        let response = Self::check_status(response).await?;

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(BackendError::from))
            .boxed())
    }

    async fn create_conversation(
        &self,
        title: &str,
    ) -> Result<Option<ConversationRecord>, BackendError> {
        let response = self
            .http_client
            .post(self.conversations_url())
            .send()
            .await?;

        let response = Self::check_status(response).await?;

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;

        Ok(conversation_id_from(&data).map(|id| ConversationRecord {
            id,
            title: title.to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_backend_urls() {
        let mut config = ChatConfig::default();
        config.base_url = "https://lawlab.example.com/".to_string();
        let backend = HttpBackend::from_config(&config).unwrap();

        assert_eq!(backend.base_url(), "https://lawlab.example.com");
        assert_eq!(backend.stream_url(), "https://lawlab.example.com/api/legal");
        assert_eq!(
            backend.conversations_url(),
            "https://lawlab.example.com/api/chats"
        );
        assert_eq!(backend.name(), "HTTP");
    }

    #[test]
    fn test_conversation_id_parsing() {
        let data = serde_json::json!({ "chat": { "id": "abc123", "title": "ignored" } });
        assert_eq!(
            conversation_id_from(&data),
            Some(ConversationId("abc123".to_string()))
        );

        let numeric = serde_json::json!({ "chat": { "id": 42 } });
        assert_eq!(
            conversation_id_from(&numeric),
            Some(ConversationId("42".to_string()))
        );

        assert_eq!(conversation_id_from(&serde_json::json!({})), None);
        assert_eq!(
            conversation_id_from(&serde_json::json!({ "chat": { "id": "" } })),
            None
        );
        assert_eq!(
            conversation_id_from(&serde_json::json!({ "chat": null })),
            None
        );
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_http_error() {
        let mut config = ChatConfig::default();
        config.base_url = "http://127.0.0.1:9".to_string();
        config.connect_timeout = std::time::Duration::from_millis(200);
        let backend = HttpBackend::from_config(&config).unwrap();

        let result = backend.open_stream("anything").await;
        assert!(matches!(result, Err(BackendError::Http(_))));
    }
}
