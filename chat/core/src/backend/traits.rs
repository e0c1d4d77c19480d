//! Research Backend Traits
//!
//! Trait definitions for the service that answers research queries. The
//! controller only sees this seam, so it can run against the HTTP service,
//! a scripted test double, or anything else that produces the wire format.
//!
//! # Design Philosophy
//!
//! The backend hands back the raw response body as a stream of byte chunks.
//! Framing and event decoding stay in [`crate::stream`], which keeps every
//! backend honest about the wire contract instead of pre-parsing it.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::messages::ConversationId;

/// Raw response body, chunked as the transport delivers it
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, BackendError>>;

/// Errors raised while talking to the research backend
#[derive(Debug, Error)]
pub enum BackendError {
    /// The HTTP request could not be sent or the body failed mid-read
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status
    #[error("Backend returned {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body (may be empty)
        body: String,
    },

    /// The response could not be interpreted
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// A durable conversation record created by the backend
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationRecord {
    /// Identifier assigned by the backend
    pub id: ConversationId,
    /// Title the record was created with
    pub title: String,
}

/// Research backend trait
///
/// Implement this trait to connect the controller to a different service.
#[async_trait]
pub trait ResearchBackend: Send + Sync {
    /// Get the backend name (e.g., "HTTP")
    fn name(&self) -> &str;

    /// Submit a query and return the streamed answer body
    ///
    /// Fails when the request is rejected or no body can be read.
    async fn open_stream(&self, query: &str) -> Result<ByteStream, BackendError>;

    /// Create a durable conversation record
    ///
    /// Returns `Ok(None)` when the backend accepted the request but did not
    /// report an identifier.
    async fn create_conversation(
        &self,
        title: &str,
    ) -> Result<Option<ConversationRecord>, BackendError>;
}
