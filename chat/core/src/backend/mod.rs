//! Research Backend Integration
//!
//! Abstracted access to the service that streams research answers.
//!
//! # Available Backends
//!
//! - **HTTP**: The LawLab web service (default)
//!
//! # Usage
//!
//! ```ignore
//! use chat_core::backend::{HttpBackend, ResearchBackend};
//! use chat_core::config::load_config;
//!
//! let backend = HttpBackend::from_config(&load_config()?)?;
//! let body = backend.open_stream("Precedents for breach of contract damages").await?;
//! ```

mod http;
mod traits;

pub use http::HttpBackend;
pub use traits::{BackendError, ByteStream, ConversationRecord, ResearchBackend};
