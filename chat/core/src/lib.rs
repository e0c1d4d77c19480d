//! LawLab Chat Core - Headless Legal Research Chat Client
//!
//! This crate holds the client-side logic of a legal-research chat: it
//! submits a question, consumes the streamed answer, tracks the citations
//! the backend reports and renders the answer as paragraph markup with
//! inline citation links. It has no opinion about how anything is displayed.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                             Hosts                                 │
//! │   ┌──────────────┐   ┌──────────────┐   ┌──────────────────────┐ │
//! │   │ lawlab-chat  │   │  Web bridge  │   │  Tests / automation  │ │
//! │   │    (CLI)     │   │              │   │                      │ │
//! │   └──────┬───────┘   └──────┬───────┘   └──────────┬───────────┘ │
//! │          └──────────────────┴──────────────────────┘             │
//! │                    submit() ▲ ChatUpdate (down)                  │
//! └────────────────────────────┼─────────────────────────────────────┘
//!                              │
//! ┌────────────────────────────┼─────────────────────────────────────┐
//! │                       CHAT CORE                                   │
//! │  ┌─────────────────────────┴─────────────────────────────────┐   │
//! │  │                ConversationController                      │   │
//! │  │  ┌──────────┐  ┌───────────┐  ┌──────────┐  ┌───────────┐ │   │
//! │  │  │  stream  │  │ citations │  │  format  │  │  backend  │ │   │
//! │  │  │ (frames) │  │ (registry)│  │  (html)  │  │  (HTTP)   │ │   │
//! │  │  └──────────┘  └───────────┘  └──────────┘  └───────────┘ │   │
//! │  └────────────────────────────────────────────────────────────┘   │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`ConversationController`]: Runs research turns and owns their state
//! - [`ChatUpdate`]: Messages published to the host
//! - [`StreamEvent`]: One decoded event of the answer stream
//! - [`CitationRegistry`]: Per-turn, first-wins citation store
//! - [`Transcript`]: The conversation history
//!
//! # Quick Start
//!
//! ```ignore
//! use chat_core::{config::load_config, ConversationController, HttpBackend};
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config()?;
//!     let backend = HttpBackend::from_config(&config)?;
//!     let (tx, mut rx) = mpsc::unbounded_channel();
//!     let controller = ConversationController::new(backend, config, tx);
//!
//!     tokio::spawn(async move {
//!         while let Some(update) = rx.recv().await {
//!             // Render update
//!         }
//!     });
//!
//!     controller.submit("Key cases on negligence in medical malpractice").await?;
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`backend`]: Research backend abstraction (HTTP service)
//! - [`citations`]: Citation registry and snapshots
//! - [`config`]: Layered configuration (defaults, TOML, environment, overrides)
//! - [`controller`]: Turn lifecycle and disposal
//! - [`format`]: Sentence splitting, paragraph grouping, HTML rendering
//! - [`messages`]: Updates from the controller to its host
//! - [`stream`]: Frame decoding and event parsing
//! - [`transcript`]: Conversation history

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod citations;
pub mod config;
pub mod controller;
pub mod format;
pub mod messages;
pub mod stream;
pub mod transcript;

// Re-exports for convenience
pub use backend::{BackendError, ByteStream, ConversationRecord, HttpBackend, ResearchBackend};
pub use citations::{CitationAttachment, CitationRegistry, CitationSnapshot};
pub use config::{ChatConfig, ConfigError, ConfigOverrides, ConfigSource};
pub use controller::{ChatError, ConversationController, Liveness, TurnOutcome};
pub use format::{format_paragraphs, render_html, render_reference_list};
pub use messages::{ChatUpdate, ConversationId, TurnId, TurnPhase};
pub use stream::{parse_frame, CitationRecord, FrameDecoder, StreamEvent};
pub use transcript::{Transcript, Turn, TurnRole};
