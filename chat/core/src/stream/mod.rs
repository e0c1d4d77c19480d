//! Research Stream Decoding
//!
//! Turns the backend's chunked response body into typed events.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   chunks    ┌──────────────┐   frames   ┌──────────────┐
//! │  ByteStream  │ ──────────► │ FrameDecoder │ ─────────► │ parse_frame  │
//! │ (transport)  │             │ (carry buf)  │            │              │
//! └──────────────┘             └──────────────┘            └──────┬───────┘
//!                                                                 │
//!                                                        Option<StreamEvent>
//! ```
//!
//! # Example
//!
//! ```ignore
//! use chat_core::stream::{frames, parse_frame};
//! use futures::StreamExt;
//!
//! let mut frames = Box::pin(frames(byte_stream));
//! while let Some(frame) = frames.next().await {
//!     if let Some(event) = parse_frame(&frame?) {
//!         println!("{event:?}");
//!     }
//! }
//! ```

pub mod event;
pub mod frame;

pub use event::{parse_frame, CitationRecord, StreamEvent, DATA_PREFIX, DONE_SENTINEL};
pub use frame::{frames, FrameDecoder, FRAME_SEPARATOR};
