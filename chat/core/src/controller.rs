//! Conversation Controller
//!
//! Drives one research turn at a time: accepts a query, opens the answer
//! stream, applies decoded events in arrival order and publishes every
//! change to the host as a [`ChatUpdate`].
//!
//! # Turn Lifecycle
//!
//! ```text
//!   Idle ──submit──► Submitting ──► Streaming ──┬─► Complete ──► Idle
//!                                               └─► Error ─────► Idle
//! ```
//!
//! The citation registry and the answer buffer belong to the turn in
//! flight and are created fresh for every submission, so nothing from a
//! failed turn leaks into the next one. Only the published citation list
//! and the transcript outlive a turn.
//!
//! # Disposal
//!
//! [`Liveness::dispose`] stops a turn from the outside. The read loop checks
//! liveness before applying each event, and a pending read is abandoned as
//! soon as disposal is signalled, which drops the response body. No update
//! is published after disposal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::{mpsc, Notify};

use crate::backend::{ConversationRecord, ResearchBackend};
use crate::citations::{CitationAttachment, CitationRegistry, CitationSnapshot};
use crate::config::ChatConfig;
use crate::format::render_html;
use crate::messages::{ChatUpdate, TurnPhase};
use crate::stream::{frames, parse_frame, StreamEvent};
use crate::transcript::{Transcript, Turn};

/// Answer shown for a backend error event without a message
const FALLBACK_ERROR_MESSAGE: &str = "Error";

/// Reasons a submission is rejected before a turn starts
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ChatError {
    /// The query was empty after trimming
    #[error("Query is empty")]
    EmptyQuery,

    /// Another turn is still in progress
    #[error("A turn is already in progress ({phase:?})")]
    Busy {
        /// Phase of the turn in progress
        phase: TurnPhase,
    },

    /// The controller was disposed
    #[error("Controller has been disposed")]
    Disposed,
}

/// How a turn ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The backend completed the answer
    Completed {
        /// Raw answer text
        answer: String,
    },
    /// The turn ended with an error shown to the user
    Failed {
        /// Message recorded as the assistant turn
        message: String,
    },
    /// The controller was disposed mid-turn
    Disposed,
}

// ============================================================================
// Liveness
// ============================================================================

#[derive(Debug, Default)]
struct LivenessInner {
    disposed: AtomicBool,
    notify: Notify,
}

/// Shared disposal flag for a controller
///
/// Clone it into whatever owns the hosting context; calling
/// [`dispose`](Self::dispose) from any task stops the controller.
#[derive(Clone, Debug, Default)]
pub struct Liveness {
    inner: Arc<LivenessInner>,
}

impl Liveness {
    /// Create a live handle
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop the controller; idempotent
    pub fn dispose(&self) {
        if !self.inner.disposed.swap(true, Ordering::SeqCst) {
            tracing::debug!("Controller disposed");
            self.inner.notify.notify_waiters();
        }
    }

    /// Whether the controller may still apply updates
    #[must_use]
    pub fn is_alive(&self) -> bool {
        !self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Resolve once the controller has been disposed
    pub async fn disposed(&self) {
        let notified = self.inner.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if !self.is_alive() {
            return;
        }
        notified.await;
    }
}

// ============================================================================
// Controller
// ============================================================================

/// State owned by the turn in flight
#[derive(Debug, Default)]
struct TurnContext {
    /// Accumulated answer text
    buffer: String,
    /// Citations reported during this turn
    registry: CitationRegistry,
}

/// Resets the phase to idle however the turn future ends
struct PhaseGuard<'a> {
    phase: &'a Mutex<TurnPhase>,
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        *self.phase.lock() = TurnPhase::Idle;
    }
}

/// The conversation controller
pub struct ConversationController<B: ResearchBackend> {
    /// Configuration
    config: ChatConfig,
    /// Research backend
    backend: Arc<B>,
    /// Channel to the host
    tx: mpsc::UnboundedSender<ChatUpdate>,
    /// Current lifecycle phase
    phase: Mutex<TurnPhase>,
    /// Conversation history
    transcript: Mutex<Transcript>,
    /// Last published citation list
    citations: Mutex<CitationSnapshot>,
    /// Durable conversation record, once created
    conversation: Arc<Mutex<Option<ConversationRecord>>>,
    /// Whether the creation request was already sent this session
    conversation_requested: AtomicBool,
    /// Disposal flag
    liveness: Liveness,
}

impl<B: ResearchBackend + 'static> ConversationController<B> {
    /// Create a new controller with the given backend
    pub fn new(backend: B, config: ChatConfig, tx: mpsc::UnboundedSender<ChatUpdate>) -> Self {
        Self {
            config,
            backend: Arc::new(backend),
            tx,
            phase: Mutex::new(TurnPhase::Idle),
            transcript: Mutex::new(Transcript::new()),
            citations: Mutex::new(CitationRegistry::new().snapshot()),
            conversation: Arc::new(Mutex::new(None)),
            conversation_requested: AtomicBool::new(false),
            liveness: Liveness::new(),
        }
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> TurnPhase {
        *self.phase.lock()
    }

    /// Whether a new query would be accepted
    pub fn is_idle(&self) -> bool {
        self.phase() == TurnPhase::Idle && self.liveness.is_alive()
    }

    /// Copy of the conversation history
    pub fn transcript(&self) -> Vec<Turn> {
        self.transcript.lock().turns().to_vec()
    }

    /// Citation list most recently published
    pub fn citations(&self) -> CitationSnapshot {
        Arc::clone(&self.citations.lock())
    }

    /// Durable conversation record, if one was created
    pub fn conversation(&self) -> Option<ConversationRecord> {
        self.conversation.lock().clone()
    }

    /// Handle for disposing this controller
    pub fn liveness(&self) -> Liveness {
        self.liveness.clone()
    }

    /// Dispose the controller
    pub fn dispose(&self) {
        self.liveness.dispose();
    }

    /// Run one research turn to its end
    ///
    /// Backend and stream failures do not produce an `Err`: they end the
    /// turn with an assistant error turn and [`TurnOutcome::Failed`].
    ///
    /// # Errors
    ///
    /// Returns a [`ChatError`] when the query is rejected: it is empty,
    /// another turn is in progress, or the controller was disposed.
    pub async fn submit(&self, query: &str) -> Result<TurnOutcome, ChatError> {
        if !self.liveness.is_alive() {
            return Err(ChatError::Disposed);
        }
        let query = query.trim();
        if query.is_empty() {
            return Err(ChatError::EmptyQuery);
        }

        let _guard = self.begin_turn()?;
        tracing::info!(query_len = query.len(), "Submitting research query");

        let mut turn = TurnContext::default();
        self.publish_citations(turn.registry.snapshot());
        self.publish(ChatUpdate::StatusChanged {
            status: Some(self.config.initial_status.clone()),
        });

        self.request_conversation(query);

        self.set_phase(TurnPhase::Streaming);
        self.append_turn(Turn::user(query));

        let outcome = self.stream_answer(&mut turn, query).await;

        match &outcome {
            TurnOutcome::Disposed => {
                tracing::info!("Turn abandoned after disposal");
            }
            TurnOutcome::Completed { answer } => {
                tracing::info!(
                    answer_len = answer.len(),
                    citations = turn.registry.len(),
                    "Research turn complete"
                );
                self.set_phase(TurnPhase::Idle);
            }
            TurnOutcome::Failed { message } => {
                tracing::info!(message = %message, "Research turn failed");
                self.set_phase(TurnPhase::Idle);
            }
        }

        Ok(outcome)
    }

    /// Move from idle to submitting, or reject the submission
    fn begin_turn(&self) -> Result<PhaseGuard<'_>, ChatError> {
        {
            let mut phase = self.phase.lock();
            if *phase != TurnPhase::Idle {
                tracing::debug!(phase = ?*phase, "Rejecting submission while busy");
                return Err(ChatError::Busy { phase: *phase });
            }
            *phase = TurnPhase::Submitting;
        }
        self.publish(ChatUpdate::PhaseChanged {
            phase: TurnPhase::Submitting,
        });
        Ok(PhaseGuard { phase: &self.phase })
    }

    /// Read the answer stream until a terminal event or its end
    async fn stream_answer(&self, turn: &mut TurnContext, query: &str) -> TurnOutcome {
        let opened = tokio::select! {
            biased;
            () = self.liveness.disposed() => return TurnOutcome::Disposed,
            opened = self.backend.open_stream(query) => opened,
        };

        let body = match opened {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(
                    backend = self.backend.name(),
                    error = %e,
                    "Failed to open answer stream"
                );
                return self.fail_turn(turn, self.config.transport_error_message.clone());
            }
        };

        let mut frames = Box::pin(frames(body));
        loop {
            let next = tokio::select! {
                biased;
                () = self.liveness.disposed() => return TurnOutcome::Disposed,
                next = frames.next() => next,
            };

            let frame = match next {
                Some(Ok(frame)) => frame,
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Answer stream failed");
                    return self.fail_turn(turn, self.config.transport_error_message.clone());
                }
                None => break,
            };

            let Some(event) = parse_frame(&frame) else {
                continue;
            };

            if let Some(outcome) = self.apply_event(turn, event) {
                return outcome;
            }
        }

        self.finish_open_turn(turn)
    }

    /// Apply one event; returns the outcome when the event ends the turn
    fn apply_event(&self, turn: &mut TurnContext, event: StreamEvent) -> Option<TurnOutcome> {
        if !self.liveness.is_alive() {
            return Some(TurnOutcome::Disposed);
        }

        match event {
            StreamEvent::Status { content } => {
                self.publish(ChatUpdate::StatusChanged {
                    status: Some(content),
                });
                None
            }
            StreamEvent::Text { content } => {
                turn.buffer.push_str(&content);
                self.publish_answer(turn);
                None
            }
            event @ StreamEvent::Citation { .. } => {
                if let Some(attachment) = event.into_attachment() {
                    self.register_citation(turn, attachment);
                }
                None
            }
            StreamEvent::Complete => Some(self.complete_turn(turn)),
            StreamEvent::Error { content } => {
                let message = if content.is_empty() {
                    FALLBACK_ERROR_MESSAGE.to_string()
                } else {
                    content
                };
                Some(self.fail_turn(turn, message))
            }
        }
    }

    /// Register a citation and republish what it changes
    fn register_citation(&self, turn: &mut TurnContext, attachment: CitationAttachment) {
        let Some(snapshot) = turn.registry.register(attachment) else {
            return;
        };
        self.publish_citations(snapshot);

        // Placeholders already in the buffer can now show their label
        if !turn.buffer.is_empty() {
            self.publish_answer(turn);
        }
    }

    /// The stream ended without `complete` or `error`
    fn finish_open_turn(&self, turn: &mut TurnContext) -> TurnOutcome {
        if !self.liveness.is_alive() {
            return TurnOutcome::Disposed;
        }
        if turn.buffer.is_empty() {
            tracing::warn!("Answer stream ended without any content");
            return self.fail_turn(turn, self.config.transport_error_message.clone());
        }
        tracing::debug!("Answer stream ended without a completion event");
        self.complete_turn(turn)
    }

    /// Finalize the buffer as the assistant's answer
    fn complete_turn(&self, turn: &mut TurnContext) -> TurnOutcome {
        let answer = std::mem::take(&mut turn.buffer);
        let html = render_html(&answer, &turn.registry);

        self.append_turn(Turn::assistant(answer.clone(), html));
        self.publish(ChatUpdate::AnswerCleared);
        self.publish(ChatUpdate::StatusChanged { status: None });
        self.set_phase(TurnPhase::Complete);

        TurnOutcome::Completed { answer }
    }

    /// Record an error message as the assistant's answer
    fn fail_turn(&self, turn: &mut TurnContext, message: String) -> TurnOutcome {
        if !self.liveness.is_alive() {
            return TurnOutcome::Disposed;
        }
        turn.buffer.clear();
        let html = render_html(&message, &turn.registry);

        self.append_turn(Turn::assistant_error(message.clone(), html));
        self.publish(ChatUpdate::AnswerCleared);
        self.publish(ChatUpdate::StatusChanged { status: None });
        self.set_phase(TurnPhase::Error);

        TurnOutcome::Failed { message }
    }

    /// Fire-and-forget creation of the durable conversation record
    ///
    /// Only the first user turn of a session triggers it; failures are
    /// logged and never reach the turn.
    fn request_conversation(&self, title: &str) {
        if !self.config.create_on_first_turn || !self.transcript.lock().is_empty() {
            return;
        }
        if self.conversation_requested.swap(true, Ordering::SeqCst) {
            return;
        }

        let backend = Arc::clone(&self.backend);
        let slot = Arc::clone(&self.conversation);
        let liveness = self.liveness.clone();
        let tx = self.tx.clone();
        let title = title.to_string();

        tokio::spawn(async move {
            match backend.create_conversation(&title).await {
                Ok(Some(record)) => {
                    if !liveness.is_alive() {
                        return;
                    }
                    tracing::info!(id = %record.id, "Conversation created");
                    *slot.lock() = Some(record.clone());
                    send_update(
                        &tx,
                        ChatUpdate::ConversationCreated {
                            id: record.id,
                            title: record.title,
                        },
                    );
                }
                Ok(None) => {
                    tracing::warn!("Conversation created without an identifier");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to create conversation");
                }
            }
        });
    }

    fn append_turn(&self, turn: Turn) {
        self.transcript.lock().push(turn.clone());
        self.publish(ChatUpdate::TurnAppended { turn });
    }

    fn publish_answer(&self, turn: &TurnContext) {
        self.publish(ChatUpdate::AnswerUpdated {
            raw: turn.buffer.clone(),
            html: render_html(&turn.buffer, &turn.registry),
        });
    }

    fn publish_citations(&self, citations: CitationSnapshot) {
        *self.citations.lock() = Arc::clone(&citations);
        self.publish(ChatUpdate::CitationsChanged { citations });
    }

    fn set_phase(&self, phase: TurnPhase) {
        tracing::debug!(phase = phase.description(), "Turn phase changed");
        *self.phase.lock() = phase;
        self.publish(ChatUpdate::PhaseChanged { phase });
    }

    /// Send an update to the host
    fn publish(&self, update: ChatUpdate) {
        send_update(&self.tx, update);
    }
}

/// Send an update, logging when the host has gone away
///
/// Returns whether the update was delivered.
fn send_update(tx: &mpsc::UnboundedSender<ChatUpdate>, update: ChatUpdate) -> bool {
    match tx.send(update) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Failed to publish update to host: {}", e);
            false
        }
    }
}
