//! Transcript
//!
//! The ordered, append-only record of user queries and assistant answers.
//! An assistant turn always directly follows the user turn it answers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::messages::TurnId;

/// Who produced a turn
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    /// The person asking
    User,
    /// The research assistant
    Assistant,
}

/// One entry in the transcript
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Unique turn ID
    pub id: TurnId,
    /// Who produced this turn
    #[serde(rename = "type")]
    pub role: TurnRole,
    /// Raw text (query, answer with placeholders, or error message)
    pub content: String,
    /// Markup rendered when an assistant turn finished
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    /// Whether the assistant turn reports a failure
    #[serde(default)]
    pub failed: bool,
    /// When the turn was recorded
    pub created_at: DateTime<Utc>,
}

impl Turn {
    /// Create a user turn
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: TurnId::new(),
            role: TurnRole::User,
            content: content.into(),
            html: None,
            failed: false,
            created_at: Utc::now(),
        }
    }

    /// Create a finished assistant turn
    pub fn assistant(content: impl Into<String>, html: String) -> Self {
        Self {
            id: TurnId::new(),
            role: TurnRole::Assistant,
            content: content.into(),
            html: Some(html),
            failed: false,
            created_at: Utc::now(),
        }
    }

    /// Create an assistant turn carrying an error message
    pub fn assistant_error(message: impl Into<String>, html: String) -> Self {
        Self {
            failed: true,
            ..Self::assistant(message, html)
        }
    }
}

/// Ordered conversation history
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    /// Create an empty transcript
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn
    pub fn push(&mut self, turn: Turn) {
        if turn.role == TurnRole::User && self.awaiting_answer() {
            tracing::warn!("User turn appended while the previous one is unanswered");
        }
        self.turns.push(turn);
    }

    /// Whether the last turn is a user turn with no answer yet
    #[must_use]
    pub fn awaiting_answer(&self) -> bool {
        self.last().is_some_and(|turn| turn.role == TurnRole::User)
    }

    /// All turns in order
    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// The most recent turn
    #[must_use]
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Number of turns
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether no turn has been recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
