//! Chat Updates
//!
//! Messages published by the [`ConversationController`](crate::ConversationController)
//! to whatever hosts it (terminal client, web bridge, test harness).
//!
//! # Design Philosophy
//!
//! The controller owns all turn state; hosts are renderers that display what
//! they are told. Every change a host may care about is published as an
//! explicit message rather than exposed as shared mutable state, so the host
//! never observes a turn halfway through an update.

use serde::{Deserialize, Serialize};

use crate::citations::CitationSnapshot;
use crate::transcript::Turn;

/// Messages from the controller to its host
#[derive(Clone, Debug)]
pub enum ChatUpdate {
    /// The turn lifecycle moved to a new phase
    PhaseChanged {
        /// The new phase
        phase: TurnPhase,
    },

    /// Progress label changed (`None` clears it)
    StatusChanged {
        /// The label to show
        status: Option<String>,
    },

    /// The in-progress answer changed
    AnswerUpdated {
        /// Accumulated raw text
        raw: String,
        /// Rendered paragraph markup
        html: String,
    },

    /// The in-progress answer was finalized or abandoned
    AnswerCleared,

    /// The citation list changed
    CitationsChanged {
        /// Ordered citations for the current turn
        citations: CitationSnapshot,
    },

    /// A turn was appended to the transcript
    TurnAppended {
        /// The new turn
        turn: Turn,
    },

    /// A durable conversation record was created
    ConversationCreated {
        /// Identifier assigned by the backend
        id: ConversationId,
        /// Title the record was created with
        title: String,
    },
}

/// Lifecycle of a single turn
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnPhase {
    /// Ready for a new query
    Idle,
    /// Query accepted, side requests in flight
    Submitting,
    /// Reading the answer stream
    Streaming,
    /// The answer finished
    Complete,
    /// The turn ended with an error
    Error,
}

impl TurnPhase {
    /// Human-readable description
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Idle => "Ready",
            Self::Submitting => "Submitting...",
            Self::Streaming => "Researching...",
            Self::Complete => "Complete",
            Self::Error => "Error",
        }
    }
}

/// Identifier of a persisted conversation
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Turn identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TurnId(pub String);

impl TurnId {
    /// Generate a new unique turn ID
    #[must_use]
    pub fn new() -> Self {
        Self(format!("turn_{}", uuid::Uuid::new_v4().simple()))
    }
}

impl Default for TurnId {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_ids_are_unique() {
        let a = TurnId::new();
        let b = TurnId::new();
        assert_ne!(a, b);
        assert!(a.0.starts_with("turn_"));
    }

    #[test]
    fn test_phase_descriptions() {
        assert_eq!(TurnPhase::Idle.description(), "Ready");
        assert_eq!(TurnPhase::Error.description(), "Error");
    }
}
