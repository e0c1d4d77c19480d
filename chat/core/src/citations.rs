//! Citation Registry
//!
//! Collects the citations reported during one turn, keyed by citation key,
//! in first-seen order.
//!
//! # Publishing
//!
//! Every successful registration produces a fresh [`CitationSnapshot`].
//! Snapshots are immutable, so a consumer holding one never observes the
//! registry while it is being mutated. A repeated key is ignored: the first
//! record wins and nothing is published.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::stream::CitationRecord;

/// Immutable, ordered view of the registered citations
pub type CitationSnapshot = Arc<[CitationAttachment]>;

/// A citation attached to the answer being generated
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CitationAttachment {
    /// Key unique within one turn-stream (e.g. `C1`)
    pub key: String,
    /// Bibliographic record as reported by the backend
    pub citation: CitationRecord,
    /// Short inline label
    #[serde(rename = "inText")]
    pub in_text: String,
    /// Full reference-list entry
    pub reference: String,
}

/// Placeholder text the backend uses for a key
#[must_use]
pub fn placeholder(key: &str) -> String {
    format!("[[{key}]]")
}

/// Anchor identifier of the reference-list entry for a key
#[must_use]
pub fn anchor_id(key: &str) -> String {
    format!("citation-{key}")
}

/// Ordered, deduplicating citation store for a single turn
#[derive(Debug, Clone)]
pub struct CitationRegistry {
    attachments: CitationSnapshot,
    labels: HashMap<String, String>,
}

impl Default for CitationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CitationRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            attachments: Arc::from(Vec::new()),
            labels: HashMap::new(),
        }
    }

    /// Register an attachment
    ///
    /// Returns the new snapshot when the key was not yet known, or `None`
    /// when the key was already registered (the existing record is kept).
    pub fn register(&mut self, attachment: CitationAttachment) -> Option<CitationSnapshot> {
        if self.labels.contains_key(&attachment.key) {
            tracing::debug!(key = %attachment.key, "Ignoring duplicate citation");
            return None;
        }

        self.labels
            .insert(attachment.key.clone(), attachment.in_text.clone());

        let mut next = Vec::with_capacity(self.attachments.len() + 1);
        next.extend(self.attachments.iter().cloned());
        next.push(attachment);
        self.attachments = Arc::from(next);

        Some(self.snapshot())
    }

    /// Clear all registered citations
    pub fn reset(&mut self) {
        self.attachments = Arc::from(Vec::new());
        self.labels.clear();
    }

    /// Inline label for a key, or the raw placeholder when unknown
    #[must_use]
    pub fn label_for(&self, key: &str) -> Cow<'_, str> {
        match self.labels.get(key) {
            Some(label) => Cow::Borrowed(label.as_str()),
            None => Cow::Owned(placeholder(key)),
        }
    }

    /// Look up an attachment by key
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&CitationAttachment> {
        self.attachments.iter().find(|a| a.key == key)
    }

    /// Whether a key has been registered
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.labels.contains_key(key)
    }

    /// Current ordered attachments
    #[must_use]
    pub fn snapshot(&self) -> CitationSnapshot {
        Arc::clone(&self.attachments)
    }

    /// Number of registered citations
    #[must_use]
    pub fn len(&self) -> usize {
        self.attachments.len()
    }

    /// Whether nothing has been registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attachments.is_empty()
    }
}
