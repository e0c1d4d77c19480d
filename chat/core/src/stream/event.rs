//! Stream Events
//!
//! Typed events decoded from `data: <JSON>` frames.
//!
//! Parsing is deliberately forgiving: a frame that is not a data record, a
//! payload that is not JSON, or an event kind this client does not know are
//! all dropped without surfacing an error, so one garbled frame never ends
//! the stream.

use serde::{Deserialize, Deserializer, Serialize};

use crate::citations::CitationAttachment;

/// Field prefix every accepted frame starts with
pub const DATA_PREFIX: &str = "data: ";

/// Explicit end marker, treated as a no-op
pub const DONE_SENTINEL: &str = "[DONE]";

/// Event kinds this client understands
const KNOWN_KINDS: [&str; 5] = ["status", "text", "citation", "complete", "error"];

/// Bibliographic record for one citation
///
/// The backend owns the shape of this record, so every field is optional
/// and kept as sent: a `null` title or authors given as objects still
/// produce a record. Fields other than title and authors are carried
/// through untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CitationRecord {
    /// Title of the cited work or case
    #[serde(default)]
    pub title: Option<String>,
    /// Ordered author list, as sent (names or structured entries)
    #[serde(default, deserialize_with = "nullable_list")]
    pub authors: Vec<serde_json::Value>,
    /// Any other fields the backend supplied
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl CitationRecord {
    /// Create a record with a title and author names
    pub fn new(title: impl Into<String>, authors: Vec<String>) -> Self {
        Self {
            title: Some(title.into()),
            authors: authors.into_iter().map(serde_json::Value::String).collect(),
            extra: serde_json::Map::new(),
        }
    }
}

/// Read a list that may be `null`
fn nullable_list<'de, D>(deserializer: D) -> Result<Vec<serde_json::Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<serde_json::Value>>::deserialize(deserializer)?.unwrap_or_default())
}

/// One decoded event of the research stream
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    /// Progress label replacing the previous one
    Status {
        /// Human-readable label
        content: String,
    },

    /// Text fragment appended to the answer
    Text {
        /// The fragment, possibly containing `[[C<n>]]` placeholders
        content: String,
    },

    /// A citation discovered during generation
    Citation {
        /// Key correlating the record with `[[<key>]]` placeholders
        key: String,
        /// The bibliographic record
        citation: CitationRecord,
        /// Short inline label, e.g. `(Smith, 2020)`
        #[serde(rename = "inText")]
        in_text: String,
        /// Full reference-list entry
        reference: String,
    },

    /// The answer is final
    Complete,

    /// Generation failed
    Error {
        /// Message shown to the user (may be empty)
        #[serde(default)]
        content: String,
    },
}

impl StreamEvent {
    /// Convert a citation event into a registry attachment
    #[must_use]
    pub fn into_attachment(self) -> Option<CitationAttachment> {
        match self {
            Self::Citation {
                key,
                citation,
                in_text,
                reference,
            } => Some(CitationAttachment {
                key,
                citation,
                in_text,
                reference,
            }),
            _ => None,
        }
    }
}

/// Parse one frame into an event
///
/// Returns `None` for anything that does not carry a known event: frames
/// without the `data: ` prefix (comments, keep-alives), empty payloads, the
/// `[DONE]` marker, malformed JSON and unknown event kinds.
#[must_use]
pub fn parse_frame(frame: &str) -> Option<StreamEvent> {
    let payload = frame.trim().strip_prefix(DATA_PREFIX)?;

    if payload.is_empty() || payload == DONE_SENTINEL {
        return None;
    }

    let value: serde_json::Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring malformed frame payload");
            return None;
        }
    };

    let kind = value
        .get("type")
        .and_then(serde_json::Value::as_str)
        .map(str::to_owned)?;
    if !KNOWN_KINDS.contains(&kind.as_str()) {
        tracing::debug!(kind = %kind, "Ignoring unknown event type");
        return None;
    }

    match serde_json::from_value(value) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::debug!(kind = %kind, error = %e, "Ignoring event with invalid fields");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_status() {
        let event = parse_frame(r#"data: {"type":"status","content":"Searching..."}"#);
        assert_eq!(
            event,
            Some(StreamEvent::Status {
                content: "Searching...".to_string()
            })
        );
    }

    #[test]
    fn test_parse_surrounding_whitespace() {
        let event = parse_frame("\n  data: {\"type\":\"complete\"}  \n");
        assert_eq!(event, Some(StreamEvent::Complete));
    }

    #[test]
    fn test_parse_citation() {
        let frame = r#"data: {"type":"citation","key":"C1","citation":{"title":"Smith v. Jones","authors":["Smith","Jones"],"year":2020},"inText":"(Smith, 2020)","reference":"Smith v. Jones, 2020"}"#;
        let event = parse_frame(frame).unwrap();
        let attachment = event.into_attachment().unwrap();

        assert_eq!(attachment.key, "C1");
        assert_eq!(attachment.in_text, "(Smith, 2020)");
        assert_eq!(attachment.reference, "Smith v. Jones, 2020");
        assert_eq!(attachment.citation.title.as_deref(), Some("Smith v. Jones"));
        assert_eq!(
            attachment.citation.authors,
            vec![serde_json::json!("Smith"), serde_json::json!("Jones")]
        );
        assert_eq!(
            attachment.citation.extra.get("year"),
            Some(&serde_json::json!(2020))
        );
    }

    #[test]
    fn test_parse_citation_with_loose_record() {
        let null_title = r#"data: {"type":"citation","key":"C1","citation":{"title":null,"authors":["Smith"]},"inText":"(Smith, 2020)","reference":"Smith v. Jones"}"#;
        let attachment = parse_frame(null_title).unwrap().into_attachment().unwrap();
        assert_eq!(attachment.key, "C1");
        assert_eq!(attachment.citation.title, None);

        let object_authors = r#"data: {"type":"citation","key":"C2","citation":{"title":"Doe v. Roe","authors":[{"name":"Doe","role":"judge"}]},"inText":"(Doe, 2019)","reference":"Doe v. Roe"}"#;
        let attachment = parse_frame(object_authors)
            .unwrap()
            .into_attachment()
            .unwrap();
        assert_eq!(
            attachment.citation.authors,
            vec![serde_json::json!({ "name": "Doe", "role": "judge" })]
        );

        let bare = r#"data: {"type":"citation","key":"C3","citation":{"authors":null},"inText":"(Anon)","reference":"Anon"}"#;
        let attachment = parse_frame(bare).unwrap().into_attachment().unwrap();
        assert_eq!(attachment.citation, CitationRecord::default());
    }

    #[test]
    fn test_parse_error_without_content() {
        let event = parse_frame(r#"data: {"type":"error"}"#);
        assert_eq!(
            event,
            Some(StreamEvent::Error {
                content: String::new()
            })
        );
    }

    #[test]
    fn test_ignored_frames() {
        assert_eq!(parse_frame(": keep-alive"), None);
        assert_eq!(parse_frame("event: ping"), None);
        assert_eq!(parse_frame("data: "), None);
        assert_eq!(parse_frame("data: [DONE]"), None);
        assert_eq!(parse_frame("data: not-json"), None);
        assert_eq!(parse_frame(r#"data: {"content":"no type"}"#), None);
        assert_eq!(parse_frame(r#"data: {"type":"usage","tokens":12}"#), None);
        assert_eq!(parse_frame(r#"data: {"type":"text"}"#), None);
        assert_eq!(parse_frame(""), None);
    }

    #[test]
    fn test_prefix_requires_space() {
        assert_eq!(parse_frame(r#"data:{"type":"complete"}"#), None);
    }
}
