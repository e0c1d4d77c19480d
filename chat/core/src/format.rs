//! Paragraph Formatter
//!
//! Streamed answers arrive as one long run of sentences. This module regroups
//! them into readable paragraphs and turns `[[C<n>]]` placeholders into
//! anchors labelled from the [`CitationRegistry`].
//!
//! # Paragraph Rules
//!
//! Sentences are added to the current paragraph greedily. Before adding the
//! next sentence the paragraph is closed when:
//!
//! - it already holds [`MAX_SENTENCES`] sentences, or
//! - it holds at least 3 sentences and the next one opens with a
//!   [transition phrase](TRANSITIONS), or
//! - it holds at least 4 sentences and another sentence follows the next
//!   one (so the answer never ends on a lone sentence).
//!
//! Formatting is a pure function of the text and the registry. The
//! controller re-runs it over the whole buffer on every text delta.

use crate::citations::{anchor_id, placeholder, CitationRegistry, CitationSnapshot};

/// Hard cap on sentences per paragraph
pub const MAX_SENTENCES: usize = 5;

/// Phrases that open a new line of argument
pub const TRANSITIONS: [&str; 10] = [
    "however",
    "in contrast",
    "additionally",
    "furthermore",
    "moreover",
    "meanwhile",
    "conversely",
    "on the other hand",
    "nevertheless",
    "nonetheless",
];

/// Split text into sentences
///
/// A boundary is a `.`, `!` or `?` followed by whitespace and an ASCII
/// uppercase letter. The whitespace at a boundary is dropped. Text without
/// any boundary is returned as a single sentence.
#[must_use]
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, ch)) = chars.next() {
        if !matches!(ch, '.' | '!' | '?') {
            continue;
        }

        let end = idx + ch.len_utf8();
        let mut saw_space = false;
        while let Some(&(_, next)) = chars.peek() {
            if next.is_whitespace() {
                saw_space = true;
                chars.next();
            } else {
                break;
            }
        }

        if let Some(&(next_idx, next)) = chars.peek() {
            if saw_space && next.is_ascii_uppercase() {
                sentences.push(&text[start..end]);
                start = next_idx;
            }
        }
    }

    sentences.push(&text[start..]);
    sentences
}

/// Whether a sentence opens with a transition phrase
#[must_use]
pub fn starts_with_transition(sentence: &str) -> bool {
    let lowered = sentence.trim_start().to_lowercase();
    TRANSITIONS.iter().any(|t| lowered.starts_with(t))
}

/// Group sentences into paragraphs
#[must_use]
pub fn group_paragraphs<'a>(sentences: &[&'a str]) -> Vec<Vec<&'a str>> {
    let total = sentences.len();
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for (i, &sentence) in sentences.iter().enumerate() {
        if !current.is_empty() && should_break(current.len(), sentence, total - i) {
            paragraphs.push(std::mem::take(&mut current));
        }
        current.push(sentence);
    }

    if !current.is_empty() {
        paragraphs.push(current);
    }
    paragraphs
}

/// Decide whether to close a paragraph of `len` sentences before `next`
///
/// `remaining` counts the sentences still to place, `next` included.
fn should_break(len: usize, next: &str, remaining: usize) -> bool {
    len >= MAX_SENTENCES
        || (len >= 3 && starts_with_transition(next))
        || (len >= 4 && remaining >= 2)
}

/// Regroup text into paragraphs separated by blank lines
#[must_use]
pub fn format_paragraphs(text: &str) -> String {
    let sentences = split_sentences(text);
    group_paragraphs(&sentences)
        .iter()
        .map(|paragraph| paragraph.join(" "))
        .collect::<Vec<_>>()
        .join("\n\n")
        .trim()
        .to_string()
}

/// Render text as paragraph markup with linked citations
///
/// The prose is HTML-escaped. Each `[[C<n>]]` becomes an anchor pointing at
/// `#citation-C<n>`, labelled with the registered inline label or, when the
/// citation has not arrived yet, the placeholder itself.
#[must_use]
pub fn render_html(text: &str, registry: &CitationRegistry) -> String {
    let escaped = escape_html(&format_paragraphs(text));
    let linked = link_citations(&escaped, registry);
    format!("<p>{}</p>", linked.replace("\n\n", "</p><p>"))
}

/// Render the reference list the inline anchors point at
#[must_use]
pub fn render_reference_list(citations: &CitationSnapshot) -> String {
    if citations.is_empty() {
        return String::new();
    }

    let mut html = String::from("<ol class=\"citation-list\">");
    for attachment in citations.iter() {
        html.push_str(&format!(
            "<li id=\"{}\">{}</li>",
            anchor_id(&attachment.key),
            escape_html(&attachment.reference)
        ));
    }
    html.push_str("</ol>");
    html
}

/// Replace citation placeholders with anchors
fn link_citations(text: &str, registry: &CitationRegistry) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find("[[C") {
        out.push_str(&rest[..open]);
        let candidate = &rest[open..];

        match placeholder_key(candidate) {
            Some(key) => {
                let label = escape_html(&registry.label_for(key));
                out.push_str(&format!(
                    "<a href=\"#{}\" class=\"citation-link\" data-citation=\"{key}\">{label}</a>",
                    anchor_id(key)
                ));
                rest = &candidate[placeholder(key).len()..];
            }
            None => {
                out.push_str("[[C");
                rest = &candidate[3..];
            }
        }
    }

    out.push_str(rest);
    out
}

/// Extract `C<n>` from text starting with a well-formed `[[C<n>]]`
fn placeholder_key(text: &str) -> Option<&str> {
    let body = text.strip_prefix("[[")?;
    let digits = body[1..]
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(body.len() - 1);
    if digits == 0 || !body[1 + digits..].starts_with("]]") {
        return None;
    }
    Some(&body[..=digits])
}

/// Escape text for inclusion in HTML
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
