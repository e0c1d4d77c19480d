//! Terminal rendering of chat updates
//!
//! Streams answer text as it arrives and prints the reference list once a
//! turn is finalized. In HTML mode only the finished markup is printed.

use std::io::{self, Write};

use chat_core::{render_reference_list, ChatUpdate, CitationSnapshot, Turn, TurnRole};

/// Renders [`ChatUpdate`]s to a writer
pub struct Printer<W: Write> {
    out: W,
    /// Print finished answers as HTML instead of streaming text
    html: bool,
    /// Bytes of the in-progress answer already written
    printed: usize,
    /// Citations of the current turn
    citations: CitationSnapshot,
}

impl<W: Write> Printer<W> {
    pub fn new(out: W, html: bool) -> Self {
        Self {
            out,
            html,
            printed: 0,
            citations: Vec::new().into(),
        }
    }

    pub fn handle(&mut self, update: &ChatUpdate) -> io::Result<()> {
        match update {
            ChatUpdate::StatusChanged { status: Some(status) } => {
                if !self.html && self.printed == 0 {
                    writeln!(self.out, "… {status}")?;
                }
            }
            ChatUpdate::AnswerUpdated { raw, .. } => {
                if !self.html && raw.len() > self.printed {
                    // Raw text only ever grows within a turn
                    write!(self.out, "{}", &raw[self.printed..])?;
                    self.printed = raw.len();
                }
            }
            ChatUpdate::AnswerCleared => {
                self.printed = 0;
            }
            ChatUpdate::CitationsChanged { citations } => {
                self.citations = citations.clone();
            }
            ChatUpdate::TurnAppended { turn } if turn.role == TurnRole::Assistant => {
                self.finish_turn(turn)?;
            }
            ChatUpdate::ConversationCreated { id, .. } => {
                tracing::info!(id = %id, "Conversation saved");
            }
            _ => {}
        }
        self.out.flush()
    }

    fn finish_turn(&mut self, turn: &Turn) -> io::Result<()> {
        if turn.failed {
            if self.printed > 0 {
                writeln!(self.out)?;
            }
            return writeln!(self.out, "error: {}", turn.content);
        }

        if self.html {
            writeln!(self.out, "{}", turn.html.as_deref().unwrap_or_default())?;
            let references = render_reference_list(&self.citations);
            if !references.is_empty() {
                writeln!(self.out, "{references}")?;
            }
            return Ok(());
        }

        if self.printed < turn.content.len() {
            write!(self.out, "{}", &turn.content[self.printed..])?;
        }
        writeln!(self.out)?;
        if !self.citations.is_empty() {
            writeln!(self.out)?;
            for attachment in self.citations.iter() {
                writeln!(self.out, "[{}] {}", attachment.key, attachment.reference)?;
            }
        }
        writeln!(self.out)
    }
}
