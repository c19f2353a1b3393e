//! Terminal rendering of transcript changes.
//!
//! `TranscriptRenderer` remembers what it already printed and turns each new
//! transcript snapshot into the text needed to bring the terminal up to
//! date: new messages get their own line, a streaming bot message grows in
//! place, and anything else that changed is reprinted.

use console::style;

use threadline_types::message::{ChatMessage, ERROR_MARKER, LOADING_PLACEHOLDER, MessageId, MessageKind};

/// Incremental printer for one terminal.
#[derive(Debug, Default)]
pub struct TranscriptRenderer {
    shown: Vec<(MessageId, String)>,
    /// Bot message whose line is still open for appended text.
    open: Option<MessageId>,
}

impl TranscriptRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text to print for the transition to `messages`.
    pub fn render(&mut self, messages: &[ChatMessage]) -> String {
        let mut out = String::new();

        if messages.is_empty() {
            if !self.shown.is_empty() {
                self.close(&mut out);
                self.shown.clear();
                out.push_str(&format!("  {}\n", style("History cleared.").dim()));
            }
            return out;
        }

        let before = self.shown.len();
        self.shown
            .retain(|(id, _)| messages.iter().any(|m| m.id == *id));
        let removed = before - self.shown.len();
        if removed > 0 {
            if self
                .open
                .is_some_and(|open| !self.shown.iter().any(|(id, _)| *id == open))
            {
                self.close(&mut out);
            }
            out.push_str(&format!(
                "  {}\n",
                style(format!("({removed} message(s) deleted)")).dim()
            ));
        }

        for message in messages {
            let text = visible_text(message);
            match self.shown.iter().position(|(id, _)| *id == message.id) {
                None => {
                    self.close(&mut out);
                    out.push_str(&format!("  {} {}", label(message.kind, false), styled_body(&text)));
                    match message.kind {
                        MessageKind::Bot => self.open = Some(message.id),
                        MessageKind::User => out.push('\n'),
                    }
                    self.shown.push((message.id, text));
                }
                Some(pos) => {
                    let previous = &self.shown[pos].1;
                    if *previous == text {
                        continue;
                    }
                    if self.open == Some(message.id) && text.starts_with(previous.as_str()) {
                        out.push_str(&styled_body(&text[previous.len()..]));
                    } else {
                        self.close(&mut out);
                        out.push_str(&format!("  {} {}\n", label(message.kind, true), styled_body(&text)));
                    }
                    self.shown[pos].1 = text;
                }
            }
        }
        out
    }

    /// End the open bot line, if any.
    pub fn finish(&mut self) -> String {
        let mut out = String::new();
        self.close(&mut out);
        out
    }

    fn close(&mut self, out: &mut String) {
        if self.open.take().is_some() {
            out.push('\n');
        }
    }
}

/// What the terminal shows for a message; the loading placeholder shows
/// as nothing so streamed text can follow the label directly.
fn visible_text(message: &ChatMessage) -> String {
    if message.kind == MessageKind::Bot && message.content == LOADING_PLACEHOLDER {
        String::new()
    } else {
        message.content.clone()
    }
}

fn label(kind: MessageKind, edited: bool) -> String {
    let base = match kind {
        MessageKind::User => style("You >").green().bold(),
        MessageKind::Bot => style("Bot >").cyan().bold(),
    };
    if edited {
        format!("{base} {}", style("(edited)").dim())
    } else {
        base.to_string()
    }
}

fn styled_body(text: &str) -> String {
    match text.find(ERROR_MARKER) {
        Some(at) => format!("{}{}", &text[..at], style(&text[at..]).red()),
        None => text.to_string(),
    }
}
