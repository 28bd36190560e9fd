// SPDX-License-Identifier: MIT
//
// Input lane — from raw bytes to listeners.
//
// The `lumen-input` thread owns the key parser. It drains the terminal's
// byte stream, flushes a lone ESC once `escape_timeout` passes with no
// follow-up bytes, and hands every decoded event to the active section:
//
//   1. Ctrl+C becomes an interrupt when the session is configured so.
//   2. Event listeners see everything, unrecognized sequences included.
//   3. If the section drew the line-input widget, the key edits the line;
//      Enter submits it to the input-entered listeners.
//   4. Key listeners see every key, in registration order.
//
// Each listener runs inside its own `catch_unwind`, so one failing
// callback never starves the rest.
//
// A failed or vanished input stream is fatal to the session, like a failed
// write: the run waiting on a key or a line would otherwise wait forever.

use std::cell::Cell;
use std::io;
use std::sync::Arc;
use std::sync::mpsc::RecvTimeoutError;
use std::time::Duration;

use lumen_term::input::{Event, KeyCode, KeyEvent, Modifiers, Parser};
use lumen_term::terminal::InputStream;
use unicode_segmentation::UnicodeSegmentation;

use crate::section::SectionCore;
use crate::session::Shared;

/// How often an idle input lane checks whether the session closed.
const IDLE_POLL: Duration = Duration::from_millis(50);

// ─── Line input ─────────────────────────────────────────────────────────────

/// The text being typed into a section's line-input widget.
///
/// The cursor is a byte offset that always sits on a grapheme boundary.
/// Editing moves by whole grapheme clusters, so a combining accent or an
/// emoji sequence is deleted in one keystroke.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct LineInput {
    text: String,
    cursor: usize,
}

/// What a key did to the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LineAction {
    /// The key is not a line-editing key.
    Ignored,
    /// The key was consumed but changed nothing visible.
    Unchanged,
    /// Text or cursor changed; the section should repaint.
    Edited,
    /// Enter.
    Submit,
}

impl LineInput {
    pub(crate) fn text(&self) -> &str {
        &self.text
    }

    pub(crate) const fn cursor(&self) -> usize {
        self.cursor
    }

    /// Replace the text and put the cursor at its end.
    pub(crate) fn set(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.cursor = self.text.len();
    }

    pub(crate) fn clear(&mut self) {
        self.text.clear();
        self.cursor = 0;
    }

    pub(crate) fn handle(&mut self, key: &KeyEvent) -> LineAction {
        if let Some(ch) = key.printable() {
            self.text.insert(self.cursor, ch);
            self.cursor += ch.len_utf8();
            return LineAction::Edited;
        }
        if key.modifiers.intersects(Modifiers::CTRL | Modifiers::ALT) {
            return LineAction::Ignored;
        }
        let changed = match key.code {
            KeyCode::Enter => return LineAction::Submit,
            KeyCode::Backspace => self.backspace(),
            KeyCode::Delete => self.delete(),
            KeyCode::Left => self.move_to(self.prev_boundary()),
            KeyCode::Right => self.move_to(self.next_boundary()),
            KeyCode::Home => self.move_to(0),
            KeyCode::End => self.move_to(self.text.len()),
            _ => return LineAction::Ignored,
        };
        if changed {
            LineAction::Edited
        } else {
            LineAction::Unchanged
        }
    }

    fn backspace(&mut self) -> bool {
        let start = self.prev_boundary();
        if start == self.cursor {
            return false;
        }
        self.text.replace_range(start..self.cursor, "");
        self.cursor = start;
        true
    }

    fn delete(&mut self) -> bool {
        let end = self.next_boundary();
        if end == self.cursor {
            return false;
        }
        self.text.replace_range(self.cursor..end, "");
        true
    }

    fn move_to(&mut self, cursor: usize) -> bool {
        let moved = cursor != self.cursor;
        self.cursor = cursor;
        moved
    }

    fn prev_boundary(&self) -> usize {
        self.text[..self.cursor]
            .grapheme_indices(true)
            .next_back()
            .map_or(0, |(i, _)| i)
    }

    fn next_boundary(&self) -> usize {
        self.text[self.cursor..]
            .graphemes(true)
            .next()
            .map_or(self.cursor, |g| self.cursor + g.len())
    }
}

// ─── Submission ─────────────────────────────────────────────────────────────

/// A line submitted with Enter, as seen by input-entered listeners.
///
/// By default the line is cleared once every listener has run. A listener
/// can keep it in place with [`keep_input`](Self::keep_input), or refuse it
/// with [`reject`](Self::reject): a rejected line stays as typed and does
/// not count as entered.
#[derive(Debug)]
pub struct InputEntered {
    text: String,
    keep: Cell<bool>,
    rejected: Cell<bool>,
}

impl InputEntered {
    pub(crate) const fn new(text: String) -> Self {
        Self {
            text,
            keep: Cell::new(false),
            rejected: Cell::new(false),
        }
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Leave the submitted text in the input line.
    pub fn keep_input(&self) {
        self.keep.set(true);
    }

    /// Refuse the submission.
    pub fn reject(&self) {
        self.rejected.set(true);
    }

    #[must_use]
    pub fn is_rejected(&self) -> bool {
        self.rejected.get()
    }

    pub(crate) fn is_kept(&self) -> bool {
        self.keep.get()
    }
}

// ─── Lane ───────────────────────────────────────────────────────────────────

/// Body of the `lumen-input` thread.
pub(crate) fn run(shared: &Arc<Shared>, bytes: &InputStream) {
    let mut parser = Parser::new();
    let escape_timeout = shared.config.escape_timeout;

    while !shared.is_closed() {
        let timeout = if parser.has_pending() {
            escape_timeout
        } else {
            IDLE_POLL
        };
        let events = match bytes.recv_timeout(timeout) {
            Ok(Ok(chunk)) => parser.advance(&chunk),
            Ok(Err(err)) => {
                stream_failed(shared, err);
                break;
            }
            Err(RecvTimeoutError::Timeout) => parser.flush(),
            Err(RecvTimeoutError::Disconnected) => {
                stream_failed(
                    shared,
                    io::Error::new(io::ErrorKind::BrokenPipe, "input stream ended"),
                );
                break;
            }
        };
        for event in events {
            if shared.is_closed() {
                return;
            }
            dispatch(shared, &event);
        }
    }
    tracing::debug!("input lane stopped");
}

/// The input stream is gone. Expected while the session closes, fatal
/// otherwise.
fn stream_failed(shared: &Shared, err: io::Error) {
    if shared.is_closed() {
        tracing::debug!(%err, "input stream ended at close");
        return;
    }
    tracing::error!(%err, "terminal input failed");
    shared.record_failure(err.into());
}

fn is_ctrl_c(key: &KeyEvent) -> bool {
    key.code == KeyCode::Char('c') && key.modifiers == Modifiers::CTRL
}

/// Route one event to the active section.
pub(crate) fn dispatch(shared: &Shared, event: &Event) {
    if let Event::Key(key) = event {
        if shared.config.ctrl_c_interrupts && is_ctrl_c(key) {
            shared.interrupt();
            return;
        }
    }
    if let Event::Unrecognized(bytes) = event {
        tracing::debug!(?bytes, "unrecognized input sequence");
    }

    let Some(section) = shared.active() else {
        tracing::trace!(?event, "input with no active section");
        return;
    };
    section.notify_event(event);

    let Event::Key(key) = event else {
        return;
    };
    if section.input_enabled() {
        edit_line(shared, &section, key);
    }
    section.notify_key(key);
}

fn edit_line(shared: &Shared, section: &SectionCore, key: &KeyEvent) {
    match section.with_line(|line| line.handle(key)) {
        LineAction::Ignored | LineAction::Unchanged => {}
        LineAction::Edited => section.request_render(shared),
        LineAction::Submit => {
            let text = section.with_line(|line| line.text().to_owned());
            let entered = InputEntered::new(text);
            section.notify_entered(&entered);
            if entered.is_rejected() {
                tracing::debug!("input rejected");
                return;
            }
            if !entered.is_kept() {
                section.with_line(LineInput::clear);
                section.request_render(shared);
            }
            section.input_accepted();
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
