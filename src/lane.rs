// SPDX-License-Identifier: MIT
//
// Render lane — the one thread that writes to the terminal.
//
// `lumen-render` owns the terminal, the diff renderer and the queue of
// pending asides. Everything else talks to it through `Command`s, so
// terminal writes are strictly sequential and the baseline needs no lock.
//
// A pass runs the section's render block against a fresh `Renderer`, diffs
// the result against the committed baseline, and writes the repaint in a
// single call. The baseline only advances after that write succeeds. A
// render block that panics leaves the screen and the baseline untouched;
// a write that fails is fatal to the session.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender};

use lumen_render::{DiffRenderer, Renderer, TextBuffer};
use lumen_term::terminal::Terminal;

use crate::error::{Error, Result, panic_message};
use crate::section::SectionCore;
use crate::session::Shared;

/// Messages for the render lane.
pub(crate) enum Command {
    /// The active section has a pass requested.
    Wake,
    /// A section started running.
    Begin(Arc<SectionCore>),
    /// Paint this once, above the section.
    Aside(TextBuffer),
    /// End a section: a final pass unless `rerender` is off, then forget
    /// it.
    Finish {
        section: Arc<SectionCore>,
        rerender: bool,
        done: Sender<()>,
    },
    /// Erase the terminal and repaint from scratch.
    Clear(Sender<Result<()>>),
    /// Release the terminal and stop.
    Close(Sender<io::Result<()>>),
}

pub(crate) struct Lane {
    terminal: Box<dyn Terminal>,
    diff: DiffRenderer,
    section: Option<Arc<SectionCore>>,
    asides: Vec<TextBuffer>,
    shared: Arc<Shared>,
    failed: bool,
}

impl Lane {
    pub(crate) fn new(terminal: Box<dyn Terminal>, shared: Arc<Shared>) -> Self {
        Self {
            terminal,
            diff: DiffRenderer::new(),
            section: None,
            asides: Vec::new(),
            shared,
            failed: false,
        }
    }

    /// Body of the `lumen-render` thread.
    pub(crate) fn run(mut self, commands: &Receiver<Command>) {
        while let Ok(command) = commands.recv() {
            match command {
                Command::Wake => self.wake(),
                Command::Begin(section) => {
                    tracing::trace!("render lane: section begins");
                    self.section = Some(section);
                }
                Command::Aside(buffer) => {
                    self.asides.push(buffer);
                    match &self.section {
                        Some(section) => section.request_render(&self.shared),
                        None => self.flush(None),
                    }
                }
                Command::Finish {
                    section,
                    rerender,
                    done,
                } => {
                    self.finish(&section, rerender);
                    done.send(()).ok();
                }
                Command::Clear(done) => {
                    let result = self.clear();
                    done.send(result).ok();
                }
                Command::Close(done) => {
                    let result = self.terminal.close();
                    done.send(result).ok();
                    break;
                }
            }
        }
        tracing::debug!("render lane stopped");
    }

    /// Run requested passes until the section goes idle.
    fn wake(&mut self) {
        let Some(section) = self.section.clone() else {
            return;
        };
        while section.start_pass() {
            self.paint(&section);
            if section.end_pass() {
                break;
            }
        }
    }

    fn paint(&mut self, section: &SectionCore) {
        if self.failed {
            return;
        }
        let (text, cursor) = section.input_snapshot();
        let mut renderer = Renderer::with_input(text, cursor);
        if let Err(payload) =
            panic::catch_unwind(AssertUnwindSafe(|| section.render_into(&mut renderer)))
        {
            let message = panic_message(payload.as_ref());
            tracing::warn!(panic = %message, "render block panicked, keeping previous paint");
            section.fail(Error::RenderPanicked(message));
            return;
        }
        section.set_input_enabled(renderer.drew_input());
        self.flush(Some(renderer.finish().with_trailing_newline()));
    }

    /// Write pending asides followed by `current`, the section's new
    /// buffer. With no section, only the asides are written.
    fn flush(&mut self, current: Option<TextBuffer>) {
        if self.failed {
            return;
        }
        let width = self.terminal.width();
        let commit = current.is_some();
        let current = current.unwrap_or_default();

        if self.asides.is_empty() && (!commit || self.diff.matches_baseline(&current, width)) {
            tracing::trace!("render pass skipped, screen unchanged");
            return;
        }

        let stats = self.diff.render(&self.asides, &current, width);
        match self.terminal.write(self.diff.output()) {
            Ok(()) => {
                tracing::trace!(
                    lines_written = stats.lines_written,
                    lines_skipped = stats.lines_skipped,
                    bytes = stats.bytes_written,
                    asides = self.asides.len(),
                    "render pass"
                );
                self.asides.clear();
                if commit {
                    self.diff.commit(current, width);
                }
            }
            Err(err) => self.fail(err),
        }
    }

    /// Pending asides still get painted when the final pass is skipped.
    fn finish(&mut self, section: &Arc<SectionCore>, rerender: bool) {
        let is_active = self
            .section
            .as_ref()
            .is_some_and(|active| Arc::ptr_eq(active, section));
        if is_active {
            if rerender || !self.asides.is_empty() {
                self.paint(section);
            } else {
                tracing::trace!("final pass skipped");
            }
            self.section = None;
        }
        section.mark_finished();
        self.diff.forget();
    }

    fn clear(&mut self) -> Result<()> {
        if self.failed {
            return Err(self.shared.failure().unwrap_or(Error::Closed));
        }
        if let Err(err) = self.terminal.clear() {
            self.fail(err);
            return Err(self.shared.failure().unwrap_or(Error::Closed));
        }
        self.diff.forget();
        if let Some(section) = self.section.clone() {
            self.paint(&section);
        }
        Ok(())
    }

    fn fail(&mut self, err: io::Error) {
        tracing::error!(%err, "terminal write failed");
        self.failed = true;
        self.shared.record_failure(err.into());
    }
}
