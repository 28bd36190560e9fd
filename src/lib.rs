// SPDX-License-Identifier: MIT
//
// lumen — reactive inline terminal rendering.
//
// Output is declared as a function of state. A section's render block
// draws lines of styled text; whenever a `LiveVar` it reads changes, the
// section is rendered again and only the lines that changed are rewritten
// in place, below whatever the program printed before. No alternate screen,
// no full-screen redraws.
//
//   lumen-term   → ANSI encoding, key parsing, terminal backends
//   lumen-render → render state, text buffers, the diff engine
//   lumen        → sessions, sections, live state, input, timers
//
// Threads, all named `lumen-*`:
//
//   lumen-render  owns the terminal; the only writer
//   lumen-input   decodes keys and calls listeners
//   lumen-timer   one per timer
//   lumen-signals SIGINT/SIGTERM/SIGWINCH (TTY sessions)
//
// The owner's thread runs section bodies and blocks in `run_until_*`.

//! Reactive inline terminal rendering.
//!
//! ```no_run
//! use lumen::Color;
//!
//! fn main() -> lumen::Result<()> {
//!     lumen::session(|session| {
//!         let name = session.live_var(String::new());
//!         let shown = name.clone();
//!         session
//!             .section(move |r| {
//!                 r.bold().text("name: ").clear_all().input().newline();
//!                 r.fg(Color::GREEN).textln(format!("hello, {}", shown.get()));
//!             })
//!             .run_until_input_entered(|scope| {
//!                 let name = name.clone();
//!                 scope.on_input_entered(move |entered| {
//!                     name.set(entered.text().to_owned());
//!                 });
//!             })?;
//!         Ok(())
//!     })
//! }
//! ```

mod config;
mod dispose;
mod error;
mod input;
mod lane;
mod live_var;
mod section;
mod session;
mod signal;
mod timer;

pub use config::SessionConfig;
pub use error::{Error, Result};
pub use input::InputEntered;
pub use live_var::{ListenerId, LiveVar};
pub use section::{RunScope, Section, Status};
pub use session::{Session, session, session_with};
pub use timer::TimerHandle;

pub use lumen_render::{Decoration, Renderer, TextBuffer};
pub use lumen_term::{
    Attr, Color, Event, InputStream, KeyCode, KeyEvent, MemoryTerminal, Modifiers, Style, Terminal,
    TtyTerminal,
};
