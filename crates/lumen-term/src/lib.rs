// SPDX-License-Identifier: MIT
//
// lumen-term — terminal layer for lumen.
//
// Everything that touches bytes on their way to or from the terminal lives
// here: the ANSI encoder, the color and attribute model, the key parser
// that turns raw stdin bytes into key events, the background stdin reader,
// and the `Terminal` capability trait with its two backends (a raw-mode TTY
// and an in-memory double for tests).
//
// Like the rest of lumen, this crate drives the terminal directly with ANSI
// escape sequences and raw termios rather than going through a TUI
// framework. The render layer above only ever sees `Terminal`.

pub mod ansi;
pub mod color;
pub mod input;
pub mod memory;
pub mod output;
pub mod reader;
pub mod style;
pub mod terminal;

pub use color::Color;
pub use input::{Event, KeyCode, KeyEvent, Modifiers, Parser};
pub use memory::MemoryTerminal;
pub use output::OutputBuffer;
pub use style::{Attr, Style};
pub use terminal::{InputStream, Terminal, TtyTerminal};
