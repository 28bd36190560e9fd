// SPDX-License-Identifier: MIT
//
// lumen-render — render layer for lumen.
//
// A render pass runs a user block against a `Renderer`, which appends styled
// text to a `TextBuffer` while tracking decorations in a `SectionState`.
// The finished buffer is handed to `DiffRenderer`, which compares it with
// the last committed buffer and produces the relative-cursor ANSI output
// that repaints only what changed.
//
// Nothing in this crate touches a terminal. Output is accumulated in an
// `OutputBuffer` and the caller decides when to write it.

pub mod diff;
pub mod renderer;
pub mod state;
pub mod text_buffer;

pub use diff::{DiffRenderer, RenderStats};
pub use renderer::Renderer;
pub use state::{Decoration, SectionState};
pub use text_buffer::{Line, Span, TAB_WIDTH, TextBuffer};
