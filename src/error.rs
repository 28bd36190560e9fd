// SPDX-License-Identifier: MIT
//
// Session errors.
//
// The terminal and render layers speak `io::Result`. Up here the failures
// that reach a caller are few and distinct: the backend broke, a render
// block panicked, or the session is not in a state to do what was asked.
// Listener and dispose-callback panics never become errors; they are caught
// per callback and logged.

use std::io;
use std::sync::Arc;

use thiserror::Error;

/// Everything a session operation can fail with.
///
/// `Clone` so one failure can be reported to every waiter it concerns. The
/// I/O error is shared for that reason.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The terminal backend failed. Fatal to the session.
    #[error("terminal I/O failed: {0}")]
    Io(#[source] Arc<io::Error>),

    /// A render block panicked. The pass was discarded; the previous paint
    /// stays on screen.
    #[error("render block panicked: {0}")]
    RenderPanicked(String),

    /// The session was closed before or during the operation.
    #[error("session closed")]
    Closed,

    /// The session was interrupted (Ctrl+C or a termination signal).
    #[error("session interrupted")]
    Interrupted,

    /// The terminal's input stream was already taken by someone else.
    #[error("terminal input stream already taken")]
    InputStreamTaken,

    /// The section already ran to completion. Sections run once.
    #[error("section already finished")]
    SectionFinished,

    /// Another section of this session is running.
    #[error("another section is already running")]
    SectionActive,
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

/// Result alias for session operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Text of a panic payload, for logs and [`Error::RenderPanicked`].
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_owned())
}
