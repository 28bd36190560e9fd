// SPDX-License-Identifier: MIT
//
// Session configuration.

use std::time::Duration;

/// Timing and behavior knobs for a [`Session`](crate::Session).
///
/// The defaults suit a program that owns its terminal: Ctrl+C interrupts,
/// and an interrupt ends the process after giving dispose callbacks a short
/// grace window.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long a lone ESC byte waits for the rest of an escape sequence
    /// before it is taken as the Escape key. Default: 8.333 ms (120 Hz).
    pub escape_timeout: Duration,

    /// Time budget for all dispose callbacks together when the session is
    /// interrupted or closed. Default: 50 ms.
    pub dispose_grace: Duration,

    /// Treat Ctrl+C as an interrupt instead of an ordinary key.
    /// Default: `true`.
    pub ctrl_c_interrupts: bool,

    /// Install SIGINT/SIGTERM handlers that interrupt the session, and a
    /// SIGWINCH handler that repaints on resize. Default: `false`;
    /// [`SessionConfig::tty`] turns it on.
    pub handle_signals: bool,

    /// Exit the process with status 130 once an interrupt has been handled.
    /// With `false`, the running section ends with
    /// [`Error::Interrupted`](crate::Error::Interrupted) instead.
    /// Default: `true`.
    pub exit_on_interrupt: bool,
}

impl SessionConfig {
    /// Defaults for a session on the process's own terminal: signal
    /// handling on.
    #[must_use]
    pub fn tty() -> Self {
        Self {
            handle_signals: true,
            ..Self::default()
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            escape_timeout: Duration::from_micros(8333), // 120 Hz
            dispose_grace: Duration::from_millis(50),
            ctrl_c_interrupts: true,
            handle_signals: false,
            exit_on_interrupt: true,
        }
    }
}
