// SPDX-License-Identifier: MIT
//
// Terminal input parser.
//
// Turns raw stdin bytes into key events. Handles what a terminal in raw
// mode sends for ordinary keyboard input:
//
// - Legacy CSI sequences (arrows, Home/End, editing keys, function keys)
// - SS3 sequences (arrows and F1-F4 in application cursor mode)
// - xterm modifier parameters (`CSI 1 ; 5 C` = Ctrl+Right)
// - Alt+key (ESC followed by a printable or control character)
// - Control characters (Ctrl+letter, Enter, Tab, Backspace)
// - UTF-8 multi-byte characters
//
// Anything the parser cannot identify is reported as
// `Event::Unrecognized` carrying the raw bytes, so callers can see
// gaps instead of having keys silently vanish.
//
// # Design
//
// The parser maintains a small internal byte buffer because escape
// sequences can span multiple `read()` calls. Feed bytes with
// [`Parser::advance`], retrieve events from the returned `Vec`.
// After a timeout with no new bytes, call [`Parser::flush`] to
// emit any pending lone ESC as a real Escape keypress.
//
// Number parsing is done directly on `&[u8]` — no intermediate
// `String` allocation for CSI parameter decoding.

use bitflags::bitflags;

// ─── Event Types ────────────────────────────────────────────────────────────

/// A decoded unit of terminal input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A recognized key press.
    Key(KeyEvent),
    /// Bytes that did not form any known key: an unknown escape sequence,
    /// a malformed CSI, or invalid UTF-8.
    Unrecognized(Vec<u8>),
}

impl Event {
    /// The key event, if this is one.
    #[inline]
    #[must_use]
    pub const fn key(&self) -> Option<&KeyEvent> {
        match self {
            Self::Key(key) => Some(key),
            Self::Unrecognized(_) => None,
        }
    }
}

/// A key press with its modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    /// Which key was pressed.
    pub code: KeyCode,
    /// Active modifier keys (Shift, Alt, Ctrl).
    pub modifiers: Modifiers,
}

impl KeyEvent {
    /// A key press with no modifiers.
    #[inline]
    #[must_use]
    pub const fn new(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: Modifiers::empty(),
        }
    }

    /// A key press with the given modifiers.
    #[inline]
    #[must_use]
    pub const fn with(code: KeyCode, modifiers: Modifiers) -> Self {
        Self { code, modifiers }
    }

    /// The character this key would insert into a line of text, if any.
    ///
    /// Plain and Shift-modified characters count; Ctrl and Alt chords don't.
    #[must_use]
    pub fn printable(&self) -> Option<char> {
        match self.code {
            KeyCode::Char(ch)
                if !self.modifiers.intersects(Modifiers::CTRL | Modifiers::ALT)
                    && !ch.is_control() =>
            {
                Some(ch)
            }
            _ => None,
        }
    }
}

/// Identity of a key.
///
/// Named keys have dedicated variants; printable characters use
/// [`Char`](KeyCode::Char). Function keys F1–F20 use [`F`](KeyCode::F).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    /// A Unicode character.
    Char(char),
    // ── Named keys ──────────────────────────────────────────────
    Enter,
    Tab,
    Backspace,
    Escape,
    Delete,
    Insert,
    // ── Navigation ──────────────────────────────────────────────
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    // ── Function keys ───────────────────────────────────────────
    /// F1 through F20.
    F(u8),
}

bitflags! {
    /// Keyboard modifier flags.
    ///
    /// Matches the xterm CSI modifier encoding, where `param = 1 + bitmask`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0000_0001;
        const ALT   = 0b0000_0010;
        const CTRL  = 0b0000_0100;
        const META  = 0b0000_1000;
    }
}

// ─── Parser ─────────────────────────────────────────────────────────────────

/// Terminal input parser.
///
/// Feed raw bytes via [`advance`](Parser::advance) and collect
/// [`Event`]s. The parser buffers incomplete sequences internally and
/// resumes parsing when more bytes arrive.
///
/// # Escape vs escape-sequence ambiguity
///
/// A bare `ESC` byte (0x1B) could be either a standalone Escape keypress
/// or the start of a multi-byte escape sequence. The parser holds a lone
/// ESC as pending. The caller should wait a short timeout (~10ms) and then
/// call [`flush`](Parser::flush) to emit it as a real Escape key event.
pub struct Parser {
    /// Accumulated raw bytes waiting to be parsed.
    buf: Vec<u8>,
}

impl Parser {
    /// Create a new parser with an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(64),
        }
    }

    /// Feed raw bytes from stdin and return all events that can be parsed.
    ///
    /// Bytes that form an incomplete sequence are kept in the internal
    /// buffer and will be combined with future [`advance`](Parser::advance)
    /// calls. Call [`flush`](Parser::flush) after a timeout to emit any
    /// pending lone ESC.
    pub fn advance(&mut self, data: &[u8]) -> Vec<Event> {
        self.buf.extend_from_slice(data);
        let mut events = Vec::new();
        let mut pos = 0;

        while pos < self.buf.len() {
            match try_parse(&self.buf[pos..]) {
                Parsed::Event(event, consumed) => {
                    events.push(event);
                    pos += consumed;
                }
                Parsed::Unrecognized(n) => {
                    events.push(Event::Unrecognized(self.buf[pos..pos + n].to_vec()));
                    pos += n;
                }
                Parsed::Incomplete => break,
            }
        }

        // Compact: remove consumed bytes, keep unconsumed remainder.
        if pos > 0 {
            self.buf.drain(..pos);
        }

        events
    }

    /// Are there unconsumed bytes that might complete with more data?
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.buf.is_empty()
    }

    /// Flush pending bytes as literal key events.
    ///
    /// Called after a timeout (typically ~10ms) to resolve the ESC
    /// ambiguity: a lone ESC byte becomes an Escape key event, and
    /// leftover ASCII becomes ordinary keys. Leftover non-ASCII bytes
    /// (a UTF-8 sequence that never completed) are reported as one
    /// [`Event::Unrecognized`].
    pub fn flush(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        let mut stray = Vec::new();

        for &byte in &self.buf {
            let key = match byte {
                0x1B => KeyEvent::new(KeyCode::Escape),
                0x7F => KeyEvent::new(KeyCode::Backspace),
                b @ 0x20..=0x7E => KeyEvent::new(KeyCode::Char(b as char)),
                b @ 0x00..=0x1A => control_key(b),
                _ => {
                    stray.push(byte);
                    continue;
                }
            };
            if !stray.is_empty() {
                events.push(Event::Unrecognized(std::mem::take(&mut stray)));
            }
            events.push(Event::Key(key));
        }
        if !stray.is_empty() {
            events.push(Event::Unrecognized(stray));
        }

        self.buf.clear();
        events
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Stateless Parsing Functions ────────────────────────────────────────────
//
// All parse functions are pure — they read from the front of a slice and
// return what they found plus how many bytes to consume. No mutable state.

/// Result of trying to parse one event from the buffer.
enum Parsed {
    /// Successfully parsed an event, consuming `usize` bytes.
    Event(Event, usize),
    /// Sequence is incomplete — need more bytes.
    Incomplete,
    /// The next `usize` bytes are not a known key.
    Unrecognized(usize),
}

/// Try to parse a single event from the front of `buf` (never empty).
fn try_parse(buf: &[u8]) -> Parsed {
    match buf[0] {
        // ESC — could be escape sequence or standalone Escape key.
        0x1B => parse_escape(buf),
        0x08 | 0x7F => key(KeyCode::Backspace, 1),
        0x09 => key(KeyCode::Tab, 1),
        0x0A | 0x0D => key(KeyCode::Enter, 1),
        // Remaining control characters are Ctrl+letter.
        b @ 0x00..=0x1A => Parsed::Event(Event::Key(control_key(b)), 1),
        // FS, GS, RS, US: Ctrl+\ ] ^ _ on most terminals, but ambiguous.
        0x1C..=0x1F => Parsed::Unrecognized(1),
        // ASCII printable.
        b @ 0x20..=0x7E => key(KeyCode::Char(b as char), 1),
        // UTF-8 multi-byte.
        0xC0..=0xFF => parse_utf8(buf),
        // Bare continuation bytes (0x80..=0xBF) — invalid lead.
        _ => Parsed::Unrecognized(1),
    }
}

// ── Escape sequences ────────────────────────────────────────────────────────

fn parse_escape(buf: &[u8]) -> Parsed {
    debug_assert_eq!(buf[0], 0x1B);

    if buf.len() < 2 {
        return Parsed::Incomplete;
    }

    match buf[1] {
        // CSI: ESC [
        b'[' => parse_csi(buf),
        // SS3: ESC O
        b'O' => parse_ss3(buf),
        // Alt+ESC.
        0x1B => key_with(KeyCode::Escape, Modifiers::ALT, 2),
        // Alt+Backspace.
        0x7F => key_with(KeyCode::Backspace, Modifiers::ALT, 2),
        // Alt+Enter.
        0x0D => key_with(KeyCode::Enter, Modifiers::ALT, 2),
        // Alt+printable character.
        b @ 0x20..=0x7E => key_with(KeyCode::Char(b as char), Modifiers::ALT, 2),
        // Alt+control character (e.g., ESC Ctrl+A).
        b @ 0x01..=0x1A => {
            let ctrl = control_key(b);
            key_with(ctrl.code, ctrl.modifiers | Modifiers::ALT, 2)
        }
        // Unknown byte after ESC — emit standalone Escape, then parse the
        // byte on its own.
        _ => key(KeyCode::Escape, 1),
    }
}

// ── CSI (Control Sequence Introducer) ───────────────────────────────────────

fn parse_csi(buf: &[u8]) -> Parsed {
    debug_assert!(buf.len() >= 2 && buf[0] == 0x1B && buf[1] == b'[');

    // Scan for the final byte (0x40..=0x7E).
    // CSI parameter bytes are in 0x30..=0x3F, intermediate in 0x20..=0x2F.
    let mut end = 2;
    while end < buf.len() {
        let b = buf[end];
        if (0x40..=0x7E).contains(&b) {
            break;
        }
        if !(0x20..=0x3F).contains(&b) {
            // Invalid byte in CSI sequence — report everything up to and
            // including it.
            return Parsed::Unrecognized(end + 1);
        }
        end += 1;
    }

    if end >= buf.len() {
        return Parsed::Incomplete;
    }

    let final_byte = buf[end];
    let params = parse_csi_params(&buf[2..end]);
    let consumed = end + 1;
    let modifiers = params.get(1).map_or(Modifiers::empty(), |&p| decode_modifiers(p));

    // ── Tilde-terminated sequences (editing keys, function keys) ─────
    if final_byte == b'~' {
        let code = match params.first().copied().unwrap_or(0) {
            1 | 7 => KeyCode::Home,
            2 => KeyCode::Insert,
            3 => KeyCode::Delete,
            4 | 8 => KeyCode::End,
            5 => KeyCode::PageUp,
            6 => KeyCode::PageDown,
            11 => KeyCode::F(1),
            12 => KeyCode::F(2),
            13 => KeyCode::F(3),
            14 => KeyCode::F(4),
            15 => KeyCode::F(5),
            17 => KeyCode::F(6),
            18 => KeyCode::F(7),
            19 => KeyCode::F(8),
            20 => KeyCode::F(9),
            21 => KeyCode::F(10),
            23 => KeyCode::F(11),
            24 => KeyCode::F(12),
            25 => KeyCode::F(13),
            26 => KeyCode::F(14),
            28 => KeyCode::F(15),
            29 => KeyCode::F(16),
            31 => KeyCode::F(17),
            32 => KeyCode::F(18),
            33 => KeyCode::F(19),
            34 => KeyCode::F(20),
            _ => return Parsed::Unrecognized(consumed),
        };
        return key_with(code, modifiers, consumed);
    }

    // ── Standard CSI sequences with letter final bytes ──────────────
    let code = match final_byte {
        b'A' => KeyCode::Up,
        b'B' => KeyCode::Down,
        b'C' => KeyCode::Right,
        b'D' => KeyCode::Left,
        b'H' => KeyCode::Home,
        b'F' => KeyCode::End,
        b'P' => KeyCode::F(1),
        b'Q' => KeyCode::F(2),
        b'R' => KeyCode::F(3),
        b'S' => KeyCode::F(4),
        b'Z' => return key_with(KeyCode::Tab, Modifiers::SHIFT, consumed),
        _ => return Parsed::Unrecognized(consumed),
    };

    key_with(code, modifiers, consumed)
}

// ── SS3 (Single Shift 3) ───────────────────────────────────────────────────

fn parse_ss3(buf: &[u8]) -> Parsed {
    debug_assert!(buf.len() >= 2 && buf[0] == 0x1B && buf[1] == b'O');

    if buf.len() < 3 {
        return Parsed::Incomplete;
    }

    let code = match buf[2] {
        b'A' => KeyCode::Up,
        b'B' => KeyCode::Down,
        b'C' => KeyCode::Right,
        b'D' => KeyCode::Left,
        b'H' => KeyCode::Home,
        b'F' => KeyCode::End,
        b'P' => KeyCode::F(1),
        b'Q' => KeyCode::F(2),
        b'R' => KeyCode::F(3),
        b'S' => KeyCode::F(4),
        _ => return Parsed::Unrecognized(3),
    };

    key(code, 3)
}

// ── UTF-8 ──────────────────────────────────────────────────────────────────

fn parse_utf8(buf: &[u8]) -> Parsed {
    let expected = utf8_char_len(buf[0]);

    if expected == 0 {
        return Parsed::Unrecognized(1);
    }
    if buf.len() < expected {
        // Validate what we have so far: a bad continuation byte means the
        // sequence can never complete.
        if buf[1..].iter().any(|&b| b & 0xC0 != 0x80) {
            return Parsed::Unrecognized(1);
        }
        return Parsed::Incomplete;
    }

    // Validate continuation bytes (must start with 0b10xxxxxx).
    if buf[1..expected].iter().any(|&b| b & 0xC0 != 0x80) {
        return Parsed::Unrecognized(1);
    }

    std::str::from_utf8(&buf[..expected])
        .ok()
        .and_then(|s| s.chars().next())
        .map_or(Parsed::Unrecognized(expected), |ch| {
            key(KeyCode::Char(ch), expected)
        })
}

// ─── Helpers ────────────────────────────────────────────────────────────────

/// A parsed key press with no modifiers, consuming `n` bytes.
const fn key(code: KeyCode, n: usize) -> Parsed {
    Parsed::Event(Event::Key(KeyEvent::new(code)), n)
}

/// A parsed key press with modifiers, consuming `n` bytes.
const fn key_with(code: KeyCode, modifiers: Modifiers, n: usize) -> Parsed {
    Parsed::Event(Event::Key(KeyEvent::with(code, modifiers)), n)
}

/// Map a C0 control byte (0x00..=0x1A) to its Ctrl+letter key.
const fn control_key(b: u8) -> KeyEvent {
    let ch = if b == 0 { '@' } else { (b + b'a' - 1) as char };
    KeyEvent::with(KeyCode::Char(ch), Modifiers::CTRL)
}

/// Parse semicolon-separated CSI parameters.
///
/// Examples:
/// - `1;2` → `[1, 2]`
/// - `15` → `[15]`
/// - (empty) → `[]`
fn parse_csi_params(raw: &[u8]) -> Vec<u16> {
    if raw.is_empty() {
        return Vec::new();
    }
    raw.split(|&b| b == b';').map(parse_u16).collect()
}

/// Parse a u16 from the leading digits of `buf`, saturating on overflow.
fn parse_u16(buf: &[u8]) -> u16 {
    buf.iter()
        .take_while(|b| b.is_ascii_digit())
        .fold(0u16, |val, &b| {
            val.saturating_mul(10).saturating_add(u16::from(b - b'0'))
        })
}

/// Decode CSI modifier parameter into `Modifiers` bitflags.
///
/// The encoding is `1 + bitmask`. A parameter of 0 or 1 means no modifiers.
/// The truncation to u8 is intentional: only the low bits carry flags.
#[allow(clippy::cast_possible_truncation)]
const fn decode_modifiers(param: u16) -> Modifiers {
    let val = if param > 0 { param - 1 } else { 0 };
    Modifiers::from_bits_truncate(val as u8)
}

/// Expected byte length of a UTF-8 character from its lead byte.
/// Returns 0 for invalid lead bytes (continuation bytes, 0xF8..=0xFF).
const fn utf8_char_len(lead: u8) -> usize {
    match lead {
        0x00..=0x7F => 1,
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF7 => 4,
        _ => 0,
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
