// SPDX-License-Identifier: MIT
//
// SectionState — the decoration state of a render pass.
//
// Decorations are deferred. Turning on bold or picking a color only changes
// the *pending* style; nothing reaches the buffer until a character is
// appended, at which point the character is stamped with whatever is pending
// at that moment. A decoration switched on and off again with no text in
// between therefore leaves no trace in the output, and neither does a
// nested scope whose decorations are overridden before anything is drawn.
//
// Scopes are a stack of `Style` snapshots. `push` saves the pending style,
// `pop` restores it verbatim, so leaving a scope is a plain assignment and
// never a reverse replay of what the scope did.

use lumen_term::color::Color;
use lumen_term::style::{Attr, Style};

// ─── Decoration ──────────────────────────────────────────────────────────────

/// One independently clearable piece of a [`Style`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decoration {
    Foreground,
    Background,
    Bold,
    Underline,
    Strikethrough,
    Invert,
}

impl Decoration {
    /// All decorations, in SGR parameter order.
    pub const ALL: [Self; 6] = [
        Self::Foreground,
        Self::Background,
        Self::Bold,
        Self::Underline,
        Self::Strikethrough,
        Self::Invert,
    ];

    const fn attr(self) -> Option<Attr> {
        match self {
            Self::Bold => Some(Attr::BOLD),
            Self::Underline => Some(Attr::UNDERLINE),
            Self::Strikethrough => Some(Attr::STRIKETHROUGH),
            Self::Invert => Some(Attr::INVERT),
            Self::Foreground | Self::Background => None,
        }
    }
}

// ─── SectionState ────────────────────────────────────────────────────────────

/// Pending decorations plus the stack of enclosing scopes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionState {
    pending: Style,
    saved: Vec<Style>,
}

impl SectionState {
    /// A state with no decorations and no open scopes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The style the next appended character will carry.
    #[inline]
    #[must_use]
    pub const fn style(&self) -> Style {
        self.pending
    }

    /// Number of open scopes.
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.saved.len()
    }

    pub fn set_fg(&mut self, color: Color) {
        self.pending.fg = Some(color);
    }

    pub fn set_bg(&mut self, color: Color) {
        self.pending.bg = Some(color);
    }

    /// Switch a text attribute on.
    pub fn set_attr(&mut self, attr: Attr) {
        self.pending.attrs.insert(attr);
    }

    /// Drop one decoration back to the terminal default.
    pub fn clear(&mut self, decoration: Decoration) {
        match decoration {
            Decoration::Foreground => self.pending.fg = None,
            Decoration::Background => self.pending.bg = None,
            _ => {
                if let Some(attr) = decoration.attr() {
                    self.pending.attrs.remove(attr);
                }
            }
        }
    }

    /// Drop every decoration. Open scopes are unaffected.
    pub fn clear_all(&mut self) {
        self.pending = Style::DEFAULT;
    }

    /// Open a scope: snapshot the pending style.
    pub fn push(&mut self) {
        self.saved.push(self.pending);
    }

    /// Close the innermost scope, restoring the style it snapshotted.
    ///
    /// # Panics
    ///
    /// Panics if no scope is open. Push and pop must balance.
    pub fn pop(&mut self) {
        match self.saved.pop() {
            Some(style) => self.pending = style,
            None => panic!("SectionState::pop without a matching push"),
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn new_state_is_default() {
        let state = SectionState::new();
        assert!(state.style().is_default());
        assert_eq!(state.depth(), 0);
    }

    #[test]
    fn decorations_only_touch_pending() {
        let mut state = SectionState::new();
        state.set_fg(Color::RED);
        state.set_attr(Attr::BOLD);
        assert_eq!(state.style().fg, Some(Color::RED));
        assert!(state.style().attrs.contains(Attr::BOLD));
    }

    #[test]
    fn clear_single_decoration() {
        let mut state = SectionState::new();
        state.set_fg(Color::RED);
        state.set_bg(Color::BLUE);
        state.set_attr(Attr::UNDERLINE);
        state.clear(Decoration::Background);
        state.clear(Decoration::Underline);
        assert_eq!(state.style(), Style::DEFAULT.with_fg(Some(Color::RED)));
    }

    #[test]
    fn clear_all_keeps_scopes() {
        let mut state = SectionState::new();
        state.set_attr(Attr::INVERT);
        state.push();
        state.clear_all();
        assert!(state.style().is_default());
        state.pop();
        assert!(state.style().attrs.contains(Attr::INVERT));
    }

    #[test]
    fn nested_scopes_restore_in_order() {
        let mut state = SectionState::new();
        state.set_fg(Color::GREEN);
        state.push();
        state.set_fg(Color::RED);
        state.push();
        state.set_attr(Attr::BOLD);
        state.pop();
        assert_eq!(state.style(), Style::DEFAULT.with_fg(Some(Color::RED)));
        state.pop();
        assert_eq!(state.style(), Style::DEFAULT.with_fg(Some(Color::GREEN)));
        assert_eq!(state.depth(), 0);
    }

    #[test]
    #[should_panic(expected = "without a matching push")]
    fn unbalanced_pop_panics() {
        SectionState::new().pop();
    }

    // ── Scoped restoration property ─────────────────────────────────────

    #[derive(Debug, Clone)]
    enum Op {
        Fg(u8),
        Bg(u8),
        Attr(u8),
        Clear(usize),
        ClearAll,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            any::<u8>().prop_map(Op::Fg),
            any::<u8>().prop_map(Op::Bg),
            (0u8..16).prop_map(Op::Attr),
            (0..Decoration::ALL.len()).prop_map(Op::Clear),
            Just(Op::ClearAll),
        ]
    }

    fn apply(state: &mut SectionState, op: &Op) {
        match *op {
            Op::Fg(idx) => state.set_fg(Color::Ansi256(idx)),
            Op::Bg(idx) => state.set_bg(Color::Ansi256(idx)),
            Op::Attr(bits) => state.set_attr(Attr::from_bits_truncate(bits)),
            Op::Clear(i) => state.clear(Decoration::ALL[i]),
            Op::ClearAll => state.clear_all(),
        }
    }

    proptest! {
        #[test]
        fn scope_exit_restores_outer_state(
            outer in prop::collection::vec(op(), 0..8),
            inner in prop::collection::vec(op(), 0..16),
        ) {
            let mut state = SectionState::new();
            for op in &outer {
                apply(&mut state, op);
            }
            let before = state.clone();

            state.push();
            for op in &inner {
                apply(&mut state, op);
            }
            state.pop();

            prop_assert_eq!(state, before);
        }
    }
}
